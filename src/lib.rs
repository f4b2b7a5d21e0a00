//! VeriSight media authenticity library
//!
//! Loads an image, video, or audio file, asks a hosted multimodal model
//! (Gemini `generateContent`) for a forensic verdict under a strict JSON
//! schema, and decodes the reply into an [`media::AnalysisResult`].
//!
//! The binary wraps this in two front-ends: a one-shot `analyze` command
//! and a single-session HTTP server.

pub mod cli;
pub mod config;
pub mod logging;
pub mod media;
pub mod server;
pub mod session;
