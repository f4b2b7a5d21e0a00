use clap::Parser;

use verisight::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let code = cli::run(Cli::parse()).await;
    std::process::exit(code);
}
