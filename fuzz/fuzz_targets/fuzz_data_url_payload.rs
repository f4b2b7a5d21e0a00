#![no_main]

use base64::Engine;
use libfuzzer_sys::fuzz_target;

use verisight::media::{data_url_payload, ingest_bytes, AnalysisRequest};

fuzz_target!(|data: &[u8]| {
    // Arbitrary strings must never panic the splitter.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(payload) = data_url_payload(s) {
            assert!(s.ends_with(payload));
        }
    }

    // Any bytes under any declared type, commas included, produce a request
    // carrying exactly their base64 and the declared type unchanged.
    let split = data.first().copied().unwrap_or(0) as usize % (data.len() + 1);
    let (mime, bytes) = data.split_at(split);
    let mime = String::from_utf8_lossy(mime).into_owned();
    let media = ingest_bytes("fuzz", mime.as_str(), bytes);
    let request = AnalysisRequest::from_media(&media).expect("ingested media is a data URL");
    let expected = base64::engine::general_purpose::STANDARD.encode(bytes);
    assert_eq!(request.payload, expected);
    assert_eq!(request.mime_type, mime);
});
