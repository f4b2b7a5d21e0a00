#![no_main]

use libfuzzer_sys::fuzz_target;

use verisight::media::AnalysisResult;

fuzz_target!(|data: &str| {
    // The strict decoder must reject or accept, never panic. Anything it
    // accepts re-serializes into a document it accepts again.
    if let Ok(result) = AnalysisResult::from_model_json(data) {
        let reencoded = serde_json::to_string(&result).expect("result serializes");
        let again = AnalysisResult::from_model_json(&reencoded).expect("re-decodes");
        assert_eq!(again.verdict, result.verdict);
        assert_eq!(again.artifacts, result.artifacts);
    }
});
