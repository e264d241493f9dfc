#![no_main]

use libfuzzer_sys::fuzz_target;
use vcd::{parse_document, ParseOptions};

fuzz_target!(|data: &[u8]| {
    for recover_malformed_records in [false, true] {
        let options = ParseOptions {
            recover_malformed_records,
        };
        if let Ok(doc) = parse_document(data, &options) {
            // Rendering must not panic either.
            let _ = doc.describe();
        }
    }
});
