#![no_main]

use libfuzzer_sys::fuzz_target;
use reef_core::codec;

// Tolerant decode must never panic, and a cleanly decoded snapshot must
// re-encode into bytes that decode strictly back to the same records.
fuzz_target!(|data: &[u8]| {
    let Ok(decoded) = codec::decode(data) else {
        return;
    };
    if !decoded.line_errors.is_empty() {
        return;
    }

    // Records with non-finite numbers decode but cannot re-encode.
    let Ok(bytes) = codec::encode(&decoded.items, &decoded.comments) else {
        return;
    };
    let again = codec::decode_strict(&bytes).expect("canonical bytes must decode strictly");
    assert_eq!(again.items, decoded.items);
    assert_eq!(again.comments, decoded.comments);
});
