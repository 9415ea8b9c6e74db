//! Fuzz target: persisted credential image decoder
//!
//! Drives arbitrary byte sequences into `image::decode` and asserts that it
//! never panics, never yields more than capacity, and that anything it
//! accepts survives an encode/decode cycle unchanged.
//!
//! cargo fuzz run fuzz_credential_image

#![no_main]

use apjoin::credentials::MAX_AP_COUNT;
use apjoin::credentials::image::{decode, encode, image_len};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(records) = decode::<MAX_AP_COUNT>(data) else {
        return;
    };
    assert!(records.len() <= MAX_AP_COUNT);

    let mut reencoded = vec![0u8; image_len(MAX_AP_COUNT)];
    encode(&records, &mut reencoded).expect("decoded records must re-encode");

    // Padding bytes after the NUL terminators are not preserved, so compare
    // the decoded form rather than raw bytes.
    let again = decode::<MAX_AP_COUNT>(&reencoded).expect("re-encoded image must decode");
    assert_eq!(again, records);
});
