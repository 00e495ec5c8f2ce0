#![no_main]

use heirloom_custody::SealedPayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try deserializing arbitrary bytes as a SealedPayload.
    // from_bytes must never panic — it should always return Ok or Err.
    let _ = SealedPayload::from_bytes(data);

    // If deserialization succeeds, verify round-trip serialization doesn't panic
    if let Ok(sealed) = SealedPayload::from_bytes(data) {
        let bytes = sealed.to_bytes();
        // Re-deserialize the serialized bytes — this should also never panic
        let _ = SealedPayload::from_bytes(&bytes);
    }
});
