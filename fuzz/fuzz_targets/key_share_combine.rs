#![no_main]

use heirloom_shamir::{combine_shares, KeyShare};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parse arbitrary bytes as a JSON array of shares, then combine.
    // Neither step may panic: combine_shares must reject malformed,
    // mismatched, or tampered shares with an Err, never a crash.
    if let Ok(shares) = serde_json::from_slice::<Vec<KeyShare>>(data) {
        let _ = combine_shares(&shares);
    }
});
