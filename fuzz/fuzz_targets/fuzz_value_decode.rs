#![no_main]

use libfuzzer_sys::fuzz_target;

use flutter_channel_interceptor::codec::{decode_value, encode_value};
use flutter_channel_interceptor::monitor::render_value;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly. Inputs may use
    // non-minimal size fields, so compare canonical encodings only.
    if let Ok(value) = decode_value(data) {
        let _ = render_value(&value);
        let canonical = encode_value(&value);
        let again = decode_value(&canonical).expect("canonical encoding must decode");
        assert_eq!(encode_value(&again), canonical);
    }
});
