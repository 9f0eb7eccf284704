#![no_main]

use libfuzzer_sys::fuzz_target;

use flutter_channel_interceptor::codec::decode_envelope;
use flutter_channel_interceptor::monitor::inspect_envelope;

fuzz_target!(|data: &[u8]| {
    let _ = decode_envelope(data);
    // Diagnostic inspection never fails, whatever the bytes.
    let _ = inspect_envelope(data).to_string();
});
