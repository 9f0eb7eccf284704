#![no_main]

use libfuzzer_sys::fuzz_target;

use flutter_channel_interceptor::codec::{decode_method_call, encode_method_call};
use flutter_channel_interceptor::monitor::inspect_payload;

fuzz_target!(|data: &[u8]| {
    if let Ok(call) = decode_method_call(data) {
        let _ = encode_method_call(&call);
    }
    let _ = inspect_payload(Some(data)).to_string();
});
