#![no_main]
use libfuzzer_sys::fuzz_target;
use streamtrace_core::propagator;

fuzz_target!(|data: &[u8]| {
    // Binary decode must never panic regardless of length or content; any
    // malformed input yields "no pathway".
    let _ = propagator::decode(data);

    // Same for the base64 variant, fed whatever (possibly invalid) UTF-8
    // the fuzzer happens to produce.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = propagator::decode_str(s);
    }
});
