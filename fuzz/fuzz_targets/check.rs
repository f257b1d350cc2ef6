#![no_main]
use libfuzzer_sys::fuzz_target;

use chansel::session::Session;

// Arbitrary text must produce diagnostics or a lowered program, never a panic.
fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let _ = chansel::lower_source(source, &Session::default());
});
