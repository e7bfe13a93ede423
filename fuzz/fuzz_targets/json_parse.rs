//! Fuzz target for JSON annotation parsing.
//!
//! Arbitrary bytes are fed to the entry-by-entry JSON parser, which must
//! report malformed entries instead of panicking.

#![no_main]

use labelport::ir::io_json::from_json_str;
use labelport::ir::CategoryReconciler;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    let reconciler = CategoryReconciler::new();
    let _ = from_json_str(json, &reconciler);
});
