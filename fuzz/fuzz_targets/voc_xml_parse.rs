//! Fuzz target for Pascal VOC XML parsing.
//!
//! Feeds arbitrary bytes to the VOC document parser, checking for panics,
//! crashes, or hangs in the object and part recursion.

#![no_main]

use labelport::ir::io_voc_xml::from_voc_xml_slice;
use labelport::ir::CategoryReconciler;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let reconciler = CategoryReconciler::new();
    let _ = from_voc_xml_slice(data, &reconciler);
});
