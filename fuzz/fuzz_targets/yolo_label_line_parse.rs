//! Fuzz target for YOLO single-line label parsing.

#![no_main]

use labelport::ir::io_yolo::parse_label_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    // First byte picks the category count so out-of-range indices get hit.
    let category_count = data.first().map_or(1, |b| *b as usize % 8);
    if let Ok(Some(label)) = parse_label_line(line, 1, category_count) {
        assert!(label.class_index < category_count);
        assert!(label.bbox.xmin() >= 0.0 && label.bbox.xmax() <= 1.0);
        assert!(label.bbox.ymin() >= 0.0 && label.bbox.ymax() <= 1.0);
    }
});
