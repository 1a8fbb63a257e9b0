#![no_main]

use libfuzzer_sys::fuzz_target;
use servitrace::connectivity::ConnectivityEvidence;
use servitrace::critical_path::{critical_path, longest_path};
use servitrace::span_record::SpanRecord;
use servitrace::span_tree::SpanTree;

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON must either fail to parse, fail validation, or extract cleanly
    let Ok(records) = serde_json::from_slice::<Vec<SpanRecord>>(data) else {
        return;
    };
    let Ok(tree) = SpanTree::from_records(&records) else {
        return;
    };

    let evidence = ConnectivityEvidence::from_latest_end(&tree);
    let _ = critical_path(&tree, &evidence, tree.root());
    let _ = longest_path(&tree, tree.root());
});
