#![no_main]

use libfuzzer_sys::fuzz_target;
use reef_core::codec;
use reef_core::merge::{merge_comments, merge_work_items};

// Treat the input as two snapshots split at the midpoint. The converged
// sets must not depend on which side is called local.
fuzz_target!(|data: &[u8]| {
    let mid = data.len() / 2;
    let (Ok(a), Ok(b)) = (codec::decode(&data[..mid]), codec::decode(&data[mid..])) else {
        return;
    };

    let ab = merge_work_items(&a.items, &b.items);
    let ba = merge_work_items(&b.items, &a.items);
    assert_eq!(ab.items, ba.items);
    assert_eq!(ab.added, ba.added);
    assert_eq!(ab.updated, ba.updated);
    assert_eq!(ab.unchanged, ba.unchanged);

    let cab = merge_comments(&a.comments, &b.comments);
    let cba = merge_comments(&b.comments, &a.comments);
    assert_eq!(cab.comments, cba.comments);

    // Merging a converged set with either input is a no-op on content.
    let idem = merge_work_items(&ab.items, &ab.items);
    assert_eq!(idem.items, ab.items);
    assert_eq!(idem.updated, 0);
});
