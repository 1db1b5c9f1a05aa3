#![no_main]
use libfuzzer_sys::fuzz_target;
use streamtrace_core::dense_store::DenseStore;

/// Replays a fuzzer-chosen sequence of `(index, count)` inserts and checks
/// that `add`/`to_wire` never panic and that the invariant `total_count >=
/// 0` holds, regardless of how wide or how sparse the index range is.
fuzz_target!(|data: &[u8]| {
    let mut store = DenseStore::new();
    let mut total = 0.0f64;

    for chunk in data.chunks_exact(5) {
        let index = i16::from_le_bytes([chunk[0], chunk[1]]) as i32;
        let raw_count = u16::from_le_bytes([chunk[2], chunk[3]]);
        let count = f64::from(raw_count) / 100.0;
        let _ = chunk[4]; // reserved, keeps the chunk size a round number

        store.add(index, count);
        total += count;
    }

    assert!(store.total_count() >= 0.0);
    assert!((store.total_count() - total).abs() < 1e-6 || total == 0.0);

    let (wire, _offset) = store.to_wire();
    let _ = wire.len();
});
