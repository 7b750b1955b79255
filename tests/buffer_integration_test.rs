//! End-to-end buffer behavior through the public API.

mod common;

use common::{cache_buffer, chunked, protocol_lines, unit_buffer};
use pretty_assertions::assert_eq;
use slicebuf_lib::buffer::{Buffer, DataPoint, Sample, TokioScheduler};
use slicebuf_lib::core::{BufferConfig, Timestamp};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_values_in_same_cell_are_summed() {
    let buffer = Buffer::new(BufferConfig::default()).unwrap();
    buffer.ingest(1_700_000_005i64, [("web.hits", 2)]);
    buffer.ingest(1_700_000_010i64, [("web.hits", 3)]);

    // 1_700_000_005 and 1_700_000_010 share the minute starting at 1_699_999_980
    assert_eq!(
        buffer.flush(),
        vec![DataPoint::new("web.hits", 5.0, 1_699_999_980)]
    );
}

#[test]
fn test_each_changed_cell_drained_once() {
    let buffer = unit_buffer();
    for _ in 0..5 {
        buffer.ingest(100i64, [("a", 1), ("b", 1)]);
    }
    buffer.ingest(101i64, [("a", 1)]);

    assert_eq!(
        buffer.flush(),
        vec![
            DataPoint::new("a", 5.0, 100),
            DataPoint::new("b", 5.0, 100),
            DataPoint::new("a", 1.0, 101),
        ]
    );
}

#[test]
fn test_second_drain_is_empty() {
    let buffer = unit_buffer();
    buffer.ingest(1i64, [("a", 1)]);
    assert_eq!(buffer.flush().len(), 1);
    assert!(buffer.flush().is_empty());
    assert!(buffer.flush().is_empty());
}

#[test]
fn test_drain_clears_store_only_outside_cache_mode() {
    let plain = unit_buffer();
    plain.ingest(1i64, [("a", 1)]);
    plain.flush();
    assert_eq!(plain.size(), 0);

    let cached = cache_buffer(Duration::from_secs(3600), Duration::from_secs(60));
    cached.ingest(1i64, [("a", 1)]);
    cached.flush();
    assert_eq!(cached.size(), 1);

    cached.ingest(1i64, [("a", 4)]);
    assert_eq!(cached.flush(), vec![DataPoint::new("a", 5.0, 1)]);
}

#[test]
fn test_partially_consumed_drain_loses_nothing() {
    let buffer = unit_buffer();
    buffer.ingest(1i64, [("a", 1), ("b", 2), ("c", 3)]);

    let first: Vec<DataPoint> = buffer.drain().take(1).collect();
    assert_eq!(first, vec![DataPoint::new("a", 1.0, 1)]);

    assert_eq!(
        buffer.flush(),
        vec![DataPoint::new("b", 2.0, 1), DataPoint::new("c", 3.0, 1)]
    );
    assert!(buffer.is_empty());
}

#[test]
fn test_line_split_across_chunks_is_reassembled() {
    let buffer = unit_buffer();
    buffer.feed("conn", "abc 1 10");
    assert_eq!(buffer.size(), 0);

    buffer.feed("conn", "00\nother 2 2000\n");
    assert_eq!(
        buffer.flush(),
        vec![
            DataPoint::new("abc", 1.0, 1000),
            DataPoint::new("other", 2.0, 2000),
        ]
    );
    assert_eq!(buffer.leftover("conn"), None);
}

#[test]
fn test_split_line_with_non_numeric_value_is_dropped() {
    let buffer = unit_buffer();
    buffer.feed("A", "abc 1 1000\nkey va");
    assert_eq!(buffer.leftover("A").as_deref(), Some("key va"));

    // "key val 20" has a non-numeric value field, so the join is discarded
    buffer.feed("A", "l 20\nother 2 2000\n");
    assert_eq!(buffer.leftover("A"), None);
    assert_eq!(
        buffer.flush(),
        vec![
            DataPoint::new("abc", 1.0, 1000),
            DataPoint::new("other", 2.0, 2000),
        ]
    );
}

#[test]
fn test_unrepresentable_timestamp_uses_current_time() {
    let buffer = unit_buffer();
    let before = Timestamp::now().as_secs();
    buffer.feed("s", "k 1 99999999999999999999\n");
    let after = Timestamp::now().as_secs();

    let points = buffer.flush();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].key, "k");
    assert_eq!(points[0].value, 1.0);
    assert!(
        (before..=after).contains(&points[0].slice),
        "slice {} outside [{}, {}]",
        points[0].slice,
        before,
        after
    );
}

#[test]
fn test_huge_value_saturates() {
    let buffer = unit_buffer();
    buffer.feed("s", &format!("big {} 10\n", "9".repeat(401)));
    assert_eq!(buffer.flush(), vec![DataPoint::new("big", f64::MAX, 10)]);
}

#[test]
fn test_chunking_matches_single_feed() {
    let text = protocol_lines(&[
        ("cpu.user", 10, 1_000),
        ("cpu.system", 4, 1_000),
        ("cpu.user", 5, 1_001),
        ("mem.free", 2048, 1_000),
        ("cpu.user", 1, 1_000),
    ]);

    let whole = unit_buffer();
    whole.feed("s", &text);
    let expected = whole.flush();
    assert_eq!(expected.len(), 4);

    // Every chunk at least one line long, so each fragment meets its newline
    for size in [20, 23, 31, 47, 64] {
        let pieces = unit_buffer();
        for piece in chunked(&text, size) {
            pieces.feed("s", piece);
        }
        assert_eq!(pieces.flush(), expected, "chunk size {}", size);
        assert_eq!(pieces.leftover("s"), None);
    }
}

#[test]
fn test_fragment_grows_across_unterminated_chunks() {
    let buffer = unit_buffer();
    buffer.feed("s", "abc 1");
    buffer.feed("s", " 10");
    assert_eq!(buffer.leftover("s").as_deref(), Some("abc 1 10"));

    buffer.feed("s", "00\n");
    assert_eq!(buffer.flush(), vec![DataPoint::new("abc", 1.0, 1000)]);
}

#[test]
fn test_fragment_split_mid_field_is_lost() {
    let buffer = unit_buffer();
    buffer.feed("s", "abc");
    buffer.feed("s", " 1");
    buffer.feed("s", "0 10\n");

    assert_eq!(buffer.leftover("s"), None);
    assert!(buffer.flush().is_empty());
}

#[test]
fn test_invalid_lines_are_dropped() {
    let buffer = unit_buffer();
    buffer.feed("s", "bad-key! 1 1000\nmissing 1\nkey -5 1000\ngood 1 1000\n");

    assert_eq!(buffer.size(), 1);
    assert_eq!(buffer.flush(), vec![DataPoint::new("good", 1.0, 1000)]);
}

#[test]
fn test_garbage_does_not_grow_buffer() {
    let buffer = unit_buffer();
    buffer.feed("s", "not a metric at all\n\n   \n");
    assert_eq!(buffer.size(), 0);
    assert!(!buffer.has_pending());
}

#[test]
fn test_fragment_that_cannot_complete_is_discarded() {
    let buffer = unit_buffer();
    buffer.feed("s", "abc 1");
    buffer.feed("s", " x\nok 1 5\n");

    assert_eq!(buffer.leftover("s"), None);
    assert_eq!(buffer.flush(), vec![DataPoint::new("ok", 1.0, 5)]);
}

#[test]
fn test_sources_do_not_share_fragments() {
    let buffer = unit_buffer();
    buffer.feed("a", "x 1 ");
    buffer.feed("b", "y 2 ");
    buffer.feed("b", "7\n");
    buffer.feed("a", "9\n");

    assert_eq!(
        buffer.flush(),
        vec![DataPoint::new("y", 2.0, 7), DataPoint::new("x", 1.0, 9)]
    );
}

#[test]
fn test_eviction_boundary() {
    let buffer = cache_buffer(Duration::from_secs(3600), Duration::from_secs(60));
    let now = Timestamp::now().as_secs();
    buffer.ingest(now - 3601, [("stale", 1)]);
    buffer.ingest(now - 3599, [("recent", 1)]);

    let report = buffer.evict(Duration::from_secs(3600));
    assert_eq!(report.evicted(), 1);

    let keys: Vec<String> = buffer.flush().into_iter().map(|p| p.key).collect();
    assert_eq!(keys, vec!["recent".to_string()]);
}

#[test]
fn test_push_structured_sample() {
    let buffer = unit_buffer();
    buffer.push(
        Sample::new(50i64)
            .with_metric("requests", 3)
            .with_metric("latency", "12.5")
            .with_metric("broken", "n/a"),
    );

    assert_eq!(
        buffer.flush(),
        vec![
            DataPoint::new("requests", 3.0, 50),
            DataPoint::new("latency", 12.5, 50),
            DataPoint::new("broken", 0.0, 50),
        ]
    );
}

#[test]
fn test_concurrent_ingest_from_threads() {
    let buffer = Arc::new(unit_buffer());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let source = format!("worker-{}", worker);
                for _ in 0..250 {
                    buffer.ingest(10i64, [("shared", 1)]);
                    buffer.feed(&source, "fed 1 1");
                    buffer.feed(&source, "0\n");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut points = buffer.flush();
    points.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(
        points,
        vec![
            DataPoint::new("fed", 2000.0, 10),
            DataPoint::new("shared", 2000.0, 10),
        ]
    );
    assert_eq!(buffer.stats().leftover_sources, 0);
}

#[test]
fn test_drain_concurrent_with_ingest_loses_nothing() {
    let buffer = Arc::new(unit_buffer());
    let writer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            for _ in 0..1_000 {
                buffer.ingest(1i64, [("n", 1)]);
            }
        })
    };

    let mut total = 0.0;
    while !writer.is_finished() {
        total += buffer.flush().iter().map(|p| p.value).sum::<f64>();
    }
    writer.join().unwrap();
    total += buffer.flush().iter().map(|p| p.value).sum::<f64>();

    assert_eq!(total, 1000.0);
}

#[tokio::test(start_paused = true)]
async fn test_cleaner_evicts_on_schedule() {
    let buffer = cache_buffer(Duration::from_secs(60), Duration::from_secs(30));
    let handle = buffer
        .start_cleaner(&TokioScheduler::current().unwrap())
        .unwrap()
        .expect("cache mode registers a cleaner");

    let now = Timestamp::now().as_secs();
    buffer.ingest(now - 3600, [("ancient", 1)]);
    buffer.ingest(now + 3600, [("future", 1)]);
    assert_eq!(buffer.stats().slices, 2);

    // Paused clock: only the tokio timer advances, wall-clock ages do not
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(buffer.stats().slices, 1);

    handle.cancel();
    let keys: Vec<String> = buffer.flush().into_iter().map(|p| p.key).collect();
    assert_eq!(keys, vec!["future".to_string()]);
}

#[test]
fn test_no_cleaner_without_cache_mode() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let scheduler = TokioScheduler::new(runtime.handle().clone());

    let buffer = unit_buffer();
    assert!(buffer.start_cleaner(&scheduler).unwrap().is_none());
}
