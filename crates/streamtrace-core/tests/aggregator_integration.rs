//! Integration test: end-to-end pathway checkpoint through a flushed payload.
//!
//! Run: cargo test -p streamtrace-core --test aggregator_integration

use std::sync::{Arc, Mutex};
use std::time::Duration;

use streamtrace_core::aggregator::{Aggregator, Clock, PipelineStatsTransport};
use streamtrace_core::config::{AgentConfig, Config};
use streamtrace_core::pathway::{Pathway, Tag};
use streamtrace_core::telemetry::Counters;

struct RecordingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }
}

impl PipelineStatsTransport for RecordingTransport {
    fn send_pipeline_stats(&self, bytes: Vec<u8>) -> Result<(), String> {
        self.sent.lock().unwrap().push(bytes);
        Ok(())
    }
}

struct FixedClock(std::sync::atomic::AtomicU64);

impl Clock for FixedClock {
    fn now_ns(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[test]
fn checkpoint_chain_flushes_a_non_empty_payload_on_shutdown() {
    let config = Config {
        service: "checkout".to_string(),
        env: "prod".to_string(),
        primary_tag: String::new(),
        agent: AgentConfig {
            enabled: true,
            host: "localhost".to_string(),
            port: 8126,
        },
    };
    let transport = RecordingTransport::new();
    let counters = Counters::new();
    let clock = FixedClock(std::sync::atomic::AtomicU64::new(1_000_000_000));
    let aggregator =
        Aggregator::spawn_with_clock(&config, transport.clone(), counters.clone(), clock);

    let now = 1_000_000_000u64;
    let (first_hop, first_point) =
        Pathway::empty().checkpoint("producer", "prod", "", &[Tag::new("type", "kafka")], now);
    aggregator.add_point(first_point);

    let (_second_hop, second_point) = first_hop.checkpoint(
        "consumer",
        "prod",
        "",
        &[Tag::new("topic", "orders")],
        now + 5_000_000_000,
    );
    aggregator.add_point(second_point);

    aggregator.shutdown();

    // Give the (already-joined) actor's synchronous final flush a moment to
    // have invoked the transport; shutdown() already joins the thread, so
    // this is really just asserting on state that must already be settled.
    std::thread::sleep(Duration::from_millis(10));

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "exactly one payload should have been flushed");
    assert!(!sent[0].is_empty());

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.payloads_in, 1);
    assert_eq!(snapshot.flushed_payloads, 1);
    assert!(snapshot.flushed_buckets >= 1);
    assert_eq!(snapshot.flush_errors, 0);
}

#[test]
fn disabled_agent_never_produces_a_payload() {
    let transport = RecordingTransport::new();
    let counters = Counters::new();
    let aggregator = Aggregator::spawn(&Config::default(), transport.clone(), counters.clone());

    let (_, point) = Pathway::empty().checkpoint("svc", "env", "", &[], 0);
    aggregator.add_point(point);
    aggregator.shutdown();

    assert!(transport.sent.lock().unwrap().is_empty());
    assert_eq!(counters.snapshot().payloads_in, 0);
}
