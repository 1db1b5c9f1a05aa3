//! Time-bucketed aggregator actor (component G).
//!
//! A single long-lived actor owns all aggregator state; producers reach it
//! only through a message queue (`add_point`/`add_offset` are fire-and-
//! forget enqueues). Every `D` a flush sweeps completed buckets into a
//! payload and hands it to the transport collaborator off the actor's
//! critical path.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Sender};

use crate::config::Config;
use crate::pathway::{sorted_rendered_tags, AggregatorOffset, AggregatorPoint, OffsetType, Tag};
use crate::payload::{
    encode_payload, encode_sketch, BUCKET_DURATION_NS, EncodedBacklog, EncodedBucket,
    EncodedPoint, PayloadMeta, TimestampType,
};
use crate::sketch::DDSketch;
use crate::telemetry::Counters;

/// Fixed bucket duration, `D = 10 * 10^9` ns.
pub const BUCKET_DURATION: u64 = BUCKET_DURATION_NS;

fn align(t: u64, d: u64) -> u64 {
    t - (t % d)
}

/// Which of the two parallel bucket maps a window lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapKind {
    Current,
    Origin,
}

/// Delegated collaborator: posts an already-encoded payload to a collector.
/// The core never retries; failures are counted and the bucket is dropped
/// regardless of outcome.
pub trait PipelineStatsTransport: Send + Sync {
    fn send_pipeline_stats(&self, bytes: Vec<u8>) -> Result<(), String>;
}

/// Transport used when the aggregator has nowhere real to send payloads
/// (e.g. tests, or a harness dry run); accepts and discards everything.
pub struct NoopTransport;

impl PipelineStatsTransport for NoopTransport {
    fn send_pipeline_stats(&self, _bytes: Vec<u8>) -> Result<(), String> {
        Ok(())
    }
}

/// Per-hash sub-accumulator inside a bucket.
struct Group {
    edge_tags: Vec<Tag>,
    hash: u64,
    parent_hash: u64,
    pathway_latency_sketch: DDSketch,
    edge_latency_sketch: DDSketch,
}

impl Group {
    fn new(hash: u64, parent_hash: u64, edge_tags: Vec<Tag>) -> Self {
        Self {
            edge_tags,
            hash,
            parent_hash,
            pathway_latency_sketch: DDSketch::with_default_accuracy(),
            edge_latency_sketch: DDSketch::with_default_accuracy(),
        }
    }
}

/// A 10-second aligned window accumulating groups and offsets.
struct Bucket {
    start_ns: u64,
    groups: HashMap<u64, Group>,
    latest_commit_offsets: Vec<AggregatorOffset>,
    latest_produce_offsets: Vec<AggregatorOffset>,
}

impl Bucket {
    fn new(start_ns: u64) -> Self {
        Self {
            start_ns,
            groups: HashMap::new(),
            latest_commit_offsets: Vec::new(),
            latest_produce_offsets: Vec::new(),
        }
    }

    fn upsert_offset(&mut self, offset: AggregatorOffset) {
        let list = match offset.kind {
            OffsetType::Commit => &mut self.latest_commit_offsets,
            OffsetType::Produce => &mut self.latest_produce_offsets,
        };
        let canonical = offset.canonical_tags();
        if let Some(existing) = list
            .iter_mut()
            .find(|o| o.canonical_tags() == canonical)
        {
            *existing = offset;
        } else {
            list.push(offset);
        }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.latest_commit_offsets.is_empty()
            && self.latest_produce_offsets.is_empty()
    }
}

/// Negative seconds (from floating-point normalization of `ns / 1e9` on
/// already-nonnegative inputs) are clamped to zero.
fn clamp_nonneg(seconds: f64) -> f64 {
    if seconds < 0.0 {
        0.0
    } else {
        seconds
    }
}

enum Command {
    AddPoint(AggregatorPoint),
    AddOffset(AggregatorOffset),
    Flush,
    Shutdown(Sender<()>),
}

struct ActorState {
    current_buckets: HashMap<u64, Bucket>,
    origin_buckets: HashMap<u64, Bucket>,
    meta: PayloadMeta,
    transport: Arc<dyn PipelineStatsTransport>,
    counters: Arc<Counters>,
}

impl ActorState {
    fn add_point(&mut self, point: AggregatorPoint) {
        let current_key = align(point.timestamp_ns, BUCKET_DURATION_NS);
        let origin_key = align(
            point.timestamp_ns.saturating_sub(point.pathway_latency_ns),
            BUCKET_DURATION_NS,
        );

        self.upsert_group(MapKind::Current, current_key, &point);
        self.upsert_group(MapKind::Origin, origin_key, &point);
    }

    fn upsert_group(&mut self, map_kind: MapKind, key: u64, point: &AggregatorPoint) {
        let map = match map_kind {
            MapKind::Current => &mut self.current_buckets,
            MapKind::Origin => &mut self.origin_buckets,
        };
        let bucket = map.entry(key).or_insert_with(|| Bucket::new(key));
        let group = bucket
            .groups
            .entry(point.hash)
            .or_insert_with(|| Group::new(point.hash, point.parent_hash, point.edge_tags.clone()));

        let pathway_latency_s = clamp_nonneg(point.pathway_latency_ns as f64 / 1e9);
        let edge_latency_s = clamp_nonneg(point.edge_latency_ns as f64 / 1e9);
        if pathway_latency_s > 0.0 {
            group
                .pathway_latency_sketch
                .add(pathway_latency_s)
                .expect("positive value never errors");
        } else {
            group.pathway_latency_sketch.add(0.0).expect("zero is valid");
        }
        if edge_latency_s > 0.0 {
            group
                .edge_latency_sketch
                .add(edge_latency_s)
                .expect("positive value never errors");
        } else {
            group.edge_latency_sketch.add(0.0).expect("zero is valid");
        }
    }

    fn add_offset(&mut self, offset: AggregatorOffset) {
        let key = align(offset.timestamp_ns, BUCKET_DURATION_NS);
        let bucket = self
            .current_buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(key));
        bucket.upsert_offset(offset);
    }

    /// Partitions `all` into flushable and still-current, per the resolved
    /// semantics of the reference `current?` predicate: flushable when
    /// `now >= start + D`.
    fn flushable(buckets: &mut HashMap<u64, Bucket>, now_ns: u64) -> Vec<Bucket> {
        let flushable_keys: Vec<u64> = buckets
            .iter()
            .filter(|(_, b)| now_ns >= b.start_ns + BUCKET_DURATION_NS)
            .map(|(k, _)| *k)
            .collect();
        flushable_keys
            .into_iter()
            .filter_map(|k| buckets.remove(&k))
            .collect()
    }

    /// Drains every bucket in both maps unconditionally, for the final
    /// shutdown flush.
    fn drain_all(&mut self) -> (Vec<Bucket>, Vec<Bucket>) {
        (
            self.current_buckets.drain().map(|(_, b)| b).collect(),
            self.origin_buckets.drain().map(|(_, b)| b).collect(),
        )
    }

    fn flush(&mut self, now_ns: u64) {
        let current = Self::flushable(&mut self.current_buckets, now_ns);
        let origin = Self::flushable(&mut self.origin_buckets, now_ns);
        self.flush_buckets(current, origin);
    }

    fn flush_everything(&mut self) {
        let (current, origin) = self.drain_all();
        self.flush_buckets(current, origin);
    }

    fn flush_buckets(&mut self, current: Vec<Bucket>, origin: Vec<Bucket>) {
        if current.is_empty() && origin.is_empty() {
            return;
        }

        let mut encoded_buckets = Vec::new();
        let mut flushed_bucket_count = 0u64;
        for (buckets, timestamp_type) in [
            (current, TimestampType::Current),
            (origin, TimestampType::Origin),
        ] {
            for bucket in buckets {
                if bucket.is_empty() {
                    continue;
                }
                flushed_bucket_count += 1;
                encoded_buckets.push(encode_bucket(bucket, timestamp_type));
            }
        }

        if encoded_buckets.is_empty() {
            return;
        }

        self.counters.incr_payloads_in();
        match encode_payload(&self.meta, encoded_buckets) {
            None => {}
            Some(bytes) => match self.transport.send_pipeline_stats(bytes) {
                Ok(()) => {
                    self.counters.incr_flushed_payloads();
                    self.counters.add_flushed_buckets(flushed_bucket_count);
                    tracing::debug!(buckets = flushed_bucket_count, "flushed pipeline stats");
                }
                Err(reason) => {
                    self.counters.incr_flush_errors();
                    tracing::warn!(%reason, "pipeline stats flush failed");
                }
            },
        }
    }
}

fn encode_bucket(bucket: Bucket, timestamp_type: TimestampType) -> EncodedBucket {
    let points = bucket
        .groups
        .into_values()
        .map(|group| EncodedPoint {
            edge_tags: sorted_rendered_tags(&group.edge_tags),
            hash: group.hash,
            parent_hash: group.parent_hash,
            pathway_latency: encode_sketch(&group.pathway_latency_sketch),
            edge_latency: encode_sketch(&group.edge_latency_sketch),
            timestamp_type,
        })
        .collect();

    let backlogs = bucket
        .latest_commit_offsets
        .into_iter()
        .chain(bucket.latest_produce_offsets)
        .map(|offset| EncodedBacklog {
            tags: offset
                .canonical_tags()
                .into_iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect(),
            value: offset.offset,
        })
        .collect();

    EncodedBucket {
        start_ns: bucket.start_ns,
        points,
        backlogs,
    }
}

/// Handle to the aggregator actor. `add_point`/`add_offset` are
/// fire-and-forget; dropping the handle without calling [`Aggregator::shutdown`]
/// abandons the actor thread (its state is lost, matching the documented
/// crash semantics).
pub struct Aggregator {
    sender: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

/// Supplies the actor's notion of "now" in nanoseconds. A trait (rather
/// than a bare function pointer) so tests can inject a deterministic clock.
pub trait Clock: Send + 'static {
    fn now_ns(&self) -> u64;
}

/// Wall-clock time since `UNIX_EPOCH`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_nanos() as u64
    }
}

impl Aggregator {
    /// Starts the actor thread, or returns a disabled handle if
    /// `config.agent.enabled` is false. `add` calls on a disabled
    /// aggregator are accepted and discarded.
    pub fn spawn(
        config: &Config,
        transport: Arc<dyn PipelineStatsTransport>,
        counters: Arc<Counters>,
    ) -> Self {
        Self::spawn_with_clock(config, transport, counters, SystemClock)
    }

    pub fn spawn_with_clock(
        config: &Config,
        transport: Arc<dyn PipelineStatsTransport>,
        counters: Arc<Counters>,
        clock: impl Clock,
    ) -> Self {
        if !config.agent.enabled {
            tracing::debug!("aggregator disabled, running in no-op mode");
            return Self {
                sender: None,
                handle: None,
                counters,
            };
        }

        let (sender, receiver) = bounded::<Command>(4096);
        let meta = PayloadMeta {
            env: config.env.clone(),
            service: config.service.clone(),
            primary_tag: config.primary_tag.clone(),
            tracer_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let counters_for_thread = Arc::clone(&counters);

        let handle = std::thread::Builder::new()
            .name("streamtrace-aggregator".to_string())
            .spawn(move || {
                let mut state = ActorState {
                    current_buckets: HashMap::new(),
                    origin_buckets: HashMap::new(),
                    meta,
                    transport,
                    counters: counters_for_thread,
                };
                let ticker = crossbeam_channel::tick(Duration::from_nanos(BUCKET_DURATION_NS));

                loop {
                    select! {
                        recv(receiver) -> msg => match msg {
                            Ok(Command::AddPoint(point)) => state.add_point(point),
                            Ok(Command::AddOffset(offset)) => state.add_offset(offset),
                            Ok(Command::Flush) => state.flush(clock.now_ns()),
                            Ok(Command::Shutdown(ack)) => {
                                state.flush_everything();
                                let _ = ack.send(());
                                return;
                            }
                            Err(_) => {
                                // Sender dropped without a graceful shutdown: flush
                                // what we have and exit, best-effort.
                                state.flush_everything();
                                return;
                            }
                        },
                        recv(ticker) -> _ => state.flush(clock.now_ns()),
                    }
                }
            })
            .expect("failed to spawn aggregator thread");

        Self {
            sender: Some(sender),
            handle: Some(handle),
            counters,
        }
    }

    /// Enqueues a point. A no-op if the aggregator is disabled.
    pub fn add_point(&self, point: AggregatorPoint) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Command::AddPoint(point));
        }
    }

    /// Enqueues an offset snapshot. A no-op if the aggregator is disabled.
    pub fn add_offset(&self, offset: AggregatorOffset) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Command::AddOffset(offset));
        }
    }

    /// Requests an out-of-band flush, for tests and explicit callers.
    pub fn flush_now(&self) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Command::Flush);
        }
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Forces one final synchronous flush of every bucket (current and
    /// past alike) and joins the actor thread. A no-op if the aggregator
    /// was never started.
    pub fn shutdown(mut self) {
        if let Some(sender) = self.sender.take() {
            let (ack_tx, ack_rx) = bounded(1);
            if sender.send(Command::Shutdown(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
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

    fn enabled_config() -> Config {
        Config {
            service: "svc".to_string(),
            env: "test".to_string(),
            primary_tag: String::new(),
            agent: AgentConfig {
                enabled: true,
                host: "localhost".to_string(),
                port: 8126,
            },
        }
    }

    fn point(timestamp_ns: u64, pathway_latency_ns: u64, hash: u64) -> AggregatorPoint {
        AggregatorPoint {
            edge_tags: vec![],
            hash,
            parent_hash: 0,
            pathway_latency_ns,
            edge_latency_ns: pathway_latency_ns,
            timestamp_ns,
        }
    }

    #[test]
    fn golden_vector_bucket_placement() {
        let p = point(1_678_471_420_000_000_000, 10_000_000_000, 1);
        let current_key = align(p.timestamp_ns, BUCKET_DURATION_NS);
        let origin_key = align(p.timestamp_ns - p.pathway_latency_ns, BUCKET_DURATION_NS);
        assert_eq!(current_key, 1_678_471_420_000_000_000);
        assert_eq!(origin_key, 1_678_471_410_000_000_000);
    }

    #[test]
    fn golden_vector_offset_upsert_is_idempotent() {
        let mut bucket = Bucket::new(0);
        let offset = AggregatorOffset {
            offset: 13,
            timestamp_ns: 1_687_986_447_538_450_340,
            kind: OffsetType::Commit,
            tags: vec![
                Tag::new("consumer_group", "test-group"),
                Tag::new("partition", "0"),
                Tag::new("topic", "test-topic"),
                Tag::new("type", "kafka_commit"),
            ],
        };
        bucket.upsert_offset(offset.clone());
        bucket.upsert_offset(offset);
        assert_eq!(bucket.latest_commit_offsets.len(), 1);
    }

    #[test]
    fn encode_bucket_sorts_backlog_tags_by_key() {
        let mut bucket = Bucket::new(0);
        bucket.upsert_offset(AggregatorOffset {
            offset: 13,
            timestamp_ns: 0,
            kind: OffsetType::Commit,
            tags: vec![
                Tag::new("type", "kafka_commit"),
                Tag::new("consumer_group", "test-group"),
                Tag::new("topic", "test-topic"),
                Tag::new("partition", "0"),
            ],
        });
        let encoded = encode_bucket(bucket, TimestampType::Current);
        assert_eq!(
            encoded.backlogs[0].tags,
            vec![
                "consumer_group:test-group".to_string(),
                "partition:0".to_string(),
                "topic:test-topic".to_string(),
                "type:kafka_commit".to_string(),
            ]
        );
    }

    #[test]
    fn disabled_aggregator_accepts_and_discards() {
        let counters = Counters::new();
        let transport = RecordingTransport::new();
        let aggregator = Aggregator::spawn(&Config::default(), transport.clone(), counters);
        aggregator.add_point(point(0, 0, 1));
        aggregator.flush_now();
        aggregator.shutdown();
        assert_eq!(transport.count(), 0);
    }

    #[test]
    fn shutdown_flushes_buckets_that_have_not_aged_out() {
        let counters = Counters::new();
        let transport = RecordingTransport::new();
        let clock = FixedClock(std::sync::atomic::AtomicU64::new(1_000));
        let aggregator = Aggregator::spawn_with_clock(
            &enabled_config(),
            transport.clone(),
            counters,
            clock,
        );
        aggregator.add_point(point(1_000, 0, 1));
        aggregator.shutdown();
        assert_eq!(transport.count(), 1);
    }

    #[test]
    fn explicit_flush_drops_only_aged_out_buckets() {
        let counters = Counters::new();
        let transport = RecordingTransport::new();
        let clock = FixedClock(std::sync::atomic::AtomicU64::new(0));
        let aggregator = Aggregator::spawn_with_clock(
            &enabled_config(),
            transport.clone(),
            counters,
            clock,
        );
        // A bucket aligned at ns 0 is flushable once now >= D.
        aggregator.add_point(point(0, 0, 1));
        aggregator.flush_now();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(transport.count(), 0, "bucket has not aged out yet");
        aggregator.shutdown();
        assert_eq!(transport.count(), 1, "shutdown force-flushes everything");
    }
}
