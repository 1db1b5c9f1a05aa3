//! Flush payload encoding (component H).
//!
//! One MessagePack map per flush, six fixed-order top-level fields carrying
//! an array of stats buckets; each bucket embeds a hand-rolled Protobuf
//! encoding of the DDSketches it carries, per Datadog's public
//! `ddsketch.proto` schema. No `prost` dependency: the message shapes used
//! here are small and fixed, and nothing else in this workspace pulls in a
//! Protobuf codegen pipeline.

use crate::sketch::DDSketch;
use serde::Serialize;

/// Duration of every stats bucket: `10 * 10^9` ns.
pub const BUCKET_DURATION_NS: u64 = 10_000_000_000;

/// Top-level identity fields carried on every payload.
#[derive(Debug, Clone)]
pub struct PayloadMeta {
    pub env: String,
    pub service: String,
    pub primary_tag: String,
    pub tracer_version: String,
}

/// Which of the aggregator's two parallel bucket maps a point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampType {
    Current,
    Origin,
}

impl TimestampType {
    fn as_wire_str(self) -> &'static str {
        match self {
            TimestampType::Current => "current",
            TimestampType::Origin => "origin",
        }
    }
}

/// One group's contribution to a flushed bucket. The two sketches are
/// pre-encoded to Protobuf bytes by the caller (via [`encode_sketch`])
/// rather than borrowed, so a bucket's groups can be consumed and dropped
/// before the payload is assembled.
pub struct EncodedPoint {
    pub edge_tags: Vec<String>,
    pub hash: u64,
    pub parent_hash: u64,
    pub pathway_latency: Vec<u8>,
    pub edge_latency: Vec<u8>,
    pub timestamp_type: TimestampType,
}

/// One offset snapshot's contribution to a flushed bucket.
pub struct EncodedBacklog {
    pub tags: Vec<String>,
    pub value: i64,
}

/// One flushed bucket, ready for MessagePack encoding.
pub struct EncodedBucket {
    pub start_ns: u64,
    pub points: Vec<EncodedPoint>,
    pub backlogs: Vec<EncodedBacklog>,
}

#[derive(Serialize)]
struct WirePayload {
    #[serde(rename = "Env")]
    env: String,
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "PrimaryTag")]
    primary_tag: String,
    #[serde(rename = "Stats")]
    stats: Vec<WireStatsBucket>,
    #[serde(rename = "TracerVersion")]
    tracer_version: String,
    #[serde(rename = "Lang")]
    lang: String,
}

#[derive(Serialize)]
struct WireStatsBucket {
    #[serde(rename = "Start")]
    start: u64,
    #[serde(rename = "Duration")]
    duration: u64,
    #[serde(rename = "Stats")]
    stats: Vec<WireStatsPoint>,
    #[serde(rename = "Backlogs")]
    backlogs: Vec<WireBacklog>,
}

#[derive(Serialize)]
struct WireStatsPoint {
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "EdgeTags")]
    edge_tags: Vec<String>,
    #[serde(rename = "Hash")]
    hash: u64,
    #[serde(rename = "ParentHash")]
    parent_hash: u64,
    #[serde(rename = "PathwayLatency")]
    pathway_latency: serde_bytes::ByteBuf,
    #[serde(rename = "EdgeLatency")]
    edge_latency: serde_bytes::ByteBuf,
    #[serde(rename = "TimestampType")]
    timestamp_type: String,
}

#[derive(Serialize)]
struct WireBacklog {
    #[serde(rename = "Tags")]
    tags: Vec<String>,
    #[serde(rename = "Value")]
    value: i64,
}

/// Encodes one flush's worth of buckets as the fixed-field MessagePack
/// payload. Returns `None` if `buckets` is empty; an empty payload MUST
/// NOT be flushed.
pub fn encode_payload(meta: &PayloadMeta, buckets: Vec<EncodedBucket>) -> Option<Vec<u8>> {
    if buckets.is_empty() {
        return None;
    }

    let wire_buckets = buckets
        .into_iter()
        .map(|bucket| WireStatsBucket {
            start: bucket.start_ns,
            duration: BUCKET_DURATION_NS,
            stats: bucket
                .points
                .into_iter()
                .map(|point| WireStatsPoint {
                    service: String::new(),
                    edge_tags: point.edge_tags,
                    hash: point.hash,
                    parent_hash: point.parent_hash,
                    pathway_latency: serde_bytes::ByteBuf::from(point.pathway_latency),
                    edge_latency: serde_bytes::ByteBuf::from(point.edge_latency),
                    timestamp_type: point.timestamp_type.as_wire_str().to_string(),
                })
                .collect(),
            backlogs: bucket
                .backlogs
                .into_iter()
                .map(|b| WireBacklog {
                    tags: b.tags,
                    value: b.value,
                })
                .collect(),
        })
        .collect();

    let payload = WirePayload {
        env: meta.env.clone(),
        service: meta.service.clone(),
        primary_tag: meta.primary_tag.clone(),
        stats: wire_buckets,
        tracer_version: meta.tracer_version.clone(),
        lang: "Rust".to_string(),
    };

    let mut buf = Vec::new();
    let mut serializer = rmp_serde::Serializer::new(&mut buf).with_struct_map();
    payload
        .serialize(&mut serializer)
        .expect("payload encoding is infallible for owned in-memory data");
    Some(buf)
}

/// Encodes a DDSketch into Datadog's public DDSketch Protobuf wire format:
/// `{ mapping: {gamma, indexOffset, interpolation:NONE}, positiveValues,
/// negativeValues, zeroCount }`.
pub fn encode_sketch(sketch: &DDSketch) -> Vec<u8> {
    let mut buf = Vec::new();

    let mut mapping = Vec::new();
    protobuf::write_double_field(&mut mapping, 1, sketch.mapping().gamma());
    protobuf::write_double_field(&mut mapping, 2, sketch.mapping().index_offset());
    protobuf::write_embedded_message(&mut buf, 1, &mapping);

    let positive = encode_store(sketch.positive_store());
    protobuf::write_embedded_message(&mut buf, 2, &positive);

    let negative = encode_store(sketch.negative_store());
    protobuf::write_embedded_message(&mut buf, 3, &negative);

    protobuf::write_double_field(&mut buf, 4, sketch.zero_count());

    buf
}

fn encode_store(store: &crate::dense_store::DenseStore) -> Vec<u8> {
    let mut buf = Vec::new();
    let (bin_counts, offset) = store.to_wire();
    protobuf::write_packed_double_field(&mut buf, 2, &bin_counts);
    protobuf::write_int32_field(&mut buf, 3, offset);
    buf
}

mod protobuf {
    pub fn write_varint(buf: &mut Vec<u8>, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                buf.push(byte | 0x80);
            } else {
                buf.push(byte);
                break;
            }
        }
    }

    fn write_tag(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
        write_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
    }

    /// Proto3 scalar fields at their zero value are omitted from the wire.
    pub fn write_double_field(buf: &mut Vec<u8>, field: u32, v: f64) {
        if v == 0.0 {
            return;
        }
        write_tag(buf, field, 1);
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// `int32` fields are plain (non-zigzag) varints; negative values
    /// sign-extend to 64 bits before encoding, per the Protobuf wire spec.
    pub fn write_int32_field(buf: &mut Vec<u8>, field: u32, v: i32) {
        if v == 0 {
            return;
        }
        write_tag(buf, field, 0);
        write_varint(buf, (i64::from(v)) as u64);
    }

    pub fn write_packed_double_field(buf: &mut Vec<u8>, field: u32, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        write_tag(buf, field, 2);
        let mut inner = Vec::with_capacity(values.len() * 8);
        for v in values {
            inner.extend_from_slice(&v.to_le_bytes());
        }
        write_varint(buf, inner.len() as u64);
        buf.extend_from_slice(&inner);
    }

    pub fn write_embedded_message(buf: &mut Vec<u8>, field: u32, payload: &[u8]) {
        write_tag(buf, field, 2);
        write_varint(buf, payload.len() as u64);
        buf.extend_from_slice(payload);
    }
}
