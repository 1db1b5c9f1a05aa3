//! Pathway hashing, DDSketch, and time-bucketed aggregation.
//!
//! Measures end-to-end latency in asynchronous message pipelines: each
//! message derives a *pathway* (a chain of service hops), reporting per-hop
//! pathway and edge latency distributions plus optional queue offsets,
//! aggregated into fixed-width time windows and flushed periodically to a
//! collector over a delegated transport.

pub mod aggregator;
pub mod config;
pub mod dense_store;
pub mod fnv;
pub mod mapping;
pub mod pathway;
pub mod payload;
pub mod propagator;
pub mod sketch;
pub mod telemetry;

pub use aggregator::{Aggregator, Clock, NoopTransport, PipelineStatsTransport, SystemClock};
pub use config::{AgentConfig, Config};
pub use dense_store::DenseStore;
pub use mapping::{LogarithmicMapping, MappingError};
pub use pathway::{
    edge_tags, node_hash, pathway_hash, sorted_rendered_tags, AggregatorOffset, AggregatorPoint,
    OffsetType, Pathway, Tag,
};
pub use sketch::{DDSketch, SketchError};
pub use telemetry::{CounterSnapshot, Counters};
