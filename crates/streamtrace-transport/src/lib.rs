//! External collaborators for streamtrace-core: HTTP/gzip transport,
//! container-id discovery, and tag parsing.
//!
//! This crate is deliberately downstream of `streamtrace-core`: the core
//! crate's tests never exercise it directly, they only need to satisfy the
//! trait surface it calls against.

pub mod container_id;
pub mod tags;
pub mod transport;

pub use container_id::discover_container_id;
pub use tags::{parse_tag, parse_tags};
pub use transport::{HttpPipelineStatsTransport, TransportError};
