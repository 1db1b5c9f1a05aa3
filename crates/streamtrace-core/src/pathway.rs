//! Pathway model and hashing (component E).
//!
//! A pathway identifies one node in the directed graph of service hops a
//! message travels through. Hashes are derived with FNV-1 over the node's
//! service/env/primary-tag identity plus a canonicalized slice of its tags;
//! checkpointing folds a node hash into the parent pathway hash to produce
//! the next link in the chain.

use crate::fnv::fnv1_64;
use rand::seq::SliceRandom;

/// Tag keys carried through to the wire as `EdgeTags`.
const EDGE_TAG_KEYS: &[&str] = &["type", "direction", "topic", "partition", "group", "exchange"];

/// Tag keys that participate in node hashing, a subset of the edge tags.
const HASHABLE_TAG_KEYS: &[&str] = &["group", "type", "direction", "topic", "exchange"];

/// A `(key, value)` pair of short UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn rendered(&self) -> String {
        format!("{}:{}", self.key, self.value)
    }

    fn is_edge_tag(&self) -> bool {
        EDGE_TAG_KEYS.contains(&self.key.as_str())
    }

    fn is_hashable_tag(&self) -> bool {
        HASHABLE_TAG_KEYS.contains(&self.key.as_str())
    }
}

/// Keeps only tags recognized as edge tags, in original order.
pub fn edge_tags(tags: &[Tag]) -> Vec<Tag> {
    tags.iter().filter(|t| t.is_edge_tag()).cloned().collect()
}

/// Renders edge tags as `"k:v"` strings sorted by key, the form carried on
/// the wire in `StatsPoint.EdgeTags`.
pub fn sorted_rendered_tags(tags: &[Tag]) -> Vec<String> {
    let mut kept: Vec<&Tag> = tags.iter().filter(|t| t.is_edge_tag()).collect();
    kept.sort_by(|a, b| a.key.cmp(&b.key));
    kept.into_iter().map(Tag::rendered).collect()
}

/// Computes the node hash for `(service, env, primary_tag, tags)`.
///
/// Only hashable tags survive; they are sorted by key, rendered `"k:v"`,
/// and concatenated with no separator after `service`, `env`, and
/// `primary_tag`, then FNV-1 hashed. The result does not depend on the
/// input tag order.
pub fn node_hash(service: &str, env: &str, primary_tag: &str, tags: &[Tag]) -> u64 {
    let mut kept: Vec<&Tag> = tags.iter().filter(|t| t.is_hashable_tag()).collect();
    kept.sort_by(|a, b| a.key.cmp(&b.key));

    let mut buf = String::new();
    buf.push_str(service);
    buf.push_str(env);
    buf.push_str(primary_tag);
    for tag in kept {
        buf.push_str(&tag.rendered());
    }
    fnv1_64(buf.as_bytes())
}

/// Folds `node_hash` into `parent_hash`: FNV-1 over 16 little-endian bytes,
/// `node_hash` then `parent_hash`, each zero-padded to 8 bytes.
pub fn pathway_hash(node_hash: u64, parent_hash: u64) -> u64 {
    let mut buf = [0u8; 16];
    buf[0..8].copy_from_slice(&node_hash.to_le_bytes());
    buf[8..16].copy_from_slice(&parent_hash.to_le_bytes());
    fnv1_64(&buf)
}

/// Immutable identity of one node in the service-hop graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pathway {
    pub hash: u64,
    pub pathway_start_ns: u64,
    pub edge_start_ns: u64,
}

impl Pathway {
    /// The empty pathway: all fields zero, used as the implicit parent of
    /// the first checkpoint in a call context.
    pub const fn empty() -> Self {
        Self {
            hash: 0,
            pathway_start_ns: 0,
            edge_start_ns: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Picks one pathway from a list of candidates to continue from,
    /// tolerating the caller-visible "merge" API. `merge(&[]) = empty`,
    /// `merge(&[p]) = p`, otherwise a uniformly random element; callers
    /// MUST tolerate this non-deterministic policy.
    pub fn merge(pathways: &[Pathway]) -> Pathway {
        match pathways {
            [] => Pathway::empty(),
            [only] => *only,
            many => *many.choose(&mut rand::thread_rng()).expect("non-empty slice"),
        }
    }

    /// Advances this pathway by one hop, producing the next pathway and the
    /// point to feed into the aggregator.
    pub fn checkpoint(
        &self,
        service: &str,
        env: &str,
        primary_tag: &str,
        tags: &[Tag],
        now_ns: u64,
    ) -> (Pathway, AggregatorPoint) {
        let prev = if self.is_empty() {
            Pathway {
                hash: 0,
                pathway_start_ns: now_ns,
                edge_start_ns: now_ns,
            }
        } else {
            *self
        };

        let node = node_hash(service, env, primary_tag, tags);
        let next = Pathway {
            hash: pathway_hash(node, prev.hash),
            pathway_start_ns: prev.pathway_start_ns,
            edge_start_ns: now_ns,
        };

        let point = AggregatorPoint {
            edge_tags: edge_tags(tags),
            hash: next.hash,
            parent_hash: prev.hash,
            pathway_latency_ns: now_ns.saturating_sub(prev.pathway_start_ns),
            edge_latency_ns: now_ns.saturating_sub(prev.edge_start_ns),
            timestamp_ns: prev.pathway_start_ns,
        };

        (next, point)
    }
}

impl Default for Pathway {
    fn default() -> Self {
        Self::empty()
    }
}

/// One latency observation destined for the aggregator.
///
/// `timestamp_ns` equals the pathway's `pathway_start_ns`, not wall-clock at
/// checkpoint time, so the origin-bucket key is computable from the point
/// alone.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorPoint {
    pub edge_tags: Vec<Tag>,
    pub hash: u64,
    pub parent_hash: u64,
    pub pathway_latency_ns: u64,
    pub edge_latency_ns: u64,
    pub timestamp_ns: u64,
}

/// The type of a broker-side offset snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetType {
    Commit,
    Produce,
}

/// A broker-side queue position snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorOffset {
    pub offset: i64,
    pub timestamp_ns: u64,
    pub kind: OffsetType,
    pub tags: Vec<Tag>,
}

impl AggregatorOffset {
    /// Canonical form of `tags` for equality/upsert comparisons: sorted by
    /// key then value so two differently ordered tag maps with identical
    /// content compare equal.
    pub fn canonical_tags(&self) -> Vec<(&str, &str)> {
        let mut rendered: Vec<(&str, &str)> = self
            .tags
            .iter()
            .map(|t| (t.key.as_str(), t.value.as_str()))
            .collect();
        rendered.sort_unstable();
        rendered
    }
}
