//! HTTP/gzip transport.
//!
//! Blocking HTTP POST of an already gzip-compressed MessagePack payload to
//! the agent's pipeline-stats endpoint. No async runtime: the rest of this
//! workspace is synchronous end to end, and a single blocking POST per
//! flush (run off the aggregator's critical path by its own detached
//! flush task) needs nothing heavier.

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use streamtrace_core::aggregator::PipelineStatsTransport;

const PIPELINE_STATS_PATH: &str = "/v0.1/pipeline_stats";
const CONTAINER_ID_HEADER: &str = "Datadog-Container-ID";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to gzip-compress payload: {0}")]
    Compression(#[from] std::io::Error),
    #[error("agent request failed: {0}")]
    Request(String),
    #[error("agent returned a non-success status: {0}")]
    Status(u16),
}

/// Default `PipelineStatsTransport` implementation: POSTs a gzipped
/// MessagePack payload to the local trace agent.
pub struct HttpPipelineStatsTransport {
    agent: ureq::Agent,
    base_url: String,
    container_id: Option<String>,
    lang: &'static str,
    tracer_version: String,
}

impl HttpPipelineStatsTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_container_id(base_url, crate::discover_container_id())
    }

    pub fn with_container_id(base_url: impl Into<String>, container_id: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(2))
            .build();
        Self {
            agent,
            base_url: base_url.into(),
            container_id,
            lang: "rust",
            tracer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn gzip(body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body)?;
        Ok(encoder.finish()?)
    }

    fn post(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let compressed = Self::gzip(&bytes)?;
        let url = format!("{}{}", self.base_url, PIPELINE_STATS_PATH);

        let mut request = self
            .agent
            .post(&url)
            .set("Content-Type", "application/msgpack")
            .set("Content-Encoding", "gzip")
            .set("Datadog-Meta-Lang", self.lang)
            .set("Datadog-Meta-Tracer-Version", &self.tracer_version);

        if let Some(container_id) = &self.container_id {
            request = request.set(CONTAINER_ID_HEADER, container_id);
        }

        match request.send_bytes(&compressed) {
            Ok(response) => {
                let status = response.status();
                if (200..400).contains(&status) {
                    Ok(())
                } else {
                    Err(TransportError::Status(status))
                }
            }
            Err(ureq::Error::Status(status, _)) => Err(TransportError::Status(status)),
            Err(err) => Err(TransportError::Request(err.to_string())),
        }
    }
}

impl PipelineStatsTransport for HttpPipelineStatsTransport {
    fn send_pipeline_stats(&self, bytes: Vec<u8>) -> Result<(), String> {
        match self.post(bytes) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "pipeline stats POST failed");
                Err(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips_through_flate2_decoder() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let original = b"hello pipeline stats".to_vec();
        let compressed = HttpPipelineStatsTransport::gzip(&original).unwrap();
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, original);
    }
}
