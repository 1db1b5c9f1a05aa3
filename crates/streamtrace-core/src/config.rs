//! Runtime configuration.
//!
//! Plain, dependency-free struct with the documented defaults and an
//! environment-variable loader. No config-file or CLI binding lives here;
//! that surface belongs to the harness binary.

/// Agent connectivity settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 8126,
        }
    }
}

impl AgentConfig {
    /// Base URL for the transport collaborator, e.g. `http://localhost:8126`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Top-level configuration feeding the node hash and gating the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub service: String,
    pub env: String,
    pub primary_tag: String,
    pub agent: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: "unnamed-rust-service".to_string(),
            env: String::new(),
            primary_tag: String::new(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable:
    ///
    /// - `STREAMTRACE_SERVICE`, `STREAMTRACE_ENV`, `STREAMTRACE_PRIMARY_TAG`
    /// - `STREAMTRACE_AGENT_ENABLED` (`"true"`/`"1"` → enabled)
    /// - `STREAMTRACE_AGENT_HOST`, `STREAMTRACE_AGENT_PORT`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("STREAMTRACE_SERVICE") {
            config.service = v;
        }
        if let Ok(v) = std::env::var("STREAMTRACE_ENV") {
            config.env = v;
        }
        if let Ok(v) = std::env::var("STREAMTRACE_PRIMARY_TAG") {
            config.primary_tag = v;
        }
        if let Ok(v) = std::env::var("STREAMTRACE_AGENT_ENABLED") {
            config.agent.enabled = matches!(v.as_str(), "true" | "1" | "yes");
        }
        if let Ok(v) = std::env::var("STREAMTRACE_AGENT_HOST") {
            config.agent.host = v;
        }
        if let Ok(v) = std::env::var("STREAMTRACE_AGENT_PORT") {
            if let Ok(port) = v.parse() {
                config.agent.port = port;
            }
        }

        config
    }
}
