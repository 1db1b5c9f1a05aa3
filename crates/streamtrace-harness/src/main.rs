//! CLI entrypoint for the streamtrace demo/integration harness.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use streamtrace_core::aggregator::{Aggregator, NoopTransport};
use streamtrace_core::config::Config;
use streamtrace_core::pathway::{Pathway, Tag};
use streamtrace_core::propagator;
use streamtrace_core::telemetry::Counters;
use streamtrace_transport::HttpPipelineStatsTransport;

/// Demo/integration harness for streamtrace.
#[derive(Debug, Parser)]
#[command(name = "streamtrace-harness")]
#[command(about = "Exercises the streamtrace pathway/aggregator pipeline end to end")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Checkpoint a scripted chain of service hops, let the aggregator
    /// flush, and print what would be sent to the agent.
    Simulate {
        /// Number of hops in the simulated pathway chain.
        #[arg(long, default_value_t = 3)]
        hops: u32,
        /// Milliseconds of (fake) latency injected between hops.
        #[arg(long, default_value_t = 50)]
        hop_latency_ms: u64,
        /// Send to a real agent instead of discarding the payload.
        #[arg(long)]
        live: bool,
    },
    /// Encode a pathway and print its binary/base64 header forms.
    EncodeContext {
        #[arg(long, default_value_t = 0)]
        hash: u64,
        #[arg(long)]
        pathway_start_ns: u64,
        #[arg(long)]
        edge_start_ns: u64,
    },
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the epoch")
        .as_nanos() as u64
}

fn run_simulate(hops: u32, hop_latency_ms: u64, live: bool) {
    let mut config = Config::from_env();
    config.agent.enabled = true;

    let counters = Counters::new();
    let transport: Arc<dyn streamtrace_core::aggregator::PipelineStatsTransport> = if live {
        Arc::new(HttpPipelineStatsTransport::new(config.agent.base_url()))
    } else {
        Arc::new(NoopTransport)
    };

    let aggregator = Aggregator::spawn(&config, transport, counters.clone());

    let mut pathway = Pathway::empty();
    let mut t = now_ns();
    for hop in 0..hops {
        let tags = vec![Tag::new("type", "kafka"), Tag::new("topic", "orders")];
        let (next, point) = pathway.checkpoint(
            &format!("service-{hop}"),
            &config.env,
            &config.primary_tag,
            &tags,
            t,
        );
        tracing::info!(hop, hash = next.hash, "checkpointed pathway");
        aggregator.add_point(point);
        pathway = next;
        t += hop_latency_ms * 1_000_000;
    }

    aggregator.flush_now();
    std::thread::sleep(Duration::from_millis(100));
    aggregator.shutdown();

    let snapshot = counters.snapshot();
    let rendered =
        serde_json::to_string_pretty(&snapshot).expect("counter snapshot is always serializable");
    println!("{rendered}");
}

fn run_encode_context(hash: u64, pathway_start_ns: u64, edge_start_ns: u64) {
    let pathway = Pathway {
        hash,
        pathway_start_ns,
        edge_start_ns,
    };
    let binary = propagator::encode(&pathway);
    println!("binary: {}", hex_string(&binary));
    println!("base64: {}", propagator::encode_str(&pathway));
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate {
            hops,
            hop_latency_ms,
            live,
        } => run_simulate(hops, hop_latency_ms, live),
        Command::EncodeContext {
            hash,
            pathway_start_ns,
            edge_start_ns,
        } => run_encode_context(hash, pathway_start_ns, edge_start_ns),
    }
}
