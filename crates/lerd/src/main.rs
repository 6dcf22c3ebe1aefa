//! `lerd` entry point.
//!
//! Builds a small GoS MPLS domain, pushes IPv4 traffic through it and prints
//! the statistics of every LER as JSON.
//!
//! ```text
//!   S ── A ══ B ══ C ── R
//!        ╚═══ D ═══╝
//! ```
//!
//! `──` links are external, `══` internal. A is the ingress LER, C the
//! egress LER, D carries the backup LSP.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use serde_json::json;

use gosmpls_lerd::pdu::{GosOptions, Ipv4Header, Ipv4Pdu, Pdu};
use gosmpls_lerd::sim::Domain;
use gosmpls_lerd::{EventKind, EventLog, LerConfig};
use gosmpls_types::{GosLevel, Ipv4Address, LinkKind};

/// Active GoS MPLS Label Edge Router simulator
#[derive(Parser, Debug)]
#[command(name = "lerd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of simulation ticks
    #[arg(short = 't', long, default_value = "400")]
    ticks: u64,

    /// Duration of a tick in nanoseconds
    #[arg(short = 's', long, default_value = "10000")]
    step_ns: u64,

    /// Number of IPv4 packets sent by the source, one per tick
    #[arg(short = 'p', long, default_value = "50")]
    packets: u32,

    /// Payload of every packet in octets
    #[arg(long, default_value = "100")]
    payload: u32,

    /// GoS level of the traffic (0-3), plain IPv4 if unset
    #[arg(short = 'g', long)]
    gos_level: Option<u8>,

    /// Ask for a backup LSP for the GoS traffic
    #[arg(short = 'b', long)]
    backup: bool,

    /// Break the A-B link at this tick
    #[arg(long)]
    fail_link_at: Option<u64>,

    /// JSON configuration of the ingress LER
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

const SOURCE: Ipv4Address = Ipv4Address::new(10, 0, 0, 1);
const LER_A: Ipv4Address = Ipv4Address::new(10, 0, 1, 1);
const LER_B: Ipv4Address = Ipv4Address::new(10, 0, 1, 2);
const LER_C: Ipv4Address = Ipv4Address::new(10, 0, 1, 3);
const LER_D: Ipv4Address = Ipv4Address::new(10, 0, 1, 4);
const SINK: Ipv4Address = Ipv4Address::new(10, 0, 2, 1);

fn ingress_config(path: Option<&PathBuf>) -> Result<LerConfig> {
    let Some(path) = path else {
        return Ok(LerConfig::new("A", LER_A));
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = LerConfig::from_json(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?;
    if config.address != LER_A {
        bail!("the ingress LER must use address {}, got {}", LER_A, config.address);
    }
    Ok(config)
}

fn build_domain(args: &Args, events: Arc<EventLog>) -> Result<Domain> {
    let mut domain = Domain::new(events);
    domain.add_host("S", SOURCE)?;
    domain.add_host("R", SINK)?;
    domain.add_ler(ingress_config(args.config.as_ref())?)?;
    for (name, address) in [("B", LER_B), ("C", LER_C), ("D", LER_D)] {
        domain.add_ler(LerConfig::new(name, address))?;
    }

    domain.connect(SOURCE, LER_A, LinkKind::External)?;
    domain.connect(LER_A, LER_B, LinkKind::Internal)?;
    domain.connect(LER_B, LER_C, LinkKind::Internal)?;
    domain.connect(LER_C, SINK, LinkKind::External)?;
    domain.connect(LER_A, LER_D, LinkKind::Internal)?;
    domain.connect(LER_D, LER_C, LinkKind::Internal)?;
    Ok(domain)
}

fn packet(args: &Args, seq: u32) -> Result<Pdu> {
    let mut header = Ipv4Header::new(SOURCE, SINK);
    if let Some(level) = args.gos_level {
        let level = GosLevel::new(level, args.backup)?;
        header = header.with_gos(GosOptions::new(level, 1, seq));
    }
    Ok(Ipv4Pdu::new(u64::from(seq), header, args.payload).into())
}

async fn run(args: Args, stop: Arc<AtomicBool>) -> Result<()> {
    let events = Arc::new(EventLog::new());
    let mut domain = build_domain(&args, events.clone())?;
    let primary = domain.link(LER_A, LER_B).context("link A-B missing")?;

    let mut delivered = 0usize;
    let mut sent = 0u32;
    for tick in 0..args.ticks {
        if stop.load(Ordering::SeqCst) {
            warn!("interrupted at tick {}", tick);
            break;
        }
        if Some(tick) == args.fail_link_at {
            info!("breaking link A-B at tick {}", tick);
            primary.set_broken(true);
        }
        if sent < args.packets {
            sent += 1;
            domain.inject(SOURCE, packet(&args, sent)?)?;
        }
        domain.tick(args.step_ns).await;
        delivered += domain.received(SINK)?.len();
    }

    let mut nodes = serde_json::Map::new();
    for handle in domain.nodes() {
        let node = handle.lock();
        nodes.insert(
            node.name().to_string(),
            json!({
                "address": node.address(),
                "entries": node.switching_table().len(),
                "stats": node.stats().snapshot(),
            }),
        );
    }
    let report = json!({
        "instant_ns": domain.instant(),
        "packets_sent": sent,
        "packets_delivered": delivered,
        "labels_removed": events.count(|k| *k == EventKind::LabelRemoved),
        "nodes": nodes,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("====================================================================");
    info!("Starting lerd");
    info!("====================================================================");
    info!("Ticks: {} x {} ns", args.ticks, args.step_ns);
    info!("Packets: {} x {} octets", args.packets, args.payload);
    if let Some(level) = args.gos_level {
        info!("GoS level: {}{}", level, if args.backup { " with backup LSP" } else { "" });
    }
    if let Some(tick) = args.fail_link_at {
        info!("Link A-B fails at tick {}", tick);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let shutdown_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT, stopping the simulation...");
                stop_flag.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                error!("Failed to listen for ctrl-c: {}", err);
            }
        }
    });

    let result = run(args, stop).await;
    shutdown_handle.abort();

    match result {
        Ok(()) => {
            info!("lerd finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("lerd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
