//! OctoSketch DDoS detection core — binary entry point.
//!
//! Parses the CLI surface, assembles an
//! [`ddos_engine::EngineConfig`], pins and spawns one worker thread
//! per RX queue plus a single coordinator thread, and blocks the
//! main thread until shutdown is requested.
//!
//! # Usage
//!
//! ```bash
//! octosketch --worker-cores 1,2,3 --coordinator-core 0 \
//!     --baseline-cidr 10.0.0.0/8 --attack-cidr 203.0.113.0/24 \
//!     --fast-tick-ms 50 --stats-tick-ms 5000
//! ```

mod settings;

use clap::Parser;
use ddos_common::net::{parse_cidr, ServerPortSet};
use ddos_common::{AppError, AppResult};
use ddos_detect::{NoopPredictor, Predictor, RuleThresholds, ThresholdPredictor};
use ddos_engine::{Coordinator, EngineConfig, DemoPacketSource, NullPacketSource, PacketSource, Worker};
use settings::Settings;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "octosketch")]
#[command(author = "OctoSketch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Line-rate DDoS detection core: sketch-based per-IP frequency estimation with sub-50ms alerting")]
struct Cli {
    /// Optional TOML settings file; CLI flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// NIC port identifier.
    #[arg(long)]
    port: Option<u16>,

    /// NIC PCI address (opaque to the core; forwarded to the packet-source binding).
    #[arg(long)]
    nic_pci: Option<String>,

    /// Comma-separated list of worker core IDs; one RX queue per entry.
    #[arg(long, value_delimiter = ',')]
    worker_cores: Option<Vec<usize>>,

    /// Coordinator thread's core ID.
    #[arg(long)]
    coordinator_core: Option<usize>,

    /// Comma-separated baseline-network CIDRs.
    #[arg(long, value_delimiter = ',')]
    baseline_cidr: Option<Vec<String>>,

    /// Comma-separated attack-network CIDRs.
    #[arg(long, value_delimiter = ',')]
    attack_cidr: Option<Vec<String>>,

    /// Comma-separated destination ports treated as "server" ports for bytes-in/out direction.
    #[arg(long, value_delimiter = ',')]
    server_ports: Option<Vec<u16>>,

    /// Fast (detection) tick period, in milliseconds.
    #[arg(long)]
    fast_tick_ms: Option<u64>,

    /// Slow (statistics report) tick period, in milliseconds.
    #[arg(long)]
    stats_tick_ms: Option<u64>,

    /// Sketch-update sampling factor S (1 in S packets updates the sketch).
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Sketch depth D, number of independent hash rows (4-8).
    #[arg(long)]
    sketch_depth: Option<usize>,

    /// Sketch width W, buckets per row (must be a power of two).
    #[arg(long)]
    sketch_width: Option<usize>,

    /// Path to a JSON-encoded `ThresholdPredictor` weights file.
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Optional log file; stdout is always written to regardless.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Drive the engine from a synthetic demo traffic generator
    /// instead of a real packet source, since this workspace has no
    /// hardware NIC binding; this is how `octosketch` is run end to
    /// end without one.
    #[arg(long)]
    demo: bool,

    /// Demo-mode only: fraction of generated packets sourced from the
    /// attack CIDR, in [0, 1].
    #[arg(long, default_value_t = 0.1)]
    demo_attack_weight: f64,

    /// R1 amplification rule: bytes-out/bytes-in ratio threshold.
    #[arg(long)]
    amplification_threshold: Option<f64>,

    /// R1: minimum attack-class share of window packets.
    #[arg(long)]
    attack_ratio_min: Option<f64>,

    /// R1: minimum window packet count before amplification is considered.
    #[arg(long)]
    min_packets: Option<u64>,

    /// R2: per-attack-IP UDP PPS threshold.
    #[arg(long)]
    udp_per_ip_pps: Option<f64>,

    /// R3: per-attack-IP TCP-SYN PPS threshold.
    #[arg(long)]
    syn_per_ip_pps: Option<f64>,

    /// R4: per-attack-IP ICMP PPS threshold.
    #[arg(long)]
    icmp_per_ip_pps: Option<f64>,

    /// R5: per-attack-IP HTTP-indicator PPS threshold.
    #[arg(long)]
    http_per_ip_pps: Option<f64>,

    /// R6: sketched in-window count above which an attack-IP counts as a heavy hitter.
    #[arg(long)]
    heavy_hitter_threshold: Option<u32>,

    /// R6: number of heavy-hitter attack-IPs that must be exceeded to fire.
    #[arg(long)]
    heavy_hitter_ip_limit: Option<usize>,

    /// R7: per-baseline-IP UDP PPS threshold.
    #[arg(long)]
    baseline_udp_per_ip_pps: Option<f64>,

    /// R8: burst count threshold within a sub-window.
    #[arg(long)]
    burst_threshold: Option<u32>,

    /// R8: sub-window width, in milliseconds.
    #[arg(long)]
    burst_sub_window_ms: Option<u64>,
}

/// Resolve the final engine configuration: settings file, then CLI
/// flag overrides, then hardcoded defaults — exactly the precedence
/// order a typed settings surface usually wants: file values, then
/// flag overrides, then hardcoded defaults.
fn resolve_config(cli: &Cli, file: &Settings) -> AppResult<EngineConfig> {
    let defaults = EngineConfig::default();

    let worker_cores = cli.worker_cores.clone().or_else(|| file.worker_cores.clone()).unwrap_or(defaults.worker_cores);
    if worker_cores.is_empty() {
        return Err(AppError::Config("at least one worker core must be configured".into()));
    }

    let baseline_cidr_strs = cli.baseline_cidr.clone().or_else(|| file.baseline_cidr.clone()).unwrap_or_default();
    let attack_cidr_strs = cli.attack_cidr.clone().or_else(|| file.attack_cidr.clone()).unwrap_or_default();

    let baseline_cidrs = baseline_cidr_strs.iter().map(|s| parse_cidr(s)).collect::<Result<Vec<_>, _>>().map_err(AppError::Config)?;
    let attack_cidrs = attack_cidr_strs.iter().map(|s| parse_cidr(s)).collect::<Result<Vec<_>, _>>().map_err(AppError::Config)?;

    let sketch_depth = cli.sketch_depth.or(file.sketch_depth).unwrap_or(defaults.sketch_depth);
    if !(ddos_sketch::MIN_DEPTH..=ddos_sketch::MAX_DEPTH).contains(&sketch_depth) {
        return Err(AppError::Config(format!("sketch depth must be in [{}, {}], got {sketch_depth}", ddos_sketch::MIN_DEPTH, ddos_sketch::MAX_DEPTH)));
    }
    let sketch_width = cli.sketch_width.or(file.sketch_width).unwrap_or(defaults.sketch_width);
    if !sketch_width.is_power_of_two() {
        return Err(AppError::Config(format!("sketch width must be a power of two, got {sketch_width}")));
    }

    Ok(EngineConfig {
        port_id: cli.port.or(file.port).unwrap_or(defaults.port_id),
        nic_pci_address: cli.nic_pci.clone().or_else(|| file.nic_pci.clone()).unwrap_or(defaults.nic_pci_address),
        worker_cores,
        coordinator_core: cli.coordinator_core.or(file.coordinator_core).unwrap_or(defaults.coordinator_core),
        baseline_cidrs,
        attack_cidrs,
        server_ports: cli
            .server_ports
            .clone()
            .or_else(|| file.server_ports.clone())
            .map(ServerPortSet::new)
            .unwrap_or(defaults.server_ports),
        fast_tick: Duration::from_millis(cli.fast_tick_ms.or(file.fast_tick_ms).unwrap_or(defaults.fast_tick.as_millis() as u64)),
        stats_tick: Duration::from_millis(cli.stats_tick_ms.or(file.stats_tick_ms).unwrap_or(defaults.stats_tick.as_millis() as u64)),
        sample_rate: cli.sample_rate.or(file.sample_rate).unwrap_or(defaults.sample_rate),
        sketch_depth,
        sketch_width,
        heavy_hitter_k: defaults.heavy_hitter_k,
        model_path: cli.model_path.clone().or_else(|| file.model_path.clone().map(PathBuf::from)),
        log_file: cli.log_file.clone().or_else(|| file.log_file.clone().map(PathBuf::from)),
    })
}

/// Resolve the rule-engine threshold table: CLI flags, then the
/// settings file, then [`RuleThresholds::default`] — the same
/// file-then-flag-then-default precedence [`resolve_config`] uses for
/// the rest of the configuration surface.
fn resolve_thresholds(cli: &Cli, file: &Settings) -> RuleThresholds {
    let defaults = RuleThresholds::default();
    RuleThresholds {
        amplification_threshold: cli.amplification_threshold.or(file.amplification_threshold).unwrap_or(defaults.amplification_threshold),
        attack_ratio_min: cli.attack_ratio_min.or(file.attack_ratio_min).unwrap_or(defaults.attack_ratio_min),
        min_packets: cli.min_packets.or(file.min_packets).unwrap_or(defaults.min_packets),
        udp_per_ip_pps: cli.udp_per_ip_pps.or(file.udp_per_ip_pps).unwrap_or(defaults.udp_per_ip_pps),
        syn_per_ip_pps: cli.syn_per_ip_pps.or(file.syn_per_ip_pps).unwrap_or(defaults.syn_per_ip_pps),
        icmp_per_ip_pps: cli.icmp_per_ip_pps.or(file.icmp_per_ip_pps).unwrap_or(defaults.icmp_per_ip_pps),
        http_per_ip_pps: cli.http_per_ip_pps.or(file.http_per_ip_pps).unwrap_or(defaults.http_per_ip_pps),
        heavy_hitter_threshold: cli.heavy_hitter_threshold.or(file.heavy_hitter_threshold).unwrap_or(defaults.heavy_hitter_threshold),
        heavy_hitter_ip_limit: cli.heavy_hitter_ip_limit.or(file.heavy_hitter_ip_limit).unwrap_or(defaults.heavy_hitter_ip_limit),
        baseline_udp_per_ip_pps: cli.baseline_udp_per_ip_pps.or(file.baseline_udp_per_ip_pps).unwrap_or(defaults.baseline_udp_per_ip_pps),
        burst_threshold: cli.burst_threshold.or(file.burst_threshold).unwrap_or(defaults.burst_threshold),
        burst_sub_window_ms: cli.burst_sub_window_ms.or(file.burst_sub_window_ms).unwrap_or(defaults.burst_sub_window_ms),
    }
}

/// Load the optional ML predictor. The absence of a model path
/// degenerates to [`NoopPredictor`] so the coordinator's
/// `Option<Box<dyn Predictor>>` is unconditionally `Some`.
fn load_predictor(model_path: Option<&std::path::Path>) -> AppResult<Box<dyn Predictor>> {
    match model_path {
        None => Ok(Box::new(NoopPredictor)),
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let weights: ThresholdPredictorWeights =
                serde_json::from_str(&content).map_err(|e| AppError::ModelLoad(format!("{}: {e}", path.display())))?;
            Ok(Box::new(ThresholdPredictor::new(weights.weights, weights.bias, weights.confidence_floor)))
        }
    }
}

#[derive(serde::Deserialize)]
struct ThresholdPredictorWeights {
    weights: Vec<f64>,
    bias: f64,
    confidence_floor: f64,
}

/// Pin the calling thread to `core_id` if the platform reports that
/// core as available; an unavailable core is a fatal startup error
/// (an unavailable core cannot be silently skipped: the caller asked
/// for a specific placement).
fn pin_current_thread(core_id: usize, available: &[core_affinity::CoreId]) -> AppResult<()> {
    let target = available.iter().find(|c| c.id == core_id).copied();
    match target {
        Some(core) => {
            if core_affinity::set_for_current(core) {
                Ok(())
            } else {
                Err(AppError::CoreAffinity { core: core_id, reason: "core_affinity::set_for_current returned false".into() })
            }
        }
        None => Err(AppError::CoreAffinity { core: core_id, reason: "core not reported by the platform".into() }),
    }
}

fn run() -> AppResult<()> {
    let cli = Cli::parse();

    let file_settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let config = resolve_config(&cli, &file_settings)?;
    let thresholds = resolve_thresholds(&cli, &file_settings);

    let _log_guard = ddos_common::init_logging(config.log_file.as_deref());
    tracing::info!(?config.worker_cores, coordinator_core = config.coordinator_core, "octosketch starting");

    let available_cores = core_affinity::get_core_ids().unwrap_or_default();
    let all_cores = std::iter::once(config.coordinator_core).chain(config.worker_cores.iter().copied());
    for core in all_cores {
        if !available_cores.iter().any(|c| c.id == core) {
            return Err(AppError::CoreAffinity { core, reason: "core not reported by the platform".into() });
        }
    }

    let predictor = load_predictor(config.model_path.as_deref())?;

    let counters = Arc::new(ddos_common::AggregateCounters::new());
    let window_clock = Arc::new(ddos_common::WindowClock::new());
    let first_attack_tsc = Arc::new(ddos_classify::FirstAttackTsc::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            tracing::info!("shutdown signal received");
            shutdown.store(true, Ordering::Relaxed);
        })
        .map_err(|e| AppError::Config(format!("failed to install signal handler: {e}")))?;
    }

    let shards: Vec<Arc<ddos_sketch::Shard>> = config
        .worker_cores
        .iter()
        .enumerate()
        .map(|(i, _)| Arc::new(ddos_sketch::Shard::new(format!("worker-{i}"), config.sketch_depth, config.sketch_width)))
        .collect();

    let prefixes = config.prefix_set();
    let demo_dst_ip = Ipv4Addr::new(198, 51, 100, 1);
    let baseline_net = config.baseline_cidrs.first().copied().unwrap_or_else(|| "10.0.0.0/8".parse().unwrap());
    let attack_net = config.attack_cidrs.first().copied().unwrap_or_else(|| "203.0.113.0/24".parse().unwrap());
    let demo_server_port = config.server_ports.first().unwrap_or(80);

    let mut worker_handles = Vec::with_capacity(config.worker_cores.len());
    for (worker_id, &core) in config.worker_cores.iter().enumerate() {
        let shard = Arc::clone(&shards[worker_id]);
        let counters = Arc::clone(&counters);
        let window_clock = Arc::clone(&window_clock);
        let first_attack_tsc = Arc::clone(&first_attack_tsc);
        let shutdown = Arc::clone(&shutdown);
        let classifier = ddos_classify::Classifier::new(prefixes.clone(), config.server_ports.clone(), config.sample_rate);
        let available_cores = available_cores.clone();

        let demo = cli.demo;
        let demo_attack_weight = cli.demo_attack_weight;

        let handle = std::thread::Builder::new()
            .name(format!("octosketch-worker-{worker_id}"))
            .spawn(move || {
                if let Err(e) = pin_current_thread(core, &available_cores) {
                    tracing::error!(worker_id, error = %e, "worker failed to pin to its configured core");
                    return;
                }

                if demo {
                    let source =
                        DemoPacketSource::new(worker_id as u64, baseline_net, attack_net, demo_dst_ip, demo_server_port, 64, demo_attack_weight);
                    run_worker(worker_id, core, source, classifier, shard, counters, first_attack_tsc, window_clock, shutdown);
                } else {
                    let source = NullPacketSource;
                    run_worker(worker_id, core, source, classifier, shard, counters, first_attack_tsc, window_clock, shutdown);
                }
            })
            .map_err(AppError::Io)?;
        worker_handles.push(handle);
    }

    let nic_drops: Arc<dyn Fn() -> u64 + Send + Sync> = Arc::new(|| 0u64);
    let coordinator = Coordinator::new(
        shards,
        Arc::clone(&counters),
        Arc::clone(&window_clock),
        Arc::clone(&first_attack_tsc),
        nic_drops,
        config.sketch_depth,
        config.sketch_width,
        config.heavy_hitter_k,
        thresholds,
        Some(predictor),
        config.fast_tick,
        config.stats_tick,
        Arc::clone(&shutdown),
    );

    let coordinator_core = config.coordinator_core;
    let available_cores_for_coordinator = available_cores.clone();
    let coordinator_handle = std::thread::Builder::new()
        .name("octosketch-coordinator".into())
        .spawn(move || {
            if let Err(e) = pin_current_thread(coordinator_core, &available_cores_for_coordinator) {
                tracing::error!(error = %e, "coordinator failed to pin to its configured core");
                return;
            }
            coordinator.run();
        })
        .map_err(AppError::Io)?;

    for handle in worker_handles {
        let _ = handle.join();
    }
    let _ = coordinator_handle.join();

    tracing::info!("octosketch stopped cleanly");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_worker<S: PacketSource>(
    worker_id: usize,
    queue: usize,
    source: S,
    classifier: ddos_classify::Classifier,
    shard: Arc<ddos_sketch::Shard>,
    counters: Arc<ddos_common::AggregateCounters>,
    first_attack_tsc: Arc<ddos_classify::FirstAttackTsc>,
    window_clock: Arc<ddos_common::WindowClock>,
    shutdown: Arc<AtomicBool>,
) {
    let worker = Worker::new(worker_id, queue, source, classifier, shard, counters, first_attack_tsc, window_clock, shutdown);
    worker.run();
}

fn main() {
    if let Err(err) = run() {
        eprintln!("octosketch: {err}");
        std::process::exit(err.exit_code());
    }
}
