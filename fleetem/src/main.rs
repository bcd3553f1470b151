//! Operator CLI: compile the selected topology into per-host shaping plans
//! and drive them across the inventory.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use fleetem_exec::{FleetExecutor, HostJob, HostRegistry, SshTransport};
use fleetem_tc::{DevicePrep, PlanCompiler, PlanMode, Rate};
use fleetem_topo::{
    build_matrix, PriorityAssignment, RegionSet, Topology, TopologyConfig, BASE_BAND,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Install the shaping hierarchy on every host.
    Apply,
    /// Tear the shaping hierarchy down (safe to re-issue).
    Remove,
}

impl Mode {
    fn plan_mode(self) -> PlanMode {
        match self {
            Self::Apply => PlanMode::Apply,
            Self::Remove => PlanMode::Remove,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TopologyArg {
    /// Uniform small latency on every link.
    Baseline,
    /// One slow link between regions 0 and 1.
    SingleLink,
    /// The hand-measured table (four- or seven-region layout).
    Measured,
    /// Every link slow, diagonal included.
    UniformHigh,
    /// The last two regions joined by a slow link.
    Edge,
    /// Round-robin tournament of distinct per-round latencies.
    Tournament,
    /// The last region slow towards everyone.
    IsolatedNode,
}

impl TopologyArg {
    fn topology(self) -> Topology {
        match self {
            Self::Baseline => Topology::Baseline,
            Self::SingleLink => Topology::SingleLink,
            Self::Measured => Topology::Measured,
            Self::UniformHigh => Topology::UniformHigh,
            Self::Edge => Topology::EdgeLink,
            Self::Tournament => Topology::Tournament,
            Self::IsolatedNode => Topology::IsolatedNode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PathArg {
    /// HTB + netem delay/jitter/loss on an ingress-mirrored IFB device.
    Latency,
    /// Strict-priority bands derived from each host's latency row.
    Priority,
    /// A uniform bandwidth cap shared by all flows on the device.
    Bandwidth,
}

#[derive(Debug, Parser)]
#[command(name = "fleetem", version, about = "Fleet-wide WAN emulation via remote traffic shaping")]
struct Args {
    /// Apply or remove the shaping configuration.
    #[arg(value_enum)]
    mode: Mode,

    /// Topology mode deriving the latency matrix.
    #[arg(long, value_enum, default_value = "baseline")]
    topology: TopologyArg,

    /// Which shaping path to compile.
    #[arg(long, value_enum, default_value = "latency")]
    path: PathArg,

    /// Newline-delimited IPv4 inventory.
    #[arg(long, default_value = "ip.list")]
    inventory: PathBuf,

    /// Number of modeled regions.
    #[arg(long)]
    regions: usize,

    /// Device carrying the shaping hierarchy.
    #[arg(long, default_value = "ifb1")]
    device: String,

    /// Device whose ingress is mirrored into the shaping device
    /// (latency path only).
    #[arg(long, default_value = "lo")]
    ingress_dev: String,

    /// Bandwidth cap in mbit (required by the bandwidth path).
    #[arg(long)]
    rate_mbit: Option<u64>,

    /// Maximum hosts driven concurrently.
    #[arg(long, default_value_t = 64)]
    jobs: usize,

    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Remote user for ssh.
    #[arg(long, default_value = "ec2-user")]
    ssh_user: String,

    /// Identity file for ssh.
    #[arg(long)]
    ssh_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fleetem: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mode = args.mode.plan_mode();

    // Everything that can be rejected is rejected before any host is
    // touched: inventory, region count, topology and path combination.
    let registry = HostRegistry::load(&args.inventory, args.regions)?;
    if registry.is_empty() {
        return Err(format!("inventory {} contains no hosts", args.inventory.display()).into());
    }

    let config = TopologyConfig::default();
    let matrix = build_matrix(args.topology.topology(), args.regions, &config)?;
    let regions = RegionSet::for_count(args.regions);
    let names: Vec<&str> = regions.iter().map(|(_, name)| name).collect();
    tracing::info!(
        topology = ?args.topology,
        regions = ?names,
        hosts = registry.len(),
        "latency model:\n{matrix}"
    );

    let compiler = PlanCompiler::new(&args.device);
    let mut jobs = Vec::with_capacity(registry.len());
    for &host in registry.hosts() {
        let row = matrix.row(host.region);
        let job = match args.path {
            PathArg::Latency => {
                let plan = compiler.latency_plan(mode, row)?;
                let mut job = HostJob::new(host, plan);
                if matches!(mode, PlanMode::Apply) {
                    job = job
                        .with_prep(DevicePrep::new(&args.ingress_dev, &args.device).commands());
                }
                job
            }
            PathArg::Priority => {
                let assignment = PriorityAssignment::rank(row, BASE_BAND)?;
                HostJob::new(host, compiler.priority_plan(mode, &assignment)?)
            }
            PathArg::Bandwidth => {
                let rate = args
                    .rate_mbit
                    .ok_or("the bandwidth path requires --rate-mbit")?;
                HostJob::new(host, compiler.bandwidth_plan(mode, Rate::mbit(rate)))
            }
        };
        jobs.push(job);
    }

    let mut transport = SshTransport::new(&args.ssh_user);
    if let Some(key) = &args.ssh_key {
        transport = transport.with_key(key);
    }

    let executor = FleetExecutor::new(transport)
        .with_max_in_flight(args.jobs)
        .with_command_timeout(Duration::from_secs(args.timeout_secs));

    let cancel = executor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let reports = executor.execute(jobs).await;

    let mut failed = 0usize;
    for report in &reports {
        let region = regions.name(report.host.region).unwrap_or("?");
        if report.outcome.is_success() {
            tracing::info!(host = %report.host.addr, region, "ok");
        } else {
            failed += 1;
            tracing::error!(host = %report.host.addr, region, outcome = ?report.outcome, "failed");
        }
    }
    tracing::info!(total = reports.len(), failed, "run complete");

    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
