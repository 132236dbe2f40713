mod config;
mod containers;
mod device;
mod error;
mod fleet;
mod inventory;
mod lifecycle;
mod models;
mod peering;
mod templates;
mod utils;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use containers::DockerDriver;
use device::SshDevice;
use fleet::{AggregatedResult, Fleet};
use inventory::Inventory;
use lifecycle::Lab;
use models::Topology;
use peering::RipeStat;

#[derive(Parser, Debug)]
#[command(name = "labctl", version, about = "Lifecycle operations for containerized EOS labs")]
struct Cli {
    /// Inventory file in YAML format
    #[arg(short, long, global = true, env = "LAB_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Containerlab topology file
    #[arg(short, long, global = true, env = "LAB_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Only run on these hosts (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    hosts: Vec<String>,

    /// Only run on members of this group
    #[arg(long = "only-group", global = true)]
    only_group: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or delete device configuration backups to flash
    Backup {
        /// Delete the backup on the device flash
        #[arg(long, default_value_t = false)]
        delete: bool,
    },

    /// Restore configuration backups from flash
    Restore,

    /// Save configuration to a folder
    Save {
        #[arg(long)]
        folder: PathBuf,
    },

    /// Load configuration from a folder
    Load {
        #[arg(long)]
        folder: PathBuf,
    },

    /// Start containers
    Start,

    /// Stop containers
    Stop,

    /// Restart containers
    Restart,

    /// Configure cEOS serial number, system MAC address and copy CloudVision token to flash
    InitCeos {
        /// CloudVision onboarding token
        #[arg(long)]
        token: Option<PathBuf>,
    },

    /// Onboard to CloudVision (TerminAttr uses the default VRF)
    Onboard {
        /// CloudVision onboarding token
        #[arg(long)]
        token: PathBuf,
    },

    /// Apply configuration templates
    Apply {
        /// Configuration template folder
        #[arg(long)]
        folder: PathBuf,

        /// The template folder contains sub-folders named after inventory groups
        #[arg(long, default_value_t = false)]
        groups: bool,
    },

    /// Configure point-to-point interfaces
    Interfaces {
        /// YAML file describing lab links
        #[arg(long)]
        links: PathBuf,
    },

    /// Configure peering devices
    Peering {
        /// Inventory group of peering devices
        #[arg(long)]
        group: String,

        /// Inventory group of the backbone
        #[arg(long)]
        backbone: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load();

    let inventory_path = cli.inventory.clone().unwrap_or_else(|| PathBuf::from(&cfg.inventory_path));
    let topology_path = cli.topology.clone().unwrap_or_else(|| PathBuf::from(&cfg.topology_path));
    let inventory = Inventory::load(&inventory_path)?;
    let topology = Topology::load(&topology_path, &cfg.workdir)?;
    tracing::info!(
        "Lab '{}': {} hosts from {}",
        topology.name,
        inventory.hosts.len(),
        inventory_path.display()
    );
    for host in inventory.hosts.iter().filter(|h| !topology.has_node(&h.name)) {
        tracing::warn!("{}: not a node of topology '{}'", host, topology.name);
    }

    let user = inventory.defaults.username.clone().unwrap_or_else(|| cfg.ssh_user.clone());
    let pass = inventory.defaults.password.clone().unwrap_or_else(|| cfg.ssh_pass.clone());
    let device = SshDevice::new(user, pass, cfg.ssh_timeout_secs, topology.clone());
    let registry = RipeStat::new(cfg.prefix_registry_url.clone(), cfg.prefix_lookback_days)?;
    let docker = DockerDriver::connect()?;

    let lab = Lab::new(
        inventory,
        topology,
        Arc::new(device),
        Arc::new(docker),
        Arc::new(registry),
        PathBuf::from(&cfg.templates_dir),
    );

    let fleet = target_fleet(&lab, &cli);
    let results = run(&lab, &fleet, cli.cmd).await?;

    if report(&results) {
        std::process::exit(1);
    }
    Ok(())
}

/// Inventory hosts narrowed by the --hosts and --only-group filters
fn target_fleet(lab: &Lab, cli: &Cli) -> Fleet {
    let mut fleet = lab.inventory.fleet();
    if !cli.hosts.is_empty() {
        fleet = fleet.filter(|h| cli.hosts.contains(&h.name));
    }
    if let Some(group) = &cli.only_group {
        fleet = fleet.in_group(group);
    }
    fleet
}

/// Dispatch one command. Mutating commands back up the targeted hosts first
/// and skip every host whose backup failed.
async fn run(lab: &Arc<Lab>, fleet: &Fleet, cmd: Command) -> anyhow::Result<Vec<AggregatedResult>> {
    let results = match cmd {
        Command::Backup { delete: true } => vec![lab.delete_backups(fleet).await],
        Command::Backup { delete: false } => vec![lab.create_backups(fleet).await],
        Command::Restore => vec![lab.restore_backups(fleet).await],
        Command::Save { folder } => vec![lab.save(fleet, &folder).await?],
        Command::Load { folder } => {
            let backup = lab.create_backups(fleet).await;
            let ready = fleet.without_failed(&backup);
            vec![backup, lab.load(&ready, &folder).await]
        }
        Command::Start => vec![lab.start(fleet).await],
        Command::Stop => vec![lab.stop(fleet).await],
        Command::Restart => vec![lab.restart(fleet).await],
        Command::InitCeos { token } => lab.init_flash(fleet, token.as_deref()).await?,
        Command::Onboard { token } => {
            let backup = lab.create_backups(fleet).await;
            let ready = fleet.without_failed(&backup);
            let mut results = vec![backup];
            results.extend(lab.onboard(&ready, &token).await?);
            results
        }
        Command::Apply { folder, groups } => {
            let backup = lab.create_backups(fleet).await;
            let ready = fleet.without_failed(&backup);
            vec![backup, lab.apply_templates(&ready, &folder, groups).await?]
        }
        Command::Interfaces { links } => {
            let backup = lab.create_backups(fleet).await;
            let ready = fleet.without_failed(&backup);
            vec![backup, lab.configure_interfaces(&ready, &links).await?]
        }
        Command::Peering { group, backbone } => {
            let backup = lab.create_backups(&fleet.in_group(&group)).await;
            let ready = fleet.without_failed(&backup);
            vec![backup, lab.configure_peering(&ready, &group, &backbone).await?]
        }
    };
    Ok(results)
}

/// Print every failed host with its cause; returns whether anything failed
fn report(results: &[AggregatedResult]) -> bool {
    let mut failed = false;
    for result in results {
        for (host, cause) in result.failed() {
            failed = true;
            eprintln!("{} | {}: {}", result.name, host, cause);
        }
        let changed = result.changed().count();
        tracing::info!(
            "{}: {} hosts, {} changed, {} failed",
            result.name,
            result.len(),
            changed,
            result.failed().count()
        );
    }
    failed
}
