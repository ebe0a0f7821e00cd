mod bays;
mod collectors;
mod colors;
mod config;
mod error;
mod health;
mod locate;
mod logging;
mod models;
mod registry;
mod render;
mod util;

use anyhow::Result;
use clap::{ArgAction, Parser};
use collectors::smart::SmartProbe;
use collectors::smart_cache::SmartCache;
use collectors::{Collector, Context};
use colors::ArrayColors;
use config::Config;
use crossterm::tty::IsTty;
use registry::Inventory;
use std::io;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "drivemap", about = "Storage inventory and drive-bay mapper", version)]
struct Cli {
    /// Show only drives with no partitions, filesystem or array membership
    #[arg(long)]
    unused: bool,

    /// Mask serial numbers and aliases for screenshots
    #[arg(long)]
    demo: bool,

    /// Render configured enclosure grids instead of the inventory table
    #[arg(long)]
    bays: bool,

    /// Print a one-shot JSON snapshot of the inventory and exit
    #[arg(long)]
    json: bool,

    /// Toggle the locate LED of DRIVE (device name, serial or by-id alias)
    #[arg(long, value_name = "DRIVE")]
    locate: Option<String>,

    /// Locate LED state: on/off (also start/stop, yes/no, 1/0)
    #[arg(long, requires = "locate")]
    state: Option<String>,

    /// Enclosure tool for --locate: storcli, sas3ircu, sas2ircu
    #[arg(long, requires = "locate")]
    tool: Option<String>,

    /// Disable SMART data collection
    #[arg(long)]
    no_smart: bool,

    /// Replay cached smartctl output and cache new probes
    #[arg(long)]
    cache: bool,

    /// Treat drive ID as failing (repeatable)
    #[arg(long = "known-bad", value_name = "ID")]
    known_bad: Vec<String>,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = Config::load();
    if cli.config {
        return run_print_config(&cfg);
    }

    // Usage errors abort before any external tool runs.
    let locate_req = match &cli.locate {
        Some(drive) => {
            let requested = cli.tool.as_deref()
                .or_else(|| Some(cfg.locate.tool.as_str()).filter(|t| !t.is_empty()));
            Some(locate::LocateRequest::parse(drive, cli.state.as_deref(), requested)?)
        }
        None => None,
    };

    if !nix::unistd::geteuid().is_root() {
        warn!("not running as root: SMART data, boot sectors and controller details will be incomplete");
    }

    let inv = collect(&cfg, &cli)?;

    if let Some(req) = &locate_req {
        locate::locate(&inv, req)?;
        return Ok(());
    }

    let mut known_bad = cfg.health.known_bad.clone();
    known_bad.extend(cli.known_bad.iter().cloned());

    let colors = ArrayColors::assign(inv.drives().filter_map(|d| d.array.as_deref()));
    if !colors.is_empty() {
        debug!("{} array group(s) coloured", colors.len());
    }
    let opts = render::Options {
        unused_only: cli.unused,
        demo:        cli.demo,
        color:       !cli.json && io::stdout().is_tty(),
        known_bad,
    };

    if cli.json {
        println!("{}", render::json(&inv, &opts)?);
    } else if cli.bays {
        print!("{}", render::bays(&inv, &cfg.enclosures(), &colors, &opts));
    } else {
        print!("{}", render::inventory(&inv, &colors, &opts));
    }
    Ok(())
}

/// Run every collector against a fresh registry.
fn collect(cfg: &Config, cli: &Cli) -> Result<Inventory> {
    let smart = (cfg.general.smart && !cli.no_smart).then(|| {
        let cache = if cli.cache || cfg.general.cache {
            let dir = SmartCache::default_dir();
            if dir.is_none() {
                warn!("no cache directory available, SMART cache disabled");
            }
            dir.map(SmartCache::new).inspect(|c| debug!("SMART cache at {}", c.dir().display()))
        } else {
            None
        };
        SmartProbe::new(cache)
    });
    let ctx = Context { config: cfg, smart };

    let mut inv = Inventory::new();
    collectors::run_all(&mut inv, &ctx, &Collector::ORDER)?;
    if inv.is_empty() {
        warn!("no drives found");
    }
    debug!("{} drive(s), {} bay(s) assigned", inv.len(), inv.bays().len());
    Ok(inv)
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  smart = {}", cfg.general.smart);
    println!("  cache = {}", cfg.general.cache);
    println!();
    println!("[devices]");
    println!("  exclude = {:?}", cfg.devices.exclude);
    println!();
    println!("[health]");
    println!("  known_bad = {:?}", cfg.health.known_bad);
    println!();
    println!("[locate]");
    let tool = if cfg.locate.tool.is_empty() { "(auto)" } else { cfg.locate.tool.as_str() };
    println!("  tool = {}", tool);
    println!();
    println!("[enclosures]");
    if cfg.enclosures.is_empty() {
        println!("  (none)");
    }
    for enc in cfg.enclosures() {
        println!("  {} ({} slots)", enc.name, enc.slots().count());
        for row in &enc.rows {
            let cells: Vec<String> = row.iter().map(|l| match l {
                models::enclosure::SlotLabel::Slot(n)  => n.to_string(),
                models::enclosure::SlotLabel::Blank(t) => t.clone(),
            }).collect();
            println!("    {}", cells.join(" "));
        }
    }
    Ok(())
}
