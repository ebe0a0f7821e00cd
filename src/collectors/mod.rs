//! Probes that wrap one external tool each and feed the registry.

pub mod boot;
pub mod ceph;
pub mod exec;
pub mod lsblk;
pub mod lvm;
pub mod mdraid;
pub mod sas;
pub mod smart;
pub mod smart_cache;
pub mod storcli;
pub mod zfs;

use crate::config::Config;
use crate::registry::Inventory;
use anyhow::{bail, Result};
use smart::SmartProbe;
use tracing::{info, warn};

/// Shared, read-only inputs for a collector run.
pub struct Context<'a> {
    pub config: &'a Config,
    /// `None` when SMART probing is disabled.
    pub smart:  Option<SmartProbe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collector {
    RaidController,
    BlockDevices,
    SasExpander,
    Lvm,
    SoftwareRaid,
    ClusterStorage,
    Pool,
}

impl Collector {
    /// The run order.
    pub const ORDER: [Collector; 7] = [
        Collector::RaidController,
        Collector::BlockDevices,
        Collector::SasExpander,
        Collector::Lvm,
        Collector::SoftwareRaid,
        Collector::ClusterStorage,
        Collector::Pool,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collector::RaidController => "raid-controller",
            Collector::BlockDevices   => "block-devices",
            Collector::SasExpander    => "sas-expander",
            Collector::Lvm            => "lvm",
            Collector::SoftwareRaid   => "software-raid",
            Collector::ClusterStorage => "cluster-storage",
            Collector::Pool           => "pool",
        }
    }

    /// Collectors whose results this one needs in the registry first.
    ///
    /// Controller drives are only known by controller id and serial, so the
    /// controller collector seeds the serial cross-reference before block
    /// enumeration; everything else attributes facts to device nodes.
    pub fn depends_on(&self) -> &'static [Collector] {
        match self {
            Collector::RaidController => &[],
            Collector::BlockDevices   => &[Collector::RaidController],
            _                         => &[Collector::BlockDevices],
        }
    }

    pub fn run(self, inv: &mut Inventory, ctx: &Context) -> Result<()> {
        match self {
            Collector::RaidController => storcli::collect(inv, ctx),
            Collector::BlockDevices   => lsblk::collect(inv, ctx),
            Collector::SasExpander    => sas::collect(inv, ctx),
            Collector::Lvm            => lvm::collect(inv),
            Collector::SoftwareRaid   => mdraid::collect(inv),
            Collector::ClusterStorage => ceph::collect(inv),
            Collector::Pool           => zfs::collect(inv),
        }
    }
}

/// Validate that every collector in `order` is preceded by its dependencies.
pub fn plan(order: &[Collector]) -> Result<Vec<Collector>> {
    for (i, c) in order.iter().enumerate() {
        for dep in c.depends_on() {
            match order.iter().position(|o| o == dep) {
                Some(j) if j < i => {}
                Some(_) => bail!("collector {} must run after {}", c.name(), dep.name()),
                None    => bail!("collector {} requires {}", c.name(), dep.name()),
            }
        }
    }
    Ok(order.to_vec())
}

/// Run `order` against the registry. A failing collector contributes
/// nothing; the run continues.
pub fn run_all(inv: &mut Inventory, ctx: &Context, order: &[Collector]) -> Result<()> {
    for c in plan(order)? {
        match c.run(inv, ctx) {
            Ok(())  => info!("{}: done, {} drive(s) known", c.name(), inv.len()),
            Err(e)  => warn!("{} collector skipped: {:#}", c.name(), e),
        }
    }
    Ok(())
}
