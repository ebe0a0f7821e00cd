use crate::collectors::exec::{find_tool, run_capture};
use crate::models::drive::Facts;
use crate::registry::{Inventory, Key};
use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Auxiliary vdev sections of `zpool status`; members are grouped as
/// `<pool>-<section>`.
const SECTIONS: &[&str] = &["logs", "cache", "spares", "special", "dedup"];

/// How a leaf vdev names its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdevRef {
    Node(String),
    Alias(String),
}

/// A leaf vdev row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMember {
    pub vdev:  VdevRef,
    pub group: String,
    pub state: Option<String>,
}

pub fn collect(inv: &mut Inventory) -> Result<()> {
    let Some(zpool) = find_tool(&["zpool"]) else {
        debug!("zpool not found, skipping pools");
        return Ok(());
    };
    let text = run_capture(&zpool, &["status", "-P"])?;
    for m in parse_status(&text) {
        let facts = Facts { array: Some(m.group), state: m.state, ..Default::default() };
        match &m.vdev {
            VdevRef::Alias(a) => inv.annotate(Key::Alias(a), facts),
            VdevRef::Node(n) if !is_device_path(n) => {
                debug!("{}: file-backed vdev, not a drive", n);
                continue;
            }
            VdevRef::Node(n)  => {
                // by-path, by-partuuid and friends: follow the link to the node
                let node = if n.starts_with("/dev/disk/") {
                    fs::canonicalize(n).map(|p| p.to_string_lossy().into_owned()).unwrap_or_else(|_| n.clone())
                } else {
                    n.clone()
                };
                inv.annotate(Key::Node(&node), facts)
            }
        };
    }
    Ok(())
}

/// Classify a leaf vdev path.
pub fn vdev_key(path: &str) -> VdevRef {
    match path.strip_prefix("/dev/disk/by-id/") {
        Some(alias) => VdevRef::Alias(alias.to_string()),
        None        => VdevRef::Node(path.to_string()),
    }
}

fn group_name(pool: &str, section: Option<&str>) -> String {
    match section {
        Some(s) => format!("{}-{}", pool, s),
        None    => pool.to_string(),
    }
}

fn normalize_state(state: &str) -> String {
    match state {
        // unused hot spare
        "AVAIL" => "Ready".to_string(),
        other   => other.to_string(),
    }
}

/// Parse the config tables of `zpool status -P`. Only leaf devices (rows
/// naming an absolute path) are returned; `mirror-0`, `raidz2-1` and other
/// grouping rows are not drives.
pub fn parse_status(text: &str) -> Vec<PoolMember> {
    let mut out = Vec::new();
    let mut pool: Option<String> = None;
    let mut section: Option<&str> = None;
    let mut in_config = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("pool:") {
            pool = Some(name.trim().to_string());
            section = None;
            in_config = false;
            continue;
        }
        if trimmed == "config:" {
            in_config = true;
            continue;
        }
        if trimmed.starts_with("errors:") {
            in_config = false;
            continue;
        }
        if !in_config { continue; }

        let mut tokens = trimmed.split_whitespace();
        let Some(name) = tokens.next() else { continue };
        let state = tokens.next();
        let Some(p) = pool.as_deref() else { continue };

        if name == "NAME" && state == Some("STATE") {
            continue;
        }
        if name == p {
            section = None;
            continue;
        }
        if let Some(s) = SECTIONS.iter().find(|s| **s == name) {
            section = Some(*s);
            continue;
        }
        if name.starts_with('/') {
            out.push(PoolMember {
                vdev:  vdev_key(name),
                group: group_name(p, section),
                state: state.map(normalize_state),
            });
        }
    }
    out
}

/// `true` if `path` names a whole disk or partition under `/dev`.
pub fn is_device_path(path: &str) -> bool {
    Path::new(path).starts_with("/dev")
}
