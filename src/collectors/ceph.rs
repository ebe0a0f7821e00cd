use crate::collectors::exec::{find_tool, run_capture};
use crate::models::drive::Facts;
use crate::registry::{Inventory, Key};
use anyhow::Result;
use serde_json::Value;
use tracing::debug;

/// A device backing part of an OSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdDevice {
    pub device: String,
    pub group:  String,
}

pub fn collect(inv: &mut Inventory) -> Result<()> {
    let Some(tool) = find_tool(&["ceph-volume"]) else {
        debug!("ceph-volume not found, skipping cluster storage");
        return Ok(());
    };
    let json = run_capture(&tool, &["lvm", "list", "--format", "json"])?;
    for d in parse_lvm_list(&json)? {
        inv.annotate(Key::Node(&d.device), Facts { array: Some(d.group), ..Default::default() });
    }
    Ok(())
}

/// Group name for one OSD volume. Data devices belong to their OSD; DB
/// and WAL devices are usually shared between OSDs.
fn group_for(osd: &str, kind: &str) -> String {
    match kind {
        "db"  => "ceph-db".to_string(),
        "wal" => "ceph-wal".to_string(),
        _     => format!("ceph-osd.{}", osd),
    }
}

/// Parse `ceph-volume lvm list --format json`: OSD id → volumes, each
/// listing its underlying devices.
pub fn parse_lvm_list(json: &str) -> Result<Vec<OsdDevice>> {
    let v: Value = serde_json::from_str(json)?;
    let mut out = Vec::new();
    let Some(osds) = v.as_object() else { return Ok(out) };

    for (osd, volumes) in osds {
        for vol in volumes.as_array().into_iter().flatten() {
            let kind = vol["type"].as_str().unwrap_or("block");
            for dev in vol["devices"].as_array().into_iter().flatten() {
                let Some(device) = dev.as_str() else { continue };
                let entry = OsdDevice { device: device.to_string(), group: group_for(osd, kind) };
                if !out.contains(&entry) {
                    out.push(entry);
                }
            }
        }
    }
    Ok(out)
}
