use crate::collectors::exec::{find_tool, run_capture};
use crate::models::drive::Facts;
use crate::registry::{Inventory, Key};
use anyhow::Result;
use tracing::debug;

/// A physical volume and the volume group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalVolume {
    pub device:  String,
    pub vg_name: String,
}

pub fn collect(inv: &mut Inventory) -> Result<()> {
    let Some(pvs) = find_tool(&["pvs"]) else {
        debug!("pvs not found, skipping LVM");
        return Ok(());
    };
    let text = run_capture(&pvs, &["--noheadings", "-o", "pv_name,vg_name"])?;
    for pv in parse_pvs(&text) {
        inv.annotate(Key::Node(&pv.device), Facts { array: Some(pv.vg_name), ..Default::default() });
    }
    Ok(())
}

/// Parse `pvs --noheadings -o pv_name,vg_name`. PVs outside any VG are skipped.
pub fn parse_pvs(text: &str) -> Vec<PhysicalVolume> {
    text.lines()
        .filter_map(|line| {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 2 { return None; }
            Some(PhysicalVolume {
                device:  f[0].to_string(),
                vg_name: f[1].to_string(),
            })
        })
        .collect()
}
