use crate::collectors::exec::{find_tool, run_capture};
use crate::models::drive::Facts;
use crate::registry::{Inventory, Key};
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// One member row of `mdadm --detail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdMember {
    pub device: String,
    /// State words, e.g. `active sync`, `faulty`, `spare rebuilding`.
    pub state:  String,
}

pub fn collect(inv: &mut Inventory) -> Result<()> {
    let Some(mdadm) = find_tool(&["mdadm"]) else {
        debug!("mdadm not found, skipping software RAID");
        return Ok(());
    };
    let scan = run_capture(&mdadm, &["--detail", "--scan"])?;
    for array in parse_scan(&scan) {
        let detail = match run_capture(&mdadm, &["--detail", &array]) {
            Ok(t) => t,
            Err(e) => {
                debug!("{}: {:#}", array, e);
                continue;
            }
        };
        let group = array_name(&array);
        for m in parse_detail(&detail) {
            inv.annotate(
                Key::Node(&m.device),
                Facts { array: Some(group.clone()), state: Some(m.state), ..Default::default() },
            );
        }
    }
    Ok(())
}

/// Array device paths from `mdadm --detail --scan`.
pub fn parse_scan(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let mut t = line.split_whitespace();
            if t.next()? != "ARRAY" { return None; }
            t.next().map(str::to_string)
        })
        .collect()
}

/// `/dev/md0` → `md0`, `/dev/md/data` → `data`.
pub fn array_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Member table rows following the `Number Major Minor RaidDevice State`
/// header. Removed slots carry no device and are skipped.
pub fn parse_detail(text: &str) -> Vec<MdMember> {
    let mut members = Vec::new();
    let mut in_table = false;
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() == Some(&"Number") && tokens.contains(&"RaidDevice") {
            in_table = true;
            continue;
        }
        if !in_table || tokens.len() < 6 { continue; }

        let Some(device) = tokens.last().filter(|t| t.starts_with("/dev/")) else { continue };
        members.push(MdMember {
            device: device.to_string(),
            state:  tokens[4..tokens.len() - 1].join(" "),
        });
    }
    members
}
