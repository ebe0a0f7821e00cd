use crate::collectors::exec::{find_tool, run_capture};
use crate::collectors::{smart, Context};
use crate::models::drive::{known, split_vendor, wwn_alias, Facts, MediaKind, MediaType};
use crate::models::location::{Location, Placement};
use crate::registry::{Inventory, Key};
use anyhow::Result;
use tracing::debug;

/// Binary names of the MegaRAID CLI, most specific first.
pub const TOOLS: &[&str] = &["storcli64", "storcli", "perccli64", "perccli"];

/// One physical drive from `storcli /call/eall/sall show all`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerDrive {
    pub controller:   u32,
    pub enclosure:    Option<u32>,
    pub slot:         u32,
    pub did:          u32,
    pub state:        Option<String>,
    pub disk_group:   Option<String>,
    pub interface:    Option<String>,
    pub medium:       Option<String>,
    pub model:        Option<String>,
    pub manufacturer: Option<String>,
    pub serial:       Option<String>,
    pub wwn:          Option<String>,
    pub firmware:     Option<String>,
    pub size:         Option<u64>,
    pub pred_fail:    Option<String>,
}

impl ControllerDrive {
    /// Controller-scoped drive id, e.g. `c0d7`.
    pub fn cid(&self) -> String {
        format!("c{}d{}", self.controller, self.did)
    }

    pub fn location(&self) -> Option<Location> {
        self.enclosure.map(|enclosure| Location::Controller {
            controller: self.controller,
            enclosure,
            slot: self.slot,
        })
    }

    pub fn facts(&self) -> Facts {
        let (vendor, model) = split_vendor(self.model.as_deref().unwrap_or(""), self.manufacturer.as_deref());
        let media = self.interface.as_deref()
            .and_then(|i| MediaKind::from_interface(i, self.medium.as_deref().unwrap_or("")))
            .map(MediaType::new);
        Facts {
            size:          self.size,
            media,
            location:      self.location().map(Placement::At),
            vendor,
            model,
            firmware:      self.firmware.clone(),
            serial:        self.serial.clone(),
            alias:         self.wwn.as_deref().and_then(wwn_alias),
            health:        self.pred_fail.clone(),
            state:         self.state.clone(),
            controller_id: Some(self.cid()),
            ..Default::default()
        }
    }
}

/// Virtual drive membership from `storcli /call/vall show all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdMember {
    pub controller: u32,
    pub vd:         u32,
    pub did:        u32,
}

impl VdMember {
    pub fn group(&self) -> String {
        format!("c{}v{}", self.controller, self.vd)
    }
}

pub fn collect(inv: &mut Inventory, ctx: &Context) -> Result<()> {
    let Some(tool) = find_tool(TOOLS) else {
        debug!("storcli not found, skipping RAID controllers");
        return Ok(());
    };

    let drives = parse_drives(&run_capture(&tool, &["/call/eall/sall", "show", "all"])?);
    for d in &drives {
        let cid = d.cid();
        let id = inv.observe(Key::Controller(&cid), d.facts());
        if let Some(probe) = &ctx.smart {
            let device = format!("/dev/bus/{}", d.controller);
            if let Some(facts) = probe.probe(&id, &device, &smart::megaraid_hints(d.did)) {
                inv.annotate(Key::Controller(&cid), facts);
            }
        }
    }

    // Drives outside any virtual drive (JBOD, UGood) are fine without it
    match run_capture(&tool, &["/call/vall", "show", "all"]) {
        Ok(text) => {
            for m in parse_virtual_drives(&text) {
                let cid = format!("c{}d{}", m.controller, m.did);
                inv.annotate(Key::Controller(&cid), Facts { array: Some(m.group()), ..Default::default() });
            }
        }
        Err(e) => debug!("no virtual drives: {:#}", e),
    }
    Ok(())
}

// ── Parsing ──────────────────────────────────────────────────────────

/// `/c0/e252/s3` → (0, Some(252), 3); `/c0/s3` → (0, None, 3).
fn parse_drive_path(path: &str) -> Option<(u32, Option<u32>, u32)> {
    let mut controller = None;
    let mut enclosure = None;
    let mut slot = None;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        let n = part.get(1..)?.parse().ok()?;
        match part.get(..1)? {
            "c" => controller = Some(n),
            "e" => enclosure = Some(n),
            "s" => slot = Some(n),
            _ => return None,
        }
    }
    Some((controller?, enclosure, slot?))
}

/// A physical-drive table row: `EID:Slt DID State DG Size Unit Intf Med ...`.
fn parse_pd_row(line: &str) -> Option<(u32, String, String, String, String)> {
    let t: Vec<&str> = line.split_whitespace().collect();
    if t.len() < 8 || !t[0].contains(':') {
        return None;
    }
    let did = t[1].parse().ok()?;
    Some((did, t[2].to_string(), t[3].to_string(), t[6].to_string(), t[7].to_string()))
}

/// `1.819 TB [0xe8e088b0 Sectors]` → sector count.
fn parse_sectors(value: &str) -> Option<u64> {
    let start = value.find("[0x")? + 3;
    let end = start + value[start..].find(' ')?;
    u64::from_str_radix(&value[start..end], 16).ok()
}

/// `512B`, `4 KB` → bytes.
fn parse_sector_size(value: &str) -> Option<u64> {
    let v = value.trim().to_ascii_uppercase();
    let (num, unit) = match v.strip_suffix("KB") {
        Some(n) => (n, 1024),
        None    => (v.strip_suffix('B').unwrap_or(v.as_str()), 1),
    };
    num.trim().parse::<u64>().ok()?.checked_mul(unit).filter(|n| *n > 0)
}

pub fn parse_drives(text: &str) -> Vec<ControllerDrive> {
    let mut drives: Vec<ControllerDrive> = Vec::new();
    let mut sector_size = 512u64;
    let mut sectors = None;

    let finish = |d: &mut ControllerDrive, sectors: Option<u64>, sector_size: u64| {
        if d.size.is_none() {
            d.size = sectors.and_then(|s| s.checked_mul(sector_size));
        }
    };

    for line in text.lines() {
        let trimmed = line.trim();

        // "Drive /c0/e252/s3 :" opens a new drive; the detail headers
        // ("Drive /c0/e252/s3 State :") carry a trailing word.
        if let Some(rest) = trimmed.strip_prefix("Drive /") {
            let mut words = rest.split_whitespace();
            let path = words.next().unwrap_or("");
            if words.next() == Some(":") {
                if let Some((controller, enclosure, slot)) = parse_drive_path(path) {
                    if let Some(prev) = drives.last_mut() {
                        finish(prev, sectors, sector_size);
                    }
                    sectors = None;
                    sector_size = 512;
                    drives.push(ControllerDrive { controller, enclosure, slot, ..Default::default() });
                }
            }
            continue;
        }

        let Some(d) = drives.last_mut() else { continue };

        if let Some((key, value)) = trimmed.split_once(" = ") {
            let value = value.trim();
            match key.trim() {
                "SN"                       => d.serial = known(value),
                "WWN"                      => d.wwn = known(value),
                "Firmware Revision"        => d.firmware = known(value),
                "Model Number"             => d.model = known(value),
                "Manufacturer Id"          => d.manufacturer = known(value),
                "Predictive Failure Count" => d.pred_fail = known(value),
                "Raw size"                 => sectors = parse_sectors(value),
                "Sector Size"              => sector_size = parse_sector_size(value).unwrap_or(512),
                _ => {}
            }
        } else if d.state.is_none() {
            if let Some((did, state, dg, intf, med)) = parse_pd_row(trimmed) {
                d.did = did;
                d.state = known(&state);
                d.disk_group = known(&dg);
                d.interface = known(&intf);
                d.medium = known(&med);
            }
        }
    }
    if let Some(last) = drives.last_mut() {
        finish(last, sectors, sector_size);
    }
    drives
}

pub fn parse_virtual_drives(text: &str) -> Vec<VdMember> {
    let mut out = Vec::new();
    let mut controller = None;
    let mut vd = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("/c") {
            // "/c0/v1 :"
            let path = rest.split_whitespace().next().unwrap_or("");
            if let Some((c, v)) = path.split_once("/v") {
                controller = c.parse().ok();
                vd = v.parse().ok();
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("PDs for VD ") {
            vd = rest.trim_end_matches(':').trim().parse().ok();
            continue;
        }
        if let (Some(c), Some(v)) = (controller, vd) {
            if let Some((did, ..)) = parse_pd_row(trimmed) {
                out.push(VdMember { controller: c, vd: v, did });
            }
        }
    }
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRIVES: &str = "\
CLI Version = 007.1017.0000.0000 May 10, 2019
Operating system = Linux 5.15.0
Controller = 0
Status = Success
Description = Show Drive Information Succeeded.


Drive /c0/e252/s0 :
=================

-------------------------------------------------------------------------------
EID:Slt DID State DG     Size Intf Med SED PI SeSz Model                Sp Type
-------------------------------------------------------------------------------
252:0     7 Onln   0 1.818 TB SATA HDD N   N  512B WDC WD20EFRX-68EUZN0 U  -
-------------------------------------------------------------------------------


Drive /c0/e252/s0 - Detailed Information :
========================================

Drive /c0/e252/s0 State :
=======================
Shield Counter = 0
Media Error Count = 0
Predictive Failure Count = 0
S.M.A.R.T alert flagged by drive = No


Drive /c0/e252/s0 Device attributes :
===================================
SN =      WD-WCC4M1234567
Manufacturer Id = ATA
Model Number = WDC WD20EFRX-68EUZN0
WWN = 50014EE2B5A12345
Firmware Revision = 82.00A82
Raw size = 1.819 TB [0xe8e088b0 Sectors]
Sector Size =  512B


Drive /c0/e252/s1 :
=================

-------------------------------------------------------------------------------
EID:Slt DID State DG     Size Intf Med SED PI SeSz Model                Sp Type
-------------------------------------------------------------------------------
252:1     8 Rbld   0 1.818 TB SAS  SSD N   N  512B HUSMM1620ASS200      U  -
-------------------------------------------------------------------------------

Drive /c0/e252/s1 State :
=======================
Predictive Failure Count = 2

Drive /c0/e252/s1 Device attributes :
===================================
SN = 0QV1ABCD
Manufacturer Id = HGST
Model Number = HUSMM1620ASS200
WWN = 5000CCA04E1A2B3C
Firmware Revision = A29A
";

    const VDS: &str = "\
/c0/v0 :
======

---------------------------------------------------------------
DG/VD TYPE  State Access Consist Cache Cac sCC       Size Name
---------------------------------------------------------------
0/0   RAID1 Optl  RW     Yes     RWBD  -   ON  1.818 TB
---------------------------------------------------------------

PDs for VD 0 :
============

-----------------------------------------------------------------------------
EID:Slt DID State DG     Size Intf Med SED PI SeSz Model                Sp Type
-----------------------------------------------------------------------------
252:0     7 Onln   0 1.818 TB SATA HDD N   N  512B WDC WD20EFRX-68EUZN0 U  -
252:1     8 Rbld   0 1.818 TB SAS  SSD N   N  512B HUSMM1620ASS200      U  -
-----------------------------------------------------------------------------
";

    #[test]
    fn parses_drive_blocks() {
        let drives = parse_drives(DRIVES);
        assert_eq!(drives.len(), 2);

        let d = &drives[0];
        assert_eq!((d.controller, d.enclosure, d.slot, d.did), (0, Some(252), 0, 7));
        assert_eq!(d.state.as_deref(), Some("Onln"));
        assert_eq!(d.serial.as_deref(), Some("WD-WCC4M1234567"));
        assert_eq!(d.pred_fail.as_deref(), Some("0"));
        assert_eq!(d.size, Some(0xe8e088b0 * 512));
        assert_eq!(d.cid(), "c0d7");

        let f = d.facts();
        assert_eq!(f.vendor.as_deref(), Some("WDC"));
        assert_eq!(f.alias.as_deref(), Some("wwn-0x50014ee2b5a12345"));
        assert_eq!(f.media.unwrap().to_string(), "SATA-HDD");
        assert_eq!(f.location, Some(Placement::At(Location::Controller { controller: 0, enclosure: 252, slot: 0 })));

        assert_eq!(drives[1].state.as_deref(), Some("Rbld"));
        assert_eq!(drives[1].facts().media.unwrap().to_string(), "SAS-SSD");
        assert_eq!(drives[1].size, None);
    }

    #[test]
    fn sector_sizes_and_oversized_counts() {
        assert_eq!(parse_sector_size(" 512B"), Some(512));
        assert_eq!(parse_sector_size("4 KB"), Some(4096));
        assert_eq!(parse_sector_size("4KB"), Some(4096));
        assert_eq!(parse_sector_size("-"), None);

        let text = "\
Drive /c0/e252/s2 :
=================
252:2     9 Onln   0 14.551 TB SATA HDD N   N  4 KB WDC WUH721816ALE6L4 U  -

Drive /c0/e252/s2 Device attributes :
===================================
SN = 2CGABCDE
Raw size = 14.552 TB [0xe8e088b00 Sectors]
Sector Size =  4 KB

Drive /c0/e252/s3 :
=================
252:3    10 Onln   0 1.818 TB SATA HDD N   N  512B WDC WD20EFRX-68EUZN0 U  -

Drive /c0/e252/s3 Device attributes :
===================================
Raw size = huge [0xffffffffffffffff Sectors]
";
        let drives = parse_drives(text);
        assert_eq!(drives.len(), 2);
        assert_eq!(drives[0].size, Some(0xe8e088b00 * 4096));
        assert_eq!(drives[1].size, None);
    }

    #[test]
    fn parses_virtual_drive_members() {
        let members = parse_virtual_drives(VDS);
        assert_eq!(members, vec![
            VdMember { controller: 0, vd: 0, did: 7 },
            VdMember { controller: 0, vd: 0, did: 8 },
        ]);
        assert_eq!(members[0].group(), "c0v0");
    }

    #[test]
    fn drive_path_without_enclosure() {
        assert_eq!(parse_drive_path("/c1/s4"), Some((1, None, 4)));
        assert_eq!(parse_drive_path("/c0/e252/s3"), Some((0, Some(252), 3)));
        assert_eq!(parse_drive_path("/c0/x1"), None);
    }

    #[test]
    fn controller_drives_converge_with_block_devices() {
        let mut inv = Inventory::new();
        for d in parse_drives(DRIVES) {
            inv.observe(Key::Controller(&d.cid()), d.facts());
        }
        for m in parse_virtual_drives(VDS) {
            let cid = format!("c{}d{}", m.controller, m.did);
            inv.annotate(Key::Controller(&cid), Facts { array: Some(m.group()), ..Default::default() });
        }
        assert_eq!(inv.len(), 2);

        let id = inv.observe(
            Key::Node("sdb"),
            Facts { serial: Some("WD-WCC4M1234567".into()), state: None, ..Default::default() },
        );
        assert_eq!(id, "sdb");
        assert_eq!(inv.len(), 2);
        let rec = inv.get("sdb").unwrap();
        assert_eq!(rec.array.as_deref(), Some("c0v0"));
        assert_eq!(rec.state.as_deref(), Some("Onln"));
        assert_eq!(inv.bay(&Location::Controller { controller: 0, enclosure: 252, slot: 0 }).map(|d| d.id.as_str()), Some("sdb"));
    }
}
