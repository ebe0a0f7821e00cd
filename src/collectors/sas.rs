use crate::collectors::exec::{find_tool, run_capture};
use crate::collectors::Context;
use crate::models::drive::{known, split_vendor, wwn_alias, Facts, MediaKind, MediaType};
use crate::models::location::{Location, Placement};
use crate::registry::{Inventory, Key};
use anyhow::Result;
use tracing::debug;

/// LSI HBA utilities, newest generation first.
pub const TOOLS: &[&str] = &["sas3ircu", "sas2ircu"];

/// A disk from `sasNircu C DISPLAY`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HbaDisk {
    pub controller:   u32,
    pub enclosure:    Option<u32>,
    pub slot:         Option<u32>,
    pub state:        Option<String>,
    pub drive_type:   Option<String>,
    pub sectors:      Option<u64>,
    pub manufacturer: Option<String>,
    pub model:        Option<String>,
    pub firmware:     Option<String>,
    pub serial:       Option<String>,
    pub guid:         Option<String>,
}

impl HbaDisk {
    pub fn facts(&self) -> Facts {
        let (vendor, model) = split_vendor(self.model.as_deref().unwrap_or(""), self.manufacturer.as_deref());
        // "SAS_HDD", "SATA_SSD"
        let media = self.drive_type.as_deref()
            .and_then(|t| t.split_once('_'))
            .and_then(|(intf, med)| MediaKind::from_interface(intf, med))
            .map(MediaType::new);
        let location = match (self.enclosure, self.slot) {
            (Some(enclosure), Some(slot)) => Some(Placement::At(Location::Controller {
                controller: self.controller,
                enclosure,
                slot,
            })),
            _ => None,
        };
        Facts {
            size:     self.sectors.and_then(|s| s.checked_mul(512)),
            media,
            location,
            vendor,
            model,
            firmware: self.firmware.clone(),
            serial:   self.serial.clone(),
            alias:    self.guid.as_deref().and_then(wwn_alias),
            state:    self.state.clone(),
            ..Default::default()
        }
    }
}

pub fn collect(inv: &mut Inventory, _ctx: &Context) -> Result<()> {
    let Some(tool) = find_tool(TOOLS) else {
        debug!("sas2ircu/sas3ircu not found, skipping SAS HBAs");
        return Ok(());
    };
    for controller in parse_list(&run_capture(&tool, &["LIST"])?) {
        let c = controller.to_string();
        let text = match run_capture(&tool, &[c.as_str(), "DISPLAY"]) {
            Ok(t) => t,
            Err(e) => {
                debug!("controller {}: {:#}", controller, e);
                continue;
            }
        };
        for disk in parse_display(controller, &text) {
            let Some(serial) = disk.serial.clone() else { continue };
            // The HBA exposes every disk to the OS; an unknown serial is not a new drive
            inv.annotate(Key::Serial(&serial), disk.facts());
        }
    }
    Ok(())
}

/// Controller indices from `sasNircu LIST`.
pub fn parse_list(text: &str) -> Vec<u32> {
    text.lines()
        .filter_map(|line| {
            let mut t = line.split_whitespace();
            let index = t.next()?.parse().ok()?;
            t.next()?;
            Some(index)
        })
        .collect()
}

/// Map HBA state text onto the controller vocabulary.
pub fn normalize_state(raw: &str) -> Option<String> {
    let word = raw.split(" (").next().unwrap_or(raw);
    match word.trim() {
        "Optimal" => Some("Online".into()),
        other     => known(other),
    }
}

pub fn parse_display(controller: u32, text: &str) -> Vec<HbaDisk> {
    let mut disks = Vec::new();
    let mut current: Option<HbaDisk> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Device is a") || trimmed == "Enclosure information" {
            disks.extend(current.take());
            if trimmed == "Device is a Hard disk" {
                current = Some(HbaDisk { controller, ..Default::default() });
            }
            if trimmed == "Enclosure information" {
                break;
            }
            continue;
        }

        let Some(d) = current.as_mut() else { continue };
        let Some((key, value)) = trimmed.split_once(':') else { continue };
        let value = value.trim();
        match key.trim() {
            "Enclosure #"       => d.enclosure = value.parse().ok(),
            "Slot #"            => d.slot = value.parse().ok(),
            "State"             => d.state = normalize_state(value),
            "Drive Type"        => d.drive_type = known(value),
            "Manufacturer"      => d.manufacturer = known(value),
            "Model Number"      => d.model = known(value),
            "Firmware Revision" => d.firmware = known(value),
            "Serial No"         => d.serial = known(value),
            "GUID"              => d.guid = known(value),
            "Size (in MB)/(in sectors)" => {
                d.sectors = value.split('/').nth(1).and_then(|s| s.trim().parse().ok());
            }
            _ => {}
        }
    }
    disks.extend(current);
    disks
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\
Avago Technologies SAS3 IR Configuration Utility.
Version 16.00.00.00 (2017.04.26)

         Adapter      Vendor  Device                       SubSys  SubSys
 Index    Type          ID      ID    Pci Address          Ven ID  Dev ID
 -----  ------------  ------  ------  -----------------    ------  ------
   0     SAS3008       1000h    97h   00h:03h:00h:00h      1000h   30e0h
   1     SAS3008       1000h    97h   00h:04h:00h:00h      1000h   30e0h
SAS3IRCU: Utility Completed Successfully.
";

    const DISPLAY: &str = "\
Read configuration has been initiated for controller 0
------------------------------------------------------------------------
Physical device information
------------------------------------------------------------------------
Initiator at ID #0

Device is a Hard disk
  Enclosure #                             : 2
  Slot #                                  : 0
  SAS Address                             : 5000cca-0-2b01-c2d5
  State                                   : Ready (RDY)
  Size (in MB)/(in sectors)               : 3815447/7814037167
  Manufacturer                            : HGST
  Model Number                            : HUS726040AL5210
  Firmware Revision                       : A7J0
  Serial No                               : K4KABCDE
  GUID                                    : 5000cca02b01c2d4
  Protocol                                : SAS
  Drive Type                              : SAS_HDD

Device is a Hard disk
  Enclosure #                             : 2
  Slot #                                  : 1
  State                                   : Optimal (OPT)
  Manufacturer                            : ATA
  Model Number                            : Samsung SSD 860
  Firmware Revision                       : 4B6Q
  Serial No                               : S3Z9NB0K
  GUID                                    : N/A
  Protocol                                : SATA
  Drive Type                              : SATA_SSD

Device is a Enclosure services device
  Enclosure #                             : 2
  Slot #                                  : 36
------------------------------------------------------------------------
Enclosure information
------------------------------------------------------------------------
  Enclosure#                              : 2
  Logical ID                              : 500304801c2d0b7f
";

    #[test]
    fn lists_controller_indices() {
        assert_eq!(parse_list(LIST), vec![0, 1]);
    }

    #[test]
    fn parses_hard_disks_only() {
        let disks = parse_display(0, DISPLAY);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].serial.as_deref(), Some("K4KABCDE"));
        assert_eq!(disks[0].state.as_deref(), Some("Ready"));
        assert_eq!(disks[1].state.as_deref(), Some("Online"));
        assert_eq!(disks[1].guid, None);

        let f = disks[0].facts();
        assert_eq!(f.location, Some(Placement::At(Location::Controller { controller: 0, enclosure: 2, slot: 0 })));
        assert_eq!(f.media.unwrap().to_string(), "SAS-HDD");
        assert_eq!(f.size, Some(7814037167 * 512));
        assert_eq!(f.alias.as_deref(), Some("wwn-0x5000cca02b01c2d4"));
        assert_eq!(disks[1].facts().vendor.as_deref(), Some("Samsung"));
    }

    #[test]
    fn oversized_sector_count_has_no_size() {
        let disk = HbaDisk { sectors: Some(u64::MAX), ..Default::default() };
        assert_eq!(disk.facts().size, None);
    }

    #[test]
    fn short_serials_refine_expander_slots() {
        let mut inv = Inventory::new();
        inv.observe(
            Key::Node("sdd"),
            Facts {
                serial:   Some("S3Z9NB0K123456".into()),
                location: Some(Placement::At(Location::Enclosure { enclosure: "0x500304801c2d0b7f".into(), slot: 1 })),
                ..Default::default()
            },
        );
        for disk in parse_display(0, DISPLAY) {
            let serial = disk.serial.clone().unwrap();
            inv.annotate(Key::Serial(&serial), disk.facts());
        }
        // K4KABCDE is unknown to the OS view and is dropped
        assert_eq!(inv.len(), 1);
        let rec = inv.get("sdd").unwrap();
        assert_eq!(rec.location, Some(Location::Controller { controller: 0, enclosure: 2, slot: 1 }));
        assert_eq!(rec.state.as_deref(), Some("Online"));
        assert_eq!(rec.serial.as_deref(), Some("S3Z9NB0K123456"));
        assert!(inv.bay(&Location::Enclosure { enclosure: "0x500304801c2d0b7f".into(), slot: 1 }).is_none());
    }
}
