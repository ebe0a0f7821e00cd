use crate::collectors::exec::{find_tool, run_capture};
use crate::collectors::{boot, smart, Context};
use crate::models::drive::{known, split_vendor, wwn_alias, BootCode, BootInfo, Facts, MediaKind, MediaType, Qualifier, Usage};
use crate::models::location::{Bus, Location, Placement};
use crate::registry::{Inventory, Key};
use anyhow::{Context as _, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

const COLUMNS: &str = "NAME,TYPE,SIZE,FSTYPE,PTTYPE,PARTTYPE,MOUNTPOINT,MODEL,VENDOR,SERIAL,REV,ROTA,TRAN,WWN";
const ESP_GUID: &str = "c12a7328-f81f-11d2-ba4b-00a0c93ec93b";

/// A partition or stacked device below a disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    pub name:       String,
    pub dev_type:   String,
    pub fs_type:    Option<String>,
    pub part_type:  Option<String>,
    pub mountpoint: Option<String>,
}

/// Metadata for one top-level disk device from lsblk.
#[derive(Debug, Clone, PartialEq)]
pub struct LsblkDisk {
    pub name:       String,
    pub dev_type:   String,
    pub size:       u64,
    pub fs_type:    Option<String>,
    pub pt_type:    Option<String>,
    pub mountpoint: Option<String>,
    pub model:      Option<String>,
    pub vendor:     Option<String>,
    pub serial:     Option<String>,
    pub revision:   Option<String>,
    pub rotational: bool,
    pub transport:  Option<String>,
    pub wwn:        Option<String>,
    /// All descendants, depth-first.
    pub children:   Vec<Child>,
}

pub fn collect(inv: &mut Inventory, ctx: &Context) -> Result<()> {
    let Some(lsblk) = find_tool(&["lsblk"]) else {
        debug!("lsblk not found, skipping block devices");
        return Ok(());
    };
    let json = run_capture(&lsblk, &["--json", "--bytes", "-o", COLUMNS])?;
    let disks = parse_lsblk(&json).context("unexpected lsblk output")?;
    let by_id = read_links(Path::new("/dev/disk/by-id"));
    let by_path = read_links(Path::new("/dev/disk/by-path"));

    for disk in disks {
        if ctx.config.devices.is_excluded(&disk.name) {
            continue;
        }
        let device = format!("/dev/{}", disk.name);
        let code = boot::read_sector(Path::new(&device)).and_then(|s| boot::scan(&s));
        let expander = by_path
            .iter()
            .filter(|(_, node)| **node == disk.name)
            .find_map(|(link, _)| parse_expander_slot(link));

        let id = observe_disk(inv, &disk, code, expander);

        for (alias, node) in &by_id {
            if *node == disk.name && !alias.contains("-part") {
                inv.bind_alias(alias, &id);
            }
        }

        if let Some(probe) = &ctx.smart {
            if disk.dev_type == "disk" {
                if let Some(facts) = probe.probe(&id, &device, &smart::os_hints()) {
                    inv.annotate(Key::Node(&id), facts);
                }
            }
        }
    }
    Ok(())
}

/// Fold one lsblk disk into the registry; returns its canonical id.
pub fn observe_disk(
    inv: &mut Inventory,
    disk: &LsblkDisk,
    code: Option<BootCode>,
    expander: Option<(String, u32)>,
) -> String {
    let (vendor, model) = split_vendor(disk.model.as_deref().unwrap_or(""), disk.vendor.as_deref());
    let location = match expander {
        Some((enclosure, slot)) => Some(Placement::At(Location::Enclosure { enclosure, slot })),
        None => bus_of(disk).map(Placement::NextOn),
    };
    let facts = Facts {
        size:     Some(disk.size).filter(|s| *s > 0),
        media:    media_of(disk),
        boot:     Some(boot_info(disk, code)),
        usage:    Some(usage_of(disk)),
        location,
        vendor,
        model,
        firmware: disk.revision.clone(),
        serial:   disk.serial.clone(),
        alias:    disk.wwn.as_deref().and_then(|w| wwn_alias_for(disk, w)),
        ..Default::default()
    };
    let id = inv.observe(Key::Node(&disk.name), facts);
    for child in &disk.children {
        if child.dev_type == "part" {
            inv.bind_node(&child.name, &id);
        }
    }
    id
}

/// Parse `lsblk --json` into disks; partitions and stacked devices are
/// folded into their disk's `children`.
pub fn parse_lsblk(json: &str) -> Result<Vec<LsblkDisk>> {
    let v: Value = serde_json::from_str(json)?;
    let devices = v["blockdevices"].as_array().cloned().unwrap_or_default();

    let mut disks = Vec::new();
    for dev in &devices {
        let name = dev["name"].as_str().unwrap_or("").to_string();
        let dev_type = dev["type"].as_str().unwrap_or("").to_string();
        if name.is_empty() { continue; }
        if dev_type != "disk" && dev_type != "rom" { continue; }
        if name.starts_with("md") || name.starts_with("dm-") || name.starts_with("zram") {
            continue;
        }

        let mut children = Vec::new();
        parse_children(dev, &mut children);

        disks.push(LsblkDisk {
            name,
            dev_type,
            size:       as_u64(&dev["size"]),
            fs_type:    str_opt(&dev["fstype"]),
            pt_type:    str_opt(&dev["pttype"]),
            mountpoint: str_opt(&dev["mountpoint"]),
            model:      str_opt(&dev["model"]),
            vendor:     str_opt(&dev["vendor"]),
            serial:     str_opt(&dev["serial"]),
            revision:   str_opt(&dev["rev"]),
            rotational: as_bool(&dev["rota"]),
            transport:  str_opt(&dev["tran"]),
            wwn:        str_opt(&dev["wwn"]),
            children,
        });
    }
    Ok(disks)
}

fn parse_children(dev: &Value, out: &mut Vec<Child>) {
    let Some(children) = dev["children"].as_array() else { return };
    for child in children {
        let Some(name) = child["name"].as_str() else { continue };
        out.push(Child {
            name:       name.to_string(),
            dev_type:   child["type"].as_str().unwrap_or("").to_string(),
            fs_type:    str_opt(&child["fstype"]),
            part_type:  str_opt(&child["parttype"]),
            mountpoint: str_opt(&child["mountpoint"]),
        });
        parse_children(child, out);
    }
}

fn bus_of(disk: &LsblkDisk) -> Option<Bus> {
    match disk.transport.as_deref().unwrap_or("") {
        "nvme"                => Some(Bus::Nvme),
        "usb"                 => Some(Bus::Usb),
        "sata" | "ata"        => Some(Bus::Sata),
        // Some SATA links report no transport at all
        "" if disk.name.starts_with("sd") || disk.dev_type == "rom" => Some(Bus::Sata),
        _                     => None,
    }
}

pub fn media_of(disk: &LsblkDisk) -> Option<MediaType> {
    let tran = disk.transport.as_deref().unwrap_or("");
    let model = disk.model.as_deref().unwrap_or("");
    let kind = if disk.dev_type == "rom" {
        MediaKind::Dvd
    } else {
        match tran {
            "iscsi" => MediaKind::Iscsi,
            "nvme" if model.to_ascii_uppercase().contains("OPTANE") => MediaKind::NvmeOptane,
            "nvme" => MediaKind::NvmeSsd,
            "sas" if disk.rotational => MediaKind::SasHdd,
            "sas" => MediaKind::SasSsd,
            "sata" | "ata" | "usb" if disk.rotational => MediaKind::SataHdd,
            "sata" | "ata" | "usb" => MediaKind::SataSsd,
            _ => return None,
        }
    };
    Some(if tran == "usb" { MediaType::with(kind, Qualifier::Usb) } else { MediaType::new(kind) })
}

pub fn usage_of(disk: &LsblkDisk) -> Usage {
    let mut mounts: Vec<String> = disk.mountpoint.iter()
        .chain(disk.children.iter().filter_map(|c| c.mountpoint.as_ref()))
        .cloned()
        .collect();
    mounts.sort();
    mounts.dedup();
    if !mounts.is_empty() {
        return Usage::Mounted(mounts);
    }
    let member = disk.fs_type.as_ref()
        .or_else(|| disk.children.iter().find_map(|c| c.fs_type.as_ref()));
    match member {
        Some(fs) => Usage::Member(fs.clone()),
        None if !disk.children.is_empty() => Usage::Partitioned,
        None => Usage::Unused,
    }
}

fn boot_info(disk: &LsblkDisk, code: Option<BootCode>) -> BootInfo {
    let efi = disk.children.iter().any(|c| {
        c.part_type.as_deref().map_or(false, |t| t.eq_ignore_ascii_case(ESP_GUID) || t == "0xef")
    });
    BootInfo { table: disk.pt_type.clone(), efi, code }
}

fn wwn_alias_for(disk: &LsblkDisk, wwn: &str) -> Option<String> {
    if let Some(eui) = wwn.strip_prefix("eui.") {
        return Some(format!("nvme-eui.{}", eui));
    }
    if disk.transport.as_deref() == Some("nvme") {
        return None;
    }
    wwn_alias(wwn)
}

/// `/dev/disk/by-*` link name → target device node name.
pub fn read_links(dir: &Path) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let Ok(entries) = fs::read_dir(dir) else { return map };
    for entry in entries.flatten() {
        let Ok(target) = fs::read_link(entry.path()) else { continue };
        let Some(node) = target.file_name() else { continue };
        map.insert(
            entry.file_name().to_string_lossy().into_owned(),
            node.to_string_lossy().into_owned(),
        );
    }
    map
}

/// Extract `(expander address, phy)` from a by-path name such as
/// `pci-0000:03:00.0-sas-exp0x500056b37789abff-phy5-lun-0`.
pub fn parse_expander_slot(link: &str) -> Option<(String, u32)> {
    if link.contains("-part") {
        return None;
    }
    let exp = link.split('-').find_map(|t| t.strip_prefix("exp"))?;
    let phy = link.split('-').find_map(|t| t.strip_prefix("phy"))?.parse().ok()?;
    Some((exp.to_string(), phy))
}

fn str_opt(v: &Value) -> Option<String> {
    v.as_str().and_then(known)
}

// Older lsblk prints numbers and booleans as strings.
fn as_u64(v: &Value) -> u64 {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())).unwrap_or(0)
}

fn as_bool(v: &Value) -> bool {
    v.as_bool().unwrap_or_else(|| matches!(v.as_str(), Some("1")))
}
