use crate::collectors::exec::{self, find_tool};
use crate::collectors::smart_cache::{CachedProbe, SmartCache};
use crate::models::drive::{known, split_vendor, wwn_alias, Facts, MediaKind, MediaType, Qualifier};
use crate::models::location::{Bus, Placement};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Driver hints tried, in order, for a device the OS exposes directly.
pub const OS_HINTS: &[&str] = &["auto", "sat", "scsi", "nvme", "usbjmicron", "usbcypress", "usbsunplus"];

/// smartctl exit bits 0-2 (bad command line, open failed, SMART command
/// failed) mean the hint does not apply; higher bits report drive state.
const FATAL_BITS: i32 = 0b111;

pub fn accepted(code: i32) -> bool {
    code >= 0 && code & FATAL_BITS == 0
}

/// Hints for a drive hidden behind a MegaRAID controller.
pub fn megaraid_hints(did: u32) -> Vec<String> {
    vec![format!("megaraid,{}", did)]
}

pub fn os_hints() -> Vec<String> {
    OS_HINTS.iter().map(|h| h.to_string()).collect()
}

/// SMART probing shared by the collectors that discover drives.
#[derive(Debug, Clone)]
pub struct SmartProbe {
    tool:  Option<PathBuf>,
    cache: Option<SmartCache>,
}

impl SmartProbe {
    pub fn new(cache: Option<SmartCache>) -> Self {
        let tool = find_tool(&["smartctl"]);
        if tool.is_none() {
            debug!("smartctl not found, SMART data limited to cache");
        }
        Self { tool, cache }
    }

    /// Probe `device` with each hint in turn and parse the first accepted
    /// answer. With a cache, a stored answer for `id` is replayed instead.
    pub fn probe(&self, id: &str, device: &str, hints: &[String]) -> Option<Facts> {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.load(id)) {
            debug!("{}: replaying cached smartctl output ({})", id, hit.driver);
            return parse_smartctl(&hit.output, &hit.driver);
        }

        let tool = self.tool.as_ref()?;
        for hint in hints {
            let out = match exec::run(tool, &["--json=c", "-x", "-d", hint, device]) {
                Ok(o)  => o,
                Err(e) => {
                    warn!("{:#}", e);
                    return None;
                }
            };
            if !accepted(out.code) {
                debug!("{}: smartctl -d {} exit {}, trying next hint", id, hint, out.code);
                continue;
            }
            if let Some(cache) = &self.cache {
                cache.store(id, &CachedProbe { driver: hint.clone(), output: out.stdout.clone() });
            }
            return parse_smartctl(&out.stdout, hint);
        }
        None
    }
}

/// Parse `smartctl --json` output into drive facts.
pub fn parse_smartctl(text: &str, driver: &str) -> Option<Facts> {
    let v: Value = serde_json::from_str(text).ok()?;
    let protocol = v["device"]["protocol"].as_str().unwrap_or("").to_ascii_uppercase();

    let raw_model = v["model_name"].as_str()
        .or_else(|| v["scsi_model_name"].as_str())
        .or_else(|| v["scsi_product"].as_str())
        .unwrap_or("");
    let (vendor, model) = split_vendor(raw_model, v["scsi_vendor"].as_str());

    let firmware = v["firmware_version"].as_str()
        .or_else(|| v["scsi_revision"].as_str())
        .and_then(known);

    let alias = parse_wwn(&v)
        .or_else(|| v["logical_unit_id"].as_str().and_then(wwn_alias));

    let rotation = v["rotation_rate"].as_u64();
    let media = match protocol.as_str() {
        "ATA" => rotation.map(|r| MediaType::new(if r == 0 { MediaKind::SataSsd } else { MediaKind::SataHdd })),
        "SCSI" => rotation.map(|r| MediaType::new(if r == 0 { MediaKind::SasSsd } else { MediaKind::SasHdd })),
        "NVME" if is_optane(raw_model) => Some(MediaType::new(MediaKind::NvmeOptane)),
        "NVME" => Some(MediaType::new(MediaKind::NvmeSsd)),
        _ => None,
    };

    let health = v["smart_status"]["passed"].as_bool().map(|passed| {
        match (passed, protocol.as_str()) {
            (true, "SCSI") => "OK".to_string(),
            (true, _)      => "PASSED".to_string(),
            (false, _)     => "FAILED".to_string(),
        }
    });

    let defects = v["scsi_grown_defect_list"].as_u64()
        .or_else(|| ata_attr(&v, 5).and_then(|a| a["raw"]["value"].as_u64()));

    let m2 = v["form_factor"]["name"].as_str().map_or(false, |f| f.contains("M.2"));
    let media = media.map(|m| if m2 { MediaType::with(m.kind, Qualifier::M2) } else { m });
    let location = m2.then_some(Placement::NextOn(Bus::M2));

    Some(Facts {
        size:     v["user_capacity"]["bytes"].as_u64().filter(|b| *b > 0),
        media,
        vendor,
        model,
        firmware,
        serial:   v["serial_number"].as_str().and_then(known),
        alias,
        driver:   Some(driver.to_string()),
        health,
        defects,
        wear:     parse_wear(&v),
        location,
        ..Default::default()
    })
}

fn is_optane(model: &str) -> bool {
    let m = model.to_ascii_uppercase();
    m.contains("OPTANE") || m.contains("SSDPE21") || m.contains("SSDPED1")
}

fn parse_wwn(v: &Value) -> Option<String> {
    let w = &v["wwn"];
    let naa = w["naa"].as_u64()?;
    let oui = w["oui"].as_u64()?;
    let id  = w["id"].as_u64()?;
    Some(format!("wwn-0x{:x}{:06x}{:09x}", naa, oui, id))
}

fn ata_attr(v: &Value, id: u64) -> Option<&Value> {
    v["ata_smart_attributes"]["table"]
        .as_array()?
        .iter()
        .find(|a| a["id"].as_u64() == Some(id))
}

/// Percentage of rated endurance consumed.
fn parse_wear(v: &Value) -> Option<u8> {
    let pct = v["endurance_used"]["current_percent"].as_u64()
        .or_else(|| v["nvme_smart_health_information_log"]["percentage_used"].as_u64())
        .or_else(|| v["scsi_percentage_used_endurance_indicator"].as_u64())
        .or_else(|| {
            // Wear_Leveling_Count, Media_Wearout_Indicator, SSD_Life_Left:
            // normalised value counts down from 100.
            [177, 233, 231].iter()
                .find_map(|id| ata_attr(v, *id).and_then(|a| a["value"].as_u64()))
                .map(|left| 100u64.saturating_sub(left.min(100)))
        })?;
    Some(pct.min(u8::MAX as u64) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATA_SSD: &str = r#"{
        "device": {"name": "/dev/sda", "type": "sat", "protocol": "ATA"},
        "model_name": "Samsung SSD 860 EVO M.2 500GB",
        "serial_number": "S414NB0K123456A",
        "wwn": {"naa": 5, "oui": 9528, "id": 61234567890},
        "firmware_version": "RVT24B6Q",
        "user_capacity": {"blocks": 976773168, "bytes": 500107862016},
        "rotation_rate": 0,
        "form_factor": {"ata_value": 6, "name": "M.2"},
        "smart_status": {"passed": true},
        "ata_smart_attributes": {"table": [
            {"id": 5, "name": "Reallocated_Sector_Ct", "value": 100, "raw": {"value": 3}},
            {"id": 177, "name": "Wear_Leveling_Count", "value": 96, "raw": {"value": 41}}
        ]}
    }"#;

    const SAS_HDD: &str = r#"{
        "device": {"name": "/dev/sdc", "type": "scsi", "protocol": "SCSI"},
        "scsi_vendor": "SEAGATE",
        "scsi_product": "ST4000NM0025",
        "scsi_model_name": "SEAGATE ST4000NM0025",
        "scsi_revision": "E003",
        "serial_number": "ZC11ABCD0000C8123XYZ",
        "logical_unit_id": "0x5000c500a1b2c3d4",
        "user_capacity": {"bytes": 4000787030016},
        "rotation_rate": 7200,
        "smart_status": {"passed": true},
        "scsi_grown_defect_list": 12,
        "scsi_percentage_used_endurance_indicator": 0
    }"#;

    const NVME: &str = r#"{
        "device": {"name": "/dev/nvme0", "type": "nvme", "protocol": "NVMe"},
        "model_name": "INTEL SSDPE21D280GA",
        "serial_number": "PHM2913000QM280AGN",
        "firmware_version": "E2010435",
        "smart_status": {"passed": false},
        "nvme_smart_health_information_log": {"percentage_used": 7}
    }"#;

    #[test]
    fn parses_sata_ssd() {
        let f = parse_smartctl(ATA_SSD, "sat").unwrap();
        assert_eq!(f.vendor.as_deref(), Some("Samsung"));
        assert_eq!(f.model.as_deref(), Some("SSD 860 EVO M.2 500GB"));
        assert_eq!(f.serial.as_deref(), Some("S414NB0K123456A"));
        assert_eq!(f.alias.as_deref(), Some("wwn-0x5002538e41dd5ad2"));
        assert_eq!(f.media, Some(MediaType::with(MediaKind::SataSsd, Qualifier::M2)));
        assert_eq!(f.health.as_deref(), Some("PASSED"));
        assert_eq!(f.defects, Some(3));
        assert_eq!(f.wear, Some(4));
        assert_eq!(f.location, Some(Placement::NextOn(Bus::M2)));
        assert_eq!(f.driver.as_deref(), Some("sat"));
        assert_eq!(f.size, Some(500107862016));
    }

    #[test]
    fn parses_sas_hdd() {
        let f = parse_smartctl(SAS_HDD, "scsi").unwrap();
        assert_eq!(f.vendor.as_deref(), Some("SEAGATE"));
        assert_eq!(f.model.as_deref(), Some("ST4000NM0025"));
        assert_eq!(f.firmware.as_deref(), Some("E003"));
        assert_eq!(f.alias.as_deref(), Some("wwn-0x5000c500a1b2c3d4"));
        assert_eq!(f.media, Some(MediaType::new(MediaKind::SasHdd)));
        assert_eq!(f.health.as_deref(), Some("OK"));
        assert_eq!(f.defects, Some(12));
        assert_eq!(f.wear, Some(0));
        assert_eq!(f.location, None);
    }

    #[test]
    fn parses_failing_optane() {
        let f = parse_smartctl(NVME, "nvme").unwrap();
        assert_eq!(f.media, Some(MediaType::new(MediaKind::NvmeOptane)));
        assert_eq!(f.health.as_deref(), Some("FAILED"));
        assert_eq!(f.wear, Some(7));
        assert_eq!(f.vendor.as_deref(), Some("INTEL"));
    }

    #[test]
    fn garbage_is_not_a_probe() {
        assert_eq!(parse_smartctl("smartctl: command not found", "auto"), None);
    }

    #[test]
    fn exit_status_acceptance() {
        assert!(accepted(0));
        assert!(accepted(0b1_0000)); // prefail attribute below threshold
        assert!(accepted(0b1100_0000));
        assert!(!accepted(1));
        assert!(!accepted(2));
        assert!(!accepted(0b0100_0100));
        assert!(!accepted(-1));
    }

    #[test]
    fn cache_replay_skips_the_tool() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SmartCache::new(tmp.path());
        cache.store("sdc", &CachedProbe { driver: "scsi".into(), output: SAS_HDD.into() });
        let probe = SmartProbe { tool: None, cache: Some(cache) };
        let f = probe.probe("sdc", "/dev/sdc", &os_hints()).unwrap();
        assert_eq!(f.driver.as_deref(), Some("scsi"));
        assert_eq!(f.serial.as_deref(), Some("ZC11ABCD0000C8123XYZ"));
        assert_eq!(probe.probe("sdd", "/dev/sdd", &os_hints()), None);
    }
}
