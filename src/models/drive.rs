use crate::models::location::{Location, Placement};
use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder rendered for any field no collector could fill.
pub const UNKNOWN: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    SataHdd,
    SataSsd,
    SasHdd,
    SasSsd,
    NvmeSsd,
    NvmeOptane,
    Iscsi,
    Dvd,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::SataHdd    => "SATA-HDD",
            MediaKind::SataSsd    => "SATA-SSD",
            MediaKind::SasHdd     => "SAS-HDD",
            MediaKind::SasSsd     => "SAS-SSD",
            MediaKind::NvmeSsd    => "NVME-SSD",
            MediaKind::NvmeOptane => "NVME-Optane",
            MediaKind::Iscsi      => "iSCSI",
            MediaKind::Dvd        => "DVD",
        }
    }

    /// Map an interface/medium pair as printed by controller tools
    /// (`SATA`/`SAS`/`NVMe`, `HDD`/`SSD`).
    pub fn from_interface(intf: &str, medium: &str) -> Option<MediaKind> {
        let ssd = medium.eq_ignore_ascii_case("ssd");
        match intf.to_ascii_uppercase().as_str() {
            "SATA" if ssd => Some(MediaKind::SataSsd),
            "SATA"        => Some(MediaKind::SataHdd),
            "SAS" if ssd  => Some(MediaKind::SasSsd),
            "SAS"         => Some(MediaKind::SasHdd),
            "NVME"        => Some(MediaKind::NvmeSsd),
            _             => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Usb,
    M2,
}

/// Media/interface type, optionally qualified by the bus it hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    pub kind:      MediaKind,
    pub qualifier: Option<Qualifier>,
}

impl MediaType {
    pub fn new(kind: MediaKind) -> Self {
        Self { kind, qualifier: None }
    }

    pub fn with(kind: MediaKind, qualifier: Qualifier) -> Self {
        Self { kind, qualifier: Some(qualifier) }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            None                 => write!(f, "{}", self.kind.label()),
            Some(Qualifier::Usb) => write!(f, "{}/USB", self.kind.label()),
            Some(Qualifier::M2)  => write!(f, "{}/M.2", self.kind.label()),
        }
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Boot-loader code found in the first sector of a disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootCode {
    Grub,
    Syslinux,
    Windows,
    Other,
}

impl BootCode {
    pub fn label(&self) -> &'static str {
        match self {
            BootCode::Grub     => "grub",
            BootCode::Syslinux => "syslinux",
            BootCode::Windows  => "windows",
            BootCode::Other    => "mbr",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootInfo {
    /// Partition table type (`gpt`, `dos`).
    pub table: Option<String>,
    /// Carries an EFI system partition.
    pub efi:   bool,
    /// Boot code signature in sector 0.
    pub code:  Option<BootCode>,
}

impl fmt::Display for BootInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(t) = &self.table { parts.push(t); }
        if self.efi { parts.push("efi"); }
        if let Some(c) = &self.code { parts.push(c.label()); }
        if parts.is_empty() {
            write!(f, "{}", UNKNOWN)
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// How the OS is currently using a drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Usage {
    Mounted(Vec<String>),
    Member(String),
    Partitioned,
    Unused,
}

impl Usage {
    pub fn is_unused(&self) -> bool {
        *self == Usage::Unused
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Usage::Mounted(m)  => write!(f, "{}", m.join(",")),
            Usage::Member(fs)  => write!(f, "{}", fs),
            Usage::Partitioned => write!(f, "partitioned"),
            Usage::Unused      => write!(f, "unused"),
        }
    }
}

impl Serialize for Usage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Merged view of one physical drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriveRecord {
    pub id:            String,
    pub size:          Option<u64>,
    pub media:         Option<MediaType>,
    pub boot:          Option<BootInfo>,
    pub usage:         Option<Usage>,
    pub location:      Option<Location>,
    pub vendor:        Option<String>,
    pub model:         Option<String>,
    pub firmware:      Option<String>,
    pub serial:        Option<String>,
    pub alias:         Option<String>,
    pub driver:        Option<String>,
    pub health:        Option<String>,
    pub defects:       Option<u64>,
    pub wear:          Option<u8>,
    pub state:         Option<String>,
    pub array:         Option<String>,
    pub controller_id: Option<String>,
}

impl DriveRecord {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }

    /// Re-express this record as a set of facts, for folding it into another.
    pub fn into_facts(self) -> Facts {
        Facts {
            size:          self.size,
            media:         self.media,
            boot:          self.boot,
            usage:         self.usage,
            location:      self.location.map(Placement::At),
            vendor:        self.vendor,
            model:         self.model,
            firmware:      self.firmware,
            serial:        self.serial,
            alias:         self.alias,
            driver:        self.driver,
            health:        self.health,
            defects:       self.defects,
            wear:          self.wear,
            state:         self.state,
            array:         self.array,
            controller_id: self.controller_id,
        }
    }
}

/// A partial observation about one drive, as produced by a collector.
/// `None` means "this source has nothing to say", never "clear it".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    pub size:          Option<u64>,
    pub media:         Option<MediaType>,
    pub boot:          Option<BootInfo>,
    pub usage:         Option<Usage>,
    pub location:      Option<Placement>,
    pub vendor:        Option<String>,
    pub model:         Option<String>,
    pub firmware:      Option<String>,
    pub serial:        Option<String>,
    pub alias:         Option<String>,
    pub driver:        Option<String>,
    pub health:        Option<String>,
    pub defects:       Option<u64>,
    pub wear:          Option<u8>,
    pub state:         Option<String>,
    pub array:         Option<String>,
    pub controller_id: Option<String>,
}

/// Normalise a text value from an external tool; placeholders become `None`.
pub fn known(s: &str) -> Option<String> {
    let t = s.trim();
    let placeholder = t.is_empty()
        || t == UNKNOWN
        || ["none", "n/a", "na", "unknown", "null", "(null)"].iter().any(|p| t.eq_ignore_ascii_case(p));
    if placeholder { None } else { Some(t.to_string()) }
}

pub fn short_serial(serial: &str) -> &str {
    match serial.char_indices().nth(8) {
        Some((i, _)) => &serial[..i],
        None         => serial,
    }
}

/// Format a WWN/NAA hex string as the `/dev/disk/by-id` alias udev creates.
pub fn wwn_alias(wwn: &str) -> Option<String> {
    let hex = wwn.trim().trim_start_matches("0x").trim_start_matches("0X").to_ascii_lowercase();
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("wwn-0x{}", hex))
}

// ── Vendor prefixes ──────────────────────────────────────────────────

/// Leading model words that name the manufacturer.
const VENDOR_WORDS: &[&str] = &[
    "ADATA", "Apacer", "Corsair", "Crucial", "Dell", "HGST", "Hitachi", "HP", "HPE",
    "INTEL", "KINGSTON", "KIOXIA", "Lexar", "LENOVO", "Micron", "Netac", "Patriot",
    "PNY", "Samsung", "SanDisk", "Seagate", "SK", "TEAM", "TOSHIBA", "Transcend",
    "WD", "WDC",
];

/// Split a raw model string into `(manufacturer, model)`.
///
/// `hint` is a separately reported vendor column; generic transport names
/// such as `ATA` are ignored.
pub fn split_vendor(raw_model: &str, hint: Option<&str>) -> (Option<String>, Option<String>) {
    let model = raw_model.trim();
    if model.is_empty() {
        return (hint.and_then(vendor_hint), None);
    }

    if let Some(pos) = model.find(|c: char| c == ' ' || c == '_') {
        let head = &model[..pos];
        if let Some(word) = VENDOR_WORDS.iter().find(|w| w.eq_ignore_ascii_case(head)) {
            let rest = model[pos + 1..].trim();
            // "SK hynix" is two words
            if *word == "SK" {
                if let Some(tail) = rest.strip_prefix("hynix") {
                    return (Some("SK hynix".into()), known(tail));
                }
            } else {
                return (Some(head.to_string()), known(rest));
            }
        }
    }

    if let Some(v) = hint.and_then(vendor_hint) {
        let stripped = model.strip_prefix(v.as_str()).map(str::trim).unwrap_or(model);
        return (Some(v), known(stripped));
    }

    let seagate = model.starts_with("ST")
        && model.get(2..).map_or(false, |t| t.starts_with(|c: char| c.is_ascii_digit()));
    if seagate {
        return (Some("Seagate".into()), Some(model.to_string()));
    }
    (None, Some(model.to_string()))
}

fn vendor_hint(v: &str) -> Option<String> {
    known(v).filter(|v| !v.eq_ignore_ascii_case("ATA"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_manufacturer_prefix() {
        assert_eq!(
            split_vendor("WDC WD40EFRX-68N32N0", None),
            (Some("WDC".into()), Some("WD40EFRX-68N32N0".into()))
        );
        assert_eq!(
            split_vendor("Micron_5200_MTFDDAK960TDD", None),
            (Some("Micron".into()), Some("5200_MTFDDAK960TDD".into()))
        );
        assert_eq!(
            split_vendor("SK hynix PC711", None),
            (Some("SK hynix".into()), Some("PC711".into()))
        );
        assert_eq!(
            split_vendor("ST4000NM0035-1V4107", Some("ATA")),
            (Some("Seagate".into()), Some("ST4000NM0035-1V4107".into()))
        );
        assert_eq!(
            split_vendor("HUS726040AL5210", Some("HGST    ")),
            (Some("HGST".into()), Some("HUS726040AL5210".into()))
        );
        assert_eq!(split_vendor("QEMU HARDDISK", None), (None, Some("QEMU HARDDISK".into())));
    }

    #[test]
    fn placeholders_are_not_values() {
        assert_eq!(known("  -  "), None);
        assert_eq!(known("N/A"), None);
        assert_eq!(known(""), None);
        assert_eq!(known(" ZA1B2C3D "), Some("ZA1B2C3D".into()));
    }

    #[test]
    fn short_serial_is_eight_chars() {
        assert_eq!(short_serial("ZA1B2C3D0000C9123ABC"), "ZA1B2C3D");
        assert_eq!(short_serial("S1"), "S1");
    }

    #[test]
    fn formats_wwn_alias() {
        assert_eq!(wwn_alias("0x5000C500A1B2C3D4").as_deref(), Some("wwn-0x5000c500a1b2c3d4"));
        assert_eq!(wwn_alias("5002538C40123456").as_deref(), Some("wwn-0x5002538c40123456"));
        assert_eq!(wwn_alias("NA"), None);
    }

    #[test]
    fn boot_info_display() {
        let b = BootInfo { table: Some("gpt".into()), efi: true, code: Some(BootCode::Grub) };
        assert_eq!(b.to_string(), "gpt+efi+grub");
        assert_eq!(BootInfo::default().to_string(), "-");
    }
}
