//! Cross-reference between the identifier spaces external tools use.

use crate::models::drive::short_serial;
use std::collections::{BTreeMap, BTreeSet};

/// An identifier in one of the key spaces collectors report drives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// Device node name (`sda`, `/dev/nvme0n1`, a partition such as `sda2`).
    Node(&'a str),
    /// Full or 8-character serial number.
    Serial(&'a str),
    /// `/dev/disk/by-id` name (`wwn-0x...`, `ata-...`), partitions allowed.
    Alias(&'a str),
    /// Controller-assigned drive id, e.g. `c0d7`.
    Controller(&'a str),
}

impl Key<'_> {
    /// The bare identifier, stripped of `/dev/` paths and partition suffixes.
    pub fn canonical(&self) -> String {
        match self {
            Key::Node(n)       => node_name(n).to_string(),
            Key::Serial(s)     => s.trim().to_string(),
            Key::Alias(a)      => alias_name(a),
            Key::Controller(c) => c.trim().to_string(),
        }
    }
}

pub fn node_name(path: &str) -> &str {
    let p = path.trim();
    p.strip_prefix("/dev/").unwrap_or(p)
}

/// Strip the by-id directory and any `-partN` suffix.
pub fn alias_name(path: &str) -> String {
    let p = path.trim();
    let base = p.rsplit('/').next().unwrap_or(p);
    if let Some(pos) = base.rfind("-part") {
        let tail = &base[pos + 5..];
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            return base[..pos].to_string();
        }
    }
    base.to_string()
}

/// Lookup tables mapping every known identifier to a canonical drive id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityResolver {
    serial_to_id:     BTreeMap<String, String>,
    id_to_serial:     BTreeMap<String, String>,
    short_to_id:      BTreeMap<String, String>,
    ambiguous_short:  BTreeSet<String>,
    alias_to_serial:  BTreeMap<String, String>,
    alias_to_id:      BTreeMap<String, String>,
    controller_to_id: BTreeMap<String, String>,
    /// Partitions and secondary paths that are views of a drive.
    node_to_id:       BTreeMap<String, String>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a serial, accepting either side of the 8-character short form.
    pub fn by_serial(&self, serial: &str) -> Option<&String> {
        let s = serial.trim();
        if let Some(id) = self.serial_to_id.get(s) {
            return Some(id);
        }
        if s.chars().count() <= 8 {
            if self.ambiguous_short.contains(s) { return None; }
            self.short_to_id.get(s)
        } else {
            self.serial_to_id.get(short_serial(s))
        }
    }

    pub fn by_alias(&self, alias: &str) -> Option<&String> {
        let a = alias_name(alias);
        self.alias_to_serial
            .get(&a)
            .and_then(|s| self.by_serial(s))
            .or_else(|| self.alias_to_id.get(&a))
    }

    pub fn by_controller(&self, cid: &str) -> Option<&String> {
        self.controller_to_id.get(cid.trim())
    }

    /// Map a node to the drive it belongs to, if it is a known view of one.
    pub fn owner_of_node(&self, node: &str) -> Option<&String> {
        self.node_to_id.get(node_name(node))
    }

    pub fn serial_of(&self, id: &str) -> Option<&String> {
        self.id_to_serial.get(id)
    }

    /// Record `serial` as belonging to `id`. The first binding of a serial
    /// stands; returns the id it is bound to.
    pub fn bind_serial(&mut self, serial: &str, id: &str) -> String {
        let serial = serial.trim();
        if let Some(existing) = self.serial_to_id.get(serial) {
            return existing.clone();
        }
        self.serial_to_id.insert(serial.to_string(), id.to_string());
        self.id_to_serial.entry(id.to_string()).or_insert_with(|| serial.to_string());

        let short = short_serial(serial).to_string();
        if !self.ambiguous_short.contains(&short) {
            match self.short_to_id.get(&short) {
                Some(other) if other != id => {
                    self.short_to_id.remove(&short);
                    self.ambiguous_short.insert(short);
                }
                Some(_) => {}
                None => {
                    self.short_to_id.insert(short, id.to_string());
                }
            }
        }
        id.to_string()
    }

    /// Record a by-id alias. Aliases route through the serial when one is
    /// known so they follow the drive across renames.
    pub fn bind_alias(&mut self, alias: &str, serial: Option<&str>, id: &str) {
        let a = alias_name(alias);
        match serial {
            Some(s) => { self.alias_to_serial.entry(a).or_insert_with(|| s.trim().to_string()); }
            None    => { self.alias_to_id.entry(a).or_insert_with(|| id.to_string()); }
        }
    }

    pub fn bind_controller(&mut self, cid: &str, id: &str) {
        self.controller_to_id.entry(cid.trim().to_string()).or_insert_with(|| id.to_string());
    }

    pub fn bind_node(&mut self, node: &str, id: &str) {
        let n = node_name(node);
        if n != id {
            self.node_to_id.entry(n.to_string()).or_insert_with(|| id.to_string());
        }
    }

    /// Point every table entry for `old` at `new`.
    pub fn rename(&mut self, old: &str, new: &str) {
        for map in [
            &mut self.serial_to_id,
            &mut self.short_to_id,
            &mut self.alias_to_id,
            &mut self.controller_to_id,
            &mut self.node_to_id,
        ] {
            for v in map.values_mut() {
                if v == old { *v = new.to_string(); }
            }
        }
        self.node_to_id.remove(new);
        if let Some(serial) = self.id_to_serial.remove(old) {
            self.id_to_serial.entry(new.to_string()).or_insert(serial);
        }
    }
}
