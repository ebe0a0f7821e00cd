//! The drive registry: canonical records plus the identity cross-reference.

pub mod identity;
pub mod merge;

use crate::models::drive::{DriveRecord, Facts};
use crate::models::location::{Bus, Location};
pub use identity::Key;
use identity::IdentityResolver;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    drives:      BTreeMap<String, DriveRecord>,
    resolver:    IdentityResolver,
    /// Ids minted from a non-node key; replaced once the device node is seen.
    provisional: BTreeSet<String>,
    /// Location key → drive id.
    bays:        BTreeMap<String, String>,
    counters:    BTreeMap<Bus, u32>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drives(&self) -> impl Iterator<Item = &DriveRecord> {
        self.drives.values()
    }

    pub fn get(&self, id: &str) -> Option<&DriveRecord> {
        self.drives.get(id)
    }

    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    pub fn bays(&self) -> &BTreeMap<String, String> {
        &self.bays
    }

    pub fn bay(&self, location: &Location) -> Option<&DriveRecord> {
        self.bays.get(&location.to_string()).and_then(|id| self.drives.get(id))
    }

    /// Resolve an identifier in any key space to a canonical id.
    pub fn resolve(&self, key: Key<'_>) -> Option<String> {
        let id = match key {
            Key::Node(n) => {
                let node = key.canonical();
                if self.drives.contains_key(&node) {
                    return Some(node);
                }
                self.resolver.owner_of_node(n).cloned()
            }
            Key::Serial(s)     => self.resolver.by_serial(s).cloned(),
            Key::Alias(a)      => self.resolver.by_alias(a).cloned(),
            Key::Controller(c) => self.resolver.by_controller(c).cloned(),
        };
        id.filter(|id| self.drives.contains_key(id))
    }

    /// Look up `key`, falling back to the serial and alias carried in `facts`.
    fn find(&self, key: Key<'_>, facts: &Facts) -> Option<String> {
        self.resolve(key)
            .or_else(|| facts.serial.as_deref().and_then(|s| self.resolve(Key::Serial(s))))
            .or_else(|| facts.alias.as_deref().and_then(|a| self.resolve(Key::Alias(a))))
    }

    /// Attribute `facts` to the drive behind `key`, creating the drive if no
    /// key space knows it. Returns the canonical id.
    pub fn observe(&mut self, key: Key<'_>, facts: Facts) -> String {
        // An unknown device node is a drive of its own; its serial or alias
        // only pulls in a provisional record, never another node's drive.
        let found = self.find(key, &facts).filter(|found| match key {
            Key::Node(_) => self.resolve(key).is_some() || self.provisional.contains(found),
            _            => true,
        });
        let id = match found {
            Some(found) => match key {
                Key::Node(_) if self.provisional.contains(&found) => {
                    let node = key.canonical();
                    debug!(from = %found, to = %node, "provisional drive id replaced by device node");
                    self.fold(&found, &node);
                    node
                }
                _ => found,
            },
            None => {
                let id = key.canonical();
                self.drives.insert(id.clone(), DriveRecord::new(&id));
                match key {
                    Key::Node(_) => {}
                    Key::Serial(s) => {
                        self.provisional.insert(id.clone());
                        self.resolver.bind_serial(s, &id);
                    }
                    Key::Alias(a) => {
                        self.provisional.insert(id.clone());
                        self.resolver.bind_alias(a, None, &id);
                    }
                    Key::Controller(c) => {
                        self.provisional.insert(id.clone());
                        self.resolver.bind_controller(c, &id);
                    }
                }
                id
            }
        };
        self.merge(&id, facts)
    }

    /// Attribute `facts` to an already known drive. Facts about identifiers
    /// no key space can resolve are dropped.
    pub fn annotate(&mut self, key: Key<'_>, facts: Facts) -> Option<String> {
        match self.find(key, &facts) {
            Some(id) => Some(self.merge(&id, facts)),
            None => {
                debug!(key = ?key, "unresolved identifier, facts dropped");
                None
            }
        }
    }

    /// Register a partition or secondary node as a view of drive `id`.
    pub fn bind_node(&mut self, node: &str, id: &str) {
        self.resolver.bind_node(node, id);
    }

    /// Register a `/dev/disk/by-id` alias for drive `id`.
    pub fn bind_alias(&mut self, alias: &str, id: &str) {
        let serial = self.resolver.serial_of(id).cloned();
        self.resolver.bind_alias(alias, serial.as_deref(), id);
    }

    fn next_slot(counters: &mut BTreeMap<Bus, u32>, bus: Bus) -> u32 {
        let n = counters.entry(bus).or_insert(0);
        let slot = *n;
        *n += 1;
        slot
    }

    /// Merge facts into an existing record and keep the cross-reference and
    /// bay tables in step. Returns the id the facts ended up on.
    fn merge(&mut self, id: &str, facts: Facts) -> String {
        let counters = &mut self.counters;
        let Some(record) = self.drives.get_mut(id) else { return id.to_string() };
        let before = record.location.clone();
        merge::apply(record, facts, &mut |bus| Self::next_slot(counters, bus));

        let after = record.location.clone();
        let serial = record.serial.clone();
        let alias = record.alias.clone();
        let cid = record.controller_id.clone();

        if before != after {
            if let Some(old) = before {
                let key = old.to_string();
                if self.bays.get(&key).map(String::as_str) == Some(id) {
                    self.bays.remove(&key);
                }
            }
            if let Some(new) = after {
                if let Some(prev) = self.bays.insert(new.to_string(), id.to_string()) {
                    if prev != id {
                        warn!(location = %new, kept = %id, displaced = %prev, "two drives report the same bay");
                    }
                }
            }
        }
        if let Some(c) = &cid {
            self.resolver.bind_controller(c, id);
        }

        let mut id = id.to_string();
        if let Some(s) = &serial {
            let owner = self.resolver.bind_serial(s, &id);
            if owner != id {
                // The serial surfaced on a second record; fold the provisional one away.
                if self.provisional.contains(&id) {
                    self.fold(&id.clone(), &owner);
                    id = owner;
                } else if self.provisional.contains(&owner) {
                    self.fold(&owner, &id.clone());
                } else {
                    debug!(serial = %s, first = %owner, second = %id, "serial reported by two device nodes, kept apart");
                }
            }
        }
        if let Some(a) = &alias {
            // Only a serial this drive owns may carry the alias.
            let owned = self.resolver.serial_of(&id).cloned();
            self.resolver.bind_alias(a, owned.as_deref(), &id);
        }
        id
    }

    /// Move every fact recorded under `from` onto `into` and retire `from`.
    fn fold(&mut self, from: &str, into: &str) {
        let Some(old) = self.drives.remove(from) else { return };
        self.provisional.remove(from);
        self.bays.retain(|_, v| v != from);
        self.resolver.rename(from, into);
        self.drives.entry(into.to_string()).or_insert_with(|| DriveRecord::new(into));
        self.merge(into, old.into_facts());
    }
}
