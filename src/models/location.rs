use serde::{Serialize, Serializer};
use std::fmt;

/// Name of the enclosure that holds drives with no physical grid.
pub const INTERNAL_ENCLOSURE: &str = "internal";

/// Buses whose drives are numbered by a per-bus counter inside the
/// `internal` enclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bus {
    Nvme,
    M2,
    Sata,
    Usb,
}

impl Bus {
    pub const ALL: [Bus; 4] = [Bus::Nvme, Bus::M2, Bus::Sata, Bus::Usb];

    pub fn label(&self) -> &'static str {
        match self {
            Bus::Nvme => "NVME",
            Bus::M2   => "M2",
            Bus::Sata => "SATA",
            Bus::Usb  => "USB",
        }
    }

    pub fn from_label(s: &str) -> Option<Bus> {
        Bus::ALL.into_iter().find(|b| b.label().eq_ignore_ascii_case(s))
    }
}

/// Where a drive physically sits.
///
/// Rendered as the compound key used by the bay table:
/// `enclosure:slot`, `controller:enclosure:slot` or `BUS:n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// Slot behind a SAS expander, keyed by the expander's address.
    Enclosure { enclosure: String, slot: u32 },
    /// Slot addressable through a RAID controller or HBA.
    Controller { controller: u32, enclosure: u32, slot: u32 },
    /// Auto-numbered slot in the `internal` enclosure.
    Bus { bus: Bus, index: u32 },
}

impl Location {
    /// Name of the enclosure this location belongs to.
    pub fn enclosure_key(&self) -> String {
        match self {
            Location::Enclosure { enclosure, .. } => enclosure.clone(),
            Location::Controller { controller, enclosure, .. } => format!("{}:{}", controller, enclosure),
            Location::Bus { .. } => INTERNAL_ENCLOSURE.to_string(),
        }
    }

    pub fn slot(&self) -> u32 {
        match self {
            Location::Enclosure { slot, .. } | Location::Controller { slot, .. } => *slot,
            Location::Bus { index, .. } => *index,
        }
    }

    /// Parse a compound key. Three numeric parts form a controller address,
    /// a known bus tag forms an internal slot, anything else with a numeric
    /// tail is an expander slot.
    pub fn parse(s: &str) -> Option<Location> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [c, e, sl] => Some(Location::Controller {
                controller: c.parse().ok()?,
                enclosure:  e.parse().ok()?,
                slot:       sl.parse().ok()?,
            }),
            [head, tail] => {
                let n: u32 = tail.parse().ok()?;
                match Bus::from_label(head) {
                    Some(bus) => Some(Location::Bus { bus, index: n }),
                    None if !head.is_empty() => Some(Location::Enclosure { enclosure: head.to_string(), slot: n }),
                    None => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Enclosure { enclosure, slot } => write!(f, "{}:{}", enclosure, slot),
            Location::Controller { controller, enclosure, slot } => {
                write!(f, "{}:{}:{}", controller, enclosure, slot)
            }
            Location::Bus { bus, index } => write!(f, "{}:{}", bus.label(), index),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A location as reported by a collector. Bus slots are numbered by the
/// registry only when the placement is actually applied to a drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    At(Location),
    NextOn(Bus),
}
