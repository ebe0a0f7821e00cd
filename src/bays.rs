//! Overlay registry bay assignments onto configured enclosure grids.

use crate::models::drive::MediaType;
use crate::models::enclosure::{Enclosure, SlotLabel};
use crate::models::location::{Bus, Location};
use crate::registry::Inventory;

#[derive(Debug, Clone, PartialEq)]
pub enum Occupant {
    /// The layout has no bay at this position.
    Unpopulated,
    /// A bay no collector reported a drive in.
    Empty,
    Drive {
        id:    String,
        media: Option<MediaType>,
        size:  Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bay {
    pub label:    SlotLabel,
    pub occupant: Occupant,
}

/// Bay table key for `slot` in the enclosure named `enclosure`.
pub fn bay_key(enclosure: &str, slot: u32) -> String {
    format!("{}:{}", enclosure, slot)
}

fn occupant_at(inv: &Inventory, key: &str) -> Occupant {
    let drive = inv.bays().get(key).and_then(|id| inv.get(id));
    match drive {
        Some(d) => Occupant::Drive { id: d.id.clone(), media: d.media, size: d.size },
        None    => Occupant::Empty,
    }
}

/// Every grid position of `enc`, in configured row/column order.
pub fn map_enclosure(enc: &Enclosure, inv: &Inventory) -> Vec<Vec<Bay>> {
    enc.rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|label| {
                    let occupant = match label {
                        SlotLabel::Slot(n)  => occupant_at(inv, &bay_key(&enc.name, *n)),
                        SlotLabel::Blank(_) => Occupant::Unpopulated,
                    };
                    Bay { label: label.clone(), occupant }
                })
                .collect()
        })
        .collect()
}

/// Slots of the reserved `internal` enclosure, grouped by bus then index.
pub fn internal_bays(inv: &Inventory) -> Vec<(Location, Occupant)> {
    let mut out: Vec<(Bus, u32, Location)> = inv
        .drives()
        .filter_map(|d| match &d.location {
            Some(loc @ Location::Bus { bus, index }) => Some((*bus, *index, loc.clone())),
            _ => None,
        })
        .collect();
    out.sort_by_key(|(bus, index, _)| (*bus, *index));
    out.into_iter()
        .map(|(_, _, loc)| {
            let occupant = occupant_at(inv, &loc.to_string());
            (loc, occupant)
        })
        .collect()
}

/// Bays whose enclosure matches none of `configured`; rendered as a plain
/// list so drives are not lost from the map.
pub fn unmapped_bays(inv: &Inventory, configured: &[Enclosure]) -> Vec<(String, String)> {
    inv.bays()
        .iter()
        .filter_map(|(key, id)| {
            let loc = Location::parse(key)?;
            if matches!(loc, Location::Bus { .. }) {
                return None;
            }
            let enclosure = loc.enclosure_key();
            if configured.iter().any(|e| e.name == enclosure) {
                return None;
            }
            Some((key.clone(), id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drive::{Facts, MediaKind};
    use crate::models::location::Placement;
    use crate::registry::Key;

    fn place(inv: &mut Inventory, node: &str, placement: Placement) {
        inv.observe(
            Key::Node(node),
            Facts {
                location: Some(placement),
                media:    Some(MediaType::new(MediaKind::SasHdd)),
                size:     Some(4_000_000_000_000),
                ..Default::default()
            },
        );
    }

    #[test]
    fn grid_shows_assigned_and_empty_slots() {
        let mut inv = Inventory::new();
        place(&mut inv, "sdc", Placement::At(Location::Controller { controller: 0, enclosure: 2, slot: 5 }));

        let enc = Enclosure::parse("0:2", "2 5\n1 4");
        let grid = map_enclosure(&enc, &inv);
        let occupied: Vec<Vec<Option<&str>>> = grid.iter()
            .map(|row| row.iter().map(|b| match &b.occupant {
                Occupant::Drive { id, .. } => Some(id.as_str()),
                _ => None,
            }).collect())
            .collect();
        assert_eq!(occupied, vec![vec![None, Some("sdc")], vec![None, None]]);
        assert_eq!(grid[0][0].occupant, Occupant::Empty);
        assert_eq!(grid[1][1].label, SlotLabel::Slot(4));
    }

    #[test]
    fn placeholders_are_unpopulated() {
        let inv = Inventory::new();
        let enc = Enclosure::parse("0:2", "0 -\n");
        let grid = map_enclosure(&enc, &inv);
        assert_eq!(grid[0][1].occupant, Occupant::Unpopulated);
        assert_eq!(grid[0][0].occupant, Occupant::Empty);
    }

    #[test]
    fn internal_and_unmapped_listings() {
        let mut inv = Inventory::new();
        place(&mut inv, "sda", Placement::NextOn(Bus::Sata));
        place(&mut inv, "nvme0n1", Placement::NextOn(Bus::Nvme));
        place(&mut inv, "sdb", Placement::NextOn(Bus::Sata));
        place(&mut inv, "sdz", Placement::At(Location::Enclosure { enclosure: "0x5000abcd".into(), slot: 3 }));

        let internal: Vec<String> = internal_bays(&inv).iter().map(|(l, _)| l.to_string()).collect();
        assert_eq!(internal, vec!["NVME:0", "SATA:0", "SATA:1"]);

        assert_eq!(unmapped_bays(&inv, &[]), vec![("0x5000abcd:3".to_string(), "sdz".to_string())]);
        let configured = [Enclosure::parse("0x5000abcd", "3 4")];
        assert!(unmapped_bays(&inv, &configured).is_empty());
    }
}
