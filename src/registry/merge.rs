//! Per-field merge policy for folding collector facts into a drive record.

use crate::models::drive::{DriveRecord, Facts, MediaType};
use crate::models::location::{Bus, Location, Placement};
use tracing::debug;

/// How a later observation interacts with a value already on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// First non-empty value wins; later values are ignored.
    FillIfAbsent,
    /// Fill if absent; a more specific value may replace a generic one.
    Refine,
    /// Every non-empty value replaces the previous one.
    LatestWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Size,
    Media,
    Boot,
    Usage,
    Location,
    Vendor,
    Model,
    Firmware,
    Serial,
    Alias,
    Driver,
    Health,
    Defects,
    Wear,
    State,
    Array,
    ControllerId,
}

impl Field {
    pub const ALL: [Field; 17] = [
        Field::Size, Field::Media, Field::Boot, Field::Usage, Field::Location,
        Field::Vendor, Field::Model, Field::Firmware, Field::Serial, Field::Alias,
        Field::Driver, Field::Health, Field::Defects, Field::Wear, Field::State,
        Field::Array, Field::ControllerId,
    ];

    pub fn policy(self) -> Policy {
        match self {
            Field::Location | Field::Media => Policy::Refine,
            Field::Health | Field::State   => Policy::LatestWins,
            _                              => Policy::FillIfAbsent,
        }
    }
}

fn take<T>(field: Field, slot: &mut Option<T>, incoming: Option<T>) {
    let Some(value) = incoming else { return };
    match field.policy() {
        Policy::LatestWins => *slot = Some(value),
        Policy::FillIfAbsent | Policy::Refine => {
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }
}

/// Whether `incoming` is more specific evidence than `current`.
///
/// A SATA counter slot may become a USB or M.2 slot, or any physical bay;
/// an expander slot may gain its controller address. Nothing else moves.
pub fn refines(current: &Location, incoming: &Placement) -> bool {
    use Location as L;
    match (current, incoming) {
        (L::Bus { bus: Bus::Sata, .. }, Placement::NextOn(Bus::Usb | Bus::M2)) => true,
        (L::Bus { bus: Bus::Sata, .. }, Placement::At(L::Bus { bus: Bus::Usb | Bus::M2, .. })) => true,
        (L::Bus { bus: Bus::Sata, .. }, Placement::At(L::Enclosure { .. } | L::Controller { .. })) => true,
        (L::Enclosure { .. }, Placement::At(L::Controller { .. })) => true,
        _ => false,
    }
}

/// A bare media type may gain the bus qualifier (`/M.2`, `/USB`) of the
/// same kind; the kind itself never changes.
pub fn refines_media(current: &MediaType, incoming: &MediaType) -> bool {
    current.qualifier.is_none() && incoming.qualifier.is_some() && current.kind == incoming.kind
}

fn place(placement: Placement, next_slot: &mut dyn FnMut(Bus) -> u32) -> Location {
    match placement {
        Placement::At(loc)     => loc,
        Placement::NextOn(bus) => Location::Bus { bus, index: next_slot(bus) },
    }
}

/// Fold `facts` into `record` following [`Field::policy`].
///
/// `next_slot` hands out bus slot numbers; it is only called when a bus
/// placement is actually applied.
pub fn apply(record: &mut DriveRecord, facts: Facts, next_slot: &mut dyn FnMut(Bus) -> u32) {
    take(Field::Size,         &mut record.size,          facts.size);
    if let Some(media) = facts.media {
        let apply_it = match &record.media {
            None          => true,
            Some(current) => refines_media(current, &media),
        };
        if apply_it {
            record.media = Some(media);
        }
    }
    take(Field::Boot,         &mut record.boot,          facts.boot);
    take(Field::Usage,        &mut record.usage,         facts.usage);
    take(Field::Vendor,       &mut record.vendor,        facts.vendor);
    take(Field::Model,        &mut record.model,         facts.model);
    take(Field::Firmware,     &mut record.firmware,      facts.firmware);
    take(Field::Serial,       &mut record.serial,        facts.serial);
    take(Field::Alias,        &mut record.alias,         facts.alias);
    take(Field::Driver,       &mut record.driver,        facts.driver);
    take(Field::Health,       &mut record.health,        facts.health);
    take(Field::Defects,      &mut record.defects,       facts.defects);
    take(Field::Wear,         &mut record.wear,          facts.wear);
    take(Field::State,        &mut record.state,         facts.state);
    take(Field::ControllerId, &mut record.controller_id, facts.controller_id);

    if let (Some(current), Some(claim)) = (&record.array, &facts.array) {
        if current != claim {
            debug!(drive = %record.id, kept = %current, dropped = %claim, "array claim dropped");
        }
    }
    take(Field::Array, &mut record.array, facts.array);

    if let Some(placement) = facts.location {
        let apply_it = match &record.location {
            None          => true,
            Some(current) => refines(current, &placement),
        };
        if apply_it {
            record.location = Some(place(placement, next_slot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drive::{MediaKind, Qualifier};

    fn no_slots(_: Bus) -> u32 {
        panic!("slot allocated unexpectedly")
    }

    #[test]
    fn policy_table() {
        for f in Field::ALL {
            let expected = match f {
                Field::Location | Field::Media => Policy::Refine,
                Field::Health | Field::State   => Policy::LatestWins,
                _                              => Policy::FillIfAbsent,
            };
            assert_eq!(f.policy(), expected, "{:?}", f);
        }
    }

    #[test]
    fn fill_if_absent_keeps_first_value() {
        let mut rec = DriveRecord::new("sda");
        let first = Facts { model: Some("WD40EFRX".into()), array: Some("tank".into()), ..Default::default() };
        let second = Facts { model: Some("OTHER".into()), array: Some("vg0".into()), ..Default::default() };
        apply(&mut rec, first, &mut no_slots);
        apply(&mut rec, second, &mut no_slots);
        apply(&mut rec, Facts::default(), &mut no_slots);
        assert_eq!(rec.model.as_deref(), Some("WD40EFRX"));
        assert_eq!(rec.array.as_deref(), Some("tank"));
    }

    #[test]
    fn latest_wins_for_state_and_health_but_never_clears() {
        let mut rec = DriveRecord::new("sda");
        apply(&mut rec, Facts { state: Some("running".into()), health: Some("PASSED".into()), ..Default::default() }, &mut no_slots);
        apply(&mut rec, Facts { state: Some("Onln".into()), ..Default::default() }, &mut no_slots);
        apply(&mut rec, Facts::default(), &mut no_slots);
        assert_eq!(rec.state.as_deref(), Some("Onln"));
        assert_eq!(rec.health.as_deref(), Some("PASSED"));
    }

    #[test]
    fn sata_slot_refines_to_m2() {
        let mut next = 0;
        let mut alloc = |_: Bus| { next += 1; next - 1 };
        let mut rec = DriveRecord::new("sdb");
        apply(&mut rec, Facts { location: Some(Placement::NextOn(Bus::Sata)), ..Default::default() }, &mut alloc);
        assert_eq!(rec.location, Some(Location::Bus { bus: Bus::Sata, index: 0 }));

        apply(&mut rec, Facts { location: Some(Placement::NextOn(Bus::M2)), ..Default::default() }, &mut alloc);
        assert_eq!(rec.location, Some(Location::Bus { bus: Bus::M2, index: 1 }));

        // M.2 is final; a second SATA claim must not move it back.
        apply(&mut rec, Facts { location: Some(Placement::NextOn(Bus::Sata)), ..Default::default() }, &mut alloc);
        assert_eq!(rec.location, Some(Location::Bus { bus: Bus::M2, index: 1 }));
    }

    #[test]
    fn media_gains_m2_qualifier_but_keeps_its_kind() {
        let mut rec = DriveRecord::new("sdb");
        apply(&mut rec, Facts { media: Some(MediaType::new(MediaKind::SataSsd)), ..Default::default() }, &mut no_slots);
        apply(&mut rec, Facts { media: Some(MediaType::with(MediaKind::SataSsd, Qualifier::M2)), ..Default::default() }, &mut no_slots);
        assert_eq!(rec.media.map(|m| m.to_string()).as_deref(), Some("SATA-SSD/M.2"));

        // Neither a bare type nor a different kind replaces it.
        apply(&mut rec, Facts { media: Some(MediaType::new(MediaKind::SataSsd)), ..Default::default() }, &mut no_slots);
        apply(&mut rec, Facts { media: Some(MediaType::with(MediaKind::SasSsd, Qualifier::Usb)), ..Default::default() }, &mut no_slots);
        assert_eq!(rec.media.map(|m| m.to_string()).as_deref(), Some("SATA-SSD/M.2"));
    }

    #[test]
    fn nvme_slot_is_not_refined() {
        let current = Location::Bus { bus: Bus::Nvme, index: 0 };
        assert!(!refines(&current, &Placement::NextOn(Bus::M2)));
        let ctl = Location::Controller { controller: 0, enclosure: 1, slot: 2 };
        assert!(!refines(&ctl, &Placement::At(Location::Bus { bus: Bus::Sata, index: 0 })));
        let exp = Location::Enclosure { enclosure: "0x5000".into(), slot: 2 };
        assert!(refines(&exp, &Placement::At(ctl)));
    }
}
