//! Text and JSON output of the merged inventory.

use crate::bays::{internal_bays, map_enclosure, unmapped_bays, Occupant};
use crate::colors::ArrayColors;
use crate::health::is_okay;
use crate::models::drive::{DriveRecord, UNKNOWN};
use crate::models::enclosure::{Enclosure, SlotLabel};
use crate::models::location::INTERNAL_ENCLOSURE;
use crate::registry::Inventory;
use crate::util::human::{fmt_bytes, fmt_pct};
use crossterm::style::{Attribute, ContentStyle};
use serde::Serialize;
use std::fmt::Write as _;

pub const HEADERS: [&str; 16] = [
    "ID", "SIZE", "TYPE", "BOOT", "USAGE", "ARRAY", "LOCATION", "VENDOR", "MODEL",
    "FIRMWARE", "SERIAL", "ALIAS", "STATE", "HEALTH", "DEFECTS", "WEAR",
];

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub unused_only: bool,
    pub demo:        bool,
    pub color:       bool,
    pub known_bad:   Vec<String>,
}

fn or_unknown<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| UNKNOWN.to_string())
}

/// One table row, in `HEADERS` order.
pub fn row(d: &DriveRecord) -> Vec<String> {
    vec![
        d.id.clone(),
        or_unknown(d.size.map(fmt_bytes)),
        or_unknown(d.media),
        or_unknown(d.boot.as_ref()),
        or_unknown(d.usage.as_ref()),
        or_unknown(d.array.as_deref()),
        or_unknown(d.location.as_ref()),
        or_unknown(d.vendor.as_deref()),
        or_unknown(d.model.as_deref()),
        or_unknown(d.firmware.as_deref()),
        or_unknown(d.serial.as_deref()),
        or_unknown(d.alias.as_deref()),
        or_unknown(d.state.as_deref()),
        or_unknown(d.health.as_deref()),
        or_unknown(d.defects),
        or_unknown(d.wear.map(fmt_pct)),
    ]
}

/// Drives in bay order: enclosure, slot, then id. Drives with no location
/// sort last.
pub fn sorted(inv: &Inventory) -> Vec<&DriveRecord> {
    let mut drives: Vec<&DriveRecord> = inv.drives().collect();
    drives.sort_by(|a, b| {
        let key = |d: &DriveRecord| {
            (
                d.location.is_none(),
                d.location.as_ref().map(|l| l.enclosure_key()),
                d.location.as_ref().map(|l| l.slot()),
                d.id.clone(),
            )
        };
        key(*a).cmp(&key(*b))
    });
    drives
}

fn style_for(d: &DriveRecord, colors: &ArrayColors, opts: &Options) -> ContentStyle {
    let mut style = ContentStyle::new();
    if !opts.color {
        return style;
    }
    style.foreground_color = d.array.as_deref().and_then(|a| colors.get(a));
    if !is_okay(d, &opts.known_bad) {
        style.attributes.set(Attribute::Reverse);
    }
    style
}

fn paint(text: &str, style: ContentStyle) -> String {
    if style == ContentStyle::new() {
        text.to_string()
    } else {
        style.apply(text).to_string()
    }
}

/// Columnized inventory table.
pub fn inventory(inv: &Inventory, colors: &ArrayColors, opts: &Options) -> String {
    let drives: Vec<&DriveRecord> = sorted(inv)
        .into_iter()
        .filter(|d| !opts.unused_only || d.usage.as_ref().map_or(false, |u| u.is_unused()))
        .collect();

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<String>> = drives.iter().map(|d| row(d)).collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells.iter().zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(&header));
    for (d, r) in drives.iter().zip(&rows) {
        let _ = writeln!(out, "{}", paint(&line(r), style_for(d, colors, opts)));
    }
    if opts.demo { mask_text(inv, &out) } else { out }
}

// ── Bays ─────────────────────────────────────────────────────────────

fn cell_text(label: &SlotLabel, occupant: &Occupant) -> String {
    let slot = match label {
        SlotLabel::Slot(n)  => n.to_string(),
        SlotLabel::Blank(t) => t.clone(),
    };
    match occupant {
        Occupant::Unpopulated => String::new(),
        Occupant::Empty => format!("{:>3}: empty", slot),
        Occupant::Drive { id, media, size } => format!(
            "{:>3}: {} {} {}",
            slot,
            id,
            or_unknown(*media),
            or_unknown(size.map(fmt_bytes)),
        ),
    }
}

/// Every configured enclosure grid, the `internal` enclosure, then any
/// bays in enclosures with no configured grid.
pub fn bays(inv: &Inventory, enclosures: &[Enclosure], colors: &ArrayColors, opts: &Options) -> String {
    let mut out = String::new();
    let style_of = |id: &str| inv.get(id).map(|d| style_for(d, colors, opts)).unwrap_or_default();

    for enc in enclosures.iter().filter(|e| e.name != INTERNAL_ENCLOSURE) {
        let _ = writeln!(out, "── Enclosure {} ──", enc.name);
        let grid = map_enclosure(enc, inv);
        let width = grid.iter().flatten()
            .map(|b| cell_text(&b.label, &b.occupant).chars().count())
            .max()
            .unwrap_or(0);
        for row in &grid {
            let cells: Vec<String> = row.iter()
                .map(|b| {
                    let text = format!("{:<w$}", cell_text(&b.label, &b.occupant), w = width);
                    match &b.occupant {
                        Occupant::Drive { id, .. } => paint(&text, style_of(id)),
                        _ => text,
                    }
                })
                .collect();
            let _ = writeln!(out, "  {}", cells.join(" | ").trim_end());
        }
        out.push('\n');
    }

    let internal = internal_bays(inv);
    if !internal.is_empty() {
        let _ = writeln!(out, "── Enclosure {} ──", INTERNAL_ENCLOSURE);
        for (loc, occupant) in &internal {
            let text = match occupant {
                Occupant::Drive { id, media, size } => format!(
                    "  {:<8} {:<10} {:<12} {}",
                    loc.to_string(), id, or_unknown(*media), or_unknown(size.map(fmt_bytes)),
                ),
                _ => format!("  {:<8} empty", loc.to_string()),
            };
            let _ = match occupant {
                Occupant::Drive { id, .. } => writeln!(out, "{}", paint(&text, style_of(id))),
                _ => writeln!(out, "{}", text),
            };
        }
        out.push('\n');
    }

    let unmapped = unmapped_bays(inv, enclosures);
    if !unmapped.is_empty() {
        let _ = writeln!(out, "── Unconfigured enclosures ──");
        for (key, id) in &unmapped {
            let _ = writeln!(out, "  {:<24} {}", key, paint(id, style_of(id)));
        }
    }
    if opts.demo { mask_text(inv, &out) } else { out }
}

// ── JSON ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DriveView<'a> {
    #[serde(flatten)]
    drive:   &'a DriveRecord,
    healthy: bool,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    drivemap_version: &'static str,
    timestamp:        String,
    drives:           Vec<DriveView<'a>>,
}

pub fn json(inv: &Inventory, opts: &Options) -> anyhow::Result<String> {
    let drives = sorted(inv)
        .into_iter()
        .filter(|d| !opts.unused_only || d.usage.as_ref().map_or(false, |u| u.is_unused()))
        .map(|d| DriveView { drive: d, healthy: is_okay(d, &opts.known_bad) })
        .collect();
    let snapshot = Snapshot {
        drivemap_version: env!("CARGO_PKG_VERSION"),
        timestamp:        chrono::Local::now().to_rfc3339(),
        drives,
    };
    let text = serde_json::to_string_pretty(&snapshot)?;
    Ok(if opts.demo { mask_text(inv, &text) } else { text })
}

// ── Demo masking ─────────────────────────────────────────────────────

const DIGITS: &[u8] = b"0123456789";
const HEX_LOWER: &[u8] = b"abcdef";
const HEX_UPPER: &[u8] = b"ABCDEF";
const LOWER: &[u8] = b"ghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"GHIJKLMNOPQRSTUVWXYZ";

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

/// Scramble alphanumerics in place, keeping each character's class
/// (digit, hex letter, other letter, case) and the token length. Each
/// output character depends only on the input character and its
/// position, so a prefix masks to a prefix.
pub fn mask_token(token: &str) -> String {
    token
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let class = [DIGITS, HEX_LOWER, HEX_UPPER, LOWER, UPPER]
                .into_iter()
                .find(|set| c.is_ascii() && set.contains(&(c as u8)));
            let Some(set) = class else { return c };
            let Some(pos) = set.iter().position(|b| *b == c as u8) else { return c };
            let shift = fnv1a(&[(i % 256) as u8, c as u8]) as usize % (set.len() - 1) + 1;
            set[(pos + shift) % set.len()] as char
        })
        .collect()
}

/// Mask an alias, keeping its `wwn-0x` / `nvme-eui.` / `ata-` style prefix.
pub fn mask_alias(alias: &str) -> String {
    let split = ["0x", "eui.", "-"]
        .iter()
        .filter_map(|p| alias.find(p).map(|i| i + p.len()))
        .next()
        .unwrap_or(0);
    format!("{}{}", &alias[..split], mask_token(&alias[split..]))
}

/// Replace every serial and alias known to the registry in `text`.
pub fn mask_text(inv: &Inventory, text: &str) -> String {
    let mut tokens: Vec<(String, String)> = Vec::new();
    for d in inv.drives() {
        if let Some(s) = &d.serial {
            tokens.push((s.clone(), mask_token(s)));
        }
        if let Some(a) = &d.alias {
            tokens.push((a.clone(), mask_alias(a)));
        }
    }
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    tokens.dedup();

    let mut out = text.to_string();
    for (plain, masked) in tokens.iter().filter(|(p, _)| p.len() >= 4) {
        out = out.replace(plain.as_str(), masked);
    }
    out
}
