//! Stable display colours for array/group names.

use crate::models::drive::UNKNOWN;
use crossterm::style::Color;
use std::collections::{BTreeMap, BTreeSet};

pub const PALETTE: [Color; 12] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::DarkRed,
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
];

/// `tank-cache` → `tank`; names without a `-suffix` have no parent.
pub fn parent(group: &str) -> Option<&str> {
    group.rsplit_once('-').map(|(p, _)| p).filter(|p| !p.is_empty())
}

/// Group name → colour, computed once after collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayColors {
    colors: BTreeMap<String, Color>,
}

impl ArrayColors {
    /// Assign colours to the distinct groups in `groups`. The result does
    /// not depend on the order groups are supplied in.
    pub fn assign<'a>(groups: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = groups
            .into_iter()
            .map(str::trim)
            .filter(|g| !g.is_empty() && *g != UNKNOWN)
            .collect();

        let mut colors: BTreeMap<String, Color> = BTreeMap::new();
        let mut next = 0usize;
        for group in distinct {
            if colors.contains_key(group) {
                continue;
            }
            let inherited = parent(group).and_then(|p| colors.get(p).copied());
            let color = match inherited {
                Some(c) => c,
                None => {
                    let c = PALETTE[next % PALETTE.len()];
                    next += 1;
                    if let Some(p) = parent(group) {
                        colors.insert(p.to_string(), c);
                    }
                    c
                }
            };
            colors.insert(group.to_string(), color);
        }
        Self { colors }
    }

    pub fn get(&self, group: &str) -> Option<Color> {
        if group == UNKNOWN {
            return None;
        }
        self.colors.get(group).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
