/// One cell of an enclosure grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotLabel {
    /// A real bay, numbered as the enclosure firmware numbers it.
    Slot(u32),
    /// Filler token: no bay at this grid position.
    Blank(String),
}

/// A named physical slot grid, rows in front-panel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub name: String,
    pub rows: Vec<Vec<SlotLabel>>,
}

impl Enclosure {
    /// Build a grid from whitespace-separated tokens, one row per line.
    /// Blank lines are ignored.
    pub fn parse(name: &str, grid: &str) -> Self {
        let rows = grid
            .lines()
            .map(|line| {
                line.split_whitespace()
                    .map(|tok| match tok.parse::<u32>() {
                        Ok(n)  => SlotLabel::Slot(n),
                        Err(_) => SlotLabel::Blank(tok.to_string()),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();
        Self { name: name.to_string(), rows }
    }

    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().flatten().filter_map(|l| match l {
            SlotLabel::Slot(n) => Some(*n),
            SlotLabel::Blank(_) => None,
        })
    }
}
