pub mod drive;
pub mod enclosure;
pub mod location;
