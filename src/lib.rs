use lazy_static::lazy_static;
use marker::Markers;

pub mod about;
pub mod analyzer;
pub mod artifacts;
pub mod identity;
pub mod manifest;
pub mod marker;
pub mod reference;
pub mod session;
pub mod workspace;

lazy_static! {
    // Bethesda panel marker catalog
    pub static ref MARKERS: Markers = Markers::default();
}
