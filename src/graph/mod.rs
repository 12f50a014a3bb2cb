//! Column assignment for drawing a commit graph.

pub mod layout;

pub use layout::{CommitPosition, DEFAULT_PALETTE_SIZE, lane_color, lane_markers, layout};
