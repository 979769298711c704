//! Small integer helpers shared by the buffer modules.

pub mod align;

pub use align::{align_up, offset_to_alignment, round_up_to_multiple};
