//! The interactive region picker (spec.md §4.5 "the deepest subsystem").

mod output_picker;
mod region;
mod smart_border;

pub use output_picker::{OutputPicker, OutputPickerState};
pub use region::{Anchor, FinishReason, RegionPicker, RegionPickerState};
pub use smart_border::SmartBorderWorker;
