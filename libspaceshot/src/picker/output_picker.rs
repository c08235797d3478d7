//! The "choose this monitor" picker variant (spec.md §4.7): a single-state
//! UI per surface, Active when the pointer has focus, Inactive otherwise,
//! with a label flipped between top-center and bottom-center depending on
//! pointer proximity.

use crate::draw::{DrawSurface, Rgba};
use crate::picker::FinishReason;

const LABEL_HALO_LOGICAL_PX: f64 = 24.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputPickerState {
    Active,
    Inactive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LabelPosition {
    Top,
    Bottom,
}

/// Per-output picker for whole-output selection. The dim tint for the
/// inactive state is precomputed once at creation rather than per frame
/// (spec.md §4.7 "precomputed into a second buffer at creation").
pub struct OutputPicker {
    state: OutputPickerState,
    width: f64,
    height: f64,
    label_position: LabelPosition,
}

impl OutputPicker {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            state: OutputPickerState::Inactive,
            width,
            height,
            label_position: LabelPosition::Top,
        }
    }

    pub fn state(&self) -> OutputPickerState {
        self.state
    }

    /// Pointer focus entered or left this output's surface.
    pub fn set_focus(&mut self, focused: bool) {
        self.state = if focused {
            OutputPickerState::Active
        } else {
            OutputPickerState::Inactive
        };
    }

    /// Track pointer position so the label can flip out of its way (spec.md
    /// §4.7 "within a 24-logical-pixel halo of the top label").
    pub fn on_motion(&mut self, x: f64, y: f64) {
        let top_label_center = (self.width / 2.0, 0.0);
        let dx = x - top_label_center.0;
        let dy = y - top_label_center.1;
        let near_top_label = (dx * dx + dy * dy).sqrt() <= LABEL_HALO_LOGICAL_PX;
        self.label_position = if near_top_label {
            LabelPosition::Bottom
        } else {
            LabelPosition::Top
        };
    }

    pub fn on_left_click(&self) -> Option<FinishReason> {
        match self.state {
            OutputPickerState::Active => Some(FinishReason::Selected),
            OutputPickerState::Inactive => None,
        }
    }

    pub fn on_escape(&self) -> FinishReason {
        FinishReason::Cancelled
    }

    /// Label anchor point in logical coordinates; the label renderer
    /// collaborator (out of scope, spec.md §7) draws the actual text there.
    pub fn label_anchor(&self) -> (f64, f64) {
        match self.label_position {
            LabelPosition::Top => (self.width / 2.0, 0.0),
            LabelPosition::Bottom => (self.width / 2.0, self.height),
        }
    }

    /// Render the background, dimmed when inactive.
    pub fn render(&self, surface: &mut DrawSurface, background: &DrawSurface, scale: f32) {
        surface.blit_scaled(background, 0.0, 0.0, scale);
        if self.state == OutputPickerState::Inactive {
            surface.fill_rect(
                0.0,
                0.0,
                (self.width * scale as f64) as f32,
                (self.height * scale as f64) as f32,
                Rgba::new(0, 0, 0, 110),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_click_does_not_select() {
        let picker = OutputPicker::new(800.0, 600.0);
        assert_eq!(picker.on_left_click(), None);
    }

    #[test]
    fn active_click_selects() {
        let mut picker = OutputPicker::new(800.0, 600.0);
        picker.set_focus(true);
        assert_eq!(picker.on_left_click(), Some(FinishReason::Selected));
    }

    #[test]
    fn label_flips_to_bottom_near_top_halo() {
        let mut picker = OutputPicker::new(800.0, 600.0);
        picker.on_motion(400.0, 5.0);
        assert_eq!(picker.label_anchor(), (400.0, 600.0));
    }

    #[test]
    fn label_stays_top_away_from_halo() {
        let mut picker = OutputPicker::new(800.0, 600.0);
        picker.on_motion(400.0, 300.0);
        assert_eq!(picker.label_anchor(), (400.0, 0.0));
    }

    #[test]
    fn escape_cancels_regardless_of_focus() {
        let picker = OutputPicker::new(800.0, 600.0);
        assert_eq!(picker.on_escape(), FinishReason::Cancelled);
    }
}
