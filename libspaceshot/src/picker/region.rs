//! The Region Picker state machine (spec.md §4.5). Grounded on
//! `examples/original_source/src/region-picker.{c,h}` for the overall
//! Empty/Dragging/Editing flow; the Editing sub-state and hit-testing
//! anchors are this crate's own generalization of that flow (the original
//! only exposes Empty/Dragging at the header level).

use crate::bbox::BBox;
use crate::draw::{DrawSurface, Rgba};

const NEAR_THRESHOLD: f64 = 12.0;
const CANCEL_AREA_DEVICE_PX2: f64 = 2.0;
const HANDLE_SIZE: f64 = 8.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegionPickerState {
    Empty,
    Dragging,
    Editing,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Selected,
    Cancelled,
    Destroyed,
}

/// Which part of the selection a pointer position hit during `Editing`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Anchor {
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Copy, Clone, Default)]
struct EditBinding {
    modify_x: Option<bool>, // Some(true) = editing x2 (right edge), Some(false) = x1
    modify_y: Option<bool>,
    is_move: bool,
    grab_offset: (f64, f64),
}

pub struct RegionPicker {
    pub state: RegionPickerState,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    move_active: bool,
    edit_binding: EditBinding,
    last_drawn_box: Option<BBox>,
    last_device_size: (u32, u32),
    border_width: f64,
}

impl RegionPicker {
    pub fn new() -> Self {
        Self {
            state: RegionPickerState::Empty,
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            move_active: false,
            edit_binding: EditBinding::default(),
            last_drawn_box: None,
            last_device_size: (0, 0),
            border_width: 2.0,
        }
    }

    fn logical_box(&self) -> BBox {
        let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (y1, y2) = (self.y1.min(self.y2), self.y1.max(self.y2));
        BBox::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// The selection rectangle in device pixels: scale, then snap to whole
    /// pixels without shrinking (spec.md §4.5 "Coordinates and rounding").
    pub fn device_box(&self, scale: f64) -> BBox {
        self.logical_box().scale(scale).expand_to_grid()
    }

    pub fn on_left_press(&mut self, x: f64, y: f64, scale: f64) {
        match self.state {
            RegionPickerState::Empty => {
                self.x1 = x;
                self.y1 = y;
                self.x2 = x;
                self.y2 = y;
                self.state = RegionPickerState::Dragging;
            }
            RegionPickerState::Editing => {
                let anchor = self.hit_test(x, y);
                match anchor {
                    None => {
                        self.x1 = x;
                        self.y1 = y;
                        self.x2 = x;
                        self.y2 = y;
                        self.state = RegionPickerState::Dragging;
                    }
                    Some(anchor) => self.begin_edit(anchor, x, y),
                }
            }
            RegionPickerState::Dragging => {}
        }
    }

    pub fn on_motion(&mut self, x: f64, y: f64) {
        match self.state {
            RegionPickerState::Dragging => {
                if self.move_active {
                    self.translate_to(x, y);
                } else {
                    self.x2 = x;
                    self.y2 = y;
                }
            }
            RegionPickerState::Editing => self.apply_edit(x, y),
            RegionPickerState::Empty => {}
        }
    }

    /// `ctrl_held` at release time: enter `Editing` instead of finishing.
    pub fn on_left_release(&mut self, ctrl_held: bool, scale: f64) -> Option<FinishReason> {
        match self.state {
            RegionPickerState::Dragging => {
                if ctrl_held {
                    self.state = RegionPickerState::Editing;
                    None
                } else {
                    let device = self.device_box(scale);
                    if device.area() <= CANCEL_AREA_DEVICE_PX2 {
                        self.clear();
                        Some(FinishReason::Cancelled)
                    } else {
                        Some(FinishReason::Selected)
                    }
                }
            }
            RegionPickerState::Editing => {
                self.edit_binding = EditBinding::default();
                None
            }
            RegionPickerState::Empty => None,
        }
    }

    /// Enter/exit move mode (space or left-alt held during Dragging),
    /// nudging the fixed corner so move doesn't introduce sub-pixel drift
    /// (spec.md §4.5 "Movement").
    pub fn set_move_active(&mut self, active: bool) {
        if active && !self.move_active {
            let frac1x = self.x1.fract();
            let frac2x = self.x2.fract();
            self.x1 += frac2x - frac1x;
            let frac1y = self.y1.fract();
            let frac2y = self.y2.fract();
            self.y1 += frac2y - frac1y;
        }
        self.move_active = active;
    }

    fn translate_to(&mut self, x: f64, y: f64) {
        let dx = x - self.x2;
        let dy = y - self.y2;
        self.x1 += dx;
        self.y1 += dy;
        self.x2 = x;
        self.y2 = y;
    }

    pub fn on_escape(&mut self) -> FinishReason {
        self.clear();
        FinishReason::Cancelled
    }

    pub fn on_destroyed(&mut self) -> FinishReason {
        self.clear();
        FinishReason::Destroyed
    }

    fn clear(&mut self) {
        self.state = RegionPickerState::Empty;
        self.last_drawn_box = None;
    }

    /// Hit-test a pointer position against the current selection's edges
    /// (spec.md §4.5 "Hit testing").
    fn hit_test(&self, x: f64, y: f64) -> Option<Anchor> {
        let b = self.logical_box();
        let (left, right, top, bottom) = (b.x, b.right(), b.y, b.bottom());

        let outside_margin = x < left - NEAR_THRESHOLD
            || x > right + NEAR_THRESHOLD
            || y < top - NEAR_THRESHOLD
            || y > bottom + NEAR_THRESHOLD;
        if outside_margin {
            return None;
        }

        let near_left = (x - left).abs() <= NEAR_THRESHOLD;
        let near_right = (x - right).abs() <= NEAR_THRESHOLD;
        let near_top = (y - top).abs() <= NEAR_THRESHOLD;
        let near_bottom = (y - bottom).abs() <= NEAR_THRESHOLD;

        Some(match (near_left, near_right, near_top, near_bottom) {
            (true, _, true, _) => Anchor::TopLeft,
            (true, _, _, true) => Anchor::BottomLeft,
            (_, true, true, _) => Anchor::TopRight,
            (_, true, _, true) => Anchor::BottomRight,
            (true, false, false, false) => Anchor::Left,
            (false, true, false, false) => Anchor::Right,
            (false, false, true, false) => Anchor::Top,
            (false, false, false, true) => Anchor::Bottom,
            _ => Anchor::Center,
        })
    }

    fn begin_edit(&mut self, anchor: Anchor, x: f64, y: f64) {
        let x1_is_left = self.x1 <= self.x2;
        let y1_is_top = self.y1 <= self.y2;

        let (modify_x, modify_y, is_move) = match anchor {
            Anchor::Center => (None, None, true),
            Anchor::Left => (Some(!x1_is_left), None, false),
            Anchor::Right => (Some(x1_is_left), None, false),
            Anchor::Top => (None, Some(!y1_is_top), false),
            Anchor::Bottom => (None, Some(y1_is_top), false),
            Anchor::TopLeft => (Some(!x1_is_left), Some(!y1_is_top), false),
            Anchor::TopRight => (Some(x1_is_left), Some(!y1_is_top), false),
            Anchor::BottomLeft => (Some(!x1_is_left), Some(y1_is_top), false),
            Anchor::BottomRight => (Some(x1_is_left), Some(y1_is_top), false),
        };

        self.edit_binding = EditBinding {
            modify_x,
            modify_y,
            is_move,
            grab_offset: (x, y),
        };
    }

    fn apply_edit(&mut self, x: f64, y: f64) {
        if self.edit_binding.is_move {
            self.translate_to(x, y);
            return;
        }
        if let Some(edit_x2) = self.edit_binding.modify_x {
            if edit_x2 {
                self.x2 = x;
            } else {
                self.x1 = x;
            }
        }
        if let Some(edit_y2) = self.edit_binding.modify_y {
            if edit_y2 {
                self.y2 = y;
            } else {
                self.y1 = y;
            }
        }
    }

    /// Compute the damage rectangle for this frame and update
    /// `last_drawn_box`/`last_device_size`, per spec.md §4.5 "Incremental
    /// damage". Returns `None` when nothing changed and the draw should be
    /// skipped entirely.
    pub fn damage(&mut self, scale: f64, device_width: u32, device_height: u32) -> Option<BBox> {
        let current = if self.state == RegionPickerState::Empty {
            None
        } else {
            Some(self.device_box(scale))
        };

        let size_changed = (device_width, device_height) != self.last_device_size;
        self.last_device_size = (device_width, device_height);

        let damage = if size_changed {
            Some(BBox::new(0.0, 0.0, device_width as f64, device_height as f64))
        } else {
            match (self.last_drawn_box, current) {
                (None, None) => None,
                (Some(last), Some(cur)) if last == cur => None,
                (Some(last), Some(cur)) => last.symmetric_difference_bounds(&cur),
                (Some(last), None) => Some(last),
                (None, Some(cur)) => Some(cur),
            }
            .map(|b| b.inflate(self.border_width + HANDLE_SIZE))
        };

        self.last_drawn_box = current;
        damage
    }

    /// Render the picker's current frame: background, dimmed overlay with
    /// the selection punched out, border, and (in `Editing`) handles
    /// (spec.md §4.5 "Rendering layers per frame").
    /// `smart_border`, when present, is a black/white pattern the same size
    /// as `surface` sampled for the border stroke instead of `border_color`
    /// (spec.md §4.6); handles then use a fixed white-outer/black-inner
    /// pair rather than one chosen from `border_color`'s brightness.
    pub fn render(
        &self,
        surface: &mut DrawSurface,
        background: &DrawSurface,
        scale: f32,
        border_color: Rgba,
        dim_color: Rgba,
        smart_border: Option<&DrawSurface>,
    ) {
        surface.blit_scaled(background, 0.0, 0.0, scale);

        if self.state == RegionPickerState::Empty {
            return;
        }

        let device = self.device_box(scale as f64);
        let expanded = device.inflate(self.border_width);
        surface.fill_with_hole(
            expanded.x as f32,
            expanded.y as f32,
            expanded.width as f32,
            expanded.height as f32,
            dim_color,
        );
        match smart_border {
            Some(mask) => surface.stroke_rect_pattern(
                expanded.x as f32,
                expanded.y as f32,
                expanded.width as f32,
                expanded.height as f32,
                self.border_width as f32,
                mask,
            ),
            None => surface.stroke_rect(
                expanded.x as f32,
                expanded.y as f32,
                expanded.width as f32,
                expanded.height as f32,
                self.border_width as f32,
                border_color,
            ),
        }

        if self.state == RegionPickerState::Editing {
            self.draw_handles(surface, &device, border_color, smart_border.is_some());
        }
    }

    fn draw_handles(&self, surface: &mut DrawSurface, device: &BBox, border_color: Rgba, smart: bool) {
        let (outer_color, inner_color) = if smart {
            (Rgba::new(255, 255, 255, border_color.a), Rgba::new(0, 0, 0, border_color.a))
        } else {
            let brightness =
                0.299 * border_color.r as f32 + 0.587 * border_color.g as f32 + 0.114 * border_color.b as f32;
            let inner = if brightness > 127.0 {
                Rgba::new(0, 0, 0, border_color.a)
            } else {
                Rgba::new(255, 255, 255, border_color.a)
            };
            (border_color, inner)
        };

        let xs = [device.x, device.x + device.width / 2.0, device.right()];
        let ys = [device.y, device.y + device.height / 2.0, device.bottom()];
        for &x in &xs {
            for &y in &ys {
                if (x == xs[1]) && (y == ys[1]) {
                    continue; // no handle at dead center
                }
                let half = HANDLE_SIZE / 2.0;
                surface.fill_rect(
                    (x - half) as f32,
                    (y - half) as f32,
                    HANDLE_SIZE as f32,
                    HANDLE_SIZE as f32,
                    outer_color,
                );
                surface.fill_rect(
                    (x - half + 1.0) as f32,
                    (y - half + 1.0) as f32,
                    (HANDLE_SIZE - 2.0) as f32,
                    (HANDLE_SIZE - 2.0) as f32,
                    inner_color,
                );
            }
        }
    }
}

impl Default for RegionPicker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_then_release_selects_when_above_cancel_threshold() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(100.0, 100.0);
        let reason = picker.on_left_release(false, 1.0);
        assert_eq!(reason, Some(FinishReason::Selected));
    }

    #[test]
    fn tiny_drag_is_cancelled() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(10.0, 10.0, 1.0);
        picker.on_motion(10.2, 10.2);
        let reason = picker.on_left_release(false, 1.0);
        assert_eq!(reason, Some(FinishReason::Cancelled));
        assert_eq!(picker.state, RegionPickerState::Empty);
    }

    #[test]
    fn ctrl_release_enters_editing() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        let reason = picker.on_left_release(true, 1.0);
        assert_eq!(reason, None);
        assert_eq!(picker.state, RegionPickerState::Editing);
    }

    #[test]
    fn hit_test_outside_margin_is_none() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        picker.on_left_release(true, 1.0);
        assert!(picker.hit_test(1000.0, 1000.0).is_none());
    }

    #[test]
    fn hit_test_near_corner_returns_corner_anchor() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        picker.on_left_release(true, 1.0);
        assert_eq!(picker.hit_test(1.0, 1.0), Some(Anchor::TopLeft));
    }

    #[test]
    fn escape_clears_and_cancels() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        assert_eq!(picker.on_escape(), FinishReason::Cancelled);
        assert_eq!(picker.state, RegionPickerState::Empty);
    }

    #[test]
    fn damage_is_none_when_nothing_changed() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        let _ = picker.damage(1.0, 800, 600);
        assert!(picker.damage(1.0, 800, 600).is_none());
    }

    #[test]
    fn damage_is_full_surface_on_size_change() {
        let mut picker = RegionPicker::new();
        picker.on_left_press(0.0, 0.0, 1.0);
        picker.on_motion(50.0, 50.0);
        let _ = picker.damage(1.0, 800, 600);
        let damage = picker.damage(1.0, 1024, 768).expect("size change always redraws");
        assert_eq!(damage, BBox::new(0.0, 0.0, 1024.0, 768.0));
    }
}
