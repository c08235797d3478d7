//! Output geometry types and the per-output record built up by
//! [`crate::globals::GlobalsState`] (spec.md §3 "Output", §4.1).

use wayland_client::protocol::{wl_output, wl_output::WlOutput};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub position: Position,
    pub size: Size,
}

/// A region in the compositor's logical (post-scale, post-transform)
/// coordinate space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct LogicalRegion {
    pub inner: Region,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}x{})", self.width, self.height)
    }
}

impl std::fmt::Display for LogicalRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.inner.position, self.inner.size)
    }
}

/// A Wayland output, tracked from registry bind through removal.
///
/// `ready()` becomes true once the name, logical position and logical size
/// have all arrived — the point at which the output is safe to hand to the
/// capture backends and overlay.
#[derive(Debug, Clone)]
pub struct OutputInfo {
    pub wl_output: WlOutput,
    pub(crate) registry_name: u32,
    pub name: String,
    pub description: String,
    pub transform: wl_output::Transform,
    pub scale: i32,
    pub physical_size: Size,
    pub logical_region: LogicalRegion,
    pub(crate) has_name: bool,
    pub(crate) has_logical_position: bool,
    pub(crate) has_logical_size: bool,
}

impl OutputInfo {
    pub(crate) fn new(wl_output: WlOutput, registry_name: u32) -> Self {
        Self {
            wl_output,
            registry_name,
            name: String::new(),
            description: String::new(),
            transform: wl_output::Transform::Normal,
            scale: 1,
            physical_size: Size::default(),
            logical_region: LogicalRegion::default(),
            has_name: false,
            has_logical_position: false,
            has_logical_size: false,
        }
    }

    pub fn ready(&self) -> bool {
        self.has_name && self.has_logical_position && self.has_logical_size
    }
}

impl From<&OutputInfo> for LogicalRegion {
    fn from(info: &OutputInfo) -> Self {
        info.logical_region
    }
}
