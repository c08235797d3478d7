//! Wayland global discovery and the output registry (spec.md §4.1). Grounded
//! on `libwayshot::dispatch::OutputCaptureState`: bind `wl_output` globals
//! from the registry, then use `zxdg_output_manager_v1` to learn their
//! logical position and size.

use wayland_client::globals::GlobalList;
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_data_device_manager::WlDataDeviceManager, wl_output,
    wl_output::WlOutput, wl_registry, wl_seat::WlSeat, wl_shm::WlShm,
};
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum::Value, delegate_noop};
use wayland_protocols::wp::viewporter::client::{wp_viewport::WpViewport, wp_viewporter::WpViewporter};
use wayland_protocols::wp::fractional_scale::v1::client::{
    wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1,
};
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::WpCursorShapeManagerV1;
use wayland_protocols::xdg::xdg_output::zv1::client::{
    zxdg_output_manager_v1::ZxdgOutputManagerV1,
    zxdg_output_v1::{self, ZxdgOutputV1},
};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;
use wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1;
use wayland_protocols::ext::image_capture_source::v1::client::ext_output_image_capture_source_manager_v1::ExtOutputImageCaptureSourceManagerV1;
use wayland_protocols::ext::image_copy_capture::v1::client::ext_image_copy_capture_manager_v1::ExtImageCopyCaptureManagerV1;

use crate::output::{LogicalRegion, OutputInfo, Position, Region, Size};

/// Holds every bound global plus the in-progress output registry. One
/// instance drives the whole connection's registry/event dispatch.
#[derive(Debug)]
pub struct GlobalsState {
    pub outputs: Vec<OutputInfo>,
    pub compositor: Option<WlCompositor>,
    pub shm: Option<WlShm>,
    pub seat: Option<WlSeat>,
    pub layer_shell: Option<ZwlrLayerShellV1>,
    pub viewporter: Option<WpViewporter>,
    pub fractional_scale_manager: Option<WpFractionalScaleManagerV1>,
    pub screencopy_manager: Option<ZwlrScreencopyManagerV1>,
    pub ext_source_manager: Option<ExtOutputImageCaptureSourceManagerV1>,
    pub ext_capture_manager: Option<ExtImageCopyCaptureManagerV1>,
    pub data_device_manager: Option<WlDataDeviceManager>,
    pub cursor_shape_manager: Option<WpCursorShapeManagerV1>,
    xdg_output_manager: Option<ZxdgOutputManagerV1>,
}

impl GlobalsState {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            compositor: None,
            shm: None,
            seat: None,
            layer_shell: None,
            viewporter: None,
            fractional_scale_manager: None,
            screencopy_manager: None,
            ext_source_manager: None,
            ext_capture_manager: None,
            data_device_manager: None,
            cursor_shape_manager: None,
            xdg_output_manager: None,
        }
    }

    /// Bind every global this crate needs from an already-enumerated
    /// `GlobalList`, then request `zxdg_output_v1` for each `wl_output` so
    /// logical geometry arrives on the next roundtrip.
    ///
    /// Generic over the dispatch target `D` so the unified top-level state
    /// (spec.md §4.9's combined coordinator) can bind every proxy on its own
    /// single event queue from the start, rather than on a throwaway
    /// `GlobalsState`-typed queue whose later events would never be polled.
    pub fn bind<D>(&mut self, globals: &GlobalList, qh: &QueueHandle<D>)
    where
        D: Dispatch<WlCompositor, ()>
            + Dispatch<WlShm, ()>
            + Dispatch<WlSeat, ()>
            + Dispatch<ZwlrLayerShellV1, ()>
            + Dispatch<WpViewporter, ()>
            + Dispatch<WpFractionalScaleManagerV1, ()>
            + Dispatch<ZwlrScreencopyManagerV1, ()>
            + Dispatch<ExtOutputImageCaptureSourceManagerV1, ()>
            + Dispatch<ExtImageCopyCaptureManagerV1, ()>
            + Dispatch<WlDataDeviceManager, ()>
            + Dispatch<WpCursorShapeManagerV1, ()>
            + Dispatch<ZxdgOutputManagerV1, ()>
            + Dispatch<WlOutput, usize>
            + Dispatch<ZxdgOutputV1, usize>
            + 'static,
    {
        self.compositor = globals.bind(qh, 1..=5, ()).ok();
        self.shm = globals.bind(qh, 1..=1, ()).ok();
        self.seat = globals.bind(qh, 1..=8, ()).ok();
        self.layer_shell = globals.bind(qh, 1..=4, ()).ok();
        self.viewporter = globals.bind(qh, 1..=1, ()).ok();
        self.fractional_scale_manager = globals.bind(qh, 1..=1, ()).ok();
        self.screencopy_manager = globals.bind(qh, 1..=3, ()).ok();
        self.ext_source_manager = globals.bind(qh, 1..=1, ()).ok();
        self.ext_capture_manager = globals.bind(qh, 1..=1, ()).ok();
        self.data_device_manager = globals.bind(qh, 1..=3, ()).ok();
        self.cursor_shape_manager = globals.bind(qh, 1..=1, ()).ok();
        self.xdg_output_manager = globals.bind(qh, 1..=3, ()).ok();

        let wl_outputs: Vec<(u32, u32)> = globals
            .contents()
            .with_list(|list| {
                list.iter()
                    .filter(|g| g.interface == "wl_output")
                    .map(|g| (g.name, g.version))
                    .collect()
            });

        for (name, version) in wl_outputs {
            if version < 4 {
                tracing::warn!(name, "ignoring wl_output below version 4");
                continue;
            }
            let wl_output: WlOutput = globals.registry().bind(name, 4, qh, name as usize);
            self.outputs.push(OutputInfo::new(wl_output, name));
            if let Some(manager) = &self.xdg_output_manager {
                let idx = self.outputs.len() - 1;
                manager.get_xdg_output(&self.outputs[idx].wl_output, qh, idx);
            }
        }
    }

    pub fn output_by_name<'a>(&'a self, name: &str) -> Option<&'a OutputInfo> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn ready_outputs(&self) -> Vec<&OutputInfo> {
        self.outputs.iter().filter(|o| o.ready()).collect()
    }

    /// Event bodies factored out of the `Dispatch` impls below so the
    /// coordinator's combined top-level state (spec.md §4.9) can delegate to
    /// them without needing a `QueueHandle<GlobalsState>` of its own — none
    /// of these handlers use the queue handle.
    pub(crate) fn handle_registry_event(&mut self, event: wl_registry::Event) {
        if let wl_registry::Event::GlobalRemove { name } = event {
            self.outputs.retain(|o| o.registry_name != name);
        }
    }

    pub(crate) fn handle_output_event(&mut self, wl_output: &WlOutput, event: wl_output::Event) {
        let Some(output) = self.outputs.iter_mut().find(|o| o.wl_output == *wl_output) else {
            return;
        };
        match event {
            wl_output::Event::Name { name } => {
                output.name = name;
                output.has_name = true;
            }
            wl_output::Event::Description { description } => {
                output.description = description;
            }
            wl_output::Event::Mode { width, height, .. } => {
                output.physical_size = Size {
                    width: width as u32,
                    height: height as u32,
                };
            }
            wl_output::Event::Geometry {
                transform: Value(transform),
                ..
            } => {
                output.transform = transform;
            }
            wl_output::Event::Scale { factor } => {
                output.scale = factor;
            }
            _ => {}
        }
    }

    pub(crate) fn handle_xdg_output_event(&mut self, index: usize, event: zxdg_output_v1::Event) {
        let Some(output) = self.outputs.get_mut(index) else {
            return;
        };
        match event {
            zxdg_output_v1::Event::LogicalPosition { x, y } => {
                output.logical_region.inner.position = Position { x, y };
                output.has_logical_position = true;
            }
            zxdg_output_v1::Event::LogicalSize { width, height } => {
                output.logical_region.inner.size = Size {
                    width: width as u32,
                    height: height as u32,
                };
                output.has_logical_size = true;
            }
            _ => {}
        }
    }
}

impl Default for GlobalsState {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch<wl_registry::WlRegistry, wayland_client::globals::GlobalListContents> for GlobalsState {
    fn event(
        state: &mut Self,
        _registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &wayland_client::globals::GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.handle_registry_event(event);
    }
}

impl Dispatch<WlOutput, usize> for GlobalsState {
    fn event(
        state: &mut Self,
        wl_output: &WlOutput,
        event: wl_output::Event,
        _data: &usize,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.handle_output_event(wl_output, event);
    }
}

impl Dispatch<ZxdgOutputV1, usize> for GlobalsState {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        index: &usize,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.handle_xdg_output_event(*index, event);
    }
}

impl TryFrom<&[&OutputInfo]> for LogicalRegion {
    type Error = crate::error::Error;

    fn try_from(outputs: &[&OutputInfo]) -> crate::error::Result<Self> {
        let x1 = outputs.iter().map(|o| o.logical_region.inner.position.x).min();
        let y1 = outputs.iter().map(|o| o.logical_region.inner.position.y).min();
        let x2 = outputs
            .iter()
            .map(|o| o.logical_region.inner.position.x + o.logical_region.inner.size.width as i32)
            .max();
        let y2 = outputs
            .iter()
            .map(|o| o.logical_region.inner.position.y + o.logical_region.inner.size.height as i32)
            .max();
        let (Some(x1), Some(y1), Some(x2), Some(y2)) = (x1, y1, x2, y2) else {
            return Err(crate::error::Error::NoOutputs);
        };
        Ok(LogicalRegion {
            inner: Region {
                position: Position { x: x1, y: y1 },
                size: Size {
                    width: (x2 - x1) as u32,
                    height: (y2 - y1) as u32,
                },
            },
        })
    }
}

delegate_noop!(GlobalsState: ignore WlCompositor);
delegate_noop!(GlobalsState: ignore WlShm);
delegate_noop!(GlobalsState: ignore WlSeat);
delegate_noop!(GlobalsState: ignore ZwlrLayerShellV1);
delegate_noop!(GlobalsState: ignore WpViewporter);
delegate_noop!(GlobalsState: ignore WpFractionalScaleManagerV1);
delegate_noop!(GlobalsState: ignore ZwlrScreencopyManagerV1);
delegate_noop!(GlobalsState: ignore ExtOutputImageCaptureSourceManagerV1);
delegate_noop!(GlobalsState: ignore ExtImageCopyCaptureManagerV1);
delegate_noop!(GlobalsState: ignore WlDataDeviceManager);
delegate_noop!(GlobalsState: ignore WpCursorShapeManagerV1);
delegate_noop!(GlobalsState: ignore ZxdgOutputManagerV1);
delegate_noop!(GlobalsState: ignore WpViewport);
