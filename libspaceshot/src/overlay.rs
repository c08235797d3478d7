//! The fullscreen layer-shell overlay surface used to show the picker UI on
//! top of a captured output (spec.md §4.7). Grounded on
//! `examples/original_source/src/wayland/overlay-surface.h` and
//! `render.h`: a 2-slot pool of `RenderBuffer`s, each a shared-memory
//! `wl_buffer` paired with a CPU drawing surface.

use wayland_client::protocol::{wl_callback::WlCallback, wl_compositor::WlCompositor, wl_surface::WlSurface};
use wayland_client::{Dispatch, QueueHandle};
use wayland_protocols::wp::fractional_scale::v1::client::{
    wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1,
    wp_fractional_scale_v1::{self, WpFractionalScaleV1},
};
use wayland_protocols::wp::viewporter::client::{wp_viewport::WpViewport, wp_viewporter::WpViewporter};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{Layer, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use crate::draw::DrawSurface;
use crate::error::{Error, Result};
use crate::image::PixelFormat;
use crate::output::OutputInfo;
use crate::shm::ShmBuffer;

const BUFFER_COUNT: usize = 2;

/// One shared-memory-backed `wl_buffer` plus a CPU drawing surface over it,
/// tracked by a busy flag so the overlay never writes into a buffer the
/// compositor hasn't released yet.
pub struct RenderBuffer {
    shm: ShmBuffer,
    pub is_busy: bool,
}

impl RenderBuffer {
    fn new<D>(
        shm_global: &wayland_client::protocol::wl_shm::WlShm,
        qh: &QueueHandle<D>,
        width: u32,
        height: u32,
    ) -> std::io::Result<Self>
    where
        D: Dispatch<wayland_client::protocol::wl_shm_pool::WlShmPool, ()>
            + Dispatch<wayland_client::protocol::wl_buffer::WlBuffer, ()>
            + 'static,
    {
        let shm = ShmBuffer::new(shm_global, qh, PixelFormat::Xrgb8888, width, height, ())?;
        Ok(Self { shm, is_busy: false })
    }

    pub fn attach_to_surface(&mut self, surface: &WlSurface) {
        surface.attach(Some(&self.shm.wl_buffer), 0, 0);
        self.is_busy = true;
    }

    pub fn draw_surface(&self) -> DrawSurface {
        DrawSurface::from_image(
            self.shm.as_image_bytes(),
            self.shm.width,
            self.shm.height,
            self.shm.stride,
            true,
        )
    }

    pub fn write_surface(&mut self, surface: &DrawSurface) {
        let stride = self.shm.stride;
        surface.write_into(&mut self.shm.mmap, stride, true, false);
    }
}

/// A fullscreen `zwlr_layer_surface_v1` overlay for one output, driving a
/// frame-callback render loop over a 2-slot [`RenderBuffer`] pool.
pub struct OverlaySurface {
    pub surface: WlSurface,
    pub layer_surface: ZwlrLayerSurfaceV1,
    pub viewport: Option<WpViewport>,
    pub fractional_scale: Option<WpFractionalScaleV1>,
    pub width: u32,
    pub height: u32,
    pub scale_120ths: u32,
    device_width: u32,
    device_height: u32,
    buffers: [Option<RenderBuffer>; BUFFER_COUNT],
    buffer_device_size: (u32, u32),
    next_slot: usize,
    configured: bool,
    frame_callback: Option<WlCallback>,
}

impl OverlaySurface {
    pub fn new<D>(
        compositor: &WlCompositor,
        layer_shell: &ZwlrLayerShellV1,
        viewporter: Option<&WpViewporter>,
        fractional_scale_manager: Option<&WpFractionalScaleManagerV1>,
        output: &OutputInfo,
        qh: &QueueHandle<D>,
    ) -> Self
    where
        D: Dispatch<WlSurface, ()>
            + Dispatch<ZwlrLayerSurfaceV1, ()>
            + Dispatch<WpViewport, ()>
            + Dispatch<WpFractionalScaleV1, ()>
            + 'static,
    {
        let surface = compositor.create_surface(qh, ());
        let layer_surface = layer_shell.get_layer_surface(
            &surface,
            Some(&output.wl_output),
            Layer::Overlay,
            "spaceshot".to_string(),
            qh,
            (),
        );
        layer_surface.set_anchor(Anchor::Top | Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer_surface.set_exclusive_zone(-1);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
        let viewport = viewporter.map(|vp| vp.get_viewport(&surface, qh, ()));
        let fractional_scale = fractional_scale_manager.map(|mgr| mgr.get_fractional_scale(&surface, qh, ()));
        surface.commit();

        let width = output.logical_region.inner.size.width;
        let height = output.logical_region.inner.size.height;
        let scale_120ths = 120;

        let mut overlay = Self {
            surface,
            layer_surface,
            viewport,
            fractional_scale,
            width,
            height,
            scale_120ths,
            device_width: width,
            device_height: height,
            buffers: [None, None],
            buffer_device_size: (0, 0),
            next_slot: 0,
            configured: false,
            frame_callback: None,
        };
        overlay.recompute_device_size();
        overlay
    }

    pub fn scale(&self) -> f64 {
        self.scale_120ths as f64 / 120.0
    }

    /// The render buffer's resolution in device pixels, after applying
    /// `scale_120ths` to the logical size (spec.md §3/§8).
    pub fn device_size(&self) -> (u32, u32) {
        (self.device_width, self.device_height)
    }

    /// Recompute `device_width`/`device_height` from the current logical
    /// size and `scale_120ths` (spec.md §3/§8 `device = round(logical·scale/120)`),
    /// set the viewport's destination to the logical size so the compositor
    /// scales the device-pixel buffer back down, and invalidate any render
    /// buffers sized for the previous device resolution.
    fn recompute_device_size(&mut self) {
        self.device_width = ((self.width as u64 * self.scale_120ths as u64 + 60) / 120) as u32;
        self.device_height = ((self.height as u64 * self.scale_120ths as u64 + 60) / 120) as u32;
        if let Some(viewport) = &self.viewport {
            viewport.set_destination(self.width as i32, self.height as i32);
        }
        if (self.device_width, self.device_height) != self.buffer_device_size {
            self.buffers = [None, None];
        }
    }

    fn ensure_buffers<D>(
        &mut self,
        shm: &wayland_client::protocol::wl_shm::WlShm,
        qh: &QueueHandle<D>,
    ) -> Result<()>
    where
        D: Dispatch<wayland_client::protocol::wl_shm_pool::WlShmPool, ()>
            + Dispatch<wayland_client::protocol::wl_buffer::WlBuffer, ()>
            + 'static,
    {
        for slot in self.buffers.iter_mut() {
            if slot.is_none() {
                *slot = Some(RenderBuffer::new(shm, qh, self.device_width, self.device_height)?);
            }
        }
        self.buffer_device_size = (self.device_width, self.device_height);
        Ok(())
    }

    /// Grab the next free render buffer slot, round-robin, skipping any
    /// still marked busy by the compositor.
    fn acquire_slot(&mut self) -> Option<usize> {
        for offset in 0..BUFFER_COUNT {
            let idx = (self.next_slot + offset) % BUFFER_COUNT;
            if let Some(buf) = &self.buffers[idx] {
                if !buf.is_busy {
                    self.next_slot = (idx + 1) % BUFFER_COUNT;
                    return Some(idx);
                }
            }
        }
        None
    }

    /// Render `paint` into the next free buffer and commit it, requesting a
    /// frame callback so the next render waits for vsync (spec.md §4.7).
    /// `damage`, in device pixels, restricts the `damage_buffer` region
    /// advertised to the compositor to what actually changed (spec.md §4.5
    /// "Incremental damage"); `None` damages the whole buffer.
    pub fn render<D>(
        &mut self,
        shm: &wayland_client::protocol::wl_shm::WlShm,
        qh: &QueueHandle<D>,
        damage: Option<(i32, i32, i32, i32)>,
        paint: impl FnOnce(&mut DrawSurface),
    ) -> Result<()>
    where
        D: Dispatch<wayland_client::protocol::wl_shm_pool::WlShmPool, ()>
            + Dispatch<wayland_client::protocol::wl_buffer::WlBuffer, ()>
            + Dispatch<WlCallback, ()>
            + 'static,
    {
        self.ensure_buffers(shm, qh)?;
        let slot = self.acquire_slot().ok_or(Error::BufferTooSmall)?;
        let buffer = self.buffers[slot].as_mut().expect("slot populated by ensure_buffers");

        let mut draw_surface = buffer.draw_surface();
        paint(&mut draw_surface);
        buffer.write_surface(&draw_surface);
        buffer.attach_to_surface(&self.surface);

        let (dx, dy, dw, dh) = damage.unwrap_or((0, 0, self.device_width as i32, self.device_height as i32));
        self.surface.damage_buffer(dx, dy, dw, dh);
        self.frame_callback = Some(self.surface.frame(qh, ()));
        self.surface.commit();
        Ok(())
    }

    /// Release the buffer the compositor has finished reading from. Called
    /// from the `wl_buffer.release` handler.
    pub fn release_buffer(&mut self, released: &wayland_client::protocol::wl_buffer::WlBuffer) {
        for slot in self.buffers.iter_mut().flatten() {
            if &slot.shm.wl_buffer == released {
                slot.is_busy = false;
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// The id of the frame callback currently outstanding, if any, so a
    /// `wl_callback.done` dispatched elsewhere can find which overlay it
    /// belongs to.
    pub fn frame_callback_id(&self) -> Option<wayland_client::backend::ObjectId> {
        self.frame_callback.as_ref().map(wayland_client::Proxy::id)
    }
}

impl Drop for OverlaySurface {
    fn drop(&mut self) {
        self.layer_surface.destroy();
        if let Some(viewport) = &self.viewport {
            viewport.destroy();
        }
        if let Some(fractional_scale) = &self.fractional_scale {
            fractional_scale.destroy();
        }
        self.surface.destroy();
    }
}

/// Dispatch glue is implemented on the coordinator's top-level state (spec.md
/// §4.10), not here, since layer-surface configure/close events must mutate
/// the set of live overlays. These helper functions interpret the raw events
/// for that caller.
pub fn handle_layer_surface_configure(
    layer_surface: &ZwlrLayerSurfaceV1,
    serial: u32,
    width: u32,
    height: u32,
    overlay: &mut OverlaySurface,
) {
    layer_surface.ack_configure(serial);
    if width > 0 {
        overlay.width = width;
    }
    if height > 0 {
        overlay.height = height;
    }
    overlay.configured = true;
    overlay.recompute_device_size();
}

pub fn handle_fractional_scale(overlay: &mut OverlaySurface, event: wp_fractional_scale_v1::Event) {
    if let wp_fractional_scale_v1::Event::PreferredScale { scale } = event {
        overlay.scale_120ths = scale;
        overlay.recompute_device_size();
    }
}
