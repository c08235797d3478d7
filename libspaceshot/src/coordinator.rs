//! The Main Coordinator (spec.md §4.9): owns the per-output capture
//! entries, drives the three top-level capture modes, and runs the two
//! sequential dispatch loops (active UI, then clipboard) before exit.
//! Grounded on `examples/original_source/src/main.c`'s state-machine shape,
//! translated into a single `wayland_client::Dispatch` target since this
//! crate's event queue can only hand events to one `&mut State`.

use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_callback::WlCallback, wl_data_device, wl_data_source,
    wl_keyboard, wl_output::WlOutput, wl_pointer, wl_registry, wl_seat, wl_shm_pool::WlShmPool,
    wl_surface::WlSurface,
};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle};
use wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_v1::{
    self, WpFractionalScaleV1,
};
use wayland_protocols::wp::viewporter::client::wp_viewport::WpViewport;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1};
use wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_v1::ZxdgOutputV1;

use crate::bbox::BBox;
use crate::capture::{self, CaptureBackendKind, ScreenCapture};
use crate::clipboard::{self, ClipboardUserData};
use crate::draw::Rgba;
use crate::error::{Error, Result};
use crate::globals::GlobalsState;
use crate::image::{Image, PixelFormat};
use crate::link_buffer::LinkBuffer;
use crate::output::OutputInfo;
use crate::overlay::{self, OverlaySurface};
use crate::picker::{FinishReason, OutputPicker, RegionPicker, SmartBorderWorker};
use crate::png_encoder;
use crate::seat::SeatDispatcher;

/// What the user asked for, either from the command line or a re-applied
/// `defer` argv (spec.md §4.9, §6 "CLI surface").
#[derive(Debug, Clone)]
pub enum CaptureMode {
    WholeOutput { name: Option<String> },
    PredefinedRegion { bbox: Option<BBox> },
    InteractiveRegion,
    InteractiveOutput,
    Defer,
}

/// Styling the render loop needs but that's configured externally (spec.md
/// §7 config file, out of this crate's scope).
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub border_color: Rgba,
    pub dim_color: Rgba,
    pub smart_border: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            border_color: Rgba::new(255, 255, 255, 255),
            dim_color: Rgba::new(0, 0, 0, 110),
            smart_border: false,
        }
    }
}

/// What the core hands back to its caller once an output's (or region's)
/// capture has reached a terminal state; the callback then performs the
/// file-naming/notification mechanics spec.md keeps out of this crate's
/// scope (§1 "Out of scope (external collaborators)").
pub trait OutputSink {
    fn save(&mut self, output_name: &str, png: &[u8]) -> std::io::Result<()>;
    fn notify(&mut self, output_name: &str);
}

enum PickerKind {
    Empty,
    Region(RegionPicker),
    Output(OutputPicker),
    Defer,
}

struct CaptureEntry {
    output: OutputInfo,
    image: Option<Image>,
    overlay: Option<OverlaySurface>,
    picker: PickerKind,
    smart_border: Option<SmartBorderWorker>,
    background: Option<crate::draw::DrawSurface>,
}

impl CaptureEntry {
    fn new(output: OutputInfo) -> Self {
        Self {
            output,
            image: None,
            overlay: None,
            picker: PickerKind::Empty,
            smart_border: None,
            background: None,
        }
    }
}

/// The crate's single `Dispatch` target. Everything that needs to mutate
/// shared state — per-output entries, the seat, the clipboard offer — lives
/// here rather than behind trait-object listeners, since a single-threaded
/// cooperative event loop has no aliasing hazard to guard against (spec.md
/// §5 "Scheduling model").
pub struct Coordinator {
    conn: Connection,
    globals: GlobalsState,
    seat: Option<SeatDispatcher>,
    entries: Vec<CaptureEntry>,
    mode: CaptureMode,
    backend: Box<dyn ScreenCapture>,
    render_config: RenderConfig,
    copy_to_clipboard: bool,
    force_background: bool,
    sink: Box<dyn OutputSink>,
    active_wait: bool,
    clipboard_offer: Option<wayland_client::protocol::wl_data_source::WlDataSource>,
    clipboard_cancelled: bool,
    selection_cancelled: bool,
}

impl Coordinator {
    pub fn connect(
        mode: CaptureMode,
        render_config: RenderConfig,
        copy_to_clipboard: bool,
        force_background: bool,
        backend_preference: &[CaptureBackendKind],
        sink: Box<dyn OutputSink>,
    ) -> Result<(Self, wayland_client::EventQueue<Self>)> {
        let conn = Connection::connect_to_env()?;
        // Every proxy this crate ever touches is bound on this one queue, so
        // that no global/output/seat event is ever left stranded on a queue
        // nobody polls (the coordinator is the sole `Dispatch` target for
        // the whole connection, per spec.md §4.9).
        let (globals, mut event_queue) = wayland_client::globals::registry_queue_init::<Coordinator>(&conn)?;
        let qh = event_queue.handle();

        let mut globals_state = GlobalsState::new();
        globals_state.bind(&globals, &qh);

        let backend_kind = capture::select_backend(&globals_state, backend_preference)?;
        let backend = capture::build_backend(backend_kind, &globals_state)?;
        let seat = globals_state
            .seat
            .clone()
            .map(|seat| SeatDispatcher::new(seat, &qh, globals_state.data_device_manager.as_ref(), globals_state.cursor_shape_manager.as_ref()));

        let mut coordinator = Coordinator {
            conn,
            globals: globals_state,
            seat,
            entries: Vec::new(),
            mode,
            backend,
            render_config,
            copy_to_clipboard,
            force_background,
            sink,
            active_wait: true,
            clipboard_offer: None,
            clipboard_cancelled: false,
            selection_cancelled: false,
        };

        event_queue.roundtrip(&mut coordinator)?;
        // A second roundtrip lets `zxdg_output_v1`'s logical geometry, which
        // was only requested during `bind`, actually arrive.
        event_queue.roundtrip(&mut coordinator)?;

        coordinator.entries = coordinator
            .globals
            .ready_outputs()
            .into_iter()
            .cloned()
            .map(CaptureEntry::new)
            .collect();
        if coordinator.entries.is_empty() {
            return Err(Error::NoOutputs);
        }

        Ok((coordinator, event_queue))
    }

    /// Capture every tracked output up front. Capture is blocking per spec.md
    /// §4.3/§4.9: each backend call runs its own short-lived event queue, so
    /// this does not touch `event_queue`.
    pub fn capture_all(&mut self, filter_output: Option<&str>) {
        for entry in self.entries.iter_mut() {
            if let Some(filter) = filter_output {
                if entry.output.name != filter {
                    continue;
                }
            }
            match self.backend.capture(&self.conn, &self.globals, &entry.output) {
                Ok(frame) => entry.image = Some(apply_output_transform(frame.image, frame.transform)),
                Err(err) => {
                    tracing::error!(output = %entry.output.name, %err, "capture failed");
                }
            }
        }
    }

    /// Dispatch a captured image per the current mode (spec.md §4.9
    /// "Mode-specific action per matching output").
    pub fn dispatch_captures(&mut self, qh: &QueueHandle<Self>) -> Result<()> {
        let mode = self.mode.clone();
        match mode {
            CaptureMode::WholeOutput { name } => {
                for idx in 0..self.entries.len() {
                    if name.as_deref().is_some_and(|n| n != self.entries[idx].output.name) {
                        continue;
                    }
                    self.finish_whole_output(idx, qh);
                }
                self.active_wait = false;
            }
            CaptureMode::PredefinedRegion { bbox } => {
                for idx in 0..self.entries.len() {
                    self.finish_predefined_region(idx, bbox.clone(), qh);
                }
                self.active_wait = false;
            }
            CaptureMode::InteractiveRegion => {
                for idx in 0..self.entries.len() {
                    self.build_region_picker(idx, qh);
                }
            }
            CaptureMode::InteractiveOutput => {
                for idx in 0..self.entries.len() {
                    self.build_output_picker(idx, qh);
                }
            }
            CaptureMode::Defer => {
                self.entries.iter_mut().for_each(|e| e.picker = PickerKind::Defer);
            }
        }
        Ok(())
    }

    /// Re-apply a mode read back over stdin during the defer handshake
    /// (spec.md §4.9 "Defer protocol"). Each already-captured image is
    /// dispatched as if just received.
    pub fn redispatch_deferred(&mut self, mode: CaptureMode, qh: &QueueHandle<Self>) -> Result<()> {
        self.mode = mode;
        self.dispatch_captures(qh)
    }

    fn finish_whole_output(&mut self, idx: usize, qh: &QueueHandle<Self>) {
        let Some(image) = self.entries[idx].image.take() else { return };
        self.encode_save_notify(idx, image, qh);
    }

    fn finish_predefined_region(&mut self, idx: usize, bbox: Option<BBox>, qh: &QueueHandle<Self>) {
        let Some(image) = self.entries[idx].image.take() else { return };
        let cropped = match bbox {
            None => image,
            Some(requested) => {
                let output = &self.entries[idx].output;
                // compositor space -> output space -> device space.
                let local = requested.translate(
                    -(output.logical_region.inner.position.x as f64),
                    -(output.logical_region.inner.position.y as f64),
                );
                let device = local.scale(output.scale as f64).round();
                let bounds = BBox::new(0.0, 0.0, image.width() as f64, image.height() as f64);
                let clipped = device.constrain(&bounds);
                image.crop(clipped.x as i32, clipped.y as i32, clipped.width as u32, clipped.height as u32)
            }
        };
        self.encode_save_notify(idx, cropped, qh);
    }

    fn build_region_picker(&mut self, idx: usize, qh: &QueueHandle<Self>) {
        let Some(image) = self.entries[idx].image.clone() else { return };
        let output = self.entries[idx].output.clone();
        let overlay = self.new_overlay(&output, qh);
        let background = image.to_draw_surface();

        if self.render_config.smart_border {
            self.entries[idx].smart_border =
                Some(SmartBorderWorker::spawn(image.clone(), overlay.scale_120ths, PixelFormat::Xrgb8888));
        }

        self.entries[idx].image = Some(image);
        self.entries[idx].overlay = Some(overlay);
        self.entries[idx].background = background;
        self.entries[idx].picker = PickerKind::Region(RegionPicker::new());
    }

    fn build_output_picker(&mut self, idx: usize, qh: &QueueHandle<Self>) {
        let Some(image) = self.entries[idx].image.clone() else { return };
        let output = self.entries[idx].output.clone();
        let overlay = self.new_overlay(&output, qh);
        let width = output.logical_region.inner.size.width as f64;
        let height = output.logical_region.inner.size.height as f64;

        self.entries[idx].background = image.to_draw_surface();
        self.entries[idx].image = Some(image);
        self.entries[idx].overlay = Some(overlay);
        self.entries[idx].picker = PickerKind::Output(OutputPicker::new(width, height));
    }

    fn new_overlay(&self, output: &OutputInfo, qh: &QueueHandle<Self>) -> OverlaySurface {
        OverlaySurface::new(
            self.globals.compositor.as_ref().expect("compositor bound at startup"),
            self.globals.layer_shell.as_ref().expect("layer shell bound at startup"),
            self.globals.viewporter.as_ref(),
            self.globals.fractional_scale_manager.as_ref(),
            output,
            qh,
        )
    }

    fn encode_save_notify(&mut self, idx: usize, image: Image, qh: &QueueHandle<Self>) {
        let name = self.entries[idx].output.name.clone();
        let buffer = match png_encoder::encode(&image, png::Compression::Default) {
            Ok(buf) => buf,
            Err(err) => {
                tracing::error!(output = %name, %err, "png encoding failed");
                return;
            }
        };
        let bytes = buffer.to_vec();
        if let Err(err) = self.sink.save(&name, &bytes) {
            tracing::error!(output = %name, %err, "failed to save screenshot");
        }
        self.sink.notify(&name);

        if self.copy_to_clipboard {
            self.offer_clipboard(buffer, qh);
        }
    }

    fn offer_clipboard(&mut self, buffer: LinkBuffer, qh: &QueueHandle<Self>) {
        let Some(manager) = self.globals.data_device_manager.clone() else { return };
        let Some(seat) = &self.seat else { return };
        let source = clipboard::offer(&manager, qh, buffer);
        seat.set_selection(&source);
        self.clipboard_offer = Some(source);
    }

    /// Finish one entry's interactive picker and route to the shared
    /// encode/save/notify/clipboard path (spec.md §4.9 "Interactive (region
    /// or output)").
    fn finish_interactive(&mut self, idx: usize, reason: FinishReason, bbox: Option<BBox>, qh: &QueueHandle<Self>) {
        self.entries[idx].overlay = None;
        self.entries[idx].smart_border = None;
        self.entries[idx].picker = PickerKind::Empty;

        match reason {
            FinishReason::Selected => {
                if let Some(image) = self.entries[idx].image.take() {
                    let cropped = match bbox {
                        Some(b) => image.crop(b.x as i32, b.y as i32, b.width as u32, b.height as u32),
                        None => image,
                    };
                    self.encode_save_notify(idx, cropped, qh);
                }
                self.check_all_finished();
            }
            FinishReason::Cancelled | FinishReason::Destroyed => {
                self.entries[idx].image = None;
                self.selection_cancelled = true;
                // spec.md §7/§8 scenario 2: cancellation is reported on stdout,
                // not through the tracing subscriber (which writes to stderr).
                println!("selection cancelled");
                self.check_all_finished();
            }
        }
    }

    fn check_all_finished(&mut self) {
        let still_picking = self
            .entries
            .iter()
            .any(|e| matches!(e.picker, PickerKind::Region(_) | PickerKind::Output(_)));
        if !still_picking {
            self.active_wait = false;
        }
    }

    fn entry_index_for_surface(&self, surface: &WlSurface) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.overlay
                .as_ref()
                .is_some_and(|o| o.surface.id() == surface.id())
        })
    }

    fn entry_index_for_layer_surface(&self, ls: &ZwlrLayerSurfaceV1) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.overlay.as_ref().is_some_and(|o| o.layer_surface.id() == ls.id()))
    }

    fn entry_index_for_fractional_scale(&self, fs: &WpFractionalScaleV1) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.overlay
                .as_ref()
                .and_then(|o| o.fractional_scale.as_ref())
                .is_some_and(|f| f.id() == fs.id())
        })
    }

    fn render_entry(&mut self, idx: usize, qh: &QueueHandle<Self>) {
        let Some(shm) = self.globals.shm.clone() else { return };
        let border_color = self.render_config.border_color;
        let dim_color = self.render_config.dim_color;

        let entry = &mut self.entries[idx];
        let Some(background) = entry.background.as_ref() else { return };
        let smart_mask = entry
            .smart_border
            .as_ref()
            .and_then(|w| w.try_result())
            .and_then(|img| img.to_draw_surface());

        match &mut entry.picker {
            PickerKind::Region(picker) => {
                let scale = entry.overlay.as_ref().map(|o| o.scale()).unwrap_or(1.0);
                let (device_width, device_height) = entry.overlay.as_ref().map(|o| o.device_size()).unwrap_or((0, 0));
                let Some(damage) = picker.damage(scale, device_width, device_height) else {
                    return;
                };
                let rect = (damage.x as i32, damage.y as i32, damage.width as i32, damage.height as i32);
                if let Some(overlay) = entry.overlay.as_mut() {
                    let _ = overlay.render(&shm, qh, Some(rect), |surface| {
                        picker.render(surface, background, scale as f32, border_color, dim_color, smart_mask.as_ref());
                    });
                }
            }
            PickerKind::Output(picker) => {
                let scale = entry.overlay.as_ref().map(|o| o.scale() as f32).unwrap_or(1.0);
                if let Some(overlay) = entry.overlay.as_mut() {
                    let _ = overlay.render(&shm, qh, None, |surface| {
                        picker.render(surface, background, scale);
                    });
                }
            }
            _ => {}
        }
    }

    fn run_active_loop(&mut self, event_queue: &mut wayland_client::EventQueue<Self>) -> Result<()> {
        while self.active_wait {
            event_queue.blocking_dispatch(self)?;
        }
        Ok(())
    }

    fn run_clipboard_loop(&mut self, event_queue: &mut wayland_client::EventQueue<Self>) -> Result<()> {
        // `-b/--background` forces the same detach even with nothing to serve
        // over the clipboard, so a scripted `spaceshot -b region ...` returns
        // control to the caller immediately rather than blocking in the
        // foreground (spec.md §6 "-b, --background").
        if self.clipboard_offer.is_none() && !self.force_background {
            return Ok(());
        }
        daemonize();
        if self.clipboard_offer.is_none() {
            return Ok(());
        }
        while !self.clipboard_cancelled {
            event_queue.blocking_dispatch(self)?;
        }
        Ok(())
    }

    /// Run both dispatch loops to completion and compute the process exit
    /// code (spec.md §4.9 "Shutdown").
    pub fn run(mut self, mut event_queue: wayland_client::EventQueue<Self>) -> Result<i32> {
        self.run_active_loop(&mut event_queue)?;
        self.run_clipboard_loop(&mut event_queue)?;
        Ok(if self.selection_cancelled { 1 } else { 0 })
    }
}

fn apply_output_transform(image: Image, transform: wayland_client::protocol::wl_output::Transform) -> Image {
    use wayland_client::protocol::wl_output::Transform;
    match transform {
        Transform::Normal => image,
        other => crate::internal_error(format!("unsupported output transform {other:?}")),
    }
}

fn daemonize() {
    // Canonical double-fork + setsid (spec.md §4.9 "Shutdown"): detach from
    // the controlling terminal before the clipboard-serving loop, since the
    // calling shell has already moved on by the time a paste happens.
    if !fork_and_exit_parent() {
        return;
    }
    let _ = nix::unistd::setsid();
    if !fork_and_exit_parent() {
        return;
    }
    unsafe {
        let _ = nix::sys::signal::signal(nix::sys::signal::Signal::SIGPIPE, nix::sys::signal::SigHandler::SigIgn);
    }
    let _ = std::env::set_current_dir("/");
    redirect_stdio_to_dev_null();
}

/// Forks once; the parent exits immediately, the child returns `true`. If
/// the fork itself fails, returns `false` so the caller just stays attached
/// to the terminal rather than aborting the whole run.
fn fork_and_exit_parent() -> bool {
    match unsafe { nix::unistd::fork() } {
        Ok(nix::unistd::ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(nix::unistd::ForkResult::Child) => true,
        Err(_) => false,
    }
}

fn redirect_stdio_to_dev_null() {
    use std::os::fd::AsRawFd;
    let Ok(dev_null) = std::fs::OpenOptions::new().read(true).write(true).open("/dev/null") else {
        return;
    };
    let fd = dev_null.as_raw_fd();
    for target in [0, 1, 2] {
        let _ = nix::unistd::dup2(fd, target);
    }
}

// --- Dispatch glue --------------------------------------------------------

impl Dispatch<wl_registry::WlRegistry, wayland_client::globals::GlobalListContents> for Coordinator {
    fn event(
        state: &mut Self,
        _proxy: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &wayland_client::globals::GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.globals.handle_registry_event(event);
    }
}

impl Dispatch<WlOutput, usize> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &WlOutput,
        event: wayland_client::protocol::wl_output::Event,
        _data: &usize,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.globals.handle_output_event(proxy, event);
    }
}

impl Dispatch<ZxdgOutputV1, usize> for Coordinator {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_v1::Event,
        index: &usize,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.globals.handle_xdg_output_event(*index, event);
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for Coordinator {
    fn event(
        _state: &mut Self,
        _proxy: &wl_seat::WlSeat,
        _event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for Coordinator {
    fn event(
        state: &mut Self,
        _proxy: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(seat) = &mut state.seat else { return };
        let Some(mouse) = seat.handle_pointer_event_flushed(event) else { return };
        // Read everything this dispatch needs from `seat` up front: it borrows
        // `state.seat` specifically, but the rest of this function needs
        // `&mut state` as a whole (for `render_entry` and friends), so the
        // borrow must end here rather than being held across those calls.
        let ctrl_held = seat.ctrl_held();
        let focused_idx = mouse.focus.as_ref().and_then(|s| state.entry_index_for_surface(s));

        for (i, entry) in state.entries.iter_mut().enumerate() {
            if let PickerKind::Output(picker) = &mut entry.picker {
                picker.set_focus(Some(i) == focused_idx);
            }
        }
        // Surfaces that just lost focus need a redraw for their dim tint to
        // reappear; the newly focused surface (if any) is redrawn below
        // alongside its motion/click handling, so it is skipped here to
        // avoid issuing two frame callbacks for the same surface in one
        // dispatch (spec.md §5 "Ordering").
        for i in 0..state.entries.len() {
            if Some(i) != focused_idx && matches!(state.entries[i].picker, PickerKind::Output(_)) {
                state.render_entry(i, qh);
            }
        }

        let Some(idx) = focused_idx else { return };
        let scale = state.entries[idx]
            .overlay
            .as_ref()
            .map(|o| o.scale())
            .unwrap_or(1.0);
        let left_pressed = mouse.buttons_pressed.contains(crate::seat::PointerButtons::LEFT);
        let left_released = mouse.buttons_released.contains(crate::seat::PointerButtons::LEFT);

        let mut finished = None;
        match &mut state.entries[idx].picker {
            PickerKind::Region(picker) => {
                if left_pressed {
                    picker.on_left_press(mouse.surface_x, mouse.surface_y, scale);
                }
                picker.on_motion(mouse.surface_x, mouse.surface_y);
                if left_released {
                    if let Some(reason) = picker.on_left_release(ctrl_held, scale) {
                        let bbox = Some(picker.device_box(scale));
                        finished = Some((reason, bbox));
                    }
                }
            }
            PickerKind::Output(picker) => {
                picker.on_motion(mouse.surface_x, mouse.surface_y);
                if left_released {
                    if let Some(reason) = picker.on_left_click() {
                        finished = Some((reason, None));
                    }
                }
            }
            _ => {}
        }

        if let Some((reason, bbox)) = finished {
            state.finish_interactive(idx, reason, bbox, qh);
        } else {
            state.render_entry(idx, qh);
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for Coordinator {
    fn event(
        state: &mut Self,
        _proxy: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(seat) = &mut state.seat else { return };
        let Some(key_event) = seat.handle_keyboard_event_flushed(event) else { return };

        const XKB_KEY_ESCAPE: u32 = 0xff1b;
        const XKB_KEY_SPACE: u32 = 0x0020;
        const XKB_KEY_ALT_L: u32 = 0xffe9;

        let Some(idx) = key_event.focus.as_ref().and_then(|s| state.entry_index_for_surface(s)) else {
            return;
        };

        let raw = key_event.keysym.raw();
        if matches!(raw, XKB_KEY_SPACE | XKB_KEY_ALT_L) {
            // spec.md §4.5 "Movement": space or left-alt held while dragging
            // moves the whole selection instead of resizing it.
            if let PickerKind::Region(picker) = &mut state.entries[idx].picker {
                picker.set_move_active(key_event.kind == crate::seat::KeyboardEventType::Press);
                state.render_entry(idx, qh);
            }
            return;
        }

        if key_event.kind != crate::seat::KeyboardEventType::Release || raw != XKB_KEY_ESCAPE {
            return;
        }
        let reason = match &mut state.entries[idx].picker {
            PickerKind::Region(picker) => Some(picker.on_escape()),
            PickerKind::Output(picker) => Some(picker.on_escape()),
            _ => None,
        };
        if let Some(reason) = reason {
            state.finish_interactive(idx, reason, None, qh);
        }
    }
}

impl Dispatch<wl_data_device::WlDataDevice, ()> for Coordinator {
    fn event(
        _state: &mut Self,
        _proxy: &wl_data_device::WlDataDevice,
        _event: wl_data_device::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_data_source::WlDataSource, ClipboardUserData> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &wl_data_source::WlDataSource,
        event: wl_data_source::Event,
        data: &ClipboardUserData,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if clipboard::handle_event(event, data, proxy) {
            state.clipboard_cancelled = true;
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(idx) = state.entry_index_for_layer_surface(proxy) else { return };
        match event {
            zwlr_layer_surface_v1::Event::Configure { serial, width, height } => {
                if let Some(overlay) = state.entries[idx].overlay.as_mut() {
                    overlay::handle_layer_surface_configure(proxy, serial, width, height, overlay);
                }
                state.render_entry(idx, qh);
            }
            zwlr_layer_surface_v1::Event::Closed => {
                let reason = FinishReason::Destroyed;
                state.finish_interactive(idx, reason, None, qh);
            }
            _ => {}
        }
    }
}

impl Dispatch<WpFractionalScaleV1, ()> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &WpFractionalScaleV1,
        event: wp_fractional_scale_v1::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let Some(idx) = state.entry_index_for_fractional_scale(proxy) else { return };
        if let Some(overlay) = state.entries[idx].overlay.as_mut() {
            overlay::handle_fractional_scale(overlay, event);
        }
        state.render_entry(idx, qh);
    }
}

impl Dispatch<WlCallback, ()> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &WlCallback,
        event: wayland_client::protocol::wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if !matches!(event, wayland_client::protocol::wl_callback::Event::Done { .. }) {
            return;
        }
        let Some(idx) = state.entries.iter().position(|e| {
            e.overlay.as_ref().is_some_and(|o| {
                o.frame_callback_id() == Some(proxy.id())
            })
        }) else {
            return;
        };
        state.render_entry(idx, qh);
    }
}

impl Dispatch<WlBuffer, ()> for Coordinator {
    fn event(
        state: &mut Self,
        proxy: &WlBuffer,
        event: wayland_client::protocol::wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if !matches!(event, wayland_client::protocol::wl_buffer::Event::Release) {
            return;
        }
        for entry in state.entries.iter_mut() {
            if let Some(overlay) = entry.overlay.as_mut() {
                overlay.release_buffer(proxy);
            }
        }
    }
}

delegate_noop!(Coordinator: ignore wayland_client::protocol::wl_compositor::WlCompositor);
delegate_noop!(Coordinator: ignore wayland_client::protocol::wl_shm::WlShm);
delegate_noop!(Coordinator: ignore WlShmPool);
delegate_noop!(Coordinator: ignore WlSurface);
delegate_noop!(Coordinator: ignore WpViewport);
delegate_noop!(Coordinator: ignore wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1);
delegate_noop!(Coordinator: ignore wayland_protocols::wp::viewporter::client::wp_viewporter::WpViewporter);
delegate_noop!(Coordinator: ignore wayland_protocols::wp::fractional_scale::v1::client::wp_fractional_scale_manager_v1::WpFractionalScaleManagerV1);
delegate_noop!(Coordinator: ignore wayland_protocols_wlr::screencopy::v1::client::zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1);
delegate_noop!(Coordinator: ignore wayland_protocols::xdg::xdg_output::zv1::client::zxdg_output_manager_v1::ZxdgOutputManagerV1);
delegate_noop!(Coordinator: ignore wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_device_v1::WpCursorShapeDeviceV1);
delegate_noop!(Coordinator: ignore wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::WpCursorShapeManagerV1);
delegate_noop!(Coordinator: ignore wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager);
delegate_noop!(Coordinator: ignore wayland_protocols::ext::image_capture_source::v1::client::ext_output_image_capture_source_manager_v1::ExtOutputImageCaptureSourceManagerV1);
delegate_noop!(Coordinator: ignore wayland_protocols::ext::image_copy_capture::v1::client::ext_image_copy_capture_manager_v1::ExtImageCopyCaptureManagerV1);
