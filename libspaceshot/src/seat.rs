//! Seat input dispatch (spec.md §4.6): pointer motion/button events
//! frame-batched into one [`MouseEvent`] per `wl_pointer.frame`, keyboard
//! events translated through `xkbcommon`, per-surface cursor shape, and the
//! clipboard's `wl_data_device`. Grounded on
//! `examples/original_source/src/wayland/seat.h`.

use std::collections::HashMap;

use cursor_icon::CursorIcon;
use wayland_client::protocol::{
    wl_data_device::{self, WlDataDevice},
    wl_data_device_manager::WlDataDeviceManager,
    wl_data_source::WlDataSource,
    wl_keyboard::{self, WlKeyboard},
    wl_pointer::{self, WlPointer},
    wl_seat::{self, WlSeat},
    wl_surface::WlSurface,
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum::Value};
use wayland_protocols::wp::cursor_shape::v1::client::{
    wp_cursor_shape_device_v1::{self, WpCursorShapeDeviceV1},
    wp_cursor_shape_manager_v1::WpCursorShapeManagerV1,
};
use xkbcommon::xkb;

/// Which pointer buttons are involved in an event, as a small bitset
/// (spec.md §4.6 mirrors `PointerButtons` from
/// `examples/original_source/src/wayland/seat.h`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PointerButtons(u8);

impl PointerButtons {
    pub const LEFT: Self = Self(1);
    pub const RIGHT: Self = Self(2);
    pub const MIDDLE: Self = Self(4);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone)]
pub struct MouseEvent {
    pub focus: Option<WlSurface>,
    pub surface_x: f64,
    pub surface_y: f64,
    pub buttons_pressed: PointerButtons,
    pub buttons_held: PointerButtons,
    pub buttons_released: PointerButtons,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyboardEventType {
    Press,
    Release,
}

#[derive(Debug, Clone)]
pub struct KeyboardEvent {
    pub focus: Option<WlSurface>,
    pub kind: KeyboardEventType,
    pub keysym: xkb::Keysym,
}

fn button_flag(code: u32) -> Option<PointerButtons> {
    // Linux evdev BTN_LEFT/RIGHT/MIDDLE.
    match code {
        0x110 => Some(PointerButtons::LEFT),
        0x111 => Some(PointerButtons::RIGHT),
        0x112 => Some(PointerButtons::MIDDLE),
        _ => None,
    }
}

/// Per-surface record kept stable under removal: listeners are looked up by
/// surface id and a removed entry just stops matching, rather than shifting
/// indices other code might be holding onto.
pub trait SeatListener {
    fn mouse(&mut self, event: MouseEvent);
    fn keyboard(&mut self, event: KeyboardEvent);
}

struct PendingPointer {
    focus: Option<WlSurface>,
    surface_x: f64,
    surface_y: f64,
    pressed: PointerButtons,
    pending_pressed: PointerButtons,
    pending_released: PointerButtons,
    last_enter_serial: u32,
}

impl Default for PendingPointer {
    fn default() -> Self {
        Self {
            focus: None,
            surface_x: 0.0,
            surface_y: 0.0,
            pressed: PointerButtons::empty(),
            pending_pressed: PointerButtons::empty(),
            pending_released: PointerButtons::empty(),
            last_enter_serial: 0,
        }
    }
}

/// Dispatches one seat's pointer, keyboard, cursor-shape device and data
/// device to a set of per-overlay-surface listeners.
pub struct SeatDispatcher {
    pub seat: WlSeat,
    pub pointer: Option<WlPointer>,
    pub keyboard: Option<WlKeyboard>,
    pub cursor_shape_device: Option<WpCursorShapeDeviceV1>,
    pub data_device: Option<WlDataDevice>,
    pending_pointer: PendingPointer,
    xkb_context: xkb::Context,
    xkb_keymap: Option<xkb::Keymap>,
    xkb_state: Option<xkb::State>,
    keyboard_focus: Option<WlSurface>,
    pub last_input_serial: u32,
    listeners: HashMap<u32, Box<dyn SeatListener>>,
}

impl SeatDispatcher {
    /// Generic over the dispatch target `D` so a unified top-level state
    /// (spec.md §4.9's combined coordinator) can own the resulting proxies
    /// just as well as a bare `SeatDispatcher` can.
    pub fn new<D>(
        seat: WlSeat,
        qh: &QueueHandle<D>,
        data_device_manager: Option<&WlDataDeviceManager>,
        cursor_shape_manager: Option<&WpCursorShapeManagerV1>,
    ) -> Self
    where
        D: Dispatch<WlPointer, ()>
            + Dispatch<WlKeyboard, ()>
            + Dispatch<WlDataDevice, ()>
            + Dispatch<WpCursorShapeDeviceV1, ()>
            + 'static,
    {
        let pointer = Some(seat.get_pointer(qh, ()));
        let keyboard = Some(seat.get_keyboard(qh, ()));
        let data_device = data_device_manager.map(|mgr| mgr.get_data_device(&seat, qh, ()));
        let cursor_shape_device = match (&pointer, cursor_shape_manager) {
            (Some(p), Some(mgr)) => Some(mgr.get_pointer(p, qh, ())),
            _ => None,
        };

        Self {
            seat,
            pointer,
            keyboard,
            cursor_shape_device,
            data_device,
            pending_pointer: PendingPointer::default(),
            xkb_context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            xkb_keymap: None,
            xkb_state: None,
            keyboard_focus: None,
            last_input_serial: 0,
            listeners: HashMap::new(),
        }
    }

    pub fn add_listener(&mut self, surface: &WlSurface, listener: Box<dyn SeatListener>) {
        self.listeners.insert(surface.id().protocol_id(), listener);
    }

    pub fn remove_listener(&mut self, surface: &WlSurface) {
        self.listeners.remove(&surface.id().protocol_id());
    }

    pub fn set_cursor(&self, shape: CursorIcon) {
        let Some(device) = &self.cursor_shape_device else { return };
        let Some(mapped) = map_cursor_shape(shape) else { return };
        device.set_shape(self.pending_pointer.last_enter_serial, mapped);
    }

    pub fn set_selection(&self, source: &WlDataSource) {
        if let Some(data_device) = &self.data_device {
            data_device.set_selection(Some(source), self.last_input_serial);
        }
    }

    /// Whether Control is currently held, per the last keyboard modifier
    /// update. Held at left-release time, the region picker enters `Editing`
    /// instead of finishing the selection (spec.md §4.5).
    pub fn ctrl_held(&self) -> bool {
        self.xkb_state
            .as_ref()
            .is_some_and(|state| state.mod_name_is_active(xkb::MOD_NAME_CTRL, xkb::STATE_MODS_EFFECTIVE))
    }

    fn listener_for(&mut self, surface: &Option<WlSurface>) -> Option<&mut Box<dyn SeatListener>> {
        let surface = surface.as_ref()?;
        self.listeners.get_mut(&surface.id().protocol_id())
    }

    /// Event bodies factored out of the `Dispatch` impls below so the
    /// coordinator's combined top-level state (spec.md §4.9) can delegate to
    /// them without needing a `QueueHandle<SeatDispatcher>` of its own —
    /// none of these handlers use the queue handle.
    /// Accumulate one pointer event; returns `true` on `Frame`, meaning the
    /// caller should flush the batched event (spec.md §4.8).
    fn accumulate_pointer(&mut self, event: wl_pointer::Event) -> bool {
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                self.pending_pointer.focus = Some(surface);
                self.pending_pointer.surface_x = surface_x;
                self.pending_pointer.surface_y = surface_y;
                self.pending_pointer.last_enter_serial = serial;
            }
            wl_pointer::Event::Leave { .. } => {
                self.pending_pointer.focus = None;
            }
            wl_pointer::Event::Motion {
                surface_x, surface_y, ..
            } => {
                self.pending_pointer.surface_x = surface_x;
                self.pending_pointer.surface_y = surface_y;
            }
            wl_pointer::Event::Button {
                serial,
                button,
                state: Value(button_state),
                ..
            } => {
                self.last_input_serial = serial;
                if let Some(flag) = button_flag(button) {
                    match button_state {
                        wl_pointer::ButtonState::Pressed => {
                            self.pending_pointer.pressed.insert(flag);
                            self.pending_pointer.pending_pressed.insert(flag);
                        }
                        wl_pointer::ButtonState::Released => {
                            self.pending_pointer.pressed.remove(flag);
                            self.pending_pointer.pending_released.insert(flag);
                        }
                        _ => {}
                    }
                }
            }
            wl_pointer::Event::Frame => return true,
            _ => {}
        }
        false
    }

    /// Accumulate and, on `Frame`, dispatch the flushed [`MouseEvent`] to
    /// whichever listener owns the focused surface (spec.md §4.8).
    pub(crate) fn handle_pointer_event(&mut self, event: wl_pointer::Event) {
        if self.accumulate_pointer(event) {
            let mouse_event = self.flush_pointer_frame();
            let focus = mouse_event.focus.clone();
            if let Some(listener) = self.listener_for(&focus) {
                listener.mouse(mouse_event);
            }
        }
    }

    /// Accumulate and, on `Frame`, return the flushed [`MouseEvent`] instead
    /// of dispatching through the listener registry — for callers (like the
    /// main coordinator) that route input to their own per-output state
    /// directly.
    pub fn handle_pointer_event_flushed(&mut self, event: wl_pointer::Event) -> Option<MouseEvent> {
        if self.accumulate_pointer(event) {
            Some(self.flush_pointer_frame())
        } else {
            None
        }
    }

    pub(crate) fn handle_keyboard_event(&mut self, event: wl_keyboard::Event) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size, .. } => {
                if format == Value(wl_keyboard::KeymapFormat::XkbV1) {
                    use std::os::fd::IntoRawFd;
                    let keymap = unsafe {
                        xkb::Keymap::new_from_fd(
                            &self.xkb_context,
                            fd.into_raw_fd(),
                            size as usize,
                            xkb::FORMAT_TEXT_V1,
                            xkb::COMPILE_NO_FLAGS,
                        )
                    };
                    if let Ok(Some(keymap)) = keymap {
                        self.xkb_state = Some(xkb::State::new(&keymap));
                        self.xkb_keymap = Some(keymap);
                    }
                }
            }
            wl_keyboard::Event::Enter { surface, .. } => {
                self.keyboard_focus = Some(surface);
            }
            wl_keyboard::Event::Leave { .. } => {
                self.keyboard_focus = None;
            }
            wl_keyboard::Event::Key {
                serial, key, state: Value(key_state), ..
            } => {
                self.last_input_serial = serial;
                let Some(xkb_state) = &self.xkb_state else { return };
                let keysym = xkb_state.key_get_one_sym(key + 8);
                let kind = match key_state {
                    wl_keyboard::KeyState::Pressed => KeyboardEventType::Press,
                    _ => KeyboardEventType::Release,
                };
                let focus = self.keyboard_focus.clone();
                let event = KeyboardEvent { focus: focus.clone(), kind, keysym };
                if let Some(listener) = self.listener_for(&focus) {
                    listener.keyboard(event);
                }
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => {
                if let Some(xkb_state) = &mut self.xkb_state {
                    xkb_state.update_mask(mods_depressed, mods_latched, mods_locked, 0, 0, group);
                }
            }
            _ => {}
        }
    }

    /// Same keymap/focus/modifier bookkeeping as [`Self::handle_keyboard_event`],
    /// but returns the `Key` event instead of dispatching through the
    /// listener registry, for callers that route input directly.
    pub fn handle_keyboard_event_flushed(&mut self, event: wl_keyboard::Event) -> Option<KeyboardEvent> {
        match event {
            wl_keyboard::Event::Key {
                serial, key, state: Value(key_state), ..
            } => {
                self.last_input_serial = serial;
                let xkb_state = self.xkb_state.as_ref()?;
                let keysym = xkb_state.key_get_one_sym(key + 8);
                let kind = match key_state {
                    wl_keyboard::KeyState::Pressed => KeyboardEventType::Press,
                    _ => KeyboardEventType::Release,
                };
                Some(KeyboardEvent {
                    focus: self.keyboard_focus.clone(),
                    kind,
                    keysym,
                })
            }
            other => {
                self.handle_keyboard_event(other);
                None
            }
        }
    }

    fn flush_pointer_frame(&mut self) -> MouseEvent {
        let held = self.pending_pointer.pressed;
        let pressed = self.pending_pointer.pending_pressed;
        let released = self.pending_pointer.pending_released;
        self.pending_pointer.pending_pressed = PointerButtons::empty();
        self.pending_pointer.pending_released = PointerButtons::empty();

        MouseEvent {
            focus: self.pending_pointer.focus.clone(),
            surface_x: self.pending_pointer.surface_x,
            surface_y: self.pending_pointer.surface_y,
            buttons_pressed: pressed,
            buttons_held: held,
            buttons_released: released,
        }
    }
}

fn map_cursor_shape(shape: CursorIcon) -> Option<wp_cursor_shape_device_v1::Shape> {
    use wp_cursor_shape_device_v1::Shape;
    Some(match shape {
        CursorIcon::Default => Shape::Default,
        CursorIcon::Crosshair => Shape::Crosshair,
        CursorIcon::Move => Shape::Move,
        CursorIcon::NwseResize => Shape::NwseResize,
        CursorIcon::NeswResize => Shape::NeswResize,
        CursorIcon::EwResize => Shape::EwResize,
        CursorIcon::NsResize => Shape::NsResize,
        CursorIcon::Grab => Shape::Grab,
        CursorIcon::Grabbing => Shape::Grabbing,
        CursorIcon::Pointer => Shape::Pointer,
        _ => return None,
    })
}

impl Dispatch<WlSeat, ()> for SeatDispatcher {
    fn event(
        _state: &mut Self,
        _proxy: &WlSeat,
        _event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlPointer, ()> for SeatDispatcher {
    fn event(
        state: &mut Self,
        _proxy: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.handle_pointer_event(event);
    }
}

impl Dispatch<WlKeyboard, ()> for SeatDispatcher {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        state.handle_keyboard_event(event);
    }
}

impl Dispatch<WlDataDevice, ()> for SeatDispatcher {
    fn event(
        _state: &mut Self,
        _proxy: &WlDataDevice,
        _event: wl_data_device::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

delegate_noop!(SeatDispatcher: ignore WpCursorShapeDeviceV1);
delegate_noop!(SeatDispatcher: ignore WpCursorShapeManagerV1);
delegate_noop!(SeatDispatcher: ignore WlDataDeviceManager);
