//! Clipboard offer lifecycle (spec.md §4.10): a PNG encoded into a
//! [`LinkBuffer`] is attached to a `wl_data_source` offering `image/png`.
//! Ownership of the buffer transfers from the picker's finish path to this
//! module at the moment the source is created (spec.md §8 "Clipboard
//! ownership outliving UI").

use std::os::fd::OwnedFd;
use std::sync::Mutex;

use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_data_source::{self, WlDataSource};
use wayland_client::QueueHandle;

use crate::link_buffer::LinkBuffer;

pub const MIME_TYPE: &str = "image/png";

/// State attached as the `wl_data_source`'s user-data: the encoded bytes and
/// whether the compositor has told us to give them up. Wrapped in a `Mutex`
/// since `Dispatch::event` only ever gets a shared reference to user-data.
pub struct ClipboardState {
    buffer: LinkBuffer,
    cancelled: bool,
}

pub type ClipboardUserData = Mutex<ClipboardState>;

impl ClipboardState {
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Create a data source offering `image/png` and attach `buffer` as its
/// user-data. The caller is expected to call
/// [`crate::seat::SeatDispatcher::set_selection`] with the returned source
/// to make it the current clipboard selection.
pub fn offer<D>(manager: &WlDataDeviceManager, qh: &QueueHandle<D>, buffer: LinkBuffer) -> WlDataSource
where
    D: wayland_client::Dispatch<WlDataSource, ClipboardUserData> + 'static,
{
    let source = manager.create_data_source(
        qh,
        Mutex::new(ClipboardState {
            buffer,
            cancelled: false,
        }),
    );
    source.offer(MIME_TYPE.to_string());
    source
}

/// Interpret a `wl_data_source` event against its attached
/// [`ClipboardState`]. Returns `true` once the source has been cancelled and
/// the clipboard dispatch loop (spec.md §4.9 "Active loop / Clipboard loop")
/// should exit.
pub fn handle_event(event: wl_data_source::Event, state: &ClipboardUserData, source: &WlDataSource) -> bool {
    match event {
        wl_data_source::Event::Send { mime_type, fd } => {
            if mime_type == MIME_TYPE {
                let guard = state.lock().expect("clipboard state lock is never poisoned");
                send(&guard.buffer, fd);
            }
            false
        }
        wl_data_source::Event::Cancelled => {
            state.lock().expect("clipboard state lock is never poisoned").cancelled = true;
            source.destroy();
            true
        }
        // target, dnd_drop_performed, dnd_finished, action: unused (spec.md
        // §4.10 "target is a no-op; drag-and-drop events are unused").
        _ => false,
    }
}

/// Stream the buffer to the requester's fd and close it. I/O errors are
/// suppressed when the peer has already hung up (spec.md §6 "Clipboard send
/// I/O failure: suppressed if it is EPIPE").
fn send(buffer: &LinkBuffer, fd: OwnedFd) {
    use std::io::Write;
    let mut file = std::fs::File::from(fd);
    if let Err(err) = buffer.write_to(&mut file) {
        if err.kind() != std::io::ErrorKind::BrokenPipe {
            tracing::warn!("clipboard send failed: {err}");
        }
    }
    let _ = file.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_streams_full_buffer_to_fd() {
        let mut buf = LinkBuffer::new();
        buf.append(b"clipboard payload");

        let (mut reader, writer) = std::os::unix::net::UnixStream::pair().expect("socketpair");
        let writer_fd: OwnedFd = writer.into();
        send(&buf, writer_fd);

        use std::io::Read;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).expect("read back");
        assert_eq!(out, b"clipboard payload");
    }
}
