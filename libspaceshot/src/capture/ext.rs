//! `ext-image-copy-capture` capture backend: the portable-desktop-aware
//! successor to wlr-screencopy. Two parties must both settle before a frame
//! is usable — the session (buffer constraints) and the frame (the actual
//! pixels) — so completion is tracked with an `Arc`-shared state (spec.md
//! §4.3), mirroring `libwayshot`'s `Arc<RwLock<CaptureInfo>>` pattern.

use std::os::fd::AsFd;
use std::sync::{Arc, Mutex};

use wayland_client::protocol::{wl_buffer, wl_output::Transform, wl_shm, wl_shm_pool};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle, WEnum::Value};
use wayland_protocols::ext::image_capture_source::v1::client::{
    ext_image_capture_source_v1::ExtImageCaptureSourceV1,
    ext_output_image_capture_source_manager_v1::ExtOutputImageCaptureSourceManagerV1,
};
use wayland_protocols::ext::image_copy_capture::v1::client::{
    ext_image_copy_capture_frame_v1::{self, ExtImageCopyCaptureFrameV1},
    ext_image_copy_capture_manager_v1::{ExtImageCopyCaptureManagerV1, Options},
    ext_image_copy_capture_session_v1::{self, ExtImageCopyCaptureSessionV1},
};

use super::{negotiate_format, CapturedFrame, ScreenCapture};
use crate::error::{Error, Result};
use crate::globals::GlobalsState;
use crate::image::{swap_rb_inplace_8888, Image};
use crate::output::OutputInfo;
use crate::shm::create_shm_fd;

pub struct ExtCapture {
    pub source_manager: ExtOutputImageCaptureSourceManagerV1,
    pub capture_manager: ExtImageCopyCaptureManagerV1,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Outcome {
    Pending,
    Ready,
    Failed,
}

#[derive(Default)]
struct Shared {
    offered: Vec<(wl_shm::Format, u32, u32, u32)>,
    session_done: bool,
    outcome: Option<Outcome>,
    transform: Option<Transform>,
}

struct State {
    shared: Arc<Mutex<Shared>>,
}

impl Dispatch<ExtImageCopyCaptureSessionV1, Arc<Mutex<Shared>>> for State {
    fn event(
        _state: &mut Self,
        _proxy: &ExtImageCopyCaptureSessionV1,
        event: ext_image_copy_capture_session_v1::Event,
        data: &Arc<Mutex<Shared>>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let mut shared = data.lock().expect("capture session lock is never poisoned");
        match event {
            ext_image_copy_capture_session_v1::Event::ShmFormat { format: Value(f) } => {
                shared.offered.push((f, 0, 0, 0));
            }
            ext_image_copy_capture_session_v1::Event::BufferSize { width, height } => {
                for entry in shared.offered.iter_mut() {
                    entry.1 = width;
                    entry.2 = height;
                    entry.3 = width * 4;
                }
            }
            ext_image_copy_capture_session_v1::Event::Done => {
                shared.session_done = true;
            }
            ext_image_copy_capture_session_v1::Event::Stopped => {
                shared.session_done = true;
                shared.outcome = Some(Outcome::Failed);
            }
            _ => {}
        }
    }
}

impl Dispatch<ExtImageCopyCaptureFrameV1, Arc<Mutex<Shared>>> for State {
    fn event(
        _state: &mut Self,
        _proxy: &ExtImageCopyCaptureFrameV1,
        event: ext_image_copy_capture_frame_v1::Event,
        data: &Arc<Mutex<Shared>>,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let mut shared = data.lock().expect("capture frame lock is never poisoned");
        match event {
            ext_image_copy_capture_frame_v1::Event::Ready => {
                shared.outcome = Some(Outcome::Ready);
            }
            ext_image_copy_capture_frame_v1::Event::Failed { .. } => {
                shared.outcome = Some(Outcome::Failed);
            }
            ext_image_copy_capture_frame_v1::Event::Transform { transform: Value(t) } => {
                shared.transform = Some(t);
            }
            _ => {}
        }
    }
}

delegate_noop!(State: ignore ExtImageCaptureSourceV1);
delegate_noop!(State: ignore ExtOutputImageCaptureSourceManagerV1);
delegate_noop!(State: ignore ExtImageCopyCaptureManagerV1);
delegate_noop!(State: ignore wl_shm::WlShm);
delegate_noop!(State: ignore wl_shm_pool::WlShmPool);
delegate_noop!(State: ignore wl_buffer::WlBuffer);

impl ScreenCapture for ExtCapture {
    fn capture(&self, conn: &Connection, globals: &GlobalsState, output: &OutputInfo) -> Result<CapturedFrame> {
        let mut event_queue = conn.new_event_queue::<State>();
        let qh = event_queue.handle();
        let mut state = State {
            shared: Arc::new(Mutex::new(Shared::default())),
        };

        let source = self
            .source_manager
            .create_source(&output.wl_output, &qh, ());
        let session = self.capture_manager.create_session(
            &source,
            Options::empty(),
            &qh,
            state.shared.clone(),
        );

        loop {
            if state.shared.lock().expect("lock").session_done {
                break;
            }
            event_queue.blocking_dispatch(&mut state)?;
        }

        let offered = state.shared.lock().expect("lock").offered.clone();
        let negotiated = negotiate_format(&offered)?;

        let shm_fd = create_shm_fd()?;
        let size = (negotiated.stride as u64) * (negotiated.height as u64);
        rustix::fs::ftruncate(&shm_fd, size)?;
        let mmap = unsafe { memmap2::MmapMut::map_mut(std::os::fd::AsRawFd::as_raw_fd(&shm_fd))? };

        let shm = globals
            .shm
            .as_ref()
            .ok_or_else(|| Error::ProtocolNotFound("wl_shm".into()))?;
        let pool = shm.create_pool(shm_fd.as_fd().as_raw_fd(), size as i32, &qh, ());
        let buffer = pool.create_buffer(
            0,
            negotiated.width as i32,
            negotiated.height as i32,
            negotiated.stride as i32,
            negotiated.wl_format,
            &qh,
            (),
        );
        pool.destroy();

        let frame = session.create_frame(&qh, state.shared.clone());
        frame.attach_buffer(&buffer);
        frame.damage_buffer(0, 0, negotiated.width as i32, negotiated.height as i32);
        frame.capture();

        loop {
            let outcome = state.shared.lock().expect("lock").outcome;
            match outcome {
                Some(Outcome::Ready) | Some(Outcome::Failed) => break,
                _ => event_queue.blocking_dispatch(&mut state)?,
            };
        }

        let outcome = state.shared.lock().expect("lock").outcome;
        let transform = state.shared.lock().expect("lock").transform.unwrap_or(Transform::Normal);

        buffer.destroy();
        frame.destroy();
        session.destroy();

        if outcome != Some(Outcome::Ready) {
            return Err(Error::FramecopyFailed);
        }

        let mut data = mmap[..size as usize].to_vec();
        if matches!(negotiated.wl_format, wl_shm::Format::Xbgr8888 | wl_shm::Format::Abgr8888) {
            swap_rb_inplace_8888(&mut data);
        }
        let image = Image::from_parts(
            negotiated.canonical,
            negotiated.width,
            negotiated.height,
            negotiated.stride,
            data,
        )?;

        Ok(CapturedFrame { image, transform })
    }
}
