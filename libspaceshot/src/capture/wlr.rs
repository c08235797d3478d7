//! `zwlr_screencopy_v1` capture backend. Grounded on
//! `libwayshot::dispatch::CaptureFrameState` and
//! `libwayshot::screencopy::create_shm_fd`.

use std::os::fd::AsFd;

use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_client::{delegate_noop, Connection, Dispatch, QueueHandle, WEnum::Value};
use wayland_protocols_wlr::screencopy::v1::client::{
    zwlr_screencopy_frame_v1::{self, ZwlrScreencopyFrameV1},
    zwlr_screencopy_manager_v1::ZwlrScreencopyManagerV1,
};

use super::{negotiate_format, CapturedFrame, ScreenCapture};
use crate::error::{Error, Result};
use crate::globals::GlobalsState;
use crate::image::{swap_rb_inplace_8888, Image};
use crate::output::OutputInfo;
use crate::shm::create_shm_fd;

pub struct WlrCapture;

#[derive(Debug, Copy, Clone, PartialEq)]
enum FrameOutcome {
    Pending,
    Ready,
    Failed,
}

struct State {
    offered: Vec<(wl_shm::Format, u32, u32, u32)>,
    buffer_done: bool,
    outcome: FrameOutcome,
    transform: wayland_client::protocol::wl_output::Transform,
}

impl Dispatch<ZwlrScreencopyFrameV1, ()> for State {
    fn event(
        state: &mut Self,
        _proxy: &ZwlrScreencopyFrameV1,
        event: zwlr_screencopy_frame_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_screencopy_frame_v1::Event::Buffer {
                format,
                width,
                height,
                stride,
            } => {
                if let Value(format) = format {
                    state.offered.push((format, width, height, stride));
                }
            }
            zwlr_screencopy_frame_v1::Event::BufferDone => {
                state.buffer_done = true;
            }
            zwlr_screencopy_frame_v1::Event::Transform { transform: Value(t) } => {
                state.transform = t;
            }
            zwlr_screencopy_frame_v1::Event::Ready { .. } => {
                state.outcome = FrameOutcome::Ready;
            }
            zwlr_screencopy_frame_v1::Event::Failed => {
                state.outcome = FrameOutcome::Failed;
            }
            _ => {}
        }
    }
}

delegate_noop!(State: ignore wl_shm::WlShm);
delegate_noop!(State: ignore wl_shm_pool::WlShmPool);
delegate_noop!(State: ignore wl_buffer::WlBuffer);
delegate_noop!(State: ignore ZwlrScreencopyManagerV1);

impl ScreenCapture for WlrCapture {
    fn capture(&self, conn: &Connection, globals: &GlobalsState, output: &OutputInfo) -> Result<CapturedFrame> {
        let manager = globals
            .screencopy_manager
            .as_ref()
            .ok_or_else(|| Error::ProtocolNotFound("zwlr_screencopy_manager_v1".into()))?;

        let mut event_queue = conn.new_event_queue::<State>();
        let qh = event_queue.handle();
        let mut state = State {
            offered: Vec::new(),
            buffer_done: false,
            outcome: FrameOutcome::Pending,
            transform: wayland_client::protocol::wl_output::Transform::Normal,
        };

        let frame = manager.capture_output(0, &output.wl_output, &qh, ());

        while !state.buffer_done {
            event_queue.blocking_dispatch(&mut state)?;
        }

        let negotiated = negotiate_format(&state.offered)?;
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

        frame.copy(&buffer);

        while state.outcome == FrameOutcome::Pending {
            event_queue.blocking_dispatch(&mut state)?;
        }
        buffer.destroy();
        frame.destroy();

        if state.outcome == FrameOutcome::Failed {
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

        Ok(CapturedFrame {
            image,
            transform: state.transform,
        })
    }
}
