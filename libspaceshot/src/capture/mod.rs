//! Screen capture backends (spec.md §4.3): `wlr-screencopy` and
//! `ext-image-copy-capture`, behind one common contract. The coordinator
//! probes for supported backends once per process and reuses the first
//! available one in preference order.

mod ext;
mod wlr;

use wayland_client::protocol::wl_output::Transform;
use wayland_client::Connection;

use crate::error::{Error, Result};
use crate::globals::GlobalsState;
use crate::image::{canonical_format_for_wl_shm, Image, PixelFormat};
use crate::output::OutputInfo;

pub use ext::ExtCapture;
pub use wlr::WlrCapture;

/// Negotiated buffer geometry for one capture: the format a backend settled
/// on after seeing every `Buffer`/`ShmFormat` event the compositor offered.
#[derive(Debug, Copy, Clone)]
pub struct NegotiatedFormat {
    pub wl_format: wayland_client::protocol::wl_shm::Format,
    pub canonical: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

/// Pick the best of the formats a compositor offered: prefer a 10-bit
/// format (more headroom for HDR/wide-gamut content) over 8-bit, and among
/// equal bit depths prefer whichever was offered first (spec.md §4.3).
pub fn negotiate_format(
    offered: &[(wayland_client::protocol::wl_shm::Format, u32, u32, u32)],
) -> Result<NegotiatedFormat> {
    let is_ten_bit = |f: wayland_client::protocol::wl_shm::Format| {
        matches!(
            f,
            wayland_client::protocol::wl_shm::Format::Xrgb2101010
                | wayland_client::protocol::wl_shm::Format::Argb2101010
                | wayland_client::protocol::wl_shm::Format::Xbgr2101010
                | wayland_client::protocol::wl_shm::Format::Abgr2101010
        )
    };

    let mut best: Option<&(wayland_client::protocol::wl_shm::Format, u32, u32, u32)> = None;
    for candidate in offered {
        if canonical_format_for_wl_shm(candidate.0).is_none() {
            continue;
        }
        match best {
            None => best = Some(candidate),
            Some(current) if !is_ten_bit(current.0) && is_ten_bit(candidate.0) => {
                best = Some(candidate)
            }
            _ => {}
        }
    }

    let (wl_format, width, height, stride) = *best.ok_or(Error::NoSupportedBufferFormat)?;
    let canonical = canonical_format_for_wl_shm(wl_format).ok_or(Error::NoSupportedBufferFormat)?;
    Ok(NegotiatedFormat {
        wl_format,
        canonical,
        width,
        height,
        stride,
    })
}

/// Which protocol is in use for this process's captures, decided once by
/// probing for `zwlr_screencopy_manager_v1` vs `ext_image_copy_capture_manager_v1`
/// and cached (spec.md §4.3, §5).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaptureBackendKind {
    Wlr,
    Ext,
}

/// Default preference order probed for a usable backend (spec.md §4.4): `ext`
/// first, falling back to `wlr`, matching
/// `examples/original_source/src/wayland/screen-capture-common.c`'s
/// `[ext, wlr]` backend list. Callers can override this (e.g. from a config
/// file) by passing a different order to [`select_backend`].
pub const DEFAULT_BACKEND_PREFERENCE: [CaptureBackendKind; 2] = [CaptureBackendKind::Ext, CaptureBackendKind::Wlr];

/// Probe `preference`, in order, for the first backend whose required
/// globals are bound (spec.md §4.3 "selected at first call based on a
/// configured preference list").
pub fn select_backend(globals: &GlobalsState, preference: &[CaptureBackendKind]) -> Result<CaptureBackendKind> {
    preference
        .iter()
        .copied()
        .find(|kind| backend_available(*kind, globals))
        .ok_or(Error::NoCaptureBackend)
}

fn backend_available(kind: CaptureBackendKind, globals: &GlobalsState) -> bool {
    match kind {
        CaptureBackendKind::Wlr => globals.screencopy_manager.is_some(),
        CaptureBackendKind::Ext => globals.ext_source_manager.is_some() && globals.ext_capture_manager.is_some(),
    }
}

/// Build the concrete backend `select_backend` picked. Returned as a boxed
/// trait object since the two backends don't share a size.
pub fn build_backend(kind: CaptureBackendKind, globals: &GlobalsState) -> Result<Box<dyn ScreenCapture>> {
    match kind {
        CaptureBackendKind::Wlr => Ok(Box::new(WlrCapture)),
        CaptureBackendKind::Ext => {
            let source_manager = globals
                .ext_source_manager
                .clone()
                .ok_or_else(|| Error::ProtocolNotFound("ext_output_image_capture_source_manager_v1".into()))?;
            let capture_manager = globals
                .ext_capture_manager
                .clone()
                .ok_or_else(|| Error::ProtocolNotFound("ext_image_copy_capture_manager_v1".into()))?;
            Ok(Box::new(ExtCapture {
                source_manager,
                capture_manager,
            }))
        }
    }
}

/// Result of one successful frame capture: the raw image plus the
/// compositor-reported transform that must still be applied before the
/// pixels are in the output's logical (upright) orientation.
pub struct CapturedFrame {
    pub image: Image,
    pub transform: Transform,
}

/// Common contract both backends implement: capture one frame of `output`
/// into shared memory and hand it back already unpacked into an [`Image`].
pub trait ScreenCapture {
    fn capture(&self, conn: &Connection, globals: &GlobalsState, output: &OutputInfo) -> Result<CapturedFrame>;
}
