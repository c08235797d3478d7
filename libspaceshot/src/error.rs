use std::{io, result};

use thiserror::Error;
use wayland_client::{ConnectError, DispatchError, globals::GlobalError};

pub type Result<T, E = Error> = result::Result<T, E>;

/// Errors raised by the capture engine.
///
/// Protocol logic errors (an unhandled enum variant, a transform other than
/// `Normal`) are not represented here: they are reported via
/// [`crate::internal_error`] and abort the process directly, matching the
/// "internal error" fatal path described for the core engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no outputs matched the request")]
    NoOutputs,
    #[error("image buffer is not big enough")]
    BufferTooSmall,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("wayland dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("wayland global error: {0}")]
    Global(#[from] GlobalError),
    #[error("wayland connect error: {0}")]
    Connect(#[from] ConnectError),
    #[error("frame copy failed")]
    FramecopyFailed,
    #[error("no supported buffer format was offered by the compositor")]
    NoSupportedBufferFormat,
    #[error("required wayland protocol not found: {0}")]
    ProtocolNotFound(String),
    #[error("no screen capture backend is available")]
    NoCaptureBackend,
    #[error("png encoding error: {0}")]
    Png(#[from] png::EncodingError),
}
