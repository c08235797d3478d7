//! Shared-memory buffer allocation (spec.md §4.1, §4.4). Grounded directly
//! on `libwayshot::screencopy::create_shm_fd`: `memfd_create` with sealing on
//! Linux/FreeBSD, falling back to POSIX `shm_open`/`shm_unlink` elsewhere.

use std::ffi::CStr;
use std::os::fd::{AsFd, AsRawFd, IntoRawFd, OwnedFd};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::MmapMut;
use nix::{fcntl, sys::memfd, sys::mman, sys::stat, unistd};
use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_client::{Dispatch, QueueHandle};

use crate::image::PixelFormat;

/// Create an anonymous, sealed-where-possible fd usable as `wl_shm_pool`
/// backing storage.
pub fn create_shm_fd() -> std::io::Result<OwnedFd> {
    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    loop {
        match memfd::memfd_create(
            CStr::from_bytes_with_nul(b"spaceshot\0").expect("static nul-terminated literal"),
            memfd::MemFdCreateFlag::MFD_CLOEXEC | memfd::MemFdCreateFlag::MFD_ALLOW_SEALING,
        ) {
            Ok(fd) => {
                let _ = fcntl::fcntl(
                    fd.as_raw_fd(),
                    fcntl::F_ADD_SEALS(
                        fcntl::SealFlag::F_SEAL_SHRINK | fcntl::SealFlag::F_SEAL_SEAL,
                    ),
                );
                return Ok(fd);
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(nix::errno::Errno::ENOSYS) => break,
            Err(errno) => return Err(std::io::Error::from(errno)),
        }
    }

    let sys_time = SystemTime::now();
    let nanos = sys_time
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the epoch")
        .subsec_nanos();
    let mut name = format!("/spaceshot-{nanos}");
    loop {
        match mman::shm_open(
            name.as_str(),
            fcntl::OFlag::O_CREAT | fcntl::OFlag::O_EXCL | fcntl::OFlag::O_RDWR | fcntl::OFlag::O_CLOEXEC,
            stat::Mode::S_IRUSR | stat::Mode::S_IWUSR,
        ) {
            Ok(fd) => match mman::shm_unlink(name.as_str()) {
                Ok(()) => return Ok(fd),
                Err(errno) => {
                    let _ = unistd::close(fd.into_raw_fd());
                    return Err(std::io::Error::from(errno));
                }
            },
            Err(nix::errno::Errno::EEXIST) => {
                name = format!("/spaceshot-{nanos}-retry");
                continue;
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => return Err(std::io::Error::from(errno)),
        }
    }
}

fn to_wl_shm_format(format: PixelFormat) -> wl_shm::Format {
    match format {
        PixelFormat::Xrgb8888 => wl_shm::Format::Xrgb8888,
        PixelFormat::Argb8888 => wl_shm::Format::Argb8888,
        PixelFormat::Xrgb2101010 => wl_shm::Format::Xrgb2101010,
        PixelFormat::Xbgr2101010 => wl_shm::Format::Xbgr2101010,
        PixelFormat::Gray8 => wl_shm::Format::R8,
    }
}

/// A single shared-memory-backed `wl_buffer`, mmapped for CPU access. Used
/// both as a one-shot capture target (spec.md §4.4) and, pooled, as an
/// overlay render buffer (spec.md §4.7).
pub struct ShmBuffer {
    pub wl_buffer: wl_buffer::WlBuffer,
    pub mmap: MmapMut,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl ShmBuffer {
    /// Allocate shared memory, wrap it in a `wl_shm_pool`, and create a
    /// single `wl_buffer` covering the whole pool.
    pub fn new<D>(
        shm: &wl_shm::WlShm,
        qh: &QueueHandle<D>,
        format: PixelFormat,
        width: u32,
        height: u32,
        udata: <D as Dispatch<wl_buffer::WlBuffer, ()>>::UserData,
    ) -> std::io::Result<Self>
    where
        D: Dispatch<wl_shm_pool::WlShmPool, ()> + Dispatch<wl_buffer::WlBuffer, ()> + 'static,
        <D as Dispatch<wl_buffer::WlBuffer, ()>>::UserData: Sized,
    {
        let stride = width * format.bytes_per_pixel();
        let size = (stride as u64) * (height as u64);
        let fd = create_shm_fd()?;
        rustix::fs::ftruncate(&fd, size)?;

        let mmap = unsafe { MmapMut::map_mut(fd.as_raw_fd())? };

        let pool = shm.create_pool(fd.as_fd().as_raw_fd(), size as i32, qh, ());
        let wl_buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            to_wl_shm_format(format),
            qh,
            udata,
        );
        pool.destroy();

        Ok(Self {
            wl_buffer,
            mmap,
            format,
            width,
            height,
            stride,
        })
    }

    pub fn as_image_bytes(&self) -> &[u8] {
        &self.mmap[..(self.stride * self.height) as usize]
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.wl_buffer.destroy();
    }
}
