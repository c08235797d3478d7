//! An append-only chunk list used as a byte sink for PNG encoding
//! (spec.md §3 "Link Buffer"). Grounded on
//! `examples/original_source/src/link-buffer.c`, which keeps a singly-linked
//! list of fixed-size chunks so encoding never needs to `realloc` a single
//! giant buffer.

use std::io::{self, Write};

/// Chunks are sized so that a typical screenshot only needs a handful of
/// allocations; smaller than this and we'd thrash the allocator per `write`.
const CHUNK_SIZE: usize = 64 * 1024;

struct Chunk {
    data: Box<[u8; CHUNK_SIZE]>,
    used: usize,
}

impl Chunk {
    fn new() -> Self {
        Self {
            data: Box::new([0u8; CHUNK_SIZE]),
            used: 0,
        }
    }

    fn remaining(&self) -> usize {
        CHUNK_SIZE - self.used
    }
}

/// A singly-linked list of ~64 KiB chunks. Only the tail chunk is ever
/// partially filled; appending advances the tail once it is exhausted.
pub struct LinkBuffer {
    chunks: Vec<Chunk>,
}

impl LinkBuffer {
    pub fn new() -> Self {
        Self {
            chunks: vec![Chunk::new()],
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.used).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let tail = self.chunks.last_mut().expect("chunk list is never empty");
            let take = bytes.len().min(tail.remaining());
            tail.data[tail.used..tail.used + take].copy_from_slice(&bytes[..take]);
            tail.used += take;
            bytes = &bytes[take..];
            if tail.remaining() == 0 && !bytes.is_empty() {
                self.chunks.push(Chunk::new());
            }
        }
    }

    /// Copy every chunk into one contiguous buffer. Used for the clipboard
    /// `send` path and for file writes where a single `write_all` is simplest.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.data[..chunk.used]);
        }
        out
    }

    /// Stream every chunk to `writer` without materializing a combined copy.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for chunk in &self.chunks {
            writer.write_all(&chunk.data[..chunk.used])?;
        }
        Ok(())
    }
}

impl Default for LinkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for LinkBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_spanning_multiple_chunks_round_trips() {
        let mut buf = LinkBuffer::new();
        let data = vec![0x5Au8; CHUNK_SIZE * 3 + 17];
        buf.append(&data);
        assert_eq!(buf.len(), data.len());
        assert_eq!(buf.to_vec(), data);
    }

    #[test]
    fn write_to_matches_to_vec() {
        let mut buf = LinkBuffer::new();
        buf.append(b"hello");
        buf.append(b" world");
        let mut out = Vec::new();
        buf.write_to(&mut out).unwrap();
        assert_eq!(out, buf.to_vec());
    }

    #[test]
    fn only_tail_chunk_is_partially_filled() {
        let mut buf = LinkBuffer::new();
        buf.append(&vec![1u8; CHUNK_SIZE + 1]);
        for chunk in &buf.chunks[..buf.chunks.len() - 1] {
            assert_eq!(chunk.used, CHUNK_SIZE);
        }
    }
}
