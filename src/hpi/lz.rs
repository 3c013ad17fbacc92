//! LZ77 variant used by HPI chunks (compression method 1).
//!
//! The stream is a sequence of groups: one tag byte followed by up to eight
//! items, one per tag bit, least significant bit first. A clear bit is a
//! literal byte; a set bit is a little-endian u16 whose top 12 bits address a
//! 4096-byte window and whose low 4 bits encode a copy length of 2..=17.
//! Window position 0 is never written and marks the end of the stream.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::HpiError;

const WINDOW_SIZE: usize = 4096;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Ring buffer of recently produced bytes
struct Window {
    buf: [u8; WINDOW_SIZE],
    cursor: usize,
}

impl Window {
    fn new() -> Self {
        Self {
            buf: [0; WINDOW_SIZE],
            cursor: 1,
        }
    }

    fn read_at(&self, pos: usize) -> u8 {
        self.buf[pos & WINDOW_MASK]
    }

    fn write_next(&mut self, byte: u8) {
        self.buf[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & WINDOW_MASK;
    }
}

/// Decode an LZ77 chunk payload, producing at most `limit` bytes.
pub fn decompress(input: &[u8], limit: usize) -> Result<Vec<u8>, HpiError> {
    let mut window = Window::new();
    let mut out = Vec::with_capacity(limit.min(input.len() * 8));
    let mut cursor = Cursor::new(input);

    let truncated = |cursor: &Cursor<&[u8]>| HpiError::LzTruncated {
        consumed: cursor.position(),
    };

    loop {
        let mut tag = cursor.read_u8().map_err(|_| truncated(&cursor))?;

        for _ in 0..8 {
            if tag & 1 == 0 {
                let byte = cursor.read_u8().map_err(|_| truncated(&cursor))?;
                if out.len() == limit {
                    return Err(HpiError::OutputOverrun { limit });
                }
                out.push(byte);
                window.write_next(byte);
            } else {
                let word = cursor
                    .read_u16::<LittleEndian>()
                    .map_err(|_| truncated(&cursor))?;
                let mut pos = usize::from(word >> 4);
                if pos == 0 {
                    return Ok(out);
                }
                let count = usize::from(word & 0x0F) + 2;
                if out.len() + count > limit {
                    return Err(HpiError::OutputOverrun { limit });
                }
                for _ in 0..count {
                    let byte = window.read_at(pos);
                    out.push(byte);
                    window.write_next(byte);
                    pos = (pos + 1) & WINDOW_MASK;
                }
            }
            tag >>= 1;
        }
    }
}
