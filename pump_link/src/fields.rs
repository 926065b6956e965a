//! Little-endian integer fields at fixed byte offsets.
//!
//! Encoding goes through `bytes::BufMut` in field order; these readers pull a
//! field back out of an already length-checked body.

use bytes::Buf;

#[inline]
fn window(buf: &[u8], pos: usize, len: usize) -> Option<&[u8]> {
    buf.get(pos..pos.checked_add(len)?)
}

#[inline]
pub fn read_u8(buf: &[u8], pos: usize) -> Option<u8> {
    buf.get(pos).copied()
}

#[inline]
pub fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    window(buf, pos, 2).map(|mut w| w.get_u16_le())
}

#[inline]
pub fn read_i16(buf: &[u8], pos: usize) -> Option<i16> {
    window(buf, pos, 2).map(|mut w| w.get_i16_le())
}

#[inline]
pub fn read_u32(buf: &[u8], pos: usize) -> Option<u32> {
    window(buf, pos, 4).map(|mut w| w.get_u32_le())
}
