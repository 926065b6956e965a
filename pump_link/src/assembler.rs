//! Reassembles `[len][body]` frames from a byte stream (RS-485/UART).

use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::MAX_FRAME_LEN;

/// Byte-at-a-time frame collector with a per-frame deadline.
///
/// The first byte of a frame is its body length. A length of 0 or above
/// [`MAX_FRAME_LEN`] is discarded and the next byte is read as a new length.
/// A partial frame is abandoned once `timeout` has elapsed since its length byte.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    expected: usize,
    deadline: Option<Instant>,
    timeout: Duration,
    abandoned: u64,
}

impl FrameAssembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_LEN),
            expected: 0,
            deadline: None,
            timeout,
            abandoned: 0,
        }
    }

    /// True when no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.expected == 0
    }

    /// Partial frames dropped so far (timeouts and bad lengths).
    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected = 0;
        self.deadline = None;
    }

    /// Drop a partial frame whose deadline has passed. Returns true if one was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if !self.is_idle() && now > deadline => {
                tracing::debug!(
                    have = self.buf.len(),
                    want = self.expected,
                    "partial frame timed out"
                );
                self.abandoned += 1;
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Feed one byte received at `now`; returns a complete body when one finishes.
    pub fn push(&mut self, byte: u8, now: Instant) -> Option<Bytes> {
        self.expire(now);

        if self.is_idle() {
            let len = usize::from(byte);
            if len == 0 || len > MAX_FRAME_LEN {
                tracing::debug!(len, "rejected frame length");
                self.abandoned += 1;
                return None;
            }
            self.expected = len;
            self.deadline = Some(now + self.timeout);
            self.buf.clear();
            return None;
        }

        self.buf.put_u8(byte);
        if self.buf.len() < self.expected {
            return None;
        }
        let body = self.buf.split().freeze();
        self.expected = 0;
        self.deadline = None;
        Some(body)
    }

    /// Feed a chunk; every completed body is appended to `out`.
    pub fn extend(&mut self, bytes: &[u8], now: Instant, out: &mut Vec<Bytes>) {
        for &b in bytes {
            if let Some(body) = self.push(b, now) {
                out.push(body);
            }
        }
    }
}
