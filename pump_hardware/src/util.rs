use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Fill `buf` from `read` until it is full or `timeout` expires.
///
/// `read` returns how many bytes it placed at the front of the slice it is
/// given; `Ok(0)` means nothing was available yet. Sleeps `poll_interval`
/// between empty reads to avoid spinning.
pub fn fill_with_timeout(
    mut read: impl FnMut(&mut [u8]) -> std::io::Result<usize>,
    buf: &mut [u8],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        let n = read(&mut buf[filled..])?;
        filled += n;
        if filled >= buf.len() {
            break;
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        if n == 0 {
            std::thread::sleep(poll_interval);
        }
    }
    Ok(())
}

/// Largest body the subordinate's receive buffer accepts.
pub const MAX_STREAM_FRAME: usize = 40;

/// `[len][body]` for a byte stream. Empty or oversized bodies are refused
/// since the receiving assembler would discard them.
pub fn length_prefixed(body: &[u8]) -> Result<Vec<u8>> {
    if body.is_empty() || body.len() > MAX_STREAM_FRAME {
        return Err(HwError::FrameTooLong(body.len()));
    }
    let len = u8::try_from(body.len()).map_err(|_| HwError::FrameTooLong(body.len()))?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(len);
    out.extend_from_slice(body);
    Ok(out)
}
