pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Boxed error used at every hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Byte-level access to the secondary bus.
///
/// Frames handed to the transport are checksummed bodies. The transport carries
/// the length (an I2C transaction size, or a `[len]` prefix on a byte stream)
/// and owns addressing and the per-call timeout.
pub trait BusTransport {
    /// Send `frame` to `address` without expecting a reply.
    fn send(
        &mut self,
        address: u8,
        frame: &[u8],
        timeout: std::time::Duration,
    ) -> Result<(), BoxError>;

    /// Send `frame` to `address` and read exactly `reply.len()` bytes back.
    fn exchange(
        &mut self,
        address: u8,
        frame: &[u8],
        reply: &mut [u8],
        timeout: std::time::Duration,
    ) -> Result<(), BoxError>;
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn send(
        &mut self,
        address: u8,
        frame: &[u8],
        timeout: std::time::Duration,
    ) -> Result<(), BoxError> {
        (**self).send(address, frame, timeout)
    }

    fn exchange(
        &mut self,
        address: u8,
        frame: &[u8],
        reply: &mut [u8],
        timeout: std::time::Duration,
    ) -> Result<(), BoxError> {
        (**self).exchange(address, frame, reply, timeout)
    }
}

/// Step/direction output for one motor channel.
pub trait StepDriver {
    /// Drive the step line at `hz` in the given direction (`reverse = true` is CCW).
    fn run(&mut self, hz: f32, reverse: bool) -> Result<(), BoxError>;
    /// Stop pulsing and release the driver enable line.
    fn disable(&mut self) -> Result<(), BoxError>;
}
