//! Raspberry Pi backends built on `rppal`.

use std::time::Duration;

use pump_traits::{BoxError, BusTransport, StepDriver};
use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;
use rppal::uart::{Parity, Uart};

use crate::error::{HwError, Result};
use crate::util::{fill_with_timeout, length_prefixed};

const UART_POLL: Duration = Duration::from_micros(200);

fn i2c_err(e: rppal::i2c::Error) -> HwError {
    match e {
        rppal::i2c::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => HwError::Timeout,
        other => HwError::I2c(other.to_string()),
    }
}

fn uart_err(e: rppal::uart::Error) -> HwError {
    HwError::Uart(e.to_string())
}

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// I2C master. Each body is one write transaction; replies are one read.
pub struct I2cBus {
    i2c: I2c,
    selected: Option<u8>,
}

impl I2cBus {
    pub fn open(bus: u8) -> Result<Self> {
        let i2c = I2c::with_bus(bus).map_err(i2c_err)?;
        Ok(Self { i2c, selected: None })
    }

    fn select(&mut self, address: u8, timeout: Duration) -> Result<()> {
        if self.selected != Some(address) {
            self.i2c
                .set_slave_address(u16::from(address))
                .map_err(i2c_err)?;
            self.selected = Some(address);
        }
        let ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        // Not every adapter supports a timeout; the kernel default applies then.
        if let Err(e) = self.i2c.set_timeout(ms) {
            tracing::trace!(error = %e, "i2c timeout not supported");
        }
        Ok(())
    }

    fn write_all(&mut self, frame: &[u8]) -> Result<()> {
        let n = self.i2c.write(frame).map_err(i2c_err)?;
        if n != frame.len() {
            return Err(HwError::ShortTransfer {
                expected: frame.len(),
                actual: n,
            });
        }
        Ok(())
    }
}

impl BusTransport for I2cBus {
    fn send(&mut self, address: u8, frame: &[u8], timeout: Duration) -> std::result::Result<(), BoxError> {
        self.select(address, timeout)?;
        self.write_all(frame)?;
        Ok(())
    }

    fn exchange(
        &mut self,
        address: u8,
        frame: &[u8],
        reply: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<(), BoxError> {
        self.select(address, timeout)?;
        self.write_all(frame)?;
        let n = self.i2c.read(reply).map_err(i2c_err)?;
        if n != reply.len() {
            return Err(Box::new(HwError::ShortTransfer {
                expected: reply.len(),
                actual: n,
            }));
        }
        Ok(())
    }
}

/// UART (RS-485) port. Acts as a master transport or as the subordinate's
/// byte source.
pub struct UartPort {
    uart: Uart,
}

impl UartPort {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let mut uart = Uart::with_path(path, baud, Parity::None, 8, 1).map_err(uart_err)?;
        uart.set_read_mode(0, Duration::ZERO).map_err(uart_err)?;
        Ok(Self { uart })
    }

    /// Whatever bytes are available right now.
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.uart.read(buf).map_err(uart_err)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let n = self.uart.write(bytes).map_err(uart_err)?;
        if n != bytes.len() {
            return Err(HwError::ShortTransfer {
                expected: bytes.len(),
                actual: n,
            });
        }
        self.uart.drain().map_err(uart_err)
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let uart = &mut self.uart;
        fill_with_timeout(
            |b| uart.read(b).map_err(|e| std::io::Error::other(e.to_string())),
            buf,
            timeout,
            UART_POLL,
        )
    }
}

// The stream carries no address; a shared RS-485 segment has one subordinate.
impl BusTransport for UartPort {
    fn send(&mut self, _address: u8, frame: &[u8], _timeout: Duration) -> std::result::Result<(), BoxError> {
        self.write_all(&length_prefixed(frame)?)?;
        Ok(())
    }

    fn exchange(
        &mut self,
        _address: u8,
        frame: &[u8],
        reply: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<(), BoxError> {
        self.write_all(&length_prefixed(frame)?)?;
        let mut len = [0u8; 1];
        self.read_exact(&mut len, timeout)?;
        if usize::from(len[0]) != reply.len() {
            return Err(Box::new(HwError::ShortTransfer {
                expected: reply.len(),
                actual: usize::from(len[0]),
            }));
        }
        self.read_exact(reply, timeout)?;
        Ok(())
    }
}

/// Step/direction/enable outputs driven by software PWM.
pub struct GpioStepper {
    step: OutputPin,
    dir: OutputPin,
    enable: Option<OutputPin>,
    running: bool,
}

impl GpioStepper {
    /// `enable_pin` is active-low when present.
    pub fn new(step_pin: u8, dir_pin: u8, enable_pin: Option<u8>) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut step = gpio.get(step_pin).map_err(gpio_err)?.into_output();
        step.set_low();
        let dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output();
        let enable = match enable_pin {
            Some(pin) => {
                let mut en = gpio.get(pin).map_err(gpio_err)?.into_output();
                en.set_high();
                Some(en)
            }
            None => None,
        };
        Ok(Self {
            step,
            dir,
            enable,
            running: false,
        })
    }
}

impl StepDriver for GpioStepper {
    fn run(&mut self, hz: f32, reverse: bool) -> std::result::Result<(), BoxError> {
        if reverse {
            self.dir.set_low();
        } else {
            self.dir.set_high();
        }
        if let Some(en) = self.enable.as_mut() {
            en.set_low();
        }
        self.step
            .set_pwm_frequency(f64::from(hz), 0.5)
            .map_err(gpio_err)?;
        if !self.running {
            tracing::debug!(hz, reverse, "stepper enabled");
        }
        self.running = true;
        Ok(())
    }

    fn disable(&mut self) -> std::result::Result<(), BoxError> {
        self.step.clear_pwm().map_err(gpio_err)?;
        self.step.set_low();
        if let Some(en) = self.enable.as_mut() {
            en.set_high();
        }
        if self.running {
            tracing::debug!("stepper disabled");
        }
        self.running = false;
        Ok(())
    }
}
