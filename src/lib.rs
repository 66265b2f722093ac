use std::time::Duration;

pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod mapping;
pub mod mock;
pub mod platform;

pub use config::{ChannelConfig, DeviceConfig, Param, ParamValue, StripType};
pub use device::{Device, DeviceState};
pub use error::{DriverError, Error, Result, WaitError};

/// Trait for the PWM/DMA signal generator that streams pixel data to the strip.
///
/// Abstracts over the Raspberry Pi hardware driver and the in-memory
/// [`mock::MockDriver`], giving [`Device`] a uniform way to allocate buffers,
/// trigger transmissions and release the peripheral.
///
/// Transmission is asynchronous: [`render`](Ws281xDriver::render) returns
/// once DMA has been started, and [`wait`](Ws281xDriver::wait) blocks until
/// it has drained.
pub trait Ws281xDriver {
    /// Claim the peripheral and allocate one LED buffer per active channel.
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError>;

    /// The driver-owned LED buffer for `channel`, sized to its LED count.
    ///
    /// Returns `None` when the channel has no buffer allocated.
    fn channel_buffer(&mut self, channel: usize) -> Option<&mut [u32]>;

    /// Change a channel's brightness without re-initializing.
    fn set_brightness(&mut self, channel: usize, brightness: u8) -> Result<(), DriverError>;

    /// Start transmitting the current buffer contents.
    fn render(&mut self) -> Result<(), DriverError>;

    /// Block until the in-flight transmission completes, giving up after `timeout`.
    fn wait(&mut self, timeout: Duration) -> Result<(), WaitError>;

    /// Release DMA buffers and the GPIO/PWM claim.
    fn finalize(&mut self);
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "arm", target_arch = "aarch64")
))]
pub mod rpi;
