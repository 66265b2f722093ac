//! Device lifecycle: configure, initialize, render, finalize.
//!
//! Every transmission this handle triggers is waited on before the next
//! trigger and before resources are released. The signal generator streams
//! asynchronously, so overlapping either one corrupts the strip.

use crate::Ws281xDriver;
use crate::config::{ChannelConfig, DeviceConfig, NUM_CHANNELS, Param, ParamValue};
use crate::error::{Error, Result, WaitError};
use crate::frame;

/// Where a [`Device`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Defaults only, nothing staged yet.
    Unconfigured,
    Configured,
    /// Driver resources are claimed.
    Initialized,
    /// Resources released; the handle is inert.
    Finalized,
}

/// Exclusive handle to one GPIO/DMA/PWM resource set.
///
/// Operations take `&mut self`; share a device between threads by wrapping it
/// in a `Mutex`. Dropping an initialized device blanks the strip and releases
/// the hardware.
#[derive(Debug)]
pub struct Device<D: Ws281xDriver> {
    driver: D,
    config: DeviceConfig,
    state: DeviceState,
    /// A render was triggered and has not been waited on yet.
    in_flight: bool,
}

impl<D: Ws281xDriver> Device<D> {
    /// Creates an unconfigured device holding the default configuration.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            config: DeviceConfig::default(),
            state: DeviceState::Unconfigured,
            in_flight: false,
        }
    }

    /// Creates a device that is ready for [`init`](Self::init).
    pub fn with_config(driver: D, config: DeviceConfig) -> Self {
        Self {
            driver,
            config,
            state: DeviceState::Configured,
            in_flight: false,
        }
    }

    #[inline]
    pub fn state(&self) -> DeviceState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Replaces the whole configuration.
    pub fn configure(&mut self, config: DeviceConfig) -> Result<()> {
        self.ensure_not_finalized()?;
        config.validate()?;
        self.ensure_reconfigurable("device configuration")?;
        self.config = config;
        self.mark_configured();
        Ok(())
    }

    /// Replaces one channel's configuration.
    pub fn configure_channel(&mut self, index: usize, channel: ChannelConfig) -> Result<()> {
        self.ensure_not_finalized()?;
        self.config.channel(index)?;
        channel.validate()?;
        self.ensure_reconfigurable("channel configuration")?;
        *self.config.channel_mut(index)? = channel;
        self.mark_configured();
        Ok(())
    }

    /// Sets a device-level parameter (`Frequency` or `DmaNum`).
    pub fn set_param(&mut self, param: Param, value: impl Into<ParamValue>) -> Result<()> {
        self.ensure_not_finalized()?;
        if param.is_channel_param() {
            return Err(Error::InvalidParameter(param.id()));
        }

        let value = value.into();
        let mut config = self.config.clone();
        config.apply(param, &value)?;
        self.ensure_reconfigurable(param.name())?;

        self.config = config;
        log::debug!("set {param} = {value:?}");
        self.mark_configured();
        Ok(())
    }

    /// Sets a channel-level parameter.
    ///
    /// Brightness may change at any time and is pushed to the driver
    /// immediately when initialized; everything else needs a fresh init.
    pub fn set_channel_param(
        &mut self,
        index: usize,
        param: Param,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        self.ensure_not_finalized()?;
        let value = value.into();

        let mut channel = *self.config.channel(index)?;
        channel.apply(param, &value)?;

        if self.state == DeviceState::Initialized {
            if param != Param::Brightness {
                return Err(Error::ReinitRequired(param.name()));
            }
            self.driver
                .set_brightness(index, channel.brightness)
                .map_err(Error::DriverRender)?;
        }

        *self.config.channel_mut(index)? = channel;
        log::debug!("set channel {index} {param} = {value:?}");
        self.mark_configured();
        Ok(())
    }

    /// Sets the brightness of channel 0.
    pub fn set_brightness(&mut self, brightness: u8) -> Result<()> {
        self.set_channel_param(0, Param::Brightness, brightness)
    }

    pub fn param(&self, param: Param) -> Result<ParamValue> {
        self.config.get(param)
    }

    pub fn channel_param(&self, index: usize, param: Param) -> Result<ParamValue> {
        self.config.channel(index)?.get(param)
    }

    /// Claims the hardware and allocates the channel buffers.
    ///
    /// On driver failure the device stays configured, so the caller may
    /// adjust parameters and try again.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Finalized => return Err(Error::DeviceFinalized),
            DeviceState::Initialized => return Err(Error::AlreadyInitialized),
            DeviceState::Unconfigured => return Err(Error::NotConfigured),
            DeviceState::Configured => {}
        }

        if let Err(err) = self.driver.initialize(&self.config) {
            log::warn!("ws281x driver initialization failed: {err}");
            return Err(Error::DriverInit(err));
        }

        self.state = DeviceState::Initialized;
        self.in_flight = false;
        log::info!(
            "ws281x initialized: {} Hz, DMA {}, channels {:?}",
            self.config.frequency,
            self.config.dma_num,
            self.config.active_channels().collect::<Vec<_>>()
        );
        Ok(())
    }

    /// Copies packed little-endian color bytes into a channel's buffer.
    ///
    /// Copies `min(data.len(), led_count * 4)` bytes and returns that count.
    /// Excess data is ignored; LEDs past a short frame keep their old value.
    pub fn set_channel_data(&mut self, index: usize, data: &[u8]) -> Result<usize> {
        self.ensure_not_finalized()?;
        let buffer = self.channel_buffer(index)?;
        Ok(frame::transfer(buffer, data))
    }

    /// Word-level counterpart of [`set_channel_data`](Self::set_channel_data).
    ///
    /// Returns the number of LEDs written.
    pub fn set_channel_colors(&mut self, index: usize, colors: &[u32]) -> Result<usize> {
        self.ensure_not_finalized()?;
        let buffer = self.channel_buffer(index)?;
        Ok(frame::transfer_words(buffer, colors))
    }

    /// Transmits the staged buffers once the previous frame has finished.
    pub fn render(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.wait_in_flight()?;
        self.trigger()
    }

    /// Waits for the previous frame, stages `colors` on channel 0 and transmits.
    pub fn render_frame(&mut self, colors: &[u32]) -> Result<()> {
        self.ensure_initialized()?;
        self.wait_in_flight()?;
        let buffer = self.channel_buffer(0)?;
        frame::transfer_words(buffer, colors);
        self.trigger()
    }

    /// Blanks the strip, waits for the blank frame to go out, then releases
    /// the hardware.
    ///
    /// Resources are released even if blanking fails; the first error is
    /// returned. A [`Error::HardwareTimeout`] is the exception: the frame may
    /// still be streaming, so the device stays initialized and a later call
    /// waits again before releasing. Calling this on a finalized device does
    /// nothing.
    pub fn reset(&mut self) -> Result<()> {
        self.shut_down(true)
    }

    /// Releases the hardware without blanking, after any in-flight frame.
    pub fn finalize(&mut self) -> Result<()> {
        self.shut_down(false)
    }

    fn shut_down(&mut self, blank: bool) -> Result<()> {
        match self.state {
            DeviceState::Finalized => return Ok(()),
            DeviceState::Unconfigured | DeviceState::Configured => {
                self.state = DeviceState::Finalized;
                return Ok(());
            }
            DeviceState::Initialized => {}
        }

        let outcome = self.wait_in_flight().and_then(|()| {
            if blank {
                self.blank()
            } else {
                Ok(())
            }
        });

        if let Err(Error::HardwareTimeout(_)) = outcome {
            log::error!("ws281x transmission still in flight, hardware not released");
            return outcome;
        }

        self.driver.finalize();
        self.state = DeviceState::Finalized;
        self.in_flight = false;
        log::info!("ws281x finalized");
        outcome
    }

    fn blank(&mut self) -> Result<()> {
        for index in 0..NUM_CHANNELS {
            if let Some(buffer) = self.driver.channel_buffer(index) {
                buffer.fill(0);
            }
        }
        self.trigger()?;
        self.wait_in_flight()
    }

    fn trigger(&mut self) -> Result<()> {
        self.driver.render().map_err(Error::DriverRender)?;
        self.in_flight = true;
        log::debug!("ws281x render triggered");
        Ok(())
    }

    /// Bounded wait for a transmission this handle started.
    fn wait_in_flight(&mut self) -> Result<()> {
        if !self.in_flight {
            return Ok(());
        }
        let timeout = self.config.wait_timeout;
        match self.driver.wait(timeout) {
            Ok(()) => {
                self.in_flight = false;
                Ok(())
            }
            Err(WaitError::TimedOut(_)) => {
                log::error!("ws281x transmission did not complete within {timeout:?}");
                Err(Error::HardwareTimeout(timeout))
            }
            Err(WaitError::Driver(err)) => Err(Error::DriverRender(err)),
        }
    }

    fn channel_buffer(&mut self, index: usize) -> Result<&mut [u32]> {
        let channel = self.config.channel(index)?;
        if self.state != DeviceState::Initialized || !channel.is_active() {
            return Err(Error::ChannelNotReady(index));
        }
        self.driver
            .channel_buffer(index)
            .filter(|buffer| !buffer.is_empty())
            .ok_or(Error::ChannelNotReady(index))
    }

    fn ensure_not_finalized(&self) -> Result<()> {
        if self.state == DeviceState::Finalized {
            Err(Error::DeviceFinalized)
        } else {
            Ok(())
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            DeviceState::Initialized => Ok(()),
            DeviceState::Finalized => Err(Error::DeviceFinalized),
            DeviceState::Unconfigured | DeviceState::Configured => Err(Error::NotInitialized),
        }
    }

    fn ensure_reconfigurable(&self, what: &'static str) -> Result<()> {
        match self.state {
            DeviceState::Finalized => Err(Error::DeviceFinalized),
            DeviceState::Initialized => Err(Error::ReinitRequired(what)),
            DeviceState::Unconfigured | DeviceState::Configured => Ok(()),
        }
    }

    fn mark_configured(&mut self) {
        if self.state == DeviceState::Unconfigured {
            self.state = DeviceState::Configured;
        }
    }
}

impl<D: Ws281xDriver> Drop for Device<D> {
    fn drop(&mut self) {
        if self.state == DeviceState::Initialized
            && let Err(err) = self.reset()
        {
            log::warn!("failed to reset ws281x device on drop: {err}");
        }
    }
}
