//! PWM/DMA driver for Raspberry Pi boards, backed by the rpi_ws281x C library.
//!
//! The C library keeps its own LED arrays; this driver stages frames in
//! plain `u32` buffers and copies them across right before each render.

use std::time::{Duration, Instant};

use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder};

use crate::Ws281xDriver;
use crate::config::{DeviceConfig, NUM_CHANNELS, StripType};
use crate::error::{DriverError, WaitError};

/// rs_ws281x reports failures as an enum without the raw C return code.
const GENERIC_ERROR_CODE: i32 = -1;

fn driver_error(context: &str, err: rs_ws281x::WS2811Error) -> DriverError {
    DriverError::new(GENERIC_ERROR_CODE, format!("{context}: {err:?}"))
}

fn to_native(strip: StripType) -> rs_ws281x::StripType {
    use rs_ws281x::StripType as Native;
    match strip {
        StripType::Sk6812Rgbw => Native::Sk6812Rgbw,
        StripType::Sk6812Rbgw => Native::Sk6812Rbgw,
        StripType::Sk6812Grbw => Native::Sk6812Grbw,
        StripType::Sk6812Gbrw => Native::Sk6812Gbrw,
        StripType::Sk6812Brgw => Native::Sk6812Brgw,
        StripType::Sk6812Bgrw => Native::Sk6812Bgrw,
        StripType::Ws2811Rgb => Native::Ws2811Rgb,
        StripType::Ws2811Rbg => Native::Ws2811Rbg,
        StripType::Ws2811Grb => Native::Ws2811Grb,
        StripType::Ws2811Gbr => Native::Ws2811Gbr,
        StripType::Ws2811Brg => Native::Ws2811Brg,
        StripType::Ws2811Bgr => Native::Ws2811Bgr,
        StripType::Ws2812 => Native::Ws2812,
        StripType::Sk6812 => Native::Sk6812,
        StripType::Sk6812W => Native::Sk6812W,
    }
}

/// Raspberry Pi signal generator.
///
/// Requires root (or `/dev/mem` access) and a PWM-capable GPIO pin.
#[derive(Default)]
pub struct RpiDriver {
    controller: Option<Controller>,
    staging: [Option<Vec<u32>>; NUM_CHANNELS],
}

impl RpiDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn controller(&mut self) -> Result<&mut Controller, DriverError> {
        self.controller
            .as_mut()
            .ok_or_else(|| DriverError::new(GENERIC_ERROR_CODE, "driver is not initialized"))
    }
}

impl Ws281xDriver for RpiDriver {
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError> {
        let mut builder = ControllerBuilder::new();
        builder
            .freq(config.frequency)
            .dma(i32::from(config.dma_num));

        for (index, channel) in config.channels.iter().enumerate() {
            if !channel.is_active() {
                continue;
            }
            let pin = i32::try_from(channel.gpio_pin)
                .map_err(|_| DriverError::new(GENERIC_ERROR_CODE, "gpio pin out of range"))?;
            let count = i32::try_from(channel.led_count)
                .map_err(|_| DriverError::new(GENERIC_ERROR_CODE, "led count out of range"))?;
            builder.channel(
                index,
                ChannelBuilder::new()
                    .pin(pin)
                    .count(count)
                    .invert(channel.invert)
                    .brightness(channel.brightness)
                    .strip_type(to_native(channel.strip_type))
                    .build(),
            );
        }

        let controller = builder
            .build()
            .map_err(|err| driver_error("ws2811_init failed", err))?;

        self.staging = config
            .channels
            .map(|channel| channel.is_active().then(|| vec![0; channel.led_count as usize]));
        self.controller = Some(controller);
        Ok(())
    }

    fn channel_buffer(&mut self, channel: usize) -> Option<&mut [u32]> {
        self.staging.get_mut(channel)?.as_deref_mut()
    }

    fn set_brightness(&mut self, channel: usize, brightness: u8) -> Result<(), DriverError> {
        self.controller()?.set_brightness(channel, brightness);
        Ok(())
    }

    fn render(&mut self) -> Result<(), DriverError> {
        let Some(controller) = self.controller.as_mut() else {
            return Err(DriverError::new(GENERIC_ERROR_CODE, "driver is not initialized"));
        };

        for (index, staged) in self.staging.iter().enumerate() {
            let Some(staged) = staged else { continue };
            for (led, word) in controller.leds_mut(index).iter_mut().zip(staged) {
                *led = word.to_le_bytes();
            }
        }

        controller
            .render()
            .map_err(|err| driver_error("ws2811_render failed", err))
    }

    /// The C library busy-waits on the DMA status register without a bound,
    /// so an overrun is detected once it returns rather than interrupted.
    fn wait(&mut self, timeout: Duration) -> Result<(), WaitError> {
        let started = Instant::now();
        self.controller()?
            .wait()
            .map_err(|err| driver_error("ws2811_wait failed", err))?;

        if started.elapsed() > timeout {
            return Err(WaitError::TimedOut(timeout));
        }
        Ok(())
    }

    fn finalize(&mut self) {
        // Dropping the controller runs ws2811_fini.
        self.controller = None;
        self.staging = Default::default();
    }
}
