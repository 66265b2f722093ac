use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use rgb::RGB8;
use ws281x_device::color::pack_rgb;
use ws281x_device::mock::MockDriver;
use ws281x_device::{Device, DeviceConfig, Ws281xDriver};

const LED_COUNT: u32 = 16;
const FRAME_INTERVAL: Duration = Duration::from_millis(30);

/// Walks one lit LED down the strip, then blanks it and releases the hardware.
fn run<D: Ws281xDriver>(driver: D) -> ws281x_device::Result<()> {
    let mut device = Device::with_config(driver, DeviceConfig::with_led_count(LED_COUNT));
    device.init()?;

    let lit = pack_rgb(RGB8::new(0, 0x40, 0x20));
    let mut frame = vec![0; LED_COUNT as usize];
    for position in 0..frame.len() {
        frame.fill(0);
        frame[position] = lit;
        device.render_frame(&frame)?;
        thread::sleep(FRAME_INTERVAL);
    }

    device.reset()
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "arm", target_arch = "aarch64")
))]
fn run_detected() -> ws281x_device::Result<()> {
    match ws281x_device::platform::detect() {
        Some(board) => {
            log::info!("driving LEDs on {board:?}");
            run(ws281x_device::rpi::RpiDriver::new())
        }
        None => {
            log::warn!("not a supported Raspberry Pi, using the mock driver");
            run(MockDriver::new())
        }
    }
}

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "arm", target_arch = "aarch64")
)))]
fn run_detected() -> ws281x_device::Result<()> {
    log::warn!("hardware driver is only available on Raspberry Pi, using the mock driver");
    run(MockDriver::new())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("WS281x smoke test - {LED_COUNT} LEDs");

    match run_detected() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
