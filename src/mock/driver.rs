use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::Ws281xDriver;
use crate::color::encode_frame;
use crate::config::{ChannelConfig, DeviceConfig, NUM_CHANNELS};
use crate::error::{DriverError, WaitError};

/// One call made into the [`MockDriver`], in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Initialize {
        frequency: u32,
        dma_num: u8,
        led_counts: [u32; NUM_CHANNELS],
    },
    SetBrightness {
        channel: usize,
        brightness: u8,
    },
    /// Buffer contents per channel at the moment transmission was triggered.
    Render {
        frames: [Vec<u32>; NUM_CHANNELS],
        /// Triggered while the previous transmission was still in flight.
        overlapped: bool,
    },
    Wait,
    Finalize,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<DriverCall>,
    wire: [Vec<u8>; NUM_CHANNELS],
    initialized: bool,
    fail_next_init: Option<DriverError>,
    fail_next_render: Option<DriverError>,
    fail_next_wait: Option<DriverError>,
    stuck: bool,
}

/// Shared view into a [`MockDriver`] that stays usable after the driver has
/// been moved into a [`Device`](crate::Device).
///
/// Used both to inspect recorded calls and to inject faults.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Frames seen by each render trigger for `channel`.
    pub fn rendered_frames(&self, channel: usize) -> Vec<Vec<u32>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::Render { frames, .. } => frames.get(channel).cloned(),
                _ => None,
            })
            .collect()
    }

    pub fn render_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Render { .. }))
            .count()
    }

    /// True if any render was triggered on top of an unfinished transmission.
    pub fn any_overlap(&self) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|call| matches!(call, DriverCall::Render { overlapped: true, .. }))
    }

    /// Bytes the last render put on the line for `channel`.
    pub fn last_wire(&self, channel: usize) -> Vec<u8> {
        self.lock().wire.get(channel).cloned().unwrap_or_default()
    }

    /// Whether hardware resources are currently claimed.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn fail_next_init(&self, error: DriverError) {
        self.lock().fail_next_init = Some(error);
    }

    pub fn fail_next_render(&self, error: DriverError) {
        self.lock().fail_next_render = Some(error);
    }

    pub fn fail_next_wait(&self, error: DriverError) {
        self.lock().fail_next_wait = Some(error);
    }

    /// Stuck hardware never reports completion, so every wait times out.
    pub fn set_stuck(&self, stuck: bool) {
        self.lock().stuck = stuck;
    }

    fn record(&self, call: DriverCall) {
        self.lock().calls.push(call);
    }
}

/// In-memory stand-in for the PWM/DMA driver.
///
/// Each render "transmits" for [`latency`](MockDriver::with_latency) of real
/// time, so a caller that triggers again too early is caught as an overlap.
#[derive(Debug, Default)]
pub struct MockDriver {
    handle: MockHandle,
    latency: Duration,
    channels: [ChannelConfig; NUM_CHANNELS],
    buffers: [Option<Vec<u32>>; NUM_CHANNELS],
    in_flight_until: Option<Instant>,
}

impl MockDriver {
    /// Creates a driver whose transmissions complete instantly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl Ws281xDriver for MockDriver {
    fn initialize(&mut self, config: &DeviceConfig) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        state.calls.push(DriverCall::Initialize {
            frequency: config.frequency,
            dma_num: config.dma_num,
            led_counts: config.channels.map(|channel| channel.led_count),
        });
        if let Some(err) = state.fail_next_init.take() {
            return Err(err);
        }

        self.channels = config.channels;
        self.buffers = config.channels.map(|channel| {
            channel
                .is_active()
                .then(|| vec![0; channel.led_count as usize])
        });
        state.initialized = true;
        Ok(())
    }

    fn channel_buffer(&mut self, channel: usize) -> Option<&mut [u32]> {
        self.buffers.get_mut(channel)?.as_deref_mut()
    }

    fn set_brightness(&mut self, channel: usize, brightness: u8) -> Result<(), DriverError> {
        self.handle.record(DriverCall::SetBrightness {
            channel,
            brightness,
        });
        let config = self
            .channels
            .get_mut(channel)
            .ok_or_else(|| DriverError::new(-1, format!("no channel {channel}")))?;
        config.brightness = brightness;
        Ok(())
    }

    fn render(&mut self) -> Result<(), DriverError> {
        let mut state = self.handle.lock();
        if !state.initialized {
            return Err(DriverError::new(-1, "render before initialize"));
        }
        if let Some(err) = state.fail_next_render.take() {
            return Err(err);
        }

        let now = Instant::now();
        let overlapped = self.in_flight_until.is_some_and(|until| now < until);
        let frames = self
            .buffers
            .clone()
            .map(|buffer| buffer.unwrap_or_default());
        for (wire, (frame, channel)) in state
            .wire
            .iter_mut()
            .zip(frames.iter().zip(&self.channels))
        {
            *wire = encode_frame(frame, channel);
        }
        state.calls.push(DriverCall::Render { frames, overlapped });

        self.in_flight_until = Some(now + self.latency);
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), WaitError> {
        let remaining = {
            let mut state = self.handle.lock();
            state.calls.push(DriverCall::Wait);
            if let Some(err) = state.fail_next_wait.take() {
                return Err(err.into());
            }
            if state.stuck {
                return Err(WaitError::TimedOut(timeout));
            }
            self.in_flight_until
                .map(|until| until.saturating_duration_since(Instant::now()))
                .unwrap_or_default()
        };

        if remaining > timeout {
            return Err(WaitError::TimedOut(timeout));
        }
        thread::sleep(remaining);
        self.in_flight_until = None;
        Ok(())
    }

    fn finalize(&mut self) {
        let mut state = self.handle.lock();
        state.calls.push(DriverCall::Finalize);
        state.initialized = false;
        self.buffers = Default::default();
        self.in_flight_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized(led_count: u32) -> MockDriver {
        let mut driver = MockDriver::new();
        driver
            .initialize(&DeviceConfig::with_led_count(led_count))
            .expect("mock initialize should succeed");
        driver
    }

    #[test]
    fn initialize_allocates_active_channels_only() {
        let mut driver = initialized(4);
        assert_eq!(driver.channel_buffer(0).map(|b| b.len()), Some(4));
        assert!(driver.channel_buffer(1).is_none());
        assert!(driver.channel_buffer(2).is_none());
        assert!(driver.handle().is_initialized());
    }

    #[test]
    fn render_snapshots_buffers() {
        let mut driver = initialized(2);
        driver
            .channel_buffer(0)
            .expect("channel 0 allocated")
            .copy_from_slice(&[1, 2]);
        driver.render().expect("render should succeed");

        assert_eq!(driver.handle().rendered_frames(0), vec![vec![1, 2]]);
        assert_eq!(driver.handle().rendered_frames(1), vec![Vec::<u32>::new()]);
    }

    #[test]
    fn back_to_back_renders_are_flagged_as_overlap() {
        let mut driver = initialized(1).with_latency(Duration::from_millis(50));
        driver.render().expect("first render");
        driver.render().expect("second render");
        assert!(driver.handle().any_overlap());
    }

    #[test]
    fn wait_drains_latency() {
        let mut driver = initialized(1).with_latency(Duration::from_millis(5));
        driver.render().expect("first render");
        driver
            .wait(Duration::from_secs(1))
            .expect("wait should finish");
        driver.render().expect("second render");
        assert!(!driver.handle().any_overlap());
    }

    #[test]
    fn wait_shorter_than_latency_times_out() {
        let mut driver = initialized(1).with_latency(Duration::from_secs(5));
        driver.render().expect("render");
        assert_eq!(
            driver.wait(Duration::from_millis(1)),
            Err(WaitError::TimedOut(Duration::from_millis(1)))
        );
    }

    #[test]
    fn render_without_initialize_fails() {
        let mut driver = MockDriver::new();
        assert!(driver.render().is_err());
    }

    #[test]
    fn injected_render_failure_is_one_shot() {
        let mut driver = initialized(1);
        driver
            .handle()
            .fail_next_render(DriverError::new(-7, "spi transfer failed"));

        assert_eq!(
            driver.render(),
            Err(DriverError::new(-7, "spi transfer failed"))
        );
        assert!(driver.render().is_ok());
        assert_eq!(driver.handle().render_count(), 1);
    }

    #[test]
    fn finalize_releases_buffers() {
        let mut driver = initialized(3);
        driver.finalize();
        assert!(driver.channel_buffer(0).is_none());
        assert!(!driver.handle().is_initialized());
        assert_eq!(driver.handle().calls().last(), Some(&DriverCall::Finalize));
    }
}
