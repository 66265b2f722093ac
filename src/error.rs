use std::time::Duration;

/// Failure reported by the signal-generation driver.
///
/// Carries the driver's own return code and message so callers see exactly
/// what the hardware layer said.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Outcome of a bounded wait for an in-flight transmission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("transmission still in flight after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors returned by [`Device`](crate::Device) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The value has the wrong shape for the parameter (e.g. text for a frequency).
    #[error("invalid argument type for {param}: expected {expected}")]
    InvalidArgumentType {
        param: &'static str,
        expected: &'static str,
    },

    /// The value has the right shape but lies outside the accepted range.
    #[error("{param} value {value} is out of range")]
    OutOfRange { param: &'static str, value: i64 },

    /// Unknown parameter id, or a parameter used at the wrong level.
    #[error("invalid parameter id {0}")]
    InvalidParameter(u32),

    #[error("invalid channel index {0}, expected 0 or 1")]
    InvalidChannel(usize),

    /// The channel has no LEDs or no hardware buffer allocated.
    #[error("channel {0} is not provisioned")]
    ChannelNotReady(usize),

    #[error("driver initialization failed: {0}")]
    DriverInit(DriverError),

    #[error("device is already initialized")]
    AlreadyInitialized,

    #[error("driver render failed: {0}")]
    DriverRender(DriverError),

    #[error("device has been finalized")]
    DeviceFinalized,

    /// Fatal: the hardware never signalled completion of a transmission.
    #[error("hardware did not finish transmitting within {0:?}")]
    HardwareTimeout(Duration),

    #[error("device has not been configured")]
    NotConfigured,

    #[error("device is not initialized")]
    NotInitialized,

    /// The parameter is baked into driver resources at init time.
    #[error("{0} cannot change while initialized; reset and initialize again")]
    ReinitRequired(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_message_includes_code() {
        let err = Error::DriverInit(DriverError::new(-5, "mmap() failed"));
        assert_eq!(
            err.to_string(),
            "driver initialization failed: mmap() failed (code -5)"
        );
    }

    #[test]
    fn wait_error_converts_from_driver_error() {
        let err: WaitError = DriverError::new(-1, "generic").into();
        assert_eq!(err, WaitError::Driver(DriverError::new(-1, "generic")));
    }
}
