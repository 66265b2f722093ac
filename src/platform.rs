//! Detects whether we are running on a Raspberry Pi the PWM/DMA driver supports.
//!
//! Poking the BCM peripherals on any other machine is at best useless, so
//! callers should fall back to [`MockDriver`](crate::mock::MockDriver) when
//! [`detect`] returns `None`.

use std::fs;

const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Raspberry Pi generation, keyed by SoC family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaspberryPi {
    /// BCM2835 (reported as bcm2708 by older kernels).
    Pi1,
    /// BCM2836 (bcm2709).
    Pi2,
    /// BCM2837 (bcm2710).
    Pi3,
    /// BCM2711.
    Pi4,
}

impl RaspberryPi {
    fn from_soc(soc: &str) -> Option<Self> {
        match soc.to_ascii_lowercase().as_str() {
            "bcm2708" | "bcm2835" => Some(RaspberryPi::Pi1),
            "bcm2709" | "bcm2836" => Some(RaspberryPi::Pi2),
            "bcm2710" | "bcm2837" => Some(RaspberryPi::Pi3),
            "bcm2711" => Some(RaspberryPi::Pi4),
            _ => None,
        }
    }

    fn from_model(model: &str) -> Option<Self> {
        let rest = model.trim().strip_prefix("Raspberry Pi ")?;
        match rest.split_whitespace().next()? {
            "Model" | "Zero" | "1" => Some(RaspberryPi::Pi1),
            "2" => Some(RaspberryPi::Pi2),
            "3" => Some(RaspberryPi::Pi3),
            "4" | "400" => Some(RaspberryPi::Pi4),
            _ => None,
        }
    }
}

/// Reads `/proc/cpuinfo` and identifies the board.
pub fn detect() -> Option<RaspberryPi> {
    match fs::read_to_string(CPUINFO_PATH) {
        Ok(cpuinfo) => {
            let board = parse_cpuinfo(&cpuinfo);
            if board.is_none() {
                log::warn!("could not identify a supported Raspberry Pi from {CPUINFO_PATH}");
            }
            board
        }
        Err(err) => {
            log::debug!("cannot read {CPUINFO_PATH}: {err}");
            None
        }
    }
}

/// Identifies the board from `/proc/cpuinfo` contents.
///
/// The `Model` line wins when present: recent kernels report `BCM2835` in
/// the `Hardware` line for every board.
pub fn parse_cpuinfo(cpuinfo: &str) -> Option<RaspberryPi> {
    let field = |name: &str| {
        cpuinfo.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    };

    field("model")
        .and_then(RaspberryPi::from_model)
        .or_else(|| field("hardware").and_then(RaspberryPi::from_soc))
}
