//! Device and channel configuration.
//!
//! Setters here are pure value assignments: they validate, then write. Nothing
//! in this module touches hardware.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Number of independent output channels on the PWM peripheral.
pub const NUM_CHANNELS: usize = 2;

pub const DEFAULT_FREQUENCY: u32 = 800_000;
pub const DEFAULT_DMA_NUM: u8 = 10;
pub const DEFAULT_GPIO_PIN: u32 = 18;
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Highest DMA engine index the BCM283x driver accepts.
pub const MAX_DMA_NUM: u8 = 14;

/// Color ordering of a strip, and whether it carries a white channel.
///
/// The discriminant-like [`code`](StripType::code) matches the values used
/// by the rpi_ws281x C library: byte 2, 1 and 0 hold the bit shifts of the
/// first, second and third transmitted color, byte 3 the shift of white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum StripType {
    Sk6812Rgbw,
    Sk6812Rbgw,
    Sk6812Grbw,
    Sk6812Gbrw,
    Sk6812Brgw,
    Sk6812Bgrw,
    Ws2811Rgb,
    Ws2811Rbg,
    Ws2811Grb,
    Ws2811Gbr,
    Ws2811Brg,
    Ws2811Bgr,
    #[default]
    Ws2812,
    Sk6812,
    #[cfg_attr(feature = "serde", serde(rename = "sk6812w"))]
    Sk6812W,
}

impl StripType {
    pub const ALL: [StripType; 15] = [
        StripType::Sk6812Rgbw,
        StripType::Sk6812Rbgw,
        StripType::Sk6812Grbw,
        StripType::Sk6812Gbrw,
        StripType::Sk6812Brgw,
        StripType::Sk6812Bgrw,
        StripType::Ws2811Rgb,
        StripType::Ws2811Rbg,
        StripType::Ws2811Grb,
        StripType::Ws2811Gbr,
        StripType::Ws2811Brg,
        StripType::Ws2811Bgr,
        StripType::Ws2812,
        StripType::Sk6812,
        StripType::Sk6812W,
    ];

    pub const fn code(self) -> u32 {
        match self {
            StripType::Sk6812Rgbw => 0x1810_0800,
            StripType::Sk6812Rbgw => 0x1810_0008,
            StripType::Sk6812Grbw => 0x1808_1000,
            StripType::Sk6812Gbrw | StripType::Sk6812W => 0x1808_0010,
            StripType::Sk6812Brgw => 0x1800_1008,
            StripType::Sk6812Bgrw => 0x1800_0810,
            StripType::Ws2811Rgb => 0x0010_0800,
            StripType::Ws2811Rbg => 0x0010_0008,
            StripType::Ws2811Grb | StripType::Ws2812 | StripType::Sk6812 => 0x0008_1000,
            StripType::Ws2811Gbr => 0x0008_0010,
            StripType::Ws2811Brg => 0x0000_1008,
            StripType::Ws2811Bgr => 0x0000_0810,
        }
    }

    /// Looks up the canonical strip type for a raw code.
    ///
    /// Aliases share codes with the generic orderings, so `Ws2812` comes back
    /// as `Ws2811Grb`.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|strip| strip.code() == code)
    }

    pub const fn id(self) -> &'static str {
        match self {
            StripType::Sk6812Rgbw => "sk6812-rgbw",
            StripType::Sk6812Rbgw => "sk6812-rbgw",
            StripType::Sk6812Grbw => "sk6812-grbw",
            StripType::Sk6812Gbrw => "sk6812-gbrw",
            StripType::Sk6812Brgw => "sk6812-brgw",
            StripType::Sk6812Bgrw => "sk6812-bgrw",
            StripType::Ws2811Rgb => "ws2811-rgb",
            StripType::Ws2811Rbg => "ws2811-rbg",
            StripType::Ws2811Grb => "ws2811-grb",
            StripType::Ws2811Gbr => "ws2811-gbr",
            StripType::Ws2811Brg => "ws2811-brg",
            StripType::Ws2811Bgr => "ws2811-bgr",
            StripType::Ws2812 => "ws2812",
            StripType::Sk6812 => "sk6812",
            StripType::Sk6812W => "sk6812w",
        }
    }

    #[inline]
    pub const fn has_white(self) -> bool {
        self.code() >> 24 != 0
    }

    /// Bytes transmitted per LED.
    #[inline]
    pub const fn bytes_per_led(self) -> usize {
        if self.has_white() { 4 } else { 3 }
    }

    /// Bit shifts into the packed color word, in transmission order.
    pub const fn wire_shifts(self) -> [u32; 4] {
        let code = self.code();
        [
            (code >> 16) & 0xff,
            (code >> 8) & 0xff,
            code & 0xff,
            (code >> 24) & 0xff,
        ]
    }
}

impl fmt::Display for StripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strip type: '{0}'")]
pub struct ParseStripTypeError(String);

impl FromStr for StripType {
    type Err = ParseStripTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|strip| strip.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseStripTypeError(s.to_owned()))
    }
}

/// Parameters of one physical output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelConfig {
    pub gpio_pin: u32,
    /// Zero marks the channel as unused.
    pub led_count: u32,
    pub invert: bool,
    pub brightness: u8,
    pub strip_type: StripType,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            gpio_pin: 0,
            led_count: 0,
            invert: false,
            brightness: u8::MAX,
            strip_type: StripType::default(),
        }
    }
}

impl ChannelConfig {
    /// A channel on `gpio_pin` driving `led_count` LEDs, other fields default.
    pub fn new(gpio_pin: u32, led_count: u32) -> Self {
        Self {
            gpio_pin,
            led_count,
            ..Self::default()
        }
    }

    pub fn with_strip_type(mut self, strip_type: StripType) -> Self {
        self.strip_type = strip_type;
        self
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.led_count > 0
    }

    /// Validates `value` for `param` and assigns it.
    ///
    /// Device-level parameters are rejected with [`Error::InvalidParameter`].
    pub fn apply(&mut self, param: Param, value: &ParamValue) -> Result<()> {
        match param {
            Param::GpioPin => self.gpio_pin = value.as_c_int(param)?,
            Param::LedCount => self.led_count = value.as_c_int(param)?,
            Param::Invert => self.invert = value.as_flag(param)?,
            Param::Brightness => self.brightness = value.as_brightness(param)?,
            Param::StripType => self.strip_type = value.as_strip_type(param)?,
            Param::Frequency | Param::DmaNum => return Err(Error::InvalidParameter(param.id())),
        }
        Ok(())
    }

    /// Pins and counts must fit the C driver's `int` fields.
    pub fn validate(&self) -> Result<()> {
        let mut scratch = *self;
        for param in [Param::GpioPin, Param::LedCount] {
            scratch.apply(param, &self.get(param)?)?;
        }
        Ok(())
    }

    pub fn get(&self, param: Param) -> Result<ParamValue> {
        Ok(match param {
            Param::GpioPin => ParamValue::from(self.gpio_pin),
            Param::LedCount => ParamValue::from(self.led_count),
            Param::Invert => ParamValue::Bool(self.invert),
            Param::Brightness => ParamValue::from(self.brightness),
            Param::StripType => ParamValue::Strip(self.strip_type),
            Param::Frequency | Param::DmaNum => return Err(Error::InvalidParameter(param.id())),
        })
    }
}

/// Global signal-generator parameters plus both channels.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    pub frequency: u32,
    pub dma_num: u8,
    pub channels: [ChannelConfig; NUM_CHANNELS],
    /// Upper bound on any single wait for transmission completion.
    pub wait_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            dma_num: DEFAULT_DMA_NUM,
            channels: [
                ChannelConfig::new(DEFAULT_GPIO_PIN, 0),
                ChannelConfig::default(),
            ],
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    /// Default configuration with `led_count` LEDs on channel 0.
    pub fn with_led_count(led_count: u32) -> Self {
        let mut config = Self::default();
        config.channels[0].led_count = led_count;
        config
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelConfig> {
        self.channels.get(index).ok_or(Error::InvalidChannel(index))
    }

    pub fn channel_mut(&mut self, index: usize) -> Result<&mut ChannelConfig> {
        self.channels
            .get_mut(index)
            .ok_or(Error::InvalidChannel(index))
    }

    /// Checks every field against the ranges the parameter setters enforce.
    pub fn validate(&self) -> Result<()> {
        let mut scratch = self.clone();
        for param in [Param::Frequency, Param::DmaNum] {
            scratch.apply(param, &self.get(param)?)?;
        }
        self.channels.iter().try_for_each(ChannelConfig::validate)
    }

    /// Indices of channels with at least one LED.
    pub fn active_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| channel.is_active())
            .map(|(index, _)| index)
    }

    /// Validates `value` for a device-level `param` and assigns it.
    pub fn apply(&mut self, param: Param, value: &ParamValue) -> Result<()> {
        match param {
            Param::Frequency => self.frequency = value.as_frequency(param)?,
            Param::DmaNum => self.dma_num = value.as_dma_num(param)?,
            _ => return Err(Error::InvalidParameter(param.id())),
        }
        Ok(())
    }

    pub fn get(&self, param: Param) -> Result<ParamValue> {
        match param {
            Param::Frequency => Ok(ParamValue::from(self.frequency)),
            Param::DmaNum => Ok(ParamValue::from(self.dma_num)),
            _ => Err(Error::InvalidParameter(param.id())),
        }
    }
}

/// Recognized parameter ids, numbered as in the native binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Frequency = 1,
    DmaNum = 2,
    GpioPin = 3,
    LedCount = 4,
    Invert = 5,
    Brightness = 6,
    StripType = 7,
}

impl Param {
    #[inline]
    pub const fn id(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Param::Frequency => "frequency",
            Param::DmaNum => "dmaNum",
            Param::GpioPin => "gpioPin",
            Param::LedCount => "ledCount",
            Param::Invert => "invert",
            Param::Brightness => "brightness",
            Param::StripType => "stripType",
        }
    }

    #[inline]
    pub const fn is_channel_param(self) -> bool {
        !matches!(self, Param::Frequency | Param::DmaNum)
    }
}

impl TryFrom<u32> for Param {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Param::Frequency),
            2 => Ok(Param::DmaNum),
            3 => Ok(Param::GpioPin),
            4 => Ok(Param::LedCount),
            5 => Ok(Param::Invert),
            6 => Ok(Param::Brightness),
            7 => Ok(Param::StripType),
            other => Err(Error::InvalidParameter(other)),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A loosely typed parameter value, as a host binding would hand it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Text(String),
    Strip(StripType),
}

macro_rules! int_param_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Int(i64::from(value))
            }
        })*
    };
}

int_param_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<StripType> for ParamValue {
    fn from(value: StripType) -> Self {
        ParamValue::Strip(value)
    }
}

impl ParamValue {
    fn as_int(&self, param: Param, expected: &'static str) -> Result<i64> {
        match self {
            ParamValue::Int(value) => Ok(*value),
            _ => Err(Error::InvalidArgumentType {
                param: param.name(),
                expected,
            }),
        }
    }

    fn as_frequency(&self, param: Param) -> Result<u32> {
        let value = self.as_int(param, "integer frequency in Hz")?;
        u32::try_from(value)
            .ok()
            .filter(|hz| *hz > 0)
            .ok_or(Error::OutOfRange {
                param: param.name(),
                value,
            })
    }

    fn as_dma_num(&self, param: Param) -> Result<u8> {
        let value = self.as_int(param, "integer DMA engine index")?;
        u8::try_from(value)
            .ok()
            .filter(|dma| *dma <= MAX_DMA_NUM)
            .ok_or(Error::OutOfRange {
                param: param.name(),
                value,
            })
    }

    /// The C driver stores pins and counts as `int`.
    fn as_c_int(&self, param: Param) -> Result<u32> {
        let value = self.as_int(param, "non-negative integer")?;
        i32::try_from(value)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(Error::OutOfRange {
                param: param.name(),
                value,
            })
    }

    fn as_flag(&self, param: Param) -> Result<bool> {
        match self {
            ParamValue::Bool(flag) => Ok(*flag),
            ParamValue::Int(0) => Ok(false),
            ParamValue::Int(1) => Ok(true),
            ParamValue::Int(value) => Err(Error::OutOfRange {
                param: param.name(),
                value: *value,
            }),
            _ => Err(Error::InvalidArgumentType {
                param: param.name(),
                expected: "boolean or 0/1",
            }),
        }
    }

    /// Clamps to the 8-bit range instead of wrapping.
    fn as_brightness(&self, param: Param) -> Result<u8> {
        let value = self.as_int(param, "integer brightness 0-255")?;
        Ok(value.clamp(0, i64::from(u8::MAX)) as u8)
    }

    fn as_strip_type(&self, param: Param) -> Result<StripType> {
        let invalid = || Error::InvalidArgumentType {
            param: param.name(),
            expected: "known strip type id or code",
        };
        match self {
            ParamValue::Strip(strip) => Ok(*strip),
            ParamValue::Text(id) => id.parse().map_err(|_| invalid()),
            ParamValue::Int(code) => u32::try_from(*code)
                .ok()
                .and_then(StripType::from_code)
                .ok_or_else(invalid),
            ParamValue::Bool(_) => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn defaults_match_native_binding() {
        let config = DeviceConfig::default();

        assert_eq!(config.frequency, 800_000);
        assert_eq!(config.dma_num, 10);
        assert_eq!(config.channels[0].gpio_pin, 18);
        assert_eq!(config.channels[1].gpio_pin, 0);
        for channel in &config.channels {
            assert_eq!(channel.led_count, 0);
            assert_eq!(channel.brightness, 255);
            assert!(!channel.invert);
        }
        assert_eq!(config.active_channels().count(), 0);
    }

    #[test_case(1, Param::Frequency)]
    #[test_case(2, Param::DmaNum)]
    #[test_case(4, Param::LedCount)]
    #[test_case(7, Param::StripType)]
    fn param_from_id(id: u32, expected: Param) {
        assert_eq!(Param::try_from(id), Ok(expected));
        assert_eq!(expected.id(), id);
    }

    #[test_case(0; "zero")]
    #[test_case(8; "past last")]
    #[test_case(u32::MAX; "max")]
    fn unknown_param_id_is_rejected(id: u32) {
        assert_eq!(Param::try_from(id), Err(Error::InvalidParameter(id)));
    }

    #[test_case(-20, 0; "negative clamps to zero")]
    #[test_case(128, 128; "in range")]
    #[test_case(256, 255; "just above")]
    #[test_case(100_000, 255; "far above")]
    fn brightness_is_clamped(input: i64, expected: u8) {
        let mut channel = ChannelConfig::default();
        channel
            .apply(Param::Brightness, &ParamValue::Int(input))
            .expect("integers are valid brightness");
        assert_eq!(channel.brightness, expected);
    }

    #[test]
    fn brightness_rejects_text() {
        let mut channel = ChannelConfig::default();
        let err = channel
            .apply(Param::Brightness, &"bright".into())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentType { param: "brightness", .. }));
        assert_eq!(channel.brightness, 255);
    }

    #[test_case(ParamValue::Bool(true), true)]
    #[test_case(ParamValue::Int(1), true)]
    #[test_case(ParamValue::Int(0), false)]
    fn invert_accepts_flags(value: ParamValue, expected: bool) {
        let mut channel = ChannelConfig::default().with_invert(!expected);
        channel.apply(Param::Invert, &value).expect("valid flag");
        assert_eq!(channel.invert, expected);
    }

    #[test]
    fn invert_rejects_other_integers() {
        let mut channel = ChannelConfig::default();
        assert_eq!(
            channel.apply(Param::Invert, &ParamValue::Int(2)),
            Err(Error::OutOfRange { param: "invert", value: 2 })
        );
        assert!(!channel.invert);
    }

    #[test_case(ParamValue::Int(-1); "negative")]
    #[test_case(ParamValue::Int(i64::from(i32::MAX) + 1); "wider than c int")]
    fn led_count_out_of_range(value: ParamValue) {
        let mut channel = ChannelConfig::new(18, 10);
        assert!(matches!(
            channel.apply(Param::LedCount, &value),
            Err(Error::OutOfRange { param: "ledCount", .. })
        ));
        assert_eq!(channel.led_count, 10);
    }

    #[test]
    fn channel_rejects_device_params() {
        let mut channel = ChannelConfig::default();
        assert_eq!(
            channel.apply(Param::Frequency, &ParamValue::Int(400_000)),
            Err(Error::InvalidParameter(1))
        );
        assert_eq!(channel.get(Param::DmaNum), Err(Error::InvalidParameter(2)));
    }

    #[test]
    fn device_rejects_channel_params() {
        let mut config = DeviceConfig::default();
        assert_eq!(
            config.apply(Param::GpioPin, &ParamValue::Int(12)),
            Err(Error::InvalidParameter(3))
        );
    }

    #[test_case(ParamValue::Int(0); "zero hz")]
    #[test_case(ParamValue::Int(-800_000); "negative")]
    #[test_case(ParamValue::Int(1 << 40); "wider than u32")]
    fn frequency_out_of_range(value: ParamValue) {
        let mut config = DeviceConfig::default();
        assert!(matches!(
            config.apply(Param::Frequency, &value),
            Err(Error::OutOfRange { .. })
        ));
        assert_eq!(config.frequency, DEFAULT_FREQUENCY);
    }

    #[test]
    fn frequency_rejects_bool() {
        let mut config = DeviceConfig::default();
        assert!(matches!(
            config.apply(Param::Frequency, &ParamValue::Bool(true)),
            Err(Error::InvalidArgumentType { param: "frequency", .. })
        ));
    }

    #[test]
    fn dma_num_range() {
        let mut config = DeviceConfig::default();
        config
            .apply(Param::DmaNum, &ParamValue::Int(5))
            .expect("5 is a valid DMA engine");
        assert_eq!(config.dma_num, 5);
        assert!(config.apply(Param::DmaNum, &ParamValue::Int(15)).is_err());
        assert_eq!(config.get(Param::DmaNum), Ok(ParamValue::Int(5)));
    }

    #[test_case("ws2812", StripType::Ws2812)]
    #[test_case("sk6812-grbw", StripType::Sk6812Grbw)]
    #[test_case("WS2811-RGB", StripType::Ws2811Rgb)]
    #[test_case("sk6812w", StripType::Sk6812W)]
    fn strip_type_from_id(id: &str, expected: StripType) {
        assert_eq!(id.parse::<StripType>(), Ok(expected));
    }

    #[test]
    fn strip_type_ids_round_trip() {
        for strip in StripType::ALL {
            assert_eq!(strip.id().parse::<StripType>(), Ok(strip));
        }
    }

    #[test]
    fn strip_type_param_accepts_codes_and_ids() {
        let mut channel = ChannelConfig::default();

        channel
            .apply(Param::StripType, &ParamValue::Int(0x0010_0800))
            .expect("known code");
        assert_eq!(channel.strip_type, StripType::Ws2811Rgb);

        channel
            .apply(Param::StripType, &"sk6812-rgbw".into())
            .expect("known id");
        assert_eq!(channel.strip_type, StripType::Sk6812Rgbw);

        assert!(matches!(
            channel.apply(Param::StripType, &"ws9999".into()),
            Err(Error::InvalidArgumentType { param: "stripType", .. })
        ));
        assert!(channel
            .apply(Param::StripType, &ParamValue::Int(0x1234))
            .is_err());
        assert_eq!(channel.strip_type, StripType::Sk6812Rgbw);
    }

    #[test]
    fn aliases_share_codes() {
        assert_eq!(StripType::Ws2812.code(), StripType::Ws2811Grb.code());
        assert_eq!(StripType::Sk6812W.code(), StripType::Sk6812Gbrw.code());
        assert_eq!(StripType::from_code(StripType::Ws2812.code()), Some(StripType::Ws2811Grb));
    }

    #[test]
    fn white_channel_detection() {
        assert!(StripType::Sk6812Rgbw.has_white());
        assert_eq!(StripType::Sk6812Rgbw.bytes_per_led(), 4);
        assert!(!StripType::Ws2812.has_white());
        assert_eq!(StripType::Ws2812.bytes_per_led(), 3);
    }

    #[test]
    fn validate_catches_out_of_range_fields() {
        assert_eq!(DeviceConfig::default().validate(), Ok(()));

        let mut config = DeviceConfig::default();
        config.dma_num = 15;
        assert_eq!(
            config.validate(),
            Err(Error::OutOfRange {
                param: "dmaNum",
                value: 15
            })
        );

        let mut config = DeviceConfig::default();
        config.channels[1].led_count = u32::MAX;
        assert_eq!(
            config.validate(),
            Err(Error::OutOfRange {
                param: "ledCount",
                value: i64::from(u32::MAX)
            })
        );
    }

    #[test]
    fn channel_index_is_checked() {
        let config = DeviceConfig::default();
        assert_eq!(config.channel(2), Err(Error::InvalidChannel(2)));
        assert_eq!(config.channel(5), Err(Error::InvalidChannel(5)));
    }
}
