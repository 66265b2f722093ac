//! Packed color words and their on-wire byte order.
//!
//! A color word is `0xWWRRGGBB`. Which byte goes out first depends on the
//! strip's [`StripType`].

use rgb::RGB8;

use crate::config::{ChannelConfig, StripType};

/// Packs an RGB color into a `0x00RRGGBB` word.
#[inline]
pub const fn pack_rgb(color: RGB8) -> u32 {
    ((color.r as u32) << 16) | ((color.g as u32) << 8) | color.b as u32
}

/// Packs an RGB color plus white into a `0xWWRRGGBB` word.
#[inline]
pub const fn pack_rgbw(color: RGB8, white: u8) -> u32 {
    ((white as u32) << 24) | pack_rgb(color)
}

/// Scales one color component the way the PWM driver does: `c * (brightness + 1) >> 8`.
#[inline]
pub const fn scale(component: u8, brightness: u8) -> u8 {
    ((component as u16 * (brightness as u16 + 1)) >> 8) as u8
}

/// Appends the bytes a single LED would receive.
pub fn encode_led(word: u32, strip: StripType, brightness: u8, invert: bool, out: &mut Vec<u8>) {
    let shifts = strip.wire_shifts();
    for shift in &shifts[..strip.bytes_per_led()] {
        let byte = scale((word >> shift) as u8, brightness);
        out.push(if invert { !byte } else { byte });
    }
}

/// Encodes a whole channel buffer into the byte stream sent down the line.
pub fn encode_frame(words: &[u32], channel: &ChannelConfig) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * channel.strip_type.bytes_per_led());
    for &word in words {
        encode_led(
            word,
            channel.strip_type,
            channel.brightness,
            channel.invert,
            &mut out,
        );
    }
    out
}
