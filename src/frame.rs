//! Bounds-checked copies from caller frames into channel buffers.
//!
//! The copy length is always `min(source, capacity)`, computed before the
//! first write. Slots past the copied range keep whatever they held before.

/// Bytes per LED word in a channel buffer.
pub const WORD_SIZE: usize = 4;

/// Copies packed little-endian color bytes into `dest`.
///
/// Returns the number of bytes copied. A trailing partial word replaces only
/// the low-order bytes it covers.
pub fn transfer(dest: &mut [u32], src: &[u8]) -> usize {
    let len = src.len().min(dest.len() * WORD_SIZE);
    let src = &src[..len];

    let mut words = src.chunks_exact(WORD_SIZE);
    for (slot, chunk) in dest.iter_mut().zip(&mut words) {
        *slot = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let tail = words.remainder();
    if !tail.is_empty()
        && let Some(slot) = dest.get_mut(len / WORD_SIZE)
    {
        let mut bytes = slot.to_le_bytes();
        bytes[..tail.len()].copy_from_slice(tail);
        *slot = u32::from_le_bytes(bytes);
    }

    len
}

/// Copies whole color words into `dest`, returning the number copied.
pub fn transfer_words(dest: &mut [u32], src: &[u32]) -> usize {
    let len = src.len().min(dest.len());
    dest[..len].copy_from_slice(&src[..len]);
    len
}

/// Serializes color words into the byte layout [`transfer`] expects.
pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const SENTINEL: u32 = 0xDEAD_BEEF;
    const LEDS: usize = 3;

    fn source(len: usize) -> Vec<u8> {
        (1..=len).map(|i| i as u8).collect()
    }

    #[test_case(0; "empty")]
    #[test_case(LEDS * WORD_SIZE - 1; "one byte short")]
    #[test_case(LEDS * WORD_SIZE; "exact")]
    #[test_case(LEDS * WORD_SIZE + 1; "one byte over")]
    #[test_case(LEDS * WORD_SIZE * 4; "far over")]
    fn copies_min_of_source_and_capacity(src_len: usize) {
        let mut dest = [SENTINEL; LEDS];
        let src = source(src_len);

        let copied = transfer(&mut dest, &src);

        let expected = src_len.min(LEDS * WORD_SIZE);
        assert_eq!(copied, expected);

        let mut expected_bytes = [SENTINEL; LEDS].map(u32::to_le_bytes).concat();
        expected_bytes[..expected].copy_from_slice(&src[..expected]);
        assert_eq!(to_bytes(&dest), expected_bytes);
    }

    #[test]
    fn every_length_stays_in_bounds() {
        for src_len in 0..=(LEDS * WORD_SIZE + WORD_SIZE) {
            let mut dest = [SENTINEL; LEDS];
            let copied = transfer(&mut dest, &source(src_len));
            assert_eq!(copied, src_len.min(LEDS * WORD_SIZE), "length {src_len}");
        }
    }

    #[test]
    fn short_source_leaves_tail_untouched() {
        let mut dest = [SENTINEL; LEDS];
        transfer(&mut dest, &to_bytes(&[0x00FF00]));
        assert_eq!(dest, [0x00FF00, SENTINEL, SENTINEL]);
    }

    #[test]
    fn partial_word_only_overwrites_supplied_bytes() {
        let mut dest = [0xAABB_CCDD];
        transfer(&mut dest, &[0x11, 0x22]);
        assert_eq!(dest, [0xAABB_2211]);
    }

    #[test]
    fn zero_capacity_copies_nothing() {
        let mut dest: [u32; 0] = [];
        assert_eq!(transfer(&mut dest, &[1, 2, 3, 4]), 0);
        assert_eq!(transfer_words(&mut dest, &[1]), 0);
    }

    #[test]
    fn words_truncate_to_capacity() {
        let mut dest = [SENTINEL; LEDS];
        assert_eq!(transfer_words(&mut dest, &[1, 2, 3, 4, 5]), LEDS);
        assert_eq!(dest, [1, 2, 3]);

        assert_eq!(transfer_words(&mut dest, &[9]), 1);
        assert_eq!(dest, [9, 2, 3]);
    }
}
