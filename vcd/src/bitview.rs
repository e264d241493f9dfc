use std::fmt;

/// A borrowed run of bits. Bit `i` is bit `i % 8` of byte `i / 8`, so the
/// least significant bit of the value is the lowest bit of the first byte.
/// Any bits in the last byte above `bit_length` are ignored.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BitView<'a> {
    data: &'a [u8],
    bit_length: usize,
}

impl<'a> BitView<'a> {
    /// # Panics
    ///
    /// Panics if `bit_length` needs more bytes than `data` has.
    pub fn new(data: &'a [u8], bit_length: usize) -> Self {
        assert!(
            bit_length <= data.len() * 8,
            "BitView of {bit_length} bits over {} bytes",
            data.len()
        );
        // Only keep the bytes we actually use so `data()` is always
        // `byte_length()` long.
        Self {
            data: &data[..byte_length_for(bit_length)],
            bit_length,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn bit_length(&self) -> usize {
        self.bit_length
    }

    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bit_length == 0
    }

    /// Get bit `index` (0 = least significant).
    pub fn bit(&self, index: usize) -> bool {
        assert!(index < self.bit_length, "bit {index} out of range");
        (self.data[index / 8] >> (index % 8)) & 1 != 0
    }

    /// Render as `0`/`1` characters, most significant bit first.
    pub fn to_bit_string(&self) -> String {
        bits_to_string(self.data, self.bit_length)
    }
}

impl fmt::Debug for BitView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<BitView[{}] {}>", self.bit_length, self.to_bit_string())
    }
}

pub(crate) fn byte_length_for(bit_length: usize) -> usize {
    (bit_length + 7) / 8
}

// Multiplying a byte by this copies it into every byte lane, shifted so that
// lane `k` has bit `7 - k` of the input at its top bit. The copies are 9 bits
// apart so they never carry into each other.
const SPREAD_MAGIC: u64 = 0x8040_2010_0804_0201;
const SPREAD_MASK: u64 = 0x8080_8080_8080_8080;
const ASCII_ZEROS: u128 = 0x3030_3030_3030_3030_3030_3030_3030_3030;

/// Spread the 8 bits of `byte` into 8 byte lanes (each 0 or 1), MSB in the
/// lowest lane.
#[inline]
fn spread_byte(byte: u8) -> u64 {
    ((byte as u64).wrapping_mul(SPREAD_MAGIC) & SPREAD_MASK) >> 7
}

/// Render the bottom `bit_length` bits of `data` MSB first.
///
/// The bulk of the work is done two bytes at a time: each byte is spread into
/// a 64-bit half of a 128-bit lane and an ASCII '0' added to every lane, which
/// gives 16 characters without a branch per bit. An odd byte left over at the
/// end is done bit by bit.
pub fn bits_to_string(data: &[u8], bit_length: usize) -> String {
    let byte_length = byte_length_for(bit_length);
    assert!(byte_length <= data.len());

    if bit_length == 0 {
        return String::new();
    }

    let mut s = String::with_capacity(byte_length * 8);

    // Most significant byte is last, so walk backwards.
    let mut remaining = byte_length;
    while remaining >= 2 {
        let hi = data[remaining - 1];
        let lo = data[remaining - 2];
        let lanes = (spread_byte(hi) as u128) | ((spread_byte(lo) as u128) << 64);
        let ascii = lanes + ASCII_ZEROS;
        s.extend(ascii.to_le_bytes().iter().map(|&c| c as char));
        remaining -= 2;
    }
    if remaining == 1 {
        let byte = data[0];
        for j in (0..8).rev() {
            s.push(if (byte >> j) & 1 != 0 { '1' } else { '0' });
        }
    }

    // The top byte may only be partially used.
    let unused = byte_length * 8 - bit_length;
    s.drain(..unused);
    s
}
