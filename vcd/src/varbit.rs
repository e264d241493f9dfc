use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::bitview::{byte_length_for, BitView};

/// Values up to this many bits are stored inline without allocating.
pub const INLINE_BITS: usize = 56;
const INLINE_BYTES: usize = INLINE_BITS / 8;

/// An owned bit string of 1 or more bits.
///
/// Nearly all signals are a handful of bits wide and single bit signals are
/// by far the most common, so those are stored without any allocation:
///
/// | Bits   | Storage                          |
/// |--------|----------------------------------|
/// | 1      | `Bit` - just a bool              |
/// | 2..=56 | `Inline` - 7 byte array + length |
/// | >56    | `Heap` - boxed bytes + length    |
///
/// Unused bits in the last byte are always zero, so two `VarBit`s with the
/// same bits compare equal whatever buffer they were built from.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum VarBit {
    Bit(bool),
    Inline { len: u8, buf: [u8; INLINE_BYTES] },
    Heap { len: u32, buf: Box<[u8]> },
}

impl VarBit {
    /// Copy the bits out of `bv`.
    ///
    /// # Panics
    ///
    /// Panics if `bv` is empty or longer than `u32::MAX` bits.
    pub fn new(bv: BitView<'_>) -> Self {
        let bits = bv.bit_length();
        assert!(bits > 0, "VarBit must have at least one bit");

        if bits == 1 {
            return VarBit::Bit(bv.data()[0] & 1 != 0);
        }

        if bits <= INLINE_BITS {
            let mut buf = [0; INLINE_BYTES];
            buf[..bv.byte_length()].copy_from_slice(bv.data());
            mask_top_byte(&mut buf[..bv.byte_length()], bits);
            VarBit::Inline {
                len: bits as u8,
                buf,
            }
        } else {
            assert!(bits <= u32::MAX as usize, "VarBit of {bits} bits is too long");
            let mut buf: Box<[u8]> = bv.data().into();
            mask_top_byte(&mut buf, bits);
            VarBit::Heap {
                len: bits as u32,
                buf,
            }
        }
    }

    pub fn from_bool(bit: bool) -> Self {
        VarBit::Bit(bit)
    }

    /// Build from the bottom `bits` bits of `value`.
    pub fn from_u64(value: u64, bits: usize) -> Self {
        assert!(bits <= 64);
        let bytes = value.to_le_bytes();
        Self::new(BitView::new(&bytes, bits))
    }

    pub fn data(&self) -> &[u8] {
        match self {
            VarBit::Bit(false) => &[0u8],
            VarBit::Bit(true) => &[1u8],
            VarBit::Inline { len, buf } => &buf[..byte_length_for(*len as usize)],
            VarBit::Heap { buf, .. } => buf,
        }
    }

    pub fn bit_length(&self) -> usize {
        match self {
            VarBit::Bit(_) => 1,
            VarBit::Inline { len, .. } => *len as usize,
            VarBit::Heap { len, .. } => *len as usize,
        }
    }

    pub fn byte_length(&self) -> usize {
        byte_length_for(self.bit_length())
    }

    pub fn bit_view(&self) -> BitView<'_> {
        BitView::new(self.data(), self.bit_length())
    }

    /// Get bit `index` (0 = least significant).
    pub fn bit(&self, index: usize) -> bool {
        self.bit_view().bit(index)
    }

    pub fn is_heap(&self) -> bool {
        matches!(self, VarBit::Heap { .. })
    }

    pub fn is_zero(&self) -> bool {
        self.data().iter().all(|b| *b == 0)
    }

    /// The value as an integer, if it fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            VarBit::Bit(b) => Some(*b as u64),
            _ if self.bit_length() <= 64 => Some(LittleEndian::read_uint(
                self.data(),
                self.byte_length(),
            )),
            _ => None,
        }
    }

    pub fn to_bit_string(&self) -> String {
        self.bit_view().to_bit_string()
    }
}

fn mask_top_byte(buf: &mut [u8], bits: usize) {
    let used = bits % 8;
    if used != 0 {
        if let Some(last) = buf.last_mut() {
            *last &= (1u8 << used) - 1;
        }
    }
}

impl From<BitView<'_>> for VarBit {
    fn from(bv: BitView<'_>) -> Self {
        Self::new(bv)
    }
}

impl fmt::Debug for VarBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<VarBit[{}] {}>", self.bit_length(), self.to_bit_string())
    }
}

impl fmt::Display for VarBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_bits(rng: &mut StdRng, bits: usize) -> Vec<u8> {
        let mut data = vec![0u8; byte_length_for(bits)];
        rng.fill(&mut data[..]);
        // Keep unused bits clear so we can compare bytes directly.
        mask_top_byte(&mut data, bits);
        data
    }

    fn check_round_trip(rng: &mut StdRng, bits: usize) {
        let data = random_bits(rng, bits);
        let vb = VarBit::new(BitView::new(&data, bits));
        assert_eq!(vb.bit_length(), bits);
        assert_eq!(vb.byte_length(), data.len());
        assert_eq!(vb.data(), &data[..]);
        assert_eq!(vb.bit_view(), BitView::new(&data, bits));
    }

    #[test]
    fn test_round_trip_inline() {
        let mut rng = StdRng::seed_from_u64(1);
        for bits in 1..=INLINE_BITS {
            for _ in 0..20 {
                check_round_trip(&mut rng, bits);
            }
        }
    }

    #[test]
    fn test_round_trip_heap() {
        let mut rng = StdRng::seed_from_u64(2);
        for bits in INLINE_BITS + 1..=300 {
            for _ in 0..5 {
                check_round_trip(&mut rng, bits);
            }
        }
    }

    #[test]
    fn test_inline_heap_boundary() {
        let data = [0xA5; 8];
        let vb56 = VarBit::new(BitView::new(&data, 56));
        assert!(matches!(vb56, VarBit::Inline { len: 56, .. }));
        assert!(!vb56.is_heap());

        let vb57 = VarBit::new(BitView::new(&data, 57));
        assert!(matches!(vb57, VarBit::Heap { len: 57, .. }));
        assert!(vb57.is_heap());
        assert_eq!(vb57.byte_length(), 8);
        assert_eq!(vb57.data()[7], 0x01);
    }

    #[test]
    fn test_single_bit() {
        let vb = VarBit::new(BitView::new(&[0xFF], 1));
        assert_eq!(vb, VarBit::Bit(true));
        assert_eq!(vb.data(), &[1]);
        assert_eq!(VarBit::new(BitView::new(&[0xFE], 1)), VarBit::Bit(false));
    }

    #[test]
    fn test_unused_bits_are_cleared() {
        let a = VarBit::new(BitView::new(&[0xFA], 4));
        let b = VarBit::new(BitView::new(&[0x0A], 4));
        assert_eq!(a, b);
        assert_eq!(a.data(), &[0x0A]);
    }

    #[test]
    fn test_clone_and_drop() {
        let data = vec![0x5Au8; 40];
        let vb = VarBit::new(BitView::new(&data, 320));
        let copy = vb.clone();
        drop(vb);
        assert_eq!(copy.data(), &data[..]);
        let all: Vec<VarBit> = (1..=100)
            .map(|bits| VarBit::new(BitView::new(&data, bits)))
            .collect();
        drop(all);
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(VarBit::from_u64(0b101, 3).to_u64(), Some(5));
        assert_eq!(VarBit::from_bool(true).to_u64(), Some(1));
        assert_eq!(VarBit::from_u64(u64::MAX, 64).to_u64(), Some(u64::MAX));
        let wide = VarBit::new(BitView::new(&[0xFF; 9], 65));
        assert_eq!(wide.to_u64(), None);
    }

    #[test]
    fn test_is_zero() {
        assert!(VarBit::from_bool(false).is_zero());
        assert!(!VarBit::from_bool(true).is_zero());
        assert!(VarBit::from_u64(0, 40).is_zero());
        // Bits above the length don't count.
        assert!(VarBit::new(BitView::new(&[0xF0], 4)).is_zero());
        let mut data = vec![0u8; 20];
        assert!(VarBit::new(BitView::new(&data, 160)).is_zero());
        data[19] = 0x80;
        assert!(!VarBit::new(BitView::new(&data, 160)).is_zero());
    }

    #[test]
    fn test_format() {
        let buf = 0b1010u64.to_le_bytes();
        let vb = VarBit::new(BitView::new(&buf, 4));
        assert_eq!(format!("{vb:?}"), "<VarBit[4] 1010>");
        assert_eq!(vb.to_string(), "1010");
    }

    #[test]
    #[should_panic]
    fn test_zero_length_rejected() {
        VarBit::new(BitView::new(&[], 0));
    }
}
