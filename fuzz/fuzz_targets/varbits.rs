#![no_main]

use libfuzzer_sys::fuzz_target;
use vcd::{BitView, VarBit};

fuzz_target!(|input: (u16, Vec<u8>)| {
    let (bits, data) = input;
    let bits = bits as usize;
    if bits == 0 || bits > data.len() * 8 {
        return;
    }
    let view = BitView::new(&data, bits);
    let vb = VarBit::new(view);
    assert_eq!(vb.bit_length(), bits);
    for i in 0..bits {
        assert_eq!(vb.bit(i), view.bit(i));
    }
    assert_eq!(vb.to_bit_string(), view.to_bit_string());
});
