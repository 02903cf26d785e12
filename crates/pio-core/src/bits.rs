//! Bit-field extraction/insertion and the masked/XOR write primitive.

/// A contiguous field inside a 32-bit register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    lsb: u32,
    width: u32,
}

impl BitField {
    /// Creates a field spanning `width` bits starting at bit `lsb`.
    ///
    /// # Panics
    ///
    /// Panics (at compile time for `const` items) when the field is empty or
    /// does not fit into 32 bits.
    #[must_use]
    pub const fn new(lsb: u32, width: u32) -> Self {
        assert!(width > 0, "bit field cannot be empty");
        assert!(lsb + width <= 32, "bit field must fit into a 32-bit word");
        Self { lsb, width }
    }

    /// Least-significant bit position of the field.
    #[must_use]
    pub const fn lsb(self) -> u32 {
        self.lsb
    }

    /// Number of bits in the field.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Largest value the field can hold.
    #[must_use]
    pub const fn max_value(self) -> u32 {
        u32::MAX >> (32 - self.width)
    }

    /// Mask of the field's bits in register position.
    #[must_use]
    pub const fn mask(self) -> u32 {
        self.max_value() << self.lsb
    }

    /// Reads the field out of `word`.
    #[must_use]
    pub const fn extract(self, word: u32) -> u32 {
        (word & self.mask()) >> self.lsb
    }

    /// Returns `word` with the field replaced by `value`.
    ///
    /// Bits of `value` beyond the field width are discarded; every bit outside
    /// the field is preserved.
    #[must_use]
    pub const fn insert(self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value << self.lsb) & self.mask())
    }

    /// Places `value` into an otherwise zero word.
    #[must_use]
    pub const fn place(self, value: u32) -> u32 {
        self.insert(0, value)
    }
}

/// Computes the register value after a masked write.
///
/// Only bits selected by `mask` change. With `xor` set, selected bits are
/// toggled where `bits` is 1 instead of being overwritten.
#[must_use]
pub const fn masked_write_value(old: u32, bits: u32, mask: u32, xor: bool) -> u32 {
    let updated = if xor { (old ^ bits) & mask } else { bits & mask };
    (old & !mask) | updated
}

/// Iterates the indices of set bits in ascending order.
pub fn set_bit_indices(mut word: u32) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if word == 0 {
            return None;
        }
        let index = word.trailing_zeros();
        word &= word - 1;
        Some(index)
    })
}

#[cfg(test)]
mod tests {
    use super::{masked_write_value, set_bit_indices, BitField};
    use proptest::prelude::*;

    #[test]
    fn field_mask_and_max_value() {
        let field = BitField::new(20, 6);
        assert_eq!(field.max_value(), 0x3f);
        assert_eq!(field.mask(), 0x03f0_0000);

        let full = BitField::new(0, 32);
        assert_eq!(full.mask(), u32::MAX);
        assert_eq!(full.extract(0xdead_beef), 0xdead_beef);
    }

    #[test]
    fn insert_leaves_neighbouring_bits_alone() {
        let field = BitField::new(5, 5);
        let word = field.insert(u32::MAX, 0);
        assert_eq!(word, !0x3e0);
        assert_eq!(field.insert(word, 0b10101), !0x3e0 | (0b10101 << 5));
    }

    #[test]
    fn insert_truncates_oversized_values() {
        let field = BitField::new(29, 3);
        assert_eq!(field.place(0xff), 0xe000_0000);
    }

    #[test]
    fn set_bit_indices_walks_lowest_first() {
        let indices: Vec<u32> = set_bit_indices(0x8000_0015).collect();
        assert_eq!(indices, vec![0, 2, 4, 31]);
        assert_eq!(set_bit_indices(0).count(), 0);
    }

    proptest! {
        #[test]
        fn plain_masked_write_matches_formula(old in any::<u32>(), bits in any::<u32>(), mask in any::<u32>()) {
            let value = masked_write_value(old, bits, mask, false);
            prop_assert_eq!(value, (old & !mask) | (bits & mask));
            prop_assert_eq!(masked_write_value(value, bits, mask, false), value);
        }

        #[test]
        fn xor_masked_write_is_an_involution(old in any::<u32>(), bits in any::<u32>(), mask in any::<u32>()) {
            let once = masked_write_value(old, bits, mask, true);
            prop_assert_eq!(once & !mask, old & !mask);
            prop_assert_eq!(masked_write_value(once, bits, mask, true), old);
        }

        #[test]
        fn extract_inverts_insert(lsb in 0_u32..32, word in any::<u32>(), value in any::<u32>()) {
            let width = 32 - lsb;
            let field = BitField::new(lsb, width.min(7));
            let updated = field.insert(word, value);
            prop_assert_eq!(field.extract(updated), value & field.max_value());
            prop_assert_eq!(updated & !field.mask(), word & !field.mask());
        }
    }
}
