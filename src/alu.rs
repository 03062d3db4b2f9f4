/// # arithmetic engine
///
/// The source machine adds four bits at a time and has no add-with-carry:
/// the only carry information is an overflow flag on the last plain add. A
/// 16-bit sum is therefore built from four nibble adds with the carry walked
/// forward by hand, as a +1 applied to the next operand digit *before* its
/// real add. That pre-add can overflow on its own (carry into a digit that
/// is already 15), so every digit above the first gets two overflow checks.
/// This module keeps that structure on purpose; collapsing it into a native
/// u16 add would make the digit-level carry chain untestable.
use crate::dispatch::{DispatchFault, Slot};

/// the machine's only native value width: an integer in [0, 15]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nibble(u8);

impl Nibble {
    pub const ZERO: Nibble = Nibble(0);
    pub const ONE: Nibble = Nibble(1);
    pub const MAX: Nibble = Nibble(0xf);

    pub fn new(value: u8) -> Nibble {
        assert!(value <= 0xf, "nibble must be in 0..=15");
        Nibble(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// wrapping add with carry-out: true iff the mathematical sum is >= 16
    pub fn add(self, rhs: Nibble) -> (Nibble, bool) {
        let sum = self.0 + rhs.0;
        (Nibble(sum & 0xf), sum > 0xf)
    }

    /// ones' complement within the nibble
    pub fn invert(self) -> Nibble {
        Nibble(0xf - self.0)
    }
}

/// a 16-bit two's-complement value as four nibbles, little-nibble-first
/// (digit 0 is least significant)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word16 {
    digits: [Nibble; 4],
}

impl Word16 {
    pub const ZERO: Word16 = Word16 {
        digits: [Nibble::ZERO; 4],
    };

    pub fn new(digits: [Nibble; 4]) -> Word16 {
        Word16 { digits }
    }

    pub fn from_u16(value: u16) -> Word16 {
        Word16 {
            digits: [
                Nibble((value & 0xf) as u8),
                Nibble(((value >> 4) & 0xf) as u8),
                Nibble(((value >> 8) & 0xf) as u8),
                Nibble(((value >> 12) & 0xf) as u8),
            ],
        }
    }

    /// digit0 + 16*digit1 + 256*digit2 + 4096*digit3
    pub fn to_u16(self) -> u16 {
        (self.digits[0].0 as u16)
            + ((self.digits[1].0 as u16) << 4)
            + ((self.digits[2].0 as u16) << 8)
            + ((self.digits[3].0 as u16) << 12)
    }

    pub fn digit(self, i: usize) -> Nibble {
        self.digits[i]
    }

    pub fn set_digit(&mut self, i: usize, d: Nibble) {
        self.digits[i] = d;
    }

    /// ones' complement of all four digits
    pub fn invert(self) -> Word16 {
        Word16 {
            digits: [
                self.digits[0].invert(),
                self.digits[1].invert(),
                self.digits[2].invert(),
                self.digits[3].invert(),
            ],
        }
    }
}

/// return tokens for the shared add-and-latch-overflow step; one call site
/// per digit add plus one per carry-fix pre-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddReturn {
    DigitAdd(usize),
    CarryFix(usize),
}

/// Chained 16-bit adder. Owns the scratch carry flag and the continuation
/// slot for its internal shared step; neither survives between unrelated
/// operations.
pub struct Alu {
    carry: bool,
    slot: Slot<AddReturn>,
}

impl Alu {
    pub fn new() -> Self {
        Alu {
            carry: false,
            slot: Slot::new(),
        }
    }

    /// shared step: add two nibbles, latch an overflow into the carry flag,
    /// then dispatch through the slot the call site armed
    fn add_step(&mut self, x: Nibble, y: Nibble) -> Result<(Nibble, AddReturn), DispatchFault> {
        let (sum, overflow) = x.add(y);
        if overflow {
            self.carry = true;
        }
        let k = self.slot.resume()?;
        Ok((sum, k))
    }

    /// 16-bit wraparound sum; the carry out of digit 3 is discarded
    pub fn add16(&mut self, a: Word16, b: Word16) -> Result<Word16, DispatchFault> {
        // scratch carry must not leak in from an earlier operation
        self.carry = false;
        let mut out = Word16::ZERO;

        // digit 0 has no carry in
        self.slot.arm(AddReturn::DigitAdd(0));
        let (sum, k) = self.add_step(a.digit(0), b.digit(0))?;
        match k {
            AddReturn::DigitAdd(i) => out.set_digit(i, sum),
            AddReturn::CarryFix(_) => return Err(DispatchFault),
        }

        for i in 1..4 {
            // stage this digit's own return before anything else runs
            self.slot.arm(AddReturn::DigitAdd(i));

            let mut x = a.digit(i);
            if self.carry {
                // consume the incoming carry by pre-incrementing the operand.
                // The increment re-enters the shared step, so the staged
                // DigitAdd token has to be parked first.
                self.carry = false;
                let outer = self.slot.save();
                self.slot.arm(AddReturn::CarryFix(i));
                let (fixed, k) = self.add_step(x, Nibble::ONE)?;
                x = match k {
                    // a digit at 15 wraps to 0 here and re-raises the carry
                    AddReturn::CarryFix(_) => fixed,
                    AddReturn::DigitAdd(_) => return Err(DispatchFault),
                };
                self.slot.restore(outer);
            }

            let (sum, k) = self.add_step(x, b.digit(i))?;
            match k {
                AddReturn::DigitAdd(j) => out.set_digit(j, sum),
                AddReturn::CarryFix(_) => return Err(DispatchFault),
            }
        }

        Ok(out)
    }

    /// a - b, as a + (two's complement of b)
    pub fn sub16(&mut self, a: Word16, b: Word16) -> Result<Word16, DispatchFault> {
        let negated = self.add16(b.invert(), Word16::from_u16(1))?;
        self.add16(a, negated)
    }
}

impl Default for Alu {
    fn default() -> Self {
        Alu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_add_no_carry() {
        let (sum, carry) = Nibble::new(6).add(Nibble::new(7));
        assert_eq!(sum, Nibble::new(13));
        assert!(!carry);
    }

    #[test]
    fn test_nibble_add_wraps_with_carry() {
        let (sum, carry) = Nibble::new(15).add(Nibble::new(1));
        assert_eq!(sum, Nibble::ZERO);
        assert!(carry);
    }

    #[test]
    #[should_panic]
    fn test_nibble_rejects_wide_value() {
        let _ = Nibble::new(16);
    }

    #[test]
    fn test_word16_digit_order() {
        // little-nibble-first: digit 0 is the least significant
        let w = Word16::from_u16(0x1234);
        assert_eq!(w.digit(0), Nibble::new(4));
        assert_eq!(w.digit(1), Nibble::new(3));
        assert_eq!(w.digit(2), Nibble::new(2));
        assert_eq!(w.digit(3), Nibble::new(1));
    }

    #[test]
    fn test_word16_round_trip() {
        for v in [0x0000u16, 0x0002, 0x00ff, 0x0fff, 0x8000, 0xffff] {
            assert_eq!(Word16::from_u16(v).to_u16(), v);
        }
    }

    #[test]
    fn test_add16_double_overflow_digits() -> Result<(), DispatchFault> {
        // 0x0fff + 0x0001: digits 1 and 2 take a carry while already at 15,
        // so the pre-increment itself overflows and must re-raise the carry
        let mut alu = Alu::new();
        let sum = alu.add16(Word16::from_u16(0x0fff), Word16::from_u16(0x0001))?;
        assert_eq!(sum.digit(0), Nibble::ZERO);
        assert_eq!(sum.digit(1), Nibble::ZERO);
        assert_eq!(sum.digit(2), Nibble::ZERO);
        assert_eq!(sum.digit(3), Nibble::ONE);
        Ok(())
    }

    #[test]
    fn test_add16_carry_survives_non_overflowing_real_add() -> Result<(), DispatchFault> {
        // digit 1 of a is 15; the fix wraps it to 0 and the following real
        // add (0 + 0) must not clear the re-raised carry
        let mut alu = Alu::new();
        let sum = alu.add16(Word16::from_u16(0x00ff), Word16::from_u16(0x0001))?;
        assert_eq!(sum.to_u16(), 0x0100);
        Ok(())
    }

    #[test]
    fn test_add16_wraps_past_16_bits() -> Result<(), DispatchFault> {
        let mut alu = Alu::new();
        let sum = alu.add16(Word16::from_u16(0xffff), Word16::from_u16(0x0001))?;
        assert_eq!(sum.to_u16(), 0x0000);
        Ok(())
    }

    #[test]
    fn test_add16_carry_does_not_leak_between_operations() -> Result<(), DispatchFault> {
        let mut alu = Alu::new();
        // leaves a discarded carry out of digit 3
        let _ = alu.add16(Word16::from_u16(0xffff), Word16::from_u16(0xffff))?;
        let sum = alu.add16(Word16::from_u16(0x0001), Word16::from_u16(0x0001))?;
        assert_eq!(sum.to_u16(), 0x0002);
        Ok(())
    }

    #[test]
    fn test_add16_matches_native_addition() -> Result<(), DispatchFault> {
        let mut alu = Alu::new();
        // dense stride over the full range on both operands
        for a in (0..=0xffffu16).step_by(251) {
            for b in (0..=0xffffu16).step_by(499) {
                let sum = alu.add16(Word16::from_u16(a), Word16::from_u16(b))?;
                assert_eq!(sum.to_u16(), a.wrapping_add(b), "{:#06x} + {:#06x}", a, b);
            }
        }
        Ok(())
    }

    #[test]
    fn test_sub16_matches_native_subtraction() -> Result<(), DispatchFault> {
        let mut alu = Alu::new();
        for a in (0..=0xffffu16).step_by(509) {
            for b in (0..=0xffffu16).step_by(251) {
                let diff = alu.sub16(Word16::from_u16(a), Word16::from_u16(b))?;
                assert_eq!(diff.to_u16(), a.wrapping_sub(b), "{:#06x} - {:#06x}", a, b);
            }
        }
        Ok(())
    }

    #[test]
    fn test_sub16_borrows_through_zero() -> Result<(), DispatchFault> {
        let mut alu = Alu::new();
        let diff = alu.sub16(Word16::from_u16(0x0000), Word16::from_u16(0x0001))?;
        assert_eq!(diff.to_u16(), 0xffff);
        Ok(())
    }
}
