//! Arbitrary-width integer and bit-vector values
//!
//! Storage is a `bitvec` vector of exactly `W` bits, bit 0 least
//! significant. Two-state types hold one vector; [`LogicVector`] holds a
//! value and a control vector per bit.

use std::fmt;

use bitvec::prelude::*;

use super::{Logic, SimValue, TraceValue};

type Bits = BitVec<u64, Lsb0>;

fn bits_from_u64(width: usize, value: u64, fill: bool) -> Bits {
    let mut bits = Bits::repeat(fill, width);
    for i in 0..width.min(64) {
        bits.set(i, (value >> i) & 1 == 1);
    }
    bits
}

fn bits_to_u64(bits: &BitSlice<u64, Lsb0>) -> u64 {
    bits.iter()
        .by_vals()
        .take(64)
        .enumerate()
        .fold(0, |acc, (i, bit)| acc | (u64::from(bit) << i))
}

fn msb_first(bits: &BitSlice<u64, Lsb0>) -> String {
    (0..bits.len())
        .rev()
        .map(|i| if bits[i] { '1' } else { '0' })
        .collect()
}

/// Parses an MSB-first `0`/`1` string. Shorter strings are zero-extended,
/// longer ones keep their low `width` bits.
fn parse_two_state(width: usize, text: &str) -> Option<Bits> {
    let mut bits = Bits::repeat(false, width);
    for (i, c) in text.chars().rev().enumerate() {
        let bit = match c {
            '0' => false,
            '1' => true,
            _ => return None,
        };
        if i < width {
            bits.set(i, bit);
        }
    }
    Some(bits)
}

macro_rules! two_state_vector {
    ($(#[$meta:meta])* $name:ident, $label:literal, signed = $signed:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name<const W: usize> {
            bits: Bits,
        }

        impl<const W: usize> $name<W> {
            const VALID: () = assert!(W >= 1, "vector width must be at least 1");

            pub fn zero() -> Self {
                let () = Self::VALID;
                Self { bits: Bits::repeat(false, W) }
            }

            pub fn from_u64(value: u64) -> Self {
                let () = Self::VALID;
                Self { bits: bits_from_u64(W, value, false) }
            }

            /// Parse an MSB-first binary string
            pub fn from_bit_str(text: &str) -> Option<Self> {
                let () = Self::VALID;
                parse_two_state(W, text).map(|bits| Self { bits })
            }

            pub fn bit(&self, index: usize) -> bool {
                self.bits.get(index).map(|b| *b).unwrap_or(false)
            }

            pub fn set_bit(&mut self, index: usize, value: bool) {
                if index < W {
                    self.bits.set(index, value);
                }
            }

            /// Low 64 bits
            pub fn low_u64(&self) -> u64 {
                bits_to_u64(&self.bits)
            }

            pub fn to_bit_string(&self) -> String {
                msb_first(&self.bits)
            }

            pub fn is_signed() -> bool {
                $signed
            }
        }

        impl<const W: usize> Default for $name<W> {
            fn default() -> Self {
                Self::zero()
            }
        }

        impl<const W: usize> fmt::Debug for $name<W> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{}>(0b{})", $label, W, self.to_bit_string())
            }
        }

        impl<const W: usize> SimValue for $name<W> {
            const WIDTH: usize = W;

            fn type_name() -> String {
                format!("{}<{}>", $label, W)
            }

            fn trace_value(&self) -> TraceValue {
                TraceValue::Bits(self.to_bit_string())
            }
        }
    };
}

two_state_vector!(
    /// Arbitrary-precision unsigned integer of `W` bits
    BigUInt, "BigUInt", signed = false
);
two_state_vector!(
    /// Arbitrary-precision signed integer of `W` bits (two's complement)
    BigInt, "BigInt", signed = true
);
two_state_vector!(
    /// Packed two-state bit vector of `W` bits
    BitVector, "BitVector", signed = false
);

impl<const W: usize> BigInt<W> {
    /// Sign-extends `value` across all `W` bits
    pub fn from_i64(value: i64) -> Self {
        let () = Self::VALID;
        Self {
            bits: bits_from_u64(W, value as u64, value < 0),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.bit(W - 1)
    }
}

/// Packed four-state bit vector of `W` bits
///
/// Per bit, `(value, control)` encodes `0` = (0,0), `1` = (1,0),
/// `z` = (0,1), `x` = (1,1). A new vector is all `x`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LogicVector<const W: usize> {
    value: Bits,
    control: Bits,
}

impl<const W: usize> LogicVector<W> {
    const VALID: () = assert!(W >= 1, "LogicVector width must be at least 1");

    pub fn new() -> Self {
        Self::filled(Logic::X)
    }

    pub fn filled(logic: Logic) -> Self {
        let () = Self::VALID;
        let (value, control) = Self::encode(logic);
        Self {
            value: Bits::repeat(value, W),
            control: Bits::repeat(control, W),
        }
    }

    pub fn from_u64(value: u64) -> Self {
        let () = Self::VALID;
        Self {
            value: bits_from_u64(W, value, false),
            control: Bits::repeat(false, W),
        }
    }

    /// Parse an MSB-first string of `0`, `1`, `x` and `z`. Shorter strings
    /// are zero-extended.
    pub fn from_logic_str(text: &str) -> Option<Self> {
        let mut vector = Self::filled(Logic::Zero);
        for (i, c) in text.chars().rev().enumerate() {
            let logic = Logic::from_char(c)?;
            vector.set(i, logic);
        }
        Some(vector)
    }

    fn encode(logic: Logic) -> (bool, bool) {
        match logic {
            Logic::Zero => (false, false),
            Logic::One => (true, false),
            Logic::Z => (false, true),
            Logic::X => (true, true),
        }
    }

    pub fn get(&self, index: usize) -> Logic {
        match (self.value.get(index).map(|b| *b), self.control.get(index).map(|b| *b)) {
            (Some(false), Some(false)) => Logic::Zero,
            (Some(true), Some(false)) => Logic::One,
            (Some(false), Some(true)) => Logic::Z,
            _ => Logic::X,
        }
    }

    pub fn set(&mut self, index: usize, logic: Logic) {
        if index < W {
            let (value, control) = Self::encode(logic);
            self.value.set(index, value);
            self.control.set(index, control);
        }
    }

    /// True when no bit is `x` or `z`
    pub fn is_known(&self) -> bool {
        self.control.not_any()
    }

    pub fn to_logic_string(&self) -> String {
        (0..W).rev().map(|i| self.get(i).as_char()).collect()
    }
}

impl<const W: usize> Default for LogicVector<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> fmt::Debug for LogicVector<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicVector<{}>({})", W, self.to_logic_string())
    }
}

impl<const W: usize> SimValue for LogicVector<W> {
    const WIDTH: usize = W;

    fn type_name() -> String {
        format!("LogicVector<{}>", W)
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Bits(self.to_logic_string())
    }
}
