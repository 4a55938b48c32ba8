//! Value types that can be traced
//!
//! Every traceable value implements [`SimValue`], which fixes its bit width
//! and how its current value is written to a trace file. The crate ships the
//! primitive Rust scalars, [`SimTime`], the two scalar bit types [`Bit`] and
//! [`Logic`], the narrow fixed-width integers [`UInt`] and [`Int`]
//! (1 to 64 bits) and the wide families in [`wide`].

mod wide;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

pub use wide::{BigInt, BigUInt, BitVector, LogicVector};

/// A sampled value as handed to a trace file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TraceValue {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Real(f64),
    Time(SimTime),
    /// Most significant bit first, one of `0`, `1`, `x`, `z` per bit
    Bits(String),
}

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceValue::Bool(v) => write!(f, "{}", u8::from(*v)),
            TraceValue::Signed(v) => write!(f, "{}", v),
            TraceValue::Unsigned(v) => write!(f, "{}", v),
            TraceValue::Real(v) => write!(f, "{}", v),
            TraceValue::Time(v) => write!(f, "{}", v),
            TraceValue::Bits(v) => write!(f, "b{}", v),
        }
    }
}

/// A value type the tracer can attach to
pub trait SimValue: Clone + fmt::Debug + 'static {
    /// Width in bits as registered with the trace file
    const WIDTH: usize;

    /// Whether the type may appear as a standalone traceable object.
    /// Primitive scalars only ever appear inside ports, signals and variables.
    const IS_CLASS: bool = true;

    fn type_name() -> String;

    fn trace_value(&self) -> TraceValue;
}

macro_rules! primitive_value {
    ($($ty:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl SimValue for $ty {
                const WIDTH: usize = <$ty>::BITS as usize;
                const IS_CLASS: bool = false;

                fn type_name() -> String {
                    stringify!($ty).to_string()
                }

                fn trace_value(&self) -> TraceValue {
                    TraceValue::$variant(<$conv>::from(*self))
                }
            }
        )*
    };
}

primitive_value!(
    i8 => Signed as i64,
    u8 => Unsigned as u64,
    i16 => Signed as i64,
    u16 => Unsigned as u64,
    i32 => Signed as i64,
    u32 => Unsigned as u64,
    i64 => Signed as i64,
    u64 => Unsigned as u64,
);

impl SimValue for bool {
    const WIDTH: usize = 1;
    const IS_CLASS: bool = false;

    fn type_name() -> String {
        "bool".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Bool(*self)
    }
}

// isize/usize are at most 64 bits on every supported target
impl SimValue for isize {
    const WIDTH: usize = isize::BITS as usize;
    const IS_CLASS: bool = false;

    fn type_name() -> String {
        "isize".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Signed(*self as i64)
    }
}

impl SimValue for usize {
    const WIDTH: usize = usize::BITS as usize;
    const IS_CLASS: bool = false;

    fn type_name() -> String {
        "usize".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Unsigned(*self as u64)
    }
}

impl SimValue for f32 {
    const WIDTH: usize = 32;
    const IS_CLASS: bool = false;

    fn type_name() -> String {
        "f32".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Real(f64::from(*self))
    }
}

impl SimValue for f64 {
    const WIDTH: usize = 64;
    const IS_CLASS: bool = false;

    fn type_name() -> String {
        "f64".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Real(*self)
    }
}

impl SimValue for SimTime {
    const WIDTH: usize = 64;

    fn type_name() -> String {
        "SimTime".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Time(*self)
    }
}

/// Two-state single bit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Bit(pub bool);

impl SimValue for Bit {
    const WIDTH: usize = 1;

    fn type_name() -> String {
        "Bit".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Bits(if self.0 { "1" } else { "0" }.to_string())
    }
}

/// Four-state single bit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Logic {
    Zero,
    One,
    #[default]
    X,
    Z,
}

impl Logic {
    pub fn as_char(self) -> char {
        match self {
            Logic::Zero => '0',
            Logic::One => '1',
            Logic::X => 'x',
            Logic::Z => 'z',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' => Some(Logic::X),
            'z' | 'Z' => Some(Logic::Z),
            _ => None,
        }
    }
}

impl From<bool> for Logic {
    fn from(v: bool) -> Self {
        if v {
            Logic::One
        } else {
            Logic::Zero
        }
    }
}

impl SimValue for Logic {
    const WIDTH: usize = 1;

    fn type_name() -> String {
        "Logic".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Bits(self.as_char().to_string())
    }
}

fn low_mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Unsigned integer of `W` bits, 1 to 64. Values are truncated to `W` bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UInt<const W: usize>(u64);

impl<const W: usize> UInt<W> {
    const VALID: () = assert!(W >= 1 && W <= 64, "UInt width must be in 1..=64");

    pub fn new(value: u64) -> Self {
        let () = Self::VALID;
        Self(value & low_mask(W))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl<const W: usize> SimValue for UInt<W> {
    const WIDTH: usize = W;

    fn type_name() -> String {
        format!("UInt<{}>", W)
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Unsigned(self.0)
    }
}

/// Signed integer of `W` bits, 1 to 64. Values wrap to `W` bits with sign
/// extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Int<const W: usize>(i64);

impl<const W: usize> Int<W> {
    const VALID: () = assert!(W >= 1 && W <= 64, "Int width must be in 1..=64");

    pub fn new(value: i64) -> Self {
        let () = Self::VALID;
        let shift = 64 - W as u32;
        Self((((value as u64) << shift) as i64) >> shift)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl<const W: usize> SimValue for Int<W> {
    const WIDTH: usize = W;

    fn type_name() -> String {
        format!("Int<{}>", W)
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Signed(self.0)
    }
}
