use std::cmp::Ordering;

/// The numeric type an instrument was declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberKind {
    I64,
    U64,
    F64,
}

/// A raw 64-bit measurement value.
///
/// The bits are interpreted according to the [`NumberKind`] of the instrument that produced
/// them, so a `Number` on its own does not know whether it holds an integer or a float.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Number(u64);

impl Number {
    pub const fn from_raw(bits: u64) -> Self {
        Number(bits)
    }

    pub const fn from_i64(value: i64) -> Self {
        Number(value as u64)
    }

    pub const fn from_u64(value: u64) -> Self {
        Number(value)
    }

    pub fn from_f64(value: f64) -> Self {
        Number(value.to_bits())
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }

    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Normalizes the value to a float before it is handed to a sink.
    ///
    /// Integers are widened to the nearest representable `f64`, floats pass through.
    pub fn to_f64(self, kind: NumberKind) -> f64 {
        match kind {
            NumberKind::F64 => self.as_f64(),
            NumberKind::I64 => self.as_i64() as f64,
            NumberKind::U64 => self.as_u64() as f64,
        }
    }

    /// Adds `other` to `self`, interpreting both as `kind`. Integer addition wraps.
    pub fn add(self, kind: NumberKind, other: Number) -> Number {
        match kind {
            NumberKind::F64 => Number::from_f64(self.as_f64() + other.as_f64()),
            NumberKind::I64 => Number::from_i64(self.as_i64().wrapping_add(other.as_i64())),
            NumberKind::U64 => Number::from_u64(self.as_u64().wrapping_add(other.as_u64())),
        }
    }

    pub fn compare(self, kind: NumberKind, other: Number) -> Ordering {
        match kind {
            NumberKind::F64 => self.as_f64().total_cmp(&other.as_f64()),
            NumberKind::I64 => self.as_i64().cmp(&other.as_i64()),
            NumberKind::U64 => self.as_u64().cmp(&other.as_u64()),
        }
    }
}
