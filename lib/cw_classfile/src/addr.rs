//! Bytecode address (program counter) representation.

use serde::Serialize;
use std::fmt;

/// A program counter, i.e. a byte offset in a method's code array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl Addr {
    #[inline]
    #[must_use]
    pub const fn entry() -> Self {
        Self(0)
    }

    /// Applies a signed branch offset, as found in `if*`, `goto` or switch
    /// operands. Returns `None` when the result would be negative.
    #[must_use]
    pub const fn offset(self, offset: i32) -> Option<Self> {
        if offset.is_negative() {
            match self.0.checked_sub(offset.unsigned_abs() as usize) {
                Some(a) => Some(Self(a)),
                None => None,
            }
        } else {
            Some(Self(self.0 + offset.unsigned_abs() as usize))
        }
    }

    #[inline]
    #[must_use]
    pub const fn add(self, len: usize) -> Self {
        Self(self.0 + len)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_offsets() {
        assert_eq!(Some(Addr(13)), Addr(10).offset(3));
        assert_eq!(Some(Addr(0)), Addr(10).offset(-10));
        assert_eq!(None, Addr(2).offset(-3));
    }
}
