//! Sequential big-endian reader over a byte buffer.
//!
//! The class structure itself is parsed with nom combinators (see the
//! `parsers` module), but instruction operands are decoded by walking the
//! code array with an explicit cursor: variable-length instructions need to
//! know their own position (switch padding), which is easier to express
//! with a cursor than with slices.

use crate::errors::{ClassError, ClassResult};
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::IResult;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    /// Creates a reader whose cursor starts at `index`.
    #[must_use]
    pub const fn at(data: &'a [u8], index: usize) -> Self {
        Self { data, index }
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.index
    }

    /// Remaining byte count.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.data.len().saturating_sub(self.index)
    }

    fn read_with<T>(
        &mut self,
        size: usize,
        parser: fn(&'a [u8]) -> IResult<&'a [u8], T, ClassError>,
    ) -> ClassResult<T> {
        let truncated = ClassError::Truncated {
            offset: self.index,
            needed: size,
            available: self.available(),
        };
        let Some(input) = self.data.get(self.index..) else {
            return Err(truncated);
        };
        match parser(input) {
            Ok((_, value)) => {
                self.index += size;
                Ok(value)
            }
            Err(_) => Err(truncated),
        }
    }

    pub fn read_u1(&mut self) -> ClassResult<u8> {
        self.read_with(1, be_u8)
    }

    pub fn read_u2(&mut self) -> ClassResult<u16> {
        self.read_with(2, be_u16)
    }

    pub fn read_u4(&mut self) -> ClassResult<u32> {
        self.read_with(4, be_u32)
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i1(&mut self) -> ClassResult<i8> {
        self.read_u1().map(|v| v as i8)
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i2(&mut self) -> ClassResult<i16> {
        self.read_u2().map(|v| v as i16)
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i4(&mut self) -> ClassResult<i32> {
        self.read_u4().map(|v| v as i32)
    }

    /// Skips `count` bytes, failing if fewer remain.
    pub fn skip(&mut self, count: usize) -> ClassResult<()> {
        if self.available() < count {
            return Err(ClassError::Truncated {
                offset: self.index,
                needed: count,
                available: self.available(),
            });
        }
        self.index += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_words() {
        let data = [0xca, 0xfe, 0xba, 0xbe, 0x00, 0x31, 0xff];
        let mut reader = Reader::new(&data);
        assert_eq!(0xcafe_babe, reader.read_u4().unwrap());
        assert_eq!(49, reader.read_u2().unwrap());
        assert_eq!(1, reader.available());
        assert_eq!(-1, reader.read_i1().unwrap());
        assert_eq!(0, reader.available());
    }

    #[test]
    fn underrun_fails_without_moving() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::at(&data, 1);
        assert!(matches!(
            reader.read_u4(),
            Err(ClassError::Truncated {
                offset: 1,
                needed: 4,
                available: 2
            })
        ));
        assert_eq!(1, reader.position());
        assert_eq!(0x0203, reader.read_u2().unwrap());
        assert!(reader.read_u1().is_err());
    }
}
