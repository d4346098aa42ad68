//! Class file errors definitions.

use crate::descriptors::DescriptorError;
use std::{fmt, io};
use thiserror::Error;

/// An alias for result that can be a [`ClassError`].
pub type ClassResult<T> = Result<T, ClassError>;

/// The class file error type.
///
/// Every variant is a decode error: the class file is malformed and cannot
/// be turned into a [`ClassFile`](crate::classes::ClassFile).
#[derive(Debug, Error)]
pub enum ClassError {
    /// Error that can be returned when doing [std::io](I/O) operations.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when formatting class file parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Error that can be returned at parsing.
    #[error("parsing error ({1:?}, {} bytes left)", .0.len())]
    Parsing(Vec<u8>, nom::error::ErrorKind),

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: usize },

    /// A sequential read went past the end of its buffer.
    #[error("truncated input: {needed} byte(s) needed at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("invalid constant pool index {0}")]
    InvalidIndex(usize),

    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: usize, expected: &'static str },

    #[error("invalid descriptor '{0}': {1}")]
    Descriptor(String, DescriptorError),

    #[error("unknown opcode {opcode:#04x} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("opcode {opcode:#04x} cannot follow wide at pc {pc}")]
    BadWide { opcode: u8, pc: usize },

    #[error("invalid switch bounds (low={low}, high={high}) at pc {pc}")]
    BadSwitch { low: i32, high: i32, pc: usize },

    #[error("{0} trailing byte(s) after class structure")]
    TrailingBytes(usize),
}

impl nom::error::ParseError<&[u8]> for ClassError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Parsing(input.to_vec(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::ErrorConvert<Self> for ClassError {
    fn convert(self) -> Self {
        self
    }
}
