//! Method code representation.

use crate::attributes::{Attribute, AttributeKind, LineNumber, LocalVariable};
use crate::errors::ClassResult;
use crate::instrs::{self, LabeledInstr};
use crate::Addr;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Code {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Vec<u8>,
    pub(crate) exception_table: Vec<ExceptionTableEntry>,
    pub(crate) attributes: Vec<Attribute>,
}

/// An exception table entry; the protected range is `[start_pc, end_pc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `Class` constant index, or 0 for a catch-all (`finally`) handler.
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    #[inline]
    #[must_use]
    pub const fn covers(&self, addr: Addr) -> bool {
        addr.0 >= self.start_pc as usize && addr.0 < self.end_pc as usize
    }

    #[inline]
    #[must_use]
    pub const fn handler_addr(&self) -> Addr {
        Addr(self.handler_pc as usize)
    }
}

impl Code {
    #[inline]
    #[must_use]
    pub const fn max_stack(&self) -> usize {
        self.max_stack as usize
    }

    #[inline]
    #[must_use]
    pub const fn max_locals(&self) -> usize {
        self.max_locals as usize
    }

    /// Raw instruction bytes.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn exception_table(&self) -> &[ExceptionTableEntry] {
        &self.exception_table
    }

    #[inline]
    pub fn iter_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Decodes the whole instruction stream.
    ///
    /// # Errors
    ///
    /// Fails on unknown opcodes and on instructions running past the end of the code.
    pub fn instructions(&self) -> ClassResult<Vec<LabeledInstr>> {
        instrs::decode(&self.code)
    }

    /// Exception table entries protecting the instruction at `addr`.
    pub fn active_handlers(&self, addr: Addr) -> impl Iterator<Item = &ExceptionTableEntry> {
        self.exception_table.iter().filter(move |e| e.covers(addr))
    }

    pub fn line_numbers(&self) -> impl Iterator<Item = &LineNumber> {
        self.attributes.iter().flat_map(|attr| match attr.kind() {
            AttributeKind::LineNumberTable(lines) => lines.as_slice(),
            _ => &[],
        })
    }

    pub fn local_variables(&self) -> impl Iterator<Item = &LocalVariable> {
        self.attributes.iter().flat_map(|attr| match attr.kind() {
            AttributeKind::LocalVariableTable(vars) => vars.as_slice(),
            _ => &[],
        })
    }

    /// Source line of the instruction at `addr`, if a line number table covers it.
    #[must_use]
    pub fn line_of(&self, addr: Addr) -> Option<u16> {
        self.line_numbers()
            .filter(|l| usize::from(l.start_pc) <= addr.0)
            .max_by_key(|l| l.start_pc)
            .map(|l| l.line_number)
    }
}
