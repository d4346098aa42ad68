//! Attributes attached to classes, fields, methods and code.

use crate::code::Code;
use serde::Serialize;
use std::fmt;

pub const CODE: &str = "Code";
pub const CONSTANT_VALUE: &str = "ConstantValue";
pub const EXCEPTIONS: &str = "Exceptions";
pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
pub const SOURCE_FILE: &str = "SourceFile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub(crate) name_index: u16,
    pub(crate) name: String,
    pub(crate) length: u32,
    pub(crate) kind: AttributeKind,
}

/// Attribute payloads. Attributes whose name is not recognized, or whose
/// payload does not fit their declared length, are kept [`Generic`](Self::Generic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttributeKind {
    Code(Code),
    ConstantValue { index: u16 },
    Exceptions { indices: Vec<u16> },
    LineNumberTable(Vec<LineNumber>),
    LocalVariableTable(Vec<LocalVariable>),
    SourceFile { index: u16 },
    Generic(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

impl Attribute {
    #[inline]
    #[must_use]
    pub const fn name_index(&self) -> u16 {
        self.name_index
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared `attribute_length`, which is not necessarily consistent with
    /// the decoded payload.
    #[inline]
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    #[must_use]
    pub const fn as_code(&self) -> Option<&Code> {
        match &self.kind {
            AttributeKind::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            AttributeKind::Code(code) => write!(
                f,
                "Code (max_stack={}, max_locals={}, {} bytes, {} handler(s))",
                code.max_stack(),
                code.max_locals(),
                code.len(),
                code.exception_table().len()
            ),
            AttributeKind::ConstantValue { index } => write!(f, "ConstantValue #{index}"),
            AttributeKind::Exceptions { indices } => write!(f, "Exceptions {indices:?}"),
            AttributeKind::LineNumberTable(lines) => {
                write!(f, "LineNumberTable ({} entries)", lines.len())
            }
            AttributeKind::LocalVariableTable(vars) => {
                write!(f, "LocalVariableTable ({} entries)", vars.len())
            }
            AttributeKind::SourceFile { index } => write!(f, "SourceFile #{index}"),
            AttributeKind::Generic(raw) => write!(f, "{} ({} bytes)", self.name, raw.len()),
        }
    }
}
