//! Class fields.

use crate::attributes::{Attribute, AttributeKind};
use crate::constants::ConstantPool;
use crate::descriptors::Type;
use crate::errors::{ClassError, ClassResult};
use bitflags::bitflags;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldFlags,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<Attribute>,
}

impl FieldInfo {
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> FieldFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub const fn name_index(&self) -> u16 {
        self.name_index
    }

    #[inline]
    #[must_use]
    pub const fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn name(&self, pool: &ConstantPool) -> ClassResult<String> {
        pool.utf8(usize::from(self.name_index))
    }

    pub fn descriptor(&self, pool: &ConstantPool) -> ClassResult<String> {
        pool.utf8(usize::from(self.descriptor_index))
    }

    /// Returns the field type parsed from its descriptor.
    pub fn typ(&self, pool: &ConstantPool) -> ClassResult<Type> {
        let descr = self.descriptor(pool)?;
        Type::parse_field(&descr).map_err(|err| ClassError::Descriptor(descr, err))
    }

    #[inline]
    pub fn iter_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Pool index of the initial value, for fields carrying a `ConstantValue`.
    #[must_use]
    pub fn constant_value_index(&self) -> Option<u16> {
        self.attributes.iter().find_map(|attr| match attr.kind() {
            AttributeKind::ConstantValue { index } => Some(*index),
            _ => None,
        })
    }
}

bitflags! {
    /// Field access flags
    pub struct FieldFlags: u16 {
        const ACC_PUBLIC                = 0x0001;
        const ACC_PRIVATE               = 0x0002;
        const ACC_PROTECTED             = 0x0004;
        const ACC_STATIC                = 0x0008;
        const ACC_FINAL                 = 0x0010;
        const ACC_VOLATILE              = 0x0040;
        const ACC_TRANSIENT             = 0x0080;
        const ACC_SYNTHETIC             = 0x1000;
        const ACC_ENUM                  = 0x4000;
    }
}

impl fmt::Display for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.contains(Self::ACC_PUBLIC) {
            write!(f, "public ")?;
        }
        if self.contains(Self::ACC_PRIVATE) {
            write!(f, "private ")?;
        }
        if self.contains(Self::ACC_PROTECTED) {
            write!(f, "protected ")?;
        }
        if self.contains(Self::ACC_STATIC) {
            write!(f, "static ")?;
        }
        if self.contains(Self::ACC_FINAL) {
            write!(f, "final ")?;
        }
        if self.contains(Self::ACC_VOLATILE) {
            write!(f, "volatile ")?;
        }
        if self.contains(Self::ACC_TRANSIENT) {
            write!(f, "transient ")?;
        }
        if self.contains(Self::ACC_SYNTHETIC) {
            write!(f, "synthetic ")?;
        }
        if self.contains(Self::ACC_ENUM) {
            write!(f, "enum ")?;
        }
        Ok(())
    }
}
