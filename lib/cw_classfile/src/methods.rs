//! Class methods.

use crate::attributes::{Attribute, AttributeKind};
use crate::code::Code;
use crate::constants::ConstantPool;
use crate::descriptors::MethodDescriptor;
use crate::errors::{ClassError, ClassResult};
use bitflags::bitflags;
use std::fmt;

pub const INIT: &str = "<init>";
pub const CLINIT: &str = "<clinit>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub(crate) access_flags: MethodFlags,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<Attribute>,
}

impl MethodInfo {
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.access_flags.contains(MethodFlags::ACC_STATIC)
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

    pub fn parsed_descriptor(&self, pool: &ConstantPool) -> ClassResult<MethodDescriptor> {
        let descr = self.descriptor(pool)?;
        MethodDescriptor::parse(&descr).map_err(|err| ClassError::Descriptor(descr, err))
    }

    /// `name(descriptor)`, used to identify methods in reports.
    pub fn signature(&self, pool: &ConstantPool) -> ClassResult<String> {
        Ok(format!("{}{}", self.name(pool)?, self.descriptor(pool)?))
    }

    #[inline]
    pub fn iter_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// The method's code, [`None`] for abstract and native methods.
    #[must_use]
    pub fn code(&self) -> Option<&Code> {
        self.attributes.iter().find_map(Attribute::as_code)
    }

    /// Pool indices of the declared checked exceptions.
    #[must_use]
    pub fn exceptions(&self) -> &[u16] {
        self.attributes
            .iter()
            .find_map(|attr| match attr.kind() {
                AttributeKind::Exceptions { indices } => Some(indices.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

bitflags! {
    /// Method access flags
    pub struct MethodFlags: u16 {
        const ACC_PUBLIC                = 0x0001;
        const ACC_PRIVATE               = 0x0002;
        const ACC_PROTECTED             = 0x0004;
        const ACC_STATIC                = 0x0008;
        const ACC_FINAL                 = 0x0010;
        const ACC_SYNCHRONIZED          = 0x0020;
        const ACC_BRIDGE                = 0x0040;
        const ACC_VARARGS               = 0x0080;
        const ACC_NATIVE                = 0x0100;
        const ACC_ABSTRACT              = 0x0400;
        const ACC_STRICT                = 0x0800;
        const ACC_SYNTHETIC             = 0x1000;
    }
}

impl fmt::Display for MethodFlags {
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
        if self.contains(Self::ACC_SYNCHRONIZED) {
            write!(f, "synchronized ")?;
        }
        if self.contains(Self::ACC_BRIDGE) {
            write!(f, "bridge ")?;
        }
        if self.contains(Self::ACC_VARARGS) {
            write!(f, "varargs ")?;
        }
        if self.contains(Self::ACC_NATIVE) {
            write!(f, "native ")?;
        }
        if self.contains(Self::ACC_ABSTRACT) {
            write!(f, "abstract ")?;
        }
        if self.contains(Self::ACC_STRICT) {
            write!(f, "strictfp ")?;
        }
        if self.contains(Self::ACC_SYNTHETIC) {
            write!(f, "synthetic ")?;
        }
        Ok(())
    }
}
