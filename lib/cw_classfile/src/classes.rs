//! JVM class file top-level structure.

use crate::attributes::{Attribute, AttributeKind};
use crate::constants::ConstantPool;
use crate::errors::ClassResult;
use crate::fields::FieldInfo;
use crate::methods::MethodInfo;
use bitflags::bitflags;
use std::fmt;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// A parsed class file. Built once by [`parse`](crate::parse), read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: ClassFlags,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) attributes: Vec<Attribute>,
}

impl ClassFile {
    #[inline]
    #[must_use]
    pub const fn minor_version(&self) -> u16 {
        self.minor_version
    }

    #[inline]
    #[must_use]
    pub const fn major_version(&self) -> u16 {
        self.major_version
    }

    #[inline]
    #[must_use]
    pub const fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ClassFlags {
        self.access_flags
    }

    #[inline]
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassFlags::ACC_INTERFACE)
    }

    #[inline]
    #[must_use]
    pub const fn this_class_index(&self) -> u16 {
        self.this_class
    }

    #[inline]
    #[must_use]
    pub const fn super_class_index(&self) -> u16 {
        self.super_class
    }

    /// Returns the internal name of the class (`java/lang/String`).
    pub fn name(&self) -> ClassResult<String> {
        self.constant_pool.class_name(usize::from(self.this_class))
    }

    /// Returns the name of the superclass, [`None`] for `java/lang/Object`
    /// (super index 0).
    pub fn super_name(&self) -> ClassResult<Option<String>> {
        if self.super_class == 0 {
            Ok(None)
        } else {
            self.constant_pool
                .class_name(usize::from(self.super_class))
                .map(Some)
        }
    }

    #[inline]
    #[must_use]
    pub fn interface_indices(&self) -> &[u16] {
        &self.interfaces
    }

    /// Returns the names of the implemented interfaces.
    pub fn interfaces(&self) -> ClassResult<Vec<String>> {
        self.interfaces
            .iter()
            .map(|idx| self.constant_pool.class_name(usize::from(*idx)))
            .collect()
    }

    #[inline]
    pub fn iter_fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter()
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter()
    }

    #[inline]
    pub fn iter_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Looks a method up by name and descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> ClassResult<Option<&MethodInfo>> {
        for method in &self.methods {
            if method.name(&self.constant_pool)? == name
                && method.descriptor(&self.constant_pool)? == descriptor
            {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    /// Optionnaly returns the source file name recorded in the class.
    pub fn source_file(&self) -> ClassResult<Option<String>> {
        self.attributes
            .iter()
            .find_map(|attr| match attr.kind() {
                AttributeKind::SourceFile { index } => Some(*index),
                _ => None,
            })
            .map(|index| self.constant_pool.utf8(usize::from(index)))
            .transpose()
    }
}

bitflags! {
    /// Class access flags
    pub struct ClassFlags: u16 {
        const ACC_PUBLIC                = 0x0001;
        const ACC_FINAL                 = 0x0010;
        const ACC_SUPER                 = 0x0020;
        const ACC_INTERFACE             = 0x0200;
        const ACC_ABSTRACT              = 0x0400;
        const ACC_SYNTHETIC             = 0x1000;
        const ACC_ANNOTATION            = 0x2000;
        const ACC_ENUM                  = 0x4000;
        const ACC_MODULE                = 0x8000;
    }
}

impl fmt::Display for ClassFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.contains(Self::ACC_PUBLIC) {
            write!(f, "public ")?;
        }
        if self.contains(Self::ACC_FINAL) {
            write!(f, "final ")?;
        }
        if self.contains(Self::ACC_SYNTHETIC) {
            write!(f, "synthetic ")?;
        }
        if self.contains(Self::ACC_ABSTRACT) && !self.contains(Self::ACC_INTERFACE) {
            write!(f, "abstract ")?;
        }
        if self.contains(Self::ACC_ANNOTATION) {
            write!(f, "@interface ")?;
        } else if self.contains(Self::ACC_INTERFACE) {
            write!(f, "interface ")?;
        } else if self.contains(Self::ACC_ENUM) {
            write!(f, "enum ")?;
        } else if self.contains(Self::ACC_MODULE) {
            write!(f, "module ")?;
        } else {
            write!(f, "class ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ClassBuilder;

    #[test]
    fn class_names() {
        let mut builder = ClassBuilder::new("org/example/Point");
        builder.interface("java/lang/Cloneable");
        builder.interface("java/io/Serializable");
        let class = builder.parse().unwrap();
        assert_eq!("org/example/Point", class.name().unwrap());
        assert_eq!(Some(JAVA_LANG_OBJECT.to_string()), class.super_name().unwrap());
        assert_eq!(
            vec!["java/lang/Cloneable", "java/io/Serializable"],
            class.interfaces().unwrap()
        );
        assert!(!class.is_interface());
        assert_eq!("public class ", class.flags().to_string());
    }

    #[test]
    fn object_has_no_super() {
        let mut builder = ClassBuilder::new(JAVA_LANG_OBJECT);
        builder.no_super();
        let class = builder.parse().unwrap();
        assert_eq!(None, class.super_name().unwrap());
    }
}
