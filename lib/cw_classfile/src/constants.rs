//! Constant pool representation.

use crate::descriptors::Type;
use crate::errors::{ClassError, ClassResult};
use serde::Serialize;
use std::fmt;

pub const TAG_UTF8: u8 = 1;
pub const TAG_UNICODE: u8 = 2;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// A constant pool entry.
///
/// Index 0 of the pool and the slot following a `Long` or `Double` hold
/// [`Constant::Unusable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constant {
    Unusable,
    /// Raw modified UTF-8 bytes, kept as read so that the structural
    /// checks can look at byte values; use [`Constant::utf8`] for text.
    Utf8(Vec<u8>),
    /// Obsolete tag 2 entry, read as an empty placeholder.
    Unicode,
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl Constant {
    #[must_use]
    pub const fn tag(&self) -> Option<u8> {
        match self {
            Self::Unusable => None,
            Self::Utf8(_) => Some(TAG_UTF8),
            Self::Unicode => Some(TAG_UNICODE),
            Self::Integer(_) => Some(TAG_INTEGER),
            Self::Float(_) => Some(TAG_FLOAT),
            Self::Long(_) => Some(TAG_LONG),
            Self::Double(_) => Some(TAG_DOUBLE),
            Self::Class { .. } => Some(TAG_CLASS),
            Self::String { .. } => Some(TAG_STRING),
            Self::FieldRef { .. } => Some(TAG_FIELDREF),
            Self::MethodRef { .. } => Some(TAG_METHODREF),
            Self::InterfaceMethodRef { .. } => Some(TAG_INTERFACE_METHODREF),
            Self::NameAndType { .. } => Some(TAG_NAME_AND_TYPE),
            Self::MethodHandle { .. } => Some(TAG_METHOD_HANDLE),
            Self::MethodType { .. } => Some(TAG_METHOD_TYPE),
            Self::Dynamic { .. } => Some(TAG_DYNAMIC),
            Self::InvokeDynamic { .. } => Some(TAG_INVOKE_DYNAMIC),
            Self::Module { .. } => Some(TAG_MODULE),
            Self::Package { .. } => Some(TAG_PACKAGE),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unusable => "unusable slot",
            Self::Utf8(_) => "Utf8",
            Self::Unicode => "Unicode",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Long(_) => "Long",
            Self::Double(_) => "Double",
            Self::Class { .. } => "Class",
            Self::String { .. } => "String",
            Self::FieldRef { .. } => "Fieldref",
            Self::MethodRef { .. } => "Methodref",
            Self::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Self::NameAndType { .. } => "NameAndType",
            Self::MethodHandle { .. } => "MethodHandle",
            Self::MethodType { .. } => "MethodType",
            Self::Dynamic { .. } => "Dynamic",
            Self::InvokeDynamic { .. } => "InvokeDynamic",
            Self::Module { .. } => "Module",
            Self::Package { .. } => "Package",
        }
    }

    /// Number of pool slots taken by this entry.
    #[must_use]
    pub const fn slots(&self) -> usize {
        match self {
            Self::Long(_) | Self::Double(_) => 2,
            _ => 1,
        }
    }

    /// Decodes an `Utf8` entry as text.
    ///
    /// Class files use modified UTF-8; the two encodings differ only for
    /// NUL and supplementary characters, which are replaced lossily here.
    #[must_use]
    pub fn utf8(&self) -> Option<String> {
        match self {
            Self::Utf8(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unusable => write!(f, "(unusable)"),
            Self::Utf8(bytes) => write!(f, "Utf8 \"{}\"", String::from_utf8_lossy(bytes)),
            Self::Unicode => write!(f, "Unicode"),
            Self::Integer(v) => write!(f, "Integer {v}"),
            Self::Float(v) => write!(f, "Float {v}"),
            Self::Long(v) => write!(f, "Long {v}"),
            Self::Double(v) => write!(f, "Double {v}"),
            Self::Class { name_index } => write!(f, "Class #{name_index}"),
            Self::String { string_index } => write!(f, "String #{string_index}"),
            Self::FieldRef {
                class_index,
                name_and_type_index,
            } => write!(f, "Fieldref #{class_index}.#{name_and_type_index}"),
            Self::MethodRef {
                class_index,
                name_and_type_index,
            } => write!(f, "Methodref #{class_index}.#{name_and_type_index}"),
            Self::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => write!(
                f,
                "InterfaceMethodref #{class_index}.#{name_and_type_index}"
            ),
            Self::NameAndType {
                name_index,
                descriptor_index,
            } => write!(f, "NameAndType #{name_index}:#{descriptor_index}"),
            Self::MethodHandle {
                reference_kind,
                reference_index,
            } => write!(f, "MethodHandle {reference_kind}:#{reference_index}"),
            Self::MethodType { descriptor_index } => write!(f, "MethodType #{descriptor_index}"),
            Self::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => write!(
                f,
                "Dynamic #{bootstrap_method_attr_index}:#{name_and_type_index}"
            ),
            Self::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => write!(
                f,
                "InvokeDynamic #{bootstrap_method_attr_index}:#{name_and_type_index}"
            ),
            Self::Module { name_index } => write!(f, "Module #{name_index}"),
            Self::Package { name_index } => write!(f, "Package #{name_index}"),
        }
    }
}

/// A symbolic reference to a field or method, resolved from the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

/// The constant pool, indexed from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Builds a pool from its entries, slot 0 included.
    #[must_use]
    pub fn new(entries: Vec<Constant>) -> Self {
        Self { entries }
    }

    /// The `constant_pool_count` value, i.e. the number of slots including slot 0.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over usable entries with their index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    ///
    /// Index 0, out of range indices and the unusable slot after a
    /// `Long`/`Double` are errors.
    pub fn get(&self, index: usize) -> ClassResult<&Constant> {
        match self.entries.get(index) {
            None | Some(Constant::Unusable) => Err(ClassError::InvalidIndex(index)),
            Some(c) => Ok(c),
        }
    }

    /// Same as [`get`](Self::get), without failing.
    #[must_use]
    pub fn try_get(&self, index: usize) -> Option<&Constant> {
        self.get(index).ok()
    }

    pub fn utf8(&self, index: usize) -> ClassResult<String> {
        self.get(index)?
            .utf8()
            .ok_or(ClassError::UnexpectedConstant {
                index,
                expected: "Utf8",
            })
    }

    /// Name of the class referenced by the `Class` entry at `index`.
    pub fn class_name(&self, index: usize) -> ClassResult<String> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(usize::from(*name_index)),
            _ => Err(ClassError::UnexpectedConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Type denoted by the `Class` entry at `index` (arrays included).
    pub fn class_type(&self, index: usize) -> ClassResult<Type> {
        let name = self.class_name(index)?;
        Type::parse_class_constant(&name).map_err(|err| ClassError::Descriptor(name, err))
    }

    /// Name and descriptor of the `NameAndType` entry at `index`.
    pub fn name_and_type(&self, index: usize) -> ClassResult<(String, String)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((
                self.utf8(usize::from(*name_index))?,
                self.utf8(usize::from(*descriptor_index))?,
            )),
            _ => Err(ClassError::UnexpectedConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolves a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    pub fn member_ref(&self, index: usize) -> ClassResult<MemberRef> {
        match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let class = self.class_name(usize::from(*class_index))?;
                let (name, descriptor) = self.name_and_type(usize::from(*name_and_type_index))?;
                Ok(MemberRef {
                    class,
                    name,
                    descriptor,
                })
            }
            _ => Err(ClassError::UnexpectedConstant {
                index,
                expected: "member reference",
            }),
        }
    }

    /// Name and descriptor of the call site of an `InvokeDynamic` entry.
    pub fn invoke_dynamic(&self, index: usize) -> ClassResult<(String, String)> {
        match self.get(index)? {
            Constant::InvokeDynamic {
                name_and_type_index,
                ..
            } => self.name_and_type(usize::from(*name_and_type_index)),
            _ => Err(ClassError::UnexpectedConstant {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ConstantPool {
        ConstantPool::new(vec![
            Constant::Unusable,
            Constant::Utf8(b"java/lang/String".to_vec()),
            Constant::Class { name_index: 1 },
            Constant::Long(42),
            Constant::Unusable,
            Constant::Utf8(b"length".to_vec()),
            Constant::Utf8(b"()I".to_vec()),
            Constant::NameAndType {
                name_index: 5,
                descriptor_index: 6,
            },
            Constant::MethodRef {
                class_index: 2,
                name_and_type_index: 7,
            },
        ])
    }

    #[test]
    fn lookups() {
        let pool = pool();
        assert_eq!(9, pool.count());
        assert_eq!("java/lang/String", pool.class_name(2).unwrap());
        assert_eq!(
            MemberRef {
                class: "java/lang/String".to_string(),
                name: "length".to_string(),
                descriptor: "()I".to_string(),
            },
            pool.member_ref(8).unwrap()
        );
        assert!(matches!(
            pool.class_name(1),
            Err(ClassError::UnexpectedConstant { index: 1, .. })
        ));
    }

    #[test]
    fn unusable_slots() {
        let pool = pool();
        assert!(matches!(pool.get(0), Err(ClassError::InvalidIndex(0))));
        assert!(matches!(pool.get(4), Err(ClassError::InvalidIndex(4))));
        assert!(matches!(pool.get(9), Err(ClassError::InvalidIndex(9))));
        assert_eq!(7, pool.iter().count());
    }
}
