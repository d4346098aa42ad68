//! Field and method descriptors.
//!
//! Descriptors use the JVM internal grammar: base types are single letters,
//! class types are `Lname;` with `/` as package separator, and arrays are
//! prefixed with one `[` per dimension.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Maximum number of array dimensions allowed by the JVM.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Reason why a descriptor string does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("empty descriptor")]
    Empty,

    #[error("unknown base type '{0}'")]
    UnknownBaseType(char),

    #[error("class name is not terminated by ';'")]
    UnterminatedClassName,

    #[error("empty class name")]
    EmptyClassName,

    #[error("malformed class name '{0}'")]
    BadClassName(String),

    #[error("too many array dimensions ({0})")]
    TooManyDimensions(usize),

    #[error("array of void")]
    VoidArray,

    #[error("void is not a field type")]
    VoidField,

    #[error("unexpected trailing characters '{0}'")]
    Trailing(String),

    #[error("missing '(' at method descriptor start")]
    MissingOpenParen,

    #[error("missing ')' in method descriptor")]
    MissingCloseParen,

    #[error("missing return type")]
    MissingReturnType,
}

/// A JVM type, as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// A class or interface, named in internal form (`java/lang/Object`).
    Object(String),
    /// An array with its number of dimensions and its element type.
    Array(usize, Box<Type>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Char => write!(f, "C"),
            Self::Short => write!(f, "S"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Void => write!(f, "V"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(dims, elt) => {
                for _ in 0..*dims {
                    write!(f, "[")?;
                }
                write!(f, "{elt}")
            }
        }
    }
}

impl Type {
    /// Number of JVM words (stack or local slots) occupied by a value of this type.
    #[must_use]
    pub const fn words(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_, _))
    }

    /// Returns the type of an array element, if this is an array type.
    #[must_use]
    pub fn element(&self) -> Option<Self> {
        match self {
            Self::Array(1, elt) => Some(elt.as_ref().clone()),
            Self::Array(n, elt) => Some(Self::Array(n - 1, elt.clone())),
            _ => None,
        }
    }

    /// Parses a field descriptor (`void` excluded).
    ///
    /// # Errors
    ///
    /// Returns the first grammar violation found.
    pub fn parse_field(descr: &str) -> Result<Self, DescriptorError> {
        let (typ, rest) = parse_type(descr)?;
        if !rest.is_empty() {
            return Err(DescriptorError::Trailing(rest.to_string()));
        }
        if typ == Self::Void {
            return Err(DescriptorError::VoidField);
        }
        Ok(typ)
    }

    /// Parses the operand of a `CONSTANT_Class` entry: array classes are
    /// named by their descriptor, other classes by their bare internal name.
    ///
    /// # Errors
    ///
    /// Returns a grammar violation for malformed array descriptors or names.
    pub fn parse_class_constant(name: &str) -> Result<Self, DescriptorError> {
        if name.starts_with('[') {
            Self::parse_field(name)
        } else if name.is_empty() {
            Err(DescriptorError::EmptyClassName)
        } else if is_valid_class_name(name) {
            Ok(Self::Object(name.to_string()))
        } else {
            Err(DescriptorError::BadClassName(name.to_string()))
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    params: Vec<Type>,
    ret: Type,
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.params {
            write!(f, "{p}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(ILjava/lang/String;[J)V`.
    ///
    /// # Errors
    ///
    /// Returns the first grammar violation found.
    pub fn parse(descr: &str) -> Result<Self, DescriptorError> {
        let mut rest = descr
            .strip_prefix('(')
            .ok_or(DescriptorError::MissingOpenParen)?;
        let mut params = Vec::new();
        loop {
            if let Some(r) = rest.strip_prefix(')') {
                rest = r;
                break;
            }
            if rest.is_empty() {
                return Err(DescriptorError::MissingCloseParen);
            }
            let (typ, r) = parse_type(rest)?;
            if typ == Type::Void {
                return Err(DescriptorError::VoidField);
            }
            params.push(typ);
            rest = r;
        }
        if rest.is_empty() {
            return Err(DescriptorError::MissingReturnType);
        }
        let (ret, rest) = parse_type(rest)?;
        if !rest.is_empty() {
            return Err(DescriptorError::Trailing(rest.to_string()));
        }
        Ok(Self { params, ret })
    }

    #[inline]
    pub fn params(&self) -> impl Iterator<Item = &Type> {
        self.params.iter()
    }

    #[inline]
    #[must_use]
    pub const fn return_type(&self) -> &Type {
        &self.ret
    }

    /// Number of words taken by the arguments (long and double count twice),
    /// not including the receiver.
    #[must_use]
    pub fn arg_words(&self) -> usize {
        self.params.iter().map(Type::words).sum()
    }
}

fn parse_type(descr: &str) -> Result<(Type, &str), DescriptorError> {
    let dims = descr.bytes().take_while(|b| *b == b'[').count();
    if dims > MAX_ARRAY_DIMENSIONS {
        return Err(DescriptorError::TooManyDimensions(dims));
    }
    let rest = &descr[dims..];
    let mut chars = rest.chars();
    let first = chars.next().ok_or(DescriptorError::Empty)?;
    let (base, rest) = match first {
        'Z' => (Type::Boolean, chars.as_str()),
        'B' => (Type::Byte, chars.as_str()),
        'C' => (Type::Char, chars.as_str()),
        'S' => (Type::Short, chars.as_str()),
        'I' => (Type::Int, chars.as_str()),
        'J' => (Type::Long, chars.as_str()),
        'F' => (Type::Float, chars.as_str()),
        'D' => (Type::Double, chars.as_str()),
        'V' => (Type::Void, chars.as_str()),
        'L' => {
            let body = chars.as_str();
            let end = body
                .find(';')
                .ok_or(DescriptorError::UnterminatedClassName)?;
            let name = &body[..end];
            if name.is_empty() {
                return Err(DescriptorError::EmptyClassName);
            }
            if !is_valid_class_name(name) {
                return Err(DescriptorError::BadClassName(name.to_string()));
            }
            (Type::Object(name.to_string()), &body[end + 1..])
        }
        c => return Err(DescriptorError::UnknownBaseType(c)),
    };
    if dims == 0 {
        Ok((base, rest))
    } else if base == Type::Void {
        Err(DescriptorError::VoidArray)
    } else {
        Ok((Type::Array(dims, Box::new(base)), rest))
    }
}

/// Checks an internal class name: non-empty segments separated by `/`,
/// none of them containing `.`, `;` or `[`.
#[must_use]
pub fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('/')
            .all(|seg| !seg.is_empty() && !seg.contains(['.', ';', '[']))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_descriptors() {
        assert_eq!(Ok(Type::Int), Type::parse_field("I"));
        assert_eq!(
            Ok(Type::Object("java/lang/String".to_string())),
            Type::parse_field("Ljava/lang/String;")
        );
        assert_eq!(
            Ok(Type::Array(2, Box::new(Type::Long))),
            Type::parse_field("[[J")
        );
        assert_eq!(Err(DescriptorError::VoidField), Type::parse_field("V"));
        assert_eq!(Err(DescriptorError::VoidArray), Type::parse_field("[V"));
        assert_eq!(
            Err(DescriptorError::UnterminatedClassName),
            Type::parse_field("Ljava/lang/Object")
        );
        assert_eq!(
            Err(DescriptorError::Trailing("I".to_string())),
            Type::parse_field("II")
        );
        assert_eq!(
            Err(DescriptorError::BadClassName("java.lang.Object".to_string())),
            Type::parse_field("Ljava.lang.Object;")
        );
    }

    #[test]
    fn method_descriptors() {
        let descr = MethodDescriptor::parse("(IJLjava/lang/Object;[D)V").unwrap();
        assert_eq!(4, descr.params().count());
        assert_eq!(5, descr.arg_words());
        assert_eq!(&Type::Void, descr.return_type());
        assert_eq!("(IJLjava/lang/Object;[D)V", descr.to_string());

        assert_eq!(
            Err(DescriptorError::MissingOpenParen),
            MethodDescriptor::parse("I)V")
        );
        assert_eq!(
            Err(DescriptorError::MissingCloseParen),
            MethodDescriptor::parse("(I")
        );
        assert_eq!(
            Err(DescriptorError::MissingReturnType),
            MethodDescriptor::parse("(I)")
        );
        assert_eq!(
            Err(DescriptorError::VoidField),
            MethodDescriptor::parse("(V)V")
        );
    }

    #[test]
    fn array_elements() {
        let typ = Type::parse_field("[[Ljava/lang/String;").unwrap();
        let elt = typ.element().unwrap();
        assert_eq!("[Ljava/lang/String;", elt.to_string());
        assert_eq!(
            Some(Type::Object("java/lang/String".to_string())),
            elt.element()
        );
        assert_eq!(
            Ok(Type::Array(1, Box::new(Type::Int))),
            Type::parse_class_constant("[I")
        );
    }
}
