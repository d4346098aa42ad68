use crate::classpath::ClassPath;
use crate::errors::AnalysisResult;
use cw_classfile::descriptors::Type;
use cw_classfile::instrs::{
    ArrayType, T_BOOLEAN, T_BYTE, T_CHAR, T_DOUBLE, T_FLOAT, T_INT, T_LONG, T_SHORT,
};
use cw_classfile::Addr;
use lazy_static::lazy_static;
use std::fmt;

/// An object reference, with its initialization status.
///
/// `create_pc` is the address of the `new` instruction that allocated the
/// object, `init_pc` the address of the constructor call that initialized
/// it. References that do not come from a `new` (parameters, fields, call
/// results...) are created and initialized at address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub initialized: bool,
    pub create_pc: usize,
    pub init_pc: usize,
}

/// Element kind of an array reference. Boolean, byte, char and short arrays
/// are kept apart since their elements are all read as integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
    Boolean,
    Byte,
    Char,
    Short,
    Of(TypeState),
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "[Z"),
            Self::Byte => write!(f, "[B"),
            Self::Char => write!(f, "[C"),
            Self::Short => write!(f, "[S"),
            Self::Of(elt) => write!(f, "[{elt}"),
        }
    }
}

/// Abstract type of one JVM word (a stack slot or a local variable).
///
/// Long and double values take two words: the value itself followed by its
/// high word (`Long2`, `Double2`), which sits on top of the stack or in the
/// next local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeState {
    Bottom,
    Uninitialized,
    Integer,
    Float,
    Long,
    Long2,
    Double,
    Double2,
    Reference(Reference),
    ArrayRef(Box<ArrayKind>),
    ReturnAddress(Addr),
    Top,
    Null,
}

impl fmt::Display for TypeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "⊥"),
            Self::Uninitialized => write!(f, "uninit"),
            Self::Integer => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Long => write!(f, "long"),
            Self::Long2 => write!(f, "long2"),
            Self::Double => write!(f, "double"),
            Self::Double2 => write!(f, "double2"),
            Self::Reference(r) if r.initialized => write!(f, "L{};", r.name),
            Self::Reference(r) => write!(f, "L{};(new@{})", r.name, r.create_pc),
            Self::ArrayRef(kind) => write!(f, "{kind}"),
            Self::ReturnAddress(addr) => write!(f, "retaddr@{addr}"),
            Self::Top => write!(f, "⊤"),
            Self::Null => write!(f, "null"),
        }
    }
}

lazy_static! {
    pub static ref JAVA_LANG_OBJECT: TypeState = TypeState::object("java/lang/Object");
    pub static ref JAVA_LANG_THROWABLE: TypeState = TypeState::object("java/lang/Throwable");
    pub static ref JAVA_LANG_STRING: TypeState = TypeState::object("java/lang/String");
    pub static ref JAVA_LANG_CLASS: TypeState = TypeState::object("java/lang/Class");
    pub static ref JAVA_LANG_INVOKE_METHOD_TYPE: TypeState =
        TypeState::object("java/lang/invoke/MethodType");
    pub static ref JAVA_LANG_INVOKE_METHOD_HANDLE: TypeState =
        TypeState::object("java/lang/invoke/MethodHandle");
}

impl TypeState {
    /// An initialized reference to an instance of `name`.
    #[must_use]
    pub fn object(name: &str) -> Self {
        Self::Reference(Reference {
            name: name.to_string(),
            initialized: true,
            create_pc: 0,
            init_pc: 0,
        })
    }

    /// The reference pushed by a `new` instruction at `pc`.
    #[must_use]
    pub fn uninitialized_object(name: &str, pc: Addr) -> Self {
        Self::Reference(Reference {
            name: name.to_string(),
            initialized: false,
            create_pc: pc.0,
            init_pc: 0,
        })
    }

    #[must_use]
    pub fn array(kind: ArrayKind) -> Self {
        Self::ArrayRef(Box::new(kind))
    }

    /// Array type created by a `newarray` instruction, `None` for unknown
    /// `atype` values.
    #[must_use]
    pub fn primitive_array(atype: ArrayType) -> Option<Self> {
        let kind = match atype.0 {
            T_BOOLEAN => ArrayKind::Boolean,
            T_CHAR => ArrayKind::Char,
            T_FLOAT => ArrayKind::Of(Self::Float),
            T_DOUBLE => ArrayKind::Of(Self::Double),
            T_BYTE => ArrayKind::Byte,
            T_SHORT => ArrayKind::Short,
            T_INT => ArrayKind::Of(Self::Integer),
            T_LONG => ArrayKind::Of(Self::Long),
            _ => return None,
        };
        Some(Self::array(kind))
    }

    /// Words used to store a value of the given descriptor type (none for
    /// `void`).
    #[must_use]
    pub fn words_of(typ: &Type) -> Vec<Self> {
        match typ {
            Type::Void => vec![],
            Type::Long => vec![Self::Long, Self::Long2],
            Type::Double => vec![Self::Double, Self::Double2],
            typ => vec![Self::value_of(typ)],
        }
    }

    /// First word of a value of the given descriptor type.
    #[must_use]
    pub fn value_of(typ: &Type) -> Self {
        match typ {
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int => Self::Integer,
            Type::Long => Self::Long,
            Type::Float => Self::Float,
            Type::Double => Self::Double,
            Type::Void => Self::Bottom,
            Type::Object(name) => Self::object(name),
            Type::Array(dims, base) => {
                let kind = if *dims == 1 {
                    match base.as_ref() {
                        Type::Boolean => ArrayKind::Boolean,
                        Type::Byte => ArrayKind::Byte,
                        Type::Char => ArrayKind::Char,
                        Type::Short => ArrayKind::Short,
                        elt => ArrayKind::Of(Self::value_of(elt)),
                    }
                } else {
                    ArrayKind::Of(Self::value_of(&Type::Array(dims - 1, base.clone())))
                };
                Self::array(kind)
            }
        }
    }

    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_) | Self::ArrayRef(_) | Self::Null)
    }

    #[must_use]
    pub const fn is_array_reference(&self) -> bool {
        matches!(self, Self::ArrayRef(_) | Self::Null)
    }

    /// Returns `true` for an object allocated by `new` and not yet passed
    /// to a constructor.
    #[must_use]
    pub const fn is_uninitialized_object(&self) -> bool {
        matches!(self, Self::Reference(r) if !r.initialized)
    }

    /// Compatibility check used for operands: same kind of primitive, or
    /// both references of any class.
    #[must_use]
    pub fn same(&self, expected: &Self) -> bool {
        match self {
            Self::Bottom | Self::Top => false,
            Self::Reference(_) | Self::ArrayRef(_) | Self::Null => expected.is_reference(),
            Self::ReturnAddress(_) => matches!(expected, Self::ReturnAddress(_)),
            _ => std::mem::discriminant(self) == std::mem::discriminant(expected),
        }
    }

    /// Least upper bound of two words at a control flow join located at `pc`.
    ///
    /// Class names of references are joined by looking for their nearest
    /// common superclass in the class path.
    ///
    /// # Errors
    ///
    /// Fails when a class needed to compute a common superclass cannot be
    /// loaded.
    pub fn merge(&self, other: &Self, pc: Addr, classpath: &ClassPath) -> AnalysisResult<Self> {
        if self == other {
            return Ok(self.clone());
        }
        let merged = match (self, other) {
            (Self::Bottom, t) | (t, Self::Bottom) => t.clone(),
            (Self::Null, t) | (t, Self::Null) if t.is_reference() => t.clone(),
            (Self::Reference(r1), Self::Reference(r2)) => merge_references(r1, r2, pc, classpath)?,
            (Self::Reference(r), Self::ArrayRef(_)) | (Self::ArrayRef(_), Self::Reference(r)) => {
                if r.initialized {
                    JAVA_LANG_OBJECT.clone()
                } else {
                    Self::Top
                }
            }
            (Self::ArrayRef(k1), Self::ArrayRef(k2)) => match (k1.as_ref(), k2.as_ref()) {
                (ArrayKind::Of(e1), ArrayKind::Of(e2)) => match e1.merge(e2, pc, classpath)? {
                    Self::Top => Self::Top,
                    elt => Self::array(ArrayKind::Of(elt)),
                },
                _ => Self::Top,
            },
            (Self::ReturnAddress(a1), Self::ReturnAddress(a2)) => {
                Self::ReturnAddress(*a1.min(a2))
            }
            _ => Self::Top,
        };
        Ok(merged)
    }
}

fn merge_references(
    r1: &Reference,
    r2: &Reference,
    pc: Addr,
    classpath: &ClassPath,
) -> AnalysisResult<TypeState> {
    let merged = match (r1.initialized, r2.initialized) {
        (true, true) => {
            let name = if r1.name == r2.name {
                r1.name.clone()
            } else {
                classpath.find_common(&r1.name, &r2.name)?
            };
            TypeState::Reference(Reference {
                name,
                initialized: true,
                create_pc: r1.create_pc.min(r2.create_pc),
                init_pc: r1.init_pc.min(r2.init_pc),
            })
        }
        // initialized on one path only: valid as long as that
        // initialization happens after the join
        (true, false) if r1.init_pc >= pc.0 => TypeState::Reference(r2.clone()),
        (false, true) if r2.init_pc >= pc.0 => TypeState::Reference(r1.clone()),
        (true, false) | (false, true) => TypeState::Top,
        (false, false) => TypeState::Reference(Reference {
            name: classpath.find_common(&r1.name, &r2.name)?,
            initialized: false,
            create_pc: r1.create_pc.min(r2.create_pc),
            init_pc: r1.init_pc.min(r2.init_pc),
        }),
    };
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_classfile::testing::ClassBuilder;

    fn classpath() -> ClassPath {
        let classpath = ClassPath::default();
        for (name, parent) in [
            ("a/Shape", "java/lang/Object"),
            ("a/Circle", "a/Shape"),
            ("a/Square", "a/Shape"),
            ("b/Other", "java/lang/Object"),
        ] {
            let mut builder = ClassBuilder::new(name);
            builder.super_class(parent);
            classpath.register(builder.parse().unwrap()).unwrap();
        }
        classpath
    }

    fn samples() -> Vec<TypeState> {
        vec![
            TypeState::Bottom,
            TypeState::Uninitialized,
            TypeState::Integer,
            TypeState::Float,
            TypeState::Long,
            TypeState::Long2,
            TypeState::Double,
            TypeState::Double2,
            TypeState::object("a/Circle"),
            TypeState::uninitialized_object("a/Square", Addr(3)),
            TypeState::array(ArrayKind::Byte),
            TypeState::array(ArrayKind::Of(TypeState::Integer)),
            TypeState::array(ArrayKind::Of(TypeState::object("a/Square"))),
            TypeState::ReturnAddress(Addr(7)),
            TypeState::Top,
            TypeState::Null,
        ]
    }

    #[test]
    fn merge_is_idempotent() {
        let classpath = classpath();
        for t in samples() {
            assert_eq!(t, t.merge(&t, Addr(10), &classpath).unwrap(), "{t}");
        }
    }

    #[test]
    fn merge_is_commutative() {
        let classpath = classpath();
        for t1 in samples() {
            for t2 in samples() {
                assert_eq!(
                    t1.merge(&t2, Addr(10), &classpath).unwrap(),
                    t2.merge(&t1, Addr(10), &classpath).unwrap(),
                    "{t1} and {t2}"
                );
            }
        }
    }

    #[test]
    fn primitive_merges() {
        let classpath = classpath();
        let pc = Addr(0);
        assert_eq!(
            TypeState::Integer,
            TypeState::Bottom.merge(&TypeState::Integer, pc, &classpath).unwrap()
        );
        assert_eq!(
            TypeState::Top,
            TypeState::Integer.merge(&TypeState::Float, pc, &classpath).unwrap()
        );
        assert_eq!(
            TypeState::Top,
            TypeState::Long.merge(&TypeState::Long2, pc, &classpath).unwrap()
        );
        assert_eq!(
            TypeState::Top,
            TypeState::Integer.merge(&TypeState::Null, pc, &classpath).unwrap()
        );
    }

    #[test]
    fn reference_merges() {
        let classpath = classpath();
        let pc = Addr(20);
        let circle = TypeState::object("a/Circle");
        let square = TypeState::object("a/Square");
        assert_eq!(
            TypeState::object("a/Shape"),
            circle.merge(&square, pc, &classpath).unwrap()
        );
        assert_eq!(circle, TypeState::Null.merge(&circle, pc, &classpath).unwrap());
        assert_eq!(
            *JAVA_LANG_OBJECT,
            circle
                .merge(&TypeState::array(ArrayKind::Char), pc, &classpath)
                .unwrap()
        );
    }

    #[test]
    fn uninitialized_reference_merges() {
        let classpath = classpath();
        let pc = Addr(20);

        // same class on both branches
        let c1 = TypeState::uninitialized_object("a/Circle", Addr(4));
        let c2 = TypeState::uninitialized_object("a/Circle", Addr(4));
        assert_eq!(c1, c1.merge(&c2, pc, &classpath).unwrap());

        // unrelated classes meet at their common ancestor
        let other = TypeState::uninitialized_object("b/Other", Addr(4));
        match c1.merge(&other, pc, &classpath).unwrap() {
            TypeState::Reference(r) => {
                assert_eq!("java/lang/Object", r.name);
                assert!(!r.initialized);
            }
            t => panic!("unexpected merge result {t}"),
        }
        let square = TypeState::uninitialized_object("a/Square", Addr(8));
        match c1.merge(&square, pc, &classpath).unwrap() {
            TypeState::Reference(r) => {
                assert_eq!("a/Shape", r.name);
                assert_eq!(4, r.create_pc);
            }
            t => panic!("unexpected merge result {t}"),
        }

        // initialized before the join on one path only
        let inited = TypeState::Reference(Reference {
            name: "a/Circle".to_string(),
            initialized: true,
            create_pc: 4,
            init_pc: 12,
        });
        assert_eq!(TypeState::Top, inited.merge(&c1, pc, &classpath).unwrap());
        assert_eq!(c1, inited.merge(&c1, Addr(12), &classpath).unwrap());
    }

    #[test]
    fn unknown_classes_fail_merge() {
        let classpath = classpath();
        let known = TypeState::object("a/Circle");
        let unknown = TypeState::object("z/Missing");
        assert!(known.merge(&unknown, Addr(0), &classpath).is_err());
    }

    #[test]
    fn array_merges() {
        let classpath = classpath();
        let pc = Addr(0);
        let circles = TypeState::array(ArrayKind::Of(TypeState::object("a/Circle")));
        let squares = TypeState::array(ArrayKind::Of(TypeState::object("a/Square")));
        assert_eq!(
            TypeState::array(ArrayKind::Of(TypeState::object("a/Shape"))),
            circles.merge(&squares, pc, &classpath).unwrap()
        );
        assert_eq!(
            TypeState::Top,
            TypeState::array(ArrayKind::Byte)
                .merge(&TypeState::array(ArrayKind::Boolean), pc, &classpath)
                .unwrap()
        );
        assert_eq!(
            TypeState::Top,
            TypeState::array(ArrayKind::Of(TypeState::Integer))
                .merge(&TypeState::array(ArrayKind::Of(TypeState::Float)), pc, &classpath)
                .unwrap()
        );
    }

    #[test]
    fn same_operands() {
        assert!(TypeState::Integer.same(&TypeState::Integer));
        assert!(!TypeState::Integer.same(&TypeState::Float));
        assert!(TypeState::Null.same(&TypeState::object("a/Circle")));
        assert!(TypeState::array(ArrayKind::Char).same(&*JAVA_LANG_OBJECT));
        assert!(TypeState::ReturnAddress(Addr(1)).same(&TypeState::ReturnAddress(Addr(9))));
        assert!(!TypeState::Top.same(&TypeState::Top));
        assert!(!TypeState::Bottom.same(&TypeState::Integer));
    }

    #[test]
    fn descriptor_words() {
        assert_eq!(
            vec![TypeState::Long, TypeState::Long2],
            TypeState::words_of(&Type::Long)
        );
        assert!(TypeState::words_of(&Type::Void).is_empty());
        assert_eq!(
            TypeState::array(ArrayKind::Of(TypeState::array(ArrayKind::Char))),
            TypeState::value_of(&Type::parse_field("[[C").unwrap())
        );
        assert_eq!(
            TypeState::array(ArrayKind::Of(TypeState::object("java/lang/String"))),
            TypeState::value_of(&Type::parse_field("[Ljava/lang/String;").unwrap())
        );
    }
}
