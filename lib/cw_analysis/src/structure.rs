//! Structural well-formedness checks of a class file (verification pass 2).
//!
//! These checks only look at the class file tables: versions, constant pool
//! entries, names and descriptors grammar, access flags, attribute shapes.
//! They do not look at the bytecode, which is the job of the typing pass.
//! The first violated rule aborts the pass.

use crate::classpath::ClassPath;
use crate::errors::AnalysisResult;
use cw_classfile::attributes::{self, Attribute, AttributeKind};
use cw_classfile::classes::{ClassFile, ClassFlags, JAVA_LANG_OBJECT};
use cw_classfile::code::Code;
use cw_classfile::constants::{Constant, ConstantPool};
use cw_classfile::descriptors::MAX_ARRAY_DIMENSIONS;
use cw_classfile::fields::{FieldFlags, FieldInfo};
use cw_classfile::methods::{MethodFlags, MethodInfo, CLINIT, INIT};
use std::collections::HashSet;
use thiserror::Error;

pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 49;
pub const MAX_MINOR_VERSION: u16 = 3;
pub const MAX_METHOD_ARG_WORDS: usize = 255;

const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";

const KEYWORDS: &[&str] = &[
    "abstract",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "extends",
    "false",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "true",
    "try",
    "void",
    "volatile",
    "while",
];

/// A violated structural rule. Numbered variants distinguish the several
/// rules sharing a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("Verification Pass 2: Bad minor version (1)")]
    BadMinorVersion,

    #[error("Verification Pass 2: Bad major version (1)")]
    BadMajorVersion,

    #[error("Verification Pass 2: checkConstantPool ({0})")]
    CheckConstantPool(u8),

    #[error("Verification Pass 2: Bad identifier ({0})")]
    BadIdentifier(u8),

    #[error("Verification Pass 2: Bad class name ({0})")]
    BadClassName(u8),

    #[error("Verification Pass 2: Reference to non-existent class (1) {0}")]
    NonExistentClass(String),

    #[error("Verification Pass 2: Bad field descriptor ({0})")]
    BadFieldDescriptor(u8),

    #[error("Verification Pass 2: checkMethodDescriptor ({0})")]
    CheckMethodDescriptor(u8),

    #[error("Verification Pass 2: Invalid access flag for class or interface ({0})")]
    BadClassFlags(u8),

    #[error("Verification Pass 2: Bad class index ({0})")]
    BadClassIndex(u8),

    #[error("Verification Pass 2: Bad superclass index ({0})")]
    BadSuperclassIndex(u8),

    #[error("Verification Pass 2: Bad superclass ({0})")]
    BadSuperclass(u8),

    #[error("Verification Pass 2: Bad interface index ({0})")]
    BadInterfaceIndex(u8),

    #[error("Verification Pass 2: Bad field access flag ({0})")]
    BadFieldAccessFlags(u8),

    #[error("Verification Pass 2: Bad field name or desc (1)")]
    BadFieldNameOrDescriptor,

    #[error("Verification Pass 2: Bad field attribute")]
    BadFieldAttribute,

    #[error("Verification Pass 2: Bad field const type ({0})")]
    BadFieldConstantType(u8),

    #[error("Verification Pass 2: Fields w/ same name or desc (1)")]
    DuplicateField,

    #[error("Verification Pass 2: Bad method name or desc (1)")]
    BadMethodNameOrDescriptor,

    #[error("Verification Pass 2: Bad method access flag ({0})")]
    BadMethodAccessFlags(u8),

    #[error("Verification Pass 2: > 1 code attr (1)")]
    MultipleCodeAttributes,

    #[error("Verification Pass 2: Bad except. attr ({0})")]
    BadExceptionsAttribute(u8),

    #[error("Verification Pass 2: > 1 except. attr (1)")]
    MultipleExceptionsAttributes,

    #[error("Verification Pass 2: No code attr found (1)")]
    MissingCode,

    #[error("Verification Pass 2: Code attr found (1)")]
    UnexpectedCode,

    #[error("Verification Pass 2: Bad except. tbl entry ({0})")]
    BadExceptionTableEntry(u8),

    #[error("Verification Pass 2: Bad except. cls (1)")]
    BadExceptionClass,

    #[error("Verification Pass 2: Bad maxLocals ({0})")]
    BadMaxLocals(u8),

    #[error("Verification Pass 2: Bad lnt attr ({0})")]
    BadLineNumberTable(u8),

    #[error("Verification Pass 2: Bad lvt attr ({0})")]
    BadLocalVariableTable(u8),

    #[error("Verification Pass 2: Max. arg words limit ({0})")]
    TooManyArgWords(u8),

    #[error("Verification Pass 2: Methods w/ same name or desc (1)")]
    DuplicateMethod,

    #[error("Verification Pass 2: Bad SourceFileAttribute count (1)")]
    BadSourceFileCount,

    #[error("Verification Pass 2: Bad SourceFileAttribute length (1)")]
    BadSourceFileLength,
}

type StructureResult<T> = Result<T, StructureError>;

/// Runs all structural checks onto `class`.
///
/// Class names met in the constant pool must be found in `classpath` (the
/// checked class itself excepted), and so must catch types and their
/// superclasses up to `java/lang/Throwable`.
///
/// # Errors
///
/// The first violated rule is returned as an [`AnalysisError::Structure`],
/// other errors come from class path lookups.
///
/// [`AnalysisError::Structure`]: crate::errors::AnalysisError::Structure
pub fn check_class(class: &ClassFile, classpath: &ClassPath) -> AnalysisResult<()> {
    let checker = Checker {
        class,
        pool: class.constant_pool(),
        classpath,
        this_name: class.name().ok(),
    };
    log::debug!(
        "structural checks of {}",
        checker.this_name.as_deref().unwrap_or("<unnamed class>")
    );
    checker.check_versions()?;
    checker.check_constant_pool()?;
    checker.check_class_flags()?;
    checker.check_class_indices()?;
    checker.check_interfaces()?;
    checker.check_fields()?;
    checker.check_methods()?;
    checker.check_source_file()?;
    log::debug!("structural checks passed");
    Ok(())
}

struct Checker<'a> {
    class: &'a ClassFile,
    pool: &'a ConstantPool,
    classpath: &'a ClassPath,
    this_name: Option<String>,
}

impl<'a> Checker<'a> {
    fn check_versions(&self) -> StructureResult<()> {
        if self.class.minor_version() > MAX_MINOR_VERSION {
            return Err(StructureError::BadMinorVersion);
        }
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&self.class.major_version()) {
            return Err(StructureError::BadMajorVersion);
        }
        Ok(())
    }

    fn is_utf8(&self, index: u16) -> bool {
        matches!(self.pool.try_get(usize::from(index)), Some(Constant::Utf8(_)))
    }

    fn is_class(&self, index: u16) -> bool {
        matches!(self.pool.try_get(usize::from(index)), Some(Constant::Class { .. }))
    }

    fn utf8(&self, index: u16) -> Option<String> {
        self.pool.try_get(usize::from(index)).and_then(Constant::utf8)
    }

    /// Name and descriptor of the member referenced by a field or method
    /// reference; `code` numbers the failure.
    fn member(&self, class_index: u16, nat_index: u16, code: u8) -> StructureResult<(String, String)> {
        if !self.is_class(class_index) {
            return Err(StructureError::CheckConstantPool(code));
        }
        self.pool
            .name_and_type(usize::from(nat_index))
            .map_err(|_| StructureError::CheckConstantPool(code))
    }

    fn check_constant_pool(&self) -> AnalysisResult<()> {
        for (index, constant) in self.pool.iter() {
            log::trace!("checking constant #{index}: {constant}");
            match constant {
                Constant::Utf8(bytes) => {
                    if bytes.iter().any(|b| *b == 0 || *b >= 0xf0) {
                        return Err(StructureError::CheckConstantPool(1).into());
                    }
                }
                Constant::Unicode
                | Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::NameAndType { .. } => (),
                Constant::Class { name_index } => {
                    let name = self
                        .utf8(*name_index)
                        .ok_or(StructureError::BadClassName(1))?;
                    self.check_class_name(&name)?;
                }
                Constant::String { string_index } => {
                    if !self.is_utf8(*string_index) {
                        return Err(StructureError::CheckConstantPool(2).into());
                    }
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                } => {
                    let (name, descriptor) = self.member(*class_index, *name_and_type_index, 3)?;
                    check_field_descriptor(&descriptor)?;
                    check_identifier(&name)?;
                }
                Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    let (name, descriptor) = self.member(*class_index, *name_and_type_index, 3)?;
                    let (_, return_words) = check_method_descriptor(&descriptor)?;
                    if name == INIT || name == CLINIT {
                        if return_words > 0 {
                            return Err(StructureError::CheckConstantPool(4).into());
                        }
                    } else {
                        check_identifier(&name)?;
                    }
                }
                Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    let (name, descriptor) = self.member(*class_index, *name_and_type_index, 5)?;
                    check_method_descriptor(&descriptor)?;
                    check_identifier(&name)?;
                }
                _ => return Err(StructureError::CheckConstantPool(6).into()),
            }
        }
        Ok(())
    }

    /// Checks a `Class` entry name: an array descriptor, or a binary class
    /// name that can be found on the class path.
    fn check_class_name(&self, name: &str) -> AnalysisResult<()> {
        if name.starts_with('[') {
            return Ok(check_field_descriptor(name)?);
        }
        if !name.chars().next().is_some_and(is_java_letter) {
            return Err(StructureError::BadClassName(1).into());
        }
        let segments: Vec<&str> = name.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || !s.chars().all(is_java_letter_or_digit))
        {
            return Err(StructureError::BadClassName(2).into());
        }
        if let Some((last, packages)) = segments.split_last() {
            if packages.iter().any(|s| is_keyword(s)) {
                return Err(StructureError::BadClassName(3).into());
            }
            if is_keyword(last) {
                return Err(StructureError::BadClassName(4).into());
            }
        }
        if self.this_name.as_deref() != Some(name) && !self.classpath.exists(name)? {
            return Err(StructureError::NonExistentClass(name.to_string()).into());
        }
        Ok(())
    }

    fn check_class_flags(&self) -> StructureResult<()> {
        let flags = self.class.flags()
            & (ClassFlags::ACC_PUBLIC
                | ClassFlags::ACC_FINAL
                | ClassFlags::ACC_SUPER
                | ClassFlags::ACC_INTERFACE
                | ClassFlags::ACC_ABSTRACT);
        if flags.contains(ClassFlags::ACC_INTERFACE) {
            if !flags.contains(ClassFlags::ACC_ABSTRACT) || flags.contains(ClassFlags::ACC_FINAL) {
                return Err(StructureError::BadClassFlags(1));
            }
        } else if flags.contains(ClassFlags::ACC_ABSTRACT | ClassFlags::ACC_FINAL) {
            return Err(StructureError::BadClassFlags(2));
        }
        Ok(())
    }

    fn check_class_indices(&self) -> AnalysisResult<()> {
        let count = self.pool.count();
        let this_class = self.class.this_class_index();
        if this_class == 0 || usize::from(this_class) >= count {
            return Err(StructureError::BadClassIndex(1).into());
        }
        if !self.is_class(this_class) {
            return Err(StructureError::BadClassIndex(2).into());
        }

        let super_class = self.class.super_class_index();
        if usize::from(super_class) >= count {
            return Err(StructureError::BadSuperclassIndex(1).into());
        }
        let super_name = if super_class == 0 {
            if self.this_name.as_deref() != Some(JAVA_LANG_OBJECT) {
                return Err(StructureError::BadSuperclass(2).into());
            }
            None
        } else {
            let name = self
                .pool
                .class_name(usize::from(super_class))
                .map_err(|_| StructureError::BadSuperclassIndex(2))?;
            if name != JAVA_LANG_OBJECT
                && self
                    .classpath
                    .load(&name)?
                    .flags()
                    .contains(ClassFlags::ACC_FINAL)
            {
                return Err(StructureError::BadSuperclass(1).into());
            }
            Some(name)
        };

        if self.class.is_interface() {
            match super_name {
                None => return Err(StructureError::BadSuperclassIndex(3).into()),
                Some(name) if name != JAVA_LANG_OBJECT => {
                    return Err(StructureError::BadSuperclass(3).into())
                }
                Some(_) => (),
            }
        }
        Ok(())
    }

    fn check_interfaces(&self) -> StructureResult<()> {
        for index in self.class.interface_indices() {
            if *index == 0 || usize::from(*index) >= self.pool.count() {
                return Err(StructureError::BadInterfaceIndex(1));
            }
            if !self.is_class(*index) {
                return Err(StructureError::BadInterfaceIndex(2));
            }
        }
        Ok(())
    }

    fn check_fields(&self) -> StructureResult<()> {
        let mut seen = HashSet::new();
        for field in self.class.iter_fields() {
            self.check_field_flags(field)?;
            let (Some(name), Some(descriptor)) = (
                self.utf8(field.name_index()),
                self.utf8(field.descriptor_index()),
            ) else {
                return Err(StructureError::BadFieldNameOrDescriptor);
            };
            self.check_constant_value(field, &descriptor)?;
            if !seen.insert((name, descriptor)) {
                return Err(StructureError::DuplicateField);
            }
        }
        Ok(())
    }

    fn check_field_flags(&self, field: &FieldInfo) -> StructureResult<()> {
        let flags = field.flags()
            & (FieldFlags::ACC_PUBLIC
                | FieldFlags::ACC_PRIVATE
                | FieldFlags::ACC_PROTECTED
                | FieldFlags::ACC_STATIC
                | FieldFlags::ACC_FINAL
                | FieldFlags::ACC_VOLATILE
                | FieldFlags::ACC_TRANSIENT);
        if self.class.is_interface() {
            if flags.intersects(
                FieldFlags::ACC_PRIVATE
                    | FieldFlags::ACC_PROTECTED
                    | FieldFlags::ACC_VOLATILE
                    | FieldFlags::ACC_TRANSIENT,
            ) {
                return Err(StructureError::BadFieldAccessFlags(1));
            }
            if !flags.contains(FieldFlags::ACC_STATIC | FieldFlags::ACC_FINAL | FieldFlags::ACC_PUBLIC) {
                return Err(StructureError::BadFieldAccessFlags(2));
            }
        } else {
            let visibility = flags
                & (FieldFlags::ACC_PUBLIC | FieldFlags::ACC_PRIVATE | FieldFlags::ACC_PROTECTED);
            if visibility.bits().count_ones() > 1
                || flags.contains(FieldFlags::ACC_FINAL | FieldFlags::ACC_VOLATILE)
            {
                return Err(StructureError::BadFieldAccessFlags(3));
            }
        }
        Ok(())
    }

    fn check_constant_value(&self, field: &FieldInfo, descriptor: &str) -> StructureResult<()> {
        let mut count = 0;
        for attr in field
            .iter_attributes()
            .filter(|a| a.name() == attributes::CONSTANT_VALUE)
        {
            count += 1;
            if count > 1 || attr.length() != 2 {
                return Err(StructureError::BadFieldAttribute);
            }
            let constant = match attr.kind() {
                AttributeKind::ConstantValue { index } => self.pool.try_get(usize::from(*index)),
                _ => None,
            };
            let (allowed, code): (&[&str], u8) = match constant {
                Some(Constant::Integer(_)) => (&["I", "S", "C", "B", "Z"], 1),
                Some(Constant::Float(_)) => (&["F"], 2),
                Some(Constant::Long(_)) => (&["J"], 3),
                Some(Constant::Double(_)) => (&["D"], 4),
                Some(Constant::String { .. }) => (&["Ljava/lang/String;"], 5),
                _ => return Err(StructureError::BadFieldConstantType(6)),
            };
            if !allowed.contains(&descriptor) {
                return Err(StructureError::BadFieldConstantType(code));
            }
        }
        Ok(())
    }

    fn check_methods(&self) -> AnalysisResult<()> {
        let mut seen = HashSet::new();
        for method in self.class.iter_methods() {
            let (Some(name), Some(descriptor)) = (
                self.utf8(method.name_index()),
                self.utf8(method.descriptor_index()),
            ) else {
                return Err(StructureError::BadMethodNameOrDescriptor.into());
            };
            log::trace!("checking method {name}{descriptor}");
            let flags = method.flags()
                & (MethodFlags::ACC_PUBLIC
                    | MethodFlags::ACC_PRIVATE
                    | MethodFlags::ACC_PROTECTED
                    | MethodFlags::ACC_STATIC
                    | MethodFlags::ACC_FINAL
                    | MethodFlags::ACC_SYNCHRONIZED
                    | MethodFlags::ACC_NATIVE
                    | MethodFlags::ACC_ABSTRACT);
            if name != CLINIT {
                self.check_method_flags(&name, flags)?;
            }
            self.check_method_attributes(method)?;

            let code_count = method
                .iter_attributes()
                .filter(|a| a.name() == attributes::CODE)
                .count();
            if name == CLINIT || !flags.intersects(MethodFlags::ACC_NATIVE | MethodFlags::ACC_ABSTRACT) {
                if code_count != 1 {
                    return Err(StructureError::MissingCode.into());
                }
            } else if code_count != 0 {
                return Err(StructureError::UnexpectedCode.into());
            }

            let (arg_words, _) = check_method_descriptor(&descriptor)?;
            let is_static = flags.contains(MethodFlags::ACC_STATIC);
            if let Some(code) = method.code() {
                self.check_code(code, arg_words, is_static)?;
            }
            if is_static {
                if arg_words > MAX_METHOD_ARG_WORDS {
                    return Err(StructureError::TooManyArgWords(1).into());
                }
            } else if arg_words > MAX_METHOD_ARG_WORDS - 1 {
                return Err(StructureError::TooManyArgWords(2).into());
            }

            if !seen.insert((name, descriptor)) {
                return Err(StructureError::DuplicateMethod.into());
            }
        }
        Ok(())
    }

    fn check_method_flags(&self, name: &str, flags: MethodFlags) -> StructureResult<()> {
        if self.class.is_interface() {
            if flags.intersects(
                MethodFlags::ACC_PRIVATE
                    | MethodFlags::ACC_PROTECTED
                    | MethodFlags::ACC_STATIC
                    | MethodFlags::ACC_FINAL
                    | MethodFlags::ACC_SYNCHRONIZED
                    | MethodFlags::ACC_NATIVE,
            ) {
                return Err(StructureError::BadMethodAccessFlags(1));
            }
            if !flags.contains(MethodFlags::ACC_ABSTRACT | MethodFlags::ACC_PUBLIC) {
                return Err(StructureError::BadMethodAccessFlags(2));
            }
        } else {
            if flags.contains(MethodFlags::ACC_ABSTRACT)
                && flags.intersects(
                    MethodFlags::ACC_FINAL
                        | MethodFlags::ACC_NATIVE
                        | MethodFlags::ACC_SYNCHRONIZED
                        | MethodFlags::ACC_PRIVATE
                        | MethodFlags::ACC_STATIC,
                )
            {
                return Err(StructureError::BadMethodAccessFlags(3));
            }
            if name == INIT
                && flags.intersects(
                    MethodFlags::ACC_STATIC
                        | MethodFlags::ACC_FINAL
                        | MethodFlags::ACC_SYNCHRONIZED
                        | MethodFlags::ACC_NATIVE
                        | MethodFlags::ACC_ABSTRACT,
                )
            {
                return Err(StructureError::BadMethodAccessFlags(4));
            }
        }
        let visibility =
            flags & (MethodFlags::ACC_PUBLIC | MethodFlags::ACC_PRIVATE | MethodFlags::ACC_PROTECTED);
        if visibility.bits().count_ones() > 1 {
            return Err(StructureError::BadMethodAccessFlags(5));
        }
        Ok(())
    }

    fn check_method_attributes(&self, method: &MethodInfo) -> StructureResult<()> {
        let mut code_count = 0;
        let mut exceptions_count = 0;
        for attr in method.iter_attributes() {
            match attr.name() {
                attributes::CODE => {
                    code_count += 1;
                    if code_count > 1 {
                        return Err(StructureError::MultipleCodeAttributes);
                    }
                }
                attributes::EXCEPTIONS => {
                    let AttributeKind::Exceptions { indices } = attr.kind() else {
                        return Err(StructureError::BadExceptionsAttribute(1));
                    };
                    if attr.length() as usize != indices.len() * 2 + 2 {
                        return Err(StructureError::BadExceptionsAttribute(1));
                    }
                    if !indices.iter().all(|i| self.is_class(*i)) {
                        return Err(StructureError::BadExceptionsAttribute(2));
                    }
                    exceptions_count += 1;
                    if exceptions_count > 1 {
                        return Err(StructureError::MultipleExceptionsAttributes);
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn check_code(&self, code: &Code, arg_words: usize, is_static: bool) -> AnalysisResult<()> {
        let code_len = code.len();
        for entry in code.exception_table() {
            let (start, end, handler) = (
                usize::from(entry.start_pc),
                usize::from(entry.end_pc),
                usize::from(entry.handler_pc),
            );
            if start >= code_len || end > code_len || handler >= code_len || start >= end {
                return Err(StructureError::BadExceptionTableEntry(1).into());
            }
            if entry.catch_type != 0 {
                self.check_catch_type(entry.catch_type)?;
            }
        }

        if is_static {
            if arg_words > code.max_locals() {
                return Err(StructureError::BadMaxLocals(1).into());
            }
        } else if arg_words + 1 > code.max_locals() {
            return Err(StructureError::BadMaxLocals(2).into());
        }

        for attr in code.iter_attributes() {
            match attr.name() {
                attributes::LINE_NUMBER_TABLE => check_line_numbers(attr, code_len)?,
                attributes::LOCAL_VARIABLE_TABLE => self.check_local_variables(attr, code)?,
                _ => (),
            }
        }
        Ok(())
    }

    fn check_catch_type(&self, index: u16) -> StructureResult<()> {
        let Ok(name) = self.pool.class_name(usize::from(index)) else {
            return Err(StructureError::BadExceptionTableEntry(2));
        };
        if name == JAVA_LANG_THROWABLE {
            return Ok(());
        }
        match self.classpath.is_subclass_of(&name, JAVA_LANG_THROWABLE) {
            Ok(true) => Ok(()),
            Ok(false) => Err(StructureError::BadExceptionClass),
            Err(err) => {
                log::debug!("catch type {name}: {err}");
                Err(StructureError::BadExceptionTableEntry(2))
            }
        }
    }

    fn check_local_variables(&self, attr: &Attribute, code: &Code) -> StructureResult<()> {
        let AttributeKind::LocalVariableTable(vars) = attr.kind() else {
            return Err(StructureError::BadLocalVariableTable(1));
        };
        if attr.length() as usize != vars.len() * 10 + 2 {
            return Err(StructureError::BadLocalVariableTable(1));
        }
        let code_len = code.len();
        let mut ranges: Vec<(u16, usize, usize)> = Vec::new();
        for var in vars {
            let start = usize::from(var.start_pc);
            let end = start + usize::from(var.length);
            if start >= code_len {
                return Err(StructureError::BadLocalVariableTable(2));
            }
            if end > code_len {
                return Err(StructureError::BadLocalVariableTable(3));
            }
            let (Some(name), Some(descriptor)) =
                (self.utf8(var.name_index), self.utf8(var.descriptor_index))
            else {
                return Err(StructureError::BadLocalVariableTable(4));
            };
            if name != "this" && check_identifier(&name).is_err() {
                return Err(StructureError::BadLocalVariableTable(5));
            }
            if check_field_descriptor(&descriptor).is_err() {
                return Err(StructureError::BadLocalVariableTable(6));
            }
            if usize::from(var.index) >= code.max_locals() {
                return Err(StructureError::BadLocalVariableTable(7));
            }
            // a slot may be reused by several variables with disjoint scopes
            if ranges
                .iter()
                .any(|(index, s, e)| *index == var.index && start < *e && *s < end)
            {
                return Err(StructureError::BadLocalVariableTable(8));
            }
            ranges.push((var.index, start, end));
        }
        Ok(())
    }

    fn check_source_file(&self) -> StructureResult<()> {
        let mut count = 0;
        for attr in self
            .class
            .iter_attributes()
            .filter(|a| a.name() == attributes::SOURCE_FILE)
        {
            count += 1;
            if count > 1 {
                return Err(StructureError::BadSourceFileCount);
            }
            if attr.length() != 2 {
                return Err(StructureError::BadSourceFileLength);
            }
        }
        Ok(())
    }
}

fn check_line_numbers(attr: &Attribute, code_len: usize) -> StructureResult<()> {
    let AttributeKind::LineNumberTable(lines) = attr.kind() else {
        return Err(StructureError::BadLineNumberTable(1));
    };
    if attr.length() as usize != lines.len() * 4 + 2 {
        return Err(StructureError::BadLineNumberTable(1));
    }
    if lines.iter().any(|l| usize::from(l.start_pc) >= code_len) {
        return Err(StructureError::BadLineNumberTable(2));
    }
    Ok(())
}

fn is_java_letter(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_java_letter_or_digit(c: char) -> bool {
    is_java_letter(c) || c.is_numeric()
}

fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// Checks that `name` is a Java identifier that is not a keyword.
pub fn check_identifier(name: &str) -> StructureResult<()> {
    let mut chars = name.chars();
    if !chars.next().is_some_and(is_java_letter) {
        return Err(StructureError::BadIdentifier(1));
    }
    if !chars.all(is_java_letter_or_digit) {
        return Err(StructureError::BadIdentifier(2));
    }
    if is_keyword(name) {
        return Err(StructureError::BadIdentifier(3));
    }
    Ok(())
}

/// Checks a field descriptor: up to 255 array dimensions, then a base type
/// or a class name made of identifiers.
pub fn check_field_descriptor(descriptor: &str) -> StructureResult<()> {
    let body = descriptor.trim_start_matches('[');
    if descriptor.len() - body.len() > MAX_ARRAY_DIMENSIONS {
        return Err(StructureError::BadFieldDescriptor(1));
    }
    let mut chars = body.chars();
    match chars.next() {
        Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
            if chars.as_str().is_empty() {
                Ok(())
            } else {
                Err(StructureError::BadFieldDescriptor(2))
            }
        }
        Some('L') => check_class_descriptor(chars.as_str()),
        _ => Err(StructureError::BadFieldDescriptor(9)),
    }
}

/// Checks the `name;` part of a class type descriptor.
fn check_class_descriptor(rest: &str) -> StructureResult<()> {
    if !rest.chars().next().is_some_and(is_java_letter) {
        return Err(StructureError::BadFieldDescriptor(3));
    }
    let Some((name, trailing)) = rest.split_once(';') else {
        return Err(StructureError::BadFieldDescriptor(8));
    };
    let segments: Vec<&str> = name.split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(StructureError::BadFieldDescriptor(if i == last { 6 } else { 4 }));
        }
        if !segment.chars().all(is_java_letter_or_digit) {
            return Err(StructureError::BadFieldDescriptor(4));
        }
        if is_keyword(segment) {
            return Err(StructureError::BadFieldDescriptor(if i == last { 7 } else { 5 }));
        }
    }
    if !trailing.is_empty() {
        return Err(StructureError::BadFieldDescriptor(8));
    }
    Ok(())
}

/// Length of the field descriptor at the start of `s`, if any.
fn leading_field_descriptor(s: &str) -> Option<usize> {
    let dims = s.len() - s.trim_start_matches('[').len();
    let body = &s[dims..];
    match body.chars().next()? {
        'L' => body.find(';').map(|end| dims + end + 1),
        c => Some(dims + c.len_utf8()),
    }
}

/// Checks a method descriptor, returning the number of words taken by its
/// arguments and by its return value.
pub fn check_method_descriptor(descriptor: &str) -> StructureResult<(usize, usize)> {
    let mut rest = descriptor
        .strip_prefix('(')
        .ok_or(StructureError::CheckMethodDescriptor(1))?;
    let mut arg_words = 0;
    loop {
        match rest.chars().next() {
            Some(')') => break,
            Some('B' | 'C' | 'F' | 'I' | 'S' | 'Z') => {
                arg_words += 1;
                rest = &rest[1..];
            }
            Some('J' | 'D') => {
                arg_words += 2;
                rest = &rest[1..];
            }
            Some('L' | '[') => {
                let len = leading_field_descriptor(rest)
                    .ok_or(StructureError::CheckMethodDescriptor(1))?;
                check_field_descriptor(&rest[..len])?;
                arg_words += 1;
                rest = &rest[len..];
            }
            _ => return Err(StructureError::CheckMethodDescriptor(1)),
        }
    }

    let ret = &rest[1..];
    let (code, return_words) = match ret.chars().next() {
        Some('B' | 'C' | 'F' | 'I' | 'S' | 'Z') => (2, 1),
        Some('J' | 'D') => (2, 2),
        Some('V') => (3, 0),
        Some('L') => (4, 1),
        Some('[') => (5, 1),
        _ => return Err(StructureError::CheckMethodDescriptor(6)),
    };
    let len = if code >= 4 {
        let len = leading_field_descriptor(ret).ok_or(StructureError::CheckMethodDescriptor(code))?;
        check_field_descriptor(&ret[..len])?;
        len
    } else {
        1
    };
    if ret.len() != len {
        return Err(StructureError::CheckMethodDescriptor(code));
    }
    Ok((arg_words, return_words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalysisError;
    use cw_classfile::testing::ClassBuilder;

    const RETURN: &[u8] = &[0xb1];

    fn structure_error(builder: &ClassBuilder, classpath: &ClassPath) -> Option<StructureError> {
        match check_class(&builder.parse().unwrap(), classpath) {
            Ok(()) => None,
            Err(AnalysisError::Structure(err)) => Some(err),
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    fn check(builder: &ClassBuilder) -> Option<StructureError> {
        structure_error(builder, &ClassPath::default())
    }

    fn exceptions_classpath() -> ClassPath {
        let classpath = ClassPath::default();
        for (name, parent) in [
            ("java/lang/Throwable", JAVA_LANG_OBJECT),
            ("java/lang/Exception", "java/lang/Throwable"),
            ("t/Oops", "java/lang/Exception"),
            ("t/NotAnException", JAVA_LANG_OBJECT),
        ] {
            let mut builder = ClassBuilder::new(name);
            builder.super_class(parent);
            classpath.register(builder.parse().unwrap()).unwrap();
        }
        let mut sealed = ClassBuilder::new("t/Sealed");
        sealed.flags(0x0031);
        classpath.register(sealed.parse().unwrap()).unwrap();
        classpath
    }

    #[test]
    fn well_formed_class() {
        let mut builder = ClassBuilder::new("t/Good");
        builder.method_with_code(0x0001, "<init>", "()V", 1, 1, RETURN, &[]);
        builder.method_with_code(0x0009, "run", "(JI[Ljava/lang/Object;)V", 0, 4, RETURN, &[]);
        builder.method(0x0101, "peek", "()I", Vec::new());
        builder.method_with_code(0x0008, "<clinit>", "()V", 0, 0, RETURN, &[]);
        builder.field(0x0019, "MAX", "I", Vec::new());
        let source = builder.utf8("Good.java");
        let attr = builder.attribute("SourceFile", &source.to_be_bytes());
        builder.class_attribute(attr);
        assert_eq!(None, check(&builder));
    }

    #[test]
    fn versions() {
        let mut builder = ClassBuilder::new("t/V");
        builder.version(45, 3);
        assert_eq!(None, check(&builder));
        builder.version(49, 4);
        assert_eq!(Some(StructureError::BadMinorVersion), check(&builder));
        builder.version(50, 0);
        assert_eq!(Some(StructureError::BadMajorVersion), check(&builder));
        builder.version(44, 0);
        assert_eq!(Some(StructureError::BadMajorVersion), check(&builder));
    }

    #[test]
    fn constant_pool_entries() {
        let mut builder = ClassBuilder::new("t/Cp");
        builder.utf8_bytes(b"nul\0byte");
        assert_eq!(Some(StructureError::CheckConstantPool(1)), check(&builder));

        let mut builder = ClassBuilder::new("t/Cp");
        let integer = builder.integer(3);
        let mut raw = vec![8];
        raw.extend(integer.to_be_bytes());
        builder.raw_constant(raw, 1);
        assert_eq!(Some(StructureError::CheckConstantPool(2)), check(&builder));

        let mut builder = ClassBuilder::new("t/Cp");
        let nat = builder.name_and_type("x", "I");
        let mut raw = vec![9];
        raw.extend(nat.to_be_bytes());
        raw.extend(nat.to_be_bytes());
        builder.raw_constant(raw, 1);
        assert_eq!(Some(StructureError::CheckConstantPool(3)), check(&builder));

        let mut builder = ClassBuilder::new("t/Cp");
        builder.method_ref("t/Cp", "<init>", "()I");
        assert_eq!(Some(StructureError::CheckConstantPool(4)), check(&builder));

        let mut builder = ClassBuilder::new("t/Cp");
        builder.method_ref("t/Cp", "<init>", "()V");
        builder.field_ref("t/Cp", "count", "J");
        builder.interface_method_ref("t/Cp", "size", "()I");
        assert_eq!(None, check(&builder));

        let mut builder = ClassBuilder::new("t/Cp");
        let descriptor = builder.utf8("()V");
        let mut raw = vec![16];
        raw.extend(descriptor.to_be_bytes());
        builder.raw_constant(raw, 1);
        assert_eq!(Some(StructureError::CheckConstantPool(6)), check(&builder));
    }

    #[test]
    fn class_names() {
        let classpath = ClassPath::default();
        let mut other = ClassBuilder::new("p/Other");
        other.super_class(JAVA_LANG_OBJECT);
        classpath.register(other.parse().unwrap()).unwrap();

        let cases = [
            ("p/Other", None),
            ("[[Lp/Other;", None),
            ("9p/Other", Some(StructureError::BadClassName(1))),
            ("p//Other", Some(StructureError::BadClassName(2))),
            ("p/Ot-her", Some(StructureError::BadClassName(2))),
            ("int/Other", Some(StructureError::BadClassName(3))),
            ("p/class", Some(StructureError::BadClassName(4))),
            ("p/Missing", Some(StructureError::NonExistentClass("p/Missing".to_string()))),
        ];
        for (name, expected) in cases {
            let mut builder = ClassBuilder::new("t/Names");
            builder.class(name);
            assert_eq!(expected, structure_error(&builder, &classpath), "{name}");
        }
    }

    #[test]
    fn identifiers() {
        assert_eq!(Ok(()), check_identifier("_count$1"));
        assert_eq!(Err(StructureError::BadIdentifier(1)), check_identifier("1st"));
        assert_eq!(Err(StructureError::BadIdentifier(1)), check_identifier(""));
        assert_eq!(Err(StructureError::BadIdentifier(2)), check_identifier("a-b"));
        assert_eq!(Err(StructureError::BadIdentifier(3)), check_identifier("while"));
    }

    #[test]
    fn field_descriptors() {
        assert_eq!(Ok(()), check_field_descriptor("[[J"));
        assert_eq!(Ok(()), check_field_descriptor("Ljava/lang/String;"));
        let too_deep = format!("{}I", "[".repeat(256));
        let cases = [
            (too_deep.as_str(), 1),
            ("II", 2),
            ("L1a;", 3),
            ("La//b;", 4),
            ("La/b-c;", 4),
            ("Lnew/b;", 5),
            ("La/;", 6),
            ("La/goto;", 7),
            ("La/b;I", 8),
            ("La/b", 8),
            ("V", 9),
            ("", 9),
        ];
        for (descriptor, code) in cases {
            assert_eq!(
                Err(StructureError::BadFieldDescriptor(code)),
                check_field_descriptor(descriptor),
                "{descriptor}"
            );
        }
    }

    #[test]
    fn method_descriptors() {
        assert_eq!(Ok((0, 0)), check_method_descriptor("()V"));
        assert_eq!(Ok((5, 2)), check_method_descriptor("(JI[[DLa/B;)J"));
        assert_eq!(Ok((1, 1)), check_method_descriptor("([Ljava/lang/Object;)[I"));
        let cases = [
            ("V", 1),
            ("(V)V", 1),
            ("(I", 1),
            ("()II", 2),
            ("()VV", 3),
            ("()La/B;I", 4),
            ("()[II", 5),
            ("()", 6),
            ("()Q", 6),
        ];
        for (descriptor, code) in cases {
            assert_eq!(
                Err(StructureError::CheckMethodDescriptor(code)),
                check_method_descriptor(descriptor),
                "{descriptor}"
            );
        }
        assert_eq!(
            Err(StructureError::BadFieldDescriptor(7)),
            check_method_descriptor("(La/int;)V")
        );
    }

    #[test]
    fn class_flags_and_indices() {
        let mut builder = ClassBuilder::new("t/F");
        builder.flags(0x0411);
        assert_eq!(Some(StructureError::BadClassFlags(2)), check(&builder));
        builder.flags(0x0201);
        assert_eq!(Some(StructureError::BadClassFlags(1)), check(&builder));
        builder.flags(0x0601);
        assert_eq!(None, check(&builder));

        let mut builder = ClassBuilder::new("t/F");
        builder.no_super();
        assert_eq!(Some(StructureError::BadSuperclass(2)), check(&builder));
        let mut builder = ClassBuilder::new(JAVA_LANG_OBJECT);
        builder.no_super();
        assert_eq!(None, check(&builder));

        let mut builder = ClassBuilder::new("t/F");
        builder.super_index(200);
        assert_eq!(Some(StructureError::BadSuperclassIndex(1)), check(&builder));
        let mut builder = ClassBuilder::new("t/F");
        let name = builder.utf8("t/F");
        builder.super_index(name);
        assert_eq!(Some(StructureError::BadSuperclassIndex(2)), check(&builder));

        let classpath = exceptions_classpath();
        let mut builder = ClassBuilder::new("t/F");
        builder.super_class("t/Sealed");
        assert_eq!(Some(StructureError::BadSuperclass(1)), structure_error(&builder, &classpath));
        let mut builder = ClassBuilder::new("t/I");
        builder.flags(0x0601).super_class("t/Oops");
        assert_eq!(Some(StructureError::BadSuperclass(3)), structure_error(&builder, &classpath));

        let mut builder = ClassBuilder::new("t/F");
        builder.interface("t/F");
        assert_eq!(None, check(&builder));    }

    #[test]
    fn fields() {
        let cases: [(u16, u16, Option<StructureError>); 6] = [
            (0x0000, 0x0003, Some(StructureError::BadFieldAccessFlags(3))),
            (0x0000, 0x0050, Some(StructureError::BadFieldAccessFlags(3))),
            (0x0000, 0x00c2, None),
            (0x0601, 0x0019, None),
            (0x0601, 0x001b, Some(StructureError::BadFieldAccessFlags(1))),
            (0x0601, 0x0011, Some(StructureError::BadFieldAccessFlags(2))),
        ];
        for (class_flags, field_flags, expected) in cases {
            let mut builder = ClassBuilder::new("t/Fields");
            if class_flags != 0 {
                builder.flags(class_flags);
            }
            builder.field(field_flags, "value", "I", Vec::new());
            assert_eq!(expected, check(&builder), "{field_flags:#x}");
        }

        let mut builder = ClassBuilder::new("t/Fields");
        builder.field(0x0001, "value", "I", Vec::new());
        builder.field(0x0002, "value", "J", Vec::new());
        assert_eq!(None, check(&builder));
        builder.field(0x0002, "value", "I", Vec::new());
        assert_eq!(Some(StructureError::DuplicateField), check(&builder));
    }

    #[test]
    fn constant_values() {
        let mut builder = ClassBuilder::new("t/Consts");
        let int = builder.integer(7);
        let long = builder.long(7);
        let string = builder.string("seven");
        let cases = [
            ("Z", int, None),
            ("J", long, None),
            ("Ljava/lang/String;", string, None),
            ("J", int, Some(StructureError::BadFieldConstantType(1))),
            ("I", long, Some(StructureError::BadFieldConstantType(3))),
            ("Ljava/lang/Object;", string, Some(StructureError::BadFieldConstantType(5))),
        ];
        for (descriptor, index, expected) in cases {
            let mut class = builder.clone();
            let attr = class.attribute("ConstantValue", &index.to_be_bytes());
            class.field(0x0018, "C", descriptor, vec![attr]);
            assert_eq!(expected, check(&class), "{descriptor}");
        }

        let mut class = builder.clone();
        let first = class.attribute("ConstantValue", &int.to_be_bytes());
        let second = first.clone();
        class.field(0x0018, "C", "I", vec![first, second]);
        assert_eq!(Some(StructureError::BadFieldAttribute), check(&class));
    }

    #[test]
    fn method_flags() {
        let cases: [(u16, &str, u16, Option<StructureError>); 7] = [
            (0x0601, "run", 0x0409, Some(StructureError::BadMethodAccessFlags(1))),
            (0x0601, "run", 0x0400, Some(StructureError::BadMethodAccessFlags(2))),
            (0x0601, "run", 0x0401, None),
            (0x0021, "run", 0x0412, Some(StructureError::BadMethodAccessFlags(3))),
            (0x0021, "<init>", 0x0009, Some(StructureError::BadMethodAccessFlags(4))),
            (0x0021, "run", 0x0103, Some(StructureError::BadMethodAccessFlags(5))),
            (0x0021, "run", 0x0101, None),
        ];
        for (class_flags, name, flags, expected) in cases {
            let mut builder = ClassBuilder::new("t/Methods");
            builder.flags(class_flags);
            builder.method(flags, name, "()V", Vec::new());
            assert_eq!(expected, check(&builder), "{name} {flags:#x}");
        }
    }

    #[test]
    fn method_attributes() {
        let mut builder = ClassBuilder::new("t/M");
        builder.method(0x0001, "run", "()V", Vec::new());
        assert_eq!(Some(StructureError::MissingCode), check(&builder));

        let mut builder = ClassBuilder::new("t/M");
        let code = builder.code(0, 1, RETURN, &[], Vec::new());
        builder.method(0x0401, "run", "()V", vec![code]);
        assert_eq!(Some(StructureError::UnexpectedCode), check(&builder));

        let mut builder = ClassBuilder::new("t/M");
        let code = builder.code(0, 1, RETURN, &[], Vec::new());
        builder.method(0x0001, "run", "()V", vec![code.clone(), code]);
        assert_eq!(Some(StructureError::MultipleCodeAttributes), check(&builder));

        let mut builder = ClassBuilder::new("t/M");
        let object = builder.class(JAVA_LANG_OBJECT);
        let name = builder.utf8("run");
        let mut payload = vec![0, 2];
        payload.extend(object.to_be_bytes());
        payload.extend(name.to_be_bytes());
        let exceptions = builder.attribute("Exceptions", &payload);
        builder.method(0x0101, "run", "()V", vec![exceptions]);
        assert_eq!(Some(StructureError::BadExceptionsAttribute(2)), check(&builder));

        let mut builder = ClassBuilder::new("t/M");
        builder.method_with_code(0x0001, "run", "()V", 0, 1, RETURN, &[]);
        builder.method_with_code(0x0011, "run", "()V", 0, 1, RETURN, &[]);
        assert_eq!(Some(StructureError::DuplicateMethod), check(&builder));

        let mut builder = ClassBuilder::new("t/M");
        let wide = format!("({})V", "J".repeat(128));
        builder.method(0x0109, "wide", &wide, Vec::new());
        assert_eq!(Some(StructureError::TooManyArgWords(1)), check(&builder));
        let mut builder = ClassBuilder::new("t/M");
        let wide = format!("({}I)V", "J".repeat(127));
        builder.method(0x0101, "wide", &wide, Vec::new());
        assert_eq!(Some(StructureError::TooManyArgWords(2)), check(&builder));
    }

    #[test]
    fn code_attributes() {
        let classpath = exceptions_classpath();
        let code = [0x03, 0x3b, 0xb1]; // iconst_0 istore_0 return
        let cases = [
            ((0, 2, 2), Some("t/Oops"), None),
            ((0, 2, 2), None, None),
            ((0, 4, 2), None, Some(StructureError::BadExceptionTableEntry(1))),
            ((2, 2, 2), None, Some(StructureError::BadExceptionTableEntry(1))),
            ((0, 2, 3), None, Some(StructureError::BadExceptionTableEntry(1))),
            ((0, 2, 2), Some("t/NotAnException"), Some(StructureError::BadExceptionClass)),
        ];
        for ((start, end, handler), catch, expected) in cases {
            let mut builder = ClassBuilder::new("t/C");
            let catch_type = catch.map_or(0, |name| builder.class(name));
            builder.method_with_code(0x0009, "run", "()V", 1, 1, &code, &[(start, end, handler, catch_type)]);
            assert_eq!(expected, structure_error(&builder, &classpath), "{catch:?}");
        }

        let mut builder = ClassBuilder::new("t/C");
        let not_a_class = builder.utf8("t/Oops");
        builder.method_with_code(0x0009, "run", "()V", 1, 1, &code, &[(0, 2, 2, not_a_class)]);
        assert_eq!(
            Some(StructureError::BadExceptionTableEntry(2)),
            structure_error(&builder, &classpath)
        );

        // the catch type is known but its superclasses are not
        let partial = ClassPath::default();
        let mut lost = ClassBuilder::new("t/Lost");
        lost.super_class("t/Gone");
        partial.register(lost.parse().unwrap()).unwrap();
        let mut builder = ClassBuilder::new("t/C");
        let catch_type = builder.class("t/Lost");
        builder.method_with_code(0x0009, "run", "()V", 1, 1, &code, &[(0, 2, 2, catch_type)]);
        assert_eq!(
            Some(StructureError::BadExceptionTableEntry(2)),
            structure_error(&builder, &partial)
        );

        let mut builder = ClassBuilder::new("t/C");
        builder.method_with_code(0x0009, "run", "(JI)V", 0, 2, RETURN, &[]);
        assert_eq!(Some(StructureError::BadMaxLocals(1)), check(&builder));
        let mut builder = ClassBuilder::new("t/C");
        builder.method_with_code(0x0001, "run", "(I)V", 0, 1, RETURN, &[]);
        assert_eq!(Some(StructureError::BadMaxLocals(2)), check(&builder));
    }

    fn local_variables(entries: &[(u16, u16, &str, &str, u16)]) -> Option<StructureError> {
        let mut builder = ClassBuilder::new("t/D");
        let mut payload = Vec::new();
        payload.extend(u16::try_from(entries.len()).unwrap().to_be_bytes());
        for (start, length, name, descriptor, index) in entries {
            let name = builder.utf8(name);
            let descriptor = builder.utf8(descriptor);
            for v in [*start, *length, name, descriptor, *index] {
                payload.extend(v.to_be_bytes());
            }
        }
        let lvt = builder.attribute("LocalVariableTable", &payload);
        let code = builder.code(1, 2, &[0x03, 0x3b, 0xb1], &[], vec![lvt]);
        builder.method(0x0001, "run", "()V", vec![code]);
        check(&builder)
    }

    #[test]
    fn debug_tables() {
        let code = [0x03, 0x3b, 0xb1];

        let mut builder = ClassBuilder::new("t/D");
        let lnt = builder.attribute("LineNumberTable", &[0, 1, 0, 5, 0, 10]);
        let code_attr = builder.code(1, 1, &code, &[], vec![lnt]);
        builder.method(0x0009, "run", "()V", vec![code_attr]);
        assert_eq!(Some(StructureError::BadLineNumberTable(2)), check(&builder));

        let mut builder = ClassBuilder::new("t/D");
        let lnt = builder.attribute("LineNumberTable", &[0, 2, 0, 0, 0, 10]);
        let code_attr = builder.code(1, 1, &code, &[], vec![lnt]);
        builder.method(0x0009, "run", "()V", vec![code_attr]);
        assert_eq!(Some(StructureError::BadLineNumberTable(1)), check(&builder));

        assert_eq!(None, local_variables(&[(0, 3, "this", "Lt/D;", 0), (2, 1, "x", "I", 1)]));
        assert_eq!(
            None,
            local_variables(&[(0, 1, "x", "I", 1), (1, 2, "y", "F", 1)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(2)),
            local_variables(&[(3, 0, "x", "I", 1)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(3)),
            local_variables(&[(1, 3, "x", "I", 1)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(5)),
            local_variables(&[(0, 3, "for", "I", 1)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(6)),
            local_variables(&[(0, 3, "x", "Q", 1)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(7)),
            local_variables(&[(0, 3, "x", "I", 2)])
        );
        assert_eq!(
            Some(StructureError::BadLocalVariableTable(8)),
            local_variables(&[(0, 2, "x", "I", 1), (1, 2, "y", "I", 1)])
        );
    }

    #[test]
    fn source_file() {
        let mut builder = ClassBuilder::new("t/S");
        let name = builder.utf8("S.java");
        let attr = builder.attribute("SourceFile", &name.to_be_bytes());
        builder.class_attribute(attr.clone()).class_attribute(attr);
        assert_eq!(Some(StructureError::BadSourceFileCount), check(&builder));

        let mut builder = ClassBuilder::new("t/S");
        let attr = builder.attribute("SourceFile", &[0, 1, 0]);
        builder.class_attribute(attr);
        assert_eq!(Some(StructureError::BadSourceFileLength), check(&builder));
    }
}
