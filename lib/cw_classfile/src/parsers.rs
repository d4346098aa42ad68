use crate::attributes::{self, Attribute, AttributeKind, LineNumber, LocalVariable};
use crate::classes::{ClassFile, ClassFlags, MAGIC};
use crate::code::{Code, ExceptionTableEntry};
use crate::constants::*;
use crate::errors::{ClassError, ClassResult};
use crate::fields::{FieldFlags, FieldInfo};
use crate::methods::{MethodFlags, MethodInfo};
use nom::bytes::complete::take;
use nom::combinator::map;
use nom::multi::{length_count, length_data};
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, be_u8};
use nom::sequence::{pair, tuple};
use nom::Err::Failure;
use nom::{Finish, IResult};

// Attributes are always cut to their declared length before being
// interpreted, so that a malformed optional attribute cannot desynchronize
// the rest of the class. Only `Code` is mandatory to understand: any other
// known attribute that does not decode is kept raw.

type PResult<'a, T> = IResult<&'a [u8], T, ClassError>;

/// Class file parsing function, takes input and returns a freshly built [`ClassFile`] instance.
pub fn parse_class(input: &[u8]) -> ClassResult<ClassFile> {
    log::trace!("parsing class...");
    let (rest, class) = class_parser(input).finish()?;
    if !rest.is_empty() {
        return Err(ClassError::TrailingBytes(rest.len()));
    }
    Ok(class)
}

fn class_parser(input: &[u8]) -> PResult<ClassFile> {
    let (input, magic) = be_u32(input)?;
    if magic != MAGIC {
        return Err(Failure(ClassError::BadMagic(magic)));
    }
    let (input, minor_version) = be_u16(input)?;
    let (input, major_version) = be_u16(input)?;
    log::debug!("Version:      {major_version}.{minor_version}");

    let (input, constant_pool) = constant_pool_parser(input)?;
    log::debug!("Pool count:   {}", constant_pool.count());

    let (input, access_flags) = be_u16(input)?;
    let (input, this_class) = be_u16(input)?;
    let (input, super_class) = be_u16(input)?;
    let (input, interfaces) = length_count(be_u16, be_u16)(input)?;
    let (input, fields) = length_count(be_u16, |i| field_parser(i, &constant_pool))(input)?;
    log::debug!("Fields:       {}", fields.len());
    let (input, methods) = length_count(be_u16, |i| method_parser(i, &constant_pool))(input)?;
    log::debug!("Methods:      {}", methods.len());
    let (input, attributes) = attributes_parser(input, &constant_pool)?;

    Ok((
        input,
        ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags: ClassFlags::from_bits_truncate(access_flags),
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        },
    ))
}

fn constant_pool_parser(input: &[u8]) -> PResult<ConstantPool> {
    let (mut input, count) = be_u16(input)?;
    let count = usize::from(count);
    let mut entries = Vec::with_capacity(count);
    entries.push(Constant::Unusable);
    while entries.len() < count {
        let (rest, constant) = constant_parser(input, entries.len())?;
        input = rest;
        let slots = constant.slots();
        entries.push(constant);
        if slots == 2 {
            if entries.len() < count {
                entries.push(Constant::Unusable);
            } else {
                log::warn!("8-byte constant in the last pool slot");
            }
        }
    }
    Ok((input, ConstantPool::new(entries)))
}

fn constant_parser(input: &[u8], index: usize) -> PResult<Constant> {
    let (input, tag) = be_u8(input)?;
    match tag {
        TAG_UTF8 => map(length_data(be_u16), |bytes: &[u8]| {
            Constant::Utf8(bytes.to_vec())
        })(input),
        TAG_UNICODE => Ok((input, Constant::Unicode)),
        TAG_INTEGER => map(be_i32, Constant::Integer)(input),
        TAG_FLOAT => map(be_f32, Constant::Float)(input),
        TAG_LONG => map(be_i64, Constant::Long)(input),
        TAG_DOUBLE => map(be_f64, Constant::Double)(input),
        TAG_CLASS => map(be_u16, |name_index| Constant::Class { name_index })(input),
        TAG_STRING => map(be_u16, |string_index| Constant::String { string_index })(input),
        TAG_FIELDREF => map(
            pair(be_u16, be_u16),
            |(class_index, name_and_type_index)| Constant::FieldRef {
                class_index,
                name_and_type_index,
            },
        )(input),
        TAG_METHODREF => map(
            pair(be_u16, be_u16),
            |(class_index, name_and_type_index)| Constant::MethodRef {
                class_index,
                name_and_type_index,
            },
        )(input),
        TAG_INTERFACE_METHODREF => map(
            pair(be_u16, be_u16),
            |(class_index, name_and_type_index)| Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            },
        )(input),
        TAG_NAME_AND_TYPE => map(
            pair(be_u16, be_u16),
            |(name_index, descriptor_index)| Constant::NameAndType {
                name_index,
                descriptor_index,
            },
        )(input),
        TAG_METHOD_HANDLE => map(
            pair(be_u8, be_u16),
            |(reference_kind, reference_index)| Constant::MethodHandle {
                reference_kind,
                reference_index,
            },
        )(input),
        TAG_METHOD_TYPE => map(be_u16, |descriptor_index| Constant::MethodType {
            descriptor_index,
        })(input),
        TAG_DYNAMIC => map(
            pair(be_u16, be_u16),
            |(bootstrap_method_attr_index, name_and_type_index)| Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            },
        )(input),
        TAG_INVOKE_DYNAMIC => map(
            pair(be_u16, be_u16),
            |(bootstrap_method_attr_index, name_and_type_index)| Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            },
        )(input),
        TAG_MODULE => map(be_u16, |name_index| Constant::Module { name_index })(input),
        TAG_PACKAGE => map(be_u16, |name_index| Constant::Package { name_index })(input),
        tag => Err(Failure(ClassError::UnknownTag { tag, index })),
    }
}

fn field_parser<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, FieldInfo> {
    let (input, access_flags) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, attributes) = attributes_parser(input, pool)?;
    Ok((
        input,
        FieldInfo {
            access_flags: FieldFlags::from_bits_truncate(access_flags),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn method_parser<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, MethodInfo> {
    let (input, access_flags) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, attributes) = attributes_parser(input, pool)?;
    Ok((
        input,
        MethodInfo {
            access_flags: MethodFlags::from_bits_truncate(access_flags),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn attributes_parser<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Vec<Attribute>> {
    length_count(be_u16, |i| attribute_parser(i, pool))(input)
}

fn attribute_parser<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Attribute> {
    let (input, name_index) = be_u16(input)?;
    let (input, length) = be_u32(input)?;
    let (input, payload) = take(length)(input)?;
    let name = pool.utf8(usize::from(name_index)).map_err(Failure)?;
    log::trace!("attribute {name} ({length} bytes)");

    let kind = if name == attributes::CODE {
        let (_, code) = code_parser(payload, pool)?;
        AttributeKind::Code(code)
    } else {
        match attribute_kind_parser(&name, payload) {
            Ok((_, kind)) => kind,
            Err(err) => {
                log::warn!("{name} attribute could not be decoded, kept raw: {err}");
                AttributeKind::Generic(payload.to_vec())
            }
        }
    };

    Ok((
        input,
        Attribute {
            name_index,
            name,
            length,
            kind,
        },
    ))
}

fn attribute_kind_parser<'a>(name: &str, payload: &'a [u8]) -> PResult<'a, AttributeKind> {
    match name {
        attributes::CONSTANT_VALUE => {
            map(be_u16, |index| AttributeKind::ConstantValue { index })(payload)
        }
        attributes::EXCEPTIONS => map(length_count(be_u16, be_u16), |indices| {
            AttributeKind::Exceptions { indices }
        })(payload),
        attributes::LINE_NUMBER_TABLE => map(
            length_count(
                be_u16,
                map(pair(be_u16, be_u16), |(start_pc, line_number)| LineNumber {
                    start_pc,
                    line_number,
                }),
            ),
            AttributeKind::LineNumberTable,
        )(payload),
        attributes::LOCAL_VARIABLE_TABLE => map(
            length_count(be_u16, local_variable_parser),
            AttributeKind::LocalVariableTable,
        )(payload),
        attributes::SOURCE_FILE => {
            map(be_u16, |index| AttributeKind::SourceFile { index })(payload)
        }
        _ => Ok((&payload[payload.len()..], AttributeKind::Generic(payload.to_vec()))),
    }
}

fn local_variable_parser(input: &[u8]) -> PResult<LocalVariable> {
    map(
        tuple((be_u16, be_u16, be_u16, be_u16, be_u16)),
        |(start_pc, length, name_index, descriptor_index, index)| LocalVariable {
            start_pc,
            length,
            name_index,
            descriptor_index,
            index,
        },
    )(input)
}

fn code_parser<'a>(input: &'a [u8], pool: &ConstantPool) -> PResult<'a, Code> {
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, code) = length_data(be_u32)(input)?;
    let (input, exception_table) = length_count(be_u16, exception_entry_parser)(input)?;
    let (input, attributes) = attributes_parser(input, pool)?;
    if !input.is_empty() {
        log::warn!("{} unused byte(s) at the end of a Code attribute", input.len());
    }
    Ok((
        input,
        Code {
            max_stack,
            max_locals,
            code: code.to_vec(),
            exception_table,
            attributes,
        },
    ))
}

fn exception_entry_parser(input: &[u8]) -> PResult<ExceptionTableEntry> {
    map(
        tuple((be_u16, be_u16, be_u16, be_u16)),
        |(start_pc, end_pc, handler_pc, catch_type)| ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        },
    )(input)
}
