//! In-memory class file assembler for tests.
//!
//! Only compiled for this crate's tests and behind the `testing` feature, so
//! that dependent crates can build classes for their own tests without
//! shipping binary fixtures.

use crate::classes::{ClassFile, JAVA_LANG_OBJECT, MAGIC};
use crate::constants::*;
use crate::errors::ClassResult;
use std::collections::HashMap;

/// Exception table entry as `(start_pc, end_pc, handler_pc, catch_type)`.
pub type Handler = (u16, u16, u16, u16);

#[derive(Debug, Clone)]
pub struct ClassBuilder {
    major_version: u16,
    minor_version: u16,
    pool: Vec<u8>,
    pool_count: u16,
    interned: HashMap<Vec<u8>, u16>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    /// Starts a public class extending `java/lang/Object`, version 49.0.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            major_version: 49,
            minor_version: 0,
            pool: Vec::new(),
            pool_count: 1,
            interned: HashMap::new(),
            access_flags: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class(JAVA_LANG_OBJECT);
        builder
    }

    pub fn version(&mut self, major: u16, minor: u16) -> &mut Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn flags(&mut self, access_flags: u16) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    pub fn super_class(&mut self, name: &str) -> &mut Self {
        self.super_class = self.class(name);
        self
    }

    /// Sets the super class index to 0, as only `java/lang/Object` may do.
    pub fn no_super(&mut self) -> &mut Self {
        self.super_class = 0;
        self
    }

    /// Overrides the raw super class index.
    pub fn super_index(&mut self, index: u16) -> &mut Self {
        self.super_class = index;
        self
    }

    /// Appends a raw constant (tag included) taking `slots` pool slots, without interning.
    pub fn raw_constant(&mut self, bytes: Vec<u8>, slots: u16) -> u16 {
        let index = self.pool_count;
        self.pool.extend(&bytes);
        self.pool_count += slots;
        index
    }

    fn constant(&mut self, bytes: Vec<u8>, slots: u16) -> u16 {
        if let Some(index) = self.interned.get(&bytes) {
            return *index;
        }
        let index = self.raw_constant(bytes.clone(), slots);
        self.interned.insert(bytes, index);
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.utf8_bytes(value.as_bytes())
    }

    pub fn utf8_bytes(&mut self, value: &[u8]) -> u16 {
        let mut bytes = vec![TAG_UTF8];
        bytes.extend(u16_bytes(value.len()));
        bytes.extend(value);
        self.constant(bytes, 1)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.constant(tagged(TAG_CLASS, &[name_index]), 1)
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.constant(tagged(TAG_STRING, &[string_index]), 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![TAG_INTEGER];
        bytes.extend(value.to_be_bytes());
        self.constant(bytes, 1)
    }

    pub fn float(&mut self, value: f32) -> u16 {
        let mut bytes = vec![TAG_FLOAT];
        bytes.extend(value.to_be_bytes());
        self.constant(bytes, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut bytes = vec![TAG_LONG];
        bytes.extend(value.to_be_bytes());
        self.constant(bytes, 2)
    }

    pub fn double(&mut self, value: f64) -> u16 {
        let mut bytes = vec![TAG_DOUBLE];
        bytes.extend(value.to_be_bytes());
        self.constant(bytes, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.constant(tagged(TAG_NAME_AND_TYPE, &[name_index, descriptor_index]), 1)
    }

    fn member(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let nat_index = self.name_and_type(name, descriptor);
        self.constant(tagged(tag, &[class_index, nat_index]), 1)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(TAG_FIELDREF, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(TAG_METHODREF, class, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(TAG_INTERFACE_METHODREF, class, name, descriptor)
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    /// Builds a raw attribute; `length` is the payload size.
    pub fn attribute(&mut self, name: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(self.utf8(name).to_be_bytes());
        bytes.extend(u32::try_from(payload.len()).unwrap_or(u32::MAX).to_be_bytes());
        bytes.extend(payload);
        bytes
    }

    /// Builds a raw `Code` attribute.
    pub fn code(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        handlers: &[Handler],
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend(max_stack.to_be_bytes());
        payload.extend(max_locals.to_be_bytes());
        payload.extend(u32::try_from(code.len()).unwrap_or(u32::MAX).to_be_bytes());
        payload.extend(code);
        payload.extend(u16_bytes(handlers.len()));
        for (start_pc, end_pc, handler_pc, catch_type) in handlers {
            for v in [start_pc, end_pc, handler_pc, catch_type] {
                payload.extend(v.to_be_bytes());
            }
        }
        payload.extend(u16_bytes(attributes.len()));
        for attr in attributes {
            payload.extend(attr);
        }
        self.attribute("Code", &payload)
    }

    fn member_info(&mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(flags.to_be_bytes());
        bytes.extend(self.utf8(name).to_be_bytes());
        bytes.extend(self.utf8(descriptor).to_be_bytes());
        bytes.extend(u16_bytes(attributes.len()));
        for attr in attributes {
            bytes.extend(attr);
        }
        bytes
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let field = self.member_info(flags, name, descriptor, attributes);
        self.fields.push(field);
        self
    }

    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> &mut Self {
        let method = self.member_info(flags, name, descriptor, attributes);
        self.methods.push(method);
        self
    }

    /// Adds a method with a `Code` attribute and no nested attributes.
    pub fn method_with_code(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        handlers: &[Handler],
    ) -> &mut Self {
        let code = self.code(max_stack, max_locals, code, handlers, Vec::new());
        self.method(flags, name, descriptor, vec![code])
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// Serializes the class.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(MAGIC.to_be_bytes());
        bytes.extend(self.minor_version.to_be_bytes());
        bytes.extend(self.major_version.to_be_bytes());
        bytes.extend(self.pool_count.to_be_bytes());
        bytes.extend(&self.pool);
        bytes.extend(self.access_flags.to_be_bytes());
        bytes.extend(self.this_class.to_be_bytes());
        bytes.extend(self.super_class.to_be_bytes());
        bytes.extend(u16_bytes(self.interfaces.len()));
        for index in &self.interfaces {
            bytes.extend(index.to_be_bytes());
        }
        for members in [&self.fields, &self.methods] {
            bytes.extend(u16_bytes(members.len()));
            for member in members {
                bytes.extend(member);
            }
        }
        bytes.extend(u16_bytes(self.attributes.len()));
        for attr in &self.attributes {
            bytes.extend(attr);
        }
        bytes
    }

    /// Serializes then parses the class.
    pub fn parse(&self) -> ClassResult<ClassFile> {
        crate::parse(&self.build())
    }
}

fn tagged(tag: u8, indices: &[u16]) -> Vec<u8> {
    let mut bytes = vec![tag];
    for index in indices {
        bytes.extend(index.to_be_bytes());
    }
    bytes
}

fn u16_bytes(len: usize) -> [u8; 2] {
    u16::try_from(len).unwrap_or(u16::MAX).to_be_bytes()
}
