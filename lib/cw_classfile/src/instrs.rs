//! JVM bytecode instructions definitions and decoding.

use crate::errors::{ClassError, ClassResult};
use crate::reader::Reader;
use crate::Addr;
use instruction_derive::Instruction;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;

pub trait Instruction {
    fn mnemonic(&self) -> &str;
    fn opcode(&self) -> u8;
    fn can_throw(&self) -> bool;
    fn operands(&self) -> Vec<String>;
}

/// A constant pool index operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpIndex(pub u16);

impl CpIndex {
    #[inline]
    #[must_use]
    pub const fn value(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CpIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A signed branch offset, relative to the branching instruction's own address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub i32);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

/// The `atype` operand of `newarray`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayType(pub u8);

pub const T_BOOLEAN: u8 = 4;
pub const T_CHAR: u8 = 5;
pub const T_FLOAT: u8 = 6;
pub const T_DOUBLE: u8 = 7;
pub const T_BYTE: u8 = 8;
pub const T_SHORT: u8 = 9;
pub const T_INT: u8 = 10;
pub const T_LONG: u8 = 11;

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            T_BOOLEAN => write!(f, "boolean"),
            T_CHAR => write!(f, "char"),
            T_FLOAT => write!(f, "float"),
            T_DOUBLE => write!(f, "double"),
            T_BYTE => write!(f, "byte"),
            T_SHORT => write!(f, "short"),
            T_INT => write!(f, "int"),
            T_LONG => write!(f, "long"),
            other => write!(f, "<atype {other}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSwitch {
    pub default: i32,
    pub low: i32,
    pub high: i32,
    pub offsets: Vec<i32>,
}

impl TableSwitch {
    /// Case keys with their branch offsets.
    pub fn cases(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.low..=self.high).zip(self.offsets.iter().copied())
    }
}

impl fmt::Display for TableSwitch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ ")?;
        for (key, offset) in self.cases() {
            write!(f, "{key}: {offset:+}, ")?;
        }
        write!(f, "default: {:+} }}", self.default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSwitch {
    pub default: i32,
    pub pairs: Vec<(i32, i32)>,
}

impl fmt::Display for LookupSwitch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ ")?;
        for (key, offset) in &self.pairs {
            write!(f, "{key}: {offset:+}, ")?;
        }
        write!(f, "default: {:+} }}", self.default)
    }
}

/// Instructions that can follow the `wide` prefix, with their 16-bit operands.
#[derive(Debug, Clone, PartialEq, Eq, Instruction)]
pub enum WideInstr {
    #[instruction(mnemonic = "iload", opcode = 0x15)]
    Iload(u16),
    #[instruction(mnemonic = "lload", opcode = 0x16)]
    Lload(u16),
    #[instruction(mnemonic = "fload", opcode = 0x17)]
    Fload(u16),
    #[instruction(mnemonic = "dload", opcode = 0x18)]
    Dload(u16),
    #[instruction(mnemonic = "aload", opcode = 0x19)]
    Aload(u16),
    #[instruction(mnemonic = "istore", opcode = 0x36)]
    Istore(u16),
    #[instruction(mnemonic = "lstore", opcode = 0x37)]
    Lstore(u16),
    #[instruction(mnemonic = "fstore", opcode = 0x38)]
    Fstore(u16),
    #[instruction(mnemonic = "dstore", opcode = 0x39)]
    Dstore(u16),
    #[instruction(mnemonic = "astore", opcode = 0x3a)]
    Astore(u16),
    #[instruction(mnemonic = "ret", opcode = 0xa9)]
    Ret(u16),
    #[instruction(mnemonic = "iinc", opcode = 0x84)]
    Iinc(u16, i16),
}

impl fmt::Display for WideInstr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.mnemonic(), self.operands().join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct LabeledInstr {
    pub(crate) addr: Addr,
    pub(crate) size: usize,
    pub(crate) instr: Instr,
}

impl Instruction for LabeledInstr {
    #[inline]
    fn mnemonic(&self) -> &str {
        self.instr.mnemonic()
    }

    #[inline]
    fn opcode(&self) -> u8 {
        self.instr.opcode()
    }

    #[inline]
    fn can_throw(&self) -> bool {
        self.instr.can_throw()
    }

    #[inline]
    fn operands(&self) -> Vec<String> {
        self.instr.operands()
    }
}

impl LabeledInstr {
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    #[inline]
    #[must_use]
    pub const fn instr(&self) -> &Instr {
        &self.instr
    }

    /// Encoded length in bytes, opcode included.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn next_addr(&self) -> Addr {
        self.addr.add(self.size)
    }
}

impl fmt::Display for LabeledInstr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:>5}: {}", self.addr.0, self.instr)
    }
}

impl Serialize for LabeledInstr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Instr", 3)?;
        state.serialize_field("address", &self.addr.0)?;
        state.serialize_field("mnemonic", self.mnemonic())?;
        state.serialize_field("operands", &self.operands())?;
        state.end()
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let operands = self.operands();
        if operands.is_empty() {
            write!(f, "{}", self.mnemonic())
        } else {
            write!(f, "{} {}", self.mnemonic(), operands.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Instruction)]
pub enum Instr {
    /// Do nothing.
    #[instruction(mnemonic = "nop", opcode = 0x00)]
    Nop,

    /// Push the `null` reference.
    #[instruction(mnemonic = "aconst_null", opcode = 0x01)]
    AconstNull,

    /// Push int constant -1.
    #[instruction(mnemonic = "iconst_m1", opcode = 0x02)]
    IconstM1,

    #[instruction(mnemonic = "iconst_0", opcode = 0x03)]
    Iconst0,

    #[instruction(mnemonic = "iconst_1", opcode = 0x04)]
    Iconst1,

    #[instruction(mnemonic = "iconst_2", opcode = 0x05)]
    Iconst2,

    #[instruction(mnemonic = "iconst_3", opcode = 0x06)]
    Iconst3,

    #[instruction(mnemonic = "iconst_4", opcode = 0x07)]
    Iconst4,

    #[instruction(mnemonic = "iconst_5", opcode = 0x08)]
    Iconst5,

    /// Push long constant 0.
    #[instruction(mnemonic = "lconst_0", opcode = 0x09)]
    Lconst0,

    #[instruction(mnemonic = "lconst_1", opcode = 0x0a)]
    Lconst1,

    /// Push float constant 0.0.
    #[instruction(mnemonic = "fconst_0", opcode = 0x0b)]
    Fconst0,

    #[instruction(mnemonic = "fconst_1", opcode = 0x0c)]
    Fconst1,

    #[instruction(mnemonic = "fconst_2", opcode = 0x0d)]
    Fconst2,

    /// Push double constant 0.0.
    #[instruction(mnemonic = "dconst_0", opcode = 0x0e)]
    Dconst0,

    #[instruction(mnemonic = "dconst_1", opcode = 0x0f)]
    Dconst1,

    /// Push a sign-extended byte as an int.
    #[instruction(mnemonic = "bipush", opcode = 0x10)]
    Bipush(i8),

    /// Push a sign-extended short as an int.
    #[instruction(mnemonic = "sipush", opcode = 0x11)]
    Sipush(i16),

    /// Push an int, float, string or class constant (one byte index).
    #[instruction(mnemonic = "ldc", opcode = 0x12)]
    Ldc(CpIndex),

    /// Push an int, float, string or class constant (wide index).
    #[instruction(mnemonic = "ldc_w", opcode = 0x13)]
    LdcW(CpIndex),

    /// Push a long or double constant.
    #[instruction(mnemonic = "ldc2_w", opcode = 0x14)]
    Ldc2W(CpIndex),

    /// Load an int from a local variable.
    #[instruction(mnemonic = "iload", opcode = 0x15)]
    Iload(u8),

    /// Load a long from a local variable pair.
    #[instruction(mnemonic = "lload", opcode = 0x16)]
    Lload(u8),

    #[instruction(mnemonic = "fload", opcode = 0x17)]
    Fload(u8),

    #[instruction(mnemonic = "dload", opcode = 0x18)]
    Dload(u8),

    /// Load a reference from a local variable.
    #[instruction(mnemonic = "aload", opcode = 0x19)]
    Aload(u8),

    #[instruction(mnemonic = "iload_0", opcode = 0x1a)]
    Iload0,

    #[instruction(mnemonic = "iload_1", opcode = 0x1b)]
    Iload1,

    #[instruction(mnemonic = "iload_2", opcode = 0x1c)]
    Iload2,

    #[instruction(mnemonic = "iload_3", opcode = 0x1d)]
    Iload3,

    #[instruction(mnemonic = "lload_0", opcode = 0x1e)]
    Lload0,

    #[instruction(mnemonic = "lload_1", opcode = 0x1f)]
    Lload1,

    #[instruction(mnemonic = "lload_2", opcode = 0x20)]
    Lload2,

    #[instruction(mnemonic = "lload_3", opcode = 0x21)]
    Lload3,

    #[instruction(mnemonic = "fload_0", opcode = 0x22)]
    Fload0,

    #[instruction(mnemonic = "fload_1", opcode = 0x23)]
    Fload1,

    #[instruction(mnemonic = "fload_2", opcode = 0x24)]
    Fload2,

    #[instruction(mnemonic = "fload_3", opcode = 0x25)]
    Fload3,

    #[instruction(mnemonic = "dload_0", opcode = 0x26)]
    Dload0,

    #[instruction(mnemonic = "dload_1", opcode = 0x27)]
    Dload1,

    #[instruction(mnemonic = "dload_2", opcode = 0x28)]
    Dload2,

    #[instruction(mnemonic = "dload_3", opcode = 0x29)]
    Dload3,

    #[instruction(mnemonic = "aload_0", opcode = 0x2a)]
    Aload0,

    #[instruction(mnemonic = "aload_1", opcode = 0x2b)]
    Aload1,

    #[instruction(mnemonic = "aload_2", opcode = 0x2c)]
    Aload2,

    #[instruction(mnemonic = "aload_3", opcode = 0x2d)]
    Aload3,

    /// Load from an array.
    #[instruction(mnemonic = "iaload", opcode = 0x2e, can_throw)]
    Iaload,

    #[instruction(mnemonic = "laload", opcode = 0x2f, can_throw)]
    Laload,

    #[instruction(mnemonic = "faload", opcode = 0x30, can_throw)]
    Faload,

    #[instruction(mnemonic = "daload", opcode = 0x31, can_throw)]
    Daload,

    #[instruction(mnemonic = "aaload", opcode = 0x32, can_throw)]
    Aaload,

    #[instruction(mnemonic = "baload", opcode = 0x33, can_throw)]
    Baload,

    #[instruction(mnemonic = "caload", opcode = 0x34, can_throw)]
    Caload,

    #[instruction(mnemonic = "saload", opcode = 0x35, can_throw)]
    Saload,

    /// Store an int into a local variable.
    #[instruction(mnemonic = "istore", opcode = 0x36)]
    Istore(u8),

    #[instruction(mnemonic = "lstore", opcode = 0x37)]
    Lstore(u8),

    #[instruction(mnemonic = "fstore", opcode = 0x38)]
    Fstore(u8),

    #[instruction(mnemonic = "dstore", opcode = 0x39)]
    Dstore(u8),

    /// Store a reference or a return address into a local variable.
    #[instruction(mnemonic = "astore", opcode = 0x3a)]
    Astore(u8),

    #[instruction(mnemonic = "istore_0", opcode = 0x3b)]
    Istore0,

    #[instruction(mnemonic = "istore_1", opcode = 0x3c)]
    Istore1,

    #[instruction(mnemonic = "istore_2", opcode = 0x3d)]
    Istore2,

    #[instruction(mnemonic = "istore_3", opcode = 0x3e)]
    Istore3,

    #[instruction(mnemonic = "lstore_0", opcode = 0x3f)]
    Lstore0,

    #[instruction(mnemonic = "lstore_1", opcode = 0x40)]
    Lstore1,

    #[instruction(mnemonic = "lstore_2", opcode = 0x41)]
    Lstore2,

    #[instruction(mnemonic = "lstore_3", opcode = 0x42)]
    Lstore3,

    #[instruction(mnemonic = "fstore_0", opcode = 0x43)]
    Fstore0,

    #[instruction(mnemonic = "fstore_1", opcode = 0x44)]
    Fstore1,

    #[instruction(mnemonic = "fstore_2", opcode = 0x45)]
    Fstore2,

    #[instruction(mnemonic = "fstore_3", opcode = 0x46)]
    Fstore3,

    #[instruction(mnemonic = "dstore_0", opcode = 0x47)]
    Dstore0,

    #[instruction(mnemonic = "dstore_1", opcode = 0x48)]
    Dstore1,

    #[instruction(mnemonic = "dstore_2", opcode = 0x49)]
    Dstore2,

    #[instruction(mnemonic = "dstore_3", opcode = 0x4a)]
    Dstore3,

    #[instruction(mnemonic = "astore_0", opcode = 0x4b)]
    Astore0,

    #[instruction(mnemonic = "astore_1", opcode = 0x4c)]
    Astore1,

    #[instruction(mnemonic = "astore_2", opcode = 0x4d)]
    Astore2,

    #[instruction(mnemonic = "astore_3", opcode = 0x4e)]
    Astore3,

    /// Store into an array.
    #[instruction(mnemonic = "iastore", opcode = 0x4f, can_throw)]
    Iastore,

    #[instruction(mnemonic = "lastore", opcode = 0x50, can_throw)]
    Lastore,

    #[instruction(mnemonic = "fastore", opcode = 0x51, can_throw)]
    Fastore,

    #[instruction(mnemonic = "dastore", opcode = 0x52, can_throw)]
    Dastore,

    #[instruction(mnemonic = "aastore", opcode = 0x53, can_throw)]
    Aastore,

    #[instruction(mnemonic = "bastore", opcode = 0x54, can_throw)]
    Bastore,

    #[instruction(mnemonic = "castore", opcode = 0x55, can_throw)]
    Castore,

    #[instruction(mnemonic = "sastore", opcode = 0x56, can_throw)]
    Sastore,

    /// Pop the top word.
    #[instruction(mnemonic = "pop", opcode = 0x57)]
    Pop,

    /// Pop the top two words (one long or double, or two single words).
    #[instruction(mnemonic = "pop2", opcode = 0x58)]
    Pop2,

    /// Duplicate the top word.
    #[instruction(mnemonic = "dup", opcode = 0x59)]
    Dup,

    /// Duplicate the top word and insert it two words down.
    #[instruction(mnemonic = "dup_x1", opcode = 0x5a)]
    DupX1,

    /// Duplicate the top word and insert it three words down.
    #[instruction(mnemonic = "dup_x2", opcode = 0x5b)]
    DupX2,

    /// Duplicate the top two words.
    #[instruction(mnemonic = "dup2", opcode = 0x5c)]
    Dup2,

    /// Duplicate the top two words and insert them three words down.
    #[instruction(mnemonic = "dup2_x1", opcode = 0x5d)]
    Dup2X1,

    /// Duplicate the top two words and insert them four words down.
    #[instruction(mnemonic = "dup2_x2", opcode = 0x5e)]
    Dup2X2,

    /// Swap the top two words.
    #[instruction(mnemonic = "swap", opcode = 0x5f)]
    Swap,

    #[instruction(mnemonic = "iadd", opcode = 0x60)]
    Iadd,

    #[instruction(mnemonic = "ladd", opcode = 0x61)]
    Ladd,

    #[instruction(mnemonic = "fadd", opcode = 0x62)]
    Fadd,

    #[instruction(mnemonic = "dadd", opcode = 0x63)]
    Dadd,

    #[instruction(mnemonic = "isub", opcode = 0x64)]
    Isub,

    #[instruction(mnemonic = "lsub", opcode = 0x65)]
    Lsub,

    #[instruction(mnemonic = "fsub", opcode = 0x66)]
    Fsub,

    #[instruction(mnemonic = "dsub", opcode = 0x67)]
    Dsub,

    #[instruction(mnemonic = "imul", opcode = 0x68)]
    Imul,

    #[instruction(mnemonic = "lmul", opcode = 0x69)]
    Lmul,

    #[instruction(mnemonic = "fmul", opcode = 0x6a)]
    Fmul,

    #[instruction(mnemonic = "dmul", opcode = 0x6b)]
    Dmul,

    #[instruction(mnemonic = "idiv", opcode = 0x6c, can_throw)]
    Idiv,

    #[instruction(mnemonic = "ldiv", opcode = 0x6d, can_throw)]
    Ldiv,

    #[instruction(mnemonic = "fdiv", opcode = 0x6e)]
    Fdiv,

    #[instruction(mnemonic = "ddiv", opcode = 0x6f)]
    Ddiv,

    #[instruction(mnemonic = "irem", opcode = 0x70, can_throw)]
    Irem,

    #[instruction(mnemonic = "lrem", opcode = 0x71, can_throw)]
    Lrem,

    #[instruction(mnemonic = "frem", opcode = 0x72)]
    Frem,

    #[instruction(mnemonic = "drem", opcode = 0x73)]
    Drem,

    #[instruction(mnemonic = "ineg", opcode = 0x74)]
    Ineg,

    #[instruction(mnemonic = "lneg", opcode = 0x75)]
    Lneg,

    #[instruction(mnemonic = "fneg", opcode = 0x76)]
    Fneg,

    #[instruction(mnemonic = "dneg", opcode = 0x77)]
    Dneg,

    #[instruction(mnemonic = "ishl", opcode = 0x78)]
    Ishl,

    #[instruction(mnemonic = "lshl", opcode = 0x79)]
    Lshl,

    #[instruction(mnemonic = "ishr", opcode = 0x7a)]
    Ishr,

    #[instruction(mnemonic = "lshr", opcode = 0x7b)]
    Lshr,

    #[instruction(mnemonic = "iushr", opcode = 0x7c)]
    Iushr,

    #[instruction(mnemonic = "lushr", opcode = 0x7d)]
    Lushr,

    #[instruction(mnemonic = "iand", opcode = 0x7e)]
    Iand,

    #[instruction(mnemonic = "land", opcode = 0x7f)]
    Land,

    #[instruction(mnemonic = "ior", opcode = 0x80)]
    Ior,

    #[instruction(mnemonic = "lor", opcode = 0x81)]
    Lor,

    #[instruction(mnemonic = "ixor", opcode = 0x82)]
    Ixor,

    #[instruction(mnemonic = "lxor", opcode = 0x83)]
    Lxor,

    /// Increment a local int variable by a signed byte.
    #[instruction(mnemonic = "iinc", opcode = 0x84)]
    Iinc(u8, i8),

    #[instruction(mnemonic = "i2l", opcode = 0x85)]
    I2l,

    #[instruction(mnemonic = "i2f", opcode = 0x86)]
    I2f,

    #[instruction(mnemonic = "i2d", opcode = 0x87)]
    I2d,

    #[instruction(mnemonic = "l2i", opcode = 0x88)]
    L2i,

    #[instruction(mnemonic = "l2f", opcode = 0x89)]
    L2f,

    #[instruction(mnemonic = "l2d", opcode = 0x8a)]
    L2d,

    #[instruction(mnemonic = "f2i", opcode = 0x8b)]
    F2i,

    #[instruction(mnemonic = "f2l", opcode = 0x8c)]
    F2l,

    #[instruction(mnemonic = "f2d", opcode = 0x8d)]
    F2d,

    #[instruction(mnemonic = "d2i", opcode = 0x8e)]
    D2i,

    #[instruction(mnemonic = "d2l", opcode = 0x8f)]
    D2l,

    #[instruction(mnemonic = "d2f", opcode = 0x90)]
    D2f,

    #[instruction(mnemonic = "i2b", opcode = 0x91)]
    I2b,

    #[instruction(mnemonic = "i2c", opcode = 0x92)]
    I2c,

    #[instruction(mnemonic = "i2s", opcode = 0x93)]
    I2s,

    #[instruction(mnemonic = "lcmp", opcode = 0x94)]
    Lcmp,

    #[instruction(mnemonic = "fcmpl", opcode = 0x95)]
    Fcmpl,

    #[instruction(mnemonic = "fcmpg", opcode = 0x96)]
    Fcmpg,

    #[instruction(mnemonic = "dcmpl", opcode = 0x97)]
    Dcmpl,

    #[instruction(mnemonic = "dcmpg", opcode = 0x98)]
    Dcmpg,

    #[instruction(mnemonic = "ifeq", opcode = 0x99)]
    Ifeq(Offset),

    #[instruction(mnemonic = "ifne", opcode = 0x9a)]
    Ifne(Offset),

    #[instruction(mnemonic = "iflt", opcode = 0x9b)]
    Iflt(Offset),

    #[instruction(mnemonic = "ifge", opcode = 0x9c)]
    Ifge(Offset),

    #[instruction(mnemonic = "ifgt", opcode = 0x9d)]
    Ifgt(Offset),

    #[instruction(mnemonic = "ifle", opcode = 0x9e)]
    Ifle(Offset),

    #[instruction(mnemonic = "if_icmpeq", opcode = 0x9f)]
    IfIcmpeq(Offset),

    #[instruction(mnemonic = "if_icmpne", opcode = 0xa0)]
    IfIcmpne(Offset),

    #[instruction(mnemonic = "if_icmplt", opcode = 0xa1)]
    IfIcmplt(Offset),

    #[instruction(mnemonic = "if_icmpge", opcode = 0xa2)]
    IfIcmpge(Offset),

    #[instruction(mnemonic = "if_icmpgt", opcode = 0xa3)]
    IfIcmpgt(Offset),

    #[instruction(mnemonic = "if_icmple", opcode = 0xa4)]
    IfIcmple(Offset),

    #[instruction(mnemonic = "if_acmpeq", opcode = 0xa5)]
    IfAcmpeq(Offset),

    #[instruction(mnemonic = "if_acmpne", opcode = 0xa6)]
    IfAcmpne(Offset),

    /// Branch unconditionally.
    #[instruction(mnemonic = "goto", opcode = 0xa7)]
    Goto(Offset),

    /// Jump to subroutine, pushing the return address.
    #[instruction(mnemonic = "jsr", opcode = 0xa8)]
    Jsr(Offset),

    /// Return from subroutine to the address held in a local variable.
    #[instruction(mnemonic = "ret", opcode = 0xa9)]
    Ret(u8),

    /// Jump through an index table.
    #[instruction(mnemonic = "tableswitch", opcode = 0xaa)]
    Tableswitch(TableSwitch),

    /// Jump through a sorted key/offset table.
    #[instruction(mnemonic = "lookupswitch", opcode = 0xab)]
    Lookupswitch(LookupSwitch),

    #[instruction(mnemonic = "ireturn", opcode = 0xac)]
    Ireturn,

    #[instruction(mnemonic = "lreturn", opcode = 0xad)]
    Lreturn,

    #[instruction(mnemonic = "freturn", opcode = 0xae)]
    Freturn,

    #[instruction(mnemonic = "dreturn", opcode = 0xaf)]
    Dreturn,

    #[instruction(mnemonic = "areturn", opcode = 0xb0)]
    Areturn,

    /// Return void from method.
    #[instruction(mnemonic = "return", opcode = 0xb1)]
    Return,

    #[instruction(mnemonic = "getstatic", opcode = 0xb2, can_throw)]
    Getstatic(CpIndex),

    #[instruction(mnemonic = "putstatic", opcode = 0xb3, can_throw)]
    Putstatic(CpIndex),

    #[instruction(mnemonic = "getfield", opcode = 0xb4, can_throw)]
    Getfield(CpIndex),

    #[instruction(mnemonic = "putfield", opcode = 0xb5, can_throw)]
    Putfield(CpIndex),

    #[instruction(mnemonic = "invokevirtual", opcode = 0xb6, can_throw)]
    Invokevirtual(CpIndex),

    /// Invoke an instance initializer, a private method or a superclass method.
    #[instruction(mnemonic = "invokespecial", opcode = 0xb7, can_throw)]
    Invokespecial(CpIndex),

    #[instruction(mnemonic = "invokestatic", opcode = 0xb8, can_throw)]
    Invokestatic(CpIndex),

    /// Invoke an interface method. The second operand is the historical argument word count.
    #[instruction(mnemonic = "invokeinterface", opcode = 0xb9, can_throw)]
    Invokeinterface(CpIndex, u8),

    /// Invoke a dynamically computed call site.
    #[instruction(mnemonic = "invokedynamic", opcode = 0xba, can_throw)]
    Invokedynamic(CpIndex),

    /// Create a new, uninitialized, object.
    #[instruction(mnemonic = "new", opcode = 0xbb, can_throw)]
    New(CpIndex),

    /// Create an array of a primitive type.
    #[instruction(mnemonic = "newarray", opcode = 0xbc, can_throw)]
    Newarray(ArrayType),

    /// Create an array of references.
    #[instruction(mnemonic = "anewarray", opcode = 0xbd, can_throw)]
    Anewarray(CpIndex),

    #[instruction(mnemonic = "arraylength", opcode = 0xbe, can_throw)]
    Arraylength,

    /// Throw the exception on top of the stack.
    #[instruction(mnemonic = "athrow", opcode = 0xbf, can_throw)]
    Athrow,

    #[instruction(mnemonic = "checkcast", opcode = 0xc0, can_throw)]
    Checkcast(CpIndex),

    #[instruction(mnemonic = "instanceof", opcode = 0xc1)]
    Instanceof(CpIndex),

    #[instruction(mnemonic = "monitorenter", opcode = 0xc2, can_throw)]
    Monitorenter,

    #[instruction(mnemonic = "monitorexit", opcode = 0xc3, can_throw)]
    Monitorexit,

    /// Access a local variable with a 16-bit index.
    #[instruction(mnemonic = "wide", opcode = 0xc4)]
    Wide(WideInstr),

    /// Create a multidimensional array.
    #[instruction(mnemonic = "multianewarray", opcode = 0xc5, can_throw)]
    Multianewarray(CpIndex, u8),

    #[instruction(mnemonic = "ifnull", opcode = 0xc6)]
    Ifnull(Offset),

    #[instruction(mnemonic = "ifnonnull", opcode = 0xc7)]
    Ifnonnull(Offset),

    /// Branch unconditionally (32-bit offset).
    #[instruction(mnemonic = "goto_w", opcode = 0xc8)]
    GotoW(Offset),

    /// Jump to subroutine (32-bit offset).
    #[instruction(mnemonic = "jsr_w", opcode = 0xc9)]
    JsrW(Offset),

    /// Reserved for debuggers.
    #[instruction(mnemonic = "breakpoint", opcode = 0xca)]
    Breakpoint,
}

const WIDE: u8 = 0xc4;
const TABLESWITCH: u8 = 0xaa;
const LOOKUPSWITCH: u8 = 0xab;
const IINC: u8 = 0x84;

/// Encoded length of fixed-size instructions, indexed by opcode.
/// Zero marks variable-length (`tableswitch`, `lookupswitch`, `wide`) and
/// unassigned opcodes.
#[rustfmt::skip]
static OPCODE_LENGTHS: [u8; 256] = [
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x00
    2, 3, 2, 3, 3, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, // 0x10
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x20
    1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, // 0x30
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x40
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x50
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x60
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x70
    1, 1, 1, 1, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0x80
    1, 1, 1, 1, 1, 1, 1, 1, 1, 3, 3, 3, 3, 3, 3, 3, // 0x90
    3, 3, 3, 3, 3, 3, 3, 3, 3, 2, 0, 0, 1, 1, 1, 1, // 0xa0
    1, 1, 3, 3, 3, 3, 3, 3, 3, 5, 5, 3, 2, 3, 1, 1, // 0xb0
    3, 3, 1, 1, 0, 4, 3, 3, 5, 5, 1, 0, 0, 0, 0, 0, // 0xc0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xd0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xe0
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0xf0
];

/// Number of padding bytes between a switch opcode at `pc` and its
/// 4-byte aligned operands.
#[inline]
#[must_use]
pub const fn switch_padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

/// Returns the total encoded length (opcode and operands) of the
/// instruction at `pc`.
///
/// # Errors
///
/// Fails for unassigned opcodes, malformed switch tables, invalid `wide`
/// targets, and when operands needed to compute the length are missing.
pub fn length_of(code: &[u8], pc: usize) -> ClassResult<usize> {
    let mut reader = Reader::at(code, pc);
    let opcode = reader.read_u1()?;
    match opcode {
        TABLESWITCH => {
            reader.skip(switch_padding(pc) + 4)?;
            let low = reader.read_i4()?;
            let high = reader.read_i4()?;
            let count = switch_count(low, high, pc)?;
            Ok(1 + switch_padding(pc) + 12 + 4 * count)
        }
        LOOKUPSWITCH => {
            reader.skip(switch_padding(pc) + 4)?;
            let npairs = reader.read_i4()?;
            let count = usize::try_from(npairs).map_err(|_| ClassError::BadSwitch {
                low: 0,
                high: npairs,
                pc,
            })?;
            Ok(1 + switch_padding(pc) + 8 + 8 * count)
        }
        WIDE => match reader.read_u1()? {
            IINC => Ok(6),
            0x15..=0x19 | 0x36..=0x3a | 0xa9 => Ok(4),
            opcode => Err(ClassError::BadWide { opcode, pc }),
        },
        _ => match OPCODE_LENGTHS[usize::from(opcode)] {
            0 => Err(ClassError::UnknownOpcode { opcode, pc }),
            len => Ok(usize::from(len)),
        },
    }
}

#[allow(clippy::cast_sign_loss)]
fn switch_count(low: i32, high: i32, pc: usize) -> ClassResult<usize> {
    if high < low {
        return Err(ClassError::BadSwitch { low, high, pc });
    }
    Ok((i64::from(high) - i64::from(low) + 1) as usize)
}

/// Decodes a whole code array into labeled instructions.
///
/// # Errors
///
/// Fails on the first instruction that cannot be decoded, or that runs past
/// the end of the code.
pub fn decode(code: &[u8]) -> ClassResult<Vec<LabeledInstr>> {
    let mut instrs = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let size = length_of(code, pc)?;
        if pc + size > code.len() {
            return Err(ClassError::Truncated {
                offset: pc,
                needed: size,
                available: code.len() - pc,
            });
        }
        let instr = decode_instr(&mut Reader::at(code, pc), pc)?;
        instrs.push(LabeledInstr {
            addr: Addr(pc),
            size,
            instr,
        });
        pc += size;
    }
    Ok(instrs)
}

#[allow(clippy::too_many_lines)]
fn decode_instr(r: &mut Reader, pc: usize) -> ClassResult<Instr> {
    let opcode = r.read_u1()?;
    let instr = match opcode {
        0x00 => Instr::Nop,
        0x01 => Instr::AconstNull,
        0x02 => Instr::IconstM1,
        0x03 => Instr::Iconst0,
        0x04 => Instr::Iconst1,
        0x05 => Instr::Iconst2,
        0x06 => Instr::Iconst3,
        0x07 => Instr::Iconst4,
        0x08 => Instr::Iconst5,
        0x09 => Instr::Lconst0,
        0x0a => Instr::Lconst1,
        0x0b => Instr::Fconst0,
        0x0c => Instr::Fconst1,
        0x0d => Instr::Fconst2,
        0x0e => Instr::Dconst0,
        0x0f => Instr::Dconst1,
        0x10 => Instr::Bipush(r.read_i1()?),
        0x11 => Instr::Sipush(r.read_i2()?),
        0x12 => Instr::Ldc(CpIndex(u16::from(r.read_u1()?))),
        0x13 => Instr::LdcW(CpIndex(r.read_u2()?)),
        0x14 => Instr::Ldc2W(CpIndex(r.read_u2()?)),
        0x15 => Instr::Iload(r.read_u1()?),
        0x16 => Instr::Lload(r.read_u1()?),
        0x17 => Instr::Fload(r.read_u1()?),
        0x18 => Instr::Dload(r.read_u1()?),
        0x19 => Instr::Aload(r.read_u1()?),
        0x1a => Instr::Iload0,
        0x1b => Instr::Iload1,
        0x1c => Instr::Iload2,
        0x1d => Instr::Iload3,
        0x1e => Instr::Lload0,
        0x1f => Instr::Lload1,
        0x20 => Instr::Lload2,
        0x21 => Instr::Lload3,
        0x22 => Instr::Fload0,
        0x23 => Instr::Fload1,
        0x24 => Instr::Fload2,
        0x25 => Instr::Fload3,
        0x26 => Instr::Dload0,
        0x27 => Instr::Dload1,
        0x28 => Instr::Dload2,
        0x29 => Instr::Dload3,
        0x2a => Instr::Aload0,
        0x2b => Instr::Aload1,
        0x2c => Instr::Aload2,
        0x2d => Instr::Aload3,
        0x2e => Instr::Iaload,
        0x2f => Instr::Laload,
        0x30 => Instr::Faload,
        0x31 => Instr::Daload,
        0x32 => Instr::Aaload,
        0x33 => Instr::Baload,
        0x34 => Instr::Caload,
        0x35 => Instr::Saload,
        0x36 => Instr::Istore(r.read_u1()?),
        0x37 => Instr::Lstore(r.read_u1()?),
        0x38 => Instr::Fstore(r.read_u1()?),
        0x39 => Instr::Dstore(r.read_u1()?),
        0x3a => Instr::Astore(r.read_u1()?),
        0x3b => Instr::Istore0,
        0x3c => Instr::Istore1,
        0x3d => Instr::Istore2,
        0x3e => Instr::Istore3,
        0x3f => Instr::Lstore0,
        0x40 => Instr::Lstore1,
        0x41 => Instr::Lstore2,
        0x42 => Instr::Lstore3,
        0x43 => Instr::Fstore0,
        0x44 => Instr::Fstore1,
        0x45 => Instr::Fstore2,
        0x46 => Instr::Fstore3,
        0x47 => Instr::Dstore0,
        0x48 => Instr::Dstore1,
        0x49 => Instr::Dstore2,
        0x4a => Instr::Dstore3,
        0x4b => Instr::Astore0,
        0x4c => Instr::Astore1,
        0x4d => Instr::Astore2,
        0x4e => Instr::Astore3,
        0x4f => Instr::Iastore,
        0x50 => Instr::Lastore,
        0x51 => Instr::Fastore,
        0x52 => Instr::Dastore,
        0x53 => Instr::Aastore,
        0x54 => Instr::Bastore,
        0x55 => Instr::Castore,
        0x56 => Instr::Sastore,
        0x57 => Instr::Pop,
        0x58 => Instr::Pop2,
        0x59 => Instr::Dup,
        0x5a => Instr::DupX1,
        0x5b => Instr::DupX2,
        0x5c => Instr::Dup2,
        0x5d => Instr::Dup2X1,
        0x5e => Instr::Dup2X2,
        0x5f => Instr::Swap,
        0x60 => Instr::Iadd,
        0x61 => Instr::Ladd,
        0x62 => Instr::Fadd,
        0x63 => Instr::Dadd,
        0x64 => Instr::Isub,
        0x65 => Instr::Lsub,
        0x66 => Instr::Fsub,
        0x67 => Instr::Dsub,
        0x68 => Instr::Imul,
        0x69 => Instr::Lmul,
        0x6a => Instr::Fmul,
        0x6b => Instr::Dmul,
        0x6c => Instr::Idiv,
        0x6d => Instr::Ldiv,
        0x6e => Instr::Fdiv,
        0x6f => Instr::Ddiv,
        0x70 => Instr::Irem,
        0x71 => Instr::Lrem,
        0x72 => Instr::Frem,
        0x73 => Instr::Drem,
        0x74 => Instr::Ineg,
        0x75 => Instr::Lneg,
        0x76 => Instr::Fneg,
        0x77 => Instr::Dneg,
        0x78 => Instr::Ishl,
        0x79 => Instr::Lshl,
        0x7a => Instr::Ishr,
        0x7b => Instr::Lshr,
        0x7c => Instr::Iushr,
        0x7d => Instr::Lushr,
        0x7e => Instr::Iand,
        0x7f => Instr::Land,
        0x80 => Instr::Ior,
        0x81 => Instr::Lor,
        0x82 => Instr::Ixor,
        0x83 => Instr::Lxor,
        0x84 => Instr::Iinc(r.read_u1()?, r.read_i1()?),
        0x85 => Instr::I2l,
        0x86 => Instr::I2f,
        0x87 => Instr::I2d,
        0x88 => Instr::L2i,
        0x89 => Instr::L2f,
        0x8a => Instr::L2d,
        0x8b => Instr::F2i,
        0x8c => Instr::F2l,
        0x8d => Instr::F2d,
        0x8e => Instr::D2i,
        0x8f => Instr::D2l,
        0x90 => Instr::D2f,
        0x91 => Instr::I2b,
        0x92 => Instr::I2c,
        0x93 => Instr::I2s,
        0x94 => Instr::Lcmp,
        0x95 => Instr::Fcmpl,
        0x96 => Instr::Fcmpg,
        0x97 => Instr::Dcmpl,
        0x98 => Instr::Dcmpg,
        0x99 => Instr::Ifeq(short_offset(r)?),
        0x9a => Instr::Ifne(short_offset(r)?),
        0x9b => Instr::Iflt(short_offset(r)?),
        0x9c => Instr::Ifge(short_offset(r)?),
        0x9d => Instr::Ifgt(short_offset(r)?),
        0x9e => Instr::Ifle(short_offset(r)?),
        0x9f => Instr::IfIcmpeq(short_offset(r)?),
        0xa0 => Instr::IfIcmpne(short_offset(r)?),
        0xa1 => Instr::IfIcmplt(short_offset(r)?),
        0xa2 => Instr::IfIcmpge(short_offset(r)?),
        0xa3 => Instr::IfIcmpgt(short_offset(r)?),
        0xa4 => Instr::IfIcmple(short_offset(r)?),
        0xa5 => Instr::IfAcmpeq(short_offset(r)?),
        0xa6 => Instr::IfAcmpne(short_offset(r)?),
        0xa7 => Instr::Goto(short_offset(r)?),
        0xa8 => Instr::Jsr(short_offset(r)?),
        0xa9 => Instr::Ret(r.read_u1()?),
        TABLESWITCH => {
            r.skip(switch_padding(pc))?;
            let default = r.read_i4()?;
            let low = r.read_i4()?;
            let high = r.read_i4()?;
            let count = switch_count(low, high, pc)?;
            let offsets = (0..count)
                .map(|_| r.read_i4())
                .collect::<ClassResult<Vec<_>>>()?;
            Instr::Tableswitch(TableSwitch {
                default,
                low,
                high,
                offsets,
            })
        }
        LOOKUPSWITCH => {
            r.skip(switch_padding(pc))?;
            let default = r.read_i4()?;
            let npairs = r.read_i4()?;
            let pairs = (0..npairs)
                .map(|_| Ok((r.read_i4()?, r.read_i4()?)))
                .collect::<ClassResult<Vec<_>>>()?;
            Instr::Lookupswitch(LookupSwitch { default, pairs })
        }
        0xac => Instr::Ireturn,
        0xad => Instr::Lreturn,
        0xae => Instr::Freturn,
        0xaf => Instr::Dreturn,
        0xb0 => Instr::Areturn,
        0xb1 => Instr::Return,
        0xb2 => Instr::Getstatic(CpIndex(r.read_u2()?)),
        0xb3 => Instr::Putstatic(CpIndex(r.read_u2()?)),
        0xb4 => Instr::Getfield(CpIndex(r.read_u2()?)),
        0xb5 => Instr::Putfield(CpIndex(r.read_u2()?)),
        0xb6 => Instr::Invokevirtual(CpIndex(r.read_u2()?)),
        0xb7 => Instr::Invokespecial(CpIndex(r.read_u2()?)),
        0xb8 => Instr::Invokestatic(CpIndex(r.read_u2()?)),
        0xb9 => {
            let index = CpIndex(r.read_u2()?);
            let count = r.read_u1()?;
            r.skip(1)?;
            Instr::Invokeinterface(index, count)
        }
        0xba => {
            let index = CpIndex(r.read_u2()?);
            r.skip(2)?;
            Instr::Invokedynamic(index)
        }
        0xbb => Instr::New(CpIndex(r.read_u2()?)),
        0xbc => Instr::Newarray(ArrayType(r.read_u1()?)),
        0xbd => Instr::Anewarray(CpIndex(r.read_u2()?)),
        0xbe => Instr::Arraylength,
        0xbf => Instr::Athrow,
        0xc0 => Instr::Checkcast(CpIndex(r.read_u2()?)),
        0xc1 => Instr::Instanceof(CpIndex(r.read_u2()?)),
        0xc2 => Instr::Monitorenter,
        0xc3 => Instr::Monitorexit,
        WIDE => Instr::Wide(decode_wide(r, pc)?),
        0xc5 => Instr::Multianewarray(CpIndex(r.read_u2()?), r.read_u1()?),
        0xc6 => Instr::Ifnull(short_offset(r)?),
        0xc7 => Instr::Ifnonnull(short_offset(r)?),
        0xc8 => Instr::GotoW(Offset(r.read_i4()?)),
        0xc9 => Instr::JsrW(Offset(r.read_i4()?)),
        0xca => Instr::Breakpoint,
        opcode => return Err(ClassError::UnknownOpcode { opcode, pc }),
    };
    Ok(instr)
}

fn short_offset(r: &mut Reader) -> ClassResult<Offset> {
    r.read_i2().map(|o| Offset(i32::from(o)))
}

fn decode_wide(r: &mut Reader, pc: usize) -> ClassResult<WideInstr> {
    let opcode = r.read_u1()?;
    let wide = match opcode {
        0x15 => WideInstr::Iload(r.read_u2()?),
        0x16 => WideInstr::Lload(r.read_u2()?),
        0x17 => WideInstr::Fload(r.read_u2()?),
        0x18 => WideInstr::Dload(r.read_u2()?),
        0x19 => WideInstr::Aload(r.read_u2()?),
        0x36 => WideInstr::Istore(r.read_u2()?),
        0x37 => WideInstr::Lstore(r.read_u2()?),
        0x38 => WideInstr::Fstore(r.read_u2()?),
        0x39 => WideInstr::Dstore(r.read_u2()?),
        0x3a => WideInstr::Astore(r.read_u2()?),
        0xa9 => WideInstr::Ret(r.read_u2()?),
        IINC => WideInstr::Iinc(r.read_u2()?, r.read_i2()?),
        opcode => return Err(ClassError::BadWide { opcode, pc }),
    };
    Ok(wide)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_lengths_follow_table() {
        for opcode in 0..=0xcau8 {
            if matches!(opcode, TABLESWITCH | LOOKUPSWITCH | WIDE) {
                continue;
            }
            // operands are zero: enough room for any fixed-size instruction
            let code = [opcode, 0, 0, 0, 0];
            assert_eq!(
                usize::from(OPCODE_LENGTHS[usize::from(opcode)]),
                length_of(&code, 0).unwrap(),
                "opcode {opcode:#04x}"
            );
        }
        assert!(matches!(
            length_of(&[0xcb], 0),
            Err(ClassError::UnknownOpcode { opcode: 0xcb, pc: 0 })
        ));
    }

    fn tableswitch_at(pc: usize, low: i32, high: i32) -> Vec<u8> {
        let mut code = vec![0u8; pc];
        code.push(TABLESWITCH);
        code.extend(std::iter::repeat(0).take(switch_padding(pc)));
        code.extend(20i32.to_be_bytes());
        code.extend(low.to_be_bytes());
        code.extend(high.to_be_bytes());
        for i in low..=high {
            code.extend((24 + 4 * i).to_be_bytes());
        }
        code
    }

    fn lookupswitch_at(pc: usize, keys: &[i32]) -> Vec<u8> {
        let mut code = vec![0u8; pc];
        code.push(LOOKUPSWITCH);
        code.extend(std::iter::repeat(0).take(switch_padding(pc)));
        code.extend(40i32.to_be_bytes());
        code.extend((keys.len() as i32).to_be_bytes());
        for key in keys {
            code.extend(key.to_be_bytes());
            code.extend(8i32.to_be_bytes());
        }
        code
    }

    #[test]
    fn tableswitch_length() {
        for pc in 0..4 {
            let code = tableswitch_at(pc, 0, 2);
            let padding = switch_padding(pc);
            assert_eq!(1 + padding + 12 + 4 * 3, length_of(&code, pc).unwrap());
            assert_eq!(code.len() - pc, length_of(&code, pc).unwrap());
        }
        let code = tableswitch_at(1, -1, 1);
        assert_eq!(2, switch_padding(1));
        assert_eq!(1 + 2 + 12 + 12, length_of(&code, 1).unwrap());
    }

    #[test]
    fn lookupswitch_length() {
        for pc in 0..4 {
            let code = lookupswitch_at(pc, &[1, 10, 100]);
            let padding = switch_padding(pc);
            assert_eq!(1 + padding + 8 + 8 * 3, length_of(&code, pc).unwrap());
            assert_eq!(code.len() - pc, length_of(&code, pc).unwrap());
        }
    }

    #[test]
    fn wide_lengths() {
        assert_eq!(6, length_of(&[WIDE, IINC, 0, 1, 0, 2], 0).unwrap());
        assert_eq!(4, length_of(&[WIDE, 0x15, 1, 0], 0).unwrap());
        assert!(matches!(
            length_of(&[WIDE, 0x60], 0),
            Err(ClassError::BadWide { opcode: 0x60, .. })
        ));
    }

    #[test]
    fn decode_stream() {
        // iconst_1; istore_1; wide iinc 1 300; iload_1; ifeq -6; return
        let code = [
            0x04, 0x3c, WIDE, IINC, 0x00, 0x01, 0x01, 0x2c, 0x1b, 0x99, 0xff, 0xfa, 0xb1,
        ];
        let instrs = decode(&code).unwrap();
        let addrs: Vec<usize> = instrs.iter().map(|i| i.addr().0).collect();
        assert_eq!(vec![0, 1, 2, 8, 9, 12], addrs);
        assert_eq!(&Instr::Wide(WideInstr::Iinc(1, 300)), instrs[2].instr());
        assert_eq!(&Instr::Ifeq(Offset(-6)), instrs[4].instr());
        assert_eq!("ifeq -6", instrs[4].instr().to_string());
        assert_eq!(Addr(13), instrs[5].next_addr());
        assert_eq!("wide", instrs[2].mnemonic());
        assert_eq!(0xb1, instrs[5].opcode());
    }

    #[test]
    fn decode_switch_cases() {
        let code = tableswitch_at(3, 0, 2);
        let err = decode(&code[3..]).unwrap_err();
        // the table is aligned for pc 3, not for pc 0
        assert!(matches!(err, ClassError::Truncated { .. }));

        let code = tableswitch_at(0, 0, 2);
        let instrs = decode(&code).unwrap();
        assert_eq!(1, instrs.len());
        match instrs[0].instr() {
            Instr::Tableswitch(table) => {
                assert_eq!(20, table.default);
                assert_eq!(
                    vec![(0, 24), (1, 28), (2, 32)],
                    table.cases().collect::<Vec<_>>()
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncated_operands() {
        assert!(matches!(
            decode(&[0x11, 0x01]),
            Err(ClassError::Truncated { offset: 0, .. })
        ));
    }
}
