//! Typing errors definitions.

use cw_classfile::Addr;
use thiserror::Error;

/// The typing error type.
///
/// Every variant carries the address and the mnemonic of the instruction
/// (or the join point) where the abstract interpretation failed.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("{op}@{pc}: operand stack underflow")]
    StackUnderflow { pc: Addr, op: String },

    #[error("{op}@{pc}: operand stack overflow (max_stack = {max})")]
    StackOverflow { pc: Addr, op: String, max: usize },

    #[error("{op}@{pc}: bad operand, expected {expected} but found {found}")]
    BadOperand {
        pc: Addr,
        op: String,
        expected: String,
        found: String,
    },

    #[error("{op}@{pc}: bad local {index}, expected {expected} but found {found}")]
    BadLocal {
        pc: Addr,
        op: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{op}@{pc}: local {index} out of bounds (max_locals = {max})")]
    LocalOutOfBounds {
        pc: Addr,
        op: String,
        index: usize,
        max: usize,
    },

    #[error("join@{pc}: stack heights differ ({left} and {right})")]
    StackHeightMismatch { pc: Addr, left: usize, right: usize },

    #[error("join@{pc}: incompatible stack slot {slot} ({left} and {right})")]
    StackMismatch {
        pc: Addr,
        slot: usize,
        left: String,
        right: String,
    },

    #[error("{op}@{pc}: unexpected {kind} constant")]
    BadConstant { pc: Addr, op: String, kind: String },

    #[error("{op}@{pc}: method is declared to return {expected}")]
    BadReturn {
        pc: Addr,
        op: String,
        expected: String,
    },
}
