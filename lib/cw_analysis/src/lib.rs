//! This crate provides JVM bytecode analysis algorithms for the `ClassWorks`
//! project: control flow graphs, a forward dataflow framework, bytecode
//! typing and class file verification.

pub mod classpath;
pub mod controlflow;
pub mod dataflow;
pub mod errors;
pub mod structure;
pub mod typing;
pub mod verifier;
