//! Global error handling.
//!
//! Each sub-crate of the project defines its own type error.
//! Their types can be unified, for example in a main function,
//! when winding results at the top-level.
//!
//! ```rust,no_run
//! use classworks::prelude::*;
//! use classworks::classfile;
//!
//! fn main() -> CwResult<()> { // can return a CwError
//!    let _class = classfile::open("Hello.class")?; // can return a ClassError
//!    Ok(())
//! }
//! ```

use cw_analysis::errors::AnalysisError;
use cw_classfile::errors::ClassError;
use cw_utils::errors::UtilsError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`CwError`].
pub type CwResult<T> = Result<T, CwError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum CwError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Custom error for reporting a class or a method rejected by the verifier.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned when writing JSON reports.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error that can be returned from [`cw_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from [`cw_classfile`] functions.
    #[error(transparent)]
    Class(#[from] ClassError),

    /// Error that can be returned from [`cw_utils`] jar functions.
    #[error(transparent)]
    Utils(#[from] UtilsError),
}
