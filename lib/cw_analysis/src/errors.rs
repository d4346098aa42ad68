//! Analysis errors definition.

use crate::structure::StructureError;
use crate::typing::errors::TypeError;
use cw_classfile::errors::ClassError;
use cw_classfile::Addr;
use cw_utils::errors::UtilsError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("class file error: {0}")]
    Class(#[from] ClassError),

    #[error("utils error: {0}")]
    Utils(#[from] UtilsError),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("cyclic class hierarchy through {0}")]
    HierarchyCycle(String),

    #[error("invalid branch target {target} from pc {from}")]
    InvalidBranchTarget { from: Addr, target: i64 },

    #[error("the method has no implementation")]
    NoCode,

    #[error("typing error: {0}")]
    Type(#[from] TypeError),

    #[error("{0}")]
    Structure(#[from] StructureError),
}
