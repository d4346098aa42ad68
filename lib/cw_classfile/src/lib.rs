//! JVM class file data structures definitions.

mod addr;
mod parsers;
mod reader;

pub mod attributes;
pub mod classes;
pub mod code;
pub mod constants;
pub mod descriptors;
pub mod errors;
pub mod fields;
pub mod instrs;
pub mod methods;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::addr::Addr;
pub use crate::parsers::parse_class as parse;
pub use crate::reader::Reader;

use crate::classes::ClassFile;
use crate::errors::ClassResult;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Open and parses the given class file path.
pub fn open<P: AsRef<Path>>(path: P) -> ClassResult<ClassFile> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    parse(&contents)
}
