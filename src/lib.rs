//! # `ClassWorks`
//!
//! `classworks` is the main crate of the `ClassWorks` JVM class file analysis
//! project. The project is subdivided into multiple crates, `classworks` acts
//! as entry point by reexporting important structs and functions from those
//! sub-crates. Most of the reexport are done within the `classworks::prelude`
//! namespace.
//!
//! ## Library basics
//!
//! Class files are opened and decoded with the `cw_classfile` API:
//!
//! ```rust,no_run
//! use classworks::prelude::*;
//! use classworks::classfile;
//!
//! let class = classfile::open("Hello.class")?;
//! println!("class {} version {}.{}", class.name()?, class.major_version(), class.minor_version());
//! # Ok::<(), CwError>(())
//! ```
//!
//! Verifying a class needs a class path, from which the superclasses of the
//! referenced classes are loaded when types have to be merged:
//!
//! ```rust,no_run
//! use classworks::prelude::*;
//! use classworks::classfile;
//!
//! let classpath = ClassPath::from_env()?;
//! let class = classfile::open("Hello.class")?;
//! let report = verify_class(&class, &classpath, &Config::default())?;
//! println!("verified methods: {} / {}", report.nb_success(), report.methods.len());
//! # Ok::<(), CwError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`cw_classfile`] contains the class file data structures, the binary
//!    reader and the bytecode decoder,
//!  - [`cw_analysis`] contains the analysis algorithms (control flow graphs,
//!    dataflow, typing, structural checks and verification driver),
//!  - [`cw_utils`] contains the jar archive helpers.

mod errors;

pub mod cli;
pub mod cw_cfg;
pub mod cw_dissect;
pub mod cw_verify;
pub mod inputs;

pub use cw_analysis as analysis;
pub use cw_classfile as classfile;
pub use cw_utils as utils;

/// Reexport module of commonly used structures and functions from `ClassWorks` project
/// sub-crates:
///
/// ```rust
/// use classworks::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{CwError, CwResult};

    pub use cw_analysis::classpath::ClassPath;
    pub use cw_analysis::controlflow;
    pub use cw_analysis::verifier::{verify_class, ClassReport, Config, MethodReport, Verbosity};

    pub use cw_classfile::classes::ClassFile;
    pub use cw_classfile::methods::MethodInfo;
    pub use cw_classfile::Addr;

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("CW_LOG", "info")
            .write_style("CW_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
