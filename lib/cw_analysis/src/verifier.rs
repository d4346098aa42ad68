//! Verification driver.
//!
//! A class is first checked structurally, then every method with code is
//! typed: its control flow graph is built and the typing pass is iterated up
//! to a fixpoint. A structural failure stops the verification of the class,
//! a typing failure only stops the verification of its method.

use crate::classpath::ClassPath;
use crate::controlflow::Cfg;
use crate::dataflow::AbstractForwardState;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::structure;
use crate::typing::{Frame, MethodContext, Types};
use cw_classfile::classes::ClassFile;
use cw_classfile::methods::MethodInfo;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// How much of the analysis is reported through the `info` log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Verbosity {
    #[default]
    Silent,
    /// One line per method.
    Summary,
    /// Frames at the entry of every block.
    Blocks,
    /// Frames after every instruction.
    Instructions,
}

impl From<u8> for Verbosity {
    fn from(level: u8) -> Self {
        match level {
            0 => Self::Silent,
            1 => Self::Summary,
            2 => Self::Blocks,
            _ => Self::Instructions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub verbosity: Verbosity,
    /// Runs the structural checks before typing.
    pub structural: bool,
    /// Runs the typing pass on methods with code.
    pub dataflow: bool,
    /// Only methods whose name matches are typed.
    pub method_filter: Option<Regex>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            structural: true,
            dataflow: true,
            method_filter: None,
        }
    }
}

impl Config {
    fn selects(&self, method_name: &str) -> bool {
        self.method_filter
            .as_ref()
            .map_or(true, |filter| filter.is_match(method_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodReport {
    pub name: String,
    pub descriptor: String,
    /// Number of basic blocks, 0 when the graph could not be built.
    pub blocks: usize,
    pub error: Option<String>,
}

impl MethodReport {
    #[inline]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for MethodReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error {
            None => write!(f, "{}{}: ok ({} blocks)", self.name, self.descriptor, self.blocks),
            Some(err) => write!(f, "{}{}: {err}", self.name, self.descriptor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub name: String,
    /// Violated structural rule, if any.
    pub structure: Option<String>,
    pub methods: Vec<MethodReport>,
}

impl ClassReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.structure.is_none() && self.methods.iter().all(MethodReport::is_ok)
    }

    /// Number of successfully typed methods.
    #[must_use]
    pub fn nb_success(&self) -> usize {
        self.methods.iter().filter(|m| m.is_ok()).count()
    }
}

/// Results of the typing pass over one method.
pub struct MethodAnalysis {
    pub cfg: Cfg,
    pub types: Types,
}

/// Verifies a whole class according to `config`.
///
/// # Errors
///
/// Verification failures are recorded in the returned report. Errors are
/// returned only when the class name cannot be resolved or when the class
/// path fails during the structural checks.
pub fn verify_class(
    class: &ClassFile,
    classpath: &ClassPath,
    config: &Config,
) -> AnalysisResult<ClassReport> {
    let mut report = ClassReport {
        name: class.name()?,
        structure: None,
        methods: Vec::new(),
    };
    log::debug!("verifying class {}", report.name);

    if config.structural {
        match structure::check_class(class, classpath) {
            Ok(()) => (),
            Err(AnalysisError::Structure(err)) => {
                if config.verbosity >= Verbosity::Summary {
                    log::info!("{}: {err}", report.name);
                }
                report.structure = Some(err.to_string());
                return Ok(report);
            }
            Err(err) => return Err(err),
        }
    }

    if !config.dataflow {
        return Ok(report);
    }

    let pool = class.constant_pool();
    for method in class.iter_methods().filter(|m| m.code().is_some()) {
        let name = method.name(pool)?;
        if !config.selects(&name) {
            continue;
        }
        let mut method_report = MethodReport {
            name,
            descriptor: method.descriptor(pool)?,
            blocks: 0,
            error: None,
        };
        match verify_method(class, method, classpath, config.verbosity) {
            Ok(analysis) => method_report.blocks = analysis.cfg.nb_blocks(),
            Err(err) => method_report.error = Some(err.to_string()),
        }
        if config.verbosity >= Verbosity::Summary {
            log::info!("{}.{method_report}", report.name);
        }
        report.methods.push(method_report);
    }

    Ok(report)
}

/// Builds the control flow graph of a method and types it up to a
/// fixpoint. Frames are logged according to `verbosity`.
///
/// # Errors
///
/// Fails when the method has no code, when its code cannot be decoded into
/// a control flow graph, or when typing fails.
pub fn verify_method(
    class: &ClassFile,
    method: &MethodInfo,
    classpath: &ClassPath,
    verbosity: Verbosity,
) -> AnalysisResult<MethodAnalysis> {
    let context = MethodContext::new(class, method, classpath)?;
    log::debug!(
        "typing {}.{}{}",
        context.class_name,
        context.method_name,
        context.descriptor
    );
    let cfg = Cfg::build(context.code, class.constant_pool())?;
    let types = Types::forward_compute(&cfg, &context)?;
    if verbosity >= Verbosity::Blocks {
        log_frames(&cfg, &types, &context, verbosity)?;
    }
    Ok(MethodAnalysis { cfg, types })
}

fn log_frame(frame: &Frame) {
    for line in frame.to_string().lines() {
        log::info!("      {line}");
    }
}

fn log_frames(
    cfg: &Cfg,
    types: &Types,
    context: &MethodContext,
    verbosity: Verbosity,
) -> AnalysisResult<()> {
    log::info!(
        "{}.{}{}",
        context.class_name,
        context.method_name,
        context.descriptor
    );
    for block in cfg.iter_ordered_blocks() {
        let Some(entry) = types.entries.get(&block.start_addr()) else {
            log::info!("  block@{}: unreachable", block.start_addr());
            continue;
        };
        log::info!("  block@{}:", block.start_addr());
        log_frame(entry);
        if verbosity < Verbosity::Instructions {
            continue;
        }
        let mut frame = entry.clone();
        for linstr in block.instructions() {
            frame.transfer_instr(linstr, context)?;
            log::info!("    {linstr}");
            log_frame(&frame);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_classfile::testing::ClassBuilder;

    fn sample() -> ClassFile {
        let mut builder = ClassBuilder::new("t/Sample");
        let init = builder.method_ref("java/lang/Object", "<init>", "()V");
        let [hi, lo] = init.to_be_bytes();
        // aload_0 invokespecial Object.<init> return
        builder.method_with_code(0x0001, "<init>", "()V", 1, 1, &[0x2a, 0xb7, hi, lo, 0xb1], &[]);
        // iload_0 ifeq +7 iconst_1 goto +4 iconst_2 ireturn
        builder.method_with_code(
            0x0009,
            "choose",
            "(I)I",
            1,
            1,
            &[0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x05, 0xac],
            &[],
        );
        // fconst_0 ireturn
        builder.method_with_code(0x0009, "broken", "()I", 1, 0, &[0x0b, 0xac], &[]);
        builder.method(0x0101, "native", "()V", Vec::new());
        builder.parse().unwrap()
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(Verbosity::Silent, Verbosity::from(0));
        assert_eq!(Verbosity::Blocks, Verbosity::from(2));
        assert_eq!(Verbosity::Instructions, Verbosity::from(7));
        assert!(Verbosity::Summary < Verbosity::Instructions);
    }

    #[test]
    fn class_verification() {
        let class = sample();
        let classpath = ClassPath::default();
        let config = Config {
            verbosity: Verbosity::Instructions,
            ..Config::default()
        };
        let report = verify_class(&class, &classpath, &config).unwrap();
        assert_eq!("t/Sample", report.name);
        assert_eq!(None, report.structure);
        assert_eq!(3, report.methods.len());
        assert!(!report.is_ok());
        assert_eq!(2, report.nb_success());

        let choose = &report.methods[1];
        assert_eq!(("choose", "(I)I", 4), (choose.name.as_str(), choose.descriptor.as_str(), choose.blocks));
        assert!(choose.is_ok());
        let broken = &report.methods[2];
        assert!(broken.error.is_some());
        assert!(broken.to_string().starts_with("broken()I: "));
    }

    #[test]
    fn method_filter() {
        let class = sample();
        let config = Config {
            method_filter: Some(Regex::new("^cho").unwrap()),
            ..Config::default()
        };
        let report = verify_class(&class, &ClassPath::default(), &config).unwrap();
        assert_eq!(1, report.methods.len());
        assert!(report.is_ok());

        let config = Config {
            dataflow: false,
            ..Config::default()
        };
        let report = verify_class(&class, &ClassPath::default(), &config).unwrap();
        assert!(report.methods.is_empty());
    }

    #[test]
    fn structural_failure_stops_verification() {
        let mut builder = ClassBuilder::new("t/Old");
        builder.version(50, 0);
        builder.method_with_code(0x0009, "run", "()V", 0, 0, &[0xb1], &[]);
        let class = builder.parse().unwrap();
        let report = verify_class(&class, &ClassPath::default(), &Config::default()).unwrap();
        assert_eq!(
            Some("Verification Pass 2: Bad major version (1)".to_string()),
            report.structure
        );
        assert!(report.methods.is_empty());

        let config = Config {
            structural: false,
            ..Config::default()
        };
        let report = verify_class(&class, &ClassPath::default(), &config).unwrap();
        assert!(report.is_ok());
        assert_eq!(1, report.methods.len());
    }

    #[test]
    fn branch_past_code_end() {
        let mut builder = ClassBuilder::new("t/Jumpy");
        // goto +100 return
        builder.method_with_code(0x0009, "away", "()V", 0, 0, &[0xa7, 0x00, 0x64, 0xb1], &[]);
        let class = builder.parse().unwrap();
        let method = class.find_method("away", "()V").unwrap().unwrap();
        assert!(matches!(
            verify_method(&class, method, &ClassPath::default(), Verbosity::Silent),
            Err(AnalysisError::InvalidBranchTarget { target: 100, .. })
        ));
        let report = verify_class(&class, &ClassPath::default(), &Config::default()).unwrap();
        assert!(!report.is_ok());
        assert_eq!(0, report.nb_success());
    }

    #[test]
    fn converged_results() {
        let class = sample();
        let classpath = ClassPath::default();
        let method = class.find_method("choose", "(I)I").unwrap().unwrap();
        let analysis = verify_method(&class, method, &classpath, Verbosity::Silent).unwrap();
        let context = MethodContext::new(&class, method, &classpath).unwrap();
        assert!(analysis.types.is_fixpoint(&analysis.cfg, &context).unwrap());
        assert_eq!(analysis.cfg.nb_blocks(), analysis.types.entries.len());

        let native = class.find_method("native", "()V").unwrap().unwrap();
        assert!(matches!(
            verify_method(&class, native, &classpath, Verbosity::Silent),
            Err(AnalysisError::NoCode)
        ));
    }
}
