//! Command line inputs: a single class file or a jar archive.

use crate::prelude::*;
use clap::ArgMatches;
use cw_classfile::errors::ClassError;
use rayon::prelude::*;
use regex::Regex;
use std::env;
use std::path::Path;
use std::sync::Arc;

/// Classes read from an input path. Jar entries that fail to parse are kept
/// aside with their entry name so that they can be reported.
pub struct Input {
    classes: Vec<Arc<ClassFile>>,
    failures: Vec<(String, ClassError)>,
}

impl Input {
    /// Reads `path` and registers every parsed class in `classpath`, so that
    /// classes of the same archive resolve each other.
    pub fn open<P: AsRef<Path>>(path: P, classpath: &ClassPath) -> CwResult<Self> {
        let path = path.as_ref();
        if cw_utils::jar::is_jar(path) {
            let entries = cw_utils::jar::read_class_entries(path)?;
            log::debug!("{} class entries in {}", entries.len(), path.display());
            let parsed: Vec<_> = entries
                .into_par_iter()
                .map(|entry| (entry.name, cw_classfile::parse(&entry.data)))
                .collect();

            let mut classes = Vec::new();
            let mut failures = Vec::new();
            for (name, res) in parsed {
                match res {
                    Ok(class) => classes.push(classpath.register(class)?),
                    Err(err) => failures.push((name, err)),
                }
            }
            Ok(Self { classes, failures })
        } else if path.extension().map_or(false, |ext| ext == "class") {
            let class = cw_classfile::open(path)?;
            Ok(Self {
                classes: vec![classpath.register(class)?],
                failures: Vec::new(),
            })
        } else {
            Err(CwError::BadArguments(format!(
                "unknown input file extension: {}",
                path.display()
            )))
        }
    }

    /// Parsed classes whose name matches `filter`, if any.
    pub fn iter_classes<'a>(
        &'a self,
        filter: Option<&'a Regex>,
    ) -> impl Iterator<Item = &'a Arc<ClassFile>> + 'a {
        self.classes.iter().filter(move |class| match filter {
            None => true,
            Some(filter) => class
                .name()
                .map_or(false, |name| filter.is_match(&name)),
        })
    }

    #[inline]
    pub fn failures(&self) -> impl Iterator<Item = &(String, ClassError)> {
        self.failures.iter()
    }
}

/// Builds the class path from `--classpath` when given, from the
/// `CLASSPATH` environment variable otherwise.
pub fn classpath(args: &ArgMatches) -> CwResult<ClassPath> {
    let classpath = match args.get_one::<String>("classpath") {
        Some(value) => ClassPath::from_paths(
            env::split_paths(value).filter(|p| !p.as_os_str().is_empty()),
        )?,
        None => ClassPath::from_env()?,
    };
    log::debug!("{} class path entries", classpath.entries().count());
    Ok(classpath)
}

/// Compiles the optional regex given for argument `name`.
pub fn filter(args: &ArgMatches, name: &str) -> CwResult<Option<Regex>> {
    Ok(args
        .get_one::<String>(name)
        .map(|r| Regex::new(r))
        .transpose()?)
}
