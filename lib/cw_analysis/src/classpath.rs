//! Class lookup and caching.
//!
//! The type lattice needs superclass chains of classes other than the one
//! being verified. They are searched along a class path (directories and jar
//! archives, like the JVM `CLASSPATH`) and parsed at most once.

use crate::errors::{AnalysisError, AnalysisResult};
use cw_classfile::classes::{ClassFile, JAVA_LANG_OBJECT};
use cw_utils::jar::{self, JarFile};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const CLASSPATH_VAR: &str = "CLASSPATH";

#[derive(Debug)]
pub enum ClassPathEntry {
    Dir(PathBuf),
    Jar(JarFile),
}

impl ClassPathEntry {
    /// Opens a class path element: jar archives are opened right away,
    /// anything else is taken as a directory.
    pub fn open<P: AsRef<Path>>(path: P) -> AnalysisResult<Self> {
        let path = path.as_ref();
        if jar::is_jar(path) {
            Ok(Self::Jar(JarFile::open(path)?))
        } else {
            Ok(Self::Dir(path.to_path_buf()))
        }
    }

    fn read(&self, name: &str) -> AnalysisResult<Option<Vec<u8>>> {
        match self {
            Self::Dir(dir) => {
                let path = dir.join(format!("{name}.class"));
                if path.is_file() {
                    Ok(Some(std::fs::read(path).map_err(cw_utils::errors::UtilsError::from)?))
                } else {
                    Ok(None)
                }
            }
            Self::Jar(jar) => Ok(jar.read(&format!("{name}.class"))?),
        }
    }
}

/// An ordered list of class path entries, with a cache of parsed classes
/// shared by every analysis using it.
#[derive(Debug, Default)]
pub struct ClassPath {
    entries: Vec<ClassPathEntry>,
    cache: RwLock<HashMap<String, Arc<ClassFile>>>,
}

impl ClassPath {
    #[must_use]
    pub fn new(entries: Vec<ClassPathEntry>) -> Self {
        Self {
            entries,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a class path from a list of directories and jars.
    pub fn from_paths<I, P>(paths: I) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let entries = paths
            .into_iter()
            .map(ClassPathEntry::open)
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    /// Builds a class path from the `CLASSPATH` environment variable; an
    /// unset variable gives an empty class path.
    pub fn from_env() -> AnalysisResult<Self> {
        match env::var_os(CLASSPATH_VAR) {
            Some(value) => Self::from_paths(env::split_paths(&value).filter(|p| !p.as_os_str().is_empty())),
            None => Ok(Self::default()),
        }
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = &ClassPathEntry> {
        self.entries.iter()
    }

    /// Makes an already parsed class resolvable by name, taking precedence
    /// over the class path entries.
    pub fn register(&self, class: ClassFile) -> AnalysisResult<Arc<ClassFile>> {
        let name = class.name()?;
        let class = Arc::new(class);
        self.cache_write()?.insert(name, class.clone());
        Ok(class)
    }

    /// Returns the class called `name` (internal form), reading it from the
    /// class path on first request.
    pub fn load(&self, name: &str) -> AnalysisResult<Arc<ClassFile>> {
        if let Some(class) = self.cache_read()?.get(name) {
            return Ok(class.clone());
        }
        for entry in &self.entries {
            if let Some(data) = entry.read(name)? {
                log::debug!("loading class {name}");
                let class = Arc::new(cw_classfile::parse(&data)?);
                self.cache_write()?
                    .insert(name.to_string(), class.clone());
                return Ok(class);
            }
        }
        Err(AnalysisError::ClassNotFound(name.to_string()))
    }

    /// Returns `true` when the class can be found. `java/lang/Object` is
    /// always known.
    pub fn exists(&self, name: &str) -> AnalysisResult<bool> {
        if name == JAVA_LANG_OBJECT {
            return Ok(true);
        }
        match self.load(name) {
            Ok(_) => Ok(true),
            Err(AnalysisError::ClassNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Direct superclass name, [`None`] for `java/lang/Object`.
    pub fn super_of(&self, name: &str) -> AnalysisResult<Option<String>> {
        if name == JAVA_LANG_OBJECT {
            return Ok(None);
        }
        Ok(self.load(name)?.super_name()?)
    }

    /// The class followed by all its superclasses, ending with
    /// `java/lang/Object`.
    pub fn superclasses(&self, name: &str) -> AnalysisResult<Vec<String>> {
        let mut chain = vec![name.to_string()];
        let mut seen: HashSet<String> = chain.iter().cloned().collect();
        let mut current = name.to_string();
        while let Some(parent) = self.super_of(&current)? {
            if !seen.insert(parent.clone()) {
                return Err(AnalysisError::HierarchyCycle(parent));
            }
            chain.push(parent.clone());
            current = parent;
        }
        if current != JAVA_LANG_OBJECT {
            // only java/lang/Object may lack a superclass
            chain.push(JAVA_LANG_OBJECT.to_string());
        }
        Ok(chain)
    }

    /// Nearest common superclass of two classes.
    ///
    /// Both chains are aligned on their distance to `java/lang/Object`, then
    /// climbed in lockstep until they meet.
    pub fn find_common(&self, name1: &str, name2: &str) -> AnalysisResult<String> {
        if name1 == name2 {
            return Ok(name1.to_string());
        }
        let chain1 = self.superclasses(name1)?;
        let chain2 = self.superclasses(name2)?;
        let depth = chain1.len().min(chain2.len());
        let aligned1 = &chain1[chain1.len() - depth..];
        let aligned2 = &chain2[chain2.len() - depth..];
        let common = aligned1
            .iter()
            .zip(aligned2)
            .find(|(c1, c2)| c1 == c2)
            .map_or(JAVA_LANG_OBJECT, |(c1, _)| c1.as_str());
        log::trace!("common superclass of {name1} and {name2}: {common}");
        Ok(common.to_string())
    }

    /// Returns `true` if `name` is `ancestor` or one of its subclasses.
    pub fn is_subclass_of(&self, name: &str, ancestor: &str) -> AnalysisResult<bool> {
        Ok(self.superclasses(name)?.iter().any(|c| c == ancestor))
    }

    fn cache_read(
        &self,
    ) -> AnalysisResult<std::sync::RwLockReadGuard<HashMap<String, Arc<ClassFile>>>> {
        self.cache
            .read()
            .map_err(|_| AnalysisError::Internal("poisoned class cache".to_string()))
    }

    fn cache_write(
        &self,
    ) -> AnalysisResult<std::sync::RwLockWriteGuard<HashMap<String, Arc<ClassFile>>>> {
        self.cache
            .write()
            .map_err(|_| AnalysisError::Internal("poisoned class cache".to_string()))
    }
}
