//! Jar archives reading functions.
//!
//! A jar is a zip archive; only `.class` entries matter to the analyses,
//! other resources are skipped.

use crate::errors::{UtilsError, UtilsResult};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipArchive;

/// A class file read from an archive, with its entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Returns `true` if the path looks like a jar archive.
#[must_use]
pub fn is_jar<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}

/// Returns `true` if the archive entry name is a class file.
#[must_use]
pub fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class") && !name.ends_with('/')
}

/// Open `path` as a jar and reads every class entry, in archive order.
pub fn read_class_entries<P: AsRef<Path>>(path: P) -> UtilsResult<Vec<JarEntry>> {
    let display = path.as_ref().display().to_string();
    let file = File::open(path)?;
    let zip = ZipArchive::new(file).map_err(|_| UtilsError::Open(display))?;
    class_entries(zip)
}

/// Same as [`read_class_entries`] on an in-memory or already opened archive.
pub fn read_class_entries_from<R: Read + Seek>(reader: R) -> UtilsResult<Vec<JarEntry>> {
    class_entries(ZipArchive::new(reader)?)
}

fn class_entries<R: Read + Seek>(mut zip: ZipArchive<R>) -> UtilsResult<Vec<JarEntry>> {
    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if !file.is_file() || !is_class_entry(file.name()) {
            log::trace!("skipping jar entry {}", file.name());
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        log::trace!("read jar entry {name} ({} bytes)", data.len());
        entries.push(JarEntry { name, data });
    }
    Ok(entries)
}

/// Reads a single entry of a jar, [`None`] if absent.
pub fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> UtilsResult<Option<Vec<u8>>> {
    let mut file = match zip.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// A jar archive kept open for repeated entry lookups, as done by class path
/// resolution. Lookups are serialized through an internal lock.
#[derive(Debug)]
pub struct JarFile {
    path: PathBuf,
    zip: Mutex<ZipArchive<File>>,
}

impl JarFile {
    pub fn open<P: AsRef<Path>>(path: P) -> UtilsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let zip = ZipArchive::new(file).map_err(|_| UtilsError::Open(path.display().to_string()))?;
        Ok(Self {
            path,
            zip: Mutex::new(zip),
        })
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the entry called `name`, [`None`] if the archive has no such entry.
    pub fn read(&self, name: &str) -> UtilsResult<Option<Vec<u8>>> {
        let mut zip = self
            .zip
            .lock()
            .map_err(|_| UtilsError::Lock(self.path.display().to_string()))?;
        read_entry(&mut zip, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn jar() -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        writer.add_directory("org/example/", options).unwrap();
        writer.start_file("org/example/A.class", options).unwrap();
        writer.write_all(&[0xca, 0xfe, 0xba, 0xbe]).unwrap();
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        writer.start_file("org/example/B.class", options).unwrap();
        writer.write_all(&[0xca, 0xfe]).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn reads_only_classes() {
        let entries = read_class_entries_from(jar()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(vec!["org/example/A.class", "org/example/B.class"], names);
        assert_eq!(vec![0xca, 0xfe, 0xba, 0xbe], entries[0].data);
    }

    #[test]
    fn single_entry() {
        let mut zip = ZipArchive::new(jar()).unwrap();
        assert_eq!(
            Some(vec![0xca, 0xfe]),
            read_entry(&mut zip, "org/example/B.class").unwrap()
        );
        assert_eq!(None, read_entry(&mut zip, "org/example/C.class").unwrap());
    }

    #[test]
    fn open_jar_lookup() {
        let path = std::env::temp_dir().join(format!("cw_utils_{}.jar", std::process::id()));
        std::fs::write(&path, jar().into_inner()).unwrap();
        let jar = JarFile::open(&path).unwrap();
        assert_eq!(path.as_path(), jar.path());
        assert!(jar.read("org/example/A.class").unwrap().is_some());
        assert!(jar.read("org/example/Missing.class").unwrap().is_none());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn jar_paths() {
        assert!(is_jar("lib/rt.jar"));
        assert!(is_jar("LIB.JAR"));
        assert!(!is_jar("A.class"));
        assert!(is_class_entry("a/B.class"));
        assert!(!is_class_entry("a/B.java"));
    }
}
