use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{
    buffer::LineBuffer,
    error::InjectionError,
    injection::{perform_injection, InjectionReport},
};

/// One smali file on disk, held for the duration of an injection.
///
/// Edits stay in memory until [`SmaliFile::commit`]. A file dropped without a commit
/// keeps its original content on disk, so a failed injection never leaves a
/// half-patched class behind.
#[derive(Debug)]
pub struct SmaliFile {
    path: PathBuf,
    lines: LineBuffer,
    dirty: bool,
}

impl SmaliFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, InjectionError> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|source| InjectionError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            lines: LineBuffer::parse(&text),
            dirty: false,
        })
    }

    /// Open the smali of `entry_activity` inside an APKEditor output directory.
    pub fn find(decoded_root: &Path, entry_activity: &str) -> Result<Self, InjectionError> {
        Self::open(find_smali(decoded_root, entry_activity)?)
    }

    /// Open `path`, inject the load call for `library_name` and write it back.
    pub fn patch(
        path: impl Into<PathBuf>,
        library_name: &str,
    ) -> Result<InjectionReport, InjectionError> {
        let mut file = Self::open(path)?;
        let report = file.inject(library_name)?;
        file.commit()?;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &LineBuffer {
        &self.lines
    }

    pub fn inject(&mut self, library_name: &str) -> Result<InjectionReport, InjectionError> {
        let (patched, report) = perform_injection(self.lines.clone(), library_name)?;
        self.lines = patched;
        self.dirty = true;
        Ok(report)
    }

    /// Persist the patched lines in place. A file with no edits is not rewritten.
    pub fn commit(mut self) -> Result<(), InjectionError> {
        if self.dirty {
            fs::write(&self.path, self.lines.to_text()).map_err(|source| InjectionError::Io {
                path: self.path.clone(),
                source,
            })?;
            debug!("Wrote {}", self.path.display());
        }
        self.dirty = false;
        Ok(())
    }
}

impl Drop for SmaliFile {
    fn drop(&mut self) {
        if self.dirty {
            debug!(
                "Discarding uncommitted edits to {}",
                self.path.display()
            );
        }
    }
}

/// Locate `<SimpleName>.smali` for a dotted class name under `<decoded_root>/smali`.
///
/// Every dex directory is searched. When several classes share the simple name, the
/// one whose path matches the package wins, otherwise the first in path order. A
/// directory that can't be read fails the search rather than narrowing it.
pub fn find_smali(decoded_root: &Path, entry_activity: &str) -> Result<PathBuf, InjectionError> {
    let simple_name = entry_activity.rsplit('.').next().unwrap_or(entry_activity);
    let target = format!("{simple_name}.smali");
    let qualified = PathBuf::from(format!("{}.smali", entry_activity.replace('.', "/")));

    info!("Looking for {}...", target);

    let smali_root = decoded_root.join("smali");
    let mut candidates = Vec::new();
    for entry in WalkDir::new(&smali_root).sort_by_file_name() {
        let entry = entry.map_err(|err| InjectionError::Io {
            path: err
                .path()
                .map_or_else(|| smali_root.clone(), Path::to_path_buf),
            source: err.into(),
        })?;
        if entry.file_type().is_file() && entry.file_name() == target.as_str() {
            candidates.push(entry.into_path());
        }
    }

    let found = candidates
        .iter()
        .find(|path| path.ends_with(&qualified))
        .or_else(|| candidates.first())
        .cloned()
        .ok_or_else(|| InjectionError::SmaliNotFound {
            entry_activity: entry_activity.to_owned(),
        })?;

    info!("Found at {}", found.display());
    Ok(found)
}
