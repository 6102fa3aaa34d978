//! Batch input: scoped workspace, staging and discovery.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use glob::{glob_with, MatchOptions};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::Document;
use crate::error::InputError;

/// File extensions treated as documents (matched case-insensitively).
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// Temporary directory holding the staged input and the output tree of one
/// batch. Removed when dropped, whichever way the batch ends.
pub struct Workspace {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Workspace {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("ocren-").tempdir()?;
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input)?;
        fs::create_dir_all(&output)?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir, input, output })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_dir(&self) -> &Path {
        &self.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }
}

/// Whether `path` has one of the [`DOCUMENT_EXTENSIONS`].
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.iter().any(|d| ext.eq_ignore_ascii_case(d)))
}

/// Copy the documents of `source` into `staging`, preserving relative paths.
///
/// `source` is either a directory tree or a `.zip` archive.
pub fn stage_input(source: &Path, staging: &Path) -> Result<usize, InputError> {
    if !source.exists() {
        return Err(InputError::NotFound(source.to_path_buf()));
    }

    let staged = if source.is_dir() {
        copy_tree(source, staging)?
    } else if source
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
    {
        extract_zip(source, staging)?
    } else {
        return Err(InputError::Unsupported(source.to_path_buf()));
    };

    info!("Staged {} documents from {}", staged, source.display());
    Ok(staged)
}

fn copy_tree(source: &Path, staging: &Path) -> Result<usize, InputError> {
    check_names(source, source)?;
    let documents = discover(source)?;
    for document in &documents {
        let dest = staging.join(&document.relative);
        let copy = || -> io::Result<()> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&document.path, &dest)?;
            Ok(())
        };
        copy().map_err(|source| InputError::Staging {
            path: document.path.clone(),
            source,
        })?;
    }
    Ok(documents.len())
}

/// Reject documents under `dir` whose relative path is not valid UTF-8.
/// Glob matching skips such files.
fn check_names(root: &Path, dir: &Path) -> Result<(), InputError> {
    let staging_error = |source: io::Error| InputError::Staging {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(staging_error)? {
        let entry = entry.map_err(staging_error)?;
        let path = entry.path();
        if entry.file_type().map_err(staging_error)?.is_dir() {
            check_names(root, &path)?;
        } else if is_document(&path) && relative_key(root, &path).is_none() {
            return Err(InputError::NonUtf8Name(path));
        }
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, staging: &Path) -> Result<usize, InputError> {
    let archive_error = |reason: String| InputError::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| archive_error(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;

    let mut staged = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_error(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }

        // Entries such as "../../etc/passwd" are rejected here
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe archive entry: {}", entry.name());
            continue;
        };
        if !is_document(&relative) {
            continue;
        }

        let dest = staging.join(&relative);
        let mut write = || -> io::Result<()> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out)?;
            Ok(())
        };
        write().map_err(|e| archive_error(format!("{}: {}", relative.display(), e)))?;
        staged += 1;
    }
    Ok(staged)
}

/// Find the documents under `root`, sorted by relative path.
pub fn discover(root: &Path) -> Result<Vec<Document>, InputError> {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let base = glob::Pattern::escape(&root.to_string_lossy());

    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    for ext in DOCUMENT_EXTENSIONS {
        let pattern = format!("{}/**/*.{}", base, ext);
        for entry in glob_with(&pattern, options)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(relative) = relative_key(root, &path) else {
                return Err(InputError::NonUtf8Name(path));
            };
            match found.entry(relative) {
                Entry::Vacant(slot) => {
                    slot.insert(path);
                }
                Entry::Occupied(kept) => {
                    warn!("Skipping {}, same name as {}", path.display(), kept.get().display());
                }
            }
        }
    }

    debug!("Discovered {} documents under {}", found.len(), root.display());
    Ok(found
        .into_iter()
        .enumerate()
        .map(|(index, (relative, path))| Document::new(index, relative, path))
        .collect())
}

/// `/`-separated path of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str().map(str::to_string),
            _ => None,
        })
        .collect::<Option<_>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}
