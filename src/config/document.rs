//! Strategy document flattening.
//!
//! # Responsibilities
//! - Read a strategies source (single file or directory) into one merged
//!   text document
//! - Resolve `#include <path>` directives recursively in file mode
//! - Concatenate `.yaml` files in lexicographic order in directory mode
//!
//! # Design Decisions
//! - Directory loads are flat and single-level; subdirectories are skipped
//!   and `#include` lines pass through as ordinary YAML comments
//! - An `IncludeSet` scoped to one load deduplicates repeated `#include`
//!   targets: a path already inlined anywhere in the tree is skipped
//!   silently, which also makes circular includes terminate
//! - Any unreadable path, top-level or included, aborts the whole load

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Include directive keyword. Valid only as the first token of a line in a
/// single-file load.
const INCLUDE_KEYWORD: &str = "#include";

/// File extension recognized during a directory load.
const CONFIG_EXTENSION: &str = "yaml";

/// Paths already inlined within one top-level flatten. Discarded when the
/// load completes.
type IncludeSet = HashSet<PathBuf>;

/// Flatten a strategies source into a single merged document.
///
/// `path` may be a regular file (with `#include` resolution) or a directory
/// (lexicographic concatenation of its `.yaml` files, no includes).
pub fn flatten(path: &Path) -> Result<String, ConfigError> {
    let mut doc = String::new();
    let mut include_once = IncludeSet::new();
    // Seeding the set with the top-level path makes an include cycle back
    // to the root a no-op rather than a second copy of the root's content.
    include_once.insert(path.to_path_buf());
    flatten_into(path, &mut doc, &mut include_once)?;
    Ok(doc)
}

fn flatten_into(
    path: &Path,
    doc: &mut String,
    include_once: &mut IncludeSet,
) -> Result<(), ConfigError> {
    let meta = fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if meta.is_dir() {
        flatten_directory(path, doc)
    } else {
        flatten_file(path, doc, include_once)
    }
}

/// Concatenate every `.yaml` file directly under `dir`, sorted by file
/// name. Enumeration order from the filesystem is irrelevant.
fn flatten_directory(dir: &Path, doc: &mut String) -> Result<(), ConfigError> {
    tracing::info!(dir = %dir.display(), "loading strategy files from directory");

    let entries = fs::read_dir(dir).map_err(|source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(CONFIG_EXTENSION) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for file in &files {
        let content = fs::read_to_string(file).map_err(|source| ConfigError::Read {
            path: file.clone(),
            source,
        })?;
        // Includes are not honored in directory mode; every line passes
        // through verbatim, `#include` lines included, as YAML comments.
        for line in content.lines() {
            doc.push_str(line);
            doc.push('\n');
        }
    }
    Ok(())
}

/// Read `file` line by line, inlining `#include` targets at the position
/// of the directive.
fn flatten_file(
    file: &Path,
    doc: &mut String,
    include_once: &mut IncludeSet,
) -> Result<(), ConfigError> {
    let content = fs::read_to_string(file).map_err(|source| ConfigError::Read {
        path: file.to_path_buf(),
        source,
    })?;

    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() == Some(INCLUDE_KEYWORD) {
            let Some(target) = tokens.next() else {
                tracing::error!(
                    file = %file.display(),
                    "ignoring #include directive with no target path"
                );
                continue;
            };
            let target = PathBuf::from(target);
            if include_once.insert(target.clone()) {
                flatten_into(&target, doc, include_once)?;
            } else {
                tracing::debug!(
                    target = %target.display(),
                    "skipping already-included file"
                );
            }
        } else {
            doc.push_str(line);
            doc.push('\n');
        }
    }
    Ok(())
}
