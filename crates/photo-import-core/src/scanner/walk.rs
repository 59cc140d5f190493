use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::Error;
use crate::media::MediaKind;

/// Recursive, sorted listing of candidate files under `root`.
///
/// Hidden directories and files (leading `.`) are pruned, symlinks are not
/// followed, and only extensions on the kind's allow-list are returned.
/// Unreadable subdirectories are logged and skipped.
pub fn discover_media(
    root: &Path,
    kind: MediaKind,
    ignore_globs: &[String],
) -> Result<Vec<PathBuf>, Error> {
    match root.metadata() {
        Ok(meta) if !meta.is_dir() => return Err(Error::NotADirectory(root.to_path_buf())),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(root.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    }

    let ignore_patterns = compile_patterns(ignore_globs);

    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || (!is_hidden(entry) && !is_ignored(entry.path(), &ignore_patterns))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.depth() == 0 {
                    return Err(err.into_io_error().map(Error::Io).unwrap_or_else(|| {
                        Error::SourceNotFound(root.to_path_buf())
                    }));
                }
                warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if entry.file_type().is_file() && kind.accepts(entry.path()) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    debug!("Discovered {} {} files under {}", found.len(), kind, root.display());
    Ok(found)
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_ignored(path: &Path, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches_path(path))
}
