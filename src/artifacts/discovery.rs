// src/artifacts/discovery.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::fs::FileSystem;

/// Identifies an output file by name prefix and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSelector {
    pub prefix: &'static str,
    pub extension: &'static str,
}

impl FileSelector {
    pub const fn new(prefix: &'static str, extension: &'static str) -> Self {
        Self { prefix, extension }
    }

    /// Glob over bare file names: `<prefix>*<extension>`.
    pub fn matcher(&self) -> Result<GlobMatcher> {
        let glob = Glob::new(&format!("{}*{}", self.prefix, self.extension))
            .with_context(|| format!("building glob for selector {self}"))?;
        Ok(glob.compile_matcher())
    }
}

impl fmt::Display for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.prefix, self.extension)
    }
}

/// Most recently modified file in `dir` whose name matches `selector`.
pub fn latest_matching(
    fs: &dyn FileSystem,
    dir: &Path,
    selector: &FileSelector,
) -> Result<Option<PathBuf>> {
    let matcher = selector.matcher()?;
    let mut best: Option<(SystemTime, PathBuf)> = None;

    for path in fs.read_dir(dir)? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !matcher.is_match(name) || !fs.is_file(&path) {
            continue;
        }
        let modified = fs.modified(&path)?;
        // Ties keep the later name so the choice is deterministic.
        let newer = match &best {
            None => true,
            Some((t, p)) => modified > *t || (modified == *t && path > *p),
        };
        if newer {
            best = Some((modified, path));
        }
    }

    debug!(dir = ?dir, %selector, found = ?best.as_ref().map(|(_, p)| p), "artifact discovery");
    Ok(best.map(|(_, p)| p))
}
