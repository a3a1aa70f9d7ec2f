// Local file handling: resolving a candidate path into something that can be
// streamed to storage, and expanding the user's glob patterns into paths.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::Body;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::error::StepError;

/// A regular file opened for upload. The read handle is consumed by
/// `into_body`, so the content can only be streamed once.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
    handle: File,
}

impl LocalFile {
    /// Open `path` and record its size. Directories, sockets and other
    /// non-regular entries are rejected.
    pub async fn resolve(path: &Path) -> Result<Self, StepError> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StepError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(StepError::NotAFile(path.to_path_buf()));
        }

        let handle = File::open(path).await?;
        // Size is taken from the handle we will actually stream from.
        let size = handle.metadata().await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StepError::NotAFile(path.to_path_buf()))?;

        Ok(LocalFile {
            path: path.to_path_buf(),
            name,
            size,
            handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name sent to the LMS, without any directory part.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Turn the open handle into a streaming request body.
    pub fn into_body(self) -> Body {
        Body::wrap_stream(ReaderStream::new(self.handle))
    }
}

/// Expand glob patterns into an ordered, de-duplicated list of paths.
///
/// Matches of a single pattern come back sorted; patterns are expanded in the
/// order given. An existing path is taken literally even if its name contains
/// glob metacharacters. A path without metacharacters is passed through even
/// if it does not exist, so the resolver can report it precisely.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        let mut matched = 0usize;
        if is_literal(pattern) || Path::new(pattern).exists() {
            matched += 1;
            let path = PathBuf::from(pattern);
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        } else {
            let entries =
                glob::glob(pattern).with_context(|| format!("Invalid file pattern {pattern}"))?;
            for entry in entries {
                let path = entry.with_context(|| format!("Failed to read a match of {pattern}"))?;
                matched += 1;
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
        if matched == 0 {
            bail!("Pattern {pattern} matched no files");
        }
    }

    tracing::debug!(count = paths.len(), "expanded file patterns");
    Ok(paths)
}

fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '['])
}
