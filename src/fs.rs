//! Virtual filesystem consumed by the template engine.
//!
//! Patterns handed to a context are resolved against a [`VirtualFs`]:
//! a pattern without glob metacharacters names a single file, otherwise it is
//! matched against [`VirtualFs::files`] (`*` and `?` never cross a `/`).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use regex::Regex;

/// Read-only filesystem abstraction supplied by the embedding application.
pub trait VirtualFs: Send + Sync {
    /// Open a file by its `/`-separated path relative to the filesystem root.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    /// All file paths, `/`-separated and relative to the root.
    fn files(&self) -> io::Result<Vec<String>>;

    /// Read a file fully.
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

// ============================================================================
// DirFs
// ============================================================================

/// A directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VirtualFs for DirFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        if path.split('/').any(|c| c == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid path `{path}`"),
            ));
        }
        Ok(Box::new(File::open(self.root.join(path))?))
    }

    fn files(&self) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort(true) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let rel: Vec<_> = rel
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            files.push(rel.join("/"));
        }
        files.sort();
        Ok(files)
    }
}

// ============================================================================
// MemoryFs
// ============================================================================

/// In-memory filesystem, mostly useful for tests and embedded templates.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }
}

impl VirtualFs for MemoryFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        match self.files.get(path) {
            Some(content) => Ok(Box::new(content.as_slice())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("open {path}: file does not exist"),
            )),
        }
    }

    fn files(&self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}

// ============================================================================
// Pattern expansion
// ============================================================================

/// Whether `pattern` contains glob metacharacters.
pub fn has_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand a pattern into the matching file paths, sorted.
///
/// A literal pattern is returned as-is; a glob matching nothing is an error.
pub fn glob(fs: &dyn VirtualFs, pattern: &str) -> io::Result<Vec<String>> {
    if !has_meta(pattern) {
        return Ok(vec![pattern.to_string()]);
    }

    let re = glob_to_regex(pattern)?;
    let mut matches: Vec<_> = fs.files()?.into_iter().filter(|p| re.is_match(p)).collect();
    if matches.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("pattern matches no files: `{pattern}`"),
        ));
    }
    matches.sort();
    Ok(matches)
}

/// Translate a glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> io::Result<Regex> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                re.push('[');
                for c in chars.by_ref() {
                    match c {
                        ']' => break,
                        '^' | '!' if re.ends_with('[') => re.push('^'),
                        '\\' => re.push_str("\\\\"),
                        _ => re.push(c),
                    }
                }
                re.push(']');
            }
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// File-name component of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
