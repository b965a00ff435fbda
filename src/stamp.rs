use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use linescope_core::{hash_tokens, Fingerprint};
use sha2::{Digest, Sha256};

use crate::files::write_atomic;
use crate::Error;

/// Cache key folding several named build inputs into one SHA-256.
///
/// Each input is fed as its name, then its token count, then the
/// length-framed tokens, so inputs cannot bleed into each other.
pub struct CacheKey {
    hasher: Sha256,
}

impl CacheKey {
    pub fn new() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"linescope-cache-key:1");
        Self { hasher }
    }

    pub fn input<'a>(mut self, name: &str, tokens: impl ExactSizeIterator<Item = &'a String>) -> Self {
        let name = name.to_string();
        hash_tokens(&mut self.hasher, [&name]);
        self.hasher.update((tokens.len() as u64).to_le_bytes());
        hash_tokens(&mut self.hasher, tokens);
        self
    }

    pub fn fingerprint(self, fingerprint: &Fingerprint) -> Self {
        self.input("fingerprint", fingerprint.tokens().iter())
    }

    pub fn flag(self, name: &str, value: bool) -> Self {
        let value = value.to_string();
        self.input(name, [&value].into_iter())
    }

    pub fn lines(self, lines: &[String]) -> Self {
        self.input("content", lines.iter())
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

/// File persisting the cache key of the last successful edit of a target.
#[derive(Debug, Clone)]
pub struct Stamp {
    path: PathBuf,
}

impl Stamp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored key, or `None` when no stamp has been written yet.
    pub fn read(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn matches(&self, key: &str) -> Result<bool, Error> {
        Ok(self.read()?.as_deref() == Some(key))
    }

    pub fn write(&self, key: &str) -> Result<(), Error> {
        let io_err = |source| Error::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        write_atomic(&self.path, &format!("{key}\n")).map_err(io_err)
    }
}
