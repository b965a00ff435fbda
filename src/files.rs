use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use linescope_core::{edit_lines, Tweak};
use tracing::{debug, info};

use crate::Error;

/// Split `text` into lines, without their terminators.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(|l| l.to_string()).collect()
}

/// Join `lines` with `\n`, terminating a non-empty result with a newline.
pub fn join_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

/// Decode file content, rejecting binary and non-UTF-8 data.
pub fn decode(path: &Path, bytes: Vec<u8>) -> Result<String, Error> {
    if bytes.contains(&0) {
        return Err(Error::Binary {
            path: path.to_path_buf(),
        });
    }
    String::from_utf8(bytes).map_err(|_| Error::NotUtf8 {
        path: path.to_path_buf(),
    })
}

pub fn read_lines(path: &Path) -> Result<Vec<String>, Error> {
    let bytes = fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(split_lines(&decode(path, bytes)?))
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), Error> {
    write_atomic(path, &join_lines(lines)).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `tweaks` to the file at `path` and write the result back.
///
/// Nothing is written when reading or any tweak fails.
pub fn apply_to_file(path: &Path, tweaks: &[&dyn Tweak]) -> Result<Vec<String>, Error> {
    let mut lines = read_lines(path)?;
    debug!(path = %path.display(), lines = lines.len(), "loaded file");
    edit_lines(&mut lines, tweaks)?;
    write_lines(path, &lines)?;
    info!(path = %path.display(), "file edited");
    Ok(lines)
}

/// Replace `path` with `content` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    write_atomic_with(path, |f| f.write_all(content.as_bytes()))
}

/// The temporary file is removed whenever `fill` or any later step fails.
fn write_atomic_with(path: &Path, fill: impl FnOnce(&mut fs::File) -> io::Result<()>) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());

    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let pid = process::id();
    let mut attempt: u64 = 0;
    let tmp_path: PathBuf = loop {
        let candidate = dir.join(format!(".{file_name}.linescope.tmp.{pid}.{attempt}"));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut f) => {
                if let Err(e) = fill(&mut f).and_then(|()| f.sync_all()) {
                    drop(f);
                    let _ = fs::remove_file(&candidate);
                    return Err(e);
                }
                if let Some(p) = perms.clone() {
                    let _ = fs::set_permissions(&candidate, p);
                }
                break candidate;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    };

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
