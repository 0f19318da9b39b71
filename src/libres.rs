//! Shared-library dependency resolution
//!
//! The bundle must run on machines that do not have the interpreter's shared
//! libraries installed (or have incompatible versions), so every resolved
//! library is vendored next to the bundled binary.
//!
//! On Unix the dynamic linker is interrogated through `ldd`; on Windows no
//! introspection tool exists, so the interpreter installation's library
//! directories are enumerated directly.

use crate::error::{PackError, PackResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One shared-library dependency: basename plus its absolute source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    /// Library file name, e.g. `libssl.so.3`
    pub name: String,
    /// Absolute path the library is copied from
    pub source: PathBuf,
}

/// Discovery of a binary's shared-library dependencies, one implementation
/// per target family
pub trait LibraryResolver {
    /// Resolve the libraries required by `binary`
    fn resolve(&self, binary: &Path) -> PackResult<Vec<ResolvedLibrary>>;
}

/// Unix resolver backed by `ldd`
pub struct LddResolver;

impl LibraryResolver for LddResolver {
    fn resolve(&self, binary: &Path) -> PackResult<Vec<ResolvedLibrary>> {
        let output = Command::new("ldd").arg(binary).output().map_err(|e| {
            PackError::LibraryResolution(format!("Unable to run ldd: {}", e))
        })?;

        if !output.status.success() {
            return Err(PackError::LibraryResolution(format!(
                "ldd failed for {} with exit code {}",
                binary.display(),
                output.status.code().unwrap_or(-1)
            )));
        }

        let libs = parse_ldd_output(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!("{}: {} shared libraries", binary.display(), libs.len());
        Ok(libs)
    }
}

/// Parse `ldd` output into resolved libraries.
///
/// Lines have the form `soname => /abs/path (0xADDRESS)`. Virtual entries
/// (vDSO), the dynamic linker itself, and unresolved (`not found`) sonames
/// have no `=> path (addr)` shape and are skipped.
pub fn parse_ldd_output(text: &str) -> Vec<ResolvedLibrary> {
    let mut libs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let Some((_, rhs)) = line.split_once(" => ") else {
            continue;
        };
        let Some((path, addr)) = rhs.rsplit_once(" (") else {
            continue;
        };
        if !addr.starts_with("0x") || !addr.ends_with(')') {
            continue;
        }
        let path = Path::new(path.trim());
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_absolute() {
            continue;
        }
        libs.push(ResolvedLibrary {
            name: name.to_string(),
            source: path.to_path_buf(),
        });
    }
    libs
}

/// Windows resolver: enumerates `*.dll` from the installation base and
/// `*.dll` + `*.pyd` from its `DLLs/` subdirectory. The probed binary is
/// ignored; everything the interpreter ships is vendored.
pub struct InstallTreeResolver {
    base: PathBuf,
}

impl InstallTreeResolver {
    /// Resolver rooted at the interpreter installation base
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn collect(dir: &Path, extensions: &[&str], out: &mut Vec<ResolvedLibrary>) -> PackResult<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                out.push(ResolvedLibrary {
                    name: name.to_string(),
                    source: path.clone(),
                });
            }
        }
        Ok(())
    }
}

impl LibraryResolver for InstallTreeResolver {
    fn resolve(&self, _binary: &Path) -> PackResult<Vec<ResolvedLibrary>> {
        let mut libs = Vec::new();
        Self::collect(&self.base, &["dll"], &mut libs)?;
        Self::collect(&self.base.join("DLLs"), &["dll", "pyd"], &mut libs)?;
        Ok(libs)
    }
}
