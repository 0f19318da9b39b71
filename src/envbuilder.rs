//! Isolated runtime environment construction
//!
//! Builds the `venv/` subtree of a bundle: a physically copied virtual
//! environment with the project wheels installed, the interpreter binary and
//! its shared libraries vendored, a curated standard library, and sources
//! compacted to bytecode where a cache exists. Every step is fatal on failure;
//! a failed build leaves the bundle unusable and the whole sequence must be
//! retried.

use crate::config::{PackSpec, StdlibFilter};
use crate::error::{PackError, PackResult};
use crate::libres::{InstallTreeResolver, LddResolver, LibraryResolver, ResolvedLibrary};
use crate::platform::{PlatformServices, TargetFamily, VenvLayout};
use crate::process::{run_checked, stream_command};
use crate::template::{self, Replacements, LICENSE_FILE_NAME, LICENSE_TEXT};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Subtree of the stdlib whose cache-path resolution must not be disturbed
const STDLIB_CACHE_BLOCK: &[&str] = &["encodings"];

/// Builds the bundled virtual environment for one pack run
pub struct EnvBuilder<'a> {
    spec: &'a PackSpec,
    platform: &'a dyn PlatformServices,
    layout: VenvLayout,
    resolver: Box<dyn LibraryResolver>,
}

impl<'a> EnvBuilder<'a> {
    /// Create a builder with the family-appropriate library resolver
    pub fn new(spec: &'a PackSpec, platform: &'a dyn PlatformServices, layout: VenvLayout) -> Self {
        let resolver: Box<dyn LibraryResolver> = match platform.target_family() {
            TargetFamily::Unix => Box::new(LddResolver),
            TargetFamily::Windows => Box::new(InstallTreeResolver::new(
                platform.install_base().unwrap_or_else(|| Path::new(".")),
            )),
        };
        Self {
            spec,
            platform,
            layout,
            resolver,
        }
    }

    /// Replace the library resolver (used by tests)
    pub fn with_resolver(mut self, resolver: Box<dyn LibraryResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run the full environment-construction sequence.
    ///
    /// In dev mode the cleanup steps (identity stripping through bytecode
    /// compaction) are skipped for faster iteration; the resulting bundle is
    /// larger but functional.
    pub fn build(&self) -> PackResult<()> {
        self.reset()?;
        self.create_venv()?;
        self.install_wheels()?;

        if self.spec.dev_mode {
            tracing::info!("Dev mode: skipping environment cleanup");
        } else {
            self.strip_identity()?;
            tracing::info!("Copying required libraries");
            self.vendor_libraries()?;
            tracing::info!("Copying python executable");
            self.vendor_interpreter()?;
            tracing::info!("Copying stdlib");
            self.vendor_stdlib()?;
            tracing::info!("Cleaning environment");
            self.prune_metadata()?;
            self.compact_to_bytecode()?;
        }

        template::render_to_file(
            LICENSE_FILE_NAME,
            LICENSE_TEXT,
            &Replacements::new(),
            &self.layout.output_dir.join(LICENSE_FILE_NAME),
        )?;

        tracing::info!("Success - Virtual Environment");
        Ok(())
    }

    /// Step 1: delete any previous runtime directory
    fn reset(&self) -> PackResult<()> {
        if self.layout.venv_dir.exists() {
            fs::remove_dir_all(&self.layout.venv_dir)?;
        }
        fs::create_dir_all(&self.layout.output_dir)?;
        Ok(())
    }

    /// Step 2: create the virtual environment with physically copied files
    fn create_venv(&self) -> PackResult<()> {
        tracing::info!("Calling venv");
        let mut cmd = std::process::Command::new(self.platform.runtime_executable());
        cmd.args(["-m", "venv"])
            .arg(&self.layout.venv_dir)
            .arg("--copies");
        run_checked("venv", cmd)
    }

    /// Step 3: install the pinned wheels, forcing reinstallation
    fn install_wheels(&self) -> PackResult<()> {
        tracing::info!("Installing wheels");
        let mut cmd = std::process::Command::new(self.layout.python_exe());
        cmd.args([
            "-m",
            "pip",
            "install",
            "--disable-pip-version-check",
            "--force-reinstall",
        ]);
        for wheel in &self.spec.wheels {
            cmd.arg(wheel);
        }
        let code = stream_command("pip", cmd)?;
        if code != 0 {
            return Err(PackError::ExternalTool {
                tool: "pip".into(),
                code,
            });
        }
        Ok(())
    }

    /// Step 4: remove the environment's self-describing metadata and the
    /// installer/activation machinery. The bundle must not encode build-machine
    /// paths and must not be usable as a development environment.
    fn strip_identity(&self) -> PackResult<()> {
        let cfg = self.layout.venv_dir.join("pyvenv.cfg");
        if cfg.exists() {
            fs::remove_file(cfg)?;
        }

        for pattern in ["*ctivate*", "pip*", "python*"] {
            let full = self.layout.bin_dir.join(pattern);
            let full = full.to_string_lossy().into_owned();
            for path in glob::glob(&full)
                .map_err(|e| PackError::Config(format!("Bad glob '{}': {}", full, e)))?
                .flatten()
            {
                if path.is_file() {
                    fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }

    fn copy_libraries(&self, libs: &[ResolvedLibrary], dest: &Path) -> PackResult<()> {
        fs::create_dir_all(dest)?;
        for lib in libs {
            tracing::debug!("Vendoring {}", lib.name);
            fs::copy(&lib.source, dest.join(&lib.name))?;
        }
        Ok(())
    }

    /// Step 5: vendor the shared libraries the runtime binary loads, plus the
    /// Tcl/Tk native libraries and script trees when requested
    fn vendor_libraries(&self) -> PackResult<()> {
        match self.platform.target_family() {
            TargetFamily::Unix => {
                let libs = self.resolver.resolve(self.platform.runtime_executable())?;
                self.copy_libraries(&libs, &self.layout.bin_dir)?;

                if self.spec.include_tk {
                    if let Some(tk) = self.platform.toolkit_library() {
                        let libs = self.resolver.resolve(&tk)?;
                        self.copy_libraries(&libs, &self.layout.bin_dir)?;
                        self.vendor_toolkit_unix(&tk)?;
                    }
                }
            }
            TargetFamily::Windows => {
                // No introspection on Windows: everything the installation
                // ships is vendored into the private lib dir
                let libs = self.resolver.resolve(self.platform.runtime_executable())?;
                self.copy_libraries(&libs, &self.layout.lib_dir)?;

                if self.spec.include_tk {
                    if let Some(base) = self.platform.install_base() {
                        let tcl = base.join("tcl");
                        copy_tree(&tcl.join("tcl8.6"), &self.layout.lib_dir.join("tcl8.6"))?;
                        copy_tree(&tcl.join("tk8.6"), &self.layout.lib_dir.join("tk8.6"))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy the Tcl/Tk shared objects and their script trees next to the
    /// interpreter so the launchers can point TCL_LIBRARY/TK_LIBRARY at them
    fn vendor_toolkit_unix(&self, tk: &Path) -> PackResult<()> {
        let lib_root = tk.parent().unwrap_or_else(|| Path::new("/usr/lib"));
        let tcl = lib_root.join("libtcl8.6.so");

        fs::copy(tk, self.layout.bin_dir.join("libtk8.6.so"))?;
        fs::copy(&tcl, self.layout.bin_dir.join("libtcl8.6.so"))?;

        let venv_lib = self.layout.venv_dir.join("lib");
        copy_tree(&lib_root.join("tk8.6"), &venv_lib.join("tk8.6"))?;
        copy_tree(&lib_root.join("tcl8.6"), &venv_lib.join("tcl8.6"))?;
        Ok(())
    }

    /// Step 6: copy the interpreter binary into the bundle and mark it
    /// executable
    fn vendor_interpreter(&self) -> PackResult<()> {
        let source = match self.platform.target_family() {
            TargetFamily::Unix => self.platform.runtime_executable().to_path_buf(),
            TargetFamily::Windows => self
                .platform
                .install_base()
                .map(|b| b.join("python.exe"))
                .unwrap_or_else(|| self.platform.runtime_executable().to_path_buf()),
        };

        let dest = self.layout.python_exe();
        fs::create_dir_all(&self.layout.bin_dir)?;
        fs::copy(&source, &dest)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&dest)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&dest, perms)?;
        }
        Ok(())
    }

    /// Step 7: copy the standard library, curated by the configured filter
    fn vendor_stdlib(&self) -> PackResult<()> {
        copy_stdlib(
            self.platform.stdlib_path(),
            &self.layout.lib_dir,
            &self.spec.stdlib_filter,
        )
    }

    /// Step 8: delete installed-package metadata directories
    fn prune_metadata(&self) -> PackResult<()> {
        if !self.layout.site_packages.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.layout.site_packages)? {
            let entry = entry?;
            let path = entry.path();
            let is_dist_info = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".dist-info"))
                .unwrap_or(false);
            if is_dist_info && path.is_dir() {
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    /// Step 9: best-effort bytecode compaction.
    ///
    /// For each source file with a precompiled cache artifact, the source is
    /// deleted and the cache promoted into its place. A file without a cache
    /// artifact is left untouched; this step optimizes size and startup, it is
    /// never a correctness requirement.
    fn compact_to_bytecode(&self) -> PackResult<()> {
        compact_tree(&self.layout.site_packages, &self.spec.cache_block)?;

        let mut stdlib_block: Vec<String> = self.spec.cache_block.clone();
        stdlib_block.extend(STDLIB_CACHE_BLOCK.iter().map(|s| s.to_string()));
        compact_tree(&self.layout.lib_dir, &stdlib_block)?;
        Ok(())
    }
}

/// Recursively copy a directory tree. Missing sources are skipped silently
/// (the Tk script trees are optional installs).
fn copy_tree(src: &Path, dst: &Path) -> PackResult<()> {
    if !src.is_dir() {
        tracing::debug!("Skipping missing tree {}", src.display());
        return Ok(());
    }
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let dest = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&path, &dest)?;
        } else if entry.file_type()?.is_file() {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

/// Copy the stdlib tree applying the curation filter.
///
/// Allow-lists select top-level entries (a kept package is copied whole);
/// block-list patterns are applied to every path component, matching the
/// `ignore_patterns` behavior of a plain tree copy.
pub(crate) fn copy_stdlib(src: &Path, dst: &Path, filter: &StdlibFilter) -> PackResult<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if !filter.keeps(&name_str) {
            continue;
        }
        let path = entry.path();
        let dest = dst.join(&name);
        if entry.file_type()?.is_dir() {
            match filter {
                // Below the top level only block patterns keep filtering
                StdlibFilter::Block(_) => copy_stdlib(&path, &dest, filter)?,
                _ => copy_tree(&path, &dest)?,
            }
        } else if entry.file_type()?.is_file() {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

/// Promote the cache artifact of one source file, if it exists
fn promote_cache(py_file: &Path) -> PackResult<()> {
    let Some(dir) = py_file.parent() else {
        return Ok(());
    };
    let Some(stem) = py_file.file_stem().and_then(|s| s.to_str()) else {
        return Ok(());
    };

    let cache_dir = dir.join("__pycache__");
    if !cache_dir.is_dir() {
        return Ok(());
    }

    let prefix = format!("{}.", stem);
    let cached = fs::read_dir(&cache_dir)?.flatten().find(|e| {
        e.file_name()
            .to_str()
            .map(|n| n.starts_with(&prefix) && n.ends_with(".pyc"))
            .unwrap_or(false)
    });

    let Some(cached) = cached else {
        // No cache artifact was produced for this file; leave the source
        return Ok(());
    };

    fs::remove_file(py_file)?;
    fs::rename(cached.path(), dir.join(format!("{}.pyc", stem)))?;
    Ok(())
}

/// Compact every source file below `root` (at least one directory deep),
/// skipping paths containing a block pattern
pub(crate) fn compact_tree(root: &Path, block: &[String]) -> PackResult<()> {
    if !root.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(root).min_depth(2) {
        let entry = entry.map_err(|e| {
            PackError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk error")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let path_str = path.to_string_lossy();
        if block.iter().any(|b| path_str.contains(b.as_str())) {
            continue;
        }
        promote_cache(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_cache_replaces_source_with_bytecode() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        let cache = pkg.join("__pycache__");
        fs::create_dir_all(&cache).unwrap();
        fs::write(pkg.join("mod.py"), "x = 1\n").unwrap();
        fs::write(cache.join("mod.cpython-311.pyc"), b"\x00").unwrap();

        promote_cache(&pkg.join("mod.py")).unwrap();
        assert!(!pkg.join("mod.py").exists());
        assert!(pkg.join("mod.pyc").exists());
        assert!(!cache.join("mod.cpython-311.pyc").exists());
    }

    #[test]
    fn promote_cache_without_artifact_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("mod.py"), "x = 1\n").unwrap();

        promote_cache(&pkg.join("mod.py")).unwrap();
        assert!(pkg.join("mod.py").exists());
    }

    #[test]
    fn compact_skips_blocked_and_top_level_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        // Top-level module: must stay a source file
        fs::write(root.join("top.py"), "x = 1\n").unwrap();

        // Nested module with a cache: compacted
        let a = root.join("a");
        fs::create_dir_all(a.join("__pycache__")).unwrap();
        fs::write(a.join("m.py"), "x = 1\n").unwrap();
        fs::write(a.join("__pycache__").join("m.cpython-311.pyc"), b"\x00").unwrap();

        // Blocked package: untouched even though a cache exists
        let b = root.join("keepsrc");
        fs::create_dir_all(b.join("__pycache__")).unwrap();
        fs::write(b.join("m.py"), "x = 1\n").unwrap();
        fs::write(b.join("__pycache__").join("m.cpython-311.pyc"), b"\x00").unwrap();

        compact_tree(root, &["keepsrc".to_string()]).unwrap();

        assert!(root.join("top.py").exists());
        assert!(!a.join("m.py").exists());
        assert!(a.join("m.pyc").exists());
        assert!(b.join("m.py").exists());
        assert!(!b.join("m.pyc").exists());
    }

    #[test]
    fn stdlib_copy_applies_block_patterns_at_depth() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("stdlib");
        fs::create_dir_all(src.join("json")).unwrap();
        fs::create_dir_all(src.join("test")).unwrap();
        fs::write(src.join("os.py"), "").unwrap();
        fs::write(src.join("json").join("decoder.py"), "").unwrap();
        fs::write(src.join("json").join("decoder.pyo"), "").unwrap();
        fs::write(src.join("test").join("t.py"), "").unwrap();

        let dst = dir.path().join("out");
        let filter = StdlibFilter::Block(vec!["test".into(), "*.pyo".into()]);
        copy_stdlib(&src, &dst, &filter).unwrap();

        assert!(dst.join("os.py").exists());
        assert!(dst.join("json").join("decoder.py").exists());
        assert!(!dst.join("json").join("decoder.pyo").exists());
        assert!(!dst.join("test").exists());
    }

    #[test]
    fn stdlib_copy_allow_list_selects_top_level_entries() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("stdlib");
        fs::create_dir_all(src.join("json")).unwrap();
        fs::create_dir_all(src.join("tkinter")).unwrap();
        fs::write(src.join("json").join("decoder.py"), "").unwrap();
        fs::write(src.join("tkinter").join("x.py"), "").unwrap();
        fs::write(src.join("os.py"), "").unwrap();

        let dst = dir.path().join("out");
        let filter = StdlibFilter::Allow(vec!["json".into(), "os.py".into()]);
        copy_stdlib(&src, &dst, &filter).unwrap();

        assert!(dst.join("json").join("decoder.py").exists());
        assert!(dst.join("os.py").exists());
        assert!(!dst.join("tkinter").exists());
    }
}
