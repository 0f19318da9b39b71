//! Platform services for locating the Python runtime
//!
//! The environment builder never asks the process-wide environment where Python
//! lives. Everything it needs is behind [`PlatformServices`], so tests can run
//! the whole pipeline against a fake interpreter layout.

use crate::error::{PackError, PackResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The two launcher/layout families gempack supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFamily {
    /// Linux, macOS and friends: `venv/bin`, `.sh` launchers
    Unix,
    /// Windows: `venv/Scripts`, `.bat` launchers, `.exe` artifacts
    Windows,
}

impl TargetFamily {
    /// Family of the machine running the pack
    pub fn current() -> Self {
        if cfg!(windows) {
            TargetFamily::Windows
        } else {
            TargetFamily::Unix
        }
    }

    /// Script launcher extension for this family
    pub fn script_extension(&self) -> &'static str {
        match self {
            TargetFamily::Unix => ".sh",
            TargetFamily::Windows => ".bat",
        }
    }

    /// Executable extension for this family (empty on Unix)
    pub fn exe_extension(&self) -> &'static str {
        match self {
            TargetFamily::Unix => "",
            TargetFamily::Windows => ".exe",
        }
    }
}

/// Everything the pipeline needs to know about the build machine's Python
pub trait PlatformServices {
    /// Absolute path of the interpreter binary being bundled
    fn runtime_executable(&self) -> &Path;

    /// Absolute path of the interpreter's standard-library directory
    fn stdlib_path(&self) -> &Path;

    /// Version tag of the runtime, e.g. `python3.11`
    fn runtime_version(&self) -> &str;

    /// Target family the bundle is being produced for
    fn target_family(&self) -> TargetFamily;

    /// Windows installation base (holds the DLLs to vendor); `None` on Unix
    fn install_base(&self) -> Option<&Path> {
        None
    }

    /// Path of the Tk shared library to resolve when `include_tk` is set
    fn toolkit_library(&self) -> Option<PathBuf> {
        match self.target_family() {
            TargetFamily::Unix => Some(PathBuf::from("/usr/lib/libtk8.6.so")),
            TargetFamily::Windows => None,
        }
    }
}

/// Platform services backed by a real interpreter on the build machine
#[derive(Debug, Clone)]
pub struct HostPython {
    executable: PathBuf,
    stdlib: PathBuf,
    version: String,
    install_base: Option<PathBuf>,
    family: TargetFamily,
}

/// One-shot interrogation script; prints one answer per line.
const PROBE: &str = "import sys, sysconfig\n\
print(sys.executable)\n\
print('python%d.%d' % sys.version_info[:2])\n\
print(sysconfig.get_path('stdlib'))\n\
print(sysconfig.get_config_var('installed_base'))\n";

impl HostPython {
    /// Interrogate the given interpreter for its layout.
    ///
    /// Any failure here is fatal: without a working interpreter there is
    /// nothing to bundle.
    pub fn discover(python: impl AsRef<Path>) -> PackResult<Self> {
        let python = python.as_ref();
        let output = Command::new(python)
            .args(["-c", PROBE])
            .output()
            .map_err(|e| {
                PackError::Config(format!(
                    "Unable to run Python interpreter '{}': {}",
                    python.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(PackError::ExternalTool {
                tool: "python".into(),
                code: output.status.code().unwrap_or(-1),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let mut next = |what: &str| -> PackResult<String> {
            lines
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .ok_or_else(|| {
                    PackError::Config(format!("Interpreter probe did not report its {}", what))
                })
        };

        let executable = PathBuf::from(next("executable path")?);
        let version = next("version")?;
        let stdlib = PathBuf::from(next("stdlib path")?);
        let base = next("installation base")?;

        let family = TargetFamily::current();
        tracing::debug!(
            "Discovered {} at {} (stdlib {})",
            version,
            executable.display(),
            stdlib.display()
        );

        Ok(Self {
            executable,
            stdlib,
            version,
            install_base: match family {
                TargetFamily::Windows => Some(PathBuf::from(base)),
                TargetFamily::Unix => None,
            },
            family,
        })
    }
}

impl PlatformServices for HostPython {
    fn runtime_executable(&self) -> &Path {
        &self.executable
    }

    fn stdlib_path(&self) -> &Path {
        &self.stdlib
    }

    fn runtime_version(&self) -> &str {
        &self.version
    }

    fn target_family(&self) -> TargetFamily {
        self.family
    }

    fn install_base(&self) -> Option<&Path> {
        self.install_base.as_deref()
    }
}

/// Directory layout of the bundled virtual environment
#[derive(Debug, Clone)]
pub struct VenvLayout {
    /// `dist/<name>-<version>`
    pub output_dir: PathBuf,
    /// `<output_dir>/venv`
    pub venv_dir: PathBuf,
    /// `venv/bin` or `venv/Scripts`
    pub bin_dir: PathBuf,
    /// `venv/lib/pythonX.Y` or `venv/Lib`
    pub lib_dir: PathBuf,
    /// `<lib_dir>/site-packages`
    pub site_packages: PathBuf,
    family: TargetFamily,
}

impl VenvLayout {
    /// Compute the layout for an output directory, family and version tag
    pub fn new(output_dir: impl Into<PathBuf>, family: TargetFamily, version: &str) -> Self {
        let output_dir = output_dir.into();
        let venv_dir = output_dir.join("venv");
        let (bin_dir, lib_dir) = match family {
            TargetFamily::Unix => (venv_dir.join("bin"), venv_dir.join("lib").join(version)),
            TargetFamily::Windows => (venv_dir.join("Scripts"), venv_dir.join("Lib")),
        };
        let site_packages = lib_dir.join("site-packages");
        Self {
            output_dir,
            venv_dir,
            bin_dir,
            lib_dir,
            site_packages,
            family,
        }
    }

    /// Path of the bundled interpreter binary
    pub fn python_exe(&self) -> PathBuf {
        match self.family {
            TargetFamily::Unix => self.bin_dir.join("python"),
            TargetFamily::Windows => self.bin_dir.join("python.exe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_layout_uses_versioned_lib_dir() {
        let layout = VenvLayout::new("dist/app-1.0", TargetFamily::Unix, "python3.11");
        assert_eq!(layout.bin_dir, PathBuf::from("dist/app-1.0/venv/bin"));
        assert_eq!(
            layout.lib_dir,
            PathBuf::from("dist/app-1.0/venv/lib/python3.11")
        );
        assert_eq!(
            layout.site_packages,
            PathBuf::from("dist/app-1.0/venv/lib/python3.11/site-packages")
        );
        assert_eq!(layout.python_exe(), PathBuf::from("dist/app-1.0/venv/bin/python"));
    }

    #[test]
    fn windows_layout_uses_scripts_and_lib() {
        let layout = VenvLayout::new("dist/app-1.0", TargetFamily::Windows, "python3.11");
        assert_eq!(layout.bin_dir, PathBuf::from("dist/app-1.0/venv/Scripts"));
        assert_eq!(layout.lib_dir, PathBuf::from("dist/app-1.0/venv/Lib"));
        assert!(layout.python_exe().ends_with("python.exe"));
    }
}
