//! Manifest loading (`gempack.toml`)
//!
//! The manifest is the declarative surface of the packer. Loading produces a
//! fully validated [`PackSpec`]; every invariant (mode spelling, stdlib
//! allow/block exclusivity, unique launcher names, wheel resolution) is
//! checked here, before any filesystem mutation.
//!
//! ```toml
//! [package]
//! name = "example"
//! version = "1.0.0"
//!
//! [pack]
//! mode = "script"
//! wheels = ["dist/example-1.0.0-*.whl"]
//! stdlib-block = ["test*", "turtledemo"]
//! cache-block = ["examplePackage"]
//!
//! [[pack.scripts]]
//! name = "myScript"
//! module = "examplePackage.myScript"
//! entry = "main"
//!
//! [[pack.data]]
//! glob = "assets/*.json"
//! dest = "assets"
//! ```

use crate::config::{EntryPoint, PackMode, PackSpec, StdlibFilter};
use crate::error::{PackError, PackResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed `gempack.toml` file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// `[package]` table
    pub package: PackageTable,

    /// `[pack]` table
    #[serde(default)]
    pub pack: PackTable,
}

/// `[package]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageTable {
    /// Project name
    pub name: String,
    /// Project version
    pub version: String,
}

/// `[pack]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PackTable {
    /// `"script"` or `"app"`; defaults to `"script"`
    #[serde(default)]
    pub mode: Option<String>,

    /// Wheel path globs, each of which must match exactly one file
    #[serde(default)]
    pub wheels: Vec<String>,

    /// Console entry points
    #[serde(default)]
    pub scripts: Vec<ScriptEntry>,

    /// GUI entry points
    #[serde(default)]
    pub gui_scripts: Vec<ScriptEntry>,

    /// Stdlib allow-list (mutually exclusive with `stdlib-block`)
    #[serde(default)]
    pub stdlib_allow: Option<Vec<String>>,

    /// Stdlib block-list (mutually exclusive with `stdlib-allow`)
    #[serde(default)]
    pub stdlib_block: Option<Vec<String>>,

    /// Patterns exempted from bytecode compaction
    #[serde(default)]
    pub cache_block: Vec<String>,

    /// Vendor Tcl/Tk
    #[serde(default)]
    pub include_tk: bool,

    /// Data globs
    #[serde(default)]
    pub data: Vec<DataEntry>,

    /// Enable debug logging in native launchers
    #[serde(default)]
    pub debug_logs: bool,

    /// Skip environment cleanup
    #[serde(default)]
    pub dev_mode: bool,

    /// Scratch directory for native builds
    #[serde(default)]
    pub build_dir: Option<PathBuf>,
}

/// One `[[pack.scripts]]` / `[[pack.gui-scripts]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptEntry {
    /// Output launcher name
    pub name: String,
    /// Dotted module path
    pub module: String,
    /// Optional zero-argument callable
    #[serde(default)]
    pub entry: Option<String>,
    /// Optional icon path (native mode)
    #[serde(default)]
    pub icon: Option<PathBuf>,
}

impl From<ScriptEntry> for EntryPoint {
    fn from(s: ScriptEntry) -> Self {
        EntryPoint {
            name: s.name,
            module: s.module,
            entry: s.entry,
            icon: s.icon,
        }
    }
}

/// One `[[pack.data]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataEntry {
    /// Glob pattern, resolved relative to the manifest directory
    pub glob: String,
    /// Destination subdirectory inside the bundle
    pub dest: String,
}

impl Manifest {
    /// Parse manifest text
    pub fn parse(text: &str) -> PackResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a manifest file
    pub fn load(path: impl AsRef<Path>) -> PackResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Convert into a validated [`PackSpec`]; wheel globs and relative paths
    /// are resolved against `base_dir`
    pub fn into_spec(self, base_dir: &Path) -> PackResult<PackSpec> {
        let mode = match self.pack.mode.as_deref() {
            Some(m) => m.parse::<PackMode>()?,
            None => PackMode::Script,
        };

        let stdlib_filter = match (self.pack.stdlib_allow, self.pack.stdlib_block) {
            (Some(_), Some(_)) => {
                return Err(PackError::Config(
                    "stdlib-allow and stdlib-block cannot both be set".into(),
                ))
            }
            (Some(allow), None) => StdlibFilter::Allow(allow),
            (None, Some(block)) => StdlibFilter::Block(block),
            (None, None) => StdlibFilter::None,
        };

        let mut wheels = Vec::new();
        for pattern in &self.pack.wheels {
            wheels.push(resolve_wheel(base_dir, pattern)?);
        }

        let mut spec = PackSpec::new(self.package.name, self.package.version, mode);
        spec.wheels = wheels;
        spec.scripts = self.pack.scripts.into_iter().map(Into::into).collect();
        spec.gui_scripts = self.pack.gui_scripts.into_iter().map(Into::into).collect();
        spec.stdlib_filter = stdlib_filter;
        spec.cache_block = self.pack.cache_block;
        spec.include_tk = self.pack.include_tk;
        spec.data_globs = self
            .pack
            .data
            .into_iter()
            .map(|d| {
                let glob = if Path::new(&d.glob).is_absolute() {
                    d.glob
                } else {
                    base_dir.join(&d.glob).to_string_lossy().into_owned()
                };
                (glob, d.dest)
            })
            .collect();
        spec.debug_logs = self.pack.debug_logs;
        spec.dev_mode = self.pack.dev_mode;
        if let Some(build_dir) = self.pack.build_dir {
            spec.build_dir = build_dir;
        }

        spec.validate()?;
        Ok(spec)
    }
}

/// Resolve a wheel glob against the filesystem.
///
/// Zero or multiple matches are a build-breaking misconfiguration; there is
/// deliberately no pick-first fallback.
fn resolve_wheel(base_dir: &Path, pattern: &str) -> PackResult<PathBuf> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        base_dir.join(pattern).to_string_lossy().into_owned()
    };

    let mut matches: Vec<PathBuf> = glob::glob(&full)
        .map_err(|e| PackError::Config(format!("Bad wheel glob '{}': {}", pattern, e)))?
        .flatten()
        .filter(|p| p.is_file())
        .collect();

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(PackError::Config(format!(
            "Wheel glob '{}' matched no files",
            pattern
        ))),
        n => Err(PackError::Config(format!(
            "Wheel glob '{}' matched {} files; expected exactly one",
            pattern, n
        ))),
    }
}

/// Load `gempack.toml` from a project directory and produce the spec
pub fn load_spec(project_dir: impl AsRef<Path>) -> PackResult<PackSpec> {
    let project_dir = project_dir.as_ref();
    let manifest = Manifest::load(project_dir.join("gempack.toml"))?;
    manifest.into_spec(project_dir)
}
