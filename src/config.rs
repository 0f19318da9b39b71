//! Pack configuration types
//!
//! A [`PackSpec`] is the fully validated description of one pack run. It is
//! normally produced by the manifest loader (see [`crate::manifest`]) but can be
//! built directly for programmatic use. All invariants are enforced at
//! construction time, before the packer touches the filesystem.

use crate::error::{PackError, PackResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

/// Pack mode determines what kind of launcher is generated per entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackMode {
    /// Thin `.sh`/`.bat` launcher scripts invoking the bundled interpreter
    Script,
    /// Natively compiled wrapper executables built with CMake
    App,
}

impl FromStr for PackMode {
    type Err = PackError;

    fn from_str(s: &str) -> PackResult<Self> {
        match s {
            "script" => Ok(PackMode::Script),
            "app" => Ok(PackMode::App),
            other => Err(PackError::Config(format!(
                "Invalid pack mode '{}' (expected 'script' or 'app')",
                other
            ))),
        }
    }
}

/// A single user-facing launcher mapped to a Python module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Output launcher name; does not have to match the module name
    pub name: String,

    /// Dotted module path, e.g. `examplePackage.myScript`
    pub module: String,

    /// Optional zero-argument callable inside the module. When set, the
    /// launcher imports it and exits with its return value; when absent the
    /// module is run directly with `-m`.
    #[serde(default)]
    pub entry: Option<String>,

    /// Optional icon, used by the native launcher build only
    #[serde(default)]
    pub icon: Option<PathBuf>,
}

impl EntryPoint {
    /// Create an entry point that runs a module directly
    pub fn module(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            entry: None,
            icon: None,
        }
    }

    /// Create an entry point that calls a named callable inside the module
    pub fn callable(
        name: impl Into<String>,
        module: impl Into<String>,
        entry: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            entry: Some(entry.into()),
            icon: None,
        }
    }

    /// Set the icon path
    pub fn with_icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Standard-library curation filter applied while copying the stdlib tree.
///
/// Allow and block lists are mutually exclusive; the enum makes the invalid
/// both-set state unrepresentable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdlibFilter {
    /// Copy everything
    #[default]
    None,
    /// Copy only entries matching one of these filename patterns
    Allow(Vec<String>),
    /// Copy everything except entries matching one of these patterns
    Block(Vec<String>),
}

impl StdlibFilter {
    /// Whether a directory entry with the given file name should be copied
    pub fn keeps(&self, file_name: &str) -> bool {
        match self {
            StdlibFilter::None => true,
            StdlibFilter::Allow(patterns) => patterns.iter().any(|p| matches_name(p, file_name)),
            StdlibFilter::Block(patterns) => !patterns.iter().any(|p| matches_name(p, file_name)),
        }
    }
}

/// Shell-style filename match (`*` and `?` only), applied to a single path
/// component the way `shutil.ignore_patterns` does.
fn matches_name(pattern: &str, name: &str) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(p) => p.matches(name),
        // An unparseable pattern degrades to a literal comparison
        Err(_) => pattern == name,
    }
}

/// Fully validated description of one pack run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSpec {
    /// Project name, used to derive the output directory
    pub project_name: String,

    /// Project version string
    pub version: String,

    /// Launcher flavor
    pub mode: PackMode,

    /// Wheel files to install into the bundled environment, in order
    #[serde(default)]
    pub wheels: Vec<PathBuf>,

    /// Console entry points
    #[serde(default)]
    pub scripts: Vec<EntryPoint>,

    /// GUI entry points (built without a console window in app mode)
    #[serde(default)]
    pub gui_scripts: Vec<EntryPoint>,

    /// Standard-library curation filter
    #[serde(default)]
    pub stdlib_filter: StdlibFilter,

    /// Patterns exempted from bytecode compaction
    #[serde(default)]
    pub cache_block: Vec<String>,

    /// Vendor the Tcl/Tk native libraries and script trees
    #[serde(default)]
    pub include_tk: bool,

    /// `(glob pattern, destination subdirectory)` pairs copied into the bundle
    #[serde(default)]
    pub data_globs: Vec<(String, String)>,

    /// Enable debug logging in native launchers
    #[serde(default)]
    pub debug_logs: bool,

    /// Skip environment cleanup for faster iteration (larger bundle)
    #[serde(default)]
    pub dev_mode: bool,

    /// Scratch directory for native launcher builds
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

impl PackSpec {
    /// Create a spec with the required fields; everything else defaults
    pub fn new(
        project_name: impl Into<String>,
        version: impl Into<String>,
        mode: PackMode,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            version: version.into(),
            mode,
            wheels: Vec::new(),
            scripts: Vec::new(),
            gui_scripts: Vec::new(),
            stdlib_filter: StdlibFilter::None,
            cache_block: Vec::new(),
            include_tk: false,
            data_globs: Vec::new(),
            debug_logs: false,
            dev_mode: false,
            build_dir: default_build_dir(),
        }
    }

    /// Add a wheel to install
    pub fn with_wheel(mut self, wheel: impl Into<PathBuf>) -> Self {
        self.wheels.push(wheel.into());
        self
    }

    /// Add a console entry point
    pub fn with_script(mut self, script: EntryPoint) -> Self {
        self.scripts.push(script);
        self
    }

    /// Add a GUI entry point
    pub fn with_gui_script(mut self, script: EntryPoint) -> Self {
        self.gui_scripts.push(script);
        self
    }

    /// Set the stdlib curation filter
    pub fn with_stdlib_filter(mut self, filter: StdlibFilter) -> Self {
        self.stdlib_filter = filter;
        self
    }

    /// Add a data glob
    pub fn with_data_glob(mut self, pattern: impl Into<String>, dest: impl Into<String>) -> Self {
        self.data_globs.push((pattern.into(), dest.into()));
        self
    }

    /// Name of the output directory under `dist/`
    pub fn output_name(&self) -> String {
        format!("{}-{}", self.project_name, self.version)
    }

    /// All entry points in generation order (console first, then GUI)
    pub fn entry_points(&self) -> impl Iterator<Item = &EntryPoint> {
        self.scripts.iter().chain(self.gui_scripts.iter())
    }

    /// Check invariants that the type system cannot encode.
    ///
    /// Must succeed before any filesystem mutation.
    pub fn validate(&self) -> PackResult<()> {
        if self.project_name.is_empty() {
            return Err(PackError::Config("Project name cannot be empty".into()));
        }
        if self.version.is_empty() {
            return Err(PackError::Config("Project version cannot be empty".into()));
        }

        let mut seen = HashSet::new();
        for ep in self.entry_points() {
            if ep.name.is_empty() {
                return Err(PackError::Config("Entry point name cannot be empty".into()));
            }
            if !seen.insert(ep.name.as_str()) {
                return Err(PackError::Config(format!(
                    "Duplicate entry point name '{}'",
                    ep.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses() {
        assert_eq!("script".parse::<PackMode>().unwrap(), PackMode::Script);
        assert_eq!("app".parse::<PackMode>().unwrap(), PackMode::App);
        assert!("exe".parse::<PackMode>().is_err());
    }

    #[test]
    fn output_name_joins_name_and_version() {
        let spec = PackSpec::new("example", "1.2.3", PackMode::Script);
        assert_eq!(spec.output_name(), "example-1.2.3");
    }

    #[test]
    fn duplicate_entry_names_rejected_across_lists() {
        let spec = PackSpec::new("example", "1.0", PackMode::Script)
            .with_script(EntryPoint::module("tool", "pkg.cli"))
            .with_gui_script(EntryPoint::module("tool", "pkg.gui"));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn stdlib_block_filter_skips_matches() {
        let filter = StdlibFilter::Block(vec!["test*".into(), "turtledemo".into()]);
        assert!(!filter.keeps("test"));
        assert!(!filter.keeps("tests"));
        assert!(!filter.keeps("turtledemo"));
        assert!(filter.keeps("json"));
    }

    #[test]
    fn stdlib_allow_filter_keeps_only_matches() {
        let filter = StdlibFilter::Allow(vec!["json".into(), "encodings".into(), "*.py".into()]);
        assert!(filter.keeps("json"));
        assert!(filter.keeps("os.py"));
        assert!(!filter.keeps("tkinter"));
    }
}
