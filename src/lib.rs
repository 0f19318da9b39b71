//! gempack - Package Python applications with a bundled virtual environment
//!
//! gempack turns a Python project, together with a private copy of its
//! interpreter and standard library, into a self-contained directory tree that
//! runs on machines with no Python installed. Per declared entry point it
//! produces either a thin launcher script invoking the bundled interpreter, or
//! a natively compiled wrapper executable built with CMake.
//!
//! # Pipeline
//!
//! 1. Build the isolated runtime: create a copied (non-symlinked) virtual
//!    environment, install the project wheels, strip the environment's
//!    build-machine identity, vendor the interpreter binary and its shared
//!    libraries, copy a curated standard library, and compact shipped sources
//!    to bytecode where a cache exists.
//! 2. Generate one launcher per entry point (`.sh`/`.bat` scripts, or compiled
//!    executables in app mode).
//! 3. Copy declared data files into the bundle.
//!
//! # Output layout
//!
//! ```text
//! dist/<name>-<version>/
//!   venv/                 isolated runtime (interpreter, libs, stdlib)
//!   <entry>[.sh|.bat|.exe]  one launcher per entry point
//!   gempack-license.txt
//!   <data dirs>/
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use gempack::{load_spec, HostPython, Packer};
//!
//! let spec = load_spec(".")?;
//! let platform = HostPython::discover("python3")?;
//! Packer::new(spec, platform)?.pack()?;
//! # Ok::<(), gempack::PackError>(())
//! ```

mod config;
mod envbuilder;
mod error;
mod launcher;
mod libres;
mod manifest;
mod packer;
mod platform;
mod process;
mod template;

pub use config::{EntryPoint, PackMode, PackSpec, StdlibFilter};
pub use error::{PackError, PackResult};
pub use launcher::{build_command, LauncherGenerator};
pub use libres::{parse_ldd_output, InstallTreeResolver, LddResolver, LibraryResolver, ResolvedLibrary};
pub use manifest::{load_spec, Manifest};
pub use packer::Packer;
pub use platform::{HostPython, PlatformServices, TargetFamily, VenvLayout};
pub use process::stream_command;
pub use template::{render, Placeholder, Replacements};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
