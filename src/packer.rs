//! Main packer implementation
//!
//! Sequences one pack run: environment construction, launcher generation per
//! entry point, then data-file copies. Any fatal step aborts the remainder and
//! propagates as a single error; the output tree is owned exclusively by one
//! build and is recreated from scratch every run.

use crate::config::{PackMode, PackSpec};
use crate::envbuilder::EnvBuilder;
use crate::error::{PackError, PackResult};
use crate::launcher::LauncherGenerator;
use crate::platform::{PlatformServices, VenvLayout};
use std::fs;
use std::path::{Path, PathBuf};

/// Main packer for producing a redistributable bundle
pub struct Packer<P: PlatformServices> {
    spec: PackSpec,
    platform: P,
    dist_dir: PathBuf,
}

impl<P: PlatformServices> Packer<P> {
    /// Create a packer; the spec is validated before anything touches disk
    pub fn new(spec: PackSpec, platform: P) -> PackResult<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            platform,
            dist_dir: PathBuf::from("dist"),
        })
    }

    /// Override the distribution root (default `dist/`)
    pub fn with_dist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dist_dir = dir.into();
        self
    }

    /// Directory the bundle is written to
    pub fn output_dir(&self) -> PathBuf {
        self.dist_dir.join(self.spec.output_name())
    }

    /// Run the whole pipeline.
    ///
    /// The environment is fully built before the first launcher is generated;
    /// launchers assume the bundled runtime already exists.
    pub fn pack(&self) -> PackResult<()> {
        let output_dir = self.output_dir();
        let layout = VenvLayout::new(
            &output_dir,
            self.platform.target_family(),
            self.platform.runtime_version(),
        );

        tracing::info!("Building Virtual Environment");
        EnvBuilder::new(&self.spec, &self.platform, layout).build()?;

        let generator = LauncherGenerator::new(&self.spec, &self.platform, &output_dir);
        for (ep, gui) in self
            .spec
            .scripts
            .iter()
            .map(|ep| (ep, false))
            .chain(self.spec.gui_scripts.iter().map(|ep| (ep, true)))
        {
            tracing::info!("Generating app - {}", ep.name);
            match self.spec.mode {
                PackMode::Script => generator.make_script(ep)?,
                PackMode::App => generator.make_native(ep, gui)?,
            }
        }

        copy_data_globs(&output_dir, &self.spec.data_globs)?;
        Ok(())
    }
}

/// Copy configured data files into the bundle.
///
/// Only file matches are copied; directories produced by the glob are
/// skipped. The copy is flat: the destination keeps the filename only.
pub(crate) fn copy_data_globs(output_dir: &Path, globs: &[(String, String)]) -> PackResult<()> {
    if globs.is_empty() {
        return Ok(());
    }
    tracing::info!("Copying Data");

    for (pattern, dest) in globs {
        let dest_dir = output_dir.join(dest);
        fs::create_dir_all(&dest_dir)?;

        let matches = glob::glob(pattern)
            .map_err(|e| PackError::Config(format!("Bad data glob '{}': {}", pattern, e)))?;
        for path in matches.flatten() {
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            tracing::info!("{} -> {}", path.display(), dest_dir.display());
            fs::copy(&path, dest_dir.join(name))?;
        }
    }

    tracing::info!("Copying Data - Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_copy_skips_directories_and_flattens() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("assets");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested").join("b.txt"), "b").unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        // `*` matches both the files and the `nested` directory
        let pattern = format!("{}/*", src.display());
        copy_data_globs(&out, &[(pattern, "data".to_string())]).unwrap();

        assert!(out.join("data").join("a.txt").exists());
        assert!(!out.join("data").join("nested").exists());
        assert!(!out.join("data").join("b.txt").exists());
    }

    #[test]
    fn data_copy_flattens_recursive_matches() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("assets");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("deep").join("c.cfg"), "c").unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let pattern = format!("{}/**/*.cfg", src.display());
        copy_data_globs(&out, &[(pattern, "cfg".to_string())]).unwrap();

        // Nested path is not preserved, only the filename
        assert!(out.join("cfg").join("c.cfg").exists());
        assert!(!out.join("cfg").join("deep").exists());
    }

    #[test]
    fn empty_globs_create_nothing() {
        let dir = tempfile::tempdir().unwrap();
        copy_data_globs(dir.path(), &[]).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
