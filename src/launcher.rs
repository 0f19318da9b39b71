//! Per-entry-point launcher generation
//!
//! Script mode renders a thin `.sh`/`.bat` wrapper around the bundled
//! interpreter. App mode renders a C++ wrapper source embedding the same
//! invocation command and drives a CMake configure/build, then copies the
//! verified artifact into the bundle.

use crate::config::{EntryPoint, PackSpec};
use crate::error::{PackError, PackResult};
use crate::platform::{PlatformServices, TargetFamily};
use crate::process::run_checked;
use crate::template::{self, Placeholder, Replacements};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Build the interpreter invocation command for an entry point.
///
/// With a callable, the module is imported and the process exits with the
/// callable's return value; without one the module is run directly.
pub fn build_command(ep: &EntryPoint) -> String {
    match &ep.entry {
        Some(entry) => format!(
            "-c \"from {} import {}; exit({}())\"",
            ep.module, entry, entry
        ),
        None => format!("-m {}", ep.module),
    }
}

/// Compute where the build tool leaves the compiled wrapper
pub(crate) fn expected_artifact(
    build_dir: &Path,
    name: &str,
    family: TargetFamily,
) -> PathBuf {
    match family {
        TargetFamily::Unix => build_dir.join(name),
        TargetFamily::Windows => build_dir.join("Release").join(format!("{}.exe", name)),
    }
}

/// Generates launchers into a bundle's output directory
pub struct LauncherGenerator<'a> {
    spec: &'a PackSpec,
    platform: &'a dyn PlatformServices,
    output_dir: PathBuf,
}

impl<'a> LauncherGenerator<'a> {
    /// Create a generator writing into `output_dir` (`dist/<name>-<version>`)
    pub fn new(
        spec: &'a PackSpec,
        platform: &'a dyn PlatformServices,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            spec,
            platform,
            output_dir: output_dir.into(),
        }
    }

    /// Generate a script launcher for one entry point
    pub fn make_script(&self, ep: &EntryPoint) -> PackResult<()> {
        let family = self.platform.target_family();
        let (template_name, text) = match family {
            TargetFamily::Unix => ("app.sh", template::APP_SH),
            TargetFamily::Windows => ("app.bat", template::APP_BAT),
        };

        let replacements = Replacements::new()
            .set(Placeholder::Command, build_command(ep))
            .set(Placeholder::Python, self.platform.runtime_version());

        let outfile = self
            .output_dir
            .join(format!("{}{}", ep.name, family.script_extension()));
        template::render_to_file(template_name, text, &replacements, &outfile)?;

        #[cfg(unix)]
        if family == TargetFamily::Unix {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&outfile)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&outfile, perms)?;
        }

        tracing::info!("Success - {}", ep.name);
        Ok(())
    }

    /// Compile a native launcher for one entry point.
    ///
    /// `gui` marks GUI-only entry points, built without a console window on
    /// Windows.
    pub fn make_native(&self, ep: &EntryPoint, gui: bool) -> PackResult<()> {
        let family = self.platform.target_family();

        // The command is inlined into generated C++ source text
        let command = build_command(ep).replace('"', "\\\"");

        let src_dir = self.spec.build_dir.join("gp-app-src");
        let build_dir = self.spec.build_dir.join("gp-cmake-build");
        fs::create_dir_all(&src_dir)?;

        let replacements = Replacements::new()
            .set(Placeholder::Command, command)
            .set(Placeholder::Python, self.platform.runtime_version());
        template::render_to_file(
            "app.cpp",
            template::APP_CPP,
            &replacements,
            &src_dir.join("app.cpp"),
        )?;
        fs::write(src_dir.join("CMakeLists.txt"), template::CMAKE_LISTS)?;

        let mut configure = Command::new("cmake");
        configure
            .arg("-S")
            .arg(&src_dir)
            .arg("-B")
            .arg(&build_dir)
            .arg(format!("-DEXEC_NAME={}", ep.name));
        if family == TargetFamily::Unix {
            configure.arg("-DCMAKE_BUILD_TYPE=Release");
        }
        if self.spec.debug_logs {
            configure.arg("-DDEBUG_LOGS=ON");
        }
        if let Some(icon) = &ep.icon {
            configure.arg(format!("-DEXEC_ICON={}", icon.display()));
        }
        if gui {
            configure.arg("-DGUI_APP=ON");
        }

        tracing::info!("Building executable - {}", ep.name);
        tracing::info!("Configuring CMake");
        run_checked("cmake configure", configure)?;

        let mut build = Command::new("cmake");
        build.arg("--build").arg(&build_dir);
        if family == TargetFamily::Windows {
            build.arg("--config=Release");
        }
        tracing::info!("Building app");
        run_checked("cmake build", build)?;

        tracing::info!("Copying executable - {}", ep.name);
        let artifact = expected_artifact(&build_dir, &ep.name, family);
        if !artifact.is_file() {
            return Err(PackError::MissingArtifact(artifact));
        }

        let dest = self
            .output_dir
            .join(format!("{}{}", ep.name, family.exe_extension()));
        fs::copy(&artifact, &dest)?;

        tracing::info!("Success - {}", ep.name);
        Ok(())
    }
}
