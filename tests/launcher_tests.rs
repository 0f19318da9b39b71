//! Tests for gempack launcher generation

use gempack::{
    EntryPoint, LauncherGenerator, PackMode, PackSpec, PlatformServices, TargetFamily,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Platform double: a fixed interpreter layout, no real Python involved
struct FakePlatform {
    family: TargetFamily,
    executable: PathBuf,
    stdlib: PathBuf,
}

impl FakePlatform {
    fn new(family: TargetFamily) -> Self {
        Self {
            family,
            executable: PathBuf::from("/opt/python/bin/python3"),
            stdlib: PathBuf::from("/opt/python/lib/python3.11"),
        }
    }
}

impl PlatformServices for FakePlatform {
    fn runtime_executable(&self) -> &Path {
        &self.executable
    }

    fn stdlib_path(&self) -> &Path {
        &self.stdlib
    }

    fn runtime_version(&self) -> &str {
        "python3.11"
    }

    fn target_family(&self) -> TargetFamily {
        self.family
    }
}

fn spec() -> PackSpec {
    PackSpec::new("example", "1.0.0", PackMode::Script)
}

#[test]
fn script_launcher_runs_module_directly() {
    let temp = TempDir::new().unwrap();
    let spec = spec();
    let platform = FakePlatform::new(TargetFamily::Unix);
    let generator = LauncherGenerator::new(&spec, &platform, temp.path());

    let ep = EntryPoint::module("myScript", "examplePackage.myScript");
    generator.make_script(&ep).unwrap();

    let out = temp.path().join("myScript.sh");
    let content = fs::read_to_string(&out).unwrap();
    assert!(content.contains("-m examplePackage.myScript"));
    assert!(!content.contains("import"));
    // The exact runtime version used during the build is embedded
    assert!(content.contains("python3.11"));
    // No token may survive rendering
    assert!(!content.contains("@@"));
}

#[test]
fn script_launcher_with_entry_calls_and_exits() {
    let temp = TempDir::new().unwrap();
    let spec = spec();
    let platform = FakePlatform::new(TargetFamily::Unix);
    let generator = LauncherGenerator::new(&spec, &platform, temp.path());

    let ep = EntryPoint::callable("myScript", "examplePackage.myScript", "main");
    generator.make_script(&ep).unwrap();

    let content = fs::read_to_string(temp.path().join("myScript.sh")).unwrap();
    assert!(content.contains("from examplePackage.myScript import main; exit(main())"));
}

#[test]
#[cfg(unix)]
fn unix_script_launcher_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let spec = spec();
    let platform = FakePlatform::new(TargetFamily::Unix);
    let generator = LauncherGenerator::new(&spec, &platform, temp.path());

    generator
        .make_script(&EntryPoint::module("myScript", "examplePackage.myScript"))
        .unwrap();

    let mode = fs::metadata(temp.path().join("myScript.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn windows_family_uses_batch_extension() {
    let temp = TempDir::new().unwrap();
    let spec = spec();
    let platform = FakePlatform::new(TargetFamily::Windows);
    let generator = LauncherGenerator::new(&spec, &platform, temp.path());

    generator
        .make_script(&EntryPoint::module("myScript", "examplePackage.myScript"))
        .unwrap();

    let out = temp.path().join("myScript.bat");
    assert!(out.exists());
    let content = fs::read_to_string(&out).unwrap();
    assert!(content.contains("Scripts\\python.exe"));
    assert!(content.contains("-m examplePackage.myScript"));
}

#[test]
#[cfg(unix)]
fn native_launcher_missing_artifact_is_fatal() {
    use std::os::unix::fs::PermissionsExt;

    // A build tool that reports success but produces nothing
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let stub = bin.join("cmake");
    fs::write(&stub, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = fs::metadata(&stub).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&stub, perms).unwrap();

    let old_path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", bin.display(), old_path));

    let mut spec = spec();
    spec.mode = PackMode::App;
    spec.build_dir = temp.path().join("build");

    let out = temp.path().join("dist");
    fs::create_dir_all(&out).unwrap();

    let platform = FakePlatform::new(TargetFamily::Unix);
    let generator = LauncherGenerator::new(&spec, &platform, &out);
    let ep = EntryPoint::module("myScript", "examplePackage.myScript");
    let err = generator.make_native(&ep, false).unwrap_err();

    std::env::set_var("PATH", old_path);

    let msg = err.to_string();
    assert!(msg.contains("Cannot find built executable"), "{msg}");
    // The attempted path is reported and nothing was copied
    assert!(msg.contains("gp-cmake-build"), "{msg}");
    assert!(!out.join("myScript").exists());
}

#[test]
fn native_launcher_missing_build_tool_copies_nothing() {
    // Drive app mode with a build directory where no cmake run ever happened;
    // whatever the failure (unavailable tool or failed configure), no launcher
    // file may appear in the output tree.
    let temp = TempDir::new().unwrap();
    let mut spec = spec();
    spec.mode = PackMode::App;
    spec.build_dir = temp.path().join("build");

    let out = temp.path().join("dist");
    fs::create_dir_all(&out).unwrap();

    let platform = FakePlatform::new(TargetFamily::Unix);
    let generator = LauncherGenerator::new(&spec, &platform, &out);

    let ep = EntryPoint::module("myScript", "examplePackage.myScript");
    let result = generator.make_native(&ep, false);
    if result.is_err() {
        assert!(!out.join("myScript").exists());
    }
}
