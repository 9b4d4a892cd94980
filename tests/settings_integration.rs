//! Settings integration tests
//!
//! A TOML configuration pointing at a fake sysfs tree drives the dock,
//! ThinkLight and backlight helpers.

use std::fs;
use std::path::Path;

use lamco_thinkpad::config::Config;
use lamco_thinkpad::hardware::{DockProbe, IBM_DOCK_MODALIAS};
use lamco_thinkpad::ini::Ini;

struct FakeSysfs {
    dir: tempfile::TempDir,
}

impl FakeSysfs {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("dock.2")).unwrap();
        fs::write(root.join("dock.2/modalias"), IBM_DOCK_MODALIAS).unwrap();
        fs::write(root.join("dock.2/docked"), "1\n").unwrap();

        fs::write(root.join("thinklight"), "255\n").unwrap();

        fs::create_dir_all(root.join("intel_backlight")).unwrap();
        fs::write(root.join("intel_backlight/max_brightness"), "1000\n").unwrap();
        fs::write(root.join("intel_backlight/brightness"), "250\n").unwrap();

        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config_file(&self) -> std::path::PathBuf {
        let root = self.root().display();
        let toml = format!(
            r#"
[dock]
sysfs_path = "{root}/dock.2"

[hardware]
thinklight_path = "{root}/thinklight"
backlight_paths = ["{root}/intel_backlight", "{root}/nv_backlight"]

[logging]
level = "debug"
"#
        );
        let path = self.root().join("config.toml");
        fs::write(&path, toml).unwrap();
        path
    }
}

// ===== Configuration =====

#[test]
fn test_partial_config_keeps_defaults() {
    let sysfs = FakeSysfs::new();
    let config = Config::load(sysfs.config_file()).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.acpi.socket_path, Path::new("/var/run/acpid.socket"));
    assert_eq!(config.dock.expected_modalias, IBM_DOCK_MODALIAS);

    let source = config.acpi_source();
    assert_eq!(source.dock_path, format!("{}/dock.2", sysfs.root().display()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
    assert!(Config::load(&path).is_err());

    fs::write(&path, "[acpi]\nsocket_path = \"acpid.socket\"\n").unwrap();
    assert!(Config::load(&path).is_err());

    assert!(Config::load(dir.path().join("missing.toml")).is_err());
}

// ===== Hardware =====

#[test]
fn test_configured_hardware() {
    let sysfs = FakeSysfs::new();
    let config = Config::load(sysfs.config_file()).unwrap();

    let dock = config.dock_probe();
    assert!(dock.probe());
    assert!(dock.is_docked());

    fs::write(sysfs.root().join("dock.2/docked"), "0\n").unwrap();
    assert!(!dock.is_docked());

    let light = config.thinklight();
    assert!(light.probe());
    assert!(light.is_on().unwrap());

    let backlight = config.backlight();
    assert_eq!(backlight.available().len(), 1);
    assert!((backlight.level().unwrap() - 0.25).abs() < f32::EPSILON);

    backlight.set_level(0.5).unwrap();
    assert_eq!(
        fs::read_to_string(sysfs.root().join("intel_backlight/brightness")).unwrap(),
        "500"
    );
}

#[test]
fn test_missing_hardware() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default_config();
    config.dock.sysfs_path = dir.path().join("dock.0");
    config.hardware.thinklight_path = dir.path().join("thinklight");
    config.hardware.backlight_paths = vec![dir.path().join("acpi_video0")];

    assert!(!config.dock_probe().probe());
    assert!(!config.dock_probe().is_docked());
    assert!(!config.thinklight().probe());
    assert!(config.backlight().level().is_err());
    assert!(config.backlight().set_level(1.0).is_err());
}

// ===== INI store =====

#[test]
fn test_ini_store_edits_survive_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(
        &path,
        "[Monitor]\nname=LVDS-1\n\n[Monitor]\nname=DP-1\n\n[Dock]\nenabled=1\n",
    )
    .unwrap();

    let mut ini = Ini::read(&path).unwrap();
    assert_eq!(ini.sections_named("Monitor").count(), 2);

    let dock = ini.section_mut("Dock").unwrap();
    dock.set_int("enabled", 0).unwrap();
    dock.set_string_array("outputs", &["DP-1", "HDMI-1"]).unwrap();
    ini.write(&path).unwrap();

    let reread = Ini::read(&path).unwrap();
    let dock = reread.section("Dock").unwrap();
    assert_eq!(dock.get_int("enabled"), Some(0));
    assert_eq!(
        dock.get_string_array("outputs"),
        Some(vec!["DP-1", "HDMI-1"])
    );
    let names: Vec<_> = reread
        .sections_named("Monitor")
        .filter_map(|s| s.get_string("name"))
        .collect();
    assert_eq!(names, ["LVDS-1", "DP-1"]);
}
