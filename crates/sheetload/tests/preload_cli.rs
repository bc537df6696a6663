use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use serde_json::Value;
use tempfile::TempDir;

fn write_sheet(dir: &Path, stem: &str, size: u32) {
    RgbaImage::from_pixel(size, size, Rgba([200, 40, 40, 255]))
        .save(dir.join(format!("{stem}.png")))
        .unwrap();
    fs::write(
        dir.join(format!("{stem}.plist")),
        "<?xml version=\"1.0\"?><plist version=\"1.0\"><dict/></plist>",
    )
    .unwrap();
}

fn sheetload(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sheetload"))
        .env("SHEETLOAD_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run sheetload")
}

fn names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|name| {
            Path::new(name.as_str().unwrap())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

#[test]
fn preload_directory_reports_completed_sheets() {
    let root = TempDir::new().unwrap();
    let sheets = root.path().join("sheets");
    fs::create_dir_all(&sheets).unwrap();
    write_sheet(&sheets, "hud", 8);
    write_sheet(&sheets, "tiles", 4);

    let output = sheetload(
        &root.path().join("config"),
        &["preload", sheets.to_str().unwrap(), "--json", "--frame-ms", "1"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    let pass = &summary["passes"][0];
    assert_eq!(names(&pass["completed"]), vec!["hud.plist", "tiles.plist"]);
    assert!(pass["incomplete"].as_array().unwrap().is_empty());
    assert_eq!(summary["textures"], 2);
    assert_eq!(summary["resident_bytes"], 8 * 8 * 4 + 4 * 4 * 4);
    assert_eq!(summary["stats"]["completed"], 2);
}

#[test]
fn corrupt_image_fails_only_its_own_sheet() {
    let root = TempDir::new().unwrap();
    write_sheet(root.path(), "good", 2);
    fs::write(root.path().join("bad.png"), b"definitely not a png").unwrap();
    fs::write(root.path().join("bad.plist"), "<plist/>").unwrap();

    let output = sheetload(
        &root.path().join("config"),
        &["preload", root.path().to_str().unwrap(), "--json", "--frame-ms", "1"],
    );
    assert!(!output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    let pass = &summary["passes"][0];
    assert_eq!(names(&pass["completed"]), vec!["good.plist"]);
    assert_eq!(names(&pass["incomplete"]), vec!["bad.plist"]);
    assert_eq!(summary["stats"]["decode_failures"], 1);
}

#[test]
fn second_pass_uses_cached_textures() {
    let root = TempDir::new().unwrap();
    write_sheet(root.path(), "menu", 2);
    let manifest = root.path().join("menu.plist");

    let output = sheetload(
        &root.path().join("config"),
        &[
            "preload",
            manifest.to_str().unwrap(),
            "--json",
            "--passes",
            "2",
            "--frame-ms",
            "1",
        ],
    );
    assert!(output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["passes"].as_array().unwrap().len(), 2);
    assert_eq!(summary["stats"]["decoded"], 1);
    assert_eq!(summary["stats"]["fast_path_hits"], 1);
    assert_eq!(summary["stats"]["completed"], 2);
}

#[test]
fn config_file_can_disable_fast_path() {
    let root = TempDir::new().unwrap();
    write_sheet(root.path(), "menu", 2);
    let config = root.path().join("custom.toml");
    fs::write(&config, "version = 1\nfast_path = \"disabled\"\n").unwrap();
    let manifest = root.path().join("menu.plist");

    let output = sheetload(
        &root.path().join("config"),
        &[
            "--config",
            config.to_str().unwrap(),
            "preload",
            manifest.to_str().unwrap(),
            "--json",
            "--passes",
            "2",
            "--frame-ms",
            "1",
        ],
    );
    assert!(output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["stats"]["decoded"], 2);
    assert_eq!(summary["stats"]["fast_path_hits"], 0);
}

#[test]
fn config_init_then_where() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");

    let init = sheetload(&config_dir, &["config", "init"]);
    assert!(init.status.success());
    let written = fs::read_to_string(config_dir.join("loader.toml")).unwrap();
    assert!(written.contains("version = 1"));

    let again = sheetload(&config_dir, &["config", "init"]);
    assert!(!again.status.success());

    let location = sheetload(&config_dir, &["config", "where"]);
    assert!(location.status.success());
    let stdout = String::from_utf8_lossy(&location.stdout);
    assert!(stdout.contains("loader.toml"));
    assert!(stdout.contains("present"));
}
