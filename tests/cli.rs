//! The `siteforge` binary's exit codes, run against throwaway projects.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn siteforge(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_siteforge"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn css_task_exits_zero_on_syntax_error() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "_dev/src/sass/main.scss", "body { color: red;");

    let out = siteforge(tmp.path(), &["css"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(!tmp.path().join("assets/css").exists());
}

#[test]
fn css_task_writes_stylesheet() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "_dev/src/sass/main.scss", "$c: red; body { color: $c; }");

    let out = siteforge(tmp.path(), &["css"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(tmp.path().join("assets/css/styles.css").is_file());
}

#[cfg(unix)]
#[test]
fn build_exits_with_generator_code() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "siteforge.toml",
        r#"
[generator]
command = "sh"
args = ["-c", "exit 3"]
"#,
    );

    assert_eq!(siteforge(tmp.path(), &["build"]).status.code(), Some(3));
    assert_eq!(siteforge(tmp.path(), &["jekyll"]).status.code(), Some(3));
}

#[test]
fn build_exits_one_when_generator_is_missing() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "siteforge.toml",
        "[generator]\ncommand = \"siteforge-no-such-generator\"\n",
    );

    assert_eq!(siteforge(tmp.path(), &["build"]).status.code(), Some(1));
}

#[test]
fn invalid_config_exits_one() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "siteforge.toml", "[images]\nquality = 0\n");

    assert_eq!(siteforge(tmp.path(), &["js"]).status.code(), Some(1));
}

#[test]
fn gen_config_ignores_broken_config() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "siteforge.toml", "not = [valid");

    let out = siteforge(tmp.path(), &["gen-config"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("[generator]"));
}
