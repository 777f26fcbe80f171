//! End-to-end tests of the `site-tools` binary.
//!
//! Every test runs inside its own temporary site root, so a stray `.env`
//! or `site.toml` in the repository never leaks in. Nothing here touches
//! the network: the import tests stop at argument and reference checks.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn site_tools(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("site-tools").unwrap();
    cmd.current_dir(dir)
        .env_remove("TG_API_ID")
        .env_remove("TG_API_HASH")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// =========================================================================
// import
// =========================================================================

#[test]
fn import_without_url_prints_usage_and_exits_1() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .arg("import")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Usage: site-tools import <message-url> [site-root]",
        ));
    assert!(!tmp.path().join("posts").exists());
}

#[test]
fn import_rejects_malformed_reference() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .args(["import", "https://example.com/chan/1"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error: invalid message reference: https://example.com/chan/1",
        ));
}

#[test]
fn import_rejects_non_numeric_api_id() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .args(["import", "https://t.me/chan/5"])
        .arg(tmp.path())
        .args(["--api-id", "abc", "--api-hash", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error: api id must be an integer, got \"abc\"",
        ));
}

#[test]
fn import_rejects_negative_album_radius() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "site.toml", "[import]\nalbum_radius = -1\n");
    site_tools(tmp.path())
        .args(["import", "https://t.me/chan/5"])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Config validation error: import.album_radius must not be negative",
        ));
    assert!(!tmp.path().join("posts").exists());
}

// =========================================================================
// gen-config
// =========================================================================

#[test]
fn gen_config_prints_every_section() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .arg("gen-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[site]"))
        .stdout(predicate::str::contains("[import]"))
        .stdout(predicate::str::contains("[scans]"))
        .stdout(predicate::str::contains("[gallery]"));
}

#[test]
fn gen_config_output_is_a_valid_config() {
    let tmp = TempDir::new().unwrap();
    let out = site_tools(tmp.path()).arg("gen-config").output().unwrap();
    fs::write(tmp.path().join("site.toml"), out.stdout).unwrap();

    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .success();
}

// =========================================================================
// copy-scans
// =========================================================================

#[test]
fn copy_scans_copies_then_skips() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "scans/a.pdf", "a");
    write(tmp.path(), "scans/mag/b.djvu", "b");

    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[copy_scans] connected to 'initialized'",
        ))
        .stdout(predicate::str::contains(
            "[copy_scans] copied scans/a.pdf -> output/scans/a.pdf",
        ))
        .stdout(predicate::str::contains(
            "[copy_scans] copied 2 file(s), skipped 0 (up-to-date)",
        ));
    assert_eq!(
        fs::read_to_string(tmp.path().join("output/scans/mag/b.djvu")).unwrap(),
        "b"
    );

    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[copy_scans] copied 0 file(s), skipped 2 (up-to-date)",
        ));
}

#[test]
fn copy_scans_with_nothing_to_copy() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[copy_scans] no pdf/djvu found"));
}

#[test]
fn copy_scans_honours_legacy_output_dir() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "site.toml", "[site]\noutput_dir = \"public\"\n");
    write(tmp.path(), "scans/a.pdf", "a");

    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .success();

    assert!(tmp.path().join("public/scans/a.pdf").exists());
}

#[test]
fn unknown_config_key_is_an_error() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "site.toml", "[scans]\nroots = \"x\"\n");

    site_tools(tmp.path())
        .args(["copy-scans", "--root"])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: "))
        .stderr(predicate::str::contains("unknown field `roots`"));
}

// =========================================================================
// scan-entry
// =========================================================================

#[test]
fn scan_entry_renders_fragment() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "scans/Q64/p001.jpg", "");
    write(tmp.path(), "scans/Q64.pdf", "pdf");

    site_tools(tmp.path())
        .args(["scan-entry", "Quorum 64", "--path", "Q64", "--desc", "<b>1964</b>", "--root"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("/scans/Q64/p001.thumbnail.jpg"))
        .stdout(predicate::str::contains("<h3>Quorum 64</h3>"))
        .stdout(predicate::str::contains("<b>1964</b>"))
        .stdout(predicate::str::contains(r#"class="download pdf""#));
}

#[test]
fn scan_entry_missing_gallery_fails_with_line() {
    let tmp = TempDir::new().unwrap();
    site_tools(tmp.path())
        .args(["scan-entry", "Nothing", "--path", "Nope", "--root"])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "scan:1: scan directive: gallery not found: 'scans/Nope'",
        ));
}

// =========================================================================
// render
// =========================================================================

#[test]
fn render_expands_document() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "scans/Q64/p001.jpg", "");
    write(
        tmp.path(),
        "library.rst",
        "Library\n=======\n\n.. scan:: Quorum\n   :path: Q64\n\nBy :scan:`me`.\n",
    );

    site_tools(tmp.path())
        .arg("render")
        .arg(tmp.path().join("library.rst"))
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(".. raw:: html"))
        .stdout(predicate::str::contains(":raw-html:`<i>me</i>`"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn render_reports_errors_with_file_and_line() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "library.rst",
        "Library\n=======\n\n.. scan:: No path\n\n.. scan:: Missing\n   :path: Gone\n",
    );

    site_tools(tmp.path())
        .arg("render")
        .arg(tmp.path().join("library.rst"))
        .arg("--root")
        .arg(tmp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Library"))
        .stderr(predicate::str::contains(
            "library.rst:4: scan directive: missing ':path:' option",
        ))
        .stderr(predicate::str::contains(
            "library.rst:6: scan directive: gallery not found: 'scans/Gone'",
        ));
}
