//! CLI integration tests for Runway.
//!
//! Every test points the temp and data roots into its own TempDir so runs
//! never see each other or the real user directories.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// The runway binary, isolated below `root`.
fn runway(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("runway").unwrap();
    cmd.env("RUNWAY_TEMP", root.join("temp"))
        .env("RUNWAY_DATA", root.join("data"))
        .env_remove("RUNWAY_CLASSPATH")
        .arg("--no-color");
    cmd
}

/// Loose resource tree: `res/lib/a.txt`, `res/lib/sub/b.txt`.
fn resource_tree(root: &Path) -> std::path::PathBuf {
    let res = root.join("res");
    fs::create_dir_all(res.join("lib/sub")).unwrap();
    fs::write(res.join("lib/a.txt"), "alpha\n").unwrap();
    fs::write(res.join("lib/sub/b.txt"), "beta\n").unwrap();
    res
}

fn resource_zip(root: &Path) -> std::path::PathBuf {
    use zip::write::SimpleFileOptions;

    let path = root.join("res.zip");
    let mut zip = zip::ZipWriter::new(fs::File::create(&path).unwrap());
    for (name, body) in [("lib/a.txt", "alpha\n"), ("lib/sub/b.txt", "beta\n")] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

// ============================================================================
// runway list / extract / cat
// ============================================================================

#[test]
fn test_list_compact_manifest() {
    let tmp = TempDir::new().unwrap();
    let res = resource_tree(tmp.path());

    runway(tmp.path())
        .args(["list", "lib", "--source"])
        .arg(&res)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("/\n"))
        .stdout(predicate::str::contains("a.txt\nsub/\nb.txt"));
}

#[test]
fn test_list_flat_from_zip() {
    let tmp = TempDir::new().unwrap();
    let zip = resource_zip(tmp.path());

    runway(tmp.path())
        .args(["list", "lib", "--flat", "--source"])
        .arg(&zip)
        .assert()
        .success()
        .stdout(predicate::str::contains("sub/b.txt"))
        .stdout(predicate::str::contains("a.txt"));
}

#[test]
fn test_list_with_filter() {
    let tmp = TempDir::new().unwrap();
    let res = resource_tree(tmp.path());

    runway(tmp.path())
        .args(["list", "lib", "--flat", "--contains", "b.", "--source"])
        .arg(&res)
        .assert()
        .success()
        .stdout(predicate::str::contains("sub/b.txt"))
        .stdout(predicate::str::contains("a.txt").not());
}

#[test]
fn test_list_write_manifest() {
    let tmp = TempDir::new().unwrap();
    let res = resource_tree(tmp.path());
    let out = tmp.path().join("out");
    fs::create_dir_all(&out).unwrap();

    runway(tmp.path())
        .args(["list", "lib", "--source"])
        .arg(&res)
        .arg("--write")
        .arg(&out)
        .assert()
        .success();

    let manifest = fs::read_to_string(out.join("runwaycontent")).unwrap();
    assert!(manifest.contains("b.txt"));
}

#[test]
fn test_list_without_source_fails() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .args(["list", "lib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no --source"));
}

#[test]
fn test_extract_zip() {
    let tmp = TempDir::new().unwrap();
    let zip = resource_zip(tmp.path());
    let dest = tmp.path().join("dest");

    runway(tmp.path())
        .args(["extract", "lib"])
        .arg(&dest)
        .arg("--source")
        .arg(&zip)
        .assert()
        .success()
        .stderr(predicate::str::contains("Extracted"));

    assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "alpha\n");
    assert_eq!(fs::read_to_string(dest.join("sub/b.txt")).unwrap(), "beta\n");
}

#[test]
fn test_cat_text_resource() {
    let tmp = TempDir::new().unwrap();
    let res = resource_tree(tmp.path());

    runway(tmp.path())
        .args(["cat", "lib/sub", "b.txt", "--source"])
        .arg(&res)
        .assert()
        .success()
        .stdout("beta\n");
}

#[test]
fn test_cat_missing_resource_fails() {
    let tmp = TempDir::new().unwrap();
    let res = resource_tree(tmp.path());

    runway(tmp.path())
        .args(["cat", "lib", "nope.txt", "--source"])
        .arg(&res)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.txt"));
}

// ============================================================================
// runway start
// ============================================================================

#[test]
fn test_start_cleans_up_on_eof() {
    let tmp = TempDir::new().unwrap();

    assert_cmd::Command::from_std(runway(tmp.path()))
        .arg("start")
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains("Ready"));

    assert!(!tmp.path().join("temp/runway-instance.lock").exists());
    let leftovers = fs::read_dir(tmp.path().join("temp"))
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("Runway_"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_second_instance_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let lock = tmp.path().join("temp/runway-instance.lock");

    let mut first = runway(tmp.path())
        .arg("start")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    while !lock.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(lock.exists(), "first instance never took the lock");

    assert_cmd::Command::from_std(runway(tmp.path()))
        .arg("start")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already running"));

    // Batch runs are not affected
    assert_cmd::Command::from_std(runway(tmp.path()))
        .args(["start", "--batch"])
        .write_stdin("")
        .assert()
        .success();

    drop(first.stdin.take());
    assert!(first.wait().unwrap().success());
    assert!(!lock.exists());
}

// ============================================================================
// runway sweep / env / exec / completions
// ============================================================================

#[test]
fn test_sweep_removes_dead_runs() {
    let tmp = TempDir::new().unwrap();
    let stale = tmp.path().join("temp/Runway_4000000000_stale");
    let other = tmp.path().join("temp/unrelated");
    fs::create_dir_all(&stale).unwrap();
    fs::create_dir_all(&other).unwrap();

    runway(tmp.path())
        .args(["sweep", "--max-age", "0"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(!stale.exists());
    assert!(other.exists());
}

#[test]
fn test_env_reports_roots() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains("data root:"))
        .stdout(predicate::str::contains("natives_"));
}

#[test]
fn test_env_json() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .args(["--json", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reason\":\"env\""));
}

#[test]
fn test_env_reads_config_file() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("config.toml"), "[natives]\nversion = \"9.9.9\"\n").unwrap();

    runway(tmp.path())
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains("natives_9.9.9"));
}

#[test]
fn test_env_append_is_deferred_to_next_launch() {
    let tmp = TempDir::new().unwrap();
    let extra = tmp.path().join("extra.jar");
    fs::write(&extra, "").unwrap();

    runway(tmp.path())
        .args(["env", "--append"])
        .arg(&extra)
        .assert()
        .success()
        .stderr(predicate::str::contains("added for the next launch"));

    runway(tmp.path())
        .args(["env", "--filter", "EXTRA.JAR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extra.jar"));

    // Already resolvable now
    runway(tmp.path())
        .args(["env", "--append"])
        .arg(&extra)
        .assert()
        .success()
        .stderr(predicate::str::contains("already resolvable"));
}

#[cfg(unix)]
#[test]
fn test_exec_passes_exit_code_and_temp_dir() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .args(["exec", "--", "sh", "-c", "test -d \"$RUNWAY_PROCESS_TEMP\" && exit 3"])
        .assert()
        .code(3);
}

#[test]
fn test_exec_unknown_command() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .args(["exec", "--", "definitely-not-a-real-command-xyz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("command not found"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();

    runway(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("runway"));
}
