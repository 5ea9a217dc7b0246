use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A node laid out under a temp dir, with every path redirected through the environment
struct Node {
    temp: TempDir,
}

impl Node {
    fn new() -> Self {
        let node = Self {
            temp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(node.state().join("mesh")).unwrap();
        fs::write(node.state().join("pairing.json"), b"{\"paired\":true}").unwrap();
        fs::write(node.state().join("mesh").join("node.key"), b"secret").unwrap();
        fs::write(node.state().join("agent.log"), b"noise").unwrap();
        node
    }

    fn state(&self) -> PathBuf {
        self.temp.path().join("state")
    }

    fn backups(&self) -> PathBuf {
        self.state().join("backups")
    }

    fn cron(&self) -> PathBuf {
        self.temp.path().join("cron.d").join("nodevault-backup")
    }

    fn usb(&self) -> PathBuf {
        self.temp.path().join("usb")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("nodevault").unwrap();
        cmd.env("NODEVAULT_STATE_DIR", self.state())
            .env("NODEVAULT_DATA_DIR", self.temp.path().join("data"))
            .env("NODEVAULT_CRON_FILE", self.cron())
            .env("NODEVAULT_MOUNTS", self.usb())
            .env_remove("RUST_LOG")
            .env_remove("NODEVAULT_LOG");
        cmd
    }

    fn archives(&self) -> Vec<String> {
        archive_names(&self.backups())
    }
}

fn archive_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .filter(|n| n.ends_with(".tar.gz"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_create_and_list() {
    let node = Node::new();

    node.cmd()
        .arg("create")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created: nodevault-"));

    let archives = node.archives();
    assert_eq!(archives.len(), 1);

    node.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(archives[0].as_str()))
        .stdout(predicate::str::contains("Total: 1 backup(s)"));
}

#[test]
fn test_list_json() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    let output = node.cmd().args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], node.archives()[0].as_str());
    assert!(entries[0]["size_bytes"].as_u64().unwrap() > 0);
}

#[test]
fn test_create_dry_run_writes_nothing() {
    let node = Node::new();

    node.cmd()
        .args(["create", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pairing.json"))
        .stdout(predicate::str::contains("agent.log").not());

    assert!(node.archives().is_empty());
}

#[test]
fn test_create_to_missing_usb_warns_but_succeeds() {
    let node = Node::new();

    node.cmd()
        .args(["create", "--target", "usb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning:"));

    assert_eq!(node.archives().len(), 1);
}

#[test]
fn test_create_to_usb_mirrors() {
    let node = Node::new();
    fs::create_dir_all(node.usb()).unwrap();

    node.cmd()
        .args(["create", "--target=usb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied to usb"));

    assert_eq!(archive_names(&node.usb().join("nodevault-backups")), node.archives());
}

#[test]
fn test_unknown_target_rejected() {
    let node = Node::new();
    node.cmd().args(["create", "--target", "floppy"]).assert().failure();
}

#[test]
fn test_restore_latest_into_dest() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    let dest = node.temp.path().join("restore");
    node.cmd()
        .args(["restore", "--latest", "--yes", "--dest"])
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore complete!"));

    let restored = dest.join(node.state().strip_prefix("/").unwrap());
    assert_eq!(
        fs::read(restored.join("pairing.json")).unwrap(),
        b"{\"paired\":true}"
    );
    assert!(!restored.join("agent.log").exists());
}

#[test]
fn test_restore_prompt_declined() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    let dest = node.temp.path().join("restore");
    node.cmd()
        .args(["restore", "--latest", "--dest"])
        .arg(&dest)
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Continue? [y/N]"))
        .stdout(predicate::str::contains("Restore cancelled."));

    assert!(!dest.exists());
}

#[test]
fn test_restore_prompt_accepted() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    let dest = node.temp.path().join("restore");
    node.cmd()
        .args(["restore", "--latest", "--dest"])
        .arg(&dest)
        .write_stdin("y\n")
        .assert()
        .success();

    assert!(dest.exists());
}

#[test]
fn test_restore_dry_run() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    let dest = node.temp.path().join("restore");
    node.cmd()
        .args(["restore", "--latest", "--dry-run", "--dest"])
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("node.key"));

    assert!(!dest.exists());
}

#[test]
fn test_restore_without_selector_fails() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    node.cmd()
        .arg("restore")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Available backups"));
}

#[test]
fn test_restore_unknown_date_fails() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();

    node.cmd()
        .args(["restore", "--date", "1999-01-01", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_delete() {
    let node = Node::new();
    node.cmd().arg("create").assert().success();
    let name = node.archives().remove(0);

    node.cmd()
        .args(["delete", &name])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted backup"));
    assert!(node.archives().is_empty());

    node.cmd().args(["delete", &name]).assert().failure();
}

#[test]
fn test_schedule_and_status() {
    let node = Node::new();

    node.cmd()
        .args(["schedule", "--cron", "0 4 * * *", "--retention", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Automatic backups enabled"));

    let cron = fs::read_to_string(node.cron()).unwrap();
    assert!(cron.starts_with("0 4 * * * root "));
    assert!(cron.ends_with(" create --target=local\n"));

    let policy = fs::read_to_string(node.state().join("backup.yaml")).unwrap();
    assert!(policy.contains("retention: 3"));

    node.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Automatic backups: enabled"))
        .stdout(predicate::str::contains("Retention: 3 backup(s)"));

    node.cmd().args(["schedule", "--disable"]).assert().success();
    assert!(!node.cron().exists());

    node.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Automatic backups: disabled"));
}

#[test]
fn test_prune_previews_without_force() {
    let node = Node::new();
    fs::create_dir_all(node.backups()).unwrap();
    for day in 1..=3 {
        let name = format!("nodevault-edge-2024-01-0{}_02-00-00.tar.gz", day);
        fs::write(node.backups().join(name), b"old").unwrap();
    }
    fs::write(node.state().join("backup.yaml"), "enabled: true\nretention: 1\n").unwrap();

    node.cmd()
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodevault-edge-2024-01-01_02-00-00.tar.gz"))
        .stdout(predicate::str::contains("--force"));
    assert_eq!(node.archives().len(), 3);

    node.cmd()
        .args(["prune", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 2 backup(s)."));
    assert_eq!(
        node.archives(),
        vec!["nodevault-edge-2024-01-03_02-00-00.tar.gz".to_string()]
    );
}

#[test]
fn test_malformed_policy_does_not_block_create() {
    let node = Node::new();
    fs::write(node.state().join("backup.yaml"), "target: [\n").unwrap();

    node.cmd()
        .arg("create")
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning: Ignoring backup policy"));
    assert_eq!(node.archives().len(), 1);
}
