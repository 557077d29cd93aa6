//! Command-line tests against the built binary.
#![cfg(all(unix, not(feature = "native")))]

use datagrab::validate::{validate_session, ValidateOptions};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn datagrab() -> Command {
    Command::new(env!("CARGO_BIN_EXE_datagrab"))
}

fn wait_for_file(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_sigterm_closes_session_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let mut child = datagrab()
        .args(["record", "--rec-id", "rec_term", "--fps", "20", "--max-duration", "60"])
        .arg("--dataset-root")
        .arg(tmp.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let dir = tmp.path().join("rec_term");
    wait_for_file(&dir.join("frames/000003.png"));

    let kill = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(kill.success());
    assert_eq!(child.wait().unwrap().code(), Some(0));

    assert!(!dir.join(".stop").exists());
    let report = validate_session(&dir, &ValidateOptions::default()).unwrap();
    assert!(report.is_ok(), "{report}");
    assert!(report.summary.frames >= 3);

    let validate = datagrab()
        .arg("validate")
        .arg(&dir)
        .arg("--check-images")
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(validate.code(), Some(0));
}
