//! Runs the whole start command against a fake SDK whose `adb` and
//! `emulator` are shell scripts.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use emu_boot::commands::StartCommand;
use emu_boot::core::{EmuBootError, ExportTarget, StepConfig};
use emu_boot::emulator::AvdManager;

fn write_script(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    /// SDK with the modern emulator layout and one AVD named `ci_avd`.
    /// The emulator shows up on the second `adb devices` call.
    fn new(booted: bool, emulator_body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let prop = if booted { "1" } else { "0" };
        let anim = if booted { "stopped" } else { "running" };
        write_script(
            &root.join("sdk/platform-tools/adb"),
            &format!(
                r#"state="{state}"
case "$*" in
  "devices -l")
    n=$(cat "$state" 2>/dev/null || echo 0)
    n=$((n+1))
    echo "$n" > "$state"
    echo "List of devices attached"
    echo "emulator-5554          device product:sdk_gphone64 model:sdk_gphone64 transport_id:1"
    if [ "$n" -ge 2 ]; then
      echo "emulator-5556          device product:sdk_gphone64 model:sdk_gphone64 transport_id:2"
    fi
    ;;
  *"getprop dev.bootcomplete"*|*"getprop sys.boot_completed"*) echo "{prop}" ;;
  *"getprop init.svc.bootanim"*) echo "{anim}" ;;
  *) ;;
esac"#,
                state = root.join("adb-polls").display(),
                prop = prop,
                anim = anim,
            ),
        );

        write_script(&root.join("sdk/emulator/emulator"), emulator_body);
        std::fs::create_dir_all(root.join("sdk/emulator/lib64/qt/lib")).unwrap();

        let avd_home = root.join("avd");
        std::fs::create_dir_all(avd_home.join("ci_avd.avd")).unwrap();
        std::fs::write(avd_home.join("ci_avd.ini"), "path.rel=avd/ci_avd.avd\ntarget=android-34\n")
            .unwrap();

        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn config(&self, emulator_name: &str) -> StepConfig {
        let mut config = StepConfig::new(emulator_name);
        config.android_home = Some(self.path("sdk"));
        config.poll_interval = Duration::from_millis(50);
        config.boot_timeout = Duration::from_secs(20);
        config.export = ExportTarget::EnvFile(self.path("serial.env"));
        config.emulator_log = self.path("logs/emulator.log");
        config.report = Some(self.path("report.json"));
        config
    }

    fn command(&self, config: StepConfig) -> StartCommand {
        StartCommand::new(config).with_avd_manager(AvdManager::new(self.path("avd")))
    }
}

#[tokio::test]
async fn test_boots_and_exports_new_serial() {
    let fixture = Fixture::new(true, "exec sleep 5");

    let report = fixture
        .command(fixture.config("ci_avd"))
        .execute()
        .await
        .unwrap();

    assert_eq!(report.serial, "emulator-5556");
    assert_eq!(report.avd_name, "ci_avd");
    assert!(report.waited_for_boot);
    assert_eq!(report.launch_id.len(), 36);

    assert_eq!(
        std::fs::read_to_string(fixture.path("serial.env")).unwrap(),
        "BITRISE_EMULATOR_SERIAL=emulator-5556\n"
    );

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture.path("report.json")).unwrap())
            .unwrap();
    assert_eq!(json["serial"], "emulator-5556");
    assert_eq!(json["launch_id"], report.launch_id.as_str());
}

#[tokio::test]
async fn test_no_boot_wait_returns_on_serial() {
    let fixture = Fixture::new(false, "exec sleep 5");

    let mut config = fixture.config("ci_avd");
    config.wait_for_boot = false;
    config.export = ExportTarget::Disabled;

    let report = fixture.command(config).execute().await.unwrap();

    assert_eq!(report.serial, "emulator-5556");
    assert!(!report.waited_for_boot);
    assert!(!fixture.path("serial.env").exists());
}

#[tokio::test]
async fn test_missing_avd_fails_before_launch() {
    let fixture = Fixture::new(true, "exec sleep 5");

    let result = fixture.command(fixture.config("other_avd")).execute().await;

    match result {
        Err(EmuBootError::Avd(msg)) => assert!(msg.contains("other_avd")),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(!fixture.path("logs/emulator.log").exists());
}

#[tokio::test]
async fn test_crashing_emulator_fails_the_step() {
    let fixture = Fixture::new(true, "echo \"PANIC: Broken AVD system path\" >&2\nexit 1");

    let result = fixture.command(fixture.config("ci_avd")).execute().await;

    match result {
        Err(EmuBootError::Emulator(msg)) => assert!(msg.contains("exit code 1")),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(!fixture.path("serial.env").exists());
    assert!(!fixture.path("report.json").exists());
}

#[tokio::test]
async fn test_boot_timeout_fails_the_step() {
    let fixture = Fixture::new(false, "exec sleep 5");

    let mut config = fixture.config("ci_avd");
    config.boot_timeout = Duration::from_millis(400);

    let result = fixture.command(config).execute().await;
    assert!(matches!(result, Err(EmuBootError::Timeout(_))));
}

#[tokio::test]
async fn test_export_failure_only_warns() {
    let fixture = Fixture::new(true, "exec sleep 5");
    std::fs::write(fixture.path("blocker"), "").unwrap();

    let mut config = fixture.config("ci_avd");
    config.export = ExportTarget::EnvFile(fixture.path("blocker/serial.env"));

    let report = fixture.command(config).execute().await.unwrap();

    assert_eq!(report.serial, "emulator-5556");
    assert!(fixture.path("report.json").exists());
}

#[tokio::test]
async fn test_bad_emulator_options_fail_before_adb() {
    let fixture = Fixture::new(true, "exec sleep 5");

    let mut config = fixture.config("ci_avd");
    config.emulator_options = "-no-window -prop \"unterminated".into();

    let result = fixture.command(config).execute().await;

    assert!(matches!(result, Err(EmuBootError::Config(_))));
    assert!(!fixture.path("adb-polls").exists());
    assert!(!fixture.path("logs/emulator.log").exists());
}
