//! Updater behaviour against an in-memory host.

use async_trait::async_trait;
use mcd_exec::{CommandExecutor, ExecError, ExecOutput};
use mcd_flags::{FlagAssignment, FlagOutcome, FlagUpdater, Phase, ReloadTrigger, UpdateError};
use mcd_test_utils::{FakeHost, UnitState, DEBIAN_MEMCACHED_CONF};
use mockall::mock;
use mockall::predicate::eq;
use pretty_assertions::assert_eq;

const CONF: &str = "/etc/memcached.conf";

fn updater() -> FlagUpdater {
    FlagUpdater::new(CONF).with_label_prefix("memcached-tune")
}

fn reload() -> ReloadTrigger {
    ReloadTrigger::systemctl_restart("memcached", true)
}

fn tuning(memory: u32, port: u16, listen: &str) -> Vec<FlagAssignment> {
    vec![
        FlagAssignment::new("-m", memory),
        FlagAssignment::new("-p", port),
        FlagAssignment::new("-l", listen),
    ]
}

#[tokio::test]
async fn scenario_replace_and_append() {
    let host = FakeHost::new().with_file(CONF, "-m 64\n-p 11211\n");
    let assignments = [FlagAssignment::new("-m", 256), FlagAssignment::new("-l", "0.0.0.0")];

    let report = updater().apply(&assignments, &reload(), &host).await.unwrap();

    assert_eq!(host.file_lines(CONF), vec!["-m 256", "-p 11211", "-l 0.0.0.0"]);
    assert_eq!(report.replaced(), 1);
    assert_eq!(report.appended(), 1);
}

#[tokio::test]
async fn idempotent_across_calls() {
    let host = FakeHost::new().with_file(CONF, DEBIAN_MEMCACHED_CONF);
    let assignments = tuning(512, 11311, "0.0.0.0");

    updater().apply(&assignments, &reload(), &host).await.unwrap();
    let first = host.file(CONF).unwrap();

    let report = updater().apply(&assignments, &reload(), &host).await.unwrap();
    let second = host.file(CONF).unwrap();

    assert_eq!(first, second);
    assert!(!report.changed());
    assert!(report
        .outcomes
        .iter()
        .all(|(_, o)| matches!(o, FlagOutcome::Unchanged { .. })));
}

#[tokio::test]
async fn unchanged_flags_issue_no_writes() {
    let host = FakeHost::new().with_file(CONF, "-m 64\n");
    updater()
        .apply(&[FlagAssignment::new("-m", 64)], &reload(), &host)
        .await
        .unwrap();

    assert_eq!(
        host.labels(),
        vec!["memcached-tune-read-m", "memcached-restart"]
    );
}

#[tokio::test]
async fn unrelated_lines_keep_their_position() {
    let original = "# keep me\n-m 64\n-c 1024\n\n-v\n";
    let host = FakeHost::new().with_file(CONF, original);

    updater()
        .apply(&tuning(128, 12000, "10.0.0.1"), &reload(), &host)
        .await
        .unwrap();

    assert_eq!(
        host.file(CONF).unwrap(),
        "# keep me\n-m 128\n-c 1024\n\n-v\n-p 12000\n-l 10.0.0.1\n"
    );
}

#[tokio::test]
async fn empty_file_gets_three_lines_and_one_reload() {
    let host = FakeHost::new()
        .with_file(CONF, "")
        .with_unit("memcached", UnitState::default());

    updater()
        .apply(&tuning(128, 12000, "0.0.0.0"), &reload(), &host)
        .await
        .unwrap();

    assert_eq!(host.file_lines(CONF), vec!["-m 128", "-p 12000", "-l 0.0.0.0"]);
    assert_eq!(host.count_containing("systemctl restart"), 1);
    assert_eq!(host.labels().last().map(String::as_str), Some("memcached-restart"));
    assert!(host.unit("memcached").active);
}

#[tokio::test]
async fn unterminated_last_line_stays_separate() {
    let host = FakeHost::new().with_file(CONF, "-d");
    updater()
        .apply(&[FlagAssignment::new("-p", 11211)], &reload(), &host)
        .await
        .unwrap();
    assert_eq!(host.file(CONF).unwrap(), "-d\n-p 11211\n");
}

#[tokio::test]
async fn hand_edited_duplicates_collapse() {
    let host = FakeHost::new().with_file(CONF, "-m 64\n-p 1\n-m 32\n");
    updater()
        .apply(&[FlagAssignment::new("-m", 256)], &reload(), &host)
        .await
        .unwrap();
    assert_eq!(host.file_lines(CONF), vec!["-m 256", "-p 1"]);
}

#[tokio::test]
async fn missing_file_fails_at_read() {
    let host = FakeHost::new();
    let err = updater()
        .apply(&tuning(64, 11211, "127.0.0.1"), &reload(), &host)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Read);
    assert_eq!(err.flag(), Some("-m"));
    assert_eq!(host.count_containing("systemctl"), 0);
}

#[tokio::test]
async fn failure_reports_flag_and_phase_and_keeps_earlier_flags() {
    let host = FakeHost::new()
        .with_file(CONF, "-m 64\n-p 11211\n")
        .fail_label("memcached-tune-append-l", "tee: /etc/memcached.conf: Read-only file system");

    let err = updater()
        .apply(&tuning(256, 12000, "0.0.0.0"), &reload(), &host)
        .await
        .unwrap_err();

    match &err {
        UpdateError::Step { flag, phase, path, .. } => {
            assert_eq!(flag, "-l");
            assert_eq!(*phase, Phase::Append);
            assert_eq!(path, CONF);
        }
        other => panic!("expected step error, got {other:?}"),
    }
    assert_eq!(host.file_lines(CONF), vec!["-m 256", "-p 12000"]);
    assert_eq!(host.count_containing("systemctl"), 0);
}

#[tokio::test]
async fn writes_without_sudo_are_rejected_on_root_owned_file() {
    let host = FakeHost::new()
        .with_file(CONF, "-m 64\n")
        .with_root_owned(CONF);

    let err = updater()
        .with_sudo(false)
        .apply(&[FlagAssignment::new("-m", 128)], &reload(), &host)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Replace);
    assert_eq!(host.file(CONF).unwrap(), "-m 64\n");
}

#[tokio::test]
async fn failed_decode_leaves_file_untouched() {
    let host = FakeHost::new()
        .with_file(CONF, DEBIAN_MEMCACHED_CONF)
        .with_broken_program("base64");

    let err = updater()
        .apply(&[FlagAssignment::new("-m", 128)], &reload(), &host)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Replace);
    assert_eq!(err.flag(), Some("-m"));
    assert_eq!(host.file(CONF).unwrap(), DEBIAN_MEMCACHED_CONF);
    assert_eq!(host.count_containing("systemctl"), 0);
}

#[tokio::test]
async fn crlf_file_keeps_its_line_endings() {
    let host = FakeHost::new().with_file(CONF, "# conf\r\n-m 64\r\n-p 11211\r\n");

    updater()
        .apply(
            &[FlagAssignment::new("-m", 256), FlagAssignment::new("-l", "0.0.0.0")],
            &reload(),
            &host,
        )
        .await
        .unwrap();

    assert_eq!(
        host.file(CONF).unwrap(),
        "# conf\r\n-m 256\r\n-p 11211\r\n-l 0.0.0.0\r\n"
    );
}

#[tokio::test]
async fn reload_failure_is_reported_after_writes() {
    let host = FakeHost::new()
        .with_file(CONF, "")
        .fail_label("memcached-restart", "Job for memcached.service failed");

    let err = updater()
        .apply(&[FlagAssignment::new("-m", 128)], &reload(), &host)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Reload);
    assert_eq!(err.flag(), None);
    assert_eq!(host.file_lines(CONF), vec!["-m 128"]);
}

#[tokio::test]
async fn empty_assignment_set_still_reloads_once() {
    let host = FakeHost::new().with_file(CONF, "-m 64\n");
    let report = updater().apply(&[], &reload(), &host).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(host.labels(), vec!["memcached-restart"]);
}

mock! {
    Remote {}

    #[async_trait]
    impl CommandExecutor for Remote {
        async fn exec(&self, command: &str, label: &str) -> Result<ExecOutput, ExecError>;
    }
}

#[tokio::test]
async fn connection_loss_aborts_without_retry() {
    let mut remote = MockRemote::new();
    remote
        .expect_exec()
        .with(eq("sudo cat /etc/memcached.conf"), eq("memcached-tune-read-m"))
        .times(1)
        .returning(|_, label| {
            Err(ExecError::Connection {
                label: label.to_string(),
                message: "Connection reset by peer".to_string(),
            })
        });

    let err = updater()
        .apply(&tuning(64, 11211, "127.0.0.1"), &reload(), &remote)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Read);
    assert!(err.exec_error().is_transport());
}
