//! Boot wait, SSH probe and container cleanup against scripted fakes

mod common;

use common::*;
use mender_test_env::{
    BootBanner, ContainerId, Error, probe_ssh_connection, setup_test_container,
    wait_for_container_boot,
};
use std::sync::Arc;

#[smol_potat::test]
async fn test_boot_detected_once_banner_appears() {
    let runtime = FakeRuntime::with_logs(&[
        "",
        "[    0.000000] Linux version 4.18\n",
        BANNER_LOGS,
    ]);

    let ready = wait_for_container_boot(
        &runtime,
        &ContainerId::new("c0ffee"),
        &BootBanner::default(),
        &quick_poller().sleep_before_each_check(),
    )
    .await
    .unwrap();

    assert!(ready);
    assert_eq!(runtime.log_calls(), 3);
}

#[smol_potat::test]
async fn test_boot_wait_times_out() {
    let runtime = FakeRuntime::with_logs(&["Starting kernel ...\n"]);

    let ready = wait_for_container_boot(
        &runtime,
        &ContainerId::new("c0ffee"),
        &BootBanner::default(),
        &expiring_poller(),
    )
    .await
    .unwrap();

    assert!(!ready);
    assert!(runtime.log_calls() >= 1);
}

#[smol_potat::test]
async fn test_setup_runs_versioned_image() {
    let runtime = Arc::new(FakeRuntime::with_logs(&[BANNER_LOGS]));

    let container = setup_test_container(
        runtime.clone(),
        test_props(),
        "2.1.0",
        &BootBanner::default(),
        &quick_poller(),
    )
    .await
    .unwrap();

    assert_eq!(runtime.started(), vec!["mendersoftware/mender-client-qemu:2.1.0"]);
    assert_eq!(container.props().container_id, Some(ContainerId::new("c0ffee")));
    assert!(runtime.stopped().is_empty());

    container.teardown().await.unwrap();
    // Teardown stops exactly once; the guard does not stop again on drop
    assert_eq!(runtime.stopped(), vec![ContainerId::new("c0ffee")]);
}

#[smol_potat::test]
async fn test_boot_timeout_stops_container() {
    let runtime = Arc::new(FakeRuntime::with_logs(&["U-Boot 2018.07\n"]));

    let result = setup_test_container(
        runtime.clone(),
        test_props(),
        "master",
        &BootBanner::default(),
        &expiring_poller(),
    )
    .await;

    assert!(matches!(result, Err(Error::BootTimeout)));
    assert_eq!(
        result.err().map(|e| e.to_string()).as_deref(),
        Some("Image did not boot. Aborting")
    );
    assert_eq!(runtime.stopped(), vec![ContainerId::new("c0ffee")]);
}

#[smol_potat::test]
async fn test_dropped_container_is_stopped() {
    let runtime = Arc::new(FakeRuntime::with_logs(&[BANNER_LOGS]));

    let container = setup_test_container(
        runtime.clone(),
        test_props(),
        "master",
        &BootBanner::default(),
        &quick_poller(),
    )
    .await
    .unwrap();
    drop(container);

    assert_eq!(runtime.stopped(), vec![ContainerId::new("c0ffee")]);
}

#[smol_potat::test]
async fn test_probe_stops_at_first_success() {
    let shell = FakeShell::default();

    let ready = probe_ssh_connection(&shell, &quick_poller()).await.unwrap();

    assert!(ready);
    assert_eq!(shell.probe_attempts(), 1);
}

#[smol_potat::test]
async fn test_probe_retries_transient_transport_errors() {
    let shell = FakeShell::with_probe_errors(&[
        "kex_exchange_identification: read: Connection reset by peer",
        "kex_exchange_identification: Connection closed by remote host",
        "Connection timed out during banner exchange",
    ]);

    let ready = probe_ssh_connection(&shell, &quick_poller()).await.unwrap();

    assert!(ready);
    assert_eq!(shell.probe_attempts(), 4);
}

#[smol_potat::test]
async fn test_probe_fails_fast_on_other_transport_errors() {
    let shell = FakeShell::with_probe_errors(&[
        "ssh: connect to host localhost port 8822: Connection refused",
    ]);

    let result = probe_ssh_connection(&shell, &quick_poller()).await;

    match result {
        Err(Error::Transport { message }) => assert!(message.ends_with("Connection refused")),
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(shell.probe_attempts(), 1);
}

#[smol_potat::test]
async fn test_probe_times_out_on_failing_command() {
    let shell = FakeShell {
        probe_exit: 1,
        ..FakeShell::default()
    };

    let ready = probe_ssh_connection(&shell, &expiring_poller()).await.unwrap();

    assert!(!ready);
    assert!(shell.probe_attempts() >= 1);
}
