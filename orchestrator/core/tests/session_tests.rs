// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for interactive sessions

use insta_core::application::{LifecycleOrchestrator, SessionBridge};
use insta_core::domain::backend::SessionIo;
use insta_core::domain::error::OrchestratorError;
use insta_core::domain::lifecycle::SessionRequest;
use insta_core::domain::project::Project;
use insta_core::domain::topology::TopologyLoader;
use insta_core::infrastructure::{BackendCall, ComposeTopologyLoader, InMemoryBackend};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const WEB_STACK: &str = r#"
name: shop
services:
  web:
    image: nginx:1.27
  web-data:
    image: busybox
  web-init:
    image: busybox
"#;

fn setup() -> (Project, InMemoryBackend, SessionBridge) {
    let project = ComposeTopologyLoader::new()
        .load(WEB_STACK, Path::new("/srv/shop"), None)
        .unwrap();
    let backend = InMemoryBackend::new();
    let bridge = SessionBridge::new(Arc::new(backend.clone()));
    (project, backend, bridge)
}

fn null_io() -> SessionIo {
    SessionIo::new(tokio::io::empty(), tokio::io::sink(), tokio::io::sink())
}

#[tokio::test]
async fn test_attach_streams_output_and_exit_code() {
    let (project, backend, bridge) = setup();
    backend.mark_running("shop", "web");
    backend.script_exec("nginx -t", "configuration file test is successful\n", 3);

    let (stdout_writer, mut stdout_reader) = tokio::io::duplex(1024);
    let io = SessionIo::new(tokio::io::empty(), stdout_writer, tokio::io::sink());
    let request = SessionRequest::new("web", "nginx -t").with_env("LANG", "C");

    let result = bridge
        .attach(&project, request, io, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());

    let mut captured = String::new();
    stdout_reader.read_to_string(&mut captured).await.unwrap();
    assert_eq!(captured, "configuration file test is successful\n");
    assert_eq!(backend.open_sessions(), 0);

    let exec = backend
        .calls()
        .into_iter()
        .find_map(|call| match call {
            BackendCall::OpenExec { options, .. } => Some(options),
            _ => None,
        })
        .expect("an exec should have been opened");
    assert!(exec.tty);
    assert_eq!(exec.env.get("LANG").map(String::as_str), Some("C"));
}

#[tokio::test]
async fn test_attach_writes_exactly_the_command_output() {
    let (project, backend, bridge) = setup();
    backend.mark_running("shop", "web");
    backend.script_exec("cat /etc/hostname", "shop-web-1\n", 0);

    // the mock panics on drop if the expected write never happened
    let stdout = tokio_test::io::Builder::new().write(b"shop-web-1\n").build();
    let io = SessionIo::new(tokio::io::empty(), stdout, tokio::io::sink());

    let result = bridge
        .attach(
            &project,
            SessionRequest::new("web", "cat /etc/hostname").with_tty(false),
            io,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success());
}

#[tokio::test]
async fn test_attach_to_stopped_service_is_not_running() {
    let (project, backend, bridge) = setup();
    let orchestrator = LifecycleOrchestrator::new(Arc::new(backend.clone()));
    orchestrator
        .bring_up(&project, &["web".to_string()], &CancellationToken::new())
        .await
        .unwrap();

    let err = bridge
        .attach(
            &project,
            SessionRequest::new("web-data", "echo hi"),
            null_io(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        OrchestratorError::ServiceNotRunning { project, service } => {
            assert_eq!(project, "shop");
            assert_eq!(service, "web-data");
        }
        other => panic!("expected ServiceNotRunning, got {:?}", other),
    }
    // attaching never starts anything
    assert_eq!(backend.running("shop"), vec!["web"]);
    assert!(!backend
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::OpenExec { .. })));
}

#[tokio::test]
async fn test_attach_unknown_service_is_not_found() {
    let (project, backend, bridge) = setup();

    let err = bridge
        .attach(
            &project,
            SessionRequest::new("payments", "sh"),
            null_io(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ServiceNotFoundError");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_attach_releases_exec_context() {
    let (project, backend, bridge) = setup();
    backend.mark_running("shop", "web");
    backend.hang_exec(true);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        bridge.attach(&project, SessionRequest::new("web", "tail -f /dev/null"), null_io(), &cancel),
    )
    .await
    .expect("attach should return once cancelled");

    assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    assert_eq!(backend.open_sessions(), 0);
}

#[tokio::test]
async fn test_backend_loss_during_attach() {
    let (project, backend, bridge) = setup();
    backend.mark_running("shop", "web");
    backend.set_unavailable(true);

    let err = bridge
        .attach(&project, SessionRequest::new("web", "sh"), null_io(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::BackendUnavailable(_)));
    assert_eq!(backend.open_sessions(), 0);
}
