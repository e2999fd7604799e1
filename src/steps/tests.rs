//! Unit tests for the individual build steps.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::client::{BootSource, ClientError};
use crate::config::BuildConfig;
use crate::pipeline::{BuildError, BuildState, CleanupWarning, Step};
use crate::ssh::{RemoteSession, SshAuth};
use crate::test_support::{
    FAKE_DEFAULT_PASSWORD, FAKE_KEY_ID, FAKE_SERVER_ID, FAKE_SERVER_IP, FAKE_SNAPSHOT_ID,
    FakeClient, FakeCommunicator, FakeSession, Operation, RecordingHook, TEST_PRIVATE_KEY,
    build_config,
};

const TICK: Duration = Duration::from_millis(1);

fn api_error() -> ClientError {
    ClientError::Api {
        status: 500,
        message: String::from("boom"),
    }
}

fn state_with(client: FakeClient, config: BuildConfig) -> BuildState<FakeClient> {
    BuildState::new(Arc::new(config), Arc::new(client)).with_poll_interval(TICK)
}

#[fixture]
fn created() -> BuildState<FakeClient> {
    let mut state = state_with(FakeClient::new(), build_config());
    state.put_server_id(FAKE_SERVER_ID);
    state
}

async fn run_step<S: Step<FakeClient>>(
    step: &mut S,
    state: &mut BuildState<FakeClient>,
) -> Result<(), BuildError> {
    step.run(state).await
}

#[tokio::test]
async fn create_server_uses_configured_request() {
    let mut state = state_with(FakeClient::new(), build_config());
    let mut step = CreateServer::new();

    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(state.server_id(), Some(FAKE_SERVER_ID));
    let client = state.client();
    assert!(!client.called("create_ssh_key"));
    let requests = client.server_requests();
    let request = requests
        .first()
        .unwrap_or_else(|| panic!("a server request should be recorded"));
    assert_eq!(request.region, "Atlanta");
    assert_eq!(request.plan, "vc2-1c-1gb");
    assert_eq!(
        request.boot,
        BootSource::Os {
            label: String::from("Debian 12 x64 (bookworm)")
        }
    );
    assert_eq!(request.ssh_key_id, None);
    assert!(request.label.starts_with("kiln-"));
}

#[tokio::test]
async fn create_server_registers_private_key_first() {
    let config = BuildConfig {
        ssh_private_key: Some(String::from(TEST_PRIVATE_KEY)),
        ..build_config()
    };
    let mut state = state_with(FakeClient::new(), config);
    let mut step = CreateServer::new();

    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    let client = state.client();
    let calls = client.calls();
    assert!(calls.first().is_some_and(|call| call.starts_with("create_ssh_key kiln-")));
    assert_eq!(
        client
            .server_requests()
            .first()
            .and_then(|request| request.ssh_key_id.clone()),
        Some(String::from(FAKE_KEY_ID))
    );
}

#[tokio::test]
async fn create_server_failure_removes_uploaded_key() {
    let config = BuildConfig {
        ssh_private_key: Some(String::from(TEST_PRIVATE_KEY)),
        ..build_config()
    };
    let client = FakeClient::new().failing(Operation::CreateServer, api_error());
    let mut state = state_with(client, config);
    let mut step = CreateServer::new();

    let err = run_step(&mut step, &mut state)
        .await
        .expect_err("create should fail");

    assert_eq!(
        err,
        BuildError::Remote {
            action: "create server",
            source: api_error()
        }
    );
    assert!(state.client().called("delete_ssh_key key-1"));
    assert_eq!(state.server_id(), None);
}

#[tokio::test]
async fn create_server_cleanup_destroys_server_and_key() {
    let config = BuildConfig {
        ssh_private_key: Some(String::from(TEST_PRIVATE_KEY)),
        ..build_config()
    };
    let mut state = state_with(FakeClient::new(), config);
    let mut step = CreateServer::new();
    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    step.cleanup(&mut state)
        .await
        .unwrap_or_else(|err| panic!("cleanup should succeed: {err}"));

    let client = state.client();
    assert!(client.called("delete_server srv-1"));
    assert!(client.called("delete_ssh_key key-1"));
    assert!(state.warnings().is_empty());
}

#[tokio::test]
async fn failed_server_deletion_asks_for_manual_intervention() {
    let client = FakeClient::new().failing(Operation::DeleteServer, api_error());
    let mut state = state_with(client, build_config());
    let mut step = CreateServer::new();
    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    step.cleanup(&mut state)
        .await
        .unwrap_or_else(|err| panic!("cleanup never fails: {err}"));

    let warnings: Vec<CleanupWarning> = state.warnings().to_vec();
    assert_eq!(warnings.len(), 1);
    let message = warnings
        .first()
        .map(|warning| warning.message.clone())
        .unwrap_or_default();
    assert!(message.contains(FAKE_SERVER_ID), "message: {message}");
    assert!(message.contains("manually"), "message: {message}");
}

#[rstest]
#[tokio::test]
async fn wait_for_server_records_address_and_password(mut created: BuildState<FakeClient>) {
    run_step(&mut WaitForServer, &mut created)
        .await
        .unwrap_or_else(|err| panic!("server should become active: {err}"));

    assert_eq!(created.server_ip(), Some(FAKE_SERVER_IP));
    assert_eq!(created.default_password(), Some(FAKE_DEFAULT_PASSWORD));
    let polls = created
        .client()
        .calls()
        .iter()
        .filter(|call| call.starts_with("server_info"))
        .count();
    assert_eq!(polls, 2);
}

#[rstest]
#[case::short(Duration::from_millis(20))]
#[case::zero(Duration::ZERO)]
#[tokio::test]
async fn wait_for_server_times_out(#[case] timeout: Duration) {
    let config = BuildConfig {
        state_timeout: timeout,
        ..build_config()
    };
    let mut state = state_with(FakeClient::new().never_active(), config);
    state.put_server_id(FAKE_SERVER_ID);

    let err = run_step(&mut WaitForServer, &mut state)
        .await
        .expect_err("server never becomes active");

    assert_eq!(
        err,
        BuildError::StateTimeout {
            waiting_for: "server to become active",
            timeout
        }
    );
    if timeout.is_zero() {
        assert!(state.client().calls().is_empty());
    }
}

#[tokio::test]
async fn wait_for_server_requires_a_server_id() {
    let mut state = state_with(FakeClient::new(), build_config());
    let err = run_step(&mut WaitForServer, &mut state)
        .await
        .expect_err("no server was created");
    assert_eq!(err, BuildError::MissingState { key: "server_id" });
}

fn reachable(config: BuildConfig) -> BuildState<FakeClient> {
    let mut state = state_with(FakeClient::new(), config);
    state.put_server_id(FAKE_SERVER_ID);
    state.put_server_ip(FAKE_SERVER_IP);
    state.put_default_password(FAKE_DEFAULT_PASSWORD);
    state
}

#[tokio::test]
async fn connect_retries_until_ssh_answers() {
    let mut state = reachable(build_config());
    let communicator = Arc::new(FakeCommunicator::new(FakeSession::new()).refusing(2));
    let mut step = Connect::new(communicator.clone());

    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("connect should succeed: {err}"));

    let attempts = communicator.attempts();
    assert_eq!(attempts.len(), 3);
    let (address, credentials) = attempts
        .first()
        .cloned()
        .unwrap_or_else(|| panic!("an attempt should be recorded"));
    assert_eq!(address, SocketAddr::new(FAKE_SERVER_IP, 22));
    assert_eq!(
        credentials.auth,
        SshAuth::Password(String::from(FAKE_DEFAULT_PASSWORD))
    );
    assert!(state.session().is_some());
}

#[tokio::test]
async fn connect_uses_private_key_for_custom_boot() {
    let config = BuildConfig {
        ipxe_url: Some(String::from("https://boot.example/chain.ipxe")),
        ssh_private_key: Some(String::from(TEST_PRIVATE_KEY)),
        ..build_config()
    };
    let mut state = reachable(config);
    let communicator = Arc::new(FakeCommunicator::new(FakeSession::new()));
    let mut step = Connect::new(communicator.clone());

    run_step(&mut step, &mut state)
        .await
        .unwrap_or_else(|err| panic!("connect should succeed: {err}"));

    assert!(communicator.attempts().iter().all(|(_, credentials)| {
        credentials.auth == SshAuth::PrivateKey(String::from(TEST_PRIVATE_KEY))
    }));
}

#[tokio::test]
async fn connect_times_out_with_the_last_error() {
    let config = BuildConfig {
        ssh_timeout: Duration::from_millis(20),
        ..build_config()
    };
    let mut state = reachable(config);
    let communicator = Arc::new(FakeCommunicator::new(FakeSession::new()).unreachable());
    let mut step = Connect::new(communicator);

    let err = run_step(&mut step, &mut state)
        .await
        .expect_err("ssh never answers");

    match err {
        BuildError::ConnectTimeout {
            address,
            last_error,
            ..
        } => {
            assert_eq!(address, "203.0.113.10:22");
            assert!(last_error.contains("connection refused"), "last: {last_error}");
        }
        other => panic!("expected a connect timeout, got {other}"),
    }
}

#[tokio::test]
async fn connect_rejects_bad_keys_without_retrying() {
    let config = BuildConfig {
        os_snapshot: Some(String::from("snap-0")),
        ssh_private_key: Some(String::from("not a key")),
        ..build_config()
    };
    let mut state = reachable(config);
    let communicator = Arc::new(FakeCommunicator::new(FakeSession::new()));
    let mut step = Connect::new(communicator.clone());

    let err = run_step(&mut step, &mut state)
        .await
        .expect_err("key should not parse");

    assert!(matches!(err, BuildError::KeyParse { .. }), "got {err}");
    assert!(communicator.attempts().is_empty());
}

#[tokio::test]
async fn provision_failure_is_reported() {
    let mut state = reachable(build_config());
    state.put_session(Box::new(FakeSession::new()));
    let mut step = Provision::new(Arc::new(RecordingHook::failing("apt exploded")));

    let err = run_step(&mut step, &mut state)
        .await
        .expect_err("hook fails");

    assert_eq!(
        err,
        BuildError::Provision {
            message: String::from("apt exploded")
        }
    );
}

#[tokio::test]
async fn shutdown_gives_up_on_a_hung_command() {
    let config = BuildConfig {
        state_timeout: Duration::from_millis(20),
        ..build_config()
    };
    let mut state = reachable(config);
    let session = FakeSession::new().hanging_on("shutdown -P now");
    state.put_session(Box::new(session.clone()));

    run_step(&mut Shutdown, &mut state)
        .await
        .unwrap_or_else(|err| panic!("shutdown never fails: {err}"));

    assert_eq!(session.commands(), vec!["shutdown -P now"]);
    assert!(state.session().is_none());
}

#[tokio::test]
async fn shutdown_consumes_the_session_and_ignores_failures() {
    let mut state = reachable(build_config());
    let session = FakeSession::new().with_exit_status("shutdown -P now", 255);
    let session_box: Box<dyn RemoteSession> = Box::new(session.clone());
    state.put_session(session_box);

    run_step(&mut Shutdown, &mut state)
        .await
        .unwrap_or_else(|err| panic!("shutdown never fails: {err}"));

    assert_eq!(session.commands(), vec!["shutdown -P now"]);
    assert!(state.session().is_none());
}

#[rstest]
#[tokio::test]
async fn halt_waits_for_the_server_to_stop(mut created: BuildState<FakeClient>) {
    run_step(&mut Halt, &mut created)
        .await
        .unwrap_or_else(|err| panic!("halt should succeed: {err}"));

    let calls = created.client().calls();
    assert_eq!(
        calls,
        vec![
            String::from("halt_server srv-1"),
            String::from("server_info srv-1"),
            String::from("server_info srv-1")
        ]
    );
}

#[rstest]
#[case::short(Duration::from_millis(20))]
#[case::zero(Duration::ZERO)]
#[tokio::test]
async fn halt_times_out_when_the_server_keeps_running(#[case] timeout: Duration) {
    let config = BuildConfig {
        state_timeout: timeout,
        ..build_config()
    };
    let mut state = state_with(FakeClient::new().never_stops(), config);
    state.put_server_id(FAKE_SERVER_ID);

    let err = run_step(&mut Halt, &mut state)
        .await
        .expect_err("server never stops");

    assert_eq!(
        err,
        BuildError::StateTimeout {
            waiting_for: "server to power off",
            timeout
        }
    );
    assert!(state.client().called("halt_server srv-1"));
}

#[tokio::test]
async fn halt_errors_are_remote_errors() {
    let mut state = state_with(
        FakeClient::new().failing(Operation::HaltServer, api_error()),
        build_config(),
    );
    state.put_server_id(FAKE_SERVER_ID);

    let err = run_step(&mut Halt, &mut state)
        .await
        .expect_err("halt fails");

    assert_eq!(
        err,
        BuildError::Remote {
            action: "halt server",
            source: api_error()
        }
    );
}

#[rstest]
#[tokio::test]
async fn snapshot_records_id_and_rendered_name(mut created: BuildState<FakeClient>) {
    run_step(&mut Snapshot, &mut created)
        .await
        .unwrap_or_else(|err| panic!("snapshot should succeed: {err}"));

    assert_eq!(created.snapshot_id(), Some(FAKE_SNAPSHOT_ID));
    assert_eq!(
        created.require_snapshot_name(),
        Ok(String::from("kiln-1712345678"))
    );
    assert!(
        created
            .client()
            .called("create_snapshot srv-1 kiln-1712345678")
    );
}

#[rstest]
#[case::short(Duration::from_millis(20))]
#[case::zero(Duration::ZERO)]
#[tokio::test]
async fn snapshot_times_out_and_reports_the_orphan(#[case] timeout: Duration) {
    let config = BuildConfig {
        state_timeout: timeout,
        ..build_config()
    };
    let mut state = state_with(FakeClient::new().snapshot_never_completes(), config);
    state.put_server_id(FAKE_SERVER_ID);

    let err = run_step(&mut Snapshot, &mut state)
        .await
        .expect_err("snapshot never completes");

    assert_eq!(
        err,
        BuildError::StateTimeout {
            waiting_for: "snapshot to complete",
            timeout
        }
    );
    assert_eq!(state.snapshot_id(), None);
    assert_eq!(
        state.warnings(),
        [CleanupWarning::new(
            "snapshot",
            "snapshot snap-1 did not complete; delete it manually"
        )]
    );
}

#[tokio::test]
async fn snapshot_query_errors_are_remote_errors() {
    let mut state = state_with(
        FakeClient::new().failing(Operation::SnapshotInfo, api_error()),
        build_config(),
    );
    state.put_server_id(FAKE_SERVER_ID);

    let err = run_step(&mut Snapshot, &mut state)
        .await
        .expect_err("snapshot query fails");

    assert_eq!(
        err,
        BuildError::Remote {
            action: "query snapshot",
            source: api_error()
        }
    );
    assert_eq!(state.warnings().len(), 1);
    assert!(
        state
            .warnings()
            .iter()
            .all(|warning| warning.message.contains(FAKE_SNAPSHOT_ID))
    );
    assert!(!state.client().called("delete_snapshot"));
}
