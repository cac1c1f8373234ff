//! Tests for the poll loop's claim and response semantics.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};

use deaddrop_config::Config;
use deaddrop_protocol::{
    Capabilities, CommandId, CommandRequest, CommandResponse, DropPaths, atomic_write,
};

use super::reaper::Reaper;
use super::{MonitorLoop, StatusWriter};
use crate::dispatch::{Dispatcher, HandlerError};

struct Harness {
    _dir: tempfile::TempDir,
    paths: DropPaths,
    monitor: MonitorLoop,
    invocations: Arc<AtomicUsize>,
    order: Arc<std::sync::Mutex<Vec<String>>>,
}

#[fixture]
fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = Config {
        drop_dir: camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("utf8 temp dir"),
        poll_interval_ms: 10,
        heartbeat_interval_ms: 10,
        ..Config::default()
    };

    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let order: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
    let seen = Arc::clone(&order);

    let mut dispatcher = Dispatcher::new();
    dispatcher.register("echo", move |params: &Map<String, Value>| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(Value::String(text)) = params.get("text") {
            seen.lock().expect("order lock").push(text.clone());
        }
        Ok(params.get("text").cloned().unwrap_or(Value::Null))
    });
    dispatcher.register("broken", |_params: &Map<String, Value>| {
        Err(HandlerError::failed("no active document"))
    });
    dispatcher.register("explode", |_params: &Map<String, Value>| -> Result<Value, HandlerError> {
        panic!("handler blew up")
    });

    let paths = DropPaths::new(dir.path());
    let monitor = MonitorLoop::new(&config, Arc::new(dispatcher), Capabilities::default());
    Harness {
        _dir: dir,
        paths,
        monitor,
        invocations,
        order,
    }
}

fn write_request(paths: &DropPaths, id: &CommandId, command: &str, params: Map<String, Value>) {
    let request = CommandRequest::new(command, params);
    atomic_write(&paths.command(id), &request.encode().expect("encode")).expect("write request");
}

fn text_params(text: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("text".to_owned(), json!(text));
    params
}

fn read_response(paths: &DropPaths, id: &CommandId) -> CommandResponse {
    let bytes = fs::read(paths.response(id)).expect("response file");
    CommandResponse::decode(&bytes).expect("decode response")
}

fn id(token: &str) -> CommandId {
    CommandId::from_token(token).expect("test id")
}

#[rstest]
fn round_trip_writes_response_and_claims_request(mut harness: Harness) {
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "echo", text_params("hi"));

    harness.monitor.cycle();

    assert_eq!(
        read_response(&harness.paths, &request_id),
        CommandResponse::Result(json!("hi"))
    );
    assert!(harness.paths.processed(&request_id).exists());
    assert!(!harness.paths.command(&request_id).exists());
    assert_eq!(harness.invocations.load(Ordering::SeqCst), 1);
}

#[rstest]
fn requests_are_processed_in_name_order(mut harness: Harness) {
    let second = id("200_bbbb");
    let first = id("100_aaaa");
    write_request(&harness.paths, &second, "echo", text_params("second"));
    write_request(&harness.paths, &first, "echo", text_params("first"));

    harness.monitor.cycle();

    assert_eq!(
        read_response(&harness.paths, &first),
        CommandResponse::Result(json!("first"))
    );
    assert_eq!(
        read_response(&harness.paths, &second),
        CommandResponse::Result(json!("second"))
    );
    assert_eq!(harness.invocations.load(Ordering::SeqCst), 2);
    let seen = harness.order.lock().expect("order lock");
    assert_eq!(*seen, vec!["first".to_owned(), "second".to_owned()]);
}

#[rstest]
fn existing_processed_marker_suppresses_reinvocation(mut harness: Harness) {
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "echo", text_params("hi"));
    fs::write(harness.paths.processed(&request_id), b"{}").expect("marker");

    harness.monitor.cycle();

    assert_eq!(harness.invocations.load(Ordering::SeqCst), 0);
    assert!(!harness.paths.response(&request_id).exists());
}

#[rstest]
fn existing_response_suppresses_reinvocation(mut harness: Harness) {
    // Crash window: response written, rename to processed never happened.
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "echo", text_params("hi"));
    fs::write(harness.paths.response(&request_id), b"{\"result\": \"hi\"}").expect("response");

    harness.monitor.cycle();

    assert_eq!(harness.invocations.load(Ordering::SeqCst), 0);
}

#[rstest]
fn repeated_cycles_invoke_each_request_at_most_once(mut harness: Harness) {
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "echo", text_params("hi"));

    harness.monitor.cycle();
    harness.monitor.cycle();
    harness.monitor.cycle();

    assert_eq!(harness.invocations.load(Ordering::SeqCst), 1);
}

#[rstest]
fn malformed_request_is_marked_bad_and_never_retried(mut harness: Harness) {
    let request_id = id("100_aaaa");
    fs::write(harness.paths.command(&request_id), b"{not json").expect("garbage");

    harness.monitor.cycle();

    let response = read_response(&harness.paths, &request_id);
    assert!(matches!(&response, CommandResponse::Error(message)
        if message.contains("invalid envelope payload")));
    assert!(harness.paths.bad(&request_id).exists());
    assert!(!harness.paths.command(&request_id).exists());

    harness.monitor.cycle();
    assert_eq!(harness.invocations.load(Ordering::SeqCst), 0);
}

#[rstest]
fn handler_failure_becomes_an_error_response(mut harness: Harness) {
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "broken", Map::new());

    harness.monitor.cycle();

    assert_eq!(
        read_response(&harness.paths, &request_id),
        CommandResponse::Error("no active document".to_owned())
    );
    assert!(harness.paths.processed(&request_id).exists());
}

#[rstest]
fn unknown_command_becomes_an_error_response(mut harness: Harness) {
    let request_id = id("100_aaaa");
    write_request(&harness.paths, &request_id, "does_not_exist", Map::new());

    harness.monitor.cycle();

    assert_eq!(
        read_response(&harness.paths, &request_id),
        CommandResponse::Error("unknown command 'does_not_exist'".to_owned())
    );
}

#[rstest]
fn panicking_handler_does_not_kill_the_loop(mut harness: Harness) {
    let bomb = id("100_aaaa");
    let follow_up = id("200_bbbb");
    write_request(&harness.paths, &bomb, "explode", Map::new());
    write_request(&harness.paths, &follow_up, "echo", text_params("still here"));

    harness.monitor.cycle();

    assert!(matches!(
        read_response(&harness.paths, &bomb),
        CommandResponse::Error(message) if message.contains("panicked")
    ));
    assert_eq!(
        read_response(&harness.paths, &follow_up),
        CommandResponse::Result(json!("still here"))
    );
}

#[rstest]
fn heartbeat_publishes_running_status_with_capabilities(harness: Harness) {
    let capabilities = Capabilities {
        resources: vec!["host://parameters".to_owned()],
        tools: vec!["echo".to_owned()],
        prompts: vec![],
    };
    let mut writer = StatusWriter::new(
        harness.paths.clone(),
        capabilities,
        Duration::from_millis(10),
    );

    writer.heartbeat_if_due();

    let bytes = fs::read(harness.paths.status()).expect("status file");
    let record: deaddrop_protocol::StatusRecord =
        serde_json::from_slice(&bytes).expect("decode status");
    assert_eq!(record.status, deaddrop_protocol::ListenerStatus::Running);
    assert!(record.heartbeat_unix.is_some());
    assert_eq!(record.available_tools, vec!["echo"]);
    assert_eq!(record.available_resources, vec!["host://parameters"]);
}

#[rstest]
fn reaper_deletes_only_expired_terminal_files(harness: Harness) {
    let old_id = id("100_aaaa");
    let fresh_id = id("200_bbbb");
    fs::write(harness.paths.response(&old_id), b"{}").expect("old response");
    fs::write(harness.paths.processed(&old_id), b"{}").expect("old marker");
    fs::write(harness.paths.command(&fresh_id), b"{}").expect("pending request");

    std::thread::sleep(Duration::from_millis(30));
    fs::write(harness.paths.response(&fresh_id), b"{}").expect("fresh response");

    let reaper = Reaper::new(
        harness.paths.clone(),
        Duration::from_millis(25),
        Duration::from_millis(1),
    );
    reaper.sweep();

    assert!(!harness.paths.response(&old_id).exists());
    assert!(!harness.paths.processed(&old_id).exists());
    assert!(harness.paths.response(&fresh_id).exists());
    assert!(
        harness.paths.command(&fresh_id).exists(),
        "pending requests are never reaped"
    );
}
