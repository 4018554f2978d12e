//! End-to-end CLI flows against a mocked remote index.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Remote {
    runtime: tokio::runtime::Runtime,
    server: MockServer,
}

impl Remote {
    fn start() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let server = runtime.block_on(MockServer::start());
        Ok(Self { runtime, server })
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn overrides(&self) -> String {
        json!({ "remote": { "apiBaseUrl": self.server.uri() } }).to_string()
    }

    fn overrides_with(&self, remote: serde_json::Value) -> String {
        let mut merged = json!({ "apiBaseUrl": self.server.uri() });
        if let (Some(target), Some(extra)) = (merged.as_object_mut(), remote.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        json!({ "remote": merged }).to_string()
    }

    fn verify(&self) {
        self.runtime.block_on(self.server.verify());
    }
}

fn temp_repo(label: &str) -> std::io::Result<PathBuf> {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("insight-e2e-{label}-{unique}"));
    std::fs::create_dir_all(dir.join("src"))?;
    std::fs::write(dir.join("src").join("lib.rs"), "pub fn run() {}\n")?;
    std::fs::write(dir.join("README.md"), "hello\n")?;
    Ok(dir)
}

fn insight(args: &[&str], root: &Path, overrides: &str) -> std::io::Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_insight"));
    for (key, _) in std::env::vars() {
        if key.starts_with("INSIGHT_") {
            command.env_remove(key);
        }
    }
    command
        .args(args)
        .arg(root)
        .args(["--overrides-json", overrides])
        .output()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn initialize_ok(id: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/initialize_repository"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "repository_id": id })))
}

#[test]
fn initialize_reinitialize_query_uninitialize() -> TestResult {
    let remote = Remote::start()?;
    remote.mount(initialize_ok("repo-e2e").expect(1));
    remote.mount(
        Mock::given(method("POST"))
            .and(path("/reinitialize_repository"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1),
    );
    remote.mount(
        Mock::given(method("GET"))
            .and(path("/query_repository"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "path": "src/lib.rs", "start_line": 1, "end_line": 1, "content": "pub fn run() {}" },
                { "path": "README.md", "start_line": 1, "end_line": 2, "content": "hello" }
            ]))),
    );
    let root = temp_repo("flow")?;
    let overrides = remote.overrides();

    let first = insight(&["initialize"], &root, &overrides)?;
    assert!(first.status.success(), "initialize failed: {}", stdout(&first));
    assert!(stdout(&first).starts_with("Initialized insight repository in "));
    assert!(root.join(".insight").join("state.json").is_file());

    let unchanged = insight(&["initialize"], &root, &overrides)?;
    assert!(unchanged.status.success());
    assert_eq!(stdout(&unchanged), "Reinitialized existing insight repository.\n");

    std::fs::write(root.join("src").join("main.rs"), "fn main() {}\n")?;
    let changed = insight(&["--output", "json", "initialize"], &root, &overrides)?;
    assert!(changed.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&changed.stdout)?;
    assert_eq!(summary["kind"], "reinitialize");
    assert_eq!(summary["added"], 1);
    assert_eq!(summary["repositoryId"], "repo-e2e");

    let query = insight(&["query", "run", "--path"], &root, &overrides)?;
    assert!(query.status.success());
    assert_eq!(
        stdout(&query),
        "2 matches found in the following files:\n\
         src/lib.rs\n\tLine 1: pub fn run() {}\n\n\
         README.md\n\tLine 1 - 2: hello\n"
    );

    let status = insight(&["status"], &root, &overrides)?;
    assert!(stdout(&status).contains("repositoryId: repo-e2e"));
    assert!(stdout(&status).contains("trackedFiles: 3"));

    let removed = insight(&["uninitialize"], &root, &overrides)?;
    assert!(removed.status.success());
    assert!(stdout(&removed).starts_with("Uninitialized insight repository in "));
    assert!(!root.join(".insight").exists());

    remote.verify();
    Ok(())
}

#[test]
fn failed_batch_exits_internal_and_leaves_no_marker() -> TestResult {
    let remote = Remote::start()?;
    remote.mount(
        Mock::given(method("POST"))
            .and(path("/initialize_repository"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "detail": "busy" }))),
    );
    let root = temp_repo("failed")?;

    let output = insight(&["initialize"], &root, &remote.overrides())?;
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("code: sync:batch_failed"));
    assert!(text.contains("status: 503"));
    assert!(!text.contains("session"));
    assert!(!root.join(".insight").exists());
    Ok(())
}

#[test]
fn ndjson_query_streams_matches_then_summary() -> TestResult {
    let remote = Remote::start()?;
    remote.mount(initialize_ok("repo-nd"));
    remote.mount(
        Mock::given(method("GET"))
            .and(path("/query_repository"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "path": "src/lib.rs", "start_line": 3, "end_line": 5, "content": "body" }
            ]))),
    );
    let root = temp_repo("ndjson")?;
    let overrides = remote.overrides();
    assert!(insight(&["initialize"], &root, &overrides)?.status.success());

    let output = insight(&["--agent", "query", "body", "--path"], &root, &overrides)?;
    assert!(output.status.success());
    let lines = stdout(&output)
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], "match");
    assert_eq!(lines[0]["startLine"], 3);
    assert_eq!(lines[1]["type"], "summary");
    assert_eq!(lines[1]["count"], 1);
    assert!(output.stderr.is_empty());
    Ok(())
}

#[test]
fn validate_before_query_rejects_unknown_repository() -> TestResult {
    let remote = Remote::start()?;
    remote.mount(initialize_ok("repo-gone"));
    remote.mount(
        Mock::given(method("POST"))
            .and(path("/validate_repository_id"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "repository_id_is_valid": false })),
            ),
    );
    remote.mount(
        Mock::given(method("GET"))
            .and(path("/query_repository"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0),
    );
    let root = temp_repo("unknown")?;
    let overrides = remote.overrides_with(json!({ "validateBeforeQuery": true }));
    assert!(insight(&["initialize"], &root, &overrides)?.status.success());

    let output = insight(&["query", "anything", "--path"], &root, &overrides)?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("code: repository:unknown_remote"));

    remote.verify();
    Ok(())
}

#[test]
fn json_logs_go_to_stderr_with_correlation_id() -> TestResult {
    let remote = Remote::start()?;
    remote.mount(initialize_ok("repo-logs"));
    let root = temp_repo("logs")?;

    let output = Command::new(env!("CARGO_BIN_EXE_insight"))
        .args(["--no-progress", "initialize"])
        .arg(&root)
        .args(["--overrides-json", &remote.overrides()])
        .env("INSIGHT_LOG_FORMAT", "json")
        .env("INSIGHT_LOG_LEVEL", "info")
        .output()?;
    assert!(output.status.success());

    let events = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?;
    let names: Vec<&str> = events
        .iter()
        .filter_map(|event| event.get("event").and_then(serde_json::Value::as_str))
        .collect();
    assert!(names.contains(&"repository.initialize.start"));
    assert!(names.contains(&"repository.initialize.completed"));
    assert!(events.iter().all(|event| event["fields"].get("correlationId").is_some()));
    Ok(())
}
