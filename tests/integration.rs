use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn chatd_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("chatd");
    path
}

struct TestEnv {
    _tmp: TempDir,
    config_path: PathBuf,
    docs_dir: PathBuf,
    bind: String,
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Ask the OS for a free port; the listener is dropped before the server
    // binds it.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let bind = format!("127.0.0.1:{port}");

    let config_content = format!(
        r#"[store]
docs_dir = "{root}/raw_json"

[db]
path = "{root}/data/chats.sqlite"

[server]
bind = "{bind}"

[search_index]
url = "http://127.0.0.1:7700"
index = "chats"
"#,
        root = root.display(),
    );

    let config_path = config_dir.join("chatd.toml");
    fs::write(&config_path, config_content).unwrap();

    TestEnv {
        docs_dir: root.join("raw_json"),
        _tmp: tmp,
        config_path,
        bind,
    }
}

fn chatd_command(config_path: &Path) -> Command {
    let mut cmd = Command::new(chatd_binary());
    cmd.arg("--config").arg(config_path);
    // Keep host environment overrides out of the test configuration.
    for var in ["MEILI_URL", "MEILI_MASTER_KEY", "INDEX_NAME", "DATA_DIR"] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_chatd(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = chatd_command(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run chatd binary: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Kills the spawned server when the test finishes.
struct ServerGuard {
    child: Child,
    base_url: String,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_server(env: &TestEnv) -> ServerGuard {
    let child = chatd_command(&env.config_path)
        .arg("serve")
        .spawn()
        .expect("failed to spawn chatd serve");

    let guard = ServerGuard {
        child,
        base_url: format!("http://{}", env.bind),
    };

    let client = reqwest::blocking::Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(resp) = client.get(format!("{}/health", guard.base_url)).send() {
            if resp.status().is_success() {
                return guard;
            }
        }
        assert!(
            Instant::now() < deadline,
            "server did not become healthy in time"
        );
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn collect_payload(document: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "data": [ { "data": document } ] })
}

fn post_collect(guard: &ServerGuard, body: &serde_json::Value) -> reqwest::blocking::Response {
    reqwest::blocking::Client::new()
        .post(format!("{}/collect", guard.base_url))
        .json(body)
        .send()
        .unwrap()
}

#[test]
fn test_init_creates_database() {
    let env = setup_test_env();

    let (stdout, stderr, success) = run_chatd(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();

    let (_, _, success1) = run_chatd(&env.config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_chatd(&env.config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_health_endpoint() {
    let env = setup_test_env();
    let server = spawn_server(&env);

    let body: serde_json::Value = reqwest::blocking::get(format!("{}/health", server.base_url))
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[test]
fn test_collect_then_get_round_trips() {
    let env = setup_test_env();
    let server = spawn_server(&env);

    let document = serde_json::json!({
        "id": "abc123",
        "model": "gpt-4",
        "messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"}
        ]
    });

    let resp = post_collect(&server, &collect_payload(document.clone()));
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["status"], "success");
    let json_path = body["json_path"].as_str().unwrap();
    assert!(json_path.ends_with("abc123.json"));

    // The canonical file landed in the document store.
    assert!(env.docs_dir.join("abc123.json").exists());

    // And the stored body round-trips through the query path.
    let fetched: serde_json::Value =
        reqwest::blocking::get(format!("{}/chat/abc123", server.base_url))
            .unwrap()
            .json()
            .unwrap();
    assert_eq!(fetched, document);
}

#[test]
fn test_collect_rejects_bad_payloads() {
    let env = setup_test_env();
    let server = spawn_server(&env);
    let client = reqwest::blocking::Client::new();

    // Not JSON at all.
    let resp = client
        .post(format!("{}/collect", server.base_url))
        .body("not json")
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // Wrong envelope shape.
    let resp = post_collect(&server, &serde_json::json!({"data": []}));
    assert_eq!(resp.status().as_u16(), 400);

    // Missing id.
    let resp = post_collect(&server, &collect_payload(serde_json::json!({"model": "gpt-4"})));
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "missing_id");
}

#[test]
fn test_get_unknown_chat_is_404() {
    let env = setup_test_env();
    let server = spawn_server(&env);

    let resp = reqwest::blocking::get(format!("{}/chat/nope", server.base_url)).unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[test]
fn test_search_filters_and_limit() {
    let env = setup_test_env();
    let server = spawn_server(&env);
    let client = reqwest::blocking::Client::new();

    let transcripts = [
        ("t1", "gpt-4", 2, "how do I deploy", "use the pipeline"),
        ("t2", "claude", 6, "what is rust", "a systems language"),
        ("t3", "gpt-4", 8, "longest chat", "final answer"),
    ];
    for (id, model, count, first, last) in transcripts {
        let mut messages = vec![
            serde_json::json!({"role": "user", "content": first}),
            serde_json::json!({"role": "assistant", "content": last}),
        ];
        while messages.len() < count {
            messages.push(serde_json::json!({"role": "user", "content": "filler"}));
            messages.push(serde_json::json!({"role": "assistant", "content": last}));
        }
        messages.truncate(count);
        let resp = post_collect(
            &server,
            &collect_payload(serde_json::json!({
                "id": id, "model": model, "messages": messages
            })),
        );
        assert_eq!(resp.status().as_u16(), 200);
    }

    let search = |params: &str| -> Vec<String> {
        let body: serde_json::Value = client
            .get(format!("{}/search?{params}", server.base_url))
            .send()
            .unwrap()
            .json()
            .unwrap();
        body["chats"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect()
    };

    // Model filter is exact.
    let ids = search("model=gpt-4");
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"t1".to_string()) && ids.contains(&"t3".to_string()));

    // min_length excludes shorter chats.
    let ids = search("min_length=5");
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"t1".to_string()));

    // Substring query matches message content case-insensitively.
    let ids = search("query=DEPLOY");
    assert_eq!(ids, vec!["t1".to_string()]);

    // Limit truncates.
    let ids = search("limit=1");
    assert_eq!(ids.len(), 1);

    // Filters AND together.
    let ids = search("model=gpt-4&min_length=5");
    assert_eq!(ids, vec!["t3".to_string()]);
}

#[test]
fn test_reingest_same_id_keeps_one_record() {
    let env = setup_test_env();
    let server = spawn_server(&env);

    for version in 1..=2 {
        let resp = post_collect(
            &server,
            &collect_payload(serde_json::json!({
                "id": "dup",
                "model": "gpt-4",
                "messages": [],
                "version": version
            })),
        );
        assert_eq!(resp.status().as_u16(), 200);
    }

    let body: serde_json::Value =
        reqwest::blocking::get(format!("{}/search?model=gpt-4", server.base_url))
            .unwrap()
            .json()
            .unwrap();
    assert_eq!(body["chats"].as_array().unwrap().len(), 1);

    let fetched: serde_json::Value =
        reqwest::blocking::get(format!("{}/chat/dup", server.base_url))
            .unwrap()
            .json()
            .unwrap();
    assert_eq!(fetched["version"], 2);
}
