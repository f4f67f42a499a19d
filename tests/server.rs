use std::fs;
use std::sync::Arc;

use codepilot::config::Config;
use codepilot::embedding::HashProvider;
use codepilot::engine::Engine;
use codepilot::server::router;
use tempfile::TempDir;

struct TestServer {
    base: String,
    _out: TempDir,
}

async fn start_server() -> TestServer {
    let out = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.index.dir = out.path().join("output");
    config.chunking.window = 20;
    config.chunking.overlap = 5;
    config.chunking.min_lines = 5;

    let engine = Arc::new(Engine::new(config, Arc::new(HashProvider::new(128))));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(engine)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        _out: out,
    }
}

fn write_repo(root: &std::path::Path) {
    fs::create_dir_all(root.join("src/auth")).unwrap();
    let jwt: String = (1..=30)
        .map(|i| format!("def verify_jwt_{}(token): return decode(token)\n", i))
        .collect();
    fs::write(root.join("src/auth/jwt.py"), jwt).unwrap();
    let other: String = (1..=30)
        .map(|i| format!("fn render_{}() -> Html {{ html!() }}\n", i))
        .collect();
    fs::write(root.join("src/view.rs"), other).unwrap();
}

#[tokio::test]
async fn test_health_and_root() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let root = client.get(&server.base).send().await.unwrap();
    assert!(root.status().is_success());
}

#[tokio::test]
async fn test_search_before_ingest_is_503() {
    let server = start_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/search?q=jwt", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_ready");
}

#[tokio::test]
async fn test_ingest_then_search() {
    let server = start_server().await;
    let repo = TempDir::new().unwrap();
    write_repo(repo.path());
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/ingest", server.base))
        .json(&serde_json::json!({ "repo_path": repo.path() }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["chunks_total"], 4);
    assert_eq!(report["files_read"], 2);
    assert_eq!(report["generation"], 1);
    assert!(report["duration_seconds"].as_f64().is_some());

    let resp = client
        .get(format!("{}/search?q=verify%20jwt%20token&k=2", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["k"], 2);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["results"][0]["path"], "src/auth/jwt.py");

    let filtered: serde_json::Value = client
        .get(format!("{}/search?q=verify&lang=rust", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    for hit in filtered["results"].as_array().unwrap() {
        assert_eq!(hit["lang"], "rust");
    }

    let status: serde_json::Value = client
        .get(format!("{}/status", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["indexed"], true);
    assert_eq!(status["chunks"], 4);
}

#[tokio::test]
async fn test_bad_k_is_400() {
    let server = start_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/search?q=jwt&k=0", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_ingest_empty_repo_is_400() {
    let server = start_server().await;
    let repo = TempDir::new().unwrap();
    let resp = reqwest::Client::new()
        .post(format!("{}/ingest", server.base))
        .json(&serde_json::json!({ "repo_path": repo.path() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn test_process_time_header() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    for path in ["/health", "/search?q=jwt"] {
        let resp = client
            .get(format!("{}{}", server.base, path))
            .send()
            .await
            .unwrap();
        let value = resp
            .headers()
            .get("x-process-time")
            .unwrap_or_else(|| panic!("no X-Process-Time on {}", path))
            .to_str()
            .unwrap()
            .to_string();
        let seconds: f64 = value.parse().unwrap();
        assert!(seconds >= 0.0);
        assert_eq!(value.split('.').nth(1).map(str::len), Some(4));
    }
}

#[tokio::test]
async fn test_malformed_query_uses_error_envelope() {
    let server = start_server().await;
    let resp = reqwest::Client::new()
        .get(format!("{}/search?q=jwt&k=abc", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_ingest_body_uses_error_envelope() {
    let server = start_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/ingest", server.base))
        .json(&serde_json::json!({ "window": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
