//! HTTP API through the full router

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    routing::get as get_route,
    Router,
};
use futures::stream;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{test_state, MockLlm, PAPER};
use scholar_rag::server::ScholarServer;

const BOUNDARY: &str = "scholar-test-boundary";

async fn router(dir: &std::path::Path) -> Router {
    let state = test_state(dir, MockLlm::new()).await;
    ScholarServer::with_state(state).build_router()
}

fn multipart(files: &[(&str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn upload(app: &Router, files: &[(&str, &[u8])]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/documents?wait=true")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart(files))
        .unwrap();
    send(app, request).await
}

/// Serves files for URL import on an ephemeral port
async fn file_server() -> String {
    let app = Router::new()
        .route(
            "/papers/graph.txt",
            get_route(|| async { ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], PAPER) }),
        )
        .route("/sized.txt", get_route(|| async { vec![b'a'; 2 * 1024 * 1024] }))
        .route(
            "/streamed.txt",
            get_route(|| async {
                let chunks = (0..40).map(|_| Ok::<_, std::io::Error>(vec![b'a'; 64 * 1024]));
                Body::from_stream(stream::iter(chunks))
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

#[tokio::test]
async fn health_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
    let (status, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, info) = send(&app, get("/api/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["name"], "scholar-rag");
    assert!(info["endpoints"]["POST /api/qa/ask"].is_string());
}

#[tokio::test]
async fn upload_list_ask_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;

    let (status, uploaded) = upload(
        &app,
        &[("graph.txt", PAPER.as_bytes()), ("notes.doc", &[0xD0, 0xCF, 0x11, 0xE0])],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["documents"].as_array().unwrap().len(), 1);
    assert_eq!(uploaded["documents"][0]["status"], "parsed");
    assert_eq!(uploaded["errors"][0]["filename"], "notes.doc");
    assert_eq!(uploaded["errors"][0]["error_kind"], "unsupported_format");
    let id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let (_, listed) = send(&app, get("/api/documents?status=parsed")).await;
    assert_eq!(listed["total_count"], 1);
    let (_, listed) = send(&app, get("/api/documents?status=failed")).await;
    assert_eq!(listed["total_count"], 0);

    let (status, doc) = send(&app, get(&format!("/api/documents/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["sections"].as_array().unwrap().len() >= 4);

    let (status, answer) = send(
        &app,
        json_request(
            Method::POST,
            "/api/qa/ask",
            json!({ "document_id": id, "question": "Why use message passing?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["question_type"], "logical");
    assert!(!answer["sources"].as_array().unwrap().is_empty());

    let (status, keywords) = send(&app, get(&format!("/api/documents/{}/keywords", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!keywords["keywords"].as_array().unwrap().is_empty());

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/documents/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = send(&app, get(&format!("/api/documents/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error_kind"], "not_found");
}

#[tokio::test]
async fn summaries_and_templates() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;
    let (_, uploaded) = upload(&app, &[("graph.txt", PAPER.as_bytes())]).await;
    let id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let (status, templates) = send(&app, get("/api/summaries/templates")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = templates
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert!(ids.contains(&"problem_method_conclusion"));
    assert!(!ids.contains(&"question_answer"));

    let (status, record) = send(
        &app,
        json_request(
            Method::POST,
            "/api/summaries",
            json!({ "document_id": id, "kind": "section", "section": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["sections"][0]["section_index"], 2);

    let (status, error) = send(
        &app,
        json_request(
            Method::POST,
            "/api/summaries",
            json!({ "document_id": id, "kind": "custom", "template": "sonnet" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_kind"], "unknown_template");

    let (_, log) = send(&app, get(&format!("/api/documents/{}/summaries", id))).await;
    assert_eq!(log.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn summarize_all_sections_without_selector() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;
    let (_, uploaded) = upload(&app, &[("graph.txt", PAPER.as_bytes())]).await;
    let id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let (status, record) = send(
        &app,
        json_request(Method::POST, "/api/summaries", json!({ "document_id": id, "kind": "section" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sections = record["sections"].as_array().unwrap();
    assert!(sections.len() > 1);
    let indices: Vec<u64> = sections.iter().filter_map(|s| s["section_index"].as_u64()).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
}

#[tokio::test]
async fn import_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;
    let base = file_server().await;

    let (status, imported) = send(
        &app,
        json_request(
            Method::POST,
            "/api/documents/url?wait=true",
            json!({ "url": format!("{}/papers/graph.txt", base) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported["documents"][0]["filename"], "graph.txt");
    assert_eq!(imported["documents"][0]["status"], "parsed");
    assert!(imported["errors"].as_array().unwrap().is_empty());

    // same bytes again resolve to the stored document
    let (_, again) = send(
        &app,
        json_request(
            Method::POST,
            "/api/documents/url",
            json!({ "url": format!("{}/papers/graph.txt", base), "filename": "copy.txt" }),
        ),
    )
    .await;
    assert_eq!(again["documents"][0]["id"], imported["documents"][0]["id"]);

    for path in ["/sized.txt", "/streamed.txt", "/missing.txt"] {
        let (status, error) = send(
            &app,
            json_request(Method::POST, "/api/documents/url", json!({ "url": format!("{}{}", base, path) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(error["error_kind"], "invalid_request");
    }

    let (_, listed) = send(&app, get("/api/documents")).await;
    assert_eq!(listed["total_count"], 1);
}

#[tokio::test]
async fn question_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;
    let (_, uploaded) = upload(&app, &[("graph.txt", PAPER.as_bytes())]).await;
    let id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let (status, all) = send(&app, get(&format!("/api/qa/suggestions/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let suggestions = all["suggestions"].as_array().unwrap();
    assert!(!suggestions.is_empty() && suggestions.len() <= 8);
    assert!(suggestions.contains(&json!("What research methods does the paper use?")));
    assert!(all.get("question_type").is_none());

    let (status, analytical) =
        send(&app, get(&format!("/api/qa/suggestions/{}?question_type=analytical", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytical["question_type"], "analytical");
    assert!(!analytical["suggestions"]
        .as_array()
        .unwrap()
        .contains(&json!("What research methods does the paper use?")));

    let (status, error) = send(
        &app,
        get(&format!("/api/qa/suggestions/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error_kind"], "not_found");
}

#[tokio::test]
async fn conversation_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(dir.path()).await;
    let (_, uploaded) = upload(&app, &[("graph.txt", PAPER.as_bytes())]).await;
    let id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let (status, started) = send(
        &app,
        json_request(
            Method::POST,
            "/api/conversations",
            json!({ "document_id": id, "question": "What does the model predict?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cid = started["conversation"]["id"].as_str().unwrap().to_string();
    assert!(started["answer"]["answer"].is_string());

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/conversations/{}/turns", cid),
            json!({ "question": "How could the method be improved?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send(&app, get(&format!("/api/conversations?document_id={}", id))).await;
    assert_eq!(listed["total_count"], 1);
    assert_eq!(listed["conversations"][0]["turn_count"], 2);

    let (status, markdown) = send(&app, get(&format!("/api/conversations/{}/export?format=markdown", cid))).await;
    assert_eq!(status, StatusCode::OK);
    let markdown = markdown.as_str().unwrap();
    assert!(markdown.starts_with("# What does the model predict?"));

    let archive = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/conversations/{}/archive", cid))
        .body(Body::empty())
        .unwrap();
    let (status, archived) = send(&app, archive).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["status"], "archived");

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/conversations/{}", cid))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get(&format!("/api/conversations/{}", cid))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
