mod common;

use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use common::mocks::{MockLLMClient, MockSearchProvider, document, pdf_document};
use mathmatika::{
    AppConfig, AppState,
    api::routes,
    rag::LocalDocumentIndex,
    streaming::{FrameDecoder, StreamFrame},
    types::{
        DeepResearchResponse, IndexListResponse, MultiAgentResearchResponse, ResearchResponse,
        UploadResponse,
    },
};
use serde_json::json;
use std::sync::Arc;

const CHAT_REPLY: &str = "The derivative of $x^2$ is $2x$.";

fn test_server(llm: MockLLMClient, search: MockSearchProvider) -> TestServer {
    let mut config = AppConfig::default();
    config.retry.max_attempts = 1;
    let state = AppState::with_providers(
        config,
        Arc::new(llm),
        Arc::new(search),
        Arc::new(LocalDocumentIndex::new()),
    )
    .unwrap();
    TestServer::new(routes::app(state)).unwrap()
}

fn default_server() -> TestServer {
    test_server(
        MockLLMClient::new(CHAT_REPLY),
        MockSearchProvider::new(vec![
            document("calculus-one", 450),
            document("short", 50),
            document("calculus-two", 800),
        ]),
    )
}

fn frames(body: &str) -> Vec<StreamFrame> {
    let mut decoder = FrameDecoder::new();
    decoder
        .feed(body.as_bytes())
        .into_iter()
        .map(|frame| frame.unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let server = default_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_openapi_document() {
    let server = default_server();
    let response = server.get("/openapi.json").await;
    response.assert_status_ok();
    let doc: serde_json::Value = response.json();
    assert!(doc["paths"]["/multi-agent-research"]["post"].is_object());
    assert!(doc["paths"]["/rag/upload"]["post"].is_object());
}

#[tokio::test]
async fn test_research_endpoint() {
    let server = test_server(
        MockLLMClient::new("SUMMARY: Limits via derivatives.\nINSIGHTS:\n- one\n- two"),
        MockSearchProvider::new(vec![
            document("calculus-one", 450),
            document("short", 50),
            document("calculus-two", 800),
        ]),
    );

    let response = server
        .post("/research")
        .json(&json!({ "query": "explain L'Hopital's rule" }))
        .await;
    response.assert_status_ok();

    let body: ResearchResponse = response.json();
    assert_eq!(body.query, "explain L'Hopital's rule");
    assert_eq!(body.sources, 2);
    assert_eq!(body.summary, "Limits via derivatives.");
    assert_eq!(body.insights, vec!["one", "two"]);
    assert!(body.processing_time >= 0.0);
}

#[tokio::test]
async fn test_short_query_rejected() {
    let server = default_server();
    for path in ["/research", "/deep-research", "/multi-agent-research"] {
        let response = server.post(path).json(&json!({ "query": " ab " })).await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("at least 3"));
    }
}

#[tokio::test]
async fn test_deep_research_endpoint() {
    let server = test_server(
        MockLLMClient::new("SUMMARY: s\nINSIGHTS:\n- a")
            .respond_to("What single web search query", "Taylor remainder estimates"),
        MockSearchProvider::new(vec![document("taylor", 400)]),
    );

    let response = server
        .post("/deep-research")
        .json(&json!({ "query": "Taylor series" }))
        .await;
    response.assert_status_ok();

    let body: DeepResearchResponse = response.json();
    assert_eq!(body.follow_up_query, "Taylor remainder estimates");
    assert_eq!(body.sources, 2);
}

#[tokio::test]
async fn test_multi_agent_endpoint_reports_every_subtask() {
    let server = test_server(
        MockLLMClient::new("finding")
            .respond_to("Split the research question", "FUNDAMENTALS: groups")
            .respond_to(
                "integrating your subagents' findings",
                "EXECUTIVE SUMMARY: Groups capture symmetry.\nINSIGHTS:\n- closure",
            )
            .fail_on("focusing on applications"),
        MockSearchProvider::new(vec![document("groups", 300)]),
    );

    let response = server
        .post("/multi-agent-research")
        .json(&json!({ "query": "group theory" }))
        .await;
    response.assert_status_ok();

    let body: MultiAgentResearchResponse = response.json();
    assert_eq!(body.subagents, 3);
    assert_eq!(body.subtask_results.len(), 3);
    assert_eq!(body.subtask_results[0].query, "groups");
    assert_eq!(body.subtask_results[1].query, "group theory recent developments");
    assert!(body.subtask_results[2].failed);
    assert_eq!(body.total_sources, 2);
    assert_eq!(body.executive_summary, "Groups capture symmetry.");
}

#[tokio::test]
async fn test_research_failure_maps_to_bad_gateway() {
    let server = test_server(
        MockLLMClient::new("unused").fail_on("Research question:"),
        MockSearchProvider::new(vec![]),
    );

    let response = server
        .post("/research")
        .json(&json!({ "query": "explain limits" }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().starts_with("basic synthesis failed"));
}

#[tokio::test]
async fn test_chat_stream_frames() {
    let server = default_server();

    let response = server
        .post("/chat/stream")
        .json(&json!({
            "message": "derivative of x^2?",
            "conversation_history": [
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" }
            ]
        }))
        .await;
    response.assert_status_ok();

    let frames = frames(&response.text());
    let text: String = frames.iter().filter_map(|f| f.content.clone()).collect();
    assert_eq!(text, CHAT_REPLY);
    assert_eq!(frames.last(), Some(&StreamFrame::done()));
    assert!(frames.iter().all(|f| f.error.is_none()));
}

#[tokio::test]
async fn test_chat_stream_provider_failure_is_one_error_frame() {
    let server = test_server(
        MockLLMClient::new("unused").fail_on("mathematics tutor"),
        MockSearchProvider::new(vec![]),
    );

    let response = server
        .post("/chat/stream")
        .json(&json!({ "message": "hello" }))
        .await;
    response.assert_status_ok();

    let frames = frames(&response.text());
    assert_eq!(frames.len(), 1);
    assert!(
        frames[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Streaming error:")
    );
}

#[tokio::test]
async fn test_chat_empty_message_rejected() {
    let server = default_server();
    let response = server
        .post("/chat/stream")
        .json(&json!({ "message": "   " }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_rag_query_missing_index() {
    let server = default_server();

    let response = server
        .post("/rag/query/stream")
        .json(&json!({ "query": "what is a ring", "index_name": "algebra" }))
        .await;
    response.assert_status_ok();

    let frames = frames(&response.text());
    assert_eq!(
        frames,
        vec![StreamFrame::error(
            "Index algebra not found. Please upload a document first."
        )]
    );
}

#[tokio::test]
async fn test_upload_then_grounded_query() {
    let server = test_server(
        MockLLMClient::new("A ring has two operations."),
        MockSearchProvider::new(vec![]),
    );

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(
                "A ring is a set equipped with addition and multiplication.".as_bytes(),
            )
            .file_name("algebra.md"),
        )
        .add_text("index_name", "algebra");
    let response = server.post("/rag/upload").multipart(form).await;
    response.assert_status_ok();

    let upload: UploadResponse = response.json();
    assert!(upload.success);
    assert_eq!(upload.filename, "algebra.md");
    assert_eq!(upload.index_name, "algebra");
    assert_eq!(upload.chunks, 1);

    let response = server
        .post("/rag/query/stream")
        .json(&json!({ "query": "what is a ring", "index_name": "algebra" }))
        .await;
    response.assert_status_ok();

    let frames = frames(&response.text());
    let n = frames.len();
    assert!(n >= 3);
    assert_eq!(frames[n - 1], StreamFrame::done());

    let sources = frames[n - 2].sources.as_ref().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source, "algebra.md");
    assert_eq!(sources[0].chunk, 0);

    let text: String = frames[..n - 2]
        .iter()
        .filter_map(|f| f.content.clone())
        .collect();
    assert_eq!(text, "A ring has two operations.");

    let listing: IndexListResponse = server.get("/rag/indexes").await.json();
    assert_eq!(listing.indexes.len(), 1);
    assert_eq!(listing.indexes[0].name, "algebra");
    assert_eq!(listing.indexes[0].chunk_count, 1);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let server = default_server();
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"PK\x03\x04".as_slice()).file_name("thesis.docx"),
    );
    let response = server.post("/rag/upload").multipart(form).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_pdf_upload_is_extracted_and_grounds_answers() {
    let server = test_server(
        MockLLMClient::new("They scale eigenvectors."),
        MockSearchProvider::new(vec![]),
    );

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(pdf_document("Eigenvalues scale eigenvectors")).file_name("spectral.pdf"),
        )
        .add_text("index_name", "linear-algebra");
    let response = server.post("/rag/upload").multipart(form).await;
    response.assert_status_ok();

    let upload: UploadResponse = response.json();
    assert_eq!(upload.filename, "spectral.pdf");
    assert_eq!(upload.chunks, 1);

    let response = server
        .post("/rag/query/stream")
        .json(&json!({ "query": "what do eigenvalues do", "index_name": "linear-algebra" }))
        .await;
    response.assert_status_ok();

    let frames = frames(&response.text());
    let sources = frames
        .iter()
        .find_map(|f| f.sources.clone())
        .expect("sources frame");
    assert_eq!(sources[0].source, "spectral.pdf");
    assert!(sources[0].content.contains("Eigenvalues"));
    assert_eq!(frames.last(), Some(&StreamFrame::done()));
}

#[tokio::test]
async fn test_unreadable_pdf_rejected() {
    let server = default_server();
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.7".as_slice()).file_name("paper.pdf"),
    );
    let response = server.post("/rag/upload").multipart(form).await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("paper.pdf"));
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let server = default_server();
    let form = MultipartForm::new().add_text("index_name", "algebra");
    let response = server.post("/rag/upload").multipart(form).await;
    response.assert_status_bad_request();
}
