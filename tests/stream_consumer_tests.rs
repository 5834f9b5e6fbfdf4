mod common;

use common::mocks::{MockLLMClient, MockSearchProvider};
use mathmatika::{
    AppConfig, AppState,
    api::routes,
    client::{ExchangeOutcome, StreamConsumer, StreamError, StreamHandler},
    rag::LocalDocumentIndex,
    streaming::StreamFrame,
    types::{ChatRequest, GroundingSource},
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Recorder {
    fragments: Vec<String>,
    completed: Option<(String, Vec<GroundingSource>)>,
    errors: Vec<StreamError>,
}

impl StreamHandler for Recorder {
    fn on_content(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    fn on_complete(&mut self, text: &str, sources: &[GroundingSource]) {
        self.completed = Some((text.to_string(), sources.to_vec()));
    }

    fn on_error(&mut self, error: &StreamError) {
        self.errors.push(error.clone());
    }
}

fn sse(frames: &[StreamFrame]) -> ResponseTemplate {
    let body: String = frames.iter().map(StreamFrame::encode).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_grounded_exchange_completes_with_sources() {
    let server = MockServer::start().await;
    let source = GroundingSource {
        content: "A ring is a set...".into(),
        source: "algebra.md".into(),
        chunk: 0,
    };
    mount(
        &server,
        "/rag/query/stream",
        sse(&[
            StreamFrame::content("A ring "),
            StreamFrame::content("has two operations."),
            StreamFrame::sources(vec![source.clone()]),
            StreamFrame::done(),
        ]),
    )
    .await;

    let consumer = StreamConsumer::new(server.uri()).unwrap();
    let mut recorder = Recorder::default();
    let outcome = consumer
        .exchange()
        .run(
            "/rag/query/stream",
            &json!({ "query": "what is a ring" }),
            &mut recorder,
        )
        .await;

    assert_eq!(recorder.fragments, vec!["A ring ", "has two operations."]);
    assert_eq!(
        outcome,
        ExchangeOutcome::Completed {
            text: "A ring has two operations.".into(),
            sources: vec![source.clone()],
        }
    );
    assert_eq!(
        recorder.completed,
        Some(("A ring has two operations.".into(), vec![source]))
    );
    assert!(recorder.errors.is_empty());
}

#[tokio::test]
async fn test_server_error_frame_fires_error_once() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/rag/query/stream",
        sse(&[StreamFrame::error(
            "Index algebra not found. Please upload a document first.",
        )]),
    )
    .await;

    let consumer = StreamConsumer::new(server.uri()).unwrap();
    let mut recorder = Recorder::default();
    let outcome = consumer
        .exchange()
        .run("/rag/query/stream", &json!({ "query": "rings" }), &mut recorder)
        .await;

    let expected =
        StreamError::Server("Index algebra not found. Please upload a document first.".into());
    assert_eq!(outcome, ExchangeOutcome::Failed(expected.clone()));
    assert_eq!(recorder.errors, vec![expected]);
    assert!(recorder.completed.is_none());
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/chat/stream",
        ResponseTemplate::new(400)
            .set_body_json(json!({ "error": "Invalid input: Message must not be empty" })),
    )
    .await;

    let consumer = StreamConsumer::new(server.uri()).unwrap();
    let mut recorder = Recorder::default();
    let outcome = consumer
        .exchange()
        .run("/chat/stream", &json!({ "message": "" }), &mut recorder)
        .await;

    match outcome {
        ExchangeOutcome::Failed(StreamError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("Message must not be empty"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(recorder.errors.len(), 1);
}

#[tokio::test]
async fn test_close_without_done_is_incomplete() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/chat/stream",
        sse(&[StreamFrame::content("partial ")]),
    )
    .await;

    let consumer = StreamConsumer::new(server.uri()).unwrap();
    let mut recorder = Recorder::default();
    let outcome = consumer
        .exchange()
        .run("/chat/stream", &json!({ "message": "hi" }), &mut recorder)
        .await;

    assert_eq!(outcome, ExchangeOutcome::Failed(StreamError::Incomplete));
    assert_eq!(recorder.fragments, vec!["partial "]);
    assert_eq!(recorder.errors, vec![StreamError::Incomplete]);
    assert!(recorder.completed.is_none());
}

#[tokio::test]
async fn test_cancelled_before_response() {
    let server = MockServer::start().await;
    mount(&server, "/chat/stream", sse(&[StreamFrame::done()])).await;

    let consumer = StreamConsumer::new(server.uri()).unwrap();
    let exchange = consumer.exchange();
    assert_ne!(consumer.exchange().id(), exchange.id());
    exchange.cancel();

    let mut recorder = Recorder::default();
    let outcome = exchange
        .run("/chat/stream", &json!({ "message": "hi" }), &mut recorder)
        .await;

    assert_eq!(outcome, ExchangeOutcome::Cancelled);
    assert!(recorder.fragments.is_empty());
    assert!(recorder.completed.is_none());
    assert!(recorder.errors.is_empty());
}

#[tokio::test]
async fn test_chat_round_trip_against_the_server() {
    let state = AppState::with_providers(
        AppConfig::default(),
        Arc::new(MockLLMClient::new("Use the chain rule: $f'(g(x))g'(x)$.")),
        Arc::new(MockSearchProvider::new(vec![])),
        Arc::new(LocalDocumentIndex::new()),
    )
    .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.unwrap();
    });

    let consumer = StreamConsumer::new(format!("http://{}", addr)).unwrap();
    let mut recorder = Recorder::default();
    let request = ChatRequest {
        message: "how do I differentiate sin(x^2)?".into(),
        conversation_history: vec![],
    };
    let outcome = consumer
        .exchange()
        .run("/chat/stream", &request, &mut recorder)
        .await;

    let expected = "Use the chain rule: $f'(g(x))g'(x)$.";
    assert_eq!(recorder.fragments.concat(), expected);
    assert_eq!(
        outcome,
        ExchangeOutcome::Completed {
            text: expected.into(),
            sources: vec![],
        }
    );
}
