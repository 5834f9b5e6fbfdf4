use crate::AppState;
use crate::api::handlers::{chat, health, rag, research};
use crate::types::{
    ChatMessage, ChatRequest, DeepResearchResponse, GroundingSource, IndexInfo,
    IndexListResponse, MessageRole, MultiAgentResearchResponse, RagQueryRequest,
    ResearchRequest, ResearchResponse, SubtaskReport, UploadResponse,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mathmatika Research Server",
        description = "Web-grounded research synthesis, streamed tutoring chat and document-grounded Q&A"
    ),
    paths(
        research::research,
        research::deep_research,
        research::multi_agent_research,
        chat::chat_stream,
        rag::query_stream,
        rag::upload,
        rag::list_indexes,
        health::health,
    ),
    components(schemas(
        ResearchRequest,
        ResearchResponse,
        DeepResearchResponse,
        MultiAgentResearchResponse,
        SubtaskReport,
        ChatRequest,
        ChatMessage,
        MessageRole,
        RagQueryRequest,
        UploadResponse,
        GroundingSource,
        IndexInfo,
        IndexListResponse,
        rag::UploadForm,
    )),
    tags(
        (name = "research", description = "Single-shot research strategies"),
        (name = "chat", description = "Streamed tutoring chat"),
        (name = "rag", description = "Document upload and grounded Q&A"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;

pub fn create_router(max_upload_bytes: usize) -> Router<AppState> {
    let research_routes = Router::new()
        .route("/research", post(research::research))
        .route("/deep-research", post(research::deep_research))
        .route("/multi-agent-research", post(research::multi_agent_research));

    let stream_routes = Router::new()
        .route("/chat/stream", post(chat::chat_stream))
        .route("/rag/query/stream", post(rag::query_stream));

    // Multipart uploads get their own ceiling instead of axum's 2 MB default
    let document_routes = Router::new()
        .route("/rag/upload", post(rag::upload))
        .route("/rag/indexes", get(rag::list_indexes))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes));

    let service_routes = Router::new()
        .route("/health", get(health::health))
        .route("/openapi.json", get(health::openapi));

    research_routes
        .merge(stream_routes)
        .merge(document_routes)
        .merge(service_routes)
}

/// Browser origins allowed to call the API. A `*` entry allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Full application: routes, state and the tower layers.
pub fn app(state: AppState) -> Router {
    let server = &state.config.server;
    let cors = cors_layer(&server.cors_origins);

    create_router(server.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for path in [
            "/research",
            "/deep-research",
            "/multi-agent-research",
            "/chat/stream",
            "/rag/query/stream",
            "/rag/upload",
            "/rag/indexes",
            "/health",
        ] {
            assert!(paths.contains(&path), "missing {path}");
        }
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_lists() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "\n".to_string()]);
    }
}
