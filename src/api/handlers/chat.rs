use crate::{
    AppState,
    chat::ChatService,
    streaming::StreamFrame,
    types::{ChatRequest, Result},
};
use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

/// Render frames as server-sent events.
pub(crate) fn sse_frames<S>(
    frames: S,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>
where
    S: Stream<Item = StreamFrame> + Send + 'static,
{
    Sse::new(frames.map(|frame| Ok::<_, Infallible>(frame.to_event())))
        .keep_alive(KeepAlive::default())
}

/// Stream a tutoring answer
///
/// The answer arrives as `content` frames closed by `done`. A failure after
/// the stream opened is reported as a single `error` frame.
#[utoipa::path(
    post,
    path = "/chat/stream",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Server-sent event stream of frames", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Empty message")
    ),
    tag = "chat"
)]
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let messages = ChatService::build_messages(&payload)?;

    tracing::debug!(history = payload.conversation_history.len(), "Opening chat stream");
    Ok(sse_frames(state.chat.stream_chat(messages)))
}
