//! Minimal web front end for interactive summarization.
//!
//! Routes:
//! - `GET /` renders the input form
//! - `POST /summarize` renders the summary for the submitted dialogue
//! - `GET /health` returns `ok`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::errors::{Result, SummarizerError};
use crate::predict::{is_blank, Summarize, EMPTY_INPUT_WARNING};

const TITLE: &str = "Dialogue Summarizer";

#[derive(Clone)]
struct AppState {
    summarizer: Arc<dyn Summarize>,
}

#[derive(Debug, Deserialize)]
struct SummarizeForm {
    #[serde(default)]
    text: String,
}

/// What the page shows below the form.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Summary(String),
    Warning(&'static str),
    Error(String),
}

/// Builds the application router.
pub fn router(summarizer: Arc<dyn Summarize>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/summarize", post(summarize))
        .route("/health", get(health))
        .with_state(AppState { summarizer })
}

/// Serves the application on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, summarizer: Arc<dyn Summarize>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SummarizerError::Pipeline(format!("cannot bind {addr}: {e}")))?;
    tracing::info!(%addr, "Serving summarizer UI");
    serve_with_shutdown(listener, summarizer, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Serves on an already bound listener until `shutdown` resolves, then
/// drains in-flight requests.
pub async fn serve_with_shutdown<F>(
    listener: tokio::net::TcpListener,
    summarizer: Arc<dyn Summarize>,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(summarizer))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SummarizerError::Pipeline(format!("server error: {e}")))?;
    tracing::info!("Summarizer UI stopped");
    Ok(())
}

async fn index() -> Html<String> {
    Html(render_page("", None))
}

async fn health() -> &'static str {
    "ok"
}

async fn summarize(State(state): State<AppState>, Form(form): Form<SummarizeForm>) -> Response {
    if is_blank(&form.text) {
        return Html(render_page(&form.text, Some(&Outcome::Warning(EMPTY_INPUT_WARNING))))
            .into_response();
    }

    let summarizer = Arc::clone(&state.summarizer);
    let text = form.text.clone();
    let result = tokio::task::spawn_blocking(move || summarizer.predict(&text))
        .await
        .unwrap_or_else(|e| Err(SummarizerError::Model(format!("prediction task failed: {e}"))));

    match result {
        Ok(summary) => {
            Html(render_page(&form.text, Some(&Outcome::Summary(summary)))).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, error_kind = err.kind(), "Prediction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_page(&form.text, Some(&Outcome::Error(err.to_string())))),
            )
                .into_response()
        }
    }
}

fn render_page(input: &str, outcome: Option<&Outcome>) -> String {
    let result = match outcome {
        None => String::new(),
        Some(Outcome::Summary(summary)) => format!(
            "<section class=\"summary\"><h2>Summary</h2><p>{}</p></section>",
            html_escape::encode_text(summary)
        ),
        Some(Outcome::Warning(message)) => format!(
            "<p class=\"warning\">{}</p>",
            html_escape::encode_text(message)
        ),
        Some(Outcome::Error(message)) => format!(
            "<p class=\"error\">Summarization failed: {}</p>",
            html_escape::encode_text(message)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{TITLE}</title></head>
<body>
<h1>{TITLE}</h1>
<form method="post" action="/summarize">
<label for="text">Enter the dialogue to summarize</label>
<textarea id="text" name="text" rows="12" cols="80">{input}</textarea>
<button type="submit">Summarize</button>
</form>
{result}
<section class="about">
<h2>About</h2>
<p>Summarizes chat-style dialogues with a T5 model fine-tuned on the SAMSum corpus.</p>
</section>
</body>
</html>
"#,
        input = html_escape::encode_text(input),
    )
}
