//! HTTP surface for AskDoc.
//!
//! - `POST /api/summarize` – Multipart (`transcript` file, `transcriptText` instruction,
//!   `transcriptContent` pasted text) or JSON (`transcriptText`, `transcriptContent`). Returns
//!   `{ "summary": <string|object> }`.
//! - `POST /api/send` – JSON `{ to, subject, bodyHtml }`. Returns `{ "ok": true, "id" }`.
//!
//! Client errors answer `400 { "error" }` (`413` for bodies over the route limit); downstream
//! failures answer `500 { "error", "detail" }` with the underlying error text in `detail`.

use crate::ingest::{self, IngestError, StagedUpload, SummarizationRequest};
use crate::notification::{self, EmailReceipt, EmailRequest, Mailer, NotificationError};
use crate::summarization::{self, SummarizationClient, SummarizationClientError, SummaryResult};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, FromRequest, Multipart, Request, State, multipart::MultipartError,
    },
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Largest accepted `/api/summarize` body, uploads included.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
/// Largest accepted `/api/send` body.
pub const MAX_JSON_BYTES: usize = 5 * 1024 * 1024;

/// Collaborators shared by every request.
///
/// Built once at startup; handlers only read from it.
pub struct AppState {
    /// Completion provider used by the summarization endpoint.
    pub summarizer: Arc<dyn SummarizationClient>,
    /// Mail transport used by the send endpoint.
    pub mailer: Arc<dyn Mailer>,
    /// Directory where uploads are staged while a request runs.
    pub upload_dir: PathBuf,
}

/// Build the HTTP router exposing the summarize and send endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/summarize",
            post(summarize_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/send",
            post(send_email).layer(DefaultBodyLimit::max(MAX_JSON_BYTES)),
        )
        .with_state(Arc::new(state))
}

/// JSON variant of the `POST /api/summarize` body.
#[derive(Deserialize)]
struct SummarizeJson {
    /// Optional instruction steering the summary.
    #[serde(default, rename = "transcriptText")]
    transcript_text: Option<String>,
    /// Pasted transcript.
    #[serde(default, rename = "transcriptContent")]
    transcript_content: Option<String>,
}

/// Success response for `POST /api/summarize`.
#[derive(Serialize)]
struct SummarizeResponse {
    summary: SummaryResult,
}

/// Extract a transcript from the request and summarize it.
///
/// A staged upload is removed once the request has an outcome, whether it succeeded or not.
async fn summarize_document(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<SummarizeResponse>, AppError> {
    let SummarizationRequest {
        upload,
        pasted,
        instruction,
    } = read_submission(&state.upload_dir, request).await?;
    let outcome =
        summarize_submission(&state, upload.as_ref(), pasted, instruction.as_deref()).await;
    if let Some(upload) = upload {
        upload.remove().await;
    }

    let summary = outcome?;
    tracing::info!(
        structured = matches!(summary, SummaryResult::Structured(_)),
        summary_chars = summary.render_text().chars().count(),
        "Summarize request completed"
    );
    Ok(Json(SummarizeResponse { summary }))
}

async fn summarize_submission(
    state: &AppState,
    upload: Option<&StagedUpload>,
    pasted: Option<String>,
    instruction: Option<&str>,
) -> Result<SummaryResult, AppError> {
    let transcript = ingest::extract_transcript(upload, pasted).await?;
    let summary =
        summarization::summarize(state.summarizer.as_ref(), transcript, instruction).await?;
    Ok(summary)
}

/// Decode either body flavour. Bodies that are neither multipart nor JSON carry nothing.
async fn read_submission(
    upload_dir: &Path,
    request: Request,
) -> Result<SummarizationRequest, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rejection| AppError::rejected(rejection.status(), rejection.body_text()))?;
        read_multipart(upload_dir, multipart).await
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<SummarizeJson>::from_request(request, &())
            .await
            .map_err(|rejection| AppError::rejected(rejection.status(), rejection.body_text()))?;
        Ok(SummarizationRequest {
            upload: None,
            pasted: body.transcript_content,
            instruction: body.transcript_text,
        })
    } else {
        Ok(SummarizationRequest::default())
    }
}

/// Collect the multipart fields, removing any staged upload if the body turns out unreadable.
async fn read_multipart(
    upload_dir: &Path,
    mut multipart: Multipart,
) -> Result<SummarizationRequest, AppError> {
    let mut submission = SummarizationRequest::default();
    match read_fields(upload_dir, &mut multipart, &mut submission).await {
        Ok(()) => Ok(submission),
        Err(error) => {
            if let Some(upload) = submission.upload.take() {
                upload.remove().await;
            }
            Err(error)
        }
    }
}

async fn read_fields(
    upload_dir: &Path,
    multipart: &mut Multipart,
    submission: &mut SummarizationRequest,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(AppError::from)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("transcript") => {
                let media_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(AppError::from)?;
                let upload = StagedUpload::write(upload_dir, &bytes, media_type)
                    .await
                    .map_err(AppError::Staging)?;
                if let Some(previous) = submission.upload.replace(upload) {
                    previous.remove().await;
                }
            }
            Some("transcriptText") => {
                submission.instruction = Some(field.text().await.map_err(AppError::from)?);
            }
            Some("transcriptContent") => {
                submission.pasted = Some(field.text().await.map_err(AppError::from)?);
            }
            other => tracing::debug!(field = ?other, "Ignoring unknown multipart field"),
        }
    }
    Ok(())
}

/// Relay an email. A missing or undecodable body counts as every field missing.
async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<EmailRequest>>,
) -> Result<Json<EmailReceipt>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let receipt = notification::dispatch(state.mailer.as_ref(), request).await?;
    Ok(Json(receipt))
}

/// Failure of a single request, translated into a JSON error response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Transcript could not be produced.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Completion provider failed.
    #[error(transparent)]
    Summarization(#[from] SummarizationClientError),
    /// Email validation or delivery failed.
    #[error(transparent)]
    Notification(#[from] NotificationError),
    /// Uploaded file could not be written to the staging directory.
    #[error("Could not store uploaded file")]
    Staging(#[source] std::io::Error),
    /// Request body could not be decoded or exceeded the size limit.
    #[error("{message}")]
    Rejected {
        /// Status chosen by the body extractor (400 or 413).
        status: StatusCode,
        /// Client-facing reason.
        message: String,
    },
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self::rejected(error.status(), error.body_text())
    }
}

impl AppError {
    fn rejected(status: StatusCode, message: String) -> Self {
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            format!(
                "Request body exceeds the {} MiB limit",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )
        } else {
            message
        };
        Self::Rejected { status, message }
    }

    /// Error category reported in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ingest(IngestError::Validation)
            | Self::Notification(NotificationError::Validation)
            | Self::Rejected { .. } => "ValidationError",
            Self::Ingest(IngestError::Extraction(_)) => "ExtractionError",
            Self::Ingest(IngestError::Read(_)) | Self::Staging(_) => "UploadError",
            Self::Summarization(_) => "SummarizationError",
            Self::Notification(NotificationError::Delivery(_)) => "DeliveryError",
        }
    }

    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::Ingest(IngestError::Validation | IngestError::Extraction(_))
            | Self::Notification(NotificationError::Validation) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(self.to_string()))
            }
            Self::Rejected { status, message } => (*status, ErrorBody::new(message.clone())),
            Self::Ingest(IngestError::Read(source)) | Self::Staging(source) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(self.to_string()).with_detail(source.to_string()),
            ),
            Self::Summarization(source) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Summarization failed").with_detail(source.to_string()),
            ),
            Self::Notification(NotificationError::Delivery(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Email failed").with_detail(detail.clone()),
            ),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, detail = ?body.detail, "Request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::OutgoingEmail;
    use crate::summarization::CompletionRequest;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request as HttpRequest},
    };
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "askdoc-test-boundary";
    const TRANSCRIPT: &str = "This is a sufficiently long transcript for testing.";

    struct StubSummarizer {
        requests: Mutex<Vec<CompletionRequest>>,
        reply: Result<String, String>,
        clear_on_call: Mutex<Option<PathBuf>>,
    }

    impl StubSummarizer {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: Ok(reply.into()),
                clear_on_call: Mutex::new(None),
            })
        }

        fn failing(detail: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                reply: Err(detail.into()),
                clear_on_call: Mutex::new(None),
            })
        }

        /// Delete every file in `dir` while the completion is in flight.
        fn clear_dir_on_call(&self, dir: PathBuf) {
            *self.clear_on_call.lock().expect("lock") = Some(dir);
        }

        fn recorded(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl SummarizationClient for StubSummarizer {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<String, SummarizationClientError> {
            self.requests.lock().expect("lock").push(request);
            let clear = self.clear_on_call.lock().expect("lock").clone();
            if let Some(dir) = clear {
                for entry in std::fs::read_dir(dir).expect("upload dir") {
                    std::fs::remove_file(entry.expect("entry").path()).expect("remove");
                }
            }
            self.reply
                .clone()
                .map_err(SummarizationClientError::GenerationFailed)
        }
    }

    #[derive(Default)]
    struct StubMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl Mailer for StubMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<String, NotificationError> {
            if let Some(detail) = &self.fail_with {
                return Err(NotificationError::Delivery(detail.clone()));
            }
            let mut sent = self.sent.lock().expect("lock");
            sent.push(email);
            Ok(format!("<message-{}@example.org>", sent.len()))
        }
    }

    struct Harness {
        router: Router,
        summarizer: Arc<StubSummarizer>,
        mailer: Arc<StubMailer>,
        uploads: TempDir,
    }

    impl Harness {
        fn new(summarizer: Arc<StubSummarizer>, mailer: StubMailer) -> Self {
            let uploads = tempfile::tempdir().expect("tempdir");
            let mailer = Arc::new(mailer);
            let router = create_router(AppState {
                summarizer: summarizer.clone(),
                mailer: mailer.clone(),
                upload_dir: uploads.path().join("uploads"),
            });
            Self {
                router,
                summarizer,
                mailer,
                uploads,
            }
        }

        fn upload_dir(&self) -> PathBuf {
            self.uploads.path().join("uploads")
        }

        fn staged_files(&self) -> usize {
            std::fs::read_dir(self.upload_dir())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }

        async fn call(&self, request: HttpRequest<Body>) -> (StatusCode, Value) {
            let response = self
                .router
                .clone()
                .oneshot(request)
                .await
                .expect("router response");
            let status = response.status();
            let body = to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body bytes");
            let json = serde_json::from_slice(&body).expect("json body");
            (status, json)
        }
    }

    enum Part<'a> {
        File {
            content_type: &'a str,
            bytes: &'a [u8],
        },
        Text(&'a str, &'a str),
    }

    fn multipart_request(parts: &[Part<'_>]) -> HttpRequest<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File {
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"transcript\"; filename=\"notes\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        HttpRequest::builder()
            .method(Method::POST)
            .uri("/api/summarize")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn json_request(uri: &str, payload: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn pasted_text_uses_default_instruction() {
        let harness = Harness::new(
            StubSummarizer::replying("Short summary."),
            StubMailer::default(),
        );

        let (status, body) = harness
            .call(json_request(
                "/api/summarize",
                json!({ "transcriptContent": TRANSCRIPT, "transcriptText": "   " }),
            ))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "summary": "Short summary." }));
        let recorded = harness.summarizer.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].parts,
            vec![
                "Summarize the following document.".to_string(),
                TRANSCRIPT.to_string()
            ]
        );
        assert_eq!(recorded[0].model, "gemini-2.0-flash");
        assert_eq!(recorded[0].temperature, 0.2);
    }

    #[tokio::test]
    async fn uploaded_text_file_is_summarized_with_instruction_and_removed() {
        let harness = Harness::new(
            StubSummarizer::replying(r#"{"key_points":["Risk A","Risk B","Risk C"]}"#),
            StubMailer::default(),
        );
        let content = "Déjà vu: line one\nline two with émojis 🎉\n";

        let (status, body) = harness
            .call(multipart_request(&[
                Part::File {
                    content_type: "text/plain",
                    bytes: content.as_bytes(),
                },
                Part::Text("transcriptText", "List the top 3 risks"),
                Part::Text("transcriptContent", "ignored because a file was uploaded"),
            ]))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "summary": { "key_points": ["Risk A", "Risk B", "Risk C"] } })
        );
        let recorded = harness.summarizer.recorded();
        assert_eq!(
            recorded[0].parts,
            vec!["List the top 3 risks".to_string(), content.to_string()]
        );
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn unparsable_pdf_is_rejected_and_removed() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());

        let (status, body) = harness
            .call(multipart_request(&[Part::File {
                content_type: "application/pdf",
                bytes: b"%PDF-1.4 truncated garbage",
            }]))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Could not parse PDF file" }));
        assert!(harness.summarizer.recorded().is_empty());
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn missing_or_short_transcript_is_rejected() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());
        let expected = json!({ "error": "No usable transcript text." });

        let empty = HttpRequest::builder()
            .method(Method::POST)
            .uri("/api/summarize")
            .body(Body::empty())
            .expect("request");
        assert_eq!(
            harness.call(empty).await,
            (StatusCode::BAD_REQUEST, expected.clone())
        );

        let short = json_request("/api/summarize", json!({ "transcriptContent": " short " }));
        assert_eq!(
            harness.call(short).await,
            (StatusCode::BAD_REQUEST, expected.clone())
        );

        let tiny_upload = multipart_request(&[Part::File {
            content_type: "text/plain",
            bytes: b"tiny",
        }]);
        assert_eq!(
            harness.call(tiny_upload).await,
            (StatusCode::BAD_REQUEST, expected)
        );
        assert_eq!(harness.staged_files(), 0);
        assert!(harness.summarizer.recorded().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_returns_detail() {
        let harness = Harness::new(
            StubSummarizer::failing("quota exceeded"),
            StubMailer::default(),
        );

        let (status, body) = harness
            .call(multipart_request(&[Part::File {
                content_type: "text/markdown",
                bytes: TRANSCRIPT.as_bytes(),
            }]))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Summarization failed");
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.contains("quota exceeded"))
        );
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn pdf_upload_text_reaches_the_provider() {
        let harness = Harness::new(
            StubSummarizer::replying("Roadmap summary."),
            StubMailer::default(),
        );
        let pdf = ingest::sample_pdf("Quarterly review of the roadmap");

        let (status, body) = harness
            .call(multipart_request(&[
                Part::File {
                    content_type: "application/pdf",
                    bytes: &pdf,
                },
                Part::Text("transcriptText", "Summarize the roadmap"),
            ]))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "summary": "Roadmap summary." }));
        let recorded = harness.summarizer.recorded();
        assert_eq!(recorded[0].parts[0], "Summarize the roadmap");
        let extracted = recorded[0].parts[1]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        assert!(
            extracted.contains("Quarterly review of the roadmap"),
            "unexpected PDF text: {extracted:?}"
        );
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());
        let oversized = vec![b'a'; MAX_UPLOAD_BYTES + 1];

        let (status, body) = harness
            .call(multipart_request(&[Part::File {
                content_type: "text/plain",
                bytes: &oversized,
            }]))
            .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body,
            json!({ "error": "Request body exceeds the 25 MiB limit" })
        );
        assert!(harness.summarizer.recorded().is_empty());
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn astral_characters_count_twice_toward_the_minimum() {
        let harness = Harness::new(StubSummarizer::replying("Party."), StubMailer::default());

        let (status, _) = harness
            .call(json_request(
                "/api/summarize",
                json!({ "transcriptContent": "🎉🎉🎉🎉🎉" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = harness
            .call(json_request(
                "/api/summarize",
                json!({ "transcriptContent": "\u{FEFF}123456789" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No usable transcript text." }));
    }

    #[tokio::test]
    async fn summary_is_returned_when_upload_cleanup_fails() {
        let harness = Harness::new(
            StubSummarizer::replying("Still summarized."),
            StubMailer::default(),
        );
        harness.summarizer.clear_dir_on_call(harness.upload_dir());

        let (status, body) = harness
            .call(multipart_request(&[Part::File {
                content_type: "text/plain",
                bytes: TRANSCRIPT.as_bytes(),
            }]))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "summary": "Still summarized." }));
        assert_eq!(harness.summarizer.recorded()[0].parts[1], TRANSCRIPT);
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn repeated_file_fields_keep_only_the_last_upload() {
        let harness = Harness::new(StubSummarizer::replying("Done."), StubMailer::default());

        let (status, _) = harness
            .call(multipart_request(&[
                Part::File {
                    content_type: "text/plain",
                    bytes: b"First upload that gets replaced.",
                },
                Part::File {
                    content_type: "text/plain",
                    bytes: TRANSCRIPT.as_bytes(),
                },
            ]))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(harness.summarizer.recorded()[0].parts[1], TRANSCRIPT);
        assert_eq!(harness.staged_files(), 0);
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/api/summarize")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let (status, body) = harness.call(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn send_relays_email_and_returns_message_id() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());
        let payload = json!({ "to": "a@b.com", "subject": "S", "bodyHtml": "<p>x</p>" });

        let (status, first) = harness
            .call(json_request("/api/send", payload.clone()))
            .await;
        let (_, second) = harness.call(json_request("/api/send", payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["ok"], true);
        assert!(first["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_ne!(first["id"], second["id"]);
        let sent = harness.mailer.sent.lock().expect("lock");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body_html, "<p>x</p>");
    }

    #[tokio::test]
    async fn send_rejects_any_missing_field() {
        let harness = Harness::new(StubSummarizer::replying("unused"), StubMailer::default());
        let expected = (
            StatusCode::BAD_REQUEST,
            json!({ "error": "Missing to/subject/bodyHtml" }),
        );

        for payload in [
            json!({ "subject": "S", "bodyHtml": "<p>x</p>" }),
            json!({ "to": "a@b.com", "subject": "", "bodyHtml": "<p>x</p>" }),
            json!({ "to": "a@b.com", "subject": "S" }),
            json!({}),
        ] {
            assert_eq!(
                harness.call(json_request("/api/send", payload)).await,
                expected
            );
        }

        let no_body = HttpRequest::builder()
            .method(Method::POST)
            .uri("/api/send")
            .body(Body::empty())
            .expect("request");
        assert_eq!(harness.call(no_body).await, expected);
        assert!(harness.mailer.sent.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_returns_detail() {
        let harness = Harness::new(
            StubSummarizer::replying("unused"),
            StubMailer {
                fail_with: Some("connection refused".into()),
                ..Default::default()
            },
        );

        let (status, body) = harness
            .call(json_request(
                "/api/send",
                json!({ "to": "a@b.com", "subject": "S", "bodyHtml": "<p>x</p>" }),
            ))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({ "error": "Email failed", "detail": "connection refused" })
        );
    }

    #[test]
    fn error_kinds_follow_taxonomy() {
        assert_eq!(
            AppError::from(IngestError::Validation).kind(),
            "ValidationError"
        );
        assert_eq!(
            AppError::from(IngestError::Extraction("bad xref".into())).kind(),
            "ExtractionError"
        );
        assert_eq!(
            AppError::from(SummarizationClientError::GenerationFailed("500".into())).kind(),
            "SummarizationError"
        );
        assert_eq!(
            AppError::from(NotificationError::Delivery("timeout".into())).kind(),
            "DeliveryError"
        );
        assert_eq!(
            AppError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "length limit".into()).kind(),
            "ValidationError"
        );
    }
}
