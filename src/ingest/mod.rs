//! Ingestion & extraction: turn an uploaded file or pasted text into a transcript.
//!
//! Uploads are staged on disk by the HTTP layer and lent to extraction as a [`StagedUpload`].
//! The caller keeps ownership and removes the file once the whole request has finished, so a
//! failure anywhere in the pipeline still cleans up.

mod upload;

pub use upload::StagedUpload;

use thiserror::Error;

/// Media type that routes an upload through PDF text extraction.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
/// Minimum length of a usable transcript after trimming, counted in UTF-16 code units.
pub const MIN_TRANSCRIPT_CHARS: usize = 10;

/// Errors raised while producing a transcript.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request did not carry enough text to summarize.
    #[error("No usable transcript text.")]
    Validation,
    /// An uploaded PDF could not be converted to text.
    #[error("Could not parse PDF file")]
    Extraction(String),
    /// The staged upload could not be read back from disk.
    #[error("Could not read uploaded file")]
    Read(#[source] std::io::Error),
}

/// Inbound document to summarize, as decoded from the HTTP request.
#[derive(Debug, Default)]
pub struct SummarizationRequest {
    /// File uploaded in the `transcript` form field.
    pub upload: Option<StagedUpload>,
    /// Transcript pasted into the `transcriptContent` field.
    pub pasted: Option<String>,
    /// Caller instruction from the `transcriptText` field.
    pub instruction: Option<String>,
}

/// Plain-text transcript that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    /// Validate raw text, rejecting transcripts that are too short once trimmed.
    ///
    /// Whitespace and byte order marks are trimmed from both ends. Characters outside the
    /// Basic Multilingual Plane count twice.
    pub fn new(text: String) -> Result<Self, IngestError> {
        let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
        if trimmed.encode_utf16().count() < MIN_TRANSCRIPT_CHARS {
            return Err(IngestError::Validation);
        }
        Ok(Self(text))
    }

    /// Borrow the transcript text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the transcript and return the owned text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Produce a transcript from an upload or pasted text.
///
/// An upload always wins over pasted text. PDFs are parsed, any other media type is decoded as
/// UTF-8 with invalid sequences replaced. The staged file is left in place for the caller.
pub async fn extract_transcript(
    upload: Option<&StagedUpload>,
    pasted: Option<String>,
) -> Result<Transcript, IngestError> {
    let text = match upload {
        Some(upload) => read_upload(upload).await?,
        None => pasted.unwrap_or_default(),
    };
    Transcript::new(text)
}

async fn read_upload(upload: &StagedUpload) -> Result<String, IngestError> {
    let is_pdf = upload.media_type() == Some(PDF_MEDIA_TYPE);
    let bytes = match tokio::fs::read(upload.path()).await {
        Ok(bytes) => bytes,
        Err(err) if is_pdf => {
            tracing::error!(path = %upload.path().display(), error = %err, "PDF parsing error");
            return Err(IngestError::Extraction(err.to_string()));
        }
        Err(err) => return Err(IngestError::Read(err)),
    };

    if is_pdf {
        extract_pdf_text(bytes).await
    } else {
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Extract text from PDF bytes on the blocking pool.
///
/// The parser may panic on malformed documents; a panic is reported like any other parse
/// failure.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, IngestError> {
    let outcome = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|err| err.to_string())
    })
    .await
    .map_err(|join_error| join_error.to_string())
    .and_then(|parsed| parsed);

    outcome.map_err(|detail| {
        tracing::error!(error = %detail, "PDF parsing error");
        IngestError::Extraction(detail)
    })
}

/// Build a one-page PDF whose only content is `text` set in Helvetica.
#[cfg(test)]
pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}
