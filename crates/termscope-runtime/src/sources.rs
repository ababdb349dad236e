//! Ingestion: turn a source reference into a [`Document`].
//!
//! Sources never retry. A failed fetch is terminal for the request that made
//! it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use termscope_core::{Document, FetchError, SourceKind};

/// Cap on text extracted from a web page, in characters.
pub const MAX_PAGE_CHARS: usize = 12_000;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, kind: SourceKind, source_ref: &str) -> Result<Document, FetchError>;
}

/// Plain-text files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch(&self, kind: SourceKind, source_ref: &str) -> Result<Document, FetchError> {
        match kind {
            SourceKind::Text => {}
            other => return Err(FetchError::Unsupported(other)),
        }
        if Path::new(source_ref)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            return Err(FetchError::Unsupported(SourceKind::Pdf));
        }

        let bytes = tokio::fs::read(source_ref).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(source_ref.to_string()),
            _ => FetchError::Network(format!("{}: {}", source_ref, e)),
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| FetchError::Malformed(format!("{} is not valid UTF-8 text", source_ref)))?;

        tracing::debug!(source_ref, chars = text.chars().count(), "Read document file");
        Ok(Document::new(SourceKind::Text, source_ref, text))
    }
}

/// Routes each source kind to the source that handles it.
#[derive(Clone)]
pub struct SourceRouter {
    text: Arc<dyn DocumentSource>,
    url: Option<Arc<dyn DocumentSource>>,
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self {
            text: Arc::new(FileSource),
            url: None,
        }
    }
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.text = source;
        self
    }

    pub fn with_url_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.url = Some(source);
        self
    }

    /// Router with the HTTP source when the `http` feature is enabled.
    pub fn with_defaults() -> Result<Self, FetchError> {
        #[cfg(feature = "http")]
        {
            Ok(Self::default().with_url_source(Arc::new(HttpSource::new()?)))
        }
        #[cfg(not(feature = "http"))]
        {
            Ok(Self::default())
        }
    }
}

#[async_trait]
impl DocumentSource for SourceRouter {
    async fn fetch(&self, kind: SourceKind, source_ref: &str) -> Result<Document, FetchError> {
        match kind {
            SourceKind::Text => self.text.fetch(kind, source_ref).await,
            SourceKind::Url => match &self.url {
                Some(source) => source.fetch(kind, source_ref).await,
                None => Err(FetchError::Unsupported(SourceKind::Url)),
            },
            SourceKind::Pdf | SourceKind::DirectoryEntry => Err(FetchError::Unsupported(kind)),
        }
    }
}

lazy_static! {
    static ref NON_CONTENT: Vec<Regex> = ["script", "style", "nav", "header", "footer", "noscript"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect();

    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();

    static ref BLOCK_BREAK: Regex =
        Regex::new(r"(?i)<(?:br\s*/?|/p|/div|/li|/h[1-6]|/tr|/section|/article)\s*>").unwrap();

    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();

    static ref SPACES: Regex = Regex::new(r"[ \t\x{a0}]+").unwrap();
}

/// Visible text of an HTML page.
///
/// Drops script, style and page-chrome elements, keeps block boundaries as
/// line breaks, and caps the result at `max_chars` characters.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let mut text = COMMENT.replace_all(html, "").into_owned();
    for pattern in NON_CONTENT.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    let lines: Vec<String> = text
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    let joined = lines.join("\n");

    match joined.char_indices().nth(max_chars) {
        Some((idx, _)) => joined[..idx].to_string(),
        None => joined,
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&amp;", "&")
}

/// Web pages over HTTP(S).
#[cfg(feature = "http")]
pub struct HttpSource {
    client: reqwest::Client,
    max_chars: usize,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("termscope/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            max_chars: MAX_PAGE_CHARS,
        })
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, kind: SourceKind, source_ref: &str) -> Result<Document, FetchError> {
        if kind != SourceKind::Url {
            return Err(FetchError::Unsupported(kind));
        }
        if !source_ref.starts_with("http://") && !source_ref.starts_with("https://") {
            return Err(FetchError::Malformed(format!("not an http(s) URL: {}", source_ref)));
        }

        tracing::info!(url = %source_ref, "Fetching document");
        let response = self
            .client
            .get(source_ref)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(FetchError::NotFound(source_ref.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Network(format!("{} returned {}", source_ref, status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if content_type.contains("pdf") {
            return Err(FetchError::Unsupported(SourceKind::Pdf));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let text = if content_type.contains("html") || body.trim_start().starts_with('<') {
            extract_text(&body, self.max_chars)
        } else {
            extract_text(&body.replace('<', "&lt;"), self.max_chars)
        };

        tracing::debug!(url = %source_ref, chars = text.chars().count(), "Extracted page text");
        Ok(Document::new(SourceKind::Url, source_ref, text))
    }
}
