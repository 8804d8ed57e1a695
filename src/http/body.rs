//! Body parsing middleware behind the `@json`, `@raw`, `@text` and
//! `@urlencoded` descriptors.
//!
//! # Responsibilities
//! - Buffer the request body when its content type matches the parser
//! - Enforce a byte limit (413 beyond it)
//! - Parse into a [`ParsedBody`] request extension (400 when malformed)
//! - Put the buffered bytes back so later handlers can still read them
//!
//! # Design Decisions
//! - The first parser that accepts a request wins; later parsers see the
//!   `ParsedBody` extension and step aside
//! - Requests without a matching `Content-Type` pass through untouched

use std::fmt;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, header::CONTENT_TYPE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

/// Which body format a parser handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Raw,
    Text,
    UrlEncoded,
}

impl BodyKind {
    /// Content type matched when the options do not name one.
    pub fn default_content_type(&self) -> &'static str {
        match self {
            BodyKind::Json => "application/json",
            BodyKind::Raw => "application/octet-stream",
            BodyKind::Text => "text/plain",
            BodyKind::UrlEncoded => "application/x-www-form-urlencoded",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Json => "json",
            BodyKind::Raw => "raw",
            BodyKind::Text => "text",
            BodyKind::UrlEncoded => "urlencoded",
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum body size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLimit")]
pub struct ByteLimit(pub usize);

impl ByteLimit {
    pub const DEFAULT: ByteLimit = ByteLimit(100 * 1024);

    /// Parse `"100kb"`, `"1.5mb"`, `"512"` and the like.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        let number: f64 = number.parse().ok()?;
        let multiplier = match unit.trim() {
            "" | "b" => 1u64,
            "kb" => 1 << 10,
            "mb" => 1 << 20,
            "gb" => 1 << 30,
            _ => return None,
        };
        Some(ByteLimit((number * multiplier as f64) as usize))
    }
}

impl Default for ByteLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawLimit> for ByteLimit {
    type Error = String;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Bytes(n) => Ok(ByteLimit(n as usize)),
            RawLimit::Text(text) => {
                ByteLimit::parse(&text).ok_or_else(|| format!("invalid byte limit `{}`", text))
            }
        }
    }
}

/// Options read from the options bag entry a body descriptor names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BodyParserOptions {
    pub limit: ByteLimit,
    /// Content type to accept; `*/*`, `text/*` and `application/*+json`
    /// style wildcards are allowed.
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    /// JSON only: reject roots other than objects and arrays.
    pub strict: bool,
}

impl Default for BodyParserOptions {
    fn default() -> Self {
        Self {
            limit: ByteLimit::default(),
            content_type: None,
            strict: true,
        }
    }
}

/// A parsed request body, stored as a request extension.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Raw(Bytes),
    Text(String),
    Form(Vec<(String, String)>),
}

impl ParsedBody {
    /// Render the body as JSON, forms as an object of their pairs.
    pub fn to_json(&self) -> Value {
        match self {
            ParsedBody::Json(v) => v.clone(),
            ParsedBody::Raw(bytes) => Value::from(bytes.len()),
            ParsedBody::Text(text) => Value::from(text.as_str()),
            ParsedBody::Form(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            ),
        }
    }
}

/// One configured body parser.
#[derive(Debug, Clone)]
pub struct BodyParser {
    kind: BodyKind,
    options: Arc<BodyParserOptions>,
}

impl BodyParser {
    pub fn new(kind: BodyKind, options: BodyParserOptions) -> Self {
        Self {
            kind,
            options: Arc::new(options),
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn options(&self) -> &BodyParserOptions {
        &self.options
    }

    pub fn content_type(&self) -> &str {
        self.options
            .content_type
            .as_deref()
            .unwrap_or_else(|| self.kind.default_content_type())
    }

    fn applies_to(&self, req: &Request) -> bool {
        if req.extensions().get::<ParsedBody>().is_some() {
            return false;
        }
        req.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| mime_matches(self.content_type(), ct))
            .unwrap_or(false)
    }

    /// Parse the body if this parser applies, then continue.
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        if !self.applies_to(&req) {
            return next.run(req).await;
        }
        let limit = self.options.limit.0;
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            tracing::warn!(parser = %self.kind, limit, "Request body exceeds limit");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request entity too large").into_response();
        }

        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(parser = %self.kind, limit, error = %e, "Failed to buffer request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "request entity too large").into_response();
            }
        };

        let parsed = match self.parse(&bytes) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::debug!(parser = %self.kind, reason = %reason, "Rejected request body");
                return (StatusCode::BAD_REQUEST, reason).into_response();
            }
        };

        let mut req = Request::from_parts(parts, Body::from(bytes));
        req.extensions_mut().insert(parsed);
        next.run(req).await
    }

    fn parse(&self, bytes: &Bytes) -> Result<ParsedBody, String> {
        match self.kind {
            BodyKind::Json => {
                let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
                match first {
                    None => Ok(ParsedBody::Json(Value::Object(Default::default()))),
                    Some(b) if self.options.strict && *b != b'{' && *b != b'[' => {
                        Err("strict mode only accepts objects and arrays".to_string())
                    }
                    Some(_) => serde_json::from_slice(bytes)
                        .map(ParsedBody::Json)
                        .map_err(|e| format!("invalid json: {}", e)),
                }
            }
            BodyKind::Raw => Ok(ParsedBody::Raw(bytes.clone())),
            BodyKind::Text => String::from_utf8(bytes.to_vec())
                .map(ParsedBody::Text)
                .map_err(|_| "body is not valid utf-8".to_string()),
            BodyKind::UrlEncoded => Ok(ParsedBody::Form(
                url::form_urlencoded::parse(bytes).into_owned().collect(),
            )),
        }
    }
}

/// Axum middleware entry point, installed with `from_fn_with_state`.
pub async fn body_parser_middleware(
    State(parser): State<BodyParser>,
    req: Request,
    next: Next,
) -> Response {
    parser.handle(req, next).await
}

/// Match a `Content-Type` header value against an accepted type pattern.
fn mime_matches(pattern: &str, header: &str) -> bool {
    let essence = header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let pattern = pattern.trim().to_ascii_lowercase();
    let Some((kind, sub)) = essence.split_once('/') else {
        return false;
    };
    let Some((want_kind, want_sub)) = pattern.split_once('/') else {
        return false;
    };
    let kind_ok = want_kind == "*" || want_kind == kind;
    let sub_ok = match want_sub.strip_prefix("*+") {
        Some(suffix) => sub.ends_with(&format!("+{}", suffix)),
        None => want_sub == "*" || want_sub == sub,
    };
    kind_ok && sub_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn_with_state, routing::post, Extension, Router};
    use tower::ServiceExt;

    async fn echo(parsed: Option<Extension<ParsedBody>>, body: Bytes) -> Response {
        let kind = match parsed {
            Some(Extension(ParsedBody::Json(_))) => "json",
            Some(Extension(ParsedBody::Raw(_))) => "raw",
            Some(Extension(ParsedBody::Text(_))) => "text",
            Some(Extension(ParsedBody::Form(_))) => "form",
            None => "none",
        };
        format!("{}:{}", kind, body.len()).into_response()
    }

    fn app(parser: BodyParser) -> Router {
        Router::new()
            .route("/", post(echo))
            .layer(from_fn_with_state(parser, body_parser_middleware))
    }

    async fn send(router: Router, content_type: &str, body: &'static str) -> (StatusCode, String) {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_byte_limit_parse() {
        assert_eq!(ByteLimit::parse("100kb"), Some(ByteLimit(102_400)));
        assert_eq!(ByteLimit::parse("1MB"), Some(ByteLimit(1_048_576)));
        assert_eq!(ByteLimit::parse("512"), Some(ByteLimit(512)));
        assert_eq!(ByteLimit::parse("1.5kb"), Some(ByteLimit(1536)));
        assert_eq!(ByteLimit::parse("lots"), None);
    }

    #[test]
    fn test_options_deserialize() {
        let opts: BodyParserOptions =
            serde_json::from_value(serde_json::json!({ "limit": "1kb", "type": "text/*" })).unwrap();
        assert_eq!(opts.limit, ByteLimit(1024));
        assert_eq!(opts.content_type.as_deref(), Some("text/*"));
        assert!(opts.strict);

        let opts: BodyParserOptions = serde_json::from_value(serde_json::json!({ "limit": 10 })).unwrap();
        assert_eq!(opts.limit, ByteLimit(10));
    }

    #[test]
    fn test_mime_matches() {
        assert!(mime_matches("application/json", "application/json; charset=utf-8"));
        assert!(mime_matches("text/*", "text/html"));
        assert!(mime_matches("*/*", "image/png"));
        assert!(mime_matches("application/*+json", "application/vnd.api+json"));
        assert!(!mime_matches("application/json", "text/plain"));
        assert!(!mime_matches("application/json", "garbage"));
    }

    #[tokio::test]
    async fn test_json_parsed_and_body_restored() {
        let parser = BodyParser::new(BodyKind::Json, BodyParserOptions::default());
        let (status, body) = send(app(parser), "application/json", r#"{"a":1}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "json:7");
    }

    #[tokio::test]
    async fn test_json_strict_and_malformed() {
        let parser = BodyParser::new(BodyKind::Json, BodyParserOptions::default());
        let (status, _) = send(app(parser.clone()), "application/json", "42").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(app(parser), "application/json", "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let lenient = BodyParser::new(
            BodyKind::Json,
            BodyParserOptions {
                strict: false,
                ..Default::default()
            },
        );
        let (status, _) = send(app(lenient), "application/json", "42").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_limit_exceeded() {
        let parser = BodyParser::new(
            BodyKind::Text,
            BodyParserOptions {
                limit: ByteLimit(4),
                ..Default::default()
            },
        );
        let (status, _) = send(app(parser), "text/plain", "too long").await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_other_content_type_passes_through() {
        let parser = BodyParser::new(BodyKind::Json, BodyParserOptions::default());
        let (status, body) = send(app(parser), "text/plain", "hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "none:5");
    }

    #[tokio::test]
    async fn test_urlencoded() {
        let parser = BodyParser::new(BodyKind::UrlEncoded, BodyParserOptions::default());
        let bytes = Bytes::from_static(b"a=1&b=two+words");
        assert_eq!(
            parser.parse(&bytes).unwrap(),
            ParsedBody::Form(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two words".to_string()),
            ])
        );
        let (status, body) = send(app(parser), "application/x-www-form-urlencoded", "a=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "form:3");
    }
}
