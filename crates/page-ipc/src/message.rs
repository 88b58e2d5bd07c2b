//! Wire messages.

use page_core::RenderRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IpcError;

/// A message from the host to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    /// A render request (`{"type":"headers","data":{...}}`).
    Headers(RenderRequest),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<Value>,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a T,
}

impl IncomingMessage {
    /// Wire tag of the `Headers` variant.
    pub const HEADERS: &'static str = "headers";

    /// Decode a frame payload.
    ///
    /// The type tag is checked before the payload so that an unknown tag is
    /// reported as such, not as a shape mismatch. A missing or non-string
    /// tag is unknown too; it renders as `undefined` or as its JSON text.
    pub fn decode(payload: &[u8]) -> Result<Self, IpcError> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        match envelope.kind {
            Some(Value::String(kind)) if kind == Self::HEADERS => {
                Ok(Self::Headers(serde_json::from_value(envelope.data)?))
            }
            Some(Value::String(kind)) => Err(IpcError::UnexpectedMessageType(kind)),
            None => Err(IpcError::UnexpectedMessageType("undefined".to_string())),
            Some(other) => Err(IpcError::UnexpectedMessageType(other.to_string())),
        }
    }

    /// Encode to a frame payload.
    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        let bytes = match self {
            Self::Headers(request) => serde_json::to_vec(&EnvelopeRef {
                kind: Self::HEADERS,
                data: request,
            })?,
        };
        Ok(bytes)
    }
}

/// A rendered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Ordered header pairs, serialized as `[name, value]` arrays.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl PageResponse {
    /// Create a response.
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get the first header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The single result of one request cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingResponse {
    /// Answer the request directly.
    Response(PageResponse),
    /// Ask the host to re-route the request to another internal path.
    Rewrite { path: String },
}

impl OutgoingResponse {
    /// Status code, if this is a direct response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response(response) => Some(response.status_code),
            Self::Rewrite { .. } => None,
        }
    }
}

/// Description of a fatal worker failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error class name.
    pub name: String,
    /// Top-level message.
    pub message: String,
    /// Cause chain, one cause per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorReport {
    /// Build a report from an error and its source chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            name: "Error".to_string(),
            message: error.to_string(),
            stack: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }
}

/// A message from the worker to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Response(PageResponse),
    Rewrite { path: String },
    Error(ErrorReport),
}

impl From<OutgoingResponse> for OutgoingMessage {
    fn from(response: OutgoingResponse) -> Self {
        match response {
            OutgoingResponse::Response(response) => Self::Response(response),
            OutgoingResponse::Rewrite { path } => Self::Rewrite { path },
        }
    }
}

impl From<ErrorReport> for OutgoingMessage {
    fn from(report: ErrorReport) -> Self {
        Self::Error(report)
    }
}
