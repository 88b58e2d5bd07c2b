//! Boundary to the external page-rendering engine.

use async_trait::async_trait;
use page_core::{Headers, QueryParams, RenderRequest, RouteParams};
use serde_json::Value;

use crate::error::RenderError;
use crate::options::RenderOptions;

/// The request object handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    /// Dynamic route parameters, kept apart from the merged query.
    pub params: RouteParams,
}

impl EngineRequest {
    /// Build the engine's request view. Renders are always `GET`.
    pub fn from_request(request: &RenderRequest) -> Self {
        Self {
            url: request.url.clone(),
            method: "GET".to_string(),
            headers: request.headers.clone(),
            params: request.params.clone(),
        }
    }
}

/// Response object the engine may inspect while rendering.
///
/// Its status is preset so error pages can observe the 404 they are
/// rendering for. Writes to it do not reach the sent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseShim {
    pub status_code: u16,
}

impl ResponseShim {
    /// Create a shim with a preset status.
    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }
}

/// Buffered engine output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderResult {
    chunks: Vec<String>,
    content_type: Option<String>,
}

impl RenderResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a result from a complete body.
    pub fn from_string(body: impl Into<String>) -> Self {
        Self {
            chunks: vec![body.into()],
            content_type: None,
        }
    }

    /// Declare the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Append a chunk of output.
    pub fn push(&mut self, chunk: impl Into<String>) {
        self.chunks.push(chunk.into());
    }

    /// Declared content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Drain all chunks into one body.
    pub fn to_unchunked_string(&self) -> String {
        self.chunks.concat()
    }
}

/// What one engine invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// Rendered page output.
    Html(RenderResult),
    /// Page data for a data request (`None` if the page has no data hooks).
    Data(Option<Value>),
    /// A data hook declared the resource missing.
    NotFound,
    /// A data hook asked for a redirect; details are in the reserved
    /// `pageProps` keys of `page_data`.
    Redirect { page_data: Value },
    /// The engine produced nothing.
    Empty,
}

impl RenderOutcome {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Html(_) => "html",
            Self::Data(_) => "data",
            Self::NotFound => "not_found",
            Self::Redirect { .. } => "redirect",
            Self::Empty => "empty",
        }
    }
}

/// Side signals an engine records while rendering.
///
/// Converting them to a `RenderOutcome` enforces that not-found and
/// redirect are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct RenderSignals {
    is_data_req: bool,
    not_found: bool,
    redirect: Option<Value>,
    page_data: Option<Value>,
}

impl RenderSignals {
    /// Create signals for a request.
    pub fn new(is_data_req: bool) -> Self {
        Self {
            is_data_req,
            ..Self::default()
        }
    }

    /// Record that the resource was not found.
    pub fn set_not_found(&mut self) {
        self.not_found = true;
    }

    /// Record a redirect with the page data carrying its reserved keys.
    pub fn set_redirect(&mut self, page_data: Value) {
        self.redirect = Some(page_data);
    }

    /// Record the page data produced by the data hooks.
    pub fn set_page_data(&mut self, page_data: Value) {
        self.page_data = Some(page_data);
    }

    /// Whether not-found was recorded.
    pub fn is_not_found(&self) -> bool {
        self.not_found
    }

    /// Convert to the outcome of the render.
    pub fn finish(self, result: Option<RenderResult>) -> Result<RenderOutcome, RenderError> {
        match (self.not_found, self.redirect) {
            (true, Some(_)) => Err(RenderError::ConflictingSignals),
            (true, None) => Ok(RenderOutcome::NotFound),
            (false, Some(page_data)) => Ok(RenderOutcome::Redirect { page_data }),
            (false, None) if self.is_data_req => Ok(RenderOutcome::Data(self.page_data)),
            (false, None) => Ok(result.map_or(RenderOutcome::Empty, RenderOutcome::Html)),
        }
    }
}

/// The external page-rendering engine.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Render `pathname` for one request.
    async fn render(
        &self,
        req: &EngineRequest,
        res: &mut ResponseShim,
        pathname: &str,
        query: &QueryParams,
        options: &RenderOptions,
    ) -> anyhow::Result<RenderOutcome>;
}
