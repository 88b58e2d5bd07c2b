//! Mapping render outcomes to wire responses.

use http::StatusCode;
use page_ipc::{OutgoingResponse, PageResponse};
use page_observability::OutcomeKind;
use serde_json::Value;

use crate::engine::RenderOutcome;
use crate::error::RenderError;

/// Content type of data responses. Historical label; the body is JSON.
pub const MIME_APPLICATION_JAVASCRIPT: &str = "application/javascript";

/// Content type of rendered pages when the engine declares none.
pub const MIME_TEXT_HTML_UTF8: &str = "text/html; charset=utf-8";

/// Internal route that always renders the 404 page.
pub const NOT_FOUND_REWRITE_PATH: &str = "/_next/404";

/// Body of a not-found data response.
pub const NOT_FOUND_DATA_BODY: &str = r#"{"notFound":true}"#;

const REDIRECT_DESTINATION_KEY: &str = "__N_REDIRECT";
const REDIRECT_STATUS_KEY: &str = "__N_REDIRECT_STATUS";
const REDIRECT_BASE_PATH_KEY: &str = "__N_REDIRECT_BASE_PATH";

/// A redirect read from the reserved page props.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub destination: String,
    pub status_code: Option<u16>,
    pub base_path: Option<bool>,
}

impl RedirectTarget {
    /// Read the reserved keys from `pageData.pageProps`.
    pub fn from_page_data(page_data: &Value) -> Result<Self, RenderError> {
        let props = page_data
            .get("pageProps")
            .ok_or_else(|| RenderError::InvalidRedirect("missing pageProps".to_string()))?;

        let destination = props
            .get(REDIRECT_DESTINATION_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RenderError::InvalidRedirect(format!("{} must be a string", REDIRECT_DESTINATION_KEY))
            })?
            .to_string();

        let status_code = match props.get(REDIRECT_STATUS_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|code| u16::try_from(code).ok())
                    .ok_or_else(|| {
                        RenderError::InvalidRedirect(format!(
                            "{} must be a status code, got {}",
                            REDIRECT_STATUS_KEY, value
                        ))
                    })?,
            ),
        };

        let base_path = props.get(REDIRECT_BASE_PATH_KEY).and_then(Value::as_bool);

        Ok(Self {
            destination,
            status_code,
            base_path,
        })
    }

    /// Final status: the explicit one, otherwise a temporary redirect.
    /// A status of 0 counts as unset.
    pub fn status(&self) -> u16 {
        self.status_code
            .filter(|&code| code != 0)
            .unwrap_or(StatusCode::TEMPORARY_REDIRECT.as_u16())
    }

    /// Whether this is the permanent redirect status.
    pub fn is_permanent(&self) -> bool {
        self.status() == StatusCode::PERMANENT_REDIRECT.as_u16()
    }

    /// Build the redirect response.
    ///
    /// Permanent redirects also get a `Refresh` header for clients that
    /// ignore `Location`.
    pub fn into_response(self) -> PageResponse {
        let mut response = PageResponse::new(self.status(), self.destination.clone())
            .with_header("Location", self.destination.clone());
        if self.is_permanent() {
            response = response.with_header("Refresh", format!("0;url={}", self.destination));
        }
        response
    }
}

/// A classified response with its outcome label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub response: OutgoingResponse,
    pub kind: OutcomeKind,
}

impl Classified {
    fn new(response: OutgoingResponse, kind: OutcomeKind) -> Self {
        Self { response, kind }
    }

    /// Body size, if this is a direct response.
    pub fn body_bytes(&self) -> Option<usize> {
        match &self.response {
            OutgoingResponse::Response(response) => Some(response.body.len()),
            OutgoingResponse::Rewrite { .. } => None,
        }
    }
}

/// Classify one render outcome.
///
/// Precedence: not-found, then redirect (page requests only), then data
/// (data requests), then the rendered page.
pub fn classify(
    outcome: RenderOutcome,
    is_data_req: bool,
    status_code: u16,
) -> Result<Classified, RenderError> {
    match outcome {
        RenderOutcome::NotFound if is_data_req => Ok(Classified::new(
            OutgoingResponse::Response(
                PageResponse::new(StatusCode::NOT_FOUND.as_u16(), NOT_FOUND_DATA_BODY)
                    .with_header("Content-Type", MIME_APPLICATION_JAVASCRIPT),
            ),
            OutcomeKind::NotFound,
        )),
        RenderOutcome::NotFound => Ok(Classified::new(
            OutgoingResponse::Rewrite {
                path: NOT_FOUND_REWRITE_PATH.to_string(),
            },
            OutcomeKind::Rewrite,
        )),
        RenderOutcome::Redirect { page_data } if !is_data_req => {
            let target = RedirectTarget::from_page_data(&page_data)?;
            Ok(Classified::new(
                OutgoingResponse::Response(target.into_response()),
                OutcomeKind::Redirect,
            ))
        }
        // The client runtime follows redirects found in page data.
        RenderOutcome::Redirect { page_data } => data_response(Some(page_data), status_code),
        RenderOutcome::Data(page_data) if is_data_req => data_response(page_data, status_code),
        // Pages without data hooks yield no payload.
        RenderOutcome::Html(_) | RenderOutcome::Empty if is_data_req => {
            data_response(None, status_code)
        }
        RenderOutcome::Html(result) => {
            let content_type = result
                .content_type()
                .unwrap_or(MIME_TEXT_HTML_UTF8)
                .to_string();
            Ok(Classified::new(
                OutgoingResponse::Response(
                    PageResponse::new(status_code, result.to_unchunked_string())
                        .with_header("Content-Type", content_type),
                ),
                OutcomeKind::Html,
            ))
        }
        RenderOutcome::Data(_) | RenderOutcome::Empty => Err(RenderError::MissingRenderResult),
    }
}

fn data_response(page_data: Option<Value>, status_code: u16) -> Result<Classified, RenderError> {
    let body = match page_data {
        Some(data) => serde_json::to_string(&data)?,
        None => "{}".to_string(),
    };
    Ok(Classified::new(
        OutgoingResponse::Response(
            PageResponse::new(status_code, body)
                .with_header("Content-Type", MIME_APPLICATION_JAVASCRIPT),
        ),
        OutcomeKind::Data,
    ))
}
