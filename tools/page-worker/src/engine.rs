//! Built-in engine for page definition files.
//!
//! Runs the page's data hooks, maps their results onto render signals and
//! renders the template components inside a document.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use page_core::{HookKind, QueryParams};
use page_renderer::{
    EngineRequest, RenderEngine, RenderOptions, RenderOutcome, RenderResult, RenderSignals,
    ResponseShim, CHUNK_PREFIX, MIME_TEXT_HTML_UTF8,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::shell::{HeadContent, Shell};

/// Engine for pages loaded from a `PageDefinition`.
#[derive(Debug, Clone, Default)]
pub struct StaticEngine {
    dynamic: Vec<String>,
}

impl StaticEngine {
    /// Create an engine for a page using the given dynamic-import keys.
    pub fn new(dynamic: Vec<String>) -> Self {
        Self { dynamic }
    }

    /// Script files for the page: `_app` chunks, page chunks, then
    /// dynamic imports. Duplicates are dropped.
    fn script_files(&self, pathname: &str, options: &RenderOptions) -> Result<Vec<String>> {
        let manifest = &options.build_manifest;
        let mut files: Vec<String> = Vec::new();
        let mut push = |file: String| {
            if !files.contains(&file) {
                files.push(file);
            }
        };

        for file in manifest.page_files("/_app").iter().chain(manifest.page_files(pathname)) {
            push(file.clone());
        }
        for key in &self.dynamic {
            let entry = options.react_loadable_manifest.resolve(key)?;
            debug!(module = %entry.id, files = entry.files.len(), "resolved dynamic import");
            for file in entry.files {
                push(file);
            }
        }

        Ok(files)
    }

    fn render_document(
        &self,
        pathname: &str,
        query: &QueryParams,
        options: &RenderOptions,
        hook: Option<HookKind>,
        props: &Value,
    ) -> Result<RenderResult> {
        let page_html = options.component.render(props, "")?;
        let body = match &options.app {
            Some(app) => app.render(props, &page_html)?,
            None => page_html,
        };

        let mut head = HeadContent {
            title: props.get("title").and_then(Value::as_str).map(str::to_string),
            ..Default::default()
        };
        for file in self.script_files(pathname, options)? {
            head = head.with_script(asset_url(&options.asset_prefix, &file));
        }

        let mut next_data = json!({
            "props": { "pageProps": props },
            "page": options.pathname,
            "query": query,
            "buildId": options.build_id,
            "isFallback": false,
        });
        match hook {
            Some(HookKind::GetServerSideProps) => next_data["gssp"] = json!(true),
            Some(HookKind::GetStaticProps) => next_data["gsp"] = json!(true),
            _ => {}
        }
        let shell = Shell::new(head).with_page_data(next_data.to_string());

        let html = match &options.document {
            Some(document) => {
                let doc_props = json!({
                    "head": shell.head.render(),
                    "nextData": shell.render_data_script(),
                });
                document.render(&doc_props, &body)?
            }
            None => shell.render(&body),
        };

        Ok(RenderResult::from_string(html).with_content_type(MIME_TEXT_HTML_UTF8))
    }
}

#[async_trait]
impl RenderEngine for StaticEngine {
    async fn render(
        &self,
        req: &EngineRequest,
        _res: &mut ResponseShim,
        pathname: &str,
        query: &QueryParams,
        options: &RenderOptions,
    ) -> Result<RenderOutcome> {
        let mut signals = RenderSignals::new(options.is_data_req);

        if let Some(paths_hook) = &options.get_static_paths {
            let result = paths_hook
                .call(json!({}))
                .await
                .context("getStaticPaths failed")?;
            if !is_fallback_enabled(&result) && !path_is_listed(&result, &req.url, query) {
                debug!(url = %req.url, "path not returned by getStaticPaths");
                signals.set_not_found();
                return Ok(signals.finish(None)?);
            }
        }

        let hook = [HookKind::GetServerSideProps, HookKind::GetStaticProps]
            .into_iter()
            .find_map(|kind| options.data_hook(kind).map(|hook| (kind, hook)));

        let props = match hook {
            Some((kind, hook)) => {
                let result = hook
                    .call(hook_context(req, query, options))
                    .await
                    .with_context(|| format!("{} failed", kind.export_name()))?;

                if result.get("notFound") == Some(&Value::Bool(true)) {
                    signals.set_not_found();
                }
                if let Some(redirect) = result.get("redirect") {
                    signals.set_redirect(redirect_page_data(redirect, kind)?);
                }
                if signals.is_not_found() || result.get("redirect").is_some() {
                    return Ok(signals.finish(None)?);
                }

                let props = result.get("props").cloned().unwrap_or_else(|| json!({}));
                let mut page_data = json!({ "pageProps": props });
                page_data[data_marker(kind)] = json!(true);
                signals.set_page_data(page_data);
                props
            }
            None => json!({}),
        };

        if options.is_data_req {
            return Ok(signals.finish(None)?);
        }

        let result = self.render_document(pathname, query, options, hook.map(|(k, _)| k), &props)?;
        Ok(signals.finish(Some(result))?)
    }
}

/// Page data marker telling the client runtime how the props were made.
fn data_marker(kind: HookKind) -> &'static str {
    match kind {
        HookKind::GetServerSideProps => "__N_SSP",
        _ => "__N_SSG",
    }
}

fn hook_context(req: &EngineRequest, query: &QueryParams, options: &RenderOptions) -> Value {
    json!({
        "params": req.params,
        "query": query,
        "resolvedUrl": options.resolved_url,
        "req": {
            "url": req.url,
            "method": req.method,
            "headers": req.headers,
        },
    })
}

/// Page data carrying the reserved redirect keys.
fn redirect_page_data(redirect: &Value, kind: HookKind) -> Result<Value> {
    let destination = redirect
        .get("destination")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("redirect.destination must be a string"))?;

    let status = match redirect.get("statusCode").and_then(Value::as_u64) {
        Some(code) => code,
        None if redirect.get("permanent") == Some(&Value::Bool(true)) => 308,
        None => 307,
    };

    let mut props = Map::new();
    props.insert("__N_REDIRECT".to_string(), json!(destination));
    props.insert("__N_REDIRECT_STATUS".to_string(), json!(status));
    if let Some(base_path) = redirect.get("basePath").and_then(Value::as_bool) {
        props.insert("__N_REDIRECT_BASE_PATH".to_string(), json!(base_path));
    }

    let mut page_data = json!({ "pageProps": props });
    page_data[data_marker(kind)] = json!(true);
    Ok(page_data)
}

fn is_fallback_enabled(result: &Value) -> bool {
    matches!(
        result.get("fallback"),
        Some(Value::Bool(true)) | Some(Value::String(_))
    )
}

/// Whether `getStaticPaths` listed the requested path, either as a path
/// string or through its params.
fn path_is_listed(result: &Value, url: &str, query: &QueryParams) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let Some(paths) = result.get("paths").and_then(Value::as_array) else {
        return false;
    };

    paths.iter().any(|entry| match entry {
        Value::String(listed) => listed == path,
        Value::Object(_) => entry
            .get("params")
            .and_then(Value::as_object)
            .is_some_and(|params| {
                params.iter().all(|(name, value)| {
                    query
                        .get(name)
                        .is_some_and(|actual| param_matches(value, actual))
                })
            }),
        _ => false,
    })
}

fn param_matches(value: &Value, actual: &str) -> bool {
    match value {
        Value::String(s) => s == actual,
        // Catch-all segments
        Value::Array(parts) => parts
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .is_some_and(|parts| parts.join("/") == actual),
        other => other.to_string() == actual,
    }
}

fn asset_url(prefix: &str, file: &str) -> String {
    let file = file.strip_prefix(CHUNK_PREFIX).unwrap_or(file);
    format!("{}/_next/{}", prefix.trim_end_matches('/'), file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use page_core::{PageBundle, RenderRequest};
    use page_renderer::{synthesize, DynamicManifest, RenderError};

    use crate::page::PageDefinition;

    async fn render_page(page: &str, dynamic: &[&str], request: RenderRequest) -> Result<RenderOutcome> {
        let def: PageDefinition = toml::from_str(page).unwrap();
        let bundle: PageBundle = def.into_bundle().unwrap();
        let options = synthesize(&bundle, &request, Arc::new(DynamicManifest));
        let engine = StaticEngine::new(dynamic.iter().map(|k| k.to_string()).collect());
        let mut res = ResponseShim::new(200);
        engine
            .render(
                &EngineRequest::from_request(&request),
                &mut res,
                &request.path,
                &request.merged_query(),
                &options,
            )
            .await
    }

    fn html(outcome: RenderOutcome) -> String {
        match outcome {
            RenderOutcome::Html(result) => {
                assert_eq!(result.content_type(), Some(MIME_TEXT_HTML_UTF8));
                result.to_unchunked_string()
            }
            other => panic!("expected html, got {:?}", other),
        }
    }

    #[test]
    fn test_hook_context_separates_params() {
        let request = RenderRequest::new("/blog/[slug]")
            .with_url("/blog/hello?ref=x")
            .with_query("ref", "x")
            .with_param("slug", "hello");
        let bundle = PageDefinition::default().into_bundle().unwrap();
        let options = synthesize(&bundle, &request, Arc::new(DynamicManifest));

        let context = hook_context(
            &EngineRequest::from_request(&request),
            &request.merged_query(),
            &options,
        );
        assert_eq!(context["params"], json!({ "slug": "hello" }));
        assert_eq!(context["query"], json!({ "ref": "x", "slug": "hello" }));
        assert_eq!(context["req"]["url"], "/blog/hello?ref=x");
    }

    #[tokio::test]
    async fn test_renders_props_into_template() {
        let outcome = render_page(
            r#"
            template = "<h1>{{title}}</h1>"
            app = "<div class=\"app\">{{{children}}}</div>"
            chunk_group = ["_next/static/chunks/pages/index.js"]

            [hooks.getStaticProps]
            props = { title = "Hello" }
            "#,
            &[],
            RenderRequest::new("/"),
        )
        .await
        .unwrap();

        let html = html(outcome);
        assert!(html.contains(r#"<div id="__next"><div class="app"><h1>Hello</h1></div></div>"#));
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.contains(r#"<script defer src="/_next/static/chunks/pages/index.js"></script>"#));
        assert!(html.contains(r#""gsp":true"#));
    }

    #[tokio::test]
    async fn test_dynamic_chunks_become_scripts() {
        let outcome = render_page(
            r#"template = "<p>chart</p>""#,
            &[r#"{"id":"chart","chunks":["_next/chunks/a.js","_next/chunks/b.js"]}"#],
            RenderRequest::new("/chart"),
        )
        .await
        .unwrap();

        let html = html(outcome);
        let a = html.find("/_next/chunks/a.js").unwrap();
        let b = html.find("/_next/chunks/b.js").unwrap();
        assert!(a < b);
    }

    #[tokio::test]
    async fn test_malformed_dynamic_key_fails() {
        let err = render_page(r#"template = "x""#, &["not json"], RenderRequest::new("/"))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("malformed manifest key"));
    }

    #[tokio::test]
    async fn test_custom_document() {
        let outcome = render_page(
            r#"
            template = "<main>page</main>"
            document = "<html><head>{{{head}}}</head><body>{{{children}}}{{{nextData}}}</body></html>"
            "#,
            &[],
            RenderRequest::new("/"),
        )
        .await
        .unwrap();

        let html = html(outcome);
        assert!(html.starts_with("<html><head>"));
        assert!(html.contains("<body><main>page</main>"));
        assert!(html.contains("__NEXT_DATA__"));
    }

    #[tokio::test]
    async fn test_not_found_result() {
        let outcome = render_page(
            r#"
            template = "x"
            [hooks.getServerSideProps]
            notFound = true
            "#,
            &[],
            RenderRequest::new("/gone"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RenderOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_redirect_result() {
        let outcome = render_page(
            r#"
            template = "x"
            [hooks.getServerSideProps]
            redirect = { destination = "/new", permanent = true }
            "#,
            &[],
            RenderRequest::new("/old"),
        )
        .await
        .unwrap();

        let RenderOutcome::Redirect { page_data } = outcome else {
            panic!("expected redirect");
        };
        assert_eq!(page_data["pageProps"]["__N_REDIRECT"], "/new");
        assert_eq!(page_data["pageProps"]["__N_REDIRECT_STATUS"], 308);
        assert_eq!(page_data["__N_SSP"], true);
    }

    #[tokio::test]
    async fn test_explicit_redirect_status_wins() {
        let outcome = render_page(
            r#"
            [hooks.getStaticProps]
            redirect = { destination = "/x", statusCode = 301, basePath = false }
            "#,
            &[],
            RenderRequest::new("/"),
        )
        .await
        .unwrap();

        let RenderOutcome::Redirect { page_data } = outcome else {
            panic!("expected redirect");
        };
        assert_eq!(page_data["pageProps"]["__N_REDIRECT_STATUS"], 301);
        assert_eq!(page_data["pageProps"]["__N_REDIRECT_BASE_PATH"], false);
    }

    #[tokio::test]
    async fn test_not_found_and_redirect_conflict() {
        let err = render_page(
            r#"
            [hooks.getStaticProps]
            notFound = true
            redirect = { destination = "/x" }
            "#,
            &[],
            RenderRequest::new("/"),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::ConflictingSignals)
        ));
    }

    #[tokio::test]
    async fn test_data_request_returns_page_data() {
        let outcome = render_page(
            r#"
            is_data_req = true
            [hooks.getStaticProps]
            props = { title = "Hello" }
            "#,
            &[],
            RenderRequest::new("/about"),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RenderOutcome::Data(Some(json!({
                "pageProps": { "title": "Hello" },
                "__N_SSG": true,
            })))
        );
    }

    #[tokio::test]
    async fn test_data_request_without_hooks() {
        let outcome = render_page("is_data_req = true", &[], RenderRequest::new("/"))
            .await
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Data(None));
    }

    #[tokio::test]
    async fn test_static_paths_gate() {
        let page = r#"
            template = "<p>{{slug}}</p>"
            [hooks.getStaticPaths]
            paths = [{ params = { slug = "hello" } }, "/blog/listed"]
            fallback = false
            "#;

        let listed = render_page(
            page,
            &[],
            RenderRequest::new("/blog/[slug]")
                .with_url("/blog/hello")
                .with_param("slug", "hello"),
        )
        .await
        .unwrap();
        assert!(matches!(listed, RenderOutcome::Html(_)));

        let by_path = render_page(
            page,
            &[],
            RenderRequest::new("/blog/[slug]")
                .with_url("/blog/listed?ref=1")
                .with_param("slug", "listed"),
        )
        .await
        .unwrap();
        assert!(matches!(by_path, RenderOutcome::Html(_)));

        let unlisted = render_page(
            page,
            &[],
            RenderRequest::new("/blog/[slug]")
                .with_url("/blog/other")
                .with_param("slug", "other"),
        )
        .await
        .unwrap();
        assert_eq!(unlisted, RenderOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_static_paths_fallback_renders_anything() {
        let outcome = render_page(
            r#"
            template = "x"
            [hooks.getStaticPaths]
            paths = []
            fallback = "blocking"
            "#,
            &[],
            RenderRequest::new("/blog/[slug]").with_param("slug", "new"),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, RenderOutcome::Html(_)));
    }

    #[test]
    fn test_param_matches_catch_all() {
        assert!(param_matches(&json!(["a", "b"]), "a/b"));
        assert!(!param_matches(&json!(["a"]), "a/b"));
        assert!(param_matches(&json!(3), "3"));
    }

    #[test]
    fn test_asset_url() {
        assert_eq!(asset_url("", "_next/static/a.js"), "/_next/static/a.js");
        assert_eq!(asset_url("https://cdn/", "static/a.js"), "https://cdn/_next/static/a.js");
    }
}
