//! Render options synthesis.
//!
//! Builds the full option set the engine expects from the fixed page bundle
//! and one request. A fresh `RenderOptions` is built per request and never
//! shared.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use page_core::{Component, DataHook, HookKind, PageBundle, PageExports, RenderRequest};
use serde::Serialize;
use serde_json::{json, Value};

use crate::manifest::LoadableManifest;

/// Build id reported in development mode.
pub const DEV_BUILD_ID: &str = "development";

/// Pages whose base status is 404.
pub const NOT_FOUND_PAGES: [&str; 2] = ["/404", "/_error"];

/// Page-to-files mapping handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub pages: BTreeMap<String, Vec<String>>,
    pub dev_files: Vec<String>,
    pub amp_dev_files: Vec<String>,
    pub polyfill_files: Vec<String>,
    pub low_priority_files: Vec<String>,
    pub root_main_files: Vec<String>,
    pub amp_first_pages: Vec<String>,
}

impl BuildManifest {
    /// Manifest for one page: `/_app` has no chunks of its own, the page
    /// gets its whole chunk group.
    pub fn for_page(path: &str, chunk_group: Option<&[String]>) -> Self {
        let mut pages = BTreeMap::new();
        pages.insert("/_app".to_string(), Vec::new());
        pages.insert(
            path.to_string(),
            chunk_group.map(<[String]>::to_vec).unwrap_or_default(),
        );

        Self {
            pages,
            dev_files: Vec::new(),
            amp_dev_files: Vec::new(),
            polyfill_files: Vec::new(),
            low_priority_files: Vec::new(),
            root_main_files: Vec::new(),
            amp_first_pages: Vec::new(),
        }
    }

    /// Files for a page.
    pub fn page_files(&self, path: &str) -> &[String] {
        self.pages.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Preview mode secrets (empty in development).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewProps {
    pub preview_mode_id: String,
    pub preview_mode_encryption_key: String,
    pub preview_mode_signing_key: String,
}

/// Image optimization settings (unoptimized in development).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub device_sizes: Vec<u32>,
    pub image_sizes: Vec<u32>,
    pub loader: String,
    pub path: String,
    pub loader_file: String,
    pub domains: Vec<String>,
    pub disable_static_images: bool,
    #[serde(rename = "minimumCacheTTL")]
    pub minimum_cache_ttl: u64,
    pub formats: Vec<String>,
    #[serde(rename = "dangerouslyAllowSVG")]
    pub dangerously_allow_svg: bool,
    pub content_security_policy: String,
    pub remote_patterns: Vec<String>,
    pub unoptimized: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            device_sizes: Vec::new(),
            image_sizes: Vec::new(),
            loader: "default".to_string(),
            path: String::new(),
            loader_file: String::new(),
            domains: Vec::new(),
            disable_static_images: false,
            minimum_cache_ttl: 0,
            formats: Vec::new(),
            dangerously_allow_svg: false,
            content_security_policy: String::new(),
            remote_patterns: Vec::new(),
            unoptimized: true,
        }
    }
}

/// The page module as the engine sees it: default export plus the rest.
#[derive(Clone)]
pub struct ComponentModule {
    pub default: Component,
    pub exports: PageExports,
}

impl fmt::Debug for ComponentModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentModule")
            .field("default", &self.default.name())
            .field("exports", &self.exports)
            .finish()
    }
}

/// Everything the engine needs to render one request.
///
/// Optional data hooks are `None` when the page does not export them; the
/// engine treats "absent" differently from "returns nothing".
#[derive(Clone)]
pub struct RenderOptions {
    // Page identity.
    pub component: Component,
    pub app: Option<Component>,
    pub document: Option<Component>,
    pub page_config: Value,
    pub build_manifest: BuildManifest,
    pub react_loadable_manifest: Arc<dyn LoadableManifest>,
    pub component_mod: ComponentModule,
    pub pathname: String,
    pub build_id: String,

    // Per request.
    pub is_data_req: bool,
    pub runtime_config: Value,
    pub asset_prefix: String,
    pub canonical_base: String,
    pub preview_props: PreviewProps,
    pub base_path: String,
    pub resolved_url: String,
    pub optimize_fonts: bool,
    pub optimize_css: bool,
    pub next_script_workers: bool,
    pub images: ImageConfig,

    pub get_static_paths: Option<Arc<dyn DataHook>>,
    pub get_static_props: Option<Arc<dyn DataHook>>,
    pub get_server_side_props: Option<Arc<dyn DataHook>>,
}

impl RenderOptions {
    /// Get the data hook of a given kind, if the page exports it.
    pub fn data_hook(&self, kind: HookKind) -> Option<&Arc<dyn DataHook>> {
        match kind {
            HookKind::GetStaticPaths => self.get_static_paths.as_ref(),
            HookKind::GetStaticProps => self.get_static_props.as_ref(),
            HookKind::GetServerSideProps => self.get_server_side_props.as_ref(),
        }
    }

    /// Names of the option keys that are set, as the engine spells them.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec![
            "Component",
            "pageConfig",
            "buildManifest",
            "reactLoadableManifest",
            "ComponentMod",
            "pathname",
            "buildId",
            "isDataReq",
            "runtimeConfig",
            "assetPrefix",
            "canonicalBase",
            "previewProps",
            "basePath",
            "resolvedUrl",
            "optimizeFonts",
            "optimizeCss",
            "nextScriptWorkers",
            "images",
        ];
        if self.app.is_some() {
            keys.push("App");
        }
        if self.document.is_some() {
            keys.push("Document");
        }
        for kind in HookKind::ALL {
            if self.data_hook(kind).is_some() {
                keys.push(kind.export_name());
            }
        }
        keys
    }

    /// Serializable settings, for debug logging.
    pub fn describe(&self) -> Value {
        json!({
            "pathname": self.pathname,
            "buildId": self.build_id,
            "isDataReq": self.is_data_req,
            "resolvedUrl": self.resolved_url,
            "component": self.component.name(),
            "buildManifest": self.build_manifest,
            "images": self.images,
            "keys": self.keys(),
        })
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("pathname", &self.pathname)
            .field("is_data_req", &self.is_data_req)
            .field("resolved_url", &self.resolved_url)
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

/// Base status code for a page path.
///
/// The not-found and error pages always report 404, even before any of the
/// page's own code runs.
pub fn status_for_path(path: &str) -> u16 {
    if NOT_FOUND_PAGES.contains(&path) {
        StatusCode::NOT_FOUND.as_u16()
    } else {
        StatusCode::OK.as_u16()
    }
}

/// Build the engine options for one request.
pub fn synthesize(
    bundle: &PageBundle,
    request: &RenderRequest,
    manifest: Arc<dyn LoadableManifest>,
) -> RenderOptions {
    let component = bundle.component().clone();
    let exports = bundle.exports();

    RenderOptions {
        component: component.clone(),
        app: bundle.app().cloned(),
        document: bundle.document().cloned(),
        page_config: json!({}),
        build_manifest: BuildManifest::for_page(&request.path, bundle.chunk_group()),
        react_loadable_manifest: manifest,
        component_mod: ComponentModule {
            default: component,
            exports: exports.clone(),
        },
        pathname: request.path.clone(),
        build_id: DEV_BUILD_ID.to_string(),

        is_data_req: bundle.is_data_req(),
        runtime_config: json!({}),
        asset_prefix: String::new(),
        canonical_base: String::new(),
        preview_props: PreviewProps::default(),
        base_path: String::new(),
        resolved_url: request.url.clone(),
        optimize_fonts: false,
        optimize_css: false,
        next_script_workers: false,
        images: ImageConfig::default(),

        get_static_paths: exports.hook(HookKind::GetStaticPaths),
        get_static_props: exports.hook(HookKind::GetStaticProps),
        get_server_side_props: exports.hook(HookKind::GetServerSideProps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::DynamicManifest;
    use async_trait::async_trait;

    struct Props;

    #[async_trait]
    impl DataHook for Props {
        async fn call(&self, _context: Value) -> anyhow::Result<Value> {
            Ok(json!({"props": {}}))
        }
    }

    fn bundle_with(exports: PageExports) -> PageBundle {
        PageBundle::builder(false)
            .exports(exports)
            .chunk_group(vec!["_next/page.js".to_string()])
            .build()
            .unwrap()
    }

    fn options(bundle: &PageBundle, request: &RenderRequest) -> RenderOptions {
        synthesize(bundle, request, Arc::new(DynamicManifest))
    }

    #[test]
    fn test_status_for_regular_paths() {
        for path in ["/", "/about", "/blog/[slug]", "/404/nested", "/_app", "/_error/x"] {
            assert_eq!(status_for_path(path), 200, "{}", path);
        }
    }

    #[test]
    fn test_status_for_error_pages() {
        assert_eq!(status_for_path("/404"), 404);
        assert_eq!(status_for_path("/_error"), 404);
    }

    #[test]
    fn test_no_hooks_no_keys() {
        let bundle = bundle_with(PageExports::new().with_value("config", json!({})));
        let opts = options(&bundle, &RenderRequest::new("/about"));

        assert!(opts.get_static_paths.is_none());
        assert!(opts.get_static_props.is_none());
        assert!(opts.get_server_side_props.is_none());
        let keys = opts.keys();
        for kind in HookKind::ALL {
            assert!(!keys.contains(&kind.export_name()));
        }
    }

    #[test]
    fn test_present_hooks_are_attached() {
        let bundle = bundle_with(
            PageExports::new()
                .with_hook("getStaticProps", Arc::new(Props))
                .with_hook("getStaticPaths", Arc::new(Props)),
        );
        let opts = options(&bundle, &RenderRequest::new("/blog/[slug]"));

        assert!(opts.data_hook(HookKind::GetStaticProps).is_some());
        assert!(opts.data_hook(HookKind::GetStaticPaths).is_some());
        assert!(opts.data_hook(HookKind::GetServerSideProps).is_none());
        let keys = opts.keys();
        assert!(keys.contains(&"getStaticProps"));
        assert!(!keys.contains(&"getServerSideProps"));
    }

    #[test]
    fn test_stripped_component_renders_nothing() {
        let bundle = bundle_with(PageExports::new());
        let opts = options(&bundle, &RenderRequest::new("/"));
        assert_eq!(opts.component.render(&json!({"a": 1}), "child").unwrap(), "");
        assert_eq!(opts.component_mod.default.name(), "noop");
    }

    #[test]
    fn test_build_manifest_for_page() {
        let bundle = bundle_with(PageExports::new());
        let opts = options(&bundle, &RenderRequest::new("/about"));

        assert!(opts.build_manifest.page_files("/_app").is_empty());
        assert_eq!(opts.build_manifest.page_files("/about"), ["_next/page.js"]);
        assert!(opts.build_manifest.dev_files.is_empty());
    }

    #[test]
    fn test_build_manifest_without_chunk_group() {
        let manifest = BuildManifest::for_page("/x", None);
        assert!(manifest.page_files("/x").is_empty());
        assert!(manifest.pages.contains_key("/x"));
    }

    #[test]
    fn test_development_placeholders() {
        let bundle = bundle_with(PageExports::new());
        let request = RenderRequest::new("/about").with_url("/about?tab=team");
        let opts = options(&bundle, &request);

        assert_eq!(opts.build_id, "development");
        assert_eq!(opts.resolved_url, "/about?tab=team");
        assert_eq!(opts.pathname, "/about");
        assert!(opts.asset_prefix.is_empty());
        assert!(opts.base_path.is_empty());
        assert!(opts.images.unoptimized);
        assert!(!opts.is_data_req);
        assert!(opts.app.is_none());
    }

    #[test]
    fn test_describe_serializes_manifest() {
        let bundle = bundle_with(PageExports::new());
        let opts = options(&bundle, &RenderRequest::new("/about"));
        let described = opts.describe();
        assert_eq!(described["buildManifest"]["pages"]["/about"][0], "_next/page.js");
        assert_eq!(described["images"]["minimumCacheTTL"], 0);
        assert_eq!(described["images"]["loader"], "default");
    }

    #[test]
    fn test_options_are_fresh_per_request() {
        let bundle = bundle_with(PageExports::new());
        let a = options(&bundle, &RenderRequest::new("/a"));
        let b = options(&bundle, &RenderRequest::new("/b"));
        assert_eq!(a.pathname, "/a");
        assert_eq!(b.pathname, "/b");
        assert!(b.build_manifest.page_files("/a").is_empty());
    }
}
