//! The fixed page a worker process serves.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// A renderable page-level component (page, `_app` or `_document`).
///
/// Components are opaque to the worker: only the rendering engine calls them.
pub trait PageComponent: Send + Sync {
    /// Render the component with its props, wrapping `children`.
    fn render(&self, props: &Value, children: &str) -> anyhow::Result<String>;

    /// Display name for logs.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared handle to a component.
pub type Component = Arc<dyn PageComponent>;

/// Component that renders nothing.
///
/// Stands in for the default export of pages compiled in data-only mode,
/// where the visual component was stripped but data hooks remain.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopComponent;

impl PageComponent for NoopComponent {
    fn render(&self, _props: &Value, _children: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// A data-fetching hook exported by the page (`getStaticProps` and friends).
#[async_trait]
pub trait DataHook: Send + Sync {
    /// Invoke the hook with the engine-provided context object.
    async fn call(&self, context: Value) -> anyhow::Result<Value>;
}

/// The data-fetching hooks the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    GetStaticPaths,
    GetStaticProps,
    GetServerSideProps,
}

impl HookKind {
    /// All hook kinds.
    pub const ALL: [HookKind; 3] = [
        HookKind::GetStaticPaths,
        HookKind::GetStaticProps,
        HookKind::GetServerSideProps,
    ];

    /// Export name of the hook.
    pub fn export_name(self) -> &'static str {
        match self {
            Self::GetStaticPaths => "getStaticPaths",
            Self::GetStaticProps => "getStaticProps",
            Self::GetServerSideProps => "getServerSideProps",
        }
    }
}

/// One named export of the page module.
#[derive(Clone)]
pub enum Export {
    /// A callable data hook.
    Hook(Arc<dyn DataHook>),
    /// A plain value (e.g. `config`).
    Value(Value),
}

impl Export {
    /// Get the hook, if this export is callable.
    pub fn as_hook(&self) -> Option<&Arc<dyn DataHook>> {
        match self {
            Self::Hook(hook) => Some(hook),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook(_) => f.write_str("Hook(..)"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// The page module's non-default exports.
#[derive(Debug, Clone, Default)]
pub struct PageExports {
    entries: BTreeMap<String, Export>,
}

impl PageExports {
    /// Create an empty export set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data hook export.
    pub fn with_hook(mut self, name: impl Into<String>, hook: Arc<dyn DataHook>) -> Self {
        self.entries.insert(name.into(), Export::Hook(hook));
        self
    }

    /// Add a plain value export.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), Export::Value(value));
        self
    }

    /// Check whether an export with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get an export by name.
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries.get(name)
    }

    /// Get a data hook by kind.
    pub fn hook(&self, kind: HookKind) -> Option<Arc<dyn DataHook>> {
        self.entries
            .get(kind.export_name())
            .and_then(Export::as_hook)
            .cloned()
    }

    /// Iterate over exports in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of exports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no exports.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error assembling a page bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("export '{0}' must be a callable data hook")]
    HookNotCallable(String),
}

/// The fixed, pre-loaded page this worker serves for its whole lifetime.
///
/// Immutable once built.
#[derive(Clone)]
pub struct PageBundle {
    is_data_req: bool,
    app: Option<Component>,
    document: Option<Component>,
    component: Component,
    component_stripped: bool,
    exports: PageExports,
    chunk_group: Option<Vec<String>>,
}

impl PageBundle {
    /// Start building a bundle.
    pub fn builder(is_data_req: bool) -> PageBundleBuilder {
        PageBundleBuilder::new(is_data_req)
    }

    /// Whether this worker serves data requests.
    pub fn is_data_req(&self) -> bool {
        self.is_data_req
    }

    /// The custom `_app` component.
    pub fn app(&self) -> Option<&Component> {
        self.app.as_ref()
    }

    /// The custom `_document` component.
    pub fn document(&self) -> Option<&Component> {
        self.document.as_ref()
    }

    /// The page component (a `NoopComponent` if it was stripped).
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Whether the default export was absent and replaced.
    pub fn component_stripped(&self) -> bool {
        self.component_stripped
    }

    /// The page's other exports.
    pub fn exports(&self) -> &PageExports {
        &self.exports
    }

    /// Precomputed chunks for the page.
    pub fn chunk_group(&self) -> Option<&[String]> {
        self.chunk_group.as_deref()
    }
}

impl fmt::Debug for PageBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBundle")
            .field("is_data_req", &self.is_data_req)
            .field("app", &self.app.as_ref().map(|c| c.name().to_string()))
            .field("document", &self.document.as_ref().map(|c| c.name().to_string()))
            .field("component", &self.component.name())
            .field("component_stripped", &self.component_stripped)
            .field("exports", &self.exports)
            .field("chunk_group", &self.chunk_group)
            .finish()
    }
}

/// Builder for `PageBundle`.
pub struct PageBundleBuilder {
    is_data_req: bool,
    app: Option<Component>,
    document: Option<Component>,
    component: Option<Component>,
    exports: PageExports,
    chunk_group: Option<Vec<String>>,
}

impl PageBundleBuilder {
    /// Create a new builder.
    pub fn new(is_data_req: bool) -> Self {
        Self {
            is_data_req,
            app: None,
            document: None,
            component: None,
            exports: PageExports::new(),
            chunk_group: None,
        }
    }

    /// Set the `_app` component.
    pub fn app(mut self, app: Component) -> Self {
        self.app = Some(app);
        self
    }

    /// Set the `_document` component.
    pub fn document(mut self, document: Component) -> Self {
        self.document = Some(document);
        self
    }

    /// Set the default export. `None` means it was stripped or empty.
    pub fn component(mut self, component: Option<Component>) -> Self {
        self.component = component;
        self
    }

    /// Set the page's other exports.
    pub fn exports(mut self, exports: PageExports) -> Self {
        self.exports = exports;
        self
    }

    /// Set the page's chunk group.
    pub fn chunk_group(mut self, chunks: Vec<String>) -> Self {
        self.chunk_group = Some(chunks);
        self
    }

    /// Build the bundle.
    ///
    /// Data hook exports must be callable; a missing default export is
    /// replaced with a `NoopComponent` once, here.
    pub fn build(self) -> Result<PageBundle, BundleError> {
        for kind in HookKind::ALL {
            if let Some(Export::Value(_)) = self.exports.get(kind.export_name()) {
                return Err(BundleError::HookNotCallable(kind.export_name().to_string()));
            }
        }

        let component_stripped = self.component.is_none();
        let component = self
            .component
            .unwrap_or_else(|| Arc::new(NoopComponent) as Component);

        Ok(PageBundle {
            is_data_req: self.is_data_req,
            app: self.app,
            document: self.document,
            component,
            component_stripped,
            exports: self.exports,
            chunk_group: self.chunk_group,
        })
    }
}
