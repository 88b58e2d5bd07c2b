//! Page definition files.
//!
//! A page definition stands in for a compiled page module during
//! development:
//!
//! ```toml
//! is_data_req = false
//! template = "<h1>{{title}}</h1>"
//! app = "<div class=\"app\">{{{children}}}</div>"
//! chunk_group = ["_next/static/chunks/pages/index.js"]
//! dynamic = ['{"id":"chart","chunks":["_next/static/chunks/chart.js"]}']
//!
//! [hooks.getStaticProps]
//! props = { title = "Hello" }
//!
//! [values]
//! config = { amp = false }
//! ```
//!
//! Templates substitute `{{name}}` with the escaped prop and `{{{name}}}`
//! with the raw prop. `children` holds the wrapped markup.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use page_core::{Component, DataHook, HookKind, PageBundle, PageComponent, PageExports};
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::shell::html_escape;

/// A page module described on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageDefinition {
    /// Serve data requests instead of HTML.
    #[serde(default)]
    pub is_data_req: bool,

    /// Page component template. Absent means the component was stripped.
    pub template: Option<String>,

    /// `_app` template.
    pub app: Option<String>,

    /// `_document` template; gets the head markup as `head`.
    pub document: Option<String>,

    /// Chunks the page depends on.
    pub chunk_group: Option<Vec<String>>,

    /// Dynamic-import manifest keys the page uses.
    #[serde(default)]
    pub dynamic: Vec<String>,

    /// Fixed results for the page's data hooks, by export name.
    #[serde(default)]
    pub hooks: BTreeMap<String, Value>,

    /// Other exports.
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

impl PageDefinition {
    /// Read a page definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse page file: {}", path.display()))
    }

    /// Build the page bundle this definition describes.
    pub fn into_bundle(self) -> Result<PageBundle> {
        let mut exports = PageExports::new();
        for (name, result) in self.hooks {
            if !HookKind::ALL.iter().any(|kind| kind.export_name() == name) {
                bail!("unknown data hook '{}'", name);
            }
            exports = exports.with_hook(name, Arc::new(FixedHook::new(result)));
        }
        for (name, value) in self.values {
            exports = exports.with_value(name, value);
        }

        let mut builder = PageBundle::builder(self.is_data_req)
            .component(
                self.template
                    .map(|t| Arc::new(TemplateComponent::new("page", t)) as Component),
            )
            .exports(exports);
        if let Some(app) = self.app {
            builder = builder.app(Arc::new(TemplateComponent::new("app", app)));
        }
        if let Some(document) = self.document {
            builder = builder.document(Arc::new(TemplateComponent::new("document", document)));
        }
        if let Some(chunks) = self.chunk_group {
            builder = builder.chunk_group(chunks);
        }

        Ok(builder.build()?)
    }
}

/// Component rendered from a string template.
#[derive(Debug, Clone)]
pub struct TemplateComponent {
    name: String,
    template: String,
}

impl TemplateComponent {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }
}

impl PageComponent for TemplateComponent {
    fn render(&self, props: &Value, children: &str) -> Result<String> {
        let mut out = String::with_capacity(self.template.len() + children.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start..];
            let (raw, open, close) = if after.starts_with("{{{") {
                (true, 3, "}}}")
            } else {
                (false, 2, "}}")
            };
            let Some(end) = after[open..].find(close) else {
                bail!("unclosed placeholder in {} template", self.name);
            };

            let key = after[open..open + end].trim();
            let value = if key == "children" {
                children.to_string()
            } else {
                prop_text(props, key)
            };
            if raw {
                out.push_str(&value);
            } else {
                out.push_str(&html_escape(&value));
            }
            rest = &after[open + end + close.len()..];
        }
        out.push_str(rest);

        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn prop_text(props: &Value, key: &str) -> String {
    match props.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Data hook that always returns the same result.
#[derive(Debug, Clone)]
pub struct FixedHook {
    result: Value,
}

impl FixedHook {
    pub fn new(result: Value) -> Self {
        Self { result }
    }
}

#[async_trait]
impl DataHook for FixedHook {
    async fn call(&self, context: Value) -> Result<Value> {
        trace!(%context, "data hook called");
        Ok(self.result.clone())
    }
}
