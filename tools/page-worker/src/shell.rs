//! Default document shell for pages without a `_document`.

/// Escape text for HTML content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Head content for the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadContent {
    /// Page title.
    pub title: Option<String>,
    /// Deferred script sources.
    pub scripts: Vec<String>,
}

impl HeadContent {
    /// Add a deferred script.
    pub fn with_script(mut self, src: impl Into<String>) -> Self {
        self.scripts.push(src.into());
        self
    }

    /// Render head content to HTML.
    pub fn render(&self) -> String {
        let mut html = String::new();

        if let Some(title) = &self.title {
            html.push_str(&format!("<title>{}</title>\n", html_escape(title)));
        }

        for src in &self.scripts {
            html.push_str(&format!(
                "<script defer src=\"{}\"></script>\n",
                html_escape(src)
            ));
        }

        html
    }
}

/// Document wrapped around the rendered page.
#[derive(Debug, Clone)]
pub struct Shell {
    pub head: HeadContent,
    /// Serialized page data, embedded for the client runtime.
    pub page_data: Option<String>,
}

impl Shell {
    pub fn new(head: HeadContent) -> Self {
        Self {
            head,
            page_data: None,
        }
    }

    /// Embed the page data as the `__NEXT_DATA__` script.
    pub fn with_page_data(mut self, json: impl Into<String>) -> Self {
        self.page_data = Some(json.into());
        self
    }

    /// Render the opening part (up to the app root).
    pub fn render_opening(&self) -> String {
        let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str(&self.head.render());
        html.push_str("</head>\n<body>\n<div id=\"__next\">");
        html
    }

    /// The `__NEXT_DATA__` script, or nothing without page data.
    pub fn render_data_script(&self) -> String {
        match &self.page_data {
            Some(data) => format!(
                "<script id=\"__NEXT_DATA__\" type=\"application/json\">{}</script>\n",
                escape_script_json(data)
            ),
            None => String::new(),
        }
    }

    /// Render the closing part (after the app root).
    pub fn render_closing(&self) -> String {
        let mut html = String::from("</div>\n");
        html.push_str(&self.render_data_script());
        html.push_str("</body>\n</html>");
        html
    }

    /// Render the full document around `body`.
    pub fn render(&self, body: &str) -> String {
        let mut html = self.render_opening();
        html.push_str(body);
        html.push_str(&self.render_closing());
        html
    }
}

/// Keep embedded JSON from closing its `<script>` element.
fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}
