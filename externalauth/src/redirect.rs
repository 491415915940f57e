//! How a driver sends the browser to the provider's authorize URL.

use url::Url;

/// Redirect emission strategy, fixed per driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStyle {
    /// Plain `302 Found` with a `Location` header.
    Found,
    /// `200 OK` HTML page carrying a zero-delay meta refresh, for webviews and proxies
    /// that do not follow raw HTTP redirects.
    MetaRefresh,
}

/// Redirect produced by login initiation, rendered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub url: Url,
    pub style: RedirectStyle,
}

impl LoginRedirect {
    pub fn new(url: Url, style: RedirectStyle) -> Self {
        Self { url, style }
    }

    pub fn location(&self) -> &str {
        self.url.as_str()
    }

    /// HTML document redirecting to the target URL.
    pub fn html(&self) -> String {
        format!(
            r#"<html><head><meta http-equiv="refresh" content="0; URL='{}'" /></head></html>"#,
            escape_attribute(self.url.as_str())
        )
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
