use serde::{Deserialize, Serialize};

/// Represents ways to locate an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Selector {
    /// Select by the element's `id` attribute
    Id(String),
    /// Select with a CSS selector
    Css(String),
    /// Select with an XPath expression
    XPath(String),
    /// Select the innermost element whose text contains the value
    Text(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }

    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Selector::XPath(xpath.into())
    }

    /// CSS equivalent where one exists. XPath and text selectors have none.
    pub fn as_css(&self) -> Option<String> {
        match self {
            Selector::Id(id) => Some(format!("#{id}")),
            Selector::Css(css) => Some(css.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "#{id}"),
            Selector::Css(css) => write!(f, "css:{css}"),
            Selector::XPath(xpath) => write!(f, "xpath:{xpath}"),
            Selector::Text(text) => write!(f, "text:{text}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s {
            "" => Selector::Invalid("empty selector".to_string()),
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::XPath(s.to_string()),
            _ if s.to_lowercase().starts_with("xpath:") => Selector::XPath(s[6..].trim().to_string()),
            _ if s.to_lowercase().starts_with("id:") => Selector::Id(s[3..].trim().to_string()),
            _ if s.to_lowercase().starts_with("css:") => Selector::Css(s[4..].trim().to_string()),
            _ if s.to_lowercase().starts_with("text:") => Selector::Text(s[5..].trim().to_string()),
            _ if s.starts_with('#') && is_plain_id(&s[1..]) => Selector::Id(s[1..].to_string()),
            _ if s.starts_with('#') || s.starts_with('.') || s.contains('[') => {
                Selector::Css(s.to_string())
            }
            _ => Selector::Invalid(format!(
                "'{s}' has no recognised prefix (use id:, css:, xpath:, text:, '#' or '/')"
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

fn is_plain_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
