//! Render context for pix icons and the renderer seam.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::GlyphSpec;

/// Template the resolver expects its caller to have available.
pub const PIX_ICON_TEMPLATE: &str = "theme_moonchild/local/bootstrapicons/pix_icon_bootstrap";

/// A `name="value"` pair on the fallback image element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconAttribute {
    pub name: String,
    pub value: String,
}

impl IconAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Direct image reference used when an icon has no glyph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedIcon {
    pub attributes: Vec<IconAttribute>,
}

impl UnmappedIcon {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Context handed to the template renderer.
///
/// Exactly one of `key` and `unmapped_icon` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconContext {
    pub title: String,
    pub alt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<GlyphSpec>,
    #[serde(rename = "unmappedIcon", skip_serializing_if = "Option::is_none")]
    pub unmapped_icon: Option<UnmappedIcon>,
    #[serde(rename = "aria-hidden", skip_serializing_if = "Option::is_none")]
    pub aria_hidden: Option<bool>,
}

impl IconContext {
    pub fn is_mapped(&self) -> bool {
        self.key.is_some()
    }
}

/// External renderer turning a template plus context into markup.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &IconContext) -> Result<String>;
}

/// Renderer for the stock pix icon template: an `<i>` glyph element, or an
/// `<img>` when unmapped. It knows only [`PIX_ICON_TEMPLATE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PixIconTemplate;

impl TemplateRenderer for PixIconTemplate {
    fn render(&self, template: &str, context: &IconContext) -> Result<String> {
        if template != PIX_ICON_TEMPLATE {
            return Err(crate::IconMapError::Template(format!(
                "unknown template '{template}'"
            )));
        }

        let hidden = if context.aria_hidden.unwrap_or(false) {
            r#" aria-hidden="true""#
        } else {
            ""
        };

        let markup = match (&context.key, &context.unmapped_icon) {
            (Some(glyph), _) => {
                let label = if context.title.is_empty() {
                    String::new()
                } else {
                    format!(
                        r#" title="{}" role="img" aria-label="{}""#,
                        escape_html(&context.title),
                        escape_html(&context.alt)
                    )
                };
                format!(
                    r#"
<i class="icon bi {}"{}{}></i>
"#,
                    escape_html(glyph),
                    label,
                    hidden
                )
            }
            (None, Some(unmapped)) => {
                let attributes: String = unmapped
                    .attributes
                    .iter()
                    .map(|a| format!(r#" {}="{}""#, a.name, escape_html(&a.value)))
                    .collect();
                format!("\n<img class=\"icon\"{attributes}{hidden}>\n")
            }
            (None, None) => String::new(),
        };

        Ok(markup)
    }
}

/// Escape text for use inside an HTML attribute value.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph_context(title: &str) -> IconContext {
        IconContext {
            title: title.to_string(),
            alt: title.to_string(),
            key: Some("bi-search".to_string()),
            unmapped_icon: None,
            aria_hidden: title.is_empty().then_some(true),
        }
    }

    #[test]
    fn test_context_serializes_template_field_names() {
        let context = IconContext {
            title: String::new(),
            alt: String::new(),
            key: None,
            unmapped_icon: Some(UnmappedIcon {
                attributes: vec![IconAttribute::new("src", "x.svg")],
            }),
            aria_hidden: Some(true),
        };
        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["aria-hidden"], true);
        assert_eq!(value["unmappedIcon"]["attributes"][0]["name"], "src");
        assert!(value.get("key").is_none());
    }

    #[test]
    fn test_render_glyph() {
        let html = PixIconTemplate
            .render(PIX_ICON_TEMPLATE, &glyph_context("Find <it>"))
            .unwrap();
        assert!(html.contains(r#"class="icon bi bi-search""#));
        assert!(html.contains(r#"title="Find &lt;it&gt;""#));
        assert!(!html.contains("aria-hidden"));
    }

    #[test]
    fn test_render_decorative_glyph() {
        let html = PixIconTemplate
            .render(PIX_ICON_TEMPLATE, &glyph_context(""))
            .unwrap();
        assert!(html.contains(r#"aria-hidden="true""#));
        assert!(!html.contains("title="));
    }

    #[test]
    fn test_unknown_template() {
        assert!(PixIconTemplate.render("core/other", &glyph_context("x")).is_err());
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a&b"c'"#), "a&amp;b&quot;c&#39;");
    }
}
