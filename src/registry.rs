//! Pluggable renderers for custom elements. The first entry whose
//! `matches` accepts an element renders it; elements nobody claims
//! render as nothing.

use anyhow::Result;
use itertools::Itertools;

use crate::node::{CustomElement, Property};
use crate::render::RenderCx;
use crate::value::Value;

/// The name under which the built-in catch-all is registered. Supply
/// your own entry with this name to replace (or suppress) it.
pub const DEFAULT_RENDERER_NAME: &str = "default";

pub trait ElementRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, element: &CustomElement) -> bool;

    /// Produce the element's output through `cx`. `cx.children`
    /// recurses into child nodes with the full dispatch, so nested
    /// components and async subtrees keep working inside plugins.
    fn render(&self, element: CustomElement, cx: &mut RenderCx<'_, '_>) -> Result<()>;
}

/// Serializes the element as-is: open tag with attributes, rendered
/// children, closing tag.
pub struct DefaultRenderer;

impl ElementRenderer for DefaultRenderer {
    fn name(&self) -> &str {
        DEFAULT_RENDERER_NAME
    }

    fn matches(&self, _element: &CustomElement) -> bool {
        true
    }

    fn render(&self, element: CustomElement, cx: &mut RenderCx<'_, '_>) -> Result<()> {
        let CustomElement { tag, attributes, children } = element;
        if attributes.is_empty() {
            cx.emit(&format!("<{tag}>"))?;
        } else {
            let attrs = attributes.iter().map(serialize_attribute).join(" ");
            cx.emit(&format!("<{tag} {attrs}>"))?;
        }
        cx.children(children)?;
        cx.emit(&format!("</{tag}>"))
    }
}

/// `true` renders as the bare attribute name; any other value is
/// double-quoted text.
fn serialize_attribute(attribute: &Property) -> String {
    match &attribute.value {
        Value::Json(serde_json::Value::Bool(true)) => attribute.name.to_string(),
        other => {
            let text = other.to_text().unwrap_or_default();
            format!("{}=\"{}\"", attribute.name, text)
        }
    }
}
