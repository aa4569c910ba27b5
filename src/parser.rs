//! The template scanner: turns paired static segments and dynamic
//! values into a lazy sequence of nodes.
//!
//! Only two kinds of markup are structural: component boundaries
//! (`<` directly followed by an interpolated tag value) and hyphenated
//! custom-element tags. Everything else passes through as text.

use std::collections::VecDeque;

use kstring::KString;
use serde_json::Value as Json;

use crate::node::{AsyncNode, ComponentNode, CustomElement, Node, Property, SlotMarker};
use crate::value::{Tag, Value};
use crate::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Custom elements cannot be self-closing: \"{0}\"")]
    SelfClosingCustomElement(KString),
    /// An attribute value that starts as literal text cannot continue
    /// into an interpolation (or run off the end of the template).
    #[error("attribute {0:?} mixes literal text with an interpolation in one value")]
    MixedAttributeValue(KString),
}

/// Scanner configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOpts {
    /// Trim surrounding whitespace from text nodes, dropping the node
    /// when nothing remains.
    pub trim_text: bool,
}

/// Parse a template. `statics` must have exactly one more segment than
/// `dynamics` has values.
pub fn html(statics: &'static [&'static str], dynamics: Vec<Value>) -> Html {
    html_with(statics, dynamics, ParseOpts::default())
}

pub fn html_with(
    statics: &'static [&'static str],
    dynamics: Vec<Value>,
    opts: ParseOpts,
) -> Html {
    assert!(
        statics.len() == dynamics.len() + 1,
        "template needs one more static segment than dynamic values, got {}/{}",
        statics.len(),
        dynamics.len()
    );
    Html {
        statics,
        dynamics: dynamics.into_iter().map(Some).collect(),
        opts,
        seg: 0,
        pos: 0,
        mode: Mode::Text,
        cmode: ComponentMode::None,
        pmode: PropMode::None,
        stack: Vec::new(),
        text: String::new(),
        tag: String::new(),
        ready: VecDeque::new(),
        done: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    TagOpen,
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentMode {
    None,
    Prop,
    Children,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropMode {
    None,
    SetProp,
    PropVal,
}

/// A node under construction, still open on the stack.
struct Builder {
    tag: BuilderTag,
    properties: Vec<Property>,
    children: Vec<Node>,
}

enum BuilderTag {
    Component(Tag),
    Custom(KString),
}

impl Builder {
    fn component(tag: Tag) -> Builder {
        Builder { tag: BuilderTag::Component(tag), properties: Vec::new(), children: Vec::new() }
    }

    fn custom(tag: KString) -> Builder {
        Builder { tag: BuilderTag::Custom(tag), properties: Vec::new(), children: Vec::new() }
    }

    fn is_custom(&self) -> bool {
        matches!(self.tag, BuilderTag::Custom(_))
    }

    fn finish(self) -> Node {
        let Builder { tag, properties, children } = self;
        match tag {
            BuilderTag::Component(Tag::Component(f)) => {
                Node::Component(ComponentNode { tag: f, properties, children })
            }
            BuilderTag::Component(Tag::Async(f)) => {
                Node::Async(AsyncNode { tag: f, properties, children })
            }
            BuilderTag::Component(Tag::Slot) => {
                Node::Slot(SlotMarker { name: slot_name(&properties), children })
            }
            BuilderTag::Custom(tag) => {
                Node::Custom(CustomElement { tag, attributes: properties, children })
            }
        }
    }
}

/// The slot's `name` property with the truthiness rules callers
/// expect: empty strings, `0`, `false` and absence all mean the
/// default slot.
fn slot_name(properties: &[Property]) -> KString {
    let named = properties.iter().find(|p| p.name.as_str() == "name");
    let name = named.and_then(|p| match &p.value {
        Value::Str(s) if !s.is_empty() => Some(s.to_string()),
        Value::Json(Json::String(s)) if !s.is_empty() => Some(s.clone()),
        Value::Json(Json::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Json(Json::Bool(true)) => Some("true".to_string()),
        _ => None,
    });
    match name {
        Some(n) => KString::from_string(n),
        None => KString::from_static("default"),
    }
}

/// Longest prefix of `s` shaped `[a-z0-9]+-[a-z0-9-]*`, i.e. a
/// hyphenated tag name.
fn custom_tag_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit()) {
        i += 1;
    }
    if i == 0 || bytes.get(i) != Some(&b'-') {
        return None;
    }
    i += 1;
    while i < bytes.len()
        && (bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit() || bytes[i] == b'-')
    {
        i += 1;
    }
    Some(&s[..i])
}

fn is_custom_tag(tag: &str) -> bool {
    custom_tag_prefix(tag).is_some()
}

/// A parse in progress. Yields nodes in document order; completed
/// subtrees attach to their parent and only top-level nodes surface.
pub struct Html {
    statics: &'static [&'static str],
    dynamics: Vec<Option<Value>>,
    opts: ParseOpts,
    seg: usize,
    pos: usize,
    mode: Mode,
    cmode: ComponentMode,
    pmode: PropMode,
    stack: Vec<Builder>,
    text: String,
    tag: String,
    ready: VecDeque<Node>,
    done: bool,
}

impl Iterator for Html {
    type Item = Result<Node, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.ready.pop_front() {
                return Some(Ok(node));
            }
            if self.done {
                return None;
            }
            if self.seg >= self.statics.len() {
                // Unterminated builders never surface.
                self.done = true;
                continue;
            }
            if let Err(e) = self.scan_segment() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl Html {
    fn scan_segment(&mut self) -> Result<(), ParseError> {
        let seg = self.statics[self.seg];
        self.pos = 0;
        self.text.clear();
        self.tag.clear();

        while self.pos < seg.len() {
            let c = seg[self.pos..].chars().next().expect("pos stays on a char boundary");
            let clen = c.len_utf8();
            let last = self.pos + clen == seg.len();

            match self.mode {
                Mode::Text | Mode::TagOpen => {
                    if c == '<' && last && self.next_dynamic_is_tag() {
                        self.flush_text_toplevel();
                        let tag = match self.take_dynamic(self.seg) {
                            Some(Value::Tag(t)) => t,
                            _ => unreachable!("just checked to be a tag value"),
                        };
                        self.stack.push(Builder::component(tag));
                        self.mode = Mode::Component;
                        self.cmode = ComponentMode::None;
                        self.pmode = PropMode::None;
                        self.pos += clen;
                    } else {
                        self.text.push(c);
                        if self.mode == Mode::Text && c == '<' {
                            self.tag.clear();
                            self.mode = Mode::TagOpen;
                        } else if self.mode == Mode::TagOpen {
                            if c == ' ' || c == '>' || c == '/' {
                                self.end_of_open_tag(c)?;
                            } else {
                                self.tag.push(c);
                            }
                        }
                        self.pos += clen;
                    }
                }
                Mode::Component => self.scan_component(seg, c, clen, last)?,
            }
        }

        self.end_of_segment();
        self.seg += 1;
        Ok(())
    }

    /// A `<tag...` scan hit a space, `>` or `/`. Hyphenated names open
    /// a custom element; everything else stays text.
    fn end_of_open_tag(&mut self, c: char) -> Result<(), ParseError> {
        if is_custom_tag(&self.tag) {
            if c == '/' {
                return Err(ParseError::SelfClosingCustomElement(KString::from_ref(&self.tag)));
            }
            // Surface whatever text preceded `<tag`. When the `<` sat
            // in an earlier segment the accumulated text is all
            // "before" content and stays as it is.
            let strip = 1 + self.tag.len() + c.len_utf8();
            if let Some(keep) = self.text.len().checked_sub(strip) {
                self.text.truncate(keep);
            }
            self.flush_text_toplevel();
            self.mode = Mode::Component;
            if c == ' ' {
                self.cmode = ComponentMode::Prop;
                self.pmode = PropMode::SetProp;
            } else {
                self.cmode = ComponentMode::Children;
            }
            let tag = std::mem::take(&mut self.tag);
            self.stack.push(Builder::custom(KString::from_string(tag)));
        } else {
            self.mode = Mode::Text;
        }
        Ok(())
    }

    fn scan_component(
        &mut self,
        seg: &'static str,
        c: char,
        clen: usize,
        last: bool,
    ) -> Result<(), ParseError> {
        match self.cmode {
            ComponentMode::Prop => self.scan_prop(seg),
            ComponentMode::Children => self.scan_children(seg, c, clen, last),
            ComponentMode::None => {
                if c == '>' {
                    self.cmode = ComponentMode::Children;
                    self.pos += clen;
                } else if c == ' ' {
                    self.cmode = ComponentMode::Prop;
                    self.pmode = PropMode::SetProp;
                    self.pos += clen;
                } else if c == '/'
                    && seg.as_bytes().get(self.pos + 1) == Some(&b'>')
                    && self.top_is_component()
                {
                    self.pos += 2;
                    self.text.clear();
                    self.close_top();
                } else {
                    self.text.push(c);
                    self.pos += clen;
                }
                Ok(())
            }
        }
    }

    fn scan_prop(&mut self, seg: &'static str) -> Result<(), ParseError> {
        match self.pmode {
            PropMode::PropVal => self.scan_prop_value(seg),
            // `None` cannot normally happen inside the prop section;
            // scan like a name to keep moving.
            PropMode::SetProp | PropMode::None => self.scan_prop_name(seg),
        }
    }

    fn scan_prop_name(&mut self, seg: &'static str) -> Result<(), ParseError> {
        let mut name = String::new();
        while self.pos < seg.len() && name != "..." {
            let c = seg[self.pos..].chars().next().expect("on a char boundary");
            if matches!(c, '=' | '/' | '>' | '"' | '\'' | ' ') {
                break;
            }
            name.push(c);
            self.pos += c.len_utf8();
        }

        if name == "..." {
            self.spread_dynamic();
            return Ok(());
        }
        if !name.is_empty() {
            // Boolean until a value overwrites it.
            self.push_property(name);
        }

        match seg[self.pos..].chars().next() {
            Some('=') => {
                self.pmode = PropMode::PropVal;
                self.pos += 1;
            }
            Some('/') => {
                if self.top_is_custom() {
                    return Err(self.self_closing_error());
                }
                self.pos += 1;
                if seg.as_bytes().get(self.pos) == Some(&b'>') {
                    self.pos += 1;
                }
                self.close_top();
            }
            Some('>') => {
                self.cmode = ComponentMode::Children;
                self.pmode = PropMode::None;
                self.pos += 1;
            }
            // Another property follows, or this is the closing quote
            // left over from a fully-dynamic quoted value.
            Some(' ') | Some('"') | Some('\'') => self.pos += 1,
            Some(_) => unreachable!("name scan stops only on the terminator set"),
            None => (), // the value picks up in the next segment
        }
        Ok(())
    }

    /// `...${obj}`: one property per key, in the object's iteration
    /// order.
    fn spread_dynamic(&mut self) {
        let spread = self.take_dynamic(self.seg);
        let Some(top) = self.stack.last_mut() else { return };
        match spread {
            Some(Value::Json(Json::Object(map))) => {
                for (k, v) in map {
                    top.properties.push(Property {
                        name: KString::from_string(k),
                        value: Value::Json(v),
                    });
                }
            }
            Some(other) => warn!("ignoring spread of a non-object value: {:?}", other),
            None => warn!("spread with no interpolated value"),
        }
    }

    fn scan_prop_value(&mut self, seg: &'static str) -> Result<(), ParseError> {
        let c = seg[self.pos..].chars().next().expect("caller checked pos < len");
        if c == '"' || c == '\'' {
            if self.pos + 1 == seg.len() {
                // The whole quoted value is the next interpolation;
                // keep it typed.
                let value = self.take_dynamic(self.seg).unwrap_or(Value::Json(Json::Null));
                self.set_last_property_value(value);
                self.pmode = PropMode::SetProp;
                self.pos += 1;
            } else {
                let start = self.pos + 1;
                match seg[start..].find(c) {
                    Some(end) => {
                        let value = KString::from_ref(&seg[start..start + end]);
                        self.set_last_property_value(Value::Str(value));
                        self.pmode = PropMode::SetProp;
                        self.pos = start + end + 1;
                    }
                    None => return Err(ParseError::MixedAttributeValue(self.last_property_name())),
                }
            }
        } else if self.pos == 0 {
            // The `=` ended the previous segment: the value is that
            // gap's interpolation, kept typed.
            let value = self.take_dynamic(self.seg - 1).unwrap_or(Value::Json(Json::Null));
            self.set_last_property_value(value);
            self.pmode = PropMode::SetProp;
            match c {
                '>' => {
                    self.cmode = ComponentMode::Children;
                    self.pmode = PropMode::None;
                    self.pos += 1;
                }
                '/' => {
                    if self.top_is_custom() {
                        return Err(self.self_closing_error());
                    }
                    self.pos += 1;
                    if seg.as_bytes().get(self.pos) == Some(&b'>') {
                        self.pos += 1;
                    }
                    self.close_top();
                }
                _ => self.pos += c.len_utf8(),
            }
        } else {
            // Unquoted literal value.
            let start = self.pos;
            let terminator = seg[start..]
                .char_indices()
                .find(|(_, ch)| matches!(ch, ' ' | '/' | '>'));
            let Some((off, term)) = terminator else {
                return Err(ParseError::MixedAttributeValue(self.last_property_name()));
            };
            let value = KString::from_ref(&seg[start..start + off]);
            self.set_last_property_value(Value::Str(value));
            self.pmode = PropMode::SetProp;
            self.pos = start + off;
            match term {
                '/' => {
                    if self.top_is_custom() {
                        return Err(self.self_closing_error());
                    }
                    self.pos += 1;
                    if seg.as_bytes().get(self.pos) == Some(&b'>') {
                        self.pos += 1;
                    }
                    self.close_top();
                }
                '>' => {
                    self.text.clear();
                    self.cmode = ComponentMode::Children;
                    self.pmode = PropMode::None;
                    self.pos += 1;
                }
                _ => self.pos += 1, // space: next property
            }
        }
        Ok(())
    }

    fn scan_children(
        &mut self,
        seg: &'static str,
        c: char,
        clen: usize,
        last: bool,
    ) -> Result<(), ParseError> {
        let bytes = seg.as_bytes();

        // `<//>` closes the innermost component.
        if self.top_is_component()
            && c == '<'
            && bytes.get(self.pos + 1) == Some(&b'/')
            && bytes.get(self.pos + 2) == Some(&b'/')
        {
            self.flush_text_child();
            self.pos += 4;
            self.close_top();
            return Ok(());
        }

        // A nested component boundary.
        if c == '<' && last && self.next_dynamic_is_tag() {
            self.flush_text_child();
            let tag = match self.take_dynamic(self.seg) {
                Some(Value::Tag(t)) => t,
                _ => unreachable!("just checked to be a tag value"),
            };
            self.stack.push(Builder::component(tag));
            self.cmode = ComponentMode::Prop;
            self.pmode = PropMode::SetProp;
            self.pos += clen;
            return Ok(());
        }

        // Last character of the segment: collect it and flush, the
        // interpolated value follows.
        if last {
            self.text.push(c);
            self.pos += clen;
            self.flush_text_child();
            return Ok(());
        }

        // The literal closing tag of the current custom element.
        if self.top_is_custom() && c == '<' && bytes.get(self.pos + 1) == Some(&b'/') {
            let tag = self.top_custom_tag();
            let rest = &seg[self.pos + 2..];
            if rest.starts_with(tag.as_str()) && rest.as_bytes().get(tag.len()) == Some(&b'>') {
                self.flush_text_child();
                self.pos += tag.len() + 3;
                self.close_top();
                return Ok(());
            }
            // Some other closing tag: plain text.
        }

        // A nested custom element opens.
        if c == '<' {
            if let Some(tag) = custom_tag_prefix(&seg[self.pos + 1..]) {
                self.flush_text_child();
                let after = bytes.get(self.pos + 1 + tag.len()).copied();
                self.pos += 1 + tag.len();
                self.mode = Mode::Component;
                match after {
                    Some(b' ') => {
                        self.cmode = ComponentMode::Prop;
                        self.pmode = PropMode::SetProp;
                        self.pos += 1;
                    }
                    Some(b'>') => {
                        self.cmode = ComponentMode::Children;
                        self.pos += 1;
                    }
                    Some(b'/') => {
                        return Err(ParseError::SelfClosingCustomElement(KString::from_ref(tag)))
                    }
                    _ => (), // tag runs into the segment end
                }
                self.stack.push(Builder::custom(KString::from_ref(tag)));
                return Ok(());
            }
        }

        self.text.push(c);
        self.pos += clen;
        Ok(())
    }

    /// Between this segment and the next sits a dynamic value; hand it
    /// to whoever the current mode says owns it.
    fn end_of_segment(&mut self) {
        let has_dynamic = self.seg + 1 < self.statics.len();

        if has_dynamic && self.cmode == ComponentMode::Children {
            if let Some(value) = self.take_dynamic(self.seg) {
                self.push_node(Node::Dynamic(value));
            }
        }
        if !self.text.is_empty() && self.cmode != ComponentMode::Children {
            self.flush_text_toplevel();
        }
        if has_dynamic && self.mode != Mode::Component {
            if let Some(value) = self.take_dynamic(self.seg) {
                self.ready.push_back(Node::Dynamic(value));
            }
        }
    }

    // -- stack-top accessors ------------------------------------------

    fn top_is_component(&self) -> bool {
        matches!(self.stack.last(), Some(b) if !b.is_custom())
    }

    fn top_is_custom(&self) -> bool {
        matches!(self.stack.last(), Some(b) if b.is_custom())
    }

    fn top_custom_tag(&self) -> KString {
        match self.stack.last() {
            Some(Builder { tag: BuilderTag::Custom(tag), .. }) => tag.clone(),
            _ => unreachable!("checked by the caller"),
        }
    }

    fn push_property(&mut self, name: String) {
        if let Some(top) = self.stack.last_mut() {
            top.properties.push(Property {
                name: KString::from_string(name),
                value: Value::Json(Json::Bool(true)),
            });
        }
    }

    fn set_last_property_value(&mut self, value: Value) {
        if let Some(p) = self.stack.last_mut().and_then(|b| b.properties.last_mut()) {
            p.value = value;
        }
    }

    fn last_property_name(&self) -> KString {
        self.stack
            .last()
            .and_then(|b| b.properties.last())
            .map(|p| p.name.clone())
            .unwrap_or_else(|| KString::from_static("?"))
    }

    fn self_closing_error(&self) -> ParseError {
        let tag = match self.stack.last() {
            Some(Builder { tag: BuilderTag::Custom(tag), .. }) => tag.clone(),
            _ => KString::from_static("?"),
        };
        ParseError::SelfClosingCustomElement(tag)
    }

    /// Pop the finished builder: append to its parent, or surface it
    /// when the stack runs empty.
    fn close_top(&mut self) {
        let builder = self.stack.pop().expect("close only with an open builder");
        let node = builder.finish();
        self.pmode = PropMode::None;
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            self.mode = Mode::Component;
            self.cmode = ComponentMode::Children;
        } else {
            self.ready.push_back(node);
            self.mode = Mode::Text;
            self.cmode = ComponentMode::None;
        }
    }

    // -- text and dynamics --------------------------------------------

    fn take_text(&mut self) -> Option<KString> {
        if self.text.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.text);
        if self.opts.trim_text {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(KString::from_ref(trimmed));
        }
        Some(KString::from_string(text))
    }

    fn flush_text_toplevel(&mut self) {
        if let Some(text) = self.take_text() {
            self.ready.push_back(Node::Text(text));
        }
    }

    fn flush_text_child(&mut self) {
        if let Some(text) = self.take_text() {
            self.push_node(Node::Text(text));
        }
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(top) => top.children.push(node),
            None => self.ready.push_back(node),
        }
    }

    fn next_dynamic_is_tag(&self) -> bool {
        matches!(self.dynamics.get(self.seg), Some(Some(Value::Tag(_))))
    }

    fn take_dynamic(&mut self, i: usize) -> Option<Value> {
        self.dynamics.get_mut(i).and_then(Option::take)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::value::Props;

    fn noop(_props: Props) -> Result<Value> {
        Ok(Value::default())
    }

    fn comp() -> Value {
        Value::component(noop)
    }

    fn parse(statics: &'static [&'static str], dynamics: Vec<Value>) -> Vec<Node> {
        html(statics, dynamics).collect::<Result<Vec<_>, _>>().expect("template parses")
    }

    fn parse_err(statics: &'static [&'static str], dynamics: Vec<Value>) -> ParseError {
        html(statics, dynamics)
            .collect::<Result<Vec<_>, _>>()
            .expect_err("template must not parse")
    }

    fn text(node: &Node) -> &str {
        match node {
            Node::Text(s) => s.as_str(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    fn dynamic(node: &Node) -> &Value {
        match node {
            Node::Dynamic(v) => v,
            other => panic!("expected a dynamic value, got {other:?}"),
        }
    }

    fn component(node: &Node) -> &crate::node::ComponentNode {
        match node {
            Node::Component(c) => c,
            other => panic!("expected a component, got {other:?}"),
        }
    }

    fn custom(node: &Node) -> &CustomElement {
        match node {
            Node::Custom(e) => e,
            other => panic!("expected a custom element, got {other:?}"),
        }
    }

    fn prop(name: &'static str, value: impl Into<Value>) -> Property {
        Property::new(name, value)
    }

    #[test]
    fn t_plain_html_is_text() {
        let nodes = parse(&["<h1>hello</h1>"], vec![]);
        assert_eq!(nodes.len(), 1);
        assert_eq!(text(&nodes[0]), "<h1>hello</h1>");
    }

    #[test]
    fn t_expressions() {
        let nodes = parse(&["<h1>hello</h1>", ""], vec![1.into()]);
        assert_eq!(text(&nodes[0]), "<h1>hello</h1>");
        assert_eq!(dynamic(&nodes[1]), &Value::from(1));
    }

    #[test]
    fn t_falsey_expressions() {
        let nodes = parse(&["<h1>hello</h1>", ""], vec![0.into()]);
        assert_eq!(dynamic(&nodes[1]), &Value::from(0));
        let nodes = parse(&["<h1>hello</h1>", ""], vec![false.into()]);
        assert_eq!(dynamic(&nodes[1]), &Value::from(false));
    }

    #[test]
    fn t_array_values() {
        let nodes = parse(&["<h1>", "</h1>"], vec![vec![Value::from(1), Value::from(2)].into()]);
        assert_eq!(text(&nodes[0]), "<h1>");
        assert_eq!(dynamic(&nodes[1]), &Value::List(vec![1.into(), 2.into()]));
        assert_eq!(text(&nodes[2]), "</h1>");
    }

    #[test]
    fn t_component_self_closing() {
        let nodes = parse(&["<h1>hello</h1><", "/>"], vec![comp()]);
        assert_eq!(text(&nodes[0]), "<h1>hello</h1>");
        let c = component(&nodes[1]);
        assert!(c.properties.is_empty());
        assert!(c.children.is_empty());
    }

    #[test]
    fn t_component_double_slash_close() {
        let nodes = parse(&["<h1>hello</h1><", "><//>"], vec![comp()]);
        assert_eq!(nodes.len(), 2);
        assert!(component(&nodes[1]).children.is_empty());
    }

    #[test]
    fn t_component_children() {
        let nodes = parse(&["<", "><h1>hello</h1><//>"], vec![comp()]);
        let c = component(&nodes[0]);
        assert_eq!(text(&c.children[0]), "<h1>hello</h1>");
    }

    #[test]
    fn t_nested_component_children() {
        let nodes = parse(&["<", "><", "><h1>hello</h1><//><//>"], vec![comp(), comp()]);
        let outer = component(&nodes[0]);
        let inner = component(&outer.children[0]);
        assert_eq!(text(&inner.children[0]), "<h1>hello</h1>");
    }

    #[test]
    fn t_double_slash_inside_child_text() {
        let nodes = parse(
            &["<", "><iframe src=\"https://example.com\"></iframe><//>"],
            vec![comp()],
        );
        let c = component(&nodes[0]);
        assert_eq!(text(&c.children[0]), "<iframe src=\"https://example.com\"></iframe>");
    }

    #[test]
    fn t_html_after_component() {
        let nodes = parse(&["<h1>hello</h1><", "/><h2>bye</h2>"], vec![comp()]);
        assert_eq!(text(&nodes[0]), "<h1>hello</h1>");
        component(&nodes[1]);
        assert_eq!(text(&nodes[2]), "<h2>bye</h2>");
    }

    #[test]
    fn t_component_then_expression() {
        let nodes = parse(&["<", " a=", "/>", ""], vec![comp(), 1.into(), 2.into()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("a", 1)]);
        assert_eq!(dynamic(&nodes[1]), &Value::from(2));
    }

    #[test]
    fn t_properties_quoting() {
        for statics in [
            &["<", " bar=\"1\"/>"] as &'static [&'static str],
            &["<", " bar='1'/>"],
            &["<", " bar=1/>"],
        ] {
            let nodes = parse(statics, vec![comp()]);
            assert_eq!(component(&nodes[0]).properties, vec![prop("bar", "1")]);
        }
    }

    #[test]
    fn t_properties_dynamic_typed() {
        // Quoted and unquoted whole-value interpolations keep the type.
        let nodes = parse(&["<", " bar=\"", "\"/>"], vec![comp(), 1.into()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("bar", 1)]);
        let nodes = parse(&["<", " bar='", "'/>"], vec![comp(), 1.into()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("bar", 1)]);
        let nodes = parse(&["<", " bar=", "/>"], vec![comp(), 1.into()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("bar", 1)]);
    }

    #[test]
    fn t_properties_boolean() {
        let nodes = parse(&["<", " bar/>"], vec![comp()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("bar", true)]);
        let nodes = parse(&["<", " bar><//>"], vec![comp()]);
        assert_eq!(component(&nodes[0]).properties, vec![prop("bar", true)]);
    }

    #[test]
    fn t_properties_spread() {
        let nodes = parse(&["<", " ...", "/>"], vec![comp(), json!({"a": 1, "b": 2}).into()]);
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("a", 1), prop("b", 2)]
        );
    }

    #[test]
    fn t_properties_spread_then_string() {
        let nodes = parse(
            &["<", " ...", " bar=\"baz\"/>"],
            vec![comp(), json!({"a": 1, "b": 2}).into()],
        );
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("a", 1), prop("b", 2), prop("bar", "baz")]
        );
    }

    #[test]
    fn t_properties_multiple_mixed() {
        let nodes = parse(&["<", " bar=\"1\" foo=\"2\"/>"], vec![comp()]);
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("bar", "1"), prop("foo", "2")]
        );
        let nodes = parse(&["<", " bar=", " foo=2/>"], vec![comp(), 1.into()]);
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("bar", 1), prop("foo", "2")]
        );
        let nodes = parse(&["<", " bar=1 foo=", "/>"], vec![comp(), 2.into()]);
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("bar", "1"), prop("foo", 2)]
        );
        let nodes = parse(&["<", " bar=\"", "\" foo=\"2\"/>"], vec![comp(), 1.into()]);
        assert_eq!(
            component(&nodes[0]).properties,
            vec![prop("bar", 1), prop("foo", "2")]
        );
    }

    #[test]
    fn t_children_expression() {
        let nodes = parse(&["<", ">", "<//>"], vec![comp(), 1.into()]);
        let c = component(&nodes[0]);
        assert_eq!(c.children.len(), 1);
        assert_eq!(dynamic(&c.children[0]), &Value::from(1));
    }

    #[test]
    fn t_children_text_with_expressions() {
        let nodes = parse(&["<", "><h1>hi ", "</h1><//>"], vec![comp(), 2.into()]);
        let c = component(&nodes[0]);
        assert_eq!(text(&c.children[0]), "<h1>hi ");
        assert_eq!(dynamic(&c.children[1]), &Value::from(2));
        assert_eq!(text(&c.children[2]), "</h1>");
    }

    #[test]
    fn t_children_falsey_expression() {
        let nodes = parse(&["<", "><h1>hi ", "</h1><//>"], vec![comp(), 0.into()]);
        assert_eq!(dynamic(&component(&nodes[0]).children[1]), &Value::from(0));
    }

    #[test]
    fn t_component_child_self_closing() {
        let nodes = parse(&["<", "><", "/><//>"], vec![comp(), comp()]);
        let outer = component(&nodes[0]);
        assert_eq!(outer.children.len(), 1);
        let inner = component(&outer.children[0]);
        assert!(inner.children.is_empty());
    }

    #[test]
    fn t_component_sibling_children() {
        let nodes = parse(&["<", "><", "/><", "/><//>"], vec![comp(), comp(), comp()]);
        let outer = component(&nodes[0]);
        assert_eq!(outer.children.len(), 2);
        component(&outer.children[0]);
        component(&outer.children[1]);
    }

    #[test]
    fn t_deep_nesting_attaches_to_immediate_parent() {
        let nodes = parse(
            &["<", "><", "><", "><", ">leaf<//><//><//><//>"],
            vec![comp(), comp(), comp(), comp()],
        );
        assert_eq!(nodes.len(), 1);
        let mut current = component(&nodes[0]);
        for _ in 0..3 {
            assert_eq!(current.children.len(), 1);
            current = component(&current.children[0]);
        }
        assert_eq!(text(&current.children[0]), "leaf");
    }

    #[test]
    fn t_custom_element_basic() {
        let nodes = parse(&["<my-el></my-el>"], vec![]);
        let e = custom(&nodes[0]);
        assert_eq!(e.tag.as_str(), "my-el");
        assert!(e.attributes.is_empty());
        assert!(e.children.is_empty());
    }

    #[test]
    fn t_custom_element_no_self_closing() {
        let e = parse_err(&["<my-el/>"], vec![]);
        assert_eq!(
            e.to_string(),
            "Custom elements cannot be self-closing: \"my-el\""
        );
    }

    #[test]
    fn t_custom_element_no_self_closing_after_attribute() {
        let e = parse_err(&["<my-el foo=bar/>"], vec![]);
        assert_eq!(e, ParseError::SelfClosingCustomElement(KString::from_static("my-el")));
        let e = parse_err(&["<my-el foo/>"], vec![]);
        assert_eq!(e, ParseError::SelfClosingCustomElement(KString::from_static("my-el")));
    }

    #[test]
    fn t_custom_element_siblings() {
        let nodes = parse(&["<foo-el></foo-el><bar-el></bar-el>"], vec![]);
        assert_eq!(custom(&nodes[0]).tag.as_str(), "foo-el");
        assert_eq!(custom(&nodes[1]).tag.as_str(), "bar-el");
    }

    #[test]
    fn t_custom_element_sibling_component() {
        let nodes = parse(&["<foo-el></foo-el><", "/>"], vec![comp()]);
        assert_eq!(custom(&nodes[0]).tag.as_str(), "foo-el");
        component(&nodes[1]);
    }

    #[test]
    fn t_custom_element_text_siblings() {
        let nodes = parse(&["hello<foo-el></foo-el>world"], vec![]);
        assert_eq!(text(&nodes[0]), "hello");
        assert_eq!(custom(&nodes[1]).tag.as_str(), "foo-el");
        assert_eq!(text(&nodes[2]), "world");
    }

    #[test]
    fn t_custom_element_attributes() {
        for statics in [
            &["<my-el foo=b></my-el>"] as &'static [&'static str],
            &["<my-el foo='b'></my-el>"],
            &["<my-el foo=\"b\"></my-el>"],
        ] {
            let nodes = parse(statics, vec![]);
            assert_eq!(custom(&nodes[0]).attributes, vec![prop("foo", "b")]);
        }
    }

    #[test]
    fn t_custom_element_attribute_dynamic_typed() {
        let nodes = parse(&["<my-el foo=\"", "\"></my-el>"], vec![1.into()]);
        assert_eq!(custom(&nodes[0]).attributes, vec![prop("foo", 1)]);
    }

    #[test]
    fn t_custom_element_attribute_boolean_and_multiple() {
        let nodes = parse(&["<my-el foo></my-el>"], vec![]);
        assert_eq!(custom(&nodes[0]).attributes, vec![prop("foo", true)]);
        let nodes = parse(&["<my-el foo=\"bar\" bar=\"baz\"></my-el>"], vec![]);
        assert_eq!(
            custom(&nodes[0]).attributes,
            vec![prop("foo", "bar"), prop("bar", "baz")]
        );
    }

    #[test]
    fn t_custom_element_spread() {
        let nodes = parse(&["<my-el ...", "></my-el>"], vec![json!({"a": 1, "b": 2}).into()]);
        assert_eq!(custom(&nodes[0]).attributes, vec![prop("a", 1), prop("b", 2)]);
    }

    #[test]
    fn t_custom_element_children() {
        let nodes = parse(&["<my-el>a</my-el>"], vec![]);
        assert_eq!(text(&custom(&nodes[0]).children[0]), "a");

        let nodes = parse(&["<my-el>a ", " b</my-el>"], vec![1.into()]);
        let e = custom(&nodes[0]);
        assert_eq!(text(&e.children[0]), "a ");
        assert_eq!(dynamic(&e.children[1]), &Value::from(1));
        assert_eq!(text(&e.children[2]), " b");
    }

    #[test]
    fn t_custom_element_nested_component() {
        let nodes = parse(&["<my-el><", "/></my-el>"], vec![comp()]);
        let e = custom(&nodes[0]);
        component(&e.children[0]);
    }

    #[test]
    fn t_custom_element_double_nested_component() {
        let nodes = parse(&["<my-el><", "><", "><//><//></my-el>"], vec![comp(), comp()]);
        let e = custom(&nodes[0]);
        let outer = component(&e.children[0]);
        component(&outer.children[0]);
    }

    #[test]
    fn t_custom_element_nested_custom() {
        let nodes = parse(&["<foo-el><bar-el></bar-el></foo-el>"], vec![]);
        let outer = custom(&nodes[0]);
        assert_eq!(custom(&outer.children[0]).tag.as_str(), "bar-el");
    }

    #[test]
    fn t_custom_element_inside_component() {
        let nodes = parse(&["<", "><my-el></my-el><//>"], vec![comp()]);
        let c = component(&nodes[0]);
        assert_eq!(custom(&c.children[0]).tag.as_str(), "my-el");
    }

    #[test]
    fn t_custom_element_inside_component_with_text_sibling() {
        let nodes = parse(&["<", "><h1>a</h1><my-el></my-el><//>"], vec![comp()]);
        let c = component(&nodes[0]);
        assert_eq!(text(&c.children[0]), "<h1>a</h1>");
        assert_eq!(custom(&c.children[1]).tag.as_str(), "my-el");
    }

    #[test]
    fn t_plain_closing_tag_inside_custom_element_stays_text() {
        let nodes = parse(&["<my-el><p>a</p></my-el>"], vec![]);
        let e = custom(&nodes[0]);
        assert_eq!(text(&e.children[0]), "<p>a</p>");
    }

    #[test]
    fn t_slot_marker_parses_with_name() {
        let nodes = parse(
            &["<", "><", " name=\"foo\">content<//><//>"],
            vec![comp(), Value::slot()],
        );
        let c = component(&nodes[0]);
        match &c.children[0] {
            Node::Slot(s) => {
                assert_eq!(s.name.as_str(), "foo");
                assert_eq!(text(&s.children[0]), "content");
            }
            other => panic!("expected a slot marker, got {other:?}"),
        }
    }

    #[test]
    fn t_slot_marker_default_name() {
        let nodes = parse(&["<", "><", ">hi<//><//>"], vec![comp(), Value::slot()]);
        match &component(&nodes[0]).children[0] {
            Node::Slot(s) => assert_eq!(s.name.as_str(), "default"),
            other => panic!("expected a slot marker, got {other:?}"),
        }
    }

    #[test]
    fn t_mixed_attribute_value_is_fatal() {
        let e = parse_err(&["<my-el foo=\"text", "\"></my-el>"], vec![1.into()]);
        assert_eq!(e, ParseError::MixedAttributeValue(KString::from_static("foo")));

        let e = parse_err(&["<", " foo=te", "/>"], vec![comp(), 1.into()]);
        assert_eq!(e, ParseError::MixedAttributeValue(KString::from_static("foo")));
    }

    #[test]
    fn t_trim_text_option() {
        let nodes = html_with(
            &["  a  ", "  b  "],
            vec![1.into()],
            ParseOpts { trim_text: true },
        )
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        assert_eq!(text(&nodes[0]), "a");
        assert_eq!(dynamic(&nodes[1]), &Value::from(1));
        assert_eq!(text(&nodes[2]), "b");
    }

    #[test]
    fn t_trim_text_drops_whitespace_only_nodes() {
        let nodes = html_with(
            &["<", ">  <", "/>  <//>"],
            vec![comp(), comp()],
            ParseOpts { trim_text: true },
        )
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        let outer = component(&nodes[0]);
        assert_eq!(outer.children.len(), 1);
        component(&outer.children[0]);
    }

    #[test]
    fn t_lazy_yields_before_later_error() {
        let mut parse = html(&["<h1>a</h1>", "<my-el/>"], vec![1.into()]);
        assert_eq!(text(&parse.next().unwrap().unwrap()), "<h1>a</h1>");
        assert_eq!(dynamic(&parse.next().unwrap().unwrap()), &Value::from(1));
        assert!(parse.next().unwrap().is_err());
        assert!(parse.next().is_none());
    }

    #[test]
    fn t_builder_stack_empty_between_yields() {
        // Sibling subtrees surface one by one, in document order.
        let nodes = parse(
            &["<a-el>x</a-el><", ">y<//><b-el>z</b-el>"],
            vec![comp()],
        );
        assert_eq!(nodes.len(), 3);
        assert_eq!(custom(&nodes[0]).tag.as_str(), "a-el");
        component(&nodes[1]);
        assert_eq!(custom(&nodes[2]).tag.as_str(), "b-el");
    }
}
