//! The parsed representation of a template: a tree of typed nodes as
//! the scanner hands them to the renderer.

use std::fmt::{self, Debug};

use kstring::KString;

use crate::value::{AsyncFn, ComponentFn, Value};

/// One `name=value` pair on a component or custom element. Bare
/// attributes carry `true`.
#[derive(PartialEq)]
pub struct Property {
    pub name: KString,
    pub value: Value,
}

impl Property {
    pub fn new(name: &str, value: impl Into<Value>) -> Property {
        Property { name: KString::from_ref(name), value: value.into() }
    }
}

impl Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.name, self.value)
    }
}

/// A function component invocation: the tag was an interpolated
/// function value.
pub struct ComponentNode {
    pub tag: ComponentFn,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

/// A hyphenated element. Never parsed further; the renderer hands it
/// to the first matching plugin.
pub struct CustomElement {
    pub tag: KString,
    pub attributes: Vec<Property>,
    pub children: Vec<Node>,
}

/// Marks where caller-supplied content goes inside the parent
/// component's own output. Only meaningful as a direct child of a
/// component; `name` is already resolved (`"default"` if absent).
pub struct SlotMarker {
    pub name: KString,
    pub children: Vec<Node>,
}

/// A subtree whose data arrives later. The renderer emits a
/// placeholder for it and patches the settled result in out of order.
pub struct AsyncNode {
    pub tag: AsyncFn,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

pub enum Node {
    /// Literal template text, including any plain (non-hyphenated)
    /// markup, carried through verbatim.
    Text(KString),
    /// An interpolated dynamic value in child or top-level position.
    Dynamic(Value),
    Component(ComponentNode),
    Custom(CustomElement),
    Slot(SlotMarker),
    Async(AsyncNode),
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Node::Dynamic(v) => f.debug_tuple("Dynamic").field(v).finish(),
            Node::Component(c) => f
                .debug_struct("Component")
                .field("properties", &c.properties)
                .field("children", &c.children)
                .finish(),
            Node::Custom(e) => f
                .debug_struct("Custom")
                .field("tag", &e.tag)
                .field("attributes", &e.attributes)
                .field("children", &e.children)
                .finish(),
            Node::Slot(s) => f
                .debug_struct("Slot")
                .field("name", &s.name)
                .field("children", &s.children)
                .finish(),
            Node::Async(a) => f
                .debug_struct("Async")
                .field("properties", &a.properties)
                .field("children", &a.children)
                .finish(),
        }
    }
}
