//! The dynamic side of a template: everything an interpolation can
//! hold, and the contracts for component functions.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::io::Read;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Error, Result};
use kstring::KString;

use crate::node::{Node, Property};
use crate::parser::Html;

/// A synchronous component: properties and children in, any renderable
/// value out.
pub type ComponentFn = Arc<dyn Fn(Props) -> Result<Value> + Send + Sync>;

/// An asynchronous component: properties in, a started computation
/// plus its three-state template out.
pub type AsyncFn = Arc<dyn Fn(Props) -> Result<AsyncTask> + Send + Sync>;

/// The template of an async subtree. Called once with the pending
/// state for the placeholder, and once more with either the data or
/// the error once the computation settles.
pub type AsyncTemplate =
    Arc<dyn Fn(AsyncState, Option<Value>, Option<Error>) -> Value + Send + Sync>;

/// Which phase an async subtree is in. Exactly one flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncState {
    pub pending: bool,
    pub success: bool,
    pub error: bool,
}

impl AsyncState {
    pub const PENDING: AsyncState = AsyncState { pending: true, success: false, error: false };
    pub const SUCCESS: AsyncState = AsyncState { pending: false, success: true, error: false };
    pub const FAILED: AsyncState = AsyncState { pending: false, success: false, error: true };
}

/// What an `AsyncFn` hands back: `start` runs on a worker thread,
/// `template` renders each state of the subtree.
pub struct AsyncTask {
    pub start: Box<dyn FnOnce() -> Result<Value> + Send>,
    pub template: AsyncTemplate,
}

/// The function-like values that can sit in tag position (`<${...}>`).
#[derive(Clone)]
pub enum Tag {
    Component(ComponentFn),
    /// The reserved slot marker component.
    Slot,
    Async(AsyncFn),
}

impl Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Component(_) => write!(f, "Component(..)"),
            Tag::Slot => write!(f, "Slot"),
            Tag::Async(_) => write!(f, "Async(..)"),
        }
    }
}

/// A computation already running on its own thread. Rendering it
/// blocks on the result and recurses into it.
pub struct Task {
    rx: Receiver<Result<Value>>,
}

impl Task {
    /// Start `f` immediately on a fresh thread.
    pub fn spawn<F>(f: F) -> Task
    where F: FnOnce() -> Result<Value> + Send + 'static
    {
        let (tx, rx) = channel();
        thread::spawn(move || {
            let _ = tx.send(f());
        });
        Task { rx }
    }

    pub(crate) fn join(self) -> Result<Value> {
        self.rx
            .recv()
            .map_err(|_| anyhow!("task thread went away without a result"))?
    }
}

/// Anything an interpolation can evaluate to. Values are consumed
/// exactly once by the renderer.
pub enum Value {
    /// Emitted as-is.
    Str(KString),
    /// Plain data: scalars render via their text form, objects as
    /// JSON, arrays flatten element-wise.
    Json(serde_json::Value),
    /// Already-parsed nodes (a component's `children`, slot content).
    Nodes(Vec<Node>),
    /// Renderables in sequence.
    List(Vec<Value>),
    /// A nested template, evaluated lazily.
    Template(Html),
    /// Called with no arguments when reached; the result is rendered.
    Thunk(Box<dyn FnOnce() -> Result<Value> + Send>),
    /// Awaited when reached; the result is rendered.
    Task(Task),
    /// Drained to completion, UTF-8 decoded, emitted.
    Stream(Box<dyn Read + Send>),
    /// Iterated to completion; every item is rendered.
    Iter(Box<dyn Iterator<Item = Value> + Send>),
    /// A component used as a value (normally consumed in tag position).
    Tag(Tag),
}

impl Value {
    pub fn component<F>(f: F) -> Value
    where F: Fn(Props) -> Result<Value> + Send + Sync + 'static
    {
        Value::Tag(Tag::Component(Arc::new(f)))
    }

    pub fn slot() -> Value {
        Value::Tag(Tag::Slot)
    }

    pub fn async_component<F>(f: F) -> Value
    where F: Fn(Props) -> Result<AsyncTask> + Send + Sync + 'static
    {
        Value::Tag(Tag::Async(Arc::new(f)))
    }

    pub fn thunk<F>(f: F) -> Value
    where F: FnOnce() -> Result<Value> + Send + 'static
    {
        Value::Thunk(Box::new(f))
    }

    pub fn stream(r: impl Read + Send + 'static) -> Value {
        Value::Stream(Box::new(r))
    }

    pub fn iter<I>(items: I) -> Value
    where I: IntoIterator<Item = Value>,
          I::IntoIter: Send + 'static
    {
        Value::Iter(Box::new(items.into_iter()))
    }

    /// The text form used for attribute serialization and slot names.
    /// Non-data values have none.
    pub(crate) fn to_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Json(serde_json::Value::String(s)) => Some(s.clone()),
            Value::Json(j) => Some(j.to_string()),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        Value::Str(KString::from_static(""))
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Json(j) => f.debug_tuple("Json").field(j).finish(),
            Value::Nodes(n) => f.debug_tuple("Nodes").field(n).finish(),
            Value::List(l) => f.debug_tuple("List").field(l).finish(),
            Value::Template(_) => write!(f, "Template(..)"),
            Value::Thunk(_) => write!(f, "Thunk(..)"),
            Value::Task(_) => write!(f, "Task(..)"),
            Value::Stream(_) => write!(f, "Stream(..)"),
            Value::Iter(_) => write!(f, "Iter(..)"),
            Value::Tag(t) => write!(f, "Tag({t:?})"),
        }
    }
}

/// Data variants compare structurally; behavioral values never
/// compare equal.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Value {
        Value::Str(KString::from_static(s))
    }
}
impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(KString::from_string(s))
    }
}
impl From<KString> for Value {
    fn from(s: KString) -> Value {
        Value::Str(s)
    }
}
impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Value {
        Value::Json(j)
    }
}
impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Json(serde_json::Value::from(b))
    }
}
impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Json(serde_json::Value::from(n))
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Json(serde_json::Value::from(n))
    }
}
impl From<Html> for Value {
    fn from(t: Html) -> Value {
        Value::Template(t)
    }
}
impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Value {
        Value::List(l)
    }
}
impl From<Vec<Node>> for Value {
    fn from(n: Vec<Node>) -> Value {
        Value::Nodes(n)
    }
}
impl From<Task> for Value {
    fn from(t: Task) -> Value {
        Value::Task(t)
    }
}

/// What a component function receives: its flattened properties, its
/// ordinary children (slot markers are never among them), and the slot
/// content keyed by name.
#[derive(Debug, Default)]
pub struct Props {
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
    pub slots: HashMap<KString, Vec<Node>>,
}

impl Props {
    pub fn empty() -> Props {
        Props::default()
    }

    pub(crate) fn new(
        properties: Vec<Property>,
        children: Vec<Node>,
        slots: HashMap<KString, Vec<Node>>,
    ) -> Props {
        Props { properties, children, slots }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        // Later duplicates win, like spreading into an object would.
        self.properties
            .iter()
            .rev()
            .find(|p| p.name.as_str() == name)
            .map(|p| &p.value)
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        let i = self.properties.iter().rposition(|p| p.name.as_str() == name)?;
        Some(self.properties.remove(i).value)
    }

    pub fn take_children(&mut self) -> Value {
        Value::Nodes(std::mem::take(&mut self.children))
    }

    /// Content of the named slot, or nothing if the caller supplied
    /// none.
    pub fn take_slot(&mut self, name: &str) -> Value {
        match self.slots.remove(name) {
            Some(nodes) => Value::Nodes(nodes),
            None => Value::default(),
        }
    }
}

/// Evaluate `template` only when `condition` holds, else render
/// nothing.
pub fn when<F>(condition: bool, template: F) -> Value
where F: FnOnce() -> Value
{
    if condition {
        template()
    } else {
        Value::default()
    }
}

/// An inline async subtree: `start` runs on a worker thread while the
/// page streams on; `template` draws the placeholder and, later, the
/// settled state.
pub fn suspense<S, T>(start: S, template: T) -> Value
where S: FnOnce() -> Result<Value> + Send + 'static,
      T: Fn(AsyncState, Option<Value>, Option<Error>) -> Value + Send + Sync + 'static
{
    let start = Mutex::new(Some(start));
    let template: AsyncTemplate = Arc::new(template);
    Value::Tag(Tag::Async(Arc::new(move |_props| {
        let start = start
            .lock()
            .expect("no panics while holding this lock")
            .take()
            .ok_or_else(|| anyhow!("async subtree was already started"))?;
        Ok(AsyncTask { start: Box::new(start), template: template.clone() })
    })))
}
