//! The streaming renderer: walks parsed nodes depth-first, emitting
//! chunks as it goes. Asynchronous subtrees never block the walk; a
//! placeholder goes out in document order and the settled content
//! follows as an out-of-band patch, in completion order.

use std::collections::HashMap;
use std::io::Read;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use kstring::KString;
use scoped_thread_pool::{Pool, Scope};
use serde_json::Value as Json;

use crate::node::{CustomElement, Node, Property};
use crate::registry::{DefaultRenderer, ElementRenderer, DEFAULT_RENDERER_NAME};
use crate::value::{AsyncFn, AsyncState, AsyncTask, AsyncTemplate, Props, Tag, Value};
use crate::warn;

/// Receives the output chunks of a render, in order.
pub trait ChunkSink {
    fn chunk(&mut self, chunk: &str) -> Result<()>;
}

impl ChunkSink for String {
    fn chunk(&mut self, chunk: &str) -> Result<()> {
        self.push_str(chunk);
        Ok(())
    }
}

#[derive(Clone)]
pub struct Renderer {
    renderers: Arc<Vec<Arc<dyn ElementRenderer>>>,
    pool: Arc<Pool>,
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer::with_renderers(Vec::new())
    }

    /// Custom-element plugins, tried in order. A catch-all serializer
    /// is appended unless an entry already claims the default name.
    pub fn with_renderers(mut renderers: Vec<Arc<dyn ElementRenderer>>) -> Renderer {
        if !renderers.iter().any(|r| r.name() == DEFAULT_RENDERER_NAME) {
            renderers.push(Arc::new(DefaultRenderer));
        }
        Renderer { renderers: Arc::new(renderers), pool: default_pool() }
    }

    /// Share a worker pool between renderers instead of owning one.
    pub fn with_pool(mut self, pool: Arc<Pool>) -> Renderer {
        self.pool = pool;
        self
    }

    /// Render to `out`, blocking until the whole document including
    /// all async patches is written. Every spawned subtree is joined
    /// before this returns.
    pub fn render(&self, template: impl Into<Value>, out: &mut dyn ChunkSink) -> Result<()> {
        let value = template.into();
        self.pool.scoped(|scope| {
            let mut cx = RenderCx {
                out,
                renderers: self.renderers.as_slice(),
                scope,
                pending: PendingSet::new(),
                next_id: 0,
            };
            cx.value(value)?;
            cx.drain()
        })
    }

    pub fn render_to_string(&self, template: impl Into<Value>) -> Result<String> {
        let mut out = String::new();
        self.render(template, &mut out)?;
        Ok(out)
    }
}

fn default_pool() -> Arc<Pool> {
    let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    // Workers mostly sit in blocking waits, so oversubscribe.
    Arc::new(Pool::new(8 * parallelism))
}

/// One settled async subtree, as its worker reports it.
struct Settled {
    id: u64,
    outcome: Result<Value>,
}

/// The async subtrees of one render level. The channel doubles as the
/// race: workers send in completion order, `recv` hands them back the
/// same way.
struct PendingSet {
    tx: Sender<Settled>,
    rx: Receiver<Settled>,
    templates: HashMap<u64, AsyncTemplate>,
    in_flight: usize,
}

impl PendingSet {
    fn new() -> PendingSet {
        let (tx, rx) = channel();
        PendingSet { tx, rx, templates: HashMap::new(), in_flight: 0 }
    }
}

/// The state threaded through one render invocation. Plugins receive
/// it to emit chunks and recurse into children.
pub struct RenderCx<'a, 'scope> {
    out: &'a mut dyn ChunkSink,
    renderers: &'a [Arc<dyn ElementRenderer>],
    scope: &'a Scope<'scope>,
    pending: PendingSet,
    next_id: u64,
}

impl<'a, 'scope> RenderCx<'a, 'scope> {
    pub fn emit(&mut self, chunk: &str) -> Result<()> {
        self.out.chunk(chunk)
    }

    /// Render child nodes through the full dispatch.
    pub fn children(&mut self, children: Vec<Node>) -> Result<()> {
        for child in children {
            self.node(child)?;
        }
        Ok(())
    }

    pub fn value(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Str(s) => self.emit(s.as_str()),
            Value::Thunk(f) => {
                let v = f()?;
                self.value(v)
            }
            Value::List(items) => {
                for item in items {
                    self.value(item)?;
                }
                Ok(())
            }
            Value::Nodes(nodes) => self.children(nodes),
            Value::Task(task) => {
                let v = task.join()?;
                self.value(v)
            }
            Value::Stream(mut stream) => {
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf)?;
                self.emit(&String::from_utf8_lossy(&buf))
            }
            Value::Template(template) => {
                for node in template {
                    self.node(node?)?;
                }
                Ok(())
            }
            Value::Iter(items) => {
                for item in items {
                    self.value(item)?;
                }
                Ok(())
            }
            Value::Tag(Tag::Component(f)) => {
                let v = f(Props::empty())?;
                self.value(v)
            }
            Value::Tag(Tag::Slot) => Ok(()),
            Value::Tag(Tag::Async(f)) => self.async_subtree(f, Props::empty()),
            Value::Json(json) => self.json(json),
        }
    }

    fn json(&mut self, json: Json) -> Result<()> {
        match json {
            Json::String(s) => self.emit(&s),
            Json::Array(items) => {
                for item in items {
                    self.json(item)?;
                }
                Ok(())
            }
            object @ Json::Object(_) => self.emit(&object.to_string()),
            scalar => self.emit(&scalar.to_string()),
        }
    }

    pub fn node(&mut self, node: Node) -> Result<()> {
        match node {
            Node::Text(s) => self.emit(s.as_str()),
            Node::Dynamic(v) => self.value(v),
            // A marker rendered outside a component position just
            // renders its content.
            Node::Slot(marker) => self.children(marker.children),
            Node::Custom(element) => self.custom(element),
            Node::Component(c) => {
                let props = partition(c.properties, c.children);
                let v = (c.tag)(props)?;
                self.value(v)
            }
            Node::Async(a) => {
                let props = Props::new(a.properties, a.children, HashMap::new());
                self.async_subtree(a.tag, props)
            }
        }
    }

    fn custom(&mut self, element: CustomElement) -> Result<()> {
        let renderer = self.renderers.iter().find(|r| r.matches(&element)).cloned();
        match renderer {
            Some(r) => r.render(element, self),
            // Unclaimed elements render as nothing.
            None => Ok(()),
        }
    }

    /// Emit the placeholder for an async subtree and put its `start`
    /// on the worker pool. The walk continues immediately.
    fn async_subtree(&mut self, tag: AsyncFn, props: Props) -> Result<()> {
        let AsyncTask { start, template } = tag(props)?;
        let id = self.next_id;
        self.next_id += 1;
        self.pending.templates.insert(id, template.clone());
        self.pending.in_flight += 1;
        let tx = self.pending.tx.clone();
        self.scope.execute(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(start)) {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow!("async subtree panicked")),
            };
            let _ = tx.send(Settled { id, outcome });
        });
        self.emit(&format!(
            "<awaiting-promise style=\"display: contents;\" data-id=\"{id}\">"
        ))?;
        let placeholder = template(AsyncState::PENDING, None, None);
        self.value(placeholder)?;
        self.emit("</awaiting-promise>")
    }

    /// After the document-ordered walk: stream patches strictly in
    /// settle order until nothing is pending.
    fn drain(&mut self) -> Result<()> {
        while self.pending.in_flight > 0 {
            let Settled { id, outcome } = self
                .pending
                .rx
                .recv()
                .map_err(|_| anyhow!("async subtree workers vanished without settling"))?;
            self.pending.in_flight -= 1;
            let template = self
                .pending
                .templates
                .remove(&id)
                .expect("template was registered when the subtree spawned");
            self.patch(id, template, outcome)?;
        }
        Ok(())
    }

    /// One out-of-band patch: inert template content plus the script
    /// that swaps it in for the placeholder. Runs with a fresh pending
    /// set so subtrees inside the patch nest without limit.
    fn patch(&mut self, id: u64, template: AsyncTemplate, outcome: Result<Value>) -> Result<()> {
        let value = match outcome {
            Ok(data) => template(AsyncState::SUCCESS, Some(data), None),
            Err(error) => {
                warn!("async subtree {} failed: {:#}", id, error);
                template(AsyncState::FAILED, None, Some(error))
            }
        };
        let parent = mem::replace(&mut self.pending, PendingSet::new());
        let result = (|| {
            self.emit(&format!("<template data-id=\"{id}\">"))?;
            self.value(value)?;
            self.emit("</template>")?;
            self.emit(&replacement_script(id))?;
            self.drain()
        })();
        self.pending = parent;
        result
    }
}

fn replacement_script(id: u64) -> String {
    format!(
        "<script>{{\
         let placeholder = document.querySelector('awaiting-promise[data-id=\"{id}\"]');\
         const content = document.querySelector('template[data-id=\"{id}\"]').content.cloneNode(true);\
         placeholder.replaceWith(content);\
         }}</script>"
    )
}

/// Split a component's children into slot content and ordinary
/// children. Markers with the same name: the later one wins.
fn partition(properties: Vec<Property>, children: Vec<Node>) -> Props {
    let mut ordinary = Vec::new();
    let mut slots: HashMap<KString, Vec<Node>> = HashMap::new();
    for child in children {
        match child {
            Node::Slot(marker) => {
                slots.insert(marker.name, marker.children);
            }
            other => ordinary.push(other),
        }
    }
    Props::new(properties, ordinary, slots)
}
