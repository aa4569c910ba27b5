//! A streaming HTML component-templating library.
//!
//! Templates are pairs of static string segments and dynamic values;
//! the tag of a component is an ordinary function value interpolated
//! into tag position. The parser yields typed nodes lazily, the
//! renderer streams them out chunk by chunk, and asynchronous subtrees
//! resolve out of order behind placeholders without holding up the
//! rest of the page.
//!
//! ```no_run
//! use atpl::{html, Renderer, Value, Props};
//! use anyhow::Result;
//!
//! fn greeting(mut props: Props) -> Result<Value> {
//!     let name = props.take("name").unwrap_or_default();
//!     Ok(html(&["<h1>hello ", "</h1>"], vec![name]).into())
//! }
//!
//! let page = html(&["<", " name=\"world\"/>"], vec![Value::component(greeting)]);
//! let out = Renderer::new().render_to_string(page)?;
//! assert_eq!(out, "<h1>hello world</h1>");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod node;
pub mod parser;
pub mod registry;
pub mod render;
pub mod stream;
pub mod value;
pub mod warn;

pub use node::{AsyncNode, ComponentNode, CustomElement, Node, Property, SlotMarker};
pub use parser::{html, html_with, Html, ParseError, ParseOpts};
pub use registry::{DefaultRenderer, ElementRenderer, DEFAULT_RENDERER_NAME};
pub use render::{ChunkSink, RenderCx, Renderer};
pub use stream::ChunkStream;
pub use value::{
    suspense, when, AsyncFn, AsyncState, AsyncTask, AsyncTemplate, ComponentFn, Props, Tag, Task,
    Value,
};
