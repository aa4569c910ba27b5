use std::borrow::Cow;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use atpl::{html, suspense, Props, Renderer, Value};
use lazy_static::lazy_static;
use rouille::{router, start_server, Request, Response, ResponseBody};

struct State {
    counter: i64,
}

lazy_static! {
    static ref STATE: Mutex<State> = Mutex::new(State { counter: 0 });
    static ref RENDERER: Renderer = Renderer::new();
}

fn layout(mut props: Props) -> Result<Value> {
    Ok(html(
        &[
            "<html><head><title>demo</title></head><body>",
            "</body></html>",
        ],
        vec![props.take_children()],
    )
    .into())
}

fn visit_counter(mut props: Props) -> Result<Value> {
    let n = props.take("n").unwrap_or_default();
    Ok(html(&["<p>you are visitor number ", "</p>"], vec![n]).into())
}

/// A section whose data takes a while; the page skeleton streams out
/// immediately and this patches in when it settles.
fn slow_section(label: &'static str, millis: u64) -> Value {
    suspense(
        move || {
            sleep(Duration::from_millis(millis));
            Ok(Value::from(format!("<p>{label} settled after {millis}ms</p>")))
        },
        move |state, data, error| {
            if state.pending {
                Value::from(format!("<p>loading {label}...</p>"))
            } else if state.success {
                data.unwrap_or_default()
            } else {
                Value::from(format!(
                    "<p>could not load {label}: {}</p>",
                    error.map(|e| e.to_string()).unwrap_or_default()
                ))
            }
        },
    )
}

fn page() -> Value {
    let counter: i64 = {
        let mut state = STATE.lock().expect("die too if poisoned");
        state.counter += 1;
        state.counter
    };

    html(
        &[
            "<",
            "><h1>Hello world!</h1><",
            " n=",
            "/><color-swatch shade=\"teal\"></color-swatch>",
            "",
            "<footer>fin</footer><//>",
        ],
        vec![
            Value::component(layout),
            Value::component(visit_counter),
            counter.into(),
            slow_section("news", 1500),
            slow_section("weather", 3000),
        ],
    )
    .into()
}

fn main() {
    let addr = std::env::var("LISTEN").unwrap_or_else(|_| "127.0.0.1:3000".into());
    println!("listening on http://{addr}/");
    start_server(addr, move |request: &Request| {
        println!("{:?}: {} {}", request.remote_addr(), request.method(), request.url());
        router!(
            request,
            (GET) (/) => {
                Response {
                    status_code: 200,
                    headers: vec![(Cow::from("Content-Type"),
                                   Cow::from("text/html; charset=utf-8"))],
                    data: ResponseBody::from_reader(RENDERER.stream(page())),
                    upgrade: None,
                }
            },
            _ => Response::empty_404()
        )
    });
}
