#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Method, Response, Server, StatusCode};

pub type Calls = Arc<Mutex<Vec<String>>>;

/// Serve up to `limit` requests. Each is logged as `METHOD url` and answered
/// by `handler(method, url, body)` with a status code and a raw body.
pub fn spawn_mock_server<F>(limit: usize, handler: F) -> (String, Calls)
where
    F: Fn(&Method, &str, &str) -> (u16, String) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);

    thread::spawn(move || {
        for _ in 0..limit {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let method = req.method().clone();
            let url = req.url().to_owned();
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            if let Ok(mut g) = log.lock() {
                g.push(format!("{method} {url}"));
            }
            let (code, payload) = handler(&method, &url, &body);
            let response = Response::from_string(payload).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, calls)
}

/// JSON-RPC endpoint: `handler(method, params)` returns either a result or
/// an error object.
pub fn spawn_rpc_server<F>(limit: usize, handler: F) -> (String, Calls)
where
    F: Fn(&str, &Value) -> Result<Value, Value> + Send + 'static,
{
    spawn_mock_server(limit, move |_, _, body| {
        let request: Value = serde_json::from_str(body).expect("json-rpc request");
        let method = request["method"].as_str().expect("method").to_owned();
        let reply = match handler(&method, &request["params"]) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
            Err(error) => json!({ "jsonrpc": "2.0", "id": request["id"], "error": error }),
        };
        (200, reply.to_string())
    })
}

pub fn recorded(calls: &Calls) -> Vec<String> {
    calls.lock().expect("calls lock").clone()
}
