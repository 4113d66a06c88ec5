//! Canned language server used by the integration tests
//!
//! Speaks just enough of the protocol: answers `initialize`,
//! `textDocument/definition`, and `textDocument/references` with fixed
//! locations, counts the notifications it receives, and reports the
//! counts in the `shutdown` response. Pass `--double-definition` to send
//! every definition response twice, which exercises duplicate-id
//! handling on the client side.

use lspjump::rpc::framing::{encode, ReadBuffer};
use serde_json::{json, Value};
use std::io::{Read, Write};

fn write_message(value: &Value) {
    let body = serde_json::to_vec(value).expect("serialize response");
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&encode(&body)).expect("write response");
    out.flush().expect("flush response");
}

fn main() {
    let double_definition = std::env::args().any(|arg| arg == "--double-definition");

    let mut stdin = std::io::stdin();
    let mut buffer = ReadBuffer::new();
    let mut chunk = [0u8; 4096];
    let mut initialized_count = 0u32;
    let mut did_open_count = 0u32;

    loop {
        let n = match stdin.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        for payload in buffer.feed(&chunk[..n]) {
            let Ok(message) = serde_json::from_slice::<Value>(&payload) else {
                continue;
            };
            let method = message.get("method").and_then(Value::as_str).unwrap_or("");
            let id = message.get("id").cloned().unwrap_or(Value::Null);

            match method {
                "initialize" => write_message(&json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {"capabilities": {}}
                })),
                "initialized" => initialized_count += 1,
                "textDocument/didOpen" => did_open_count += 1,
                "textDocument/definition" => {
                    let response = json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": [
                            {"uri": "file:///a.c",
                             "range": {"start": {"line": 4, "character": 2}}}
                        ]
                    });
                    write_message(&response);
                    if double_definition {
                        write_message(&response);
                    }
                }
                "textDocument/references" => write_message(&json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": [
                        {"uri": "file:///a.c",
                         "range": {"start": {"line": 4, "character": 2},
                                   "end": {"line": 4, "character": 9}}},
                        {"uri": "file:///b.c",
                         "range": {"start": {"line": 10, "character": 0},
                                   "end": {"line": 10, "character": 7}}}
                    ]
                })),
                "shutdown" => write_message(&json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "initialized": initialized_count,
                        "didOpen": did_open_count
                    }
                })),
                "exit" => return,
                _ => {}
            }
        }
    }
}
