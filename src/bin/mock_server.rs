//! Mock script server for integration testing
//!
//! Speaks the framed JSON protocol of the real server without executing
//! anything. A script "fails" when one of its lines starts with `raise`
//! (python sessions) or `throw` (groovy sessions). A script containing
//! `__disconnect__` makes the server drop the connection.
//!
//! Usage: `mock_server [--port N] [--refuse N] [--log PATH]`
//!
//! `--refuse N` rejects the `initialize` handshake of the first N
//! connections; `--log PATH` appends every received script, JSON-encoded,
//! one per line.

use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Options {
    port: u16,
    refuse: u32,
    log: Option<PathBuf>,
}

fn parse_options() -> Options {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let value = args.next().unwrap_or_default();
        match arg.as_str() {
            "--port" => options.port = value.parse().unwrap_or(0),
            "--refuse" => options.refuse = value.parse().unwrap_or(0),
            "--log" => options.log = Some(PathBuf::from(value)),
            other => eprintln!("mock_server: ignoring unknown option {}", other),
        }
    }
    options
}

fn main() {
    let options = parse_options();
    let listener = TcpListener::bind(("127.0.0.1", options.port)).expect("bind mock server");
    let addr = listener.local_addr().expect("local address");

    println!("mock_server listening at: {}", addr);
    std::io::stdout().flush().ok();

    let shared = Arc::new(Shared {
        connections: Mutex::new(0),
        refuse: options.refuse,
        log: options.log,
    });

    for stream in listener.incoming() {
        let Ok(stream) = stream else { continue };
        let shared = shared.clone();
        std::thread::spawn(move || serve(stream, &shared));
    }
}

struct Shared {
    connections: Mutex<u32>,
    refuse: u32,
    log: Option<PathBuf>,
}

impl Shared {
    /// Whether this connection's handshake should be refused
    fn next_connection_refused(&self) -> bool {
        let mut count = self.connections.lock().unwrap();
        *count += 1;
        *count <= self.refuse
    }

    fn log_script(&self, code: &str) {
        let Some(path) = &self.log else { return };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let line = serde_json::to_string(code).unwrap_or_default();
            writeln!(file, "{}", line).ok();
        }
    }
}

fn serve(stream: TcpStream, shared: &Shared) {
    let Ok(write_half) = stream.try_clone() else { return };
    let mut reader = BufReader::new(stream);
    let mut writer = write_half;
    let mut state = SessionState {
        seq: 1,
        refused: shared.next_connection_refused(),
        failure_prefix: "raise",
    };

    while let Some(message) = read_message(&mut reader) {
        match state.process_message(&message, shared) {
            Reply::Send(response) => send_message(&mut writer, &response),
            Reply::Disconnect => break,
            Reply::Ignore => {}
        }
    }
}

fn read_message<R: BufRead>(reader: &mut R) -> Option<Value> {
    let mut content_length = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return None; // EOF
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
        if let Some(value) = line.trim().strip_prefix("Content-Length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
    }

    let mut body = vec![0u8; content_length?];
    reader.read_exact(&mut body).ok()?;
    serde_json::from_slice(&body).ok()
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    let body = serde_json::to_string(message).unwrap();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).ok();
    writer.write_all(body.as_bytes()).ok();
    writer.flush().ok();
}

enum Reply {
    Send(Value),
    Disconnect,
    Ignore,
}

struct SessionState {
    seq: i64,
    refused: bool,
    /// Line prefix that makes a script fail
    failure_prefix: &'static str,
}

impl SessionState {
    fn next_seq(&mut self) -> i64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn process_message(&mut self, message: &Value, shared: &Shared) -> Reply {
        if message.get("type").and_then(|t| t.as_str()) != Some("request") {
            return Reply::Ignore;
        }
        let command = message
            .get("command")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let request_seq = message.get("seq").and_then(|s| s.as_i64()).unwrap_or(0);
        let arguments = message.get("arguments").cloned().unwrap_or(json!({}));

        let (success, error) = match command.as_str() {
            "initialize" => {
                if arguments.get("sessionType").and_then(|t| t.as_str()) == Some("groovy") {
                    self.failure_prefix = "throw";
                }
                if self.refused {
                    (false, Some("server is still starting".to_string()))
                } else {
                    (true, None)
                }
            }
            "runScript" => {
                let code = arguments
                    .get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default();
                shared.log_script(code);

                if code.contains("__disconnect__") {
                    return Reply::Disconnect;
                }
                match code
                    .lines()
                    .find(|line| line.trim_start().starts_with(self.failure_prefix))
                {
                    Some(line) => (false, Some(format!("Script error: {}", line.trim()))),
                    None => (true, None),
                }
            }
            other => (false, Some(format!("Unknown command: {}", other))),
        };

        let seq = self.next_seq();
        let mut response = json!({
            "seq": seq,
            "type": "response",
            "request_seq": request_seq,
            "success": success,
            "command": command,
        });
        if let Some(error) = error {
            response["message"] = json!(error);
        }
        Reply::Send(response)
    }
}
