//! Minimal HTTP/1.1 stand-in for the download service.
//!
//! Routes are matched on method and exact path. JSON routes answer once and
//! close; event-stream routes write their events and then either close or hold
//! the connection open (sending comments) until the client goes away. Every
//! request is recorded with its body.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Response {
    Json { status: u32, body: String },
    Events { events: Vec<String>, hold_open: bool },
}

impl Response {
    pub fn json(body: &str) -> Self {
        Response::Json {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn json_status(status: u32, body: &str) -> Self {
        Response::Json {
            status,
            body: body.to_string(),
        }
    }

    /// Each entry is one `data:` payload.
    pub fn events(payloads: &[&str], hold_open: bool) -> Self {
        Response::Events {
            events: payloads.iter().map(|p| format!("data: {p}\n\n")).collect(),
            hold_open,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub struct Service {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    /// Open event-stream connections.
    open_streams: Arc<Mutex<usize>>,
}

impl Service {
    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn open_streams(&self) -> usize {
        *self.open_streams.lock().unwrap()
    }
}

type Routes = Vec<(&'static str, String, Response)>;

/// Starts the server on a background thread; it runs until the process exits.
pub fn start(routes: Vec<(&'static str, &str, Response)>) -> Service {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<Routes> = Arc::new(
        routes
            .into_iter()
            .map(|(m, p, r)| (m, p.to_string(), r))
            .collect(),
    );
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let open_streams = Arc::new(Mutex::new(0usize));
    {
        let recorded = Arc::clone(&recorded);
        let open_streams = Arc::clone(&open_streams);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let routes = Arc::clone(&routes);
                let recorded = Arc::clone(&recorded);
                let open_streams = Arc::clone(&open_streams);
                thread::spawn(move || handle(stream, &routes, &recorded, &open_streams));
            }
        });
    }
    Service {
        base_url: format!("http://127.0.0.1:{}/", port),
        recorded,
        open_streams,
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &Routes,
    recorded: &Mutex<Vec<Recorded>>,
    open_streams: &Mutex<usize>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    recorded.lock().unwrap().push(request.clone());

    let route = routes
        .iter()
        .find(|(m, p, _)| request.method.eq_ignore_ascii_case(m) && *p == request.path);
    match route.map(|(_, _, r)| r) {
        None => {
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
        Some(Response::Json { status, body }) => {
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Some(Response::Events { events, hold_open }) => {
            *open_streams.lock().unwrap() += 1;
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
            );
            for event in events {
                if stream.write_all(event.as_bytes()).is_err() {
                    break;
                }
                let _ = stream.flush();
                thread::sleep(Duration::from_millis(20));
            }
            if *hold_open {
                // Keep-alive comments until the client hangs up.
                while stream.write_all(b": ping\n\n").is_ok() && stream.flush().is_ok() {
                    thread::sleep(Duration::from_millis(50));
                }
            }
            *open_streams.lock().unwrap() -= 1;
        }
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let body_end = (header_end + content_length).min(data.len());
    Some(Recorded {
        method,
        path,
        body: String::from_utf8_lossy(&data[header_end..body_end]).to_string(),
    })
}
