//! Canned HTTP fixture server for exercising the client end to end.
//!
//! Listens on an ephemeral local port, records every request it sees, and
//! answers from a routing closure. One request per connection
//! (`Connection: close`), which is plenty for a control surface that issues
//! one command at a time.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the fixture server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// `"POST /keypress/Home"` style summary.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.target)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A canned response for one request.
pub struct CannedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl CannedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/xml".to_string(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: String::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

type Responder = dyn Fn(&RecordedRequest) -> CannedResponse + Send + Sync;

pub struct TestHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestHttpServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&RecordedRequest) -> CannedResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        let respond: Arc<Responder> = Arc::new(respond);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let log = Arc::clone(&log);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    handle_connection(socket, log, respond).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Requests recorded so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `"METHOD /target"` summaries, in arrival order.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(RecordedRequest::line).collect()
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
    respond: Arc<Responder>,
) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    // Read up to the end of the header block.
    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                    break pos;
                }
            }
            Err(_) => return,
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let request = RecordedRequest {
        method,
        target,
        headers,
    };

    // Drain the body so the client finishes writing before we respond.
    let content_length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body_read = buf.len() - (header_end + 4);
    while body_read < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => body_read += n,
            Err(_) => break,
        }
    }

    let response = respond(&request);
    let head_only = request.method == "HEAD";
    log.lock().unwrap().push(request);

    let reason = match response.status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let mut wire = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    if response.status == 401 {
        wire.push_str("WWW-Authenticate: Basic realm=\"rokudev\"\r\n");
    }
    wire.push_str("\r\n");
    if !head_only {
        wire.push_str(&response.body);
    }

    let _ = socket.write_all(wire.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
