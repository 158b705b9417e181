//! Minimal HTTP/1.1 stand-in for the remote service, for integration tests.
//!
//! Implements the auth endpoints (CSRF, sign-in, callback) and the multipart
//! upload endpoint, and records every request it sees.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const SESSION_COOKIE: &str = "next-auth.session-token";
pub const SESSION_VALUE: &str = "sess-123";

#[derive(Debug, Clone, Copy)]
pub struct MockOptions {
    /// Status returned by `GET /api/auth/csrf`.
    pub csrf_status: u32,
    /// Token in the CSRF body; `None` sends `{}`.
    pub csrf_token: Option<&'static str>,
    /// Status returned by the sign-in endpoint.
    pub signin_status: u32,
    /// Password the callback accepts.
    pub password: &'static str,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            csrf_status: 200,
            csrf_token: Some("csrf-abc"),
            signin_status: 200,
            password: "hunter2",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Values of every multipart part named `field`, in body order.
    pub fn multipart_values(&self, field: &str) -> Vec<String> {
        let body = self.body_text();
        let marker = format!("; name=\"{}\"", field);
        let mut out = Vec::new();
        let mut rest: &str = &body;
        while let Some(i) = rest.find(&marker) {
            rest = &rest[i + marker.len()..];
            let Some(start) = rest.find("\r\n\r\n") else {
                break;
            };
            let value = &rest[start + 4..];
            let end = value.find("\r\n--").unwrap_or(value.len());
            out.push(value[..end].to_string());
            rest = &value[end..];
        }
        out
    }

    /// `filename="..."` of the file part.
    pub fn upload_filename(&self) -> Option<String> {
        let body = self.body_text();
        let start = body.find("filename=\"")? + "filename=\"".len();
        let end = body[start..].find('"')?;
        Some(body[start..start + end].to_string())
    }
}

pub struct MockService {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn start(opts: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let log = Arc::clone(&log);
                thread::spawn(move || handle(stream, opts, &log));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// A base URL on which nothing is listening.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(i) = find(&buf, b"\r\n\r\n") {
            break i;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?;
    let path = target.split('?').next().unwrap_or(target).to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn respond(stream: &mut TcpStream, status: u32, extra_headers: &[String], body: &str) {
    let mut head = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for h in extra_headers {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body.as_bytes());
    let _ = stream.flush();
}

fn has_session_cookie(req: &RecordedRequest) -> bool {
    req.header("Cookie")
        .map(|c| c.contains(&format!("{}={}", SESSION_COOKIE, SESSION_VALUE)))
        .unwrap_or(false)
}

fn handle(mut stream: TcpStream, opts: MockOptions, log: &Mutex<Vec<RecordedRequest>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    log.lock().unwrap().push(req.clone());

    let session_cookie = format!(
        "Set-Cookie: {}={}; Path=/; HttpOnly",
        SESSION_COOKIE, SESSION_VALUE
    );
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/auth/csrf") => {
            let body = match opts.csrf_token {
                Some(t) => format!("{{\"csrfToken\":\"{}\"}}", t),
                None => "{}".to_string(),
            };
            respond(
                &mut stream,
                opts.csrf_status,
                &["Set-Cookie: next-auth.csrf-token=csrf-cookie; Path=/".to_string()],
                &body,
            );
        }
        ("POST", "/api/auth/signin/credentials") => {
            respond(&mut stream, opts.signin_status, &[], "{\"url\":\"/\"}");
        }
        ("POST", "/api/auth/callback/credentials") => {
            let text = req.body_text();
            if text.contains(&format!("password={}", opts.password)) {
                respond(&mut stream, 200, &[session_cookie], "{\"url\":\"/\"}");
            } else {
                respond(&mut stream, 401, &[], "{\"error\":\"CredentialsSignin\"}");
            }
        }
        ("POST", "/api/upload") => {
            if !has_session_cookie(&req) {
                respond(&mut stream, 401, &[], "{\"error\":\"Unauthorized\"}");
                return;
            }
            let filename = req.upload_filename().unwrap_or_default();
            if filename.contains("reject") {
                respond(&mut stream, 500, &[], "{\"error\":\"storage full\"}");
            } else if filename.contains("garbled") {
                respond(&mut stream, 200, &[], "<html>not json</html>");
            } else {
                let body = format!("{{\"uploaded\":\"{}\"}}", filename.replace('"', ""));
                respond(&mut stream, 201, &[], &body);
            }
        }
        _ => respond(&mut stream, 404, &[], "{}"),
    }
}
