//! Tiny HTTP/1.1 server for tests: static routes, redirects, HEAD and
//! single `Range` requests. One request per connection.
//!
//! Byte routes can fail their first ranged requests with a 500, or leave out
//! `Content-Length` and end the body by closing the connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

#[derive(Clone)]
pub enum Route {
    Body {
        content_type: &'static str,
        body: Vec<u8>,
        sized: bool,
        failing_ranges: Arc<AtomicUsize>,
    },
    Redirect(String),
}

impl Route {
    fn body(content_type: &'static str, body: Vec<u8>) -> Self {
        Route::Body { content_type, body, sized: true, failing_ranges: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn html(body: &str) -> Self {
        Route::body("text/html; charset=utf-8", body.as_bytes().to_vec())
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Route::body("application/octet-stream", body)
    }

    /// Answers the first `failures` ranged requests with a 500.
    pub fn flaky(body: Vec<u8>, failures: usize) -> Self {
        Route::Body {
            content_type: "application/octet-stream",
            body,
            sized: true,
            failing_ranges: Arc::new(AtomicUsize::new(failures)),
        }
    }

    /// Sends no `Content-Length`, neither on HEAD nor on GET.
    pub fn without_length(body: Vec<u8>) -> Self {
        Route::Body {
            content_type: "application/octet-stream",
            body,
            sized: false,
            failing_ranges: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct TestServer {
    base: Url,
    ranged_requests: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let routes: Arc<HashMap<String, Route>> =
            Arc::new(routes.into_iter().map(|(path, route)| (path.to_string(), route)).collect());
        let ranged_requests = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ranged_requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let _ = handle(stream, &routes, &counter).await;
                });
            }
        });

        Self { base, ranged_requests }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    /// Number of GET requests that carried a `Range` header.
    pub fn ranged_requests(&self) -> usize {
        self.ranged_requests.load(Ordering::SeqCst)
    }
}

async fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    ranged_requests: &AtomicUsize,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let request = String::from_utf8_lossy(&request);
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or_default().split_whitespace();
    let method = first.next().unwrap_or_default().to_string();
    let path = first.next().unwrap_or_default().to_string();
    let range = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("range").then(|| value.trim().to_string())
    });

    let (head, body): (String, Vec<u8>) = match routes.get(&path) {
        None => ("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n".to_string(), Vec::new()),
        Some(Route::Redirect(location)) => (
            format!("HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\n"),
            Vec::new(),
        ),
        Some(Route::Body { content_type, body, sized, failing_ranges }) => match range.as_deref().and_then(parse_range) {
            Some(_) if method == "GET" && take_failure(failing_ranges) => {
                ranged_requests.fetch_add(1, Ordering::SeqCst);
                ("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n".to_string(), Vec::new())
            }
            Some((start, end)) if method == "GET" && *sized && start < body.len() as u64 => {
                ranged_requests.fetch_add(1, Ordering::SeqCst);
                let end = end.min(body.len() as u64 - 1);
                let slice = body[start as usize..=end as usize].to_vec();
                (
                    format!(
                        "HTTP/1.1 206 Partial Content\r\nContent-Type: {content_type}\r\nContent-Range: bytes {start}-{end}/{}\r\nContent-Length: {}\r\n",
                        body.len(),
                        slice.len()
                    ),
                    slice,
                )
            }
            _ if !*sized => (format!("HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\n"), body.clone()),
            _ => (
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nAccept-Ranges: bytes\r\nContent-Length: {}\r\n",
                    body.len()
                ),
                body.clone(),
            ),
        },
    };

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(b"Connection: close\r\n\r\n").await?;
    if method != "HEAD" {
        stream.write_all(&body).await?;
    }
    stream.shutdown().await
}

fn take_failure(failures: &AtomicUsize) -> bool {
    failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}
