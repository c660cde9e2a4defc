//! Single-shot HTTP server for backend tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

pub(crate) enum CannedResponse {
    Reply { status: u16, body: String },
    Stall,
}

impl CannedResponse {
    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self::Reply {
            status,
            body: body.to_owned(),
        }
    }

    pub(crate) fn stall() -> Self {
        Self::Stall
    }
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    request: oneshot::Receiver<String>,
}

impl TestServer {
    pub(crate) fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Returns the raw request the server received.
    pub(crate) async fn request(self) -> String {
        self.request.await.expect("server captured request")
    }
}

pub(crate) async fn spawn_server(response: CannedResponse) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let raw = read_request(&mut stream).await;
        let _ = tx.send(raw);

        match response {
            CannedResponse::Reply { status, body } => {
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            CannedResponse::Stall => {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        }
    });

    TestServer { addr, request: rx }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            break;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}
