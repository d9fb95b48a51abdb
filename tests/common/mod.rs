//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use wt_proxy::config::ProxyConfig;
use wt_proxy::net::Listener;
use wt_proxy::{HttpServer, PortMapper, Shutdown};

/// A proxy running on an ephemeral loopback port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub ports: Arc<PortMapper>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the proxy on 127.0.0.1 with an ephemeral port.
pub async fn start_proxy() -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.lifecycle.drain_timeout_secs = 1;

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let ports = Arc::new(PortMapper::new());
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, ports.clone());
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, ports, shutdown }
}

/// HTTP client that never pools or goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Read from `stream` until the end of an HTTP head.
///
/// Returns the head (without the blank line) and any bytes read past it.
pub async fn read_head(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let rest = buf.split_off(end + 4);
            buf.truncate(end);
            return (String::from_utf8(buf).unwrap(), rest);
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before end of head");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Value of header `name` in a raw head, compared case-insensitively.
pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// Read one `Content-Length` framed response. Returns (head, body).
pub async fn read_response(stream: &mut TcpStream) -> (String, String) {
    let (head, mut body) = read_head(stream).await;
    let len: usize = header(&head, "content-length").unwrap().parse().unwrap();
    while body.len() < len {
        let mut chunk = vec![0u8; len - body.len()];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        body.extend_from_slice(&chunk[..n]);
    }
    (head, String::from_utf8(body).unwrap())
}

/// Start a backend that answers every request with
/// `<method> <path>\n<host>\n<body>` and an `X-Backend: <name>` header.
pub async fn start_echo_backend(port: u16, name: &'static str) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (head, mut body) = read_head(&mut socket).await;
                let len: usize = header(&head, "content-length")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                while body.len() < len {
                    let mut chunk = vec![0u8; len - body.len()];
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => body.extend_from_slice(&chunk[..n]),
                    }
                }

                let request_line = head.lines().next().unwrap_or_default();
                let mut parts = request_line.split(' ');
                let method = parts.next().unwrap_or_default();
                let path = parts.next().unwrap_or_default();
                let reply = format!(
                    "{} {}\n{}\n{}",
                    method,
                    path,
                    header(&head, "host").unwrap_or("-"),
                    String::from_utf8_lossy(&body)
                );

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Backend: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    name,
                    reply.len(),
                    reply
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
}

/// Start a WebSocket backend that echoes every message back, prefixed with
/// `echo:` for text. The request path of each handshake is sent on the
/// returned channel.
pub async fn start_websocket_backend(port: u16) -> mpsc::UnboundedReceiver<String> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let (paths_tx, paths_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let paths_tx = paths_tx.clone();
            tokio::spawn(async move {
                let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let _ = paths_tx.send(request.uri().path().to_string());
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
                    return;
                };

                while let Some(Ok(message)) = ws.next().await {
                    let reply = match message {
                        Message::Text(text) => Message::text(format!("echo:{}", text.as_str())),
                        Message::Binary(data) => Message::Binary(data),
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    if ws.send(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    paths_rx
}

/// Start a backend that accepts any upgrade with a raw `101` and answers each
/// chunk it reads with the same bytes uppercased.
///
/// The backend waits for `await_bytes` bytes past the handshake before it
/// answers. With `replies` set it closes the socket after that many echoes.
pub async fn start_raw_upgrade_backend(port: u16, await_bytes: usize, replies: Option<usize>) {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (_head, mut early) = read_head(&mut socket).await;
                while early.len() < await_bytes {
                    let mut chunk = [0u8; 64];
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => early.extend_from_slice(&chunk[..n]),
                    }
                }

                let switch = "HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: raw\r\n\r\n";
                if socket.write_all(switch.as_bytes()).await.is_err() {
                    return;
                }
                if !early.is_empty() && socket.write_all(&early.to_ascii_uppercase()).await.is_err() {
                    return;
                }

                let mut left = replies;
                let mut chunk = [0u8; 1024];
                while left != Some(0) {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&chunk[..n].to_ascii_uppercase()).await.is_err() {
                                break;
                            }
                        }
                    }
                    left = left.map(|n| n - 1);
                }
            });
        }
    });
}

/// Start a backend that answers with a chunked body and keeps writing a chunk
/// every 20ms. Once a write fails, the number of chunks written is sent on the
/// returned channel.
pub async fn start_streaming_backend(port: u16) -> mpsc::UnboundedReceiver<usize> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }

                let mut written = 0;
                while socket.write_all(b"5\r\ntick\n\r\n").await.is_ok() {
                    written += 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                let _ = closed_tx.send(written);
            });
        }
    });

    closed_rx
}
