// crates/melruntime/tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use melruntime::{PlatformError, TriggerRequest, WorkflowTrigger};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Serve exactly one HTTP request with a canned response.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub async fn serve_once(status: u16, headers: &[(&str, &str)], body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{}", addr), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Trigger that records every dispatch and succeeds after `delay`
pub struct RecordingTrigger {
    sender: mpsc::UnboundedSender<(String, TriggerRequest)>,
    delay: Duration,
}

impl RecordingTrigger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, TriggerRequest)>) {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> (Self, mpsc::UnboundedReceiver<(String, TriggerRequest)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, delay }, receiver)
    }
}

#[async_trait]
impl WorkflowTrigger for RecordingTrigger {
    async fn trigger(&self, target: &str, request: &TriggerRequest) -> Result<(), PlatformError> {
        let _ = self.sender.send((target.to_string(), request.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Trigger whose dispatch always fails
pub struct FailingTrigger {
    pub attempts: Mutex<usize>,
}

impl FailingTrigger {
    pub fn new() -> Self {
        Self { attempts: Mutex::new(0) }
    }
}

#[async_trait]
impl WorkflowTrigger for FailingTrigger {
    async fn trigger(&self, target: &str, _request: &TriggerRequest) -> Result<(), PlatformError> {
        *self.attempts.lock().unwrap() += 1;
        Err(PlatformError::TriggerFailed {
            target: target.to_string(),
            reason: "dispatch layer unavailable".to_string(),
        })
    }
}
