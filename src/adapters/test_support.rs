//! Scripted fake gateway for transport and zone adapter tests.
//!
//! Each accepted connection consumes the next [`Reply`] from the script.
//! Once the script is exhausted, connections are closed without a reply.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// What the fake gateway does after reading a command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write the bytes, then close
    Raw(Vec<u8>),
    /// Write each chunk with a short pause in between, then close
    Chunks(Vec<Vec<u8>>),
    /// Never answer; wait for the client to give up
    Silent,
    /// Close straight away
    Close,
}

impl Reply {
    /// CRLF-terminated status line
    pub fn line(text: &str) -> Self {
        Self::Raw(format!("{}\r\n", text).into_bytes())
    }

    pub fn raw(text: &str) -> Self {
        Self::Raw(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct Recorded {
    received: Vec<String>,
    connections: usize,
    closed_by_client: usize,
}

pub struct FakeGateway {
    port: u16,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeGateway {
    pub async fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));

        let task_recorded = recorded.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let reply = script.lock().await.pop_front().unwrap_or(Reply::Close);
                task_recorded.lock().await.connections += 1;
                tokio::spawn(serve(stream, reply, task_recorded.clone()));
            }
        });

        Self { port, recorded }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Commands received so far, in arrival order
    pub async fn received(&self) -> Vec<String> {
        self.settle(|r| !r.received.is_empty() && r.received.len() >= r.connections)
            .await;
        self.recorded.lock().await.received.clone()
    }

    pub async fn connections(&self) -> usize {
        self.recorded.lock().await.connections
    }

    /// Number of connections the client closed, waiting up to a second for
    /// `expected` to be reached.
    pub async fn closed_by_client(&self, expected: usize) -> usize {
        self.settle(|r| r.closed_by_client >= expected).await;
        self.recorded.lock().await.closed_by_client
    }

    async fn settle(&self, done: impl Fn(&Recorded) -> bool) {
        for _ in 0..100 {
            if done(&*self.recorded.lock().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(mut stream: TcpStream, reply: Reply, recorded: Arc<Mutex<Recorded>>) {
    let mut command = Vec::new();
    let mut buf = [0u8; 64];
    while !command.ends_with(b"\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => command.extend_from_slice(&buf[..n]),
        }
    }
    recorded
        .lock()
        .await
        .received
        .push(String::from_utf8_lossy(&command).into_owned());

    match reply {
        Reply::Raw(bytes) => {
            let _ = stream.write_all(&bytes).await;
            let _ = stream.shutdown().await;
        }
        Reply::Chunks(chunks) => {
            for chunk in chunks {
                let _ = stream.write_all(&chunk).await;
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            let _ = stream.shutdown().await;
        }
        Reply::Silent => {}
        Reply::Close => {
            let _ = stream.shutdown().await;
        }
    }

    // Wait for the client's side of the close
    let closed = matches!(
        tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    );
    if closed {
        recorded.lock().await.closed_by_client += 1;
    }
}
