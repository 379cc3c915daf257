//! Gateway transport: one command/response exchange per TCP connection
//!
//! The serial-to-IP gateway only handles short-lived exchanges reliably, so
//! every call opens a fresh connection, writes the CRLF-terminated command,
//! collects the reply and closes the connection again. Nothing is pooled
//! or retried.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::adapters::codec::ERROR_SENTINEL;
use crate::config::GatewayConfig;
use crate::error::{NuvoError, NuvoResult};

/// Bytes requested per read
const READ_CHUNK: usize = 48;

const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Client for the serial-to-IP gateway in front of the amplifier.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl GatewayClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.read_timeout_ms),
        )
    }

    /// Gateway address as "host:port"
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Send `command` and return the amplifier's reply.
    ///
    /// The reply is complete once it is at least as long as the bytes sent,
    /// once it holds a CRLF-terminated line, or once the gateway goes idle
    /// or closes after sending something. A `#?` reply is returned as
    /// [`NuvoError::DeviceRejected`].
    pub async fn exchange(&self, command: &str) -> NuvoResult<Vec<u8>> {
        let mut stream = self.connect().await?;
        debug!(addr = %self.addr(), command, "Gateway exchange");

        let result = self.converse(&mut stream, command).await;

        // Close on every path before handing control back
        if let Err(e) = stream.shutdown().await {
            debug!(addr = %self.addr(), "Gateway shutdown: {}", e);
        }
        drop(stream);

        let reply = result?;
        debug!(
            addr = %self.addr(),
            command,
            len = reply.len(),
            reply = %String::from_utf8_lossy(&reply).trim_end(),
            "Gateway reply"
        );

        if reply.trim_ascii() == ERROR_SENTINEL.as_bytes() {
            warn!(command, "Amplifier rejected command");
            return Err(NuvoError::DeviceRejected);
        }
        Ok(reply)
    }

    /// Send `command` without waiting for a reply (global commands such as
    /// `*ALLOFF` get no zone-scoped answer).
    pub async fn send(&self, command: &str) -> NuvoResult<()> {
        let mut stream = self.connect().await?;
        debug!(addr = %self.addr(), command, "Gateway send");

        let result = write_command(&mut stream, command).await;
        if let Err(e) = stream.shutdown().await {
            debug!(addr = %self.addr(), "Gateway shutdown: {}", e);
        }
        drop(stream);

        result.map(|_| ())
    }

    async fn connect(&self) -> NuvoResult<TcpStream> {
        let addr = self.addr();
        match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(NuvoError::ConnectUnreachable {
                addr,
                reason: e.to_string(),
            }),
            Err(_) => Err(NuvoError::ConnectUnreachable {
                addr,
                reason: format!("no connection within {:?}", self.connect_timeout),
            }),
        }
    }

    async fn converse(&self, stream: &mut TcpStream, command: &str) -> NuvoResult<Vec<u8>> {
        let sent = write_command(stream, command).await?;

        let mut reply = Vec::with_capacity(READ_CHUNK);
        let mut buf = [0u8; READ_CHUNK];

        loop {
            match timeout(self.read_timeout, stream.read(&mut buf)).await {
                // Nothing arrived at all
                Err(_) if reply.is_empty() => {
                    return Err(NuvoError::ReadTimeout {
                        command: command.to_string(),
                    })
                }
                // Gateway went idle mid-reply, keep what we have
                Err(_) => return Ok(reply),
                Ok(Ok(0)) if reply.is_empty() => {
                    return Err(NuvoError::ReadBroken("connection closed".to_string()))
                }
                Ok(Ok(0)) => return Ok(reply),
                Ok(Ok(n)) => {
                    reply.extend_from_slice(&buf[..n]);
                    if reply.len() >= sent || reply.ends_with(LINE_TERMINATOR) {
                        return Ok(reply);
                    }
                }
                Ok(Err(e)) if reply.is_empty() => return Err(NuvoError::ReadBroken(e.to_string())),
                Ok(Err(e)) => {
                    debug!(command, "Gateway read error after partial reply: {}", e);
                    return Ok(reply);
                }
            }
        }
    }
}

/// Write the terminated command, returning the number of bytes sent.
async fn write_command<W>(stream: &mut W, command: &str) -> NuvoResult<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
    frame.extend_from_slice(command.as_bytes());
    frame.extend_from_slice(LINE_TERMINATOR);

    let mut written = 0;
    while written < frame.len() {
        match stream.write(&frame[written..]).await {
            Ok(0) => return Err(NuvoError::WriteBroken("zero-length write".to_string())),
            Ok(n) => written += n,
            Err(e) => return Err(NuvoError::WriteBroken(e.to_string())),
        }
    }
    stream
        .flush()
        .await
        .map_err(|e| NuvoError::WriteBroken(e.to_string()))?;
    Ok(written)
}
