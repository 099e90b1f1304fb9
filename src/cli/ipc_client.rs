//! Minimal IPC client used by the CLI subcommands.
//!
//! Opens one connection per request, writes a single frame and reads the
//! single response frame back.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::ipc::protocol::{decode_message, encode_message, HealthCheckType, IpcMessage, StatusReport};
use crate::ipc::server::{read_frame, write_frame, ServerError};
use crate::ipc::{HealthCheckResponse, ProtocolError};

const RESPONSE_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] ServerError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server closed the connection without replying")]
    NoResponse,

    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::NoResponse => 3,
            _ => 1,
        }
    }
}

pub struct CliIpcClient {
    socket_path: String,
    timeout: Duration,
}

impl CliIpcClient {
    pub fn new(socket_path: String) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    pub async fn health(&self, check_type: HealthCheckType) -> Result<HealthCheckResponse, CliError> {
        match self.request(&IpcMessage::HealthCheck { check_type }).await? {
            IpcMessage::HealthResponse(response) => Ok(response),
            _ => Err(CliError::UnexpectedResponse("expected health_response")),
        }
    }

    pub async fn status(&self) -> Result<StatusReport, CliError> {
        match self.request(&IpcMessage::StatusRequest).await? {
            IpcMessage::StatusResponse(report) => Ok(report),
            _ => Err(CliError::UnexpectedResponse("expected status_response")),
        }
    }

    /// Send one message and wait for its reply.
    pub async fn request(&self, message: &IpcMessage) -> Result<IpcMessage, CliError> {
        let payload = encode_message(message)?;
        let round_trip = async {
            let mut stream = self.connect().await?;
            exchange(&mut stream, &payload).await
        };
        let reply = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| CliError::Timeout(self.timeout))??;

        match reply {
            IpcMessage::Error { code, message } => Err(CliError::Server { code, message }),
            other => Ok(other),
        }
    }

    #[cfg(unix)]
    async fn connect(&self) -> Result<tokio::net::UnixStream, CliError> {
        Ok(tokio::net::UnixStream::connect(&self.socket_path).await?)
    }

    #[cfg(windows)]
    async fn connect(
        &self,
    ) -> Result<tokio::net::windows::named_pipe::NamedPipeClient, CliError> {
        use tokio::net::windows::named_pipe::ClientOptions;
        Ok(ClientOptions::new().open(&self.socket_path)?)
    }
}

async fn exchange<S>(stream: &mut S, payload: &[u8]) -> Result<IpcMessage, CliError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, payload).await?;
    let frame = read_frame(stream, RESPONSE_LIMIT)
        .await?
        .ok_or(CliError::NoResponse)?;
    Ok(decode_message(&frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let conn = CliError::Connection(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(conn.exit_code(), 3);
        assert_eq!(CliError::Timeout(Duration::from_secs(1)).exit_code(), 3);
        let server = CliError::Server {
            code: 404,
            message: "Pool 3 not found".into(),
        };
        assert_eq!(server.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_missing_socket_is_connection_error() {
        let client = CliIpcClient::new("/nonexistent/aqua-test.sock".into())
            .with_timeout(Duration::from_millis(500));
        let err = client.status().await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_exchange_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            let frame = read_frame(&mut server, RESPONSE_LIMIT).await.unwrap().unwrap();
            let request = decode_message(&frame).unwrap();
            assert!(matches!(request, IpcMessage::StatusRequest));
            let reply = encode_message(&IpcMessage::StatusResponse(StatusReport {
                pools: vec![],
                reclaiming: vec![],
                allocations: 0,
            }))
            .unwrap();
            write_frame(&mut server, &reply).await.unwrap();
        });

        let payload = encode_message(&IpcMessage::StatusRequest).unwrap();
        let reply = exchange(&mut client, &payload).await.unwrap();
        assert!(matches!(reply, IpcMessage::StatusResponse(_)));
        server_task.await.unwrap();
    }
}
