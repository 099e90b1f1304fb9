//! IPC server loop.
//!
//! Frames are a 4-byte little-endian length followed by a JSON body. One
//! request frame yields exactly one response frame. Unix domain sockets on
//! unix, named pipes on Windows.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::connections::ConnectionPool;
use super::handler::IpcHandler;
use super::protocol::{encode_message, IpcMessage, MAX_MESSAGE_SIZE};
use crate::shutdown::ShutdownCoordinator;

/// IPC server configuration.
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    /// Largest accepted request frame, in bytes. Never above
    /// `MAX_MESSAGE_SIZE`.
    pub max_frame_size: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_MESSAGE_SIZE,
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Read one frame. Returns `Ok(None)` on a clean close between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Vec<u8>>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(ServerError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

pub async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| ServerError::FrameTooLarge {
        size: data.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

async fn write_error<W>(writer: &mut W, code: u32, message: &str) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_message(&IpcMessage::error(code, message))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_frame(writer, &bytes).await
}

/// Serve request frames on one connection until the peer closes it.
pub async fn serve_connection<S>(
    mut stream: S,
    handler: &IpcHandler,
    shutdown: &ShutdownCoordinator,
    config: &IpcServerConfig,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max_frame_size = config.max_frame_size.min(MAX_MESSAGE_SIZE);
    loop {
        let frame = match read_frame(&mut stream, max_frame_size).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(e @ ServerError::FrameTooLarge { .. }) => {
                // The body was never read, so the stream is out of sync.
                write_error(&mut stream, 413, &e.to_string()).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let Some(_guard) = shutdown.track() else {
            write_error(&mut stream, 503, "Server is shutting down").await?;
            return Ok(());
        };

        let response = handler.process(&frame);
        write_frame(&mut stream, &response).await?;
    }
}

fn spawn_connection<S>(
    stream: S,
    handler: &Arc<IpcHandler>,
    connections: &Arc<ConnectionPool>,
    shutdown: &ShutdownCoordinator,
    config: &IpcServerConfig,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let handler = Arc::clone(handler);
    let shutdown = shutdown.clone();
    let config = config.clone();

    match connections.try_acquire() {
        Some(guard) => {
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) = serve_connection(stream, &handler, &shutdown, &config).await {
                    debug!(error = %e, "Connection closed with error");
                }
            });
        }
        None => {
            warn!(
                max = connections.max_connections(),
                "Connection limit reached, refusing client"
            );
            tokio::spawn(async move {
                let mut stream = stream;
                let _ = write_error(&mut stream, 503, "Too many connections").await;
            });
        }
    }
}

/// Accept connections on a Unix domain socket until `stop` flips to true.
#[cfg(unix)]
pub async fn run_server(
    socket_path: String,
    handler: Arc<IpcHandler>,
    connections: Arc<ConnectionPool>,
    shutdown: ShutdownCoordinator,
    mut stop: watch::Receiver<bool>,
    config: IpcServerConfig,
) -> Result<(), ServerError> {
    use std::path::Path;
    use tokio::net::UnixListener;

    let path = Path::new(&socket_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %socket_path, "Removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let listener = UnixListener::bind(path)?;
    info!(path = %socket_path, "IPC server listening");

    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        spawn_connection(stream, &handler, &connections, &shutdown, &config);
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                }
            }
        }
    }

    drop(listener);
    let _ = std::fs::remove_file(path);
    info!("IPC server stopped");
    Ok(())
}

/// Accept connections on a named pipe until `stop` flips to true.
#[cfg(windows)]
pub async fn run_server(
    pipe_name: String,
    handler: Arc<IpcHandler>,
    connections: Arc<ConnectionPool>,
    shutdown: ShutdownCoordinator,
    mut stop: watch::Receiver<bool>,
    config: IpcServerConfig,
) -> Result<(), ServerError> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let mut server = ServerOptions::new()
        .first_pipe_instance(true)
        .create(&pipe_name)?;
    info!(pipe = %pipe_name, "IPC server listening");

    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            connected = server.connect() => {
                connected?;
                let client = std::mem::replace(
                    &mut server,
                    ServerOptions::new().create(&pipe_name)?,
                );
                spawn_connection(client, &handler, &connections, &shutdown, &config);
            }
        }
    }

    info!("IPC server stopped");
    Ok(())
}
