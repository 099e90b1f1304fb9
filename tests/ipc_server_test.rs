//! Tests for IPC framing and the connection loop.

use std::sync::Arc;
use std::time::Duration;

use aqua_core::ipc::protocol::MAX_MESSAGE_SIZE;
use aqua_core::ipc::server::{read_frame, serve_connection, write_frame, ServerError};
use aqua_core::ipc::{
    decode_message, encode_message, IpcHandler, IpcHandlerConfig, IpcMessage, IpcServerConfig,
};
use aqua_core::memory::{AllocationManager, RoutingTable};
use aqua_core::shutdown::ShutdownCoordinator;
use tokio::io::AsyncWriteExt;

fn handler(shutdown: &ShutdownCoordinator) -> Arc<IpcHandler> {
    let manager = Arc::new(AllocationManager::new(RoutingTable::parse("0:0").unwrap()));
    Arc::new(IpcHandler::new(
        manager,
        shutdown.clone(),
        IpcHandlerConfig::default(),
    ))
}

async fn call<S>(stream: &mut S, message: &IpcMessage) -> IpcMessage
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    write_frame(stream, &encode_message(message).unwrap()).await.unwrap();
    let frame = read_frame(stream, 1 << 20).await.unwrap().unwrap();
    decode_message(&frame).unwrap()
}

#[tokio::test]
async fn test_frame_roundtrip_and_clean_eof() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    write_frame(&mut a, b"hello").await.unwrap();
    drop(a);

    assert_eq!(read_frame(&mut b, 64).await.unwrap(), Some(b"hello".to_vec()));
    assert_eq!(read_frame(&mut b, 64).await.unwrap(), None);
}

#[tokio::test]
async fn test_oversized_frame_is_rejected_before_body() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    a.write_all(&(1_000_000u32).to_le_bytes()).await.unwrap();

    let err = read_frame(&mut b, 1024).await.unwrap_err();
    assert!(matches!(
        err,
        ServerError::FrameTooLarge {
            size: 1_000_000,
            max: 1024
        }
    ));
    assert_eq!(err.to_string(), "Frame too large: 1000000 bytes (max 1024)");
}

#[tokio::test]
async fn test_serve_connection_handles_sequential_requests() {
    let shutdown = ShutdownCoordinator::new();
    let handler = handler(&shutdown);
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    let server_shutdown = shutdown.clone();
    let server_handler = Arc::clone(&handler);
    let task = tokio::spawn(async move {
        serve_connection(
            server,
            &server_handler,
            &server_shutdown,
            &IpcServerConfig::default(),
        )
        .await
    });

    let created = call(
        &mut client,
        &IpcMessage::CreatePool {
            id: 0,
            size: 100,
            address: "dev0".into(),
        },
    )
    .await;
    assert!(matches!(created, IpcMessage::PoolResponse(ref p) if p.capacity == 100));

    let status = call(&mut client, &IpcMessage::StatusRequest).await;
    match status {
        IpcMessage::StatusResponse(report) => assert_eq!(report.pools.len(), 1),
        other => panic!("unexpected {:?}", other),
    }

    drop(client);
    task.await.unwrap().unwrap();
    assert_eq!(shutdown.in_flight_count(), 0);
}

#[tokio::test]
async fn test_serve_connection_replies_413_on_oversized_frame() {
    let shutdown = ShutdownCoordinator::new();
    let handler = handler(&shutdown);
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    let config = IpcServerConfig {
        max_frame_size: 4096,
    };
    let server_shutdown = shutdown.clone();
    let task = tokio::spawn(async move {
        serve_connection(server, &handler, &server_shutdown, &config).await
    });

    client.write_all(&(8192u32).to_le_bytes()).await.unwrap();
    let frame = read_frame(&mut client, 1 << 20).await.unwrap().unwrap();
    match decode_message(&frame).unwrap() {
        IpcMessage::Error { code, .. } => assert_eq!(code, 413),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        task.await.unwrap(),
        Err(ServerError::FrameTooLarge { .. })
    ));
}

#[tokio::test]
async fn test_frame_limit_never_exceeds_decoder_limit() {
    let shutdown = ShutdownCoordinator::new();
    let handler = handler(&shutdown);
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    let config = IpcServerConfig {
        max_frame_size: 2 * MAX_MESSAGE_SIZE,
    };
    let server_shutdown = shutdown.clone();
    let task = tokio::spawn(async move {
        serve_connection(server, &handler, &server_shutdown, &config).await
    });

    let oversized = (MAX_MESSAGE_SIZE + 1) as u32;
    client.write_all(&oversized.to_le_bytes()).await.unwrap();
    let frame = read_frame(&mut client, 1 << 20).await.unwrap().unwrap();
    match decode_message(&frame).unwrap() {
        IpcMessage::Error { code, .. } => assert_eq!(code, 413),
        other => panic!("unexpected {:?}", other),
    }
    match task.await.unwrap() {
        Err(ServerError::FrameTooLarge { max, .. }) => assert_eq!(max, MAX_MESSAGE_SIZE),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_serve_connection_replies_503_while_draining() {
    let shutdown = ShutdownCoordinator::new();
    let handler = handler(&shutdown);
    shutdown.initiate(Duration::from_millis(10)).await;

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let server_shutdown = shutdown.clone();
    let task = tokio::spawn(async move {
        serve_connection(
            server,
            &handler,
            &server_shutdown,
            &IpcServerConfig::default(),
        )
        .await
    });

    match call(&mut client, &IpcMessage::StatusRequest).await {
        IpcMessage::Error { code, .. } => assert_eq!(code, 503),
        other => panic!("unexpected {:?}", other),
    }
    task.await.unwrap().unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_server_over_unix_socket() {
    use aqua_core::cli::CliIpcClient;
    use aqua_core::ipc::{ConnectionConfig, ConnectionPool, HealthCheckType};
    use aqua_core::ipc::server::run_server;

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("aqua.sock").to_string_lossy().into_owned();

    let shutdown = ShutdownCoordinator::new();
    let handler = handler(&shutdown);
    handler.manager().add_pool(0, 512, "dev0").unwrap();
    let connections = Arc::new(ConnectionPool::new(ConnectionConfig::default()));
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let server = tokio::spawn(run_server(
        socket_path.clone(),
        handler,
        connections,
        shutdown.clone(),
        stop_rx,
        IpcServerConfig::default(),
    ));

    let client = CliIpcClient::new(socket_path.clone());
    let mut status = None;
    for _ in 0..50 {
        match client.status().await {
            Ok(report) => {
                status = Some(report);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let status = status.expect("server never came up");
    assert_eq!(status.pools[0].capacity, 512);

    let health = client.health(HealthCheckType::Readiness).await.unwrap();
    assert!(health.ok);

    stop_tx.send(true).unwrap();
    server.await.unwrap().unwrap();
    assert!(!std::path::Path::new(&socket_path).exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_server_refuses_over_connection_limit() {
    use aqua_core::ipc::server::run_server;
    use aqua_core::ipc::{ConnectionConfig, ConnectionPool};
    use tokio::net::UnixStream;

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("limit.sock").to_string_lossy().into_owned();

    let shutdown = ShutdownCoordinator::new();
    let connections = Arc::new(ConnectionPool::new(ConnectionConfig { max_connections: 1 }));
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(run_server(
        socket_path.clone(),
        handler(&shutdown),
        Arc::clone(&connections),
        shutdown,
        stop_rx,
        IpcServerConfig::default(),
    ));

    let mut first = None;
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(&socket_path).await {
            first = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut first = first.expect("server never came up");
    // A full request on the first connection guarantees its slot is held.
    call(&mut first, &IpcMessage::StatusRequest).await;

    let mut second = UnixStream::connect(&socket_path).await.unwrap();
    let frame = read_frame(&mut second, 1 << 20).await.unwrap().unwrap();
    match decode_message(&frame).unwrap() {
        IpcMessage::Error { code, message } => {
            assert_eq!(code, 503);
            assert_eq!(message, "Too many connections");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(connections.active_count(), 1);

    stop_tx.send(true).unwrap();
    server.await.unwrap().unwrap();
}
