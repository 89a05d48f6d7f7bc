//! Unix socket IPC server for the Shellhub daemon.
//!
//! A connection carries any number of request/response exchanges. A
//! `subscribe` request turns it into a one-way notification stream that
//! lasts until the client disconnects.

use crate::codec::{decode_request, read_frame, write_frame, MAX_REQUEST_SIZE};
use crate::{ErrorCode, IpcError, Request, Response, ResponseData};
use async_trait::async_trait;
use shellhub_core::{Channel, Subscription};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};

/// Idle connections are closed after this long without a request
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    handler: Arc<dyn RequestHandler>,
}

impl IpcServer {
    /// Create a new IPC server bound to the given socket path
    pub async fn new<P: AsRef<Path>>(
        socket_path: P,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, IpcError> {
        let socket_path = socket_path.as_ref();

        // Remove stale socket file if it exists
        if socket_path.exists() {
            let _ = std::fs::remove_file(socket_path);
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // User only - 0600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!("IPC server listening on {}", socket_path.display());

        Ok(Self { listener, handler })
    }

    /// Run the server, accepting connections until the task is dropped
    pub async fn run(&self) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, handler).await {
                            tracing::debug!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        stream: UnixStream,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), IpcError> {
        let (mut reader, mut writer) = stream.into_split();

        loop {
            let frame = tokio::time::timeout(IDLE_TIMEOUT, read_frame(&mut reader, MAX_REQUEST_SIZE))
                .await??;
            let Some(body) = frame else {
                return Ok(());
            };

            let request = match decode_request(&body) {
                Ok(request) => request,
                Err(e) => {
                    let response = Response::error(
                        ErrorCode::InvalidRequest,
                        format!("Failed to parse request: {}", e),
                    );
                    write_frame(&mut writer, &response).await?;
                    return Err(e);
                }
            };

            tracing::debug!("Received request: {:?}", request);

            match request {
                Request::Subscribe { channel } => {
                    return Self::stream_notifications(reader, writer, handler.as_ref(), channel)
                        .await;
                }
                request => {
                    let response = handler.handle(request).await;
                    write_frame(&mut writer, &response).await?;
                }
            }
        }
    }

    async fn stream_notifications(
        mut reader: OwnedReadHalf,
        mut writer: OwnedWriteHalf,
        handler: &dyn RequestHandler,
        channel: Channel,
    ) -> Result<(), IpcError> {
        let Some(mut subscription) = handler.subscribe(channel.clone()) else {
            let response = Response::error(ErrorCode::InvalidRequest, "Subscriptions not supported");
            return write_frame(&mut writer, &response).await;
        };

        write_frame(
            &mut writer,
            &Response::ok_with(ResponseData::Subscribed { channel }),
        )
        .await?;

        let mut discard = [0u8; 64];
        loop {
            tokio::select! {
                notification = subscription.recv() => {
                    let Some(notification) = notification else { break };
                    let frame = Response::ok_with(ResponseData::Notification { notification });
                    write_frame(&mut writer, &frame).await?;
                }
                read = reader.read(&mut discard) => {
                    // Anything but more bytes means the client went away
                    if !matches!(read, Ok(n) if n > 0) {
                        break;
                    }
                }
            }
        }

        tracing::debug!(channel = ?subscription.channel(), "Subscriber disconnected");
        Ok(())
    }
}

/// Trait for handling incoming requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    async fn handle(&self, request: Request) -> Response;

    /// Open a notification subscription for a `subscribe` request.
    fn subscribe(&self, _channel: Channel) -> Option<Subscription> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, MAX_RESPONSE_SIZE};
    use shellhub_core::{IndexChange, Notification, NotificationHub};
    use tempfile::tempdir;

    struct TestHandler {
        hub: Arc<NotificationHub>,
    }

    #[async_trait]
    impl RequestHandler for TestHandler {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Ping => Response::ok_with(ResponseData::Pong {
                    timestamp: chrono::Utc::now().timestamp(),
                }),
                _ => Response::ack(),
            }
        }

        fn subscribe(&self, channel: Channel) -> Option<Subscription> {
            Some(self.hub.subscribe(channel))
        }
    }

    async fn read_response(stream: &mut UnixStream) -> Response {
        let body = read_frame(stream, MAX_RESPONSE_SIZE).await.unwrap().unwrap();
        decode(&body).unwrap()
    }

    #[tokio::test]
    async fn test_server_ping_twice_on_one_connection() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("server.sock");

        let handler = Arc::new(TestHandler {
            hub: Arc::new(NotificationHub::default()),
        });
        let server = IpcServer::new(&socket_path, handler).await.unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        for _ in 0..2 {
            write_frame(&mut stream, &Request::Ping).await.unwrap();
            let response = read_response(&mut stream).await;
            assert!(matches!(
                response,
                Response::Ok {
                    data: Some(ResponseData::Pong { .. })
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_subscription_streams_and_closes_on_disconnect() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("server.sock");

        let hub = Arc::new(NotificationHub::default());
        let handler = Arc::new(TestHandler {
            hub: Arc::clone(&hub),
        });
        let server = IpcServer::new(&socket_path, handler).await.unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        write_frame(
            &mut stream,
            &Request::Subscribe {
                channel: Channel::Index,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            read_response(&mut stream).await,
            Response::Ok {
                data: Some(ResponseData::Subscribed { .. })
            }
        ));
        assert!(hub.has_subscribers(&Channel::Index));

        hub.publish_change(IndexChange::Reset);
        match read_response(&mut stream).await {
            Response::Ok {
                data: Some(ResponseData::Notification { notification }),
            } => assert_eq!(notification, Notification::Index(IndexChange::Reset)),
            other => panic!("unexpected response {other:?}"),
        }

        drop(stream);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!hub.has_subscribers(&Channel::Index));
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_gets_error() {
        let temp_dir = tempdir().unwrap();
        let socket_path = temp_dir.path().join("server.sock");

        let handler = Arc::new(TestHandler {
            hub: Arc::new(NotificationHub::default()),
        });
        let server = IpcServer::new(&socket_path, handler).await.unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        write_frame(&mut stream, &"not a request").await.unwrap();
        assert!(matches!(
            read_response(&mut stream).await,
            Response::Error {
                code: ErrorCode::InvalidRequest,
                ..
            }
        ));
    }
}
