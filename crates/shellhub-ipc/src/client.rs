//! IPC client for communicating with the Shellhub daemon.

use crate::codec::{decode, read_frame, write_frame, MAX_RESPONSE_SIZE};
use crate::{DaemonStatus, IpcError, Request, Response, ResponseData};
use shellhub_core::{Channel, Cursor, Document, Notification, Page, Source};
use shellhub_index::Filter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;

/// Default socket path
const DEFAULT_SOCKET_PATH: &str = "/tmp/shellhub.sock";

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Request/response timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// IPC client for communicating with the daemon
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a client with default socket path
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }

    /// Create a client with custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Connect to the daemon and return a connected client
    pub async fn connect() -> Result<ConnectedClient, IpcError> {
        Self::new().do_connect().await
    }

    /// Connect with custom socket path
    pub async fn connect_to<P: AsRef<Path>>(socket_path: P) -> Result<ConnectedClient, IpcError> {
        Self::with_socket_path(socket_path).do_connect().await
    }

    async fn do_connect(&self) -> Result<ConnectedClient, IpcError> {
        if !self.socket_path.exists() {
            return Err(IpcError::DaemonNotRunning);
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| IpcError::ConnectionFailed("Connection timed out".to_string()))??;

        Ok(ConnectedClient { stream })
    }

    /// Check if daemon is running
    pub fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected IPC client that can send requests and receive responses
pub struct ConnectedClient {
    stream: UnixStream,
}

impl ConnectedClient {
    /// Send a request and wait for response
    pub async fn send(&mut self, request: Request) -> Result<Response, IpcError> {
        tokio::time::timeout(REQUEST_TIMEOUT, self.do_send(request))
            .await
            .map_err(|_| IpcError::ConnectionFailed("Request timed out".to_string()))?
    }

    async fn do_send(&mut self, request: Request) -> Result<Response, IpcError> {
        write_frame(&mut self.stream, &request).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response, IpcError> {
        let body = read_frame(&mut self.stream, MAX_RESPONSE_SIZE)
            .await?
            .ok_or_else(|| IpcError::ConnectionFailed("Connection closed".to_string()))?;
        decode(&body)
    }

    /// Subscribe to a channel, consuming the connection.
    pub async fn subscribe(mut self, channel: Channel) -> Result<NotificationStream, IpcError> {
        match self.send(Request::Subscribe { channel }).await? {
            Response::Ok {
                data: Some(ResponseData::Subscribed { .. }),
            } => Ok(NotificationStream { client: self }),
            Response::Error { code, message } => Err(IpcError::Remote { code, message }),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }
}

/// Notifications pushed over a subscribed connection.
///
/// Dropping the stream closes the connection, which ends the subscription.
pub struct NotificationStream {
    client: ConnectedClient,
}

impl NotificationStream {
    /// Wait for the next notification; `None` once the daemon hangs up.
    pub async fn next(&mut self) -> Result<Option<Notification>, IpcError> {
        let Some(body) = read_frame(&mut self.client.stream, MAX_RESPONSE_SIZE).await? else {
            return Ok(None);
        };
        match decode::<Response>(&body)? {
            Response::Ok {
                data: Some(ResponseData::Notification { notification }),
            } => Ok(Some(notification)),
            Response::Error { code, message } => Err(IpcError::Remote { code, message }),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }
}

/// Unwrap the data of a successful response.
fn into_data(response: Response) -> Result<ResponseData, IpcError> {
    match response {
        Response::Ok { data: Some(data) } => Ok(data),
        Response::Error { code, message } => Err(IpcError::Remote { code, message }),
        _ => Err(IpcError::UnexpectedResponse),
    }
}

/// Convenience functions for one-off requests
impl IpcClient {
    /// Send a request and wait for response (opens new connection)
    pub async fn request(&self, request: Request) -> Result<Response, IpcError> {
        let mut client = self.do_connect().await?;
        client.send(request).await
    }

    /// Send a request that answers with an acknowledgment
    pub async fn command(&self, request: Request) -> Result<(), IpcError> {
        match self.request(request).await? {
            Response::Ack | Response::Ok { data: None } => Ok(()),
            Response::Error { code, message } => Err(IpcError::Remote { code, message }),
            Response::Ok { data: Some(_) } => Err(IpcError::UnexpectedResponse),
        }
    }

    /// Get daemon status
    pub async fn get_status(&self) -> Result<DaemonStatus, IpcError> {
        match into_data(self.request(Request::Status).await?)? {
            ResponseData::Status(status) => Ok(*status),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }

    pub async fn list_endpoints(&self) -> Result<Vec<Source>, IpcError> {
        match into_data(self.request(Request::ListEndpoints).await?)? {
            ResponseData::Endpoints { endpoints } => Ok(endpoints),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }

    /// Fetch one page; `None` asks for the first page.
    pub async fn page(
        &self,
        cursor: Option<Cursor>,
        filter: Option<Filter>,
        language: Option<String>,
    ) -> Result<Page, IpcError> {
        let request = Request::Page {
            cursor,
            filter,
            language,
        };
        match into_data(self.request(request).await?)? {
            ResponseData::Page { page } => Ok(page),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }

    pub async fn find(&self, source: Option<&str>, id: &str) -> Result<Option<Document>, IpcError> {
        let request = Request::Find {
            source: source.map(str::to_string),
            id: id.to_string(),
        };
        match into_data(self.request(request).await?)? {
            ResponseData::Document { document } => Ok(document),
            _ => Err(IpcError::UnexpectedResponse),
        }
    }

    /// Open a dedicated connection streaming `channel`.
    pub async fn subscribe(&self, channel: Channel) -> Result<NotificationStream, IpcError> {
        self.do_connect().await?.subscribe(channel).await
    }
}
