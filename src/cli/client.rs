//! IPC Client for communicating with the Service Timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::StartArgs;
use crate::daemon::default_socket_path;
use crate::types::{AdjustDirection, IpcRequest, IpcResponse, StartParams, TimerView};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with default socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_socket_path(default_socket_path()?))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Uses `socket_path` when given, the default path otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is given and the home directory cannot be
    /// determined.
    pub fn from_option(socket_path: Option<PathBuf>) -> Result<Self> {
        match socket_path {
            Some(path) => Ok(Self::with_socket_path(path)),
            None => Self::new(),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Sends a start command to the daemon.
    pub async fn start(&self, args: &StartArgs) -> Result<IpcResponse> {
        let params = StartParams {
            tick_ms: args.tick,
            total_ms: args.total_ms(),
        };

        let request = IpcRequest::Start { params };
        self.send_request_with_retry(&request).await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Pause).await
    }

    /// Sends a stop command to the daemon.
    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Stop).await
    }

    /// Sends a one-shot adjustment to the daemon.
    pub async fn adjust(&self, delta_ms: i64) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Adjust { delta_ms })
            .await
    }

    /// Starts repeated adjustment on the daemon.
    pub async fn adjust_repeat(
        &self,
        direction: AdjustDirection,
        interval_ms: Option<u64>,
    ) -> Result<IpcResponse> {
        let request = IpcRequest::AdjustRepeat {
            direction,
            interval_ms,
        };
        self.send_request_with_retry(&request).await
    }

    /// Ends repeated adjustment on the daemon.
    pub async fn adjust_stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::AdjustStop).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Queries the daemon once, without retrying, and folds the answer into
    /// a [`TimerView`]. An unreachable daemon yields a view that is not ready.
    pub async fn view(&self) -> TimerView {
        match self.send_request(&IpcRequest::Status).await {
            Ok(response) => match response.data.as_ref().and_then(|d| d.to_phase()) {
                Some(phase) => TimerView::bound(phase),
                None => TimerView::unbound(),
            },
            Err(e) => {
                tracing::debug!("Daemonに接続できません: {:#}", e);
                TimerView::unbound()
            }
        }
    }

    /// Sends a request to the daemon, retrying only while it cannot be reached.
    ///
    /// Once connected the request is sent exactly once, so an error answer
    /// or a timeout never replays a non-idempotent command.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.connect_with_retry().await?;
        Self::exchange(stream, request).await
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.connect().await?;
        Self::exchange(stream, request).await
    }

    /// Connects to the daemon socket with linear back-off.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt >= MAX_RETRIES => return Err(e),
                Err(e) => {
                    tracing::warn!("接続失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'service-timer daemon' を起動してください")
    }

    /// Writes `request`, closes the write side and reads the response.
    async fn exchange(mut stream: UnixStream, request: &IpcRequest) -> Result<IpcResponse> {
        let request_json =
            serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("書き込みがタイムアウトしました")?
        .context("リクエストの送信に失敗しました")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        let response: IpcResponse =
            serde_json::from_slice(&buffer).context("レスポンスのパースに失敗しました")?;

        if response.status == "error" {
            anyhow::bail!("{}", response.message);
        }

        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseData, TimerPhase};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::UnixListener;
    use tokio::sync::Mutex;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_mock_server(socket_path: &PathBuf) -> UnixListener {
        let _ = std::fs::remove_file(socket_path);
        UnixListener::bind(socket_path).unwrap()
    }

    /// Accepts one connection, records the request and answers with `response`.
    async fn answer_once(
        listener: UnixListener,
        response: IpcResponse,
        received: Arc<Mutex<Option<IpcRequest>>>,
    ) {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        let request: IpcRequest = serde_json::from_slice(&buffer).unwrap();
        *received.lock().await = Some(request);

        let json = serde_json::to_vec(&response).unwrap();
        stream.write_all(&json).await.unwrap();
        stream.flush().await.unwrap();
    }

    fn running_data(remain: u64, total: u64) -> ResponseData {
        ResponseData::from_phase(&TimerPhase::Running { remain, total })
    }

    // ------------------------------------------------------------------------
    // IpcClient Tests
    // ------------------------------------------------------------------------

    mod client_tests {
        use super::*;

        #[test]
        fn test_with_socket_path() {
            let path = PathBuf::from("/tmp/test.sock");
            let client = IpcClient::with_socket_path(path.clone());
            assert_eq!(client.socket_path(), &path);
        }

        #[test]
        fn test_from_option_prefers_given_path() {
            let path = PathBuf::from("/tmp/other.sock");
            let client = IpcClient::from_option(Some(path.clone())).unwrap();
            assert_eq!(client.socket_path(), &path);
        }

        #[tokio::test(start_paused = true)]
        async fn test_connection_failure() {
            let socket_path = PathBuf::from("/tmp/nonexistent_service_timer_12345.sock");
            let client = IpcClient::with_socket_path(socket_path);

            let result = client.status().await;
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("接続できません"));
        }

        #[tokio::test]
        async fn test_send_status_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let received = Arc::new(Mutex::new(None));

            let server_handle = tokio::spawn(answer_once(
                listener,
                IpcResponse::success("", Some(running_data(30_000, 60_000))),
                received.clone(),
            ));

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();
            server_handle.await.unwrap();

            assert_eq!(response.status, "success");
            let data = response.data.unwrap();
            assert_eq!(data.state.as_deref(), Some("running"));
            assert_eq!(data.remain_ms, Some(30_000));
            assert!(matches!(*received.lock().await, Some(IpcRequest::Status)));
        }

        #[tokio::test]
        async fn test_send_start_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let received = Arc::new(Mutex::new(None));

            let server_handle = tokio::spawn(answer_once(
                listener,
                IpcResponse::success("タイマーを開始しました", Some(running_data(1_500_000, 1_500_000))),
                received.clone(),
            ));

            let client = IpcClient::with_socket_path(socket_path);
            let args = StartArgs {
                tick: Some(250),
                total: Some(25),
            };
            let response = client.start(&args).await.unwrap();
            server_handle.await.unwrap();

            assert_eq!(response.message, "タイマーを開始しました");
            let received = received.lock().await;
            match received.as_ref() {
                Some(IpcRequest::Start { params }) => {
                    assert_eq!(params.tick_ms, Some(250));
                    assert_eq!(params.total_ms, Some(1_500_000));
                }
                _ => panic!("Expected Start request"),
            };
        }

        #[tokio::test]
        async fn test_send_adjust_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let received = Arc::new(Mutex::new(None));

            let server_handle = tokio::spawn(answer_once(
                listener,
                IpcResponse::success("時間を調整しました", None),
                received.clone(),
            ));

            let client = IpcClient::with_socket_path(socket_path);
            client.adjust(-60_000).await.unwrap();
            server_handle.await.unwrap();

            assert!(matches!(
                *received.lock().await,
                Some(IpcRequest::Adjust { delta_ms: -60_000 })
            ));
        }

        #[tokio::test]
        async fn test_send_adjust_repeat_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let received = Arc::new(Mutex::new(None));

            let server_handle = tokio::spawn(answer_once(
                listener,
                IpcResponse::success("連続調整を開始しました", None),
                received.clone(),
            ));

            let client = IpcClient::with_socket_path(socket_path);
            client
                .adjust_repeat(AdjustDirection::Plus, Some(200))
                .await
                .unwrap();
            server_handle.await.unwrap();

            assert!(matches!(
                *received.lock().await,
                Some(IpcRequest::AdjustRepeat {
                    direction: AdjustDirection::Plus,
                    interval_ms: Some(200)
                })
            ));
        }

        #[tokio::test]
        async fn test_error_response_is_not_retried() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let connections = Arc::new(AtomicUsize::new(0));
            let counter = connections.clone();

            // Answers every connection with an error
            let server_handle = tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let mut buffer = Vec::new();
                    let _ = stream.read_to_end(&mut buffer).await;

                    let response = IpcResponse::error("タイマーは実行されていません");
                    let json = serde_json::to_vec(&response).unwrap();
                    let _ = stream.write_all(&json).await;
                }
            });

            let client = IpcClient::with_socket_path(socket_path);
            let started = std::time::Instant::now();
            let result = client.pause().await;

            assert!(result.is_err());
            let error_msg = result.unwrap_err().to_string();
            assert!(
                error_msg.contains("実行されていません"),
                "unexpected error: {}",
                error_msg
            );
            assert_eq!(connections.load(Ordering::SeqCst), 1);
            assert!(started.elapsed() < Duration::from_millis(RETRY_DELAY_MS));

            server_handle.abort();
        }

        #[tokio::test]
        async fn test_adjust_sent_once_when_response_is_missing() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let connections = Arc::new(AtomicUsize::new(0));
            let counter = connections.clone();

            // Reads the request and hangs up without answering
            let server_handle = tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let mut buffer = Vec::new();
                    let _ = stream.read_to_end(&mut buffer).await;
                }
            });

            let client = IpcClient::with_socket_path(socket_path);
            let result = client.adjust(60_000).await;

            assert!(result.unwrap_err().to_string().contains("応答がありませんでした"));
            assert_eq!(connections.load(Ordering::SeqCst), 1);

            server_handle.abort();
        }

        #[tokio::test]
        async fn test_connect_is_retried_until_daemon_binds() {
            let socket_path = create_temp_socket_path();
            let received = Arc::new(Mutex::new(None));

            let server_path = socket_path.clone();
            let server_received = received.clone();
            let server_handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let listener = create_mock_server(&server_path);
                answer_once(
                    listener,
                    IpcResponse::success("", Some(running_data(10_000, 60_000))),
                    server_received,
                )
                .await;
            });

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();
            server_handle.await.unwrap();

            assert_eq!(response.data.unwrap().remain_ms, Some(10_000));
            assert!(matches!(*received.lock().await, Some(IpcRequest::Status)));
        }
    }

    // ------------------------------------------------------------------------
    // TimerView Tests
    // ------------------------------------------------------------------------

    mod view_tests {
        use super::*;

        #[tokio::test]
        async fn test_view_unbound_without_daemon() {
            let client =
                IpcClient::with_socket_path(PathBuf::from("/tmp/nonexistent_service_timer_view.sock"));
            let view = client.view().await;

            assert!(!view.is_ready);
            assert!(view.phase.is_none());
        }

        #[tokio::test]
        async fn test_view_bound_with_daemon() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let received = Arc::new(Mutex::new(None));

            let server_handle = tokio::spawn(answer_once(
                listener,
                IpcResponse::success("", Some(running_data(45_000, 60_000))),
                received,
            ));

            let client = IpcClient::with_socket_path(socket_path);
            let view = client.view().await;
            server_handle.await.unwrap();

            assert_eq!(
                view,
                TimerView::bound(TimerPhase::Running {
                    remain: 45_000,
                    total: 60_000
                })
            );
        }
    }
}
