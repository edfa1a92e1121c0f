//! IPC Server for the Service Timer.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands
//! - Integration with TimerEngine for command execution

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};

use crate::types::{
    total_in_bounds, AdjustDirection, IpcRequest, IpcResponse, ResponseData, StartParams,
};

use super::timer::TimerEngine;

// ============================================================================
// Constants
// ============================================================================

/// Socket location relative to the home directory.
const DEFAULT_SOCKET_PATH: &str = ".service-timer/service-timer.sock";

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// Returns `~/.service-timer/service-timer.sock`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_socket_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("ホームディレクトリを取得できません")?;
    Ok(home.join(DEFAULT_SOCKET_PATH))
}

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,

    /// Client closed the connection without sending anything
    #[error("Connection closed by client")]
    EmptyRequest,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write side, with a read timeout
    /// and a size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(MAX_REQUEST_SIZE);
        let mut limited = (&mut *stream).take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            return Err(IpcError::EmptyRequest.into());
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(&buffer)
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to TimerEngine.
#[derive(Clone)]
pub struct RequestHandler {
    engine: TimerEngine,
}

impl RequestHandler {
    /// Creates a new request handler with the given timer engine.
    pub fn new(engine: TimerEngine) -> Self {
        Self { engine }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Start { params } => self.handle_start(params),
            IpcRequest::Pause => self.handle_pause(),
            IpcRequest::Stop => self.handle_stop(),
            IpcRequest::Adjust { delta_ms } => self.handle_adjust(delta_ms),
            IpcRequest::AdjustRepeat {
                direction,
                interval_ms,
            } => self.handle_adjust_repeat(direction, interval_ms),
            IpcRequest::AdjustStop => self.handle_adjust_stop(),
            IpcRequest::Status => self.success(""),
        }
    }

    fn handle_start(&self, params: StartParams) -> IpcResponse {
        let tick_ms = params.tick_ms.unwrap_or(self.engine.config().tick_ms);
        if !(10..=60_000).contains(&tick_ms) {
            return IpcResponse::error("tickは10-60000ミリ秒の範囲で指定してください");
        }
        if let Some(total) = params.total_ms {
            if !total_in_bounds(total as i64) {
                return IpcResponse::error("合計時間は1-60分の範囲で指定してください");
            }
        }

        self.engine
            .start_with(Duration::from_millis(tick_ms), params.total_ms);
        self.success("タイマーを開始しました")
    }

    fn handle_pause(&self) -> IpcResponse {
        if self.engine.phase().is_finished() {
            return IpcResponse::error("タイマーは実行されていません");
        }
        self.engine.pause();
        self.success("タイマーを一時停止しました")
    }

    fn handle_stop(&self) -> IpcResponse {
        self.engine.stop();
        self.success("タイマーを停止しました")
    }

    fn handle_adjust(&self, delta_ms: i64) -> IpcResponse {
        if self.engine.adjust(delta_ms) {
            self.success("時間を調整しました")
        } else {
            self.success("調整できません（合計時間は1-60分の範囲です）")
        }
    }

    fn handle_adjust_repeat(
        &self,
        direction: AdjustDirection,
        interval_ms: Option<u64>,
    ) -> IpcResponse {
        let interval_ms = interval_ms.unwrap_or(self.engine.config().repeat_interval_ms);
        if !(10..=10_000).contains(&interval_ms) {
            return IpcResponse::error("連続調整の間隔は10-10000ミリ秒の範囲で指定してください");
        }
        self.engine
            .adjust_repeating(direction, Duration::from_millis(interval_ms));
        self.success("連続調整を開始しました")
    }

    fn handle_adjust_stop(&self) -> IpcResponse {
        self.engine.stop_adjust_repeating();
        self.success("連続調整を終了しました")
    }

    /// Builds a success response carrying the current snapshot.
    fn success(&self, message: &str) -> IpcResponse {
        let mut data = ResponseData::from_phase(&self.engine.phase());
        data.notification = self.engine.notification();
        data.background = Some(self.engine.is_background_held());
        IpcResponse::success(message, Some(data))
    }
}

/// Serves one request on an accepted connection.
pub async fn serve_connection(mut stream: UnixStream, handler: RequestHandler) {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => {
            tracing::debug!("リクエストを受信: {:?}", request);
            handler.handle(request)
        }
        Err(e) => {
            tracing::warn!("不正なリクエスト: {:#}", e);
            IpcResponse::error(format!("不正なリクエスト: {}", e))
        }
    };

    if let Err(e) = IpcServer::send_response(&mut stream, &response).await {
        tracing::warn!("レスポンスの送信に失敗しました: {:#}", e);
    }
}

// ============================================================================
// Tests
// ============================================================================
