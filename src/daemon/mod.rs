//! Daemon module for the Service Timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Timer engine with phase transitions and countdown logic
//! - `ipc`: Unix socket server and request dispatch
//!
//! [`run`] wires the engine to the file store, the log notifier and the
//! process background handle, then serves requests until Ctrl-C or SIGTERM.

pub mod ipc;
pub mod timer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::background::ProcessBackground;
use crate::notification::LogNotifier;
use crate::store::FileTimerStore;
use crate::types::EngineConfig;

pub use ipc::{default_socket_path, IpcServer, RequestHandler};
pub use timer::{TimerEngine, TimerEvent, TimerHost};

/// Everything the daemon needs to start.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Engine tuning
    pub config: EngineConfig,
    /// Unix socket to listen on
    pub socket_path: PathBuf,
    /// File holding the paused remain/total
    pub state_path: PathBuf,
}

/// Runs the daemon until a shutdown signal arrives.
///
/// A running countdown is paused on shutdown so the next start restores it.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the socket cannot be
/// bound.
pub async fn run(options: DaemonOptions) -> Result<()> {
    options.config.validate().map_err(anyhow::Error::msg)?;

    let host = TimerHost::new(
        Arc::new(FileTimerStore::new(&options.state_path)),
        Arc::new(LogNotifier::new()),
        Arc::new(ProcessBackground::new()),
    );
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = TimerEngine::new(options.config.clone(), host, event_tx);
    tokio::spawn(log_events(event_rx));

    let server = IpcServer::new(&options.socket_path)?;
    let handler = RequestHandler::new(engine.clone());
    tracing::info!(
        "デーモンを起動しました: {} (状態: {})",
        server.socket_path().display(),
        engine.phase().as_str()
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(ipc::serve_connection(stream, handler.clone()));
                }
                Err(e) => tracing::warn!("接続の受け付けに失敗しました: {:#}", e),
            },
            _ = &mut shutdown => break,
        }
    }

    shutdown_engine(&engine);
    tracing::info!("デーモンを終了しました");
    Ok(())
}

/// Stops background activity and persists a running countdown.
pub fn shutdown_engine(engine: &TimerEngine) {
    engine.stop_adjust_repeating();
    if engine.phase().is_running() {
        engine.pause();
    }
}

/// Writes engine events to the log until the engine is dropped.
async fn log_events(mut rx: mpsc::UnboundedReceiver<TimerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            TimerEvent::Tick { .. } => tracing::trace!("{:?}", event),
            TimerEvent::Finished { total } => {
                tracing::info!("タイマーが終了しました ({}ms)", total)
            }
            TimerEvent::AdjustRejected { delta } => {
                tracing::info!("調整は範囲外のため拒否されました: {}ms", delta)
            }
            other => tracing::info!("{:?}", other),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Ctrl-Cを待機できません: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERMを待機できません: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-Cを受信しました"),
        _ = terminate => tracing::info!("SIGTERMを受信しました"),
    }
}
