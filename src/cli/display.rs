//! Display utilities for the Service Timer CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status display with a progress bar
//! - The single-line view redrawn by `watch`

use crate::types::{format_mm_ss, IpcResponse, ResponseData, TimerPhase, TimerView};

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 20;

/// Shown by `watch` while the daemon cannot be reached.
pub const NOT_READY_TEXT: &str = "daemon not ready";

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a success message for timer start.
    pub fn show_start_success(response: &IpcResponse) {
        println!("> {}", response.message);
        Self::show_remaining(response.data.as_ref());
    }

    /// Shows a success message for timer pause.
    pub fn show_pause_success(response: &IpcResponse) {
        println!("|| {}", response.message);
        Self::show_remaining(response.data.as_ref());
    }

    /// Shows a success message for timer stop.
    pub fn show_stop_success(response: &IpcResponse) {
        println!("[] {}", response.message);
        if let Some(total) = response.data.as_ref().and_then(|d| d.total_ms) {
            println!("  合計時間: {}", format_mm_ss(total));
        }
    }

    /// Shows the result of a one-shot or held adjustment.
    pub fn show_adjust_result(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            if let (Some(remain), Some(total)) = (data.remain_ms, data.total_ms) {
                println!("  残り時間: {} / {}", format_mm_ss(remain), format_mm_ss(total));
            }
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("サービスタイマー ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("タイマーは起動していません");
            return;
        };

        let state = data.state.as_deref().unwrap_or("unknown");
        println!("状態: {}", Self::state_label(state));

        match data.to_phase() {
            Some(TimerPhase::Finished { total }) => {
                println!("合計時間: {}", format_mm_ss(total));
            }
            Some(phase) => {
                println!(
                    "残り時間: {} / {}",
                    format_mm_ss(phase.remain()),
                    format_mm_ss(phase.total())
                );
                println!("{}", progress_bar(phase.remaining_fraction(), BAR_WIDTH));
            }
            None => {}
        }

        if let Some(text) = &data.notification {
            println!("通知: {}", text);
        }
        if let Some(background) = data.background {
            println!(
                "バックグラウンド実行: {}",
                if background { "有効" } else { "無効" }
            );
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn show_remaining(data: Option<&ResponseData>) {
        if let Some(remain) = data.and_then(|d| d.remain_ms) {
            println!("  残り時間: {}", format_mm_ss(remain));
        }
    }

    fn state_label(state: &str) -> &str {
        match state {
            "running" => "実行中",
            "paused" => "一時停止中",
            "finished" => "停止中",
            _ => state,
        }
    }
}

// ============================================================================
// View rendering
// ============================================================================

/// Renders `view` as one line of text.
pub fn render_view(view: &TimerView) -> String {
    let Some(phase) = view.phase.filter(|_| view.is_ready) else {
        return NOT_READY_TEXT.to_string();
    };

    match phase {
        TimerPhase::Running { remain, .. } => format!(
            "> {} {}",
            format_mm_ss(remain),
            progress_bar(phase.remaining_fraction(), BAR_WIDTH)
        ),
        TimerPhase::Paused { remain, .. } => format!(
            "|| {} {}",
            format_mm_ss(remain),
            progress_bar(phase.remaining_fraction(), BAR_WIDTH)
        ),
        TimerPhase::Finished { total } => format!("[] {}", format_mm_ss(total)),
    }
}

/// Draws `fraction` (clamped to `0.0..=1.0`) as a bar of `width` cells.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

// ============================================================================
// Tests
// ============================================================================
