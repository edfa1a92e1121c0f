//! Core data types for the Service Timer.
//!
//! This module defines the data structures used for:
//! - Timer phase and its bounds
//! - Engine configuration with validation
//! - The view pair rendered by the presentation layer
//! - IPC request/response serialization

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// One minute in milliseconds.
pub const MINUTE_MS: u64 = 60 * 1000;

/// Smallest total a timer may be configured with (1 minute).
pub const MIN_TOTAL_MS: u64 = MINUTE_MS;

/// Largest total a timer may be configured with (60 minutes).
pub const MAX_TOTAL_MS: u64 = 60 * MINUTE_MS;

/// Total used when nothing has been persisted.
pub const DEFAULT_TOTAL_MS: u64 = MINUTE_MS;

/// Default countdown tick in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 100;

/// Returns true if `total` lies within `[MIN_TOTAL_MS, MAX_TOTAL_MS]`.
pub fn total_in_bounds(total: i64) -> bool {
    total >= MIN_TOTAL_MS as i64 && total <= MAX_TOTAL_MS as i64
}

/// Formats milliseconds as `mm:ss`.
///
/// Seconds are truncated and minutes do not wrap, so a full hour renders as
/// `60:00`.
pub fn format_mm_ss(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

// ============================================================================
// TimerPhase
// ============================================================================

/// The discriminated state of the timer. All values are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerPhase {
    /// Countdown actively decrementing
    Running {
        /// Remaining milliseconds
        remain: u64,
        /// Milliseconds configured for this run
        total: u64,
    },
    /// Countdown halted, remaining time retained
    Paused {
        /// Remaining milliseconds
        remain: u64,
        /// Milliseconds configured for this run
        total: u64,
    },
    /// Countdown reached zero or was stopped
    Finished {
        /// Milliseconds configured for the next run
        total: u64,
    },
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Running { .. } => "running",
            TimerPhase::Paused { .. } => "paused",
            TimerPhase::Finished { .. } => "finished",
        }
    }

    /// Remaining milliseconds; always 0 once finished.
    pub fn remain(&self) -> u64 {
        match *self {
            TimerPhase::Running { remain, .. } | TimerPhase::Paused { remain, .. } => remain,
            TimerPhase::Finished { .. } => 0,
        }
    }

    /// Total milliseconds of the current (or next) run.
    pub fn total(&self) -> u64 {
        match *self {
            TimerPhase::Running { total, .. }
            | TimerPhase::Paused { total, .. }
            | TimerPhase::Finished { total } => total,
        }
    }

    /// Returns true if the countdown is running.
    pub fn is_running(&self) -> bool {
        matches!(self, TimerPhase::Running { .. })
    }

    /// Returns true if the countdown is paused.
    pub fn is_paused(&self) -> bool {
        matches!(self, TimerPhase::Paused { .. })
    }

    /// Returns true if the countdown is finished.
    pub fn is_finished(&self) -> bool {
        matches!(self, TimerPhase::Finished { .. })
    }

    /// Shifts the phase by `delta` milliseconds.
    ///
    /// `Finished` only moves its total; `Running` and `Paused` move both
    /// remain and total, with remain clamped at zero. Returns `None` when the
    /// resulting total would leave the allowed bounds.
    pub fn shifted(&self, delta: i64) -> Option<TimerPhase> {
        let total = self.total() as i64 + delta;
        if !total_in_bounds(total) {
            return None;
        }
        let total = total as u64;
        let remain = (self.remain() as i64 + delta).clamp(0, total as i64) as u64;

        Some(match self {
            TimerPhase::Running { .. } => TimerPhase::Running { remain, total },
            TimerPhase::Paused { .. } => TimerPhase::Paused { remain, total },
            TimerPhase::Finished { .. } => TimerPhase::Finished { total },
        })
    }

    /// Fraction of the run still remaining, in `0.0..=1.0`.
    pub fn remaining_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.remain() as f64 / total as f64,
        }
    }
}

impl Default for TimerPhase {
    fn default() -> Self {
        TimerPhase::Finished {
            total: DEFAULT_TOTAL_MS,
        }
    }
}

// ============================================================================
// AdjustDirection
// ============================================================================

/// Direction of a time adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    /// Add time
    Plus,
    /// Remove time
    Minus,
}

impl AdjustDirection {
    /// Returns the signed delta for a step of `step_ms`.
    pub fn delta(&self, step_ms: u64) -> i64 {
        match self {
            AdjustDirection::Plus => step_ms as i64,
            AdjustDirection::Minus => -(step_ms as i64),
        }
    }
}

// ============================================================================
// EngineConfig
// ============================================================================

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_adjust_step_ms() -> u64 {
    MINUTE_MS
}

fn default_repeat_interval_ms() -> u64 {
    100
}

/// Configuration for the timer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Countdown tick in milliseconds (10-60000)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Magnitude of one adjustment in milliseconds (1-60 minutes)
    #[serde(default = "default_adjust_step_ms")]
    pub adjust_step_ms: u64,
    /// Default delay between repeated adjustments in milliseconds (10-10000)
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            adjust_step_ms: default_adjust_step_ms(),
            repeat_interval_ms: default_repeat_interval_ms(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with the specified tick.
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    /// Creates a new configuration with the specified adjustment step.
    pub fn with_adjust_step_ms(mut self, step_ms: u64) -> Self {
        self.adjust_step_ms = step_ms;
        self
    }

    /// Creates a new configuration with the specified repeat interval.
    pub fn with_repeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.repeat_interval_ms = interval_ms;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if !(10..=60_000).contains(&self.tick_ms) {
            return Err("tickは10-60000ミリ秒の範囲で指定してください".to_string());
        }
        if !(MINUTE_MS..=MAX_TOTAL_MS).contains(&self.adjust_step_ms) {
            return Err("調整幅は1-60分の範囲で指定してください".to_string());
        }
        if !(10..=10_000).contains(&self.repeat_interval_ms) {
            return Err("連続調整の間隔は10-10000ミリ秒の範囲で指定してください".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// TimerView
// ============================================================================

/// What the presentation layer renders: whether the engine is reachable and
/// its current phase (if known).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerView {
    /// Whether the engine host is bound and answering
    pub is_ready: bool,
    /// Current phase, `None` until the engine has been reached
    pub phase: Option<TimerPhase>,
}

impl TimerView {
    /// A view for an engine that cannot be reached.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// A view for a reachable engine in `phase`.
    pub fn bound(phase: TimerPhase) -> Self {
        Self {
            is_ready: true,
            phase: Some(phase),
        }
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// Parameters for the start command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartParams {
    /// Countdown tick in milliseconds
    #[serde(rename = "tickMs", skip_serializing_if = "Option::is_none")]
    pub tick_ms: Option<u64>,
    /// Total for a fresh run in milliseconds
    #[serde(rename = "totalMs", skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Start or resume the countdown
    Start {
        /// Start parameters
        #[serde(flatten)]
        params: StartParams,
    },
    /// Pause the countdown
    Pause,
    /// Stop the countdown
    Stop,
    /// Shift the timer by a signed amount
    Adjust {
        /// Signed shift in milliseconds
        #[serde(rename = "deltaMs")]
        delta_ms: i64,
    },
    /// Begin repeated adjustment (press-and-hold)
    AdjustRepeat {
        /// Direction of each adjustment
        direction: AdjustDirection,
        /// Delay between adjustments in milliseconds
        #[serde(rename = "intervalMs", skip_serializing_if = "Option::is_none")]
        interval_ms: Option<u64>,
    },
    /// End repeated adjustment
    AdjustStop,
    /// Query the current status
    Status,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Remaining milliseconds
    #[serde(rename = "remainMs", skip_serializing_if = "Option::is_none")]
    pub remain_ms: Option<u64>,
    /// Total milliseconds
    #[serde(rename = "totalMs", skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
    /// Latest status notification text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
    /// Whether background execution is held
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
}

impl ResponseData {
    /// Creates response data from a timer phase.
    pub fn from_phase(phase: &TimerPhase) -> Self {
        Self {
            state: Some(phase.as_str().to_string()),
            remain_ms: Some(phase.remain()),
            total_ms: Some(phase.total()),
            notification: None,
            background: None,
        }
    }

    /// Rebuilds the timer phase carried by this response.
    pub fn to_phase(&self) -> Option<TimerPhase> {
        let total = self.total_ms?;
        let remain = self.remain_ms.unwrap_or(0);
        match self.state.as_deref()? {
            "running" => Some(TimerPhase::Running { remain, total }),
            "paused" => Some(TimerPhase::Paused { remain, total }),
            "finished" => Some(TimerPhase::Finished { total }),
            _ => None,
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // TimerPhase Tests
    // ------------------------------------------------------------------------

    mod timer_phase_tests {
        use super::*;

        #[test]
        fn test_default_is_finished_one_minute() {
            assert_eq!(TimerPhase::default(), TimerPhase::Finished { total: 60_000 });
        }

        #[test]
        fn test_as_str() {
            assert_eq!(TimerPhase::Running { remain: 1, total: 2 }.as_str(), "running");
            assert_eq!(TimerPhase::Paused { remain: 1, total: 2 }.as_str(), "paused");
            assert_eq!(TimerPhase::Finished { total: 2 }.as_str(), "finished");
        }

        #[test]
        fn test_finished_remain_is_zero() {
            let phase = TimerPhase::Finished { total: 120_000 };
            assert_eq!(phase.remain(), 0);
            assert_eq!(phase.total(), 120_000);
        }

        #[test]
        fn test_shift_paused_both_fields() {
            let phase = TimerPhase::Paused {
                remain: 45_000,
                total: 120_000,
            };
            assert_eq!(
                phase.shifted(60_000),
                Some(TimerPhase::Paused {
                    remain: 105_000,
                    total: 180_000
                })
            );
        }

        #[test]
        fn test_shift_finished_total_only() {
            let phase = TimerPhase::Finished { total: 60_000 };
            assert_eq!(
                phase.shifted(60_000),
                Some(TimerPhase::Finished { total: 120_000 })
            );
        }

        #[test]
        fn test_shift_rejects_below_minimum() {
            let phase = TimerPhase::Finished { total: 60_000 };
            assert_eq!(phase.shifted(-60_000), None);
        }

        #[test]
        fn test_shift_rejects_above_maximum() {
            let phase = TimerPhase::Paused {
                remain: 10_000,
                total: MAX_TOTAL_MS,
            };
            assert_eq!(phase.shifted(60_000), None);
        }

        #[test]
        fn test_shift_clamps_remain_at_zero() {
            let phase = TimerPhase::Running {
                remain: 10_000,
                total: 180_000,
            };
            assert_eq!(
                phase.shifted(-60_000),
                Some(TimerPhase::Running {
                    remain: 0,
                    total: 120_000
                })
            );
        }

        #[test]
        fn test_remaining_fraction() {
            let phase = TimerPhase::Running {
                remain: 30_000,
                total: 60_000,
            };
            assert!((phase.remaining_fraction() - 0.5).abs() < f64::EPSILON);
            assert_eq!(TimerPhase::Finished { total: 60_000 }.remaining_fraction(), 0.0);
        }

        #[test]
        fn test_serialize_tagged() {
            let phase = TimerPhase::Running {
                remain: 500,
                total: 60_000,
            };
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, r#"{"state":"running","remain":500,"total":60000}"#);

            let back: TimerPhase = serde_json::from_str(&json).unwrap();
            assert_eq!(back, phase);
        }
    }

    // ------------------------------------------------------------------------
    // Formatting Tests
    // ------------------------------------------------------------------------

    mod format_tests {
        use super::*;

        #[test]
        fn test_format_zero() {
            assert_eq!(format_mm_ss(0), "00:00");
        }

        #[test]
        fn test_format_truncates_millis() {
            assert_eq!(format_mm_ss(59_999), "00:59");
        }

        #[test]
        fn test_format_mixed() {
            assert_eq!(format_mm_ss(90_000), "01:30");
        }

        #[test]
        fn test_format_full_hour_does_not_wrap() {
            assert_eq!(format_mm_ss(MAX_TOTAL_MS), "60:00");
        }

        #[test]
        fn test_total_in_bounds() {
            assert!(total_in_bounds(60_000));
            assert!(total_in_bounds(3_600_000));
            assert!(!total_in_bounds(59_999));
            assert!(!total_in_bounds(3_600_001));
            assert!(!total_in_bounds(-1));
        }
    }

    // ------------------------------------------------------------------------
    // AdjustDirection Tests
    // ------------------------------------------------------------------------

    mod adjust_direction_tests {
        use super::*;

        #[test]
        fn test_delta_sign() {
            assert_eq!(AdjustDirection::Plus.delta(60_000), 60_000);
            assert_eq!(AdjustDirection::Minus.delta(60_000), -60_000);
        }

        #[test]
        fn test_serialize_lowercase() {
            let json = serde_json::to_string(&AdjustDirection::Minus).unwrap();
            assert_eq!(json, "\"minus\"");
        }
    }

    // ------------------------------------------------------------------------
    // EngineConfig Tests
    // ------------------------------------------------------------------------

    mod engine_config_tests {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = EngineConfig::default();
            assert_eq!(config.tick_ms, 100);
            assert_eq!(config.adjust_step_ms, 60_000);
            assert_eq!(config.repeat_interval_ms, 100);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_builder_methods() {
            let config = EngineConfig::default()
                .with_tick_ms(1000)
                .with_adjust_step_ms(5 * MINUTE_MS)
                .with_repeat_interval_ms(250);
            assert_eq!(config.tick_ms, 1000);
            assert_eq!(config.adjust_step_ms, 300_000);
            assert_eq!(config.repeat_interval_ms, 250);
        }

        #[test]
        fn test_validate_tick_bounds() {
            assert!(EngineConfig::default().with_tick_ms(9).validate().is_err());
            assert!(EngineConfig::default().with_tick_ms(60_001).validate().is_err());
            assert!(EngineConfig::default().with_tick_ms(10).validate().is_ok());
        }

        #[test]
        fn test_validate_step_bounds() {
            let err = EngineConfig::default()
                .with_adjust_step_ms(1000)
                .validate()
                .unwrap_err();
            assert!(err.contains("調整幅"));
        }

        #[test]
        fn test_validate_repeat_interval_bounds() {
            assert!(EngineConfig::default()
                .with_repeat_interval_ms(0)
                .validate()
                .is_err());
        }

        #[test]
        fn test_deserialize_with_defaults() {
            let config: EngineConfig = serde_json::from_str(r#"{"tick_ms": 250}"#).unwrap();
            assert_eq!(config.tick_ms, 250);
            assert_eq!(config.adjust_step_ms, 60_000);
        }
    }

    // ------------------------------------------------------------------------
    // IPC Types Tests
    // ------------------------------------------------------------------------

    mod ipc_tests {
        use super::*;

        #[test]
        fn test_start_request_serialization() {
            let request = IpcRequest::Start {
                params: StartParams {
                    tick_ms: Some(100),
                    total_ms: None,
                },
            };
            let json = serde_json::to_string(&request).unwrap();
            assert_eq!(json, r#"{"command":"start","tickMs":100}"#);
        }

        #[test]
        fn test_adjust_request_round_trip() {
            let json = r#"{"command":"adjust","deltaMs":-60000}"#;
            let request: IpcRequest = serde_json::from_str(json).unwrap();
            assert!(matches!(request, IpcRequest::Adjust { delta_ms: -60000 }));
        }

        #[test]
        fn test_adjust_repeat_request() {
            let json = r#"{"command":"adjustrepeat","direction":"plus"}"#;
            let request: IpcRequest = serde_json::from_str(json).unwrap();
            match request {
                IpcRequest::AdjustRepeat {
                    direction,
                    interval_ms,
                } => {
                    assert_eq!(direction, AdjustDirection::Plus);
                    assert_eq!(interval_ms, None);
                }
                _ => panic!("Expected AdjustRepeat"),
            }
        }

        #[test]
        fn test_unit_requests() {
            for (json, name) in [
                (r#"{"command":"pause"}"#, "pause"),
                (r#"{"command":"stop"}"#, "stop"),
                (r#"{"command":"adjuststop"}"#, "adjuststop"),
                (r#"{"command":"status"}"#, "status"),
            ] {
                let request: IpcRequest = serde_json::from_str(json).unwrap();
                let back = serde_json::to_value(&request).unwrap();
                assert_eq!(back["command"], name);
            }
        }

        #[test]
        fn test_response_data_to_phase() {
            let phase = TimerPhase::Paused {
                remain: 45_000,
                total: 120_000,
            };
            let data = ResponseData::from_phase(&phase);
            assert_eq!(data.to_phase(), Some(phase));
        }

        #[test]
        fn test_response_data_unknown_state() {
            let data = ResponseData {
                state: Some("exploded".to_string()),
                total_ms: Some(60_000),
                ..ResponseData::default()
            };
            assert_eq!(data.to_phase(), None);
        }

        #[test]
        fn test_response_skips_empty_fields() {
            let response = IpcResponse::error("boom");
            let json = serde_json::to_string(&response).unwrap();
            assert!(!json.contains("data"));
            assert!(json.contains("\"status\":\"error\""));
        }
    }

    // ------------------------------------------------------------------------
    // TimerView Tests
    // ------------------------------------------------------------------------

    mod timer_view_tests {
        use super::*;

        #[test]
        fn test_unbound_view() {
            let view = TimerView::unbound();
            assert!(!view.is_ready);
            assert!(view.phase.is_none());
        }

        #[test]
        fn test_bound_view() {
            let view = TimerView::bound(TimerPhase::default());
            assert!(view.is_ready);
            assert_eq!(view.phase, Some(TimerPhase::default()));
        }
    }
}
