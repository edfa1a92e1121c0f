//! Timer engine for the Service Timer.
//!
//! This module provides the core timer functionality:
//! - Phase transitions (Finished → Running → Paused → Finished)
//! - Countdown with tokio::time::interval on a cancellable task
//! - Save/restore of the paused remain/total through a [`TimerStore`]
//! - Status notification and background execution side effects
//! - Repeated adjustment for press-and-hold controls
//!
//! Every mutation happens under one lock. Each countdown task carries the
//! generation it was spawned with and drops its tick if the generation has
//! moved on, so a cancelled loop can never publish over newer state.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::background::BackgroundExecution;
use crate::notification::{status_text, StatusNotifier};
use crate::store::{SavedTimer, TimerStore};
use crate::types::{total_in_bounds, AdjustDirection, EngineConfig, TimerPhase};

/// Shortest tick or repeat interval the engine will schedule.
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for logging and external integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Countdown started or resumed
    Started {
        /// Remaining milliseconds at start
        remain: u64,
        /// Total milliseconds of the run
        total: u64,
    },
    /// One tick elapsed
    Tick {
        /// Remaining milliseconds
        remain: u64,
        /// Total milliseconds of the run
        total: u64,
    },
    /// Countdown paused
    Paused {
        /// Remaining milliseconds
        remain: u64,
        /// Total milliseconds of the run
        total: u64,
    },
    /// Countdown reached zero
    Finished {
        /// Total milliseconds of the run
        total: u64,
    },
    /// Countdown stopped by request
    Stopped {
        /// Total milliseconds of the run
        total: u64,
    },
    /// Time was added or removed
    Adjusted {
        /// Phase after the adjustment
        phase: TimerPhase,
    },
    /// An adjustment would have left the allowed total range
    AdjustRejected {
        /// Requested shift in milliseconds
        delta: i64,
    },
}

// ============================================================================
// TimerHost
// ============================================================================

/// Collaborators supplied by whoever hosts the engine.
#[derive(Clone)]
pub struct TimerHost {
    /// Persistence for the paused remain/total
    pub store: Arc<dyn TimerStore>,
    /// Status notification sink
    pub notifier: Arc<dyn StatusNotifier>,
    /// Background execution handle
    pub background: Arc<dyn BackgroundExecution>,
}

impl TimerHost {
    /// Bundles the three collaborators.
    pub fn new(
        store: Arc<dyn TimerStore>,
        notifier: Arc<dyn StatusNotifier>,
        background: Arc<dyn BackgroundExecution>,
    ) -> Self {
        Self {
            store,
            notifier,
            background,
        }
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Background tasks owned by the engine.
struct Loops {
    /// Bumped on every countdown cancellation
    generation: u64,
    /// Tick of the most recent countdown, reused when an adjust restarts it
    tick: Duration,
    countdown: Option<JoinHandle<()>>,
    repeater: Option<JoinHandle<()>>,
}

struct EngineInner {
    config: EngineConfig,
    host: TimerHost,
    phase_tx: watch::Sender<TimerPhase>,
    event_tx: mpsc::UnboundedSender<TimerEvent>,
    loops: Mutex<Loops>,
}

/// Timer engine that owns the timer phase and its background loops.
///
/// Cloning is cheap; clones share the same timer. Operations spawn tokio
/// tasks and must be called from within a runtime.
#[derive(Clone)]
pub struct TimerEngine {
    inner: Arc<EngineInner>,
}

impl TimerEngine {
    /// Creates a new TimerEngine, restoring a paused timer from the store.
    ///
    /// Without a usable saved record the engine starts as
    /// `Finished { total: 1 minute }`.
    pub fn new(
        config: EngineConfig,
        host: TimerHost,
        event_tx: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let phase = restore_phase(host.store.as_ref());
        let (phase_tx, _) = watch::channel(phase);
        let tick = Duration::from_millis(config.tick_ms).max(MIN_PERIOD);

        Self {
            inner: Arc::new(EngineInner {
                config,
                host,
                phase_tx,
                event_tx,
                loops: Mutex::new(Loops {
                    generation: 0,
                    tick,
                    countdown: None,
                    repeater: None,
                }),
            }),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> TimerPhase {
        *self.inner.phase_tx.borrow()
    }

    /// Subscribes to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<TimerPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns true while background execution is held.
    pub fn is_background_held(&self) -> bool {
        self.inner.host.background.is_held()
    }

    /// Returns the status notification text currently shown, if known.
    pub fn notification(&self) -> Option<String> {
        self.inner.host.notifier.current()
    }

    /// Starts or resumes the countdown with the configured tick.
    pub fn start(&self) {
        self.start_with(Duration::from_millis(self.inner.config.tick_ms), None);
    }

    /// Starts or resumes the countdown.
    ///
    /// A finished timer restarts from its total; a running or paused one
    /// resumes from its remaining time. The phase becomes `Running` at once;
    /// the first tick follows one `tick` later. `total` replaces the run
    /// length only when starting from `Finished`, and only if it lies within
    /// the bounds.
    pub fn start_with(&self, tick: Duration, total: Option<u64>) {
        let tick = tick.max(MIN_PERIOD);
        let mut loops = self.lock_loops();
        self.cancel_countdown(&mut loops);
        self.clear_saved();

        let (remain, total) = match self.phase() {
            TimerPhase::Finished { total: current } => {
                let total = total
                    .filter(|t| total_in_bounds(*t as i64))
                    .unwrap_or(current);
                (total, total)
            }
            phase => (phase.remain(), phase.total()),
        };

        if let Err(e) = self.inner.host.background.acquire() {
            tracing::warn!("バックグラウンド実行を開始できません: {}", e);
        }

        tracing::info!("タイマーを開始: 残り {}ms / {}ms", remain, total);
        self.publish(TimerPhase::Running { remain, total });
        self.emit(TimerEvent::Started { remain, total });
        self.spawn_countdown(&mut loops, tick, remain, total);
    }

    /// Pauses the countdown, persists the remaining time and releases
    /// background execution until the next start.
    ///
    /// Pausing a finished timer does nothing.
    pub fn pause(&self) {
        let mut loops = self.lock_loops();
        self.cancel_countdown(&mut loops);

        let (remain, total) = match self.phase() {
            TimerPhase::Finished { .. } => {
                tracing::debug!("停止中のタイマーは一時停止できません");
                return;
            }
            phase => (phase.remain(), phase.total()),
        };

        let paused = TimerPhase::Paused { remain, total };
        self.save(&paused);
        self.publish(paused);
        self.emit(TimerEvent::Paused { remain, total });
        self.inner.host.background.release();
    }

    /// Stops the countdown and clears any persisted time.
    pub fn stop(&self) {
        let mut loops = self.lock_loops();
        self.cancel_countdown(&mut loops);
        self.clear_saved();

        let total = self.phase().total();
        self.publish(TimerPhase::Finished { total });
        self.emit(TimerEvent::Stopped { total });

        self.inner.host.notifier.remove();
        self.inner.host.background.release();
    }

    /// Shifts the timer by `delta` milliseconds.
    ///
    /// Returns false, leaving everything untouched, when the new total would
    /// leave `[1 minute, 60 minutes]`. A running countdown restarts from the
    /// shifted remain/total; a paused one is persisted again.
    pub fn adjust(&self, delta: i64) -> bool {
        let mut loops = self.lock_loops();

        let Some(next) = self.phase().shifted(delta) else {
            tracing::debug!("調整を拒否: {}ms", delta);
            self.emit(TimerEvent::AdjustRejected { delta });
            return false;
        };

        match next {
            TimerPhase::Finished { .. } => self.publish(next),
            TimerPhase::Running { remain, total } => {
                self.cancel_countdown(&mut loops);
                self.clear_saved();
                self.publish(next);
                let tick = loops.tick;
                self.spawn_countdown(&mut loops, tick, remain, total);
            }
            TimerPhase::Paused { .. } => {
                self.save(&next);
                self.publish(next);
            }
        }

        self.emit(TimerEvent::Adjusted { phase: next });
        true
    }

    /// Adjusts by one configured step in `direction` now and then every
    /// `interval` until [`stop_adjust_repeating`](Self::stop_adjust_repeating).
    ///
    /// Replaces any repeated adjustment already in progress.
    pub fn adjust_repeating(&self, direction: AdjustDirection, interval: Duration) {
        let interval = interval.max(MIN_PERIOD);
        let delta = direction.delta(self.inner.config.adjust_step_ms);

        let mut loops = self.lock_loops();
        if let Some(handle) = loops.repeater.take() {
            handle.abort();
        }

        let engine = self.clone();
        loops.repeater = Some(tokio::spawn(async move {
            loop {
                engine.adjust(delta);
                tokio::time::sleep(interval).await;
            }
        }));
    }

    /// Ends repeated adjustment. Does nothing if none is running.
    pub fn stop_adjust_repeating(&self) {
        if let Some(handle) = self.lock_loops().repeater.take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------------
    // Countdown
    // ------------------------------------------------------------------------

    fn spawn_countdown(&self, loops: &mut Loops, tick: Duration, remain: u64, total: u64) {
        loops.tick = tick;
        let generation = loops.generation;
        let engine = self.clone();
        loops.countdown = Some(tokio::spawn(async move {
            engine.run_countdown(generation, tick, remain, total).await;
        }));
    }

    async fn run_countdown(self, generation: u64, tick: Duration, mut remain: u64, total: u64) {
        let step = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);
        let mut ticker = interval_at(Instant::now() + tick, tick);
        // Late ticks still count down so wall-clock time is not lost.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            ticker.tick().await;
            remain = remain.saturating_sub(step);
            if !self.on_tick(generation, remain, total) {
                return;
            }
        }
    }

    /// Publishes one tick. Returns false once the loop should end.
    fn on_tick(&self, generation: u64, remain: u64, total: u64) -> bool {
        let mut loops = self.lock_loops();
        if loops.generation != generation {
            return false;
        }

        self.publish(TimerPhase::Running { remain, total });
        if let Err(e) = self.inner.host.notifier.update(&status_text(remain)) {
            tracing::warn!("通知の更新に失敗しました: {}", e);
        }
        self.emit(TimerEvent::Tick { remain, total });

        if remain > 0 {
            return true;
        }

        tracing::info!("タイマーが終了しました");
        self.publish(TimerPhase::Finished { total });
        self.emit(TimerEvent::Finished { total });
        self.inner.host.background.release();
        loops.countdown = None;
        false
    }

    fn cancel_countdown(&self, loops: &mut Loops) {
        loops.generation = loops.generation.wrapping_add(1);
        if let Some(handle) = loops.countdown.take() {
            handle.abort();
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn lock_loops(&self) -> MutexGuard<'_, Loops> {
        self.inner.loops.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, phase: TimerPhase) {
        self.inner.phase_tx.send_replace(phase);
    }

    fn emit(&self, event: TimerEvent) {
        if self.inner.event_tx.send(event).is_err() {
            tracing::trace!("イベントの受信側がありません");
        }
    }

    fn save(&self, phase: &TimerPhase) {
        if let Err(e) = self.inner.host.store.save(&SavedTimer::from_phase(phase)) {
            tracing::warn!("タイマー状態の保存に失敗しました: {}", e);
        }
    }

    fn clear_saved(&self) {
        if let Err(e) = self.inner.host.store.clear() {
            tracing::warn!("タイマー状態の削除に失敗しました: {}", e);
        }
    }
}

/// Decides the startup phase from whatever the store holds.
fn restore_phase(store: &dyn TimerStore) -> TimerPhase {
    match store.load() {
        Ok(Some(saved)) => match saved.to_phase() {
            Some(phase) => {
                tracing::info!(
                    "保存されたタイマーを復元: 残り {}ms / {}ms",
                    phase.remain(),
                    phase.total()
                );
                phase
            }
            None => {
                tracing::warn!("保存されたタイマーが範囲外のため破棄します: {:?}", saved);
                if let Err(e) = store.clear() {
                    tracing::warn!("タイマー状態の削除に失敗しました: {}", e);
                }
                TimerPhase::default()
            }
        },
        Ok(None) => TimerPhase::default(),
        Err(e) => {
            tracing::warn!("タイマー状態を読み込めません: {}", e);
            TimerPhase::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
