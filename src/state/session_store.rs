//! Registry of live timer sessions
//!
//! Owns every piece of mutable per-timer state: the local mirror of the
//! backend timer, the countdown task, the paused snapshot and the pending
//! mid-session check-in. At most one countdown task exists per timer id.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

use super::{resolve, Lifecycle, Timer, TimerId};
use crate::{
    tasks::countdown_task,
    utils::{format_clock, format_compact, format_countdown, Clock},
};

#[derive(Debug)]
struct CountdownHandle {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct SessionEntry {
    timer: Timer,
    countdown: Option<CountdownHandle>,
    generation: u64,
    paused_remaining_ms: Option<u64>,
    mid_checkin: Option<AbortHandle>,
    mid_checkin_fired: bool,
    completed: bool,
    last_tick_ms: Option<u64>,
}

impl SessionEntry {
    fn new(timer: Timer) -> Self {
        Self {
            timer,
            countdown: None,
            generation: 0,
            paused_remaining_ms: None,
            mid_checkin: None,
            mid_checkin_fired: false,
            completed: false,
            last_tick_ms: None,
        }
    }

    fn cancel_countdown(&mut self) -> bool {
        match self.countdown.take() {
            Some(handle) => {
                handle.task.abort();
                true
            }
            None => false,
        }
    }

    fn cancel_mid_checkin(&mut self) -> bool {
        match self.mid_checkin.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

/// Snapshot of a timer for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerView {
    pub id: TimerId,
    pub name: String,
    pub lifecycle: Lifecycle,
    pub duration_seconds: u64,
    pub remaining_ms: u64,
    pub display: String,
    pub compact: String,
    pub completed: bool,
    pub countdown_active: bool,
    /// Remaining time reported by the most recent countdown tick
    pub last_tick_ms: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

/// Page-lifetime registry mapping timer id to its session
pub struct TimerSessionStore {
    sessions: Mutex<HashMap<TimerId, SessionEntry>>,
    clock: Arc<dyn Clock>,
}

impl TimerSessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<TimerId, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the local mirror of a timer, keeping its session
    pub fn register(&self, timer: Timer) {
        let mut sessions = self.sessions();
        match sessions.get_mut(&timer.id) {
            Some(entry) => entry.timer = timer,
            None => {
                sessions.insert(timer.id.clone(), SessionEntry::new(timer));
            }
        }
    }

    pub fn timer(&self, id: &TimerId) -> Option<Timer> {
        self.sessions().get(id).map(|entry| entry.timer.clone())
    }

    /// Local lifecycle; unknown timers are stopped
    pub fn lifecycle(&self, id: &TimerId) -> Lifecycle {
        self.sessions()
            .get(id)
            .map(|entry| entry.timer.lifecycle)
            .unwrap_or_default()
    }

    /// Atomically move a timer from one of `from` to `to`, applying `update`
    /// to its anchors. Returns the updated mirror, or the current lifecycle
    /// when the move is not allowed.
    pub fn transition<F>(
        &self,
        id: &TimerId,
        from: &[Lifecycle],
        to: Lifecycle,
        update: F,
    ) -> Result<Timer, Lifecycle>
    where
        F: FnOnce(&mut Timer),
    {
        let mut sessions = self.sessions();
        if !sessions.contains_key(id) && !from.contains(&Lifecycle::Stopped) {
            return Err(Lifecycle::Stopped);
        }
        let entry = sessions
            .entry(id.clone())
            .or_insert_with(|| SessionEntry::new(Timer::stopped(id.clone(), String::new(), 0)));

        let current = entry.timer.lifecycle;
        if !from.contains(&current) {
            return Err(current);
        }

        entry.timer.lifecycle = to;
        update(&mut entry.timer);
        if to == Lifecycle::Running && current == Lifecycle::Stopped {
            entry.mid_checkin_fired = false;
            entry.paused_remaining_ms = None;
        }
        entry.completed = false;
        Ok(entry.timer.clone())
    }

    /// Stop a run: cancel its countdown and pending mid check-in, drop the
    /// paused snapshot and anchors. Returns the lifecycle before stopping.
    pub fn end_run(&self, id: &TimerId, completed: bool) -> Lifecycle {
        let mut sessions = self.sessions();
        let Some(entry) = sessions.get_mut(id) else {
            return Lifecycle::Stopped;
        };

        let previous = entry.timer.lifecycle;
        entry.cancel_countdown();
        entry.cancel_mid_checkin();
        entry.paused_remaining_ms = None;
        entry.mid_checkin_fired = false;
        entry.completed = completed;
        entry.last_tick_ms = None;
        entry.timer.lifecycle = Lifecycle::Stopped;
        entry.timer.started_at = None;
        entry.timer.paused_at = None;
        previous
    }

    /// Install a 1 Hz countdown for `id` ending at `ends_at`, replacing any
    /// countdown already running for it.
    ///
    /// `on_tick` receives the remaining milliseconds on every tick and
    /// `on_complete` runs exactly once when the countdown reaches zero,
    /// unless it was cancelled or replaced first.
    pub fn start_countdown<T, C>(
        self: &Arc<Self>,
        id: &TimerId,
        ends_at: DateTime<Utc>,
        on_tick: T,
        on_complete: C,
    ) where
        T: Fn(u64) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let mut sessions = self.sessions();
        let entry = sessions
            .entry(id.clone())
            .or_insert_with(|| SessionEntry::new(Timer::stopped(id.clone(), String::new(), 0)));

        if entry.cancel_countdown() {
            debug!("Replaced existing countdown for timer {}", id);
        }

        entry.generation += 1;
        let generation = entry.generation;
        let store = Arc::downgrade(self);
        let finish_id = id.clone();
        let finish = move || {
            store
                .upgrade()
                .is_some_and(|store| store.finish_countdown(&finish_id, generation))
        };

        // Spawned while holding the lock so the task can't observe a missing handle
        let task = tokio::spawn(countdown_task(
            id.clone(),
            ends_at,
            Arc::clone(&self.clock),
            on_tick,
            finish,
            on_complete,
        ));
        entry.countdown = Some(CountdownHandle { generation, task });
    }

    /// Release the countdown slot if `generation` still owns it
    fn finish_countdown(&self, id: &TimerId, generation: u64) -> bool {
        let mut sessions = self.sessions();
        match sessions.get_mut(id) {
            Some(entry) if entry.countdown.as_ref().map(|c| c.generation) == Some(generation) => {
                entry.countdown = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the countdown for `id`. Idempotent; returns whether one was live.
    pub fn cancel_countdown(&self, id: &TimerId) -> bool {
        self.sessions()
            .get_mut(id)
            .is_some_and(SessionEntry::cancel_countdown)
    }

    pub fn has_countdown(&self, id: &TimerId) -> bool {
        self.sessions()
            .get(id)
            .is_some_and(|entry| entry.countdown.is_some())
    }

    /// Number of live countdowns across all timers
    pub fn active_countdowns(&self) -> usize {
        self.sessions()
            .values()
            .filter(|entry| entry.countdown.is_some())
            .count()
    }

    /// Store the remaining time captured at pause. Write-once: a snapshot
    /// already waiting to be consumed is kept.
    pub fn snapshot_paused_remaining(&self, id: &TimerId, ms: u64) -> bool {
        let mut sessions = self.sessions();
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        if entry.paused_remaining_ms.is_some() {
            debug!("Timer {} already has a paused snapshot", id);
            return false;
        }
        entry.paused_remaining_ms = Some(ms);
        true
    }

    /// Take the paused snapshot. Read-once: a second call returns `None`.
    pub fn consume_paused_remaining(&self, id: &TimerId) -> Option<u64> {
        self.sessions()
            .get_mut(id)
            .and_then(|entry| entry.paused_remaining_ms.take())
    }

    /// Track the task awaiting the mid-session check-in of the current run
    pub fn track_mid_checkin(&self, id: &TimerId, handle: AbortHandle) {
        let mut sessions = self.sessions();
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.cancel_mid_checkin();
                entry.mid_checkin = Some(handle);
            }
            None => handle.abort(),
        }
    }

    pub fn cancel_mid_checkin(&self, id: &TimerId) -> bool {
        self.sessions()
            .get_mut(id)
            .is_some_and(SessionEntry::cancel_mid_checkin)
    }

    /// Mark the halfway prompt as shown for this run. Returns `false` if it
    /// had already fired.
    pub fn mark_mid_checkin_fired(&self, id: &TimerId) -> bool {
        let mut sessions = self.sessions();
        match sessions.get_mut(id) {
            Some(entry) if !entry.mid_checkin_fired => {
                entry.mid_checkin_fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_mid_checkin_fired(&self, id: &TimerId, fired: bool) {
        if let Some(entry) = self.sessions().get_mut(id) {
            entry.mid_checkin_fired = fired;
        }
    }

    pub fn record_tick(&self, id: &TimerId, remaining_ms: u64) {
        if let Some(entry) = self.sessions().get_mut(id) {
            entry.last_tick_ms = Some(remaining_ms);
        }
    }

    /// Remaining time of `id` right now, from its anchors
    pub fn remaining_ms(&self, id: &TimerId) -> u64 {
        let now = self.clock.now();
        self.sessions()
            .get(id)
            .map(|entry| resolve(&entry.timer, now))
            .unwrap_or(0)
    }

    pub fn view(&self, id: &TimerId) -> Option<TimerView> {
        let now = self.clock.now();
        self.sessions().get(id).map(|entry| view_of(entry, now))
    }

    pub fn views(&self) -> Vec<TimerView> {
        let now = self.clock.now();
        let mut views: Vec<TimerView> = self
            .sessions()
            .values()
            .map(|entry| view_of(entry, now))
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    /// Cancel every countdown and pending check-in
    pub fn cancel_all(&self) {
        let mut cancelled = 0;
        for entry in self.sessions().values_mut() {
            if entry.cancel_countdown() {
                cancelled += 1;
            }
            entry.cancel_mid_checkin();
        }
        info!("Cancelled {} active countdowns", cancelled);
    }
}

fn view_of(entry: &SessionEntry, now: DateTime<Utc>) -> TimerView {
    let timer = &entry.timer;
    let remaining_ms = resolve(timer, now);
    let display = match timer.lifecycle {
        Lifecycle::Stopped if !entry.completed => format_clock(0),
        _ => format_countdown(remaining_ms),
    };

    TimerView {
        id: timer.id.clone(),
        name: timer.name.clone(),
        lifecycle: timer.lifecycle,
        duration_seconds: timer.duration_seconds,
        remaining_ms,
        display,
        compact: format_compact(remaining_ms),
        completed: entry.completed,
        countdown_active: entry.countdown.is_some(),
        last_tick_ms: entry.last_tick_ms,
        started_at: timer.started_at,
        paused_at: timer.paused_at,
    }
}
