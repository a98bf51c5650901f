//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use flow_timer::{
    config::ControllerSettings,
    controller::TimerController,
    error::TimerError,
    services::{
        MemoryBackend, Notice, NoticeLevel, NotificationSink, RemoteTimerState, TimerBackend,
    },
    state::{
        CheckinStage, EnergyLevel, Preferences, Timer, TimerAction, TimerId, TimerSessionStore,
    },
    utils::{Clock, TokioClock},
};

/// Ordered record of everything the backend and sink saw
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// In-memory backend with failure injection
pub struct FakeBackend {
    pub inner: MemoryBackend,
    journal: Journal,
    failing_updates: AtomicUsize,
    state_offline: AtomicBool,
    preferences_offline: AtomicBool,
}

impl FakeBackend {
    pub fn new(clock: Arc<dyn Clock>, journal: Journal) -> Self {
        Self {
            inner: MemoryBackend::new(clock),
            journal,
            failing_updates: AtomicUsize::new(0),
            state_offline: AtomicBool::new(false),
            preferences_offline: AtomicBool::new(false),
        }
    }

    /// Fail the next `n` update calls (`usize::MAX` fails them all)
    pub fn fail_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    pub fn fail_state_fetches(&self) {
        self.state_offline.store(true, Ordering::SeqCst);
    }

    pub fn fail_preferences(&self) {
        self.preferences_offline.store(true, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        let remaining = self.failing_updates.load(Ordering::SeqCst);
        if remaining == 0 {
            return false;
        }
        if remaining != usize::MAX {
            self.failing_updates.store(remaining - 1, Ordering::SeqCst);
        }
        true
    }
}

fn network_down() -> TimerError {
    TimerError::PersistenceUnavailable("network down".to_string())
}

#[async_trait]
impl TimerBackend for FakeBackend {
    async fn get_timer_state(&self, id: &TimerId) -> Result<RemoteTimerState, TimerError> {
        if self.state_offline.load(Ordering::SeqCst) {
            return Err(network_down());
        }
        self.inner.get_timer_state(id).await
    }

    async fn update_timer(&self, id: &TimerId, action: TimerAction) -> Result<(), TimerError> {
        self.journal.push(format!("update:{}:{}", id, action));
        if self.take_failure() {
            return Err(network_down());
        }
        self.inner.update_timer(id, action).await
    }

    async fn get_user_preferences(&self) -> Result<Preferences, TimerError> {
        if self.preferences_offline.load(Ordering::SeqCst) {
            return Err(network_down());
        }
        self.inner.get_user_preferences().await
    }

    async fn save_energy_log(
        &self,
        id: &TimerId,
        stage: CheckinStage,
        level: EnergyLevel,
    ) -> Result<(), TimerError> {
        self.journal.push(format!("energy:{}:{}", id, stage));
        self.inner.save_energy_log(id, stage, level).await
    }
}

/// Sink that answers every prompt after `answer_delay`
pub struct RecordingSink {
    journal: Journal,
    notices: Mutex<Vec<Notice>>,
    answer: Option<EnergyLevel>,
    answer_delay: Duration,
}

impl RecordingSink {
    pub fn new(journal: Journal) -> Self {
        Self::answering(journal, Some(6), Duration::ZERO)
    }

    pub fn answering(journal: Journal, level: Option<u8>, answer_delay: Duration) -> Self {
        Self {
            journal,
            notices: Mutex::new(Vec::new()),
            answer: level.map(|l| EnergyLevel::try_from(l).unwrap()),
            answer_delay,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn notices_at(&self, level: NoticeLevel) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == level)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.journal
            .push(format!("notice:{:?}:{}", notice.level, notice.message));
        self.notices.lock().unwrap().push(notice);
    }

    async fn energy_checkin(&self, id: &TimerId, stage: CheckinStage) -> Option<EnergyLevel> {
        self.journal.push(format!("checkin:{}:{}", id, stage));
        if !self.answer_delay.is_zero() {
            tokio::time::sleep(self.answer_delay).await;
        }
        self.answer
    }

    fn show_reentry(&self, id: &TimerId) {
        self.journal.push(format!("reentry:{}", id));
    }
}

pub struct Harness {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<TimerSessionStore>,
    pub backend: Arc<FakeBackend>,
    pub sink: Arc<RecordingSink>,
    pub controller: Arc<TimerController>,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ControllerSettings::default(), Preferences::default(), |journal| {
            RecordingSink::new(journal)
        })
    }

    pub fn with(
        settings: ControllerSettings,
        preferences: Preferences,
        sink: impl FnOnce(Journal) -> RecordingSink,
    ) -> Self {
        let journal = Journal::default();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let backend = Arc::new(FakeBackend::new(Arc::clone(&clock), journal.clone()));
        backend.inner.set_preferences(preferences);
        let sink = Arc::new(sink(journal.clone()));
        let store = Arc::new(TimerSessionStore::new(Arc::clone(&clock)));
        let controller = TimerController::new(
            Arc::clone(&store),
            backend.clone(),
            sink.clone(),
            settings,
        );

        Self {
            clock,
            store,
            backend,
            sink,
            controller,
            journal,
        }
    }

    /// Register a stopped timer with both the backend and the controller
    pub fn add_timer(&self, id: u64, duration_seconds: u64) -> TimerId {
        let timer = Timer::stopped(TimerId::from(id), format!("Timer {}", id), duration_seconds);
        self.backend.inner.insert(timer.clone());
        self.controller.register(timer);
        TimerId::from(id)
    }

    /// Load preferences into the controller's cache
    pub async fn load_preferences(&self) {
        self.controller.refresh_preferences().await;
    }
}

/// Let spawned tasks run without moving the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    settle().await;
}
