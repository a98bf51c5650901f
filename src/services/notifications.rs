//! User-facing notices and prompts

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::{
    state::{CheckinStage, EnergyLevel, TimerId},
    utils::Clock,
};

const RECENT_NOTICES: usize = 50;

const REENTRY_SUGGESTIONS: &[&str] = &[
    "Reply to one message you have been putting off",
    "Write down the very next step of what you were doing",
    "Tidy your desk for two minutes",
    "Re-read the last paragraph you wrote",
    "Pick one small task and finish it",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Toast,
    EnergyCheckin,
    Reentry,
}

/// A transient user-visible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub timer_id: Option<TimerId>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    /// A toast stamped with `timestamp`, read from the caller's clock
    pub fn new(
        level: NoticeLevel,
        timer_id: Option<&TimerId>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            level,
            kind: NoticeKind::Toast,
            timer_id: timer_id.cloned(),
            message: message.into(),
            timestamp,
        }
    }

    pub fn info(timer_id: &TimerId, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(NoticeLevel::Info, Some(timer_id), message, timestamp)
    }

    fn with_kind(mut self, kind: NoticeKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Side-effect surface for toasts and prompts
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show a non-blocking toast
    fn notify(&self, notice: Notice);

    /// Ask for an energy level. Resolves to `None` if the prompt is dismissed
    /// or superseded.
    async fn energy_checkin(&self, id: &TimerId, stage: CheckinStage) -> Option<EnergyLevel>;

    /// Offer a small task to ease back into work after a session
    fn show_reentry(&self, id: &TimerId);
}

/// An energy prompt waiting for an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPrompt {
    pub timer_id: TimerId,
    pub stage: CheckinStage,
}

/// Notification sink backing the HTTP API.
///
/// Notices are broadcast to subscribers and kept in a short history; energy
/// prompts wait on a oneshot channel until answered through [`Self::answer`].
pub struct PromptBoard {
    clock: Arc<dyn Clock>,
    notice_tx: broadcast::Sender<Notice>,
    recent: Mutex<VecDeque<Notice>>,
    pending: Mutex<HashMap<(TimerId, CheckinStage), oneshot::Sender<Option<EnergyLevel>>>>,
    next_suggestion: AtomicUsize,
}

impl PromptBoard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (notice_tx, _) = broadcast::channel(100);
        Self {
            clock,
            notice_tx,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_NOTICES)),
            pending: Mutex::new(HashMap::new()),
            next_suggestion: AtomicUsize::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    fn recent(&self) -> MutexGuard<'_, VecDeque<Notice>> {
        self.recent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(
        &self,
    ) -> MutexGuard<'_, HashMap<(TimerId, CheckinStage), oneshot::Sender<Option<EnergyLevel>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, notice: Notice) {
        {
            let mut recent = self.recent();
            if recent.len() == RECENT_NOTICES {
                recent.pop_front();
            }
            recent.push_back(notice.clone());
        }

        // No subscribers is fine
        if self.notice_tx.send(notice).is_err() {
            debug!("No notice subscribers");
        }
    }

    /// Most recent notices, oldest first
    pub fn recent_notices(&self) -> Vec<Notice> {
        self.recent().iter().cloned().collect()
    }

    /// Prompts still waiting for an answer
    pub fn pending_prompts(&self) -> Vec<PendingPrompt> {
        let mut pending = self.pending();
        pending.retain(|_, tx| !tx.is_closed());
        let mut prompts: Vec<PendingPrompt> = pending
            .keys()
            .map(|(timer_id, stage)| PendingPrompt {
                timer_id: timer_id.clone(),
                stage: *stage,
            })
            .collect();
        prompts.sort_by(|a, b| a.timer_id.cmp(&b.timer_id));
        prompts
    }

    /// Answer a pending energy prompt; `None` dismisses it. Returns whether
    /// a prompt was waiting.
    pub fn answer(&self, id: &TimerId, stage: CheckinStage, level: Option<EnergyLevel>) -> bool {
        let Some(tx) = self.pending().remove(&(id.clone(), stage)) else {
            return false;
        };
        tx.send(level).is_ok()
    }

    fn next_suggestion(&self) -> &'static str {
        let index = self.next_suggestion.fetch_add(1, Ordering::Relaxed);
        REENTRY_SUGGESTIONS[index % REENTRY_SUGGESTIONS.len()]
    }
}

#[async_trait]
impl NotificationSink for PromptBoard {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("Notice: {}", notice.message),
            NoticeLevel::Warning | NoticeLevel::Error => warn!("Notice: {}", notice.message),
        }
        self.publish(notice);
    }

    async fn energy_checkin(&self, id: &TimerId, stage: CheckinStage) -> Option<EnergyLevel> {
        let (tx, rx) = oneshot::channel();
        if self.pending().insert((id.clone(), stage), tx).is_some() {
            debug!("Superseded pending {} check-in for timer {}", stage, id);
        }

        self.publish(
            Notice::info(
                id,
                format!("How is your energy? ({} check-in)", stage),
                self.clock.now(),
            )
            .with_kind(NoticeKind::EnergyCheckin),
        );

        // A dropped sender means the prompt was superseded
        rx.await.ok().flatten()
    }

    fn show_reentry(&self, id: &TimerId) {
        let suggestion = self.next_suggestion();
        info!("Re-entry prompt for timer {}: {}", id, suggestion);
        self.publish(Notice::info(id, suggestion, self.clock.now()).with_kind(NoticeKind::Reentry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TokioClock;
    use chrono::TimeZone;

    fn board() -> PromptBoard {
        PromptBoard::new(Arc::new(TokioClock::new()))
    }

    #[tokio::test]
    async fn answered_prompt_resolves_with_level() {
        let board = Arc::new(board());
        let id = TimerId::from(1);

        let waiting = {
            let board = Arc::clone(&board);
            let id = id.clone();
            tokio::spawn(async move { board.energy_checkin(&id, CheckinStage::End).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(
            board.pending_prompts(),
            vec![PendingPrompt {
                timer_id: id.clone(),
                stage: CheckinStage::End
            }]
        );
        let level = EnergyLevel::try_from(8).unwrap();
        assert!(board.answer(&id, CheckinStage::End, Some(level)));
        assert_eq!(waiting.await.unwrap(), Some(level));
        assert!(board.pending_prompts().is_empty());
    }

    #[tokio::test]
    async fn superseded_prompt_resolves_as_dismissed() {
        let board = Arc::new(board());
        let id = TimerId::from(1);

        let first = {
            let board = Arc::clone(&board);
            let id = id.clone();
            tokio::spawn(async move { board.energy_checkin(&id, CheckinStage::Mid).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let board = Arc::clone(&board);
            let id = id.clone();
            tokio::spawn(async move { board.energy_checkin(&id, CheckinStage::Mid).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(first.await.unwrap(), None);
        assert!(board.answer(&id, CheckinStage::Mid, None));
        assert_eq!(second.await.unwrap(), None);
    }

    #[test]
    fn answering_without_prompt_is_rejected() {
        let board = board();
        assert!(!board.answer(&TimerId::from(1), CheckinStage::Start, None));
    }

    #[test]
    fn keeps_a_bounded_history() {
        let board = board();
        let id = TimerId::from(1);
        for n in 0..(RECENT_NOTICES + 5) {
            board.notify(Notice::info(&id, format!("notice {}", n), Utc::now()));
        }
        let recent = board.recent_notices();
        assert_eq!(recent.len(), RECENT_NOTICES);
        assert_eq!(recent[0].message, "notice 5");
    }

    #[tokio::test(start_paused = true)]
    async fn prompts_are_stamped_from_the_board_clock() {
        let origin = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let board = PromptBoard::new(Arc::new(TokioClock::starting_at(origin)));
        tokio::time::advance(std::time::Duration::from_secs(45)).await;

        board.show_reentry(&TimerId::from(1));
        assert_eq!(
            board.recent_notices()[0].timestamp,
            origin + chrono::Duration::seconds(45)
        );
    }

    #[tokio::test]
    async fn reentry_rotates_suggestions() {
        let board = board();
        let id = TimerId::from(1);
        board.show_reentry(&id);
        board.show_reentry(&id);
        let recent = board.recent_notices();
        assert_eq!(recent[0].kind, NoticeKind::Reentry);
        assert_ne!(recent[0].message, recent[1].message);
    }
}
