//! Timer data model mirrored from the persistence backend

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Longest session the backend accepts (240 minutes)
pub const MAX_DURATION_SECONDS: u64 = 240 * 60;

/// Opaque, stable timer identifier. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TimerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for TimerId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle of a single flow timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl Lifecycle {
    /// Decode the backend's `is_running` column (0 stopped, 1 running, 2 paused)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Lifecycle::Stopped),
            1 => Some(Lifecycle::Running),
            2 => Some(Lifecycle::Paused),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Lifecycle::Stopped => 0,
            Lifecycle::Running => 1,
            Lifecycle::Paused => 2,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Stopped => "stopped",
            Lifecycle::Running => "running",
            Lifecycle::Paused => "paused",
        })
    }
}

/// Lifecycle actions understood by the backend's update endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl TimerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
            TimerAction::Stop => "stop",
        }
    }

    /// Lifecycle the backend reports after the action succeeds
    pub fn target(self) -> Lifecycle {
        match self {
            TimerAction::Start | TimerAction::Resume => Lifecycle::Running,
            TimerAction::Pause => Lifecycle::Paused,
            TimerAction::Stop => Lifecycle::Stopped,
        }
    }
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session stage an energy check-in belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinStage {
    Start,
    Mid,
    End,
}

impl CheckinStage {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckinStage::Start => "start",
            CheckinStage::Mid => "mid",
            CheckinStage::End => "end",
        }
    }
}

impl fmt::Display for CheckinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-reported energy level, 1 through 10
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EnergyLevel(u8);

impl EnergyLevel {
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for EnergyLevel {
    type Error = TimerError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if (1..=10).contains(&level) {
            Ok(Self(level))
        } else {
            Err(TimerError::InvalidEnergyLevel(level))
        }
    }
}

impl From<EnergyLevel> for u8 {
    fn from(level: EnergyLevel) -> Self {
        level.0
    }
}

/// Feature toggles that decide which prompts a session raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub enable_start_checkin: bool,
    pub enable_mid_checkin: bool,
    pub enable_end_checkin: bool,
    pub enable_energy_log: bool,
    pub enable_sound: bool,
    pub enable_reentry: bool,
}

impl Preferences {
    pub fn checkin_enabled(&self, stage: CheckinStage) -> bool {
        match stage {
            CheckinStage::Start => self.enable_start_checkin,
            CheckinStage::Mid => self.enable_mid_checkin,
            CheckinStage::End => self.enable_end_checkin,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enable_start_checkin: true,
            enable_mid_checkin: true,
            enable_end_checkin: true,
            enable_energy_log: true,
            enable_sound: false,
            enable_reentry: false,
        }
    }
}

/// Authoritative timer state, mirrored locally.
///
/// `started_at` is the anchor the current run counts down from and is absent
/// while stopped; `paused_at` is only present while paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub duration_seconds: u64,
    pub lifecycle: Lifecycle,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

impl Timer {
    /// A stopped timer with no anchors
    pub fn stopped(id: TimerId, name: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            id,
            name: name.into(),
            duration_seconds,
            lifecycle: Lifecycle::Stopped,
            started_at: None,
            paused_at: None,
        }
    }

    /// Check a requested session length before a run uses it
    pub fn validate_duration(duration_seconds: u64) -> Result<u64, TimerError> {
        if (1..=MAX_DURATION_SECONDS).contains(&duration_seconds) {
            Ok(duration_seconds)
        } else {
            Err(TimerError::InvalidDuration(duration_seconds))
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_seconds.saturating_mul(1000)
    }

    /// Instant the current run reaches zero, if running. `None` when the
    /// end falls outside the representable range.
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        match (self.lifecycle, self.started_at) {
            (Lifecycle::Running, Some(started_at)) => {
                let duration = i64::try_from(self.duration_ms()).ok()?;
                started_at.checked_add_signed(chrono::Duration::try_milliseconds(duration)?)
            }
            _ => None,
        }
    }
}

/// Timer as the page knows it before talking to the backend: identity plus
/// the raw anchor attributes used when the state fetch fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDescriptor {
    pub id: TimerId,
    #[serde(default)]
    pub name: String,
    pub duration_seconds: u64,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub paused_at: Option<String>,
}

impl TimerDescriptor {
    /// Parse the raw anchors into a [`Timer`].
    pub fn to_timer(&self) -> Result<Timer, TimerError> {
        let started_at = self
            .started_at
            .as_deref()
            .map(|raw| parse_anchor("started_at", raw))
            .transpose()?;
        let paused_at = self
            .paused_at
            .as_deref()
            .map(|raw| parse_anchor("paused_at", raw))
            .transpose()?;

        Ok(Timer {
            id: self.id.clone(),
            name: self.name.clone(),
            duration_seconds: self.duration_seconds,
            lifecycle: self.lifecycle,
            started_at,
            paused_at,
        })
    }
}

/// Parse an anchor timestamp.
///
/// Accepts RFC 3339, or the backend's `YYYY-MM-DD HH:MM:SS` columns which
/// are stored in the server's local time.
pub fn parse_anchor(field: &'static str, raw: &str) -> Result<DateTime<Utc>, TimerError> {
    let raw = raw.trim();
    let invalid = || TimerError::InvalidAnchor {
        field,
        value: raw.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| invalid())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}
