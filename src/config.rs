//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "flow-timer")]
#[command(about = "Flow-session timers with server-anchored countdowns and energy check-ins")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20553")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Base URL of the timer persistence backend; runs offline when omitted
    #[arg(short, long)]
    pub backend_url: Option<String>,

    /// Session cookie forwarded to the backend (e.g. "session=abc123")
    #[arg(long)]
    pub session_cookie: Option<String>,

    /// JSON file listing the timers to restore on startup
    #[arg(short, long)]
    pub timers: Option<PathBuf>,

    /// Shortest session, in minutes, that gets a mid-session check-in
    #[arg(long, default_value = "30")]
    pub midpoint_floor_minutes: u64,

    /// Raise the start check-in before the countdown begins
    #[arg(long)]
    pub checkin_before_start: bool,

    /// Cap on energy check-ins per day
    #[arg(long)]
    pub max_daily_checkins: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            midpoint_floor_seconds: self.midpoint_floor_minutes * 60,
            checkin_before_start: self.checkin_before_start,
            max_daily_checkins: self.max_daily_checkins,
        }
    }
}

/// Tunables for the timer state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Runs shorter than this never get a mid-session check-in
    pub midpoint_floor_seconds: u64,
    pub checkin_before_start: bool,
    pub max_daily_checkins: Option<u32>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            midpoint_floor_seconds: 30 * 60,
            checkin_before_start: false,
            max_daily_checkins: None,
        }
    }
}
