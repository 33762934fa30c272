use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const WORK_PHASE_SECONDS: u32 = 25 * 60;
pub const BREAK_PHASE_SECONDS: u32 = 5 * 60;
pub const WORK_PHASE_MINUTES: u32 = WORK_PHASE_SECONDS / 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Work,
    Break,
}

impl TimerPhase {
    pub fn duration_seconds(self) -> u32 {
        match self {
            Self::Work => WORK_PHASE_SECONDS,
            Self::Break => BREAK_PHASE_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running or paused; nothing changed.
    Skipped,
    /// One second consumed, phase still in progress.
    Counted,
    /// The named phase just finished and the timer flipped to the other one.
    Completed(TimerPhase),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub is_running: bool,
    pub is_paused: bool,
    pub time_left: u32,
    pub phase: TimerPhase,
    pub total_seconds: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            is_running: false,
            is_paused: false,
            time_left: WORK_PHASE_SECONDS,
            phase: TimerPhase::Work,
            total_seconds: WORK_PHASE_SECONDS,
        }
    }
}

impl TimerState {
    /// Starting an already-running timer only clears the pause flag;
    /// `time_left` is never reset by start.
    pub fn start(&mut self) {
        self.is_running = true;
        self.is_paused = false;
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_gating(&self) -> bool {
        self.is_running && !self.is_paused && self.phase == TimerPhase::Work
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running || self.is_paused {
            return TickOutcome::Skipped;
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left > 0 {
            return TickOutcome::Counted;
        }

        let finished = self.phase;
        self.phase = match finished {
            TimerPhase::Work => TimerPhase::Break,
            TimerPhase::Break => TimerPhase::Work,
        };
        self.time_left = self.phase.duration_seconds();
        self.total_seconds = self.phase.duration_seconds();
        TickOutcome::Completed(finished)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.total_seconds == 0 {
            return Err("timer.total_seconds must be > 0".to_string());
        }
        if self.time_left > self.total_seconds {
            return Err("timer.time_left must be <= timer.total_seconds".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub today_count: u32,
    pub streak: u32,
    pub total_minutes: u32,
    pub blocked_today: u32,
    pub last_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_focus_date: Option<NaiveDate>,
}

impl Stats {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today_count: 0,
            streak: 0,
            total_minutes: 0,
            blocked_today: 0,
            last_date: today,
            last_focus_date: None,
        }
    }

    /// Calendar-day rollover: only the daily block counter resets.
    pub fn roll_over_if_new_day(&mut self, today: NaiveDate) -> bool {
        if self.last_date == today {
            return false;
        }
        self.blocked_today = 0;
        self.last_date = today;
        true
    }

    /// Streak counts consecutive calendar days with at least one completed
    /// work interval; a second completion on the same day is not re-counted.
    pub fn record_work_completion(&mut self, today: NaiveDate, minutes: u32) {
        self.today_count += 1;
        self.total_minutes += minutes;

        match self.last_focus_date {
            Some(last) if last == today => {}
            Some(last) if last.succ_opt() == Some(today) => self.streak += 1,
            _ => self.streak = 1,
        }
        self.last_focus_date = Some(today);
    }

    pub fn record_block(&mut self) {
        self.blocked_today += 1;
    }
}

/// Task lists are ordered, trimmed, non-empty, and distinct; first
/// occurrence wins on duplicates.
pub fn normalize_tasks(tasks: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .map(|task| task.trim().to_string())
        .filter(|task| !task.is_empty())
        .filter(|task| seen.insert(task.clone()))
        .collect()
}
