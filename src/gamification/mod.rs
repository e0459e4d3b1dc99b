//! Consecutive-day streak and badge tracking.
//!
//! The tracker is domain-agnostic: it only consumes "the user logged
//! something on day X" events, and the integration layer decides which
//! domains feed it. State is persisted wholesale in the settings database.

use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::datetime::{day_key, local_today, now_ms};
use crate::db;

pub const BADGE_FIRST_LOG: &str = "first_log";
pub const BADGE_3_DAY_STREAK: &str = "3_day_streak";
pub const BADGE_7_DAY_STREAK: &str = "7_day_streak";
pub const BADGE_HYDRATION_PRO: &str = "hydration_pro";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at_ms: Option<i64>,
}

fn badge(id: &str, title: &str, description: &str, icon: &str) -> Badge {
    Badge {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        unlocked_at_ms: None,
    }
}

fn badge_catalog() -> Vec<Badge> {
    vec![
        badge(BADGE_FIRST_LOG, "Getting Started", "Log your first meal", "🎯"),
        badge(BADGE_3_DAY_STREAK, "Consistency King", "Log for 3 days in a row", "🔥"),
        badge(BADGE_7_DAY_STREAK, "Unstoppable", "Log for 7 days in a row", "🦁"),
        badge(BADGE_HYDRATION_PRO, "Hydration Hero", "Reach your water goal", "💧"),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub max_streak: u32,
    pub last_logged_day: Option<String>,
    pub badges: Vec<Badge>,
}

impl Default for StreakState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreakState {
    pub fn new() -> Self {
        Self {
            current_streak: 0,
            max_streak: 0,
            last_logged_day: None,
            badges: badge_catalog(),
        }
    }

    pub fn badge(&self, badge_id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == badge_id)
    }

    /// Count a qualifying log event for `today`. A second event on the same
    /// day is a no-op; a log on the day after the last counted one extends
    /// the streak; anything else (gap, or first ever log) resets it to 1.
    pub fn record_activity(&mut self, today: NaiveDate, now_ms: i64) {
        let today_key = day_key(today);
        if self.last_logged_day.as_deref() == Some(today_key.as_str()) {
            return;
        }

        let yesterday_key = today.pred_opt().map(day_key);
        if self.last_logged_day.is_some() && self.last_logged_day == yesterday_key {
            self.current_streak += 1;
            self.max_streak = self.max_streak.max(self.current_streak);
            self.last_logged_day = Some(today_key);
            match self.current_streak {
                3 => self.unlock_badge(BADGE_3_DAY_STREAK, now_ms),
                7 => self.unlock_badge(BADGE_7_DAY_STREAK, now_ms),
                _ => {}
            }
        } else {
            self.current_streak = 1;
            self.max_streak = self.max_streak.max(1);
            self.last_logged_day = Some(today_key);
            self.unlock_badge(BADGE_FIRST_LOG, now_ms);
        }
    }

    pub fn record_activity_today(&mut self, offset: FixedOffset) {
        self.record_activity(local_today(offset), now_ms());
    }

    /// Idempotent: the first unlock stamps the time, later calls are no-ops.
    pub fn unlock_badge(&mut self, badge_id: &str, now_ms: i64) {
        if let Some(badge) = self.badges.iter_mut().find(|b| b.id == badge_id) {
            if badge.unlocked_at_ms.is_none() {
                badge.unlocked_at_ms = Some(now_ms);
            }
        }
    }
}

pub fn load(conn: &Connection) -> Result<StreakState> {
    match db::kv_get_string(conn, db::KV_GAMIFICATION_STATE)? {
        Some(raw) => serde_json::from_str(&raw).map_err(Into::into),
        None => Ok(StreakState::new()),
    }
}

pub fn save(conn: &Connection, state: &StreakState) -> Result<()> {
    db::kv_set_string(conn, db::KV_GAMIFICATION_STATE, &serde_json::to_string(state)?)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).expect("date")
    }

    #[test]
    fn first_log_starts_a_streak_and_unlocks_the_badge() {
        let mut state = StreakState::new();
        state.record_activity(d(1), 100);

        assert_eq!(state.current_streak, 1);
        assert_eq!(state.max_streak, 1);
        assert_eq!(state.badge(BADGE_FIRST_LOG).expect("badge").unlocked_at_ms, Some(100));
    }

    #[test]
    fn consecutive_days_extend_the_streak_and_unlock_threshold_badges() {
        let mut state = StreakState::new();
        state.record_activity(d(1), 100);
        state.record_activity(d(2), 200);
        assert_eq!(state.current_streak, 2);
        assert!(state.badge(BADGE_3_DAY_STREAK).expect("badge").unlocked_at_ms.is_none());

        state.record_activity(d(3), 300);
        assert_eq!(state.current_streak, 3);
        assert_eq!(
            state.badge(BADGE_3_DAY_STREAK).expect("badge").unlocked_at_ms,
            Some(300)
        );
    }

    #[test]
    fn a_gap_resets_the_streak_but_keeps_the_high_water_mark() {
        let mut state = StreakState::new();
        for day in 1..=3 {
            state.record_activity(d(day), i64::from(day) * 100);
        }
        assert_eq!(state.max_streak, 3);

        // Day 4 skipped; logging on day 5 starts over.
        state.record_activity(d(5), 500);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.max_streak, 3);
    }

    #[test]
    fn second_log_on_the_same_day_is_a_no_op() {
        let mut state = StreakState::new();
        state.record_activity(d(1), 100);
        state.record_activity(d(2), 200);
        state.record_activity(d(2), 250);

        assert_eq!(state.current_streak, 2);
        assert_eq!(state.last_logged_day.as_deref(), Some("2024-05-02"));
    }

    #[test]
    fn seven_day_streak_unlocks_the_second_threshold_badge() {
        let mut state = StreakState::new();
        for day in 1..=7 {
            state.record_activity(d(day), i64::from(day) * 100);
        }

        assert_eq!(state.current_streak, 7);
        assert_eq!(
            state.badge(BADGE_7_DAY_STREAK).expect("badge").unlocked_at_ms,
            Some(700)
        );
    }

    #[test]
    fn unlock_badge_is_idempotent() {
        let mut state = StreakState::new();
        state.unlock_badge(BADGE_HYDRATION_PRO, 100);
        state.unlock_badge(BADGE_HYDRATION_PRO, 999);

        assert_eq!(
            state.badge(BADGE_HYDRATION_PRO).expect("badge").unlocked_at_ms,
            Some(100)
        );
    }

    #[test]
    fn state_round_trips_through_the_settings_database() {
        let dir = tempdir().expect("tempdir");
        let conn = crate::db::open(dir.path()).expect("open");

        assert_eq!(load(&conn).expect("load"), StreakState::new());

        let mut state = StreakState::new();
        state.record_activity(d(1), 100);
        state.record_activity(d(2), 200);
        save(&conn, &state).expect("save");

        let reopened = crate::db::open(dir.path()).expect("reopen");
        assert_eq!(load(&reopened).expect("load"), state);
    }
}
