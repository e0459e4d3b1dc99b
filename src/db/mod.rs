//! Local settings database.
//!
//! Only non-list configuration lives here (goals, schedule, unit preference,
//! streak state). Log lists are a cache of the remote source and are never
//! written to durable storage.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod settings_tests;

const KV_WATER_GOAL_ML: &str = "water.goal_ml";
const KV_SLEEP_GOAL_HOURS: &str = "sleep.goal_hours";
const KV_SLEEP_BEDTIME_MINUTES: &str = "sleep.bedtime_minutes";
const KV_SLEEP_WAKETIME_MINUTES: &str = "sleep.waketime_minutes";
const KV_WEIGHT_UNIT: &str = "weight.unit";
pub(crate) const KV_GAMIFICATION_STATE: &str = "gamification.state";

pub const DEFAULT_WATER_GOAL_ML: i64 = 2250;
pub const DEFAULT_SLEEP_GOAL_HOURS: i64 = 8;
pub const DEFAULT_BEDTIME_MINUTES: i64 = 22 * 60;
pub const DEFAULT_WAKETIME_MINUTES: i64 = 7 * 60;

const MINUTES_PER_DAY: i64 = 24 * 60;

fn db_path(app_dir: &Path) -> PathBuf {
    app_dir.join("nutritrack.sqlite3")
}

pub fn open(app_dir: &Path) -> Result<Connection> {
    fs::create_dir_all(app_dir)?;
    let conn = Connection::open(db_path(app_dir))?;
    migrate(&conn)?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<()> {
    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
        )?;
        conn.execute_batch("PRAGMA user_version = 1;")?;
    }
    Ok(())
}

pub(crate) fn kv_get_string(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        r#"SELECT value FROM kv WHERE key = ?1"#,
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn kv_set_string(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"INSERT INTO kv(key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
        params![key, value],
    )?;
    Ok(())
}

fn kv_get_i64(conn: &Connection, key: &str) -> Result<Option<i64>> {
    match kv_get_string(conn, key)? {
        Some(raw) => {
            let value = raw
                .parse::<i64>()
                .map_err(|_| anyhow!("corrupt kv value for {key}: {raw}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn kv_set_i64(conn: &Connection, key: &str, value: i64) -> Result<()> {
    kv_set_string(conn, key, &value.to_string())
}

pub fn water_goal_ml(conn: &Connection) -> Result<i64> {
    Ok(kv_get_i64(conn, KV_WATER_GOAL_ML)?.unwrap_or(DEFAULT_WATER_GOAL_ML))
}

pub fn set_water_goal_ml(conn: &Connection, goal_ml: i64) -> Result<()> {
    if goal_ml <= 0 {
        return Err(anyhow!("water goal must be positive, got {goal_ml}"));
    }
    kv_set_i64(conn, KV_WATER_GOAL_ML, goal_ml)
}

pub fn sleep_goal_hours(conn: &Connection) -> Result<i64> {
    Ok(kv_get_i64(conn, KV_SLEEP_GOAL_HOURS)?.unwrap_or(DEFAULT_SLEEP_GOAL_HOURS))
}

pub fn set_sleep_goal_hours(conn: &Connection, hours: i64) -> Result<()> {
    if !(1..=24).contains(&hours) {
        return Err(anyhow!("sleep goal must be 1..=24 hours, got {hours}"));
    }
    kv_set_i64(conn, KV_SLEEP_GOAL_HOURS, hours)
}

/// Bedtime and waketime as minutes-of-day, both in local clock time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SleepSchedule {
    pub bedtime_minutes: i64,
    pub waketime_minutes: i64,
}

pub fn sleep_schedule(conn: &Connection) -> Result<SleepSchedule> {
    Ok(SleepSchedule {
        bedtime_minutes: kv_get_i64(conn, KV_SLEEP_BEDTIME_MINUTES)?
            .unwrap_or(DEFAULT_BEDTIME_MINUTES),
        waketime_minutes: kv_get_i64(conn, KV_SLEEP_WAKETIME_MINUTES)?
            .unwrap_or(DEFAULT_WAKETIME_MINUTES),
    })
}

pub fn set_sleep_schedule(conn: &Connection, schedule: &SleepSchedule) -> Result<()> {
    for minutes in [schedule.bedtime_minutes, schedule.waketime_minutes] {
        if !(0..MINUTES_PER_DAY).contains(&minutes) {
            return Err(anyhow!("schedule time out of range: {minutes} minutes"));
        }
    }
    kv_set_i64(conn, KV_SLEEP_BEDTIME_MINUTES, schedule.bedtime_minutes)?;
    kv_set_i64(conn, KV_SLEEP_WAKETIME_MINUTES, schedule.waketime_minutes)
}

pub fn weight_unit(conn: &Connection) -> Result<String> {
    Ok(kv_get_string(conn, KV_WEIGHT_UNIT)?.unwrap_or_else(|| "kg".to_string()))
}

pub fn set_weight_unit(conn: &Connection, unit: &str) -> Result<()> {
    if unit != "kg" && unit != "lbs" {
        return Err(anyhow!("unsupported weight unit: {unit}"));
    }
    kv_set_string(conn, KV_WEIGHT_UNIT, unit)
}
