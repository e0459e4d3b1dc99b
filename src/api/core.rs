use std::path::Path;

use anyhow::Result;

use crate::datetime::device_offset;
use crate::db::{self, SleepSchedule};
use crate::gamification::{self, StreakState};
use crate::logstore::domains;
use crate::vision::{GeminiMealVision, MealAnalysis, MealVision, DEFAULT_BASE_URL};

#[flutter_rust_bridge::frb]
pub fn settings_water_goal_ml(app_dir: String) -> Result<i64> {
    let conn = db::open(Path::new(&app_dir))?;
    db::water_goal_ml(&conn)
}

#[flutter_rust_bridge::frb]
pub fn settings_set_water_goal_ml(app_dir: String, goal_ml: i64) -> Result<()> {
    let conn = db::open(Path::new(&app_dir))?;
    db::set_water_goal_ml(&conn, goal_ml)
}

#[flutter_rust_bridge::frb]
pub fn settings_sleep_goal_hours(app_dir: String) -> Result<i64> {
    let conn = db::open(Path::new(&app_dir))?;
    db::sleep_goal_hours(&conn)
}

#[flutter_rust_bridge::frb]
pub fn settings_set_sleep_goal_hours(app_dir: String, hours: i64) -> Result<()> {
    let conn = db::open(Path::new(&app_dir))?;
    db::set_sleep_goal_hours(&conn, hours)
}

#[flutter_rust_bridge::frb]
pub fn settings_sleep_schedule(app_dir: String) -> Result<SleepSchedule> {
    let conn = db::open(Path::new(&app_dir))?;
    db::sleep_schedule(&conn)
}

#[flutter_rust_bridge::frb]
pub fn settings_set_sleep_schedule(
    app_dir: String,
    bedtime_minutes: i64,
    waketime_minutes: i64,
) -> Result<()> {
    let conn = db::open(Path::new(&app_dir))?;
    db::set_sleep_schedule(
        &conn,
        &SleepSchedule {
            bedtime_minutes,
            waketime_minutes,
        },
    )
}

/// Planned sleep duration from the persisted schedule, wrap-around aware.
#[flutter_rust_bridge::frb]
pub fn settings_sleep_schedule_duration_minutes(app_dir: String) -> Result<i64> {
    let conn = db::open(Path::new(&app_dir))?;
    let schedule = db::sleep_schedule(&conn)?;
    Ok(domains::schedule_duration_minutes(
        schedule.bedtime_minutes,
        schedule.waketime_minutes,
    ))
}

#[flutter_rust_bridge::frb]
pub fn settings_weight_unit(app_dir: String) -> Result<String> {
    let conn = db::open(Path::new(&app_dir))?;
    db::weight_unit(&conn)
}

#[flutter_rust_bridge::frb]
pub fn settings_set_weight_unit(app_dir: String, unit: String) -> Result<()> {
    let conn = db::open(Path::new(&app_dir))?;
    db::set_weight_unit(&conn, &unit)
}

#[flutter_rust_bridge::frb]
pub fn gamification_state(app_dir: String) -> Result<StreakState> {
    let conn = db::open(Path::new(&app_dir))?;
    gamification::load(&conn)
}

#[flutter_rust_bridge::frb]
pub fn gamification_record_activity_today(app_dir: String) -> Result<StreakState> {
    let conn = db::open(Path::new(&app_dir))?;
    let mut state = gamification::load(&conn)?;
    state.record_activity_today(device_offset());
    gamification::save(&conn, &state)?;
    Ok(state)
}

#[flutter_rust_bridge::frb]
pub fn gamification_unlock_badge(app_dir: String, badge_id: String) -> Result<StreakState> {
    let conn = db::open(Path::new(&app_dir))?;
    let mut state = gamification::load(&conn)?;
    state.unlock_badge(&badge_id, crate::datetime::now_ms());
    gamification::save(&conn, &state)?;
    Ok(state)
}

#[flutter_rust_bridge::frb]
pub fn meal_scan_analyze(
    api_key: String,
    model_name: String,
    image_bytes: Vec<u8>,
    mime_type: String,
) -> Result<MealAnalysis> {
    let vision = GeminiMealVision::new(DEFAULT_BASE_URL.to_string(), api_key, model_name);
    vision.analyze_meal_image(&image_bytes, &mime_type)
}
