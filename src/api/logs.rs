use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde_json::json;

use crate::datetime::{day_key, device_offset, local_today};
use crate::db;
use crate::gamification;
use crate::logstore::coordinator::DateCursorCoordinator;
use crate::logstore::domains::{
    self, ActivityLog, ActivityLogPayload, FoodLog, FoodLogPayload, MacroTotals, SleepLog,
    SleepLogPayload, WaterLog, WaterLogPayload, WeightLog, WeightLogPayload,
};
use crate::logstore::DatedLogStore;
use crate::source::rest::RestLogSource;
use crate::source::LogSource;

struct LogRuntime {
    nutrition: Arc<DatedLogStore<FoodLog>>,
    activity: Arc<DatedLogStore<ActivityLog>>,
    water: Arc<DatedLogStore<WaterLog>>,
    sleep: Arc<DatedLogStore<SleepLog>>,
    weight: Arc<DatedLogStore<WeightLog>>,
    coordinator: DateCursorCoordinator,
}

static RUNTIME: OnceLock<LogRuntime> = OnceLock::new();

fn build_runtime(source: Arc<dyn LogSource>) -> Result<LogRuntime> {
    let nutrition = Arc::new(DatedLogStore::<FoodLog>::new(source.clone()));
    let activity = Arc::new(DatedLogStore::<ActivityLog>::new(source.clone()));
    let water = Arc::new(DatedLogStore::<WaterLog>::new(source.clone()));
    let sleep = Arc::new(DatedLogStore::<SleepLog>::new(source.clone()));

    // Weight denormalizes its newest value into the profile row so screens
    // reading "current weight from profile" stay consistent without a
    // refetch. A failed push never fails the log insert itself.
    let profile_source = source.clone();
    let weight = Arc::new(
        DatedLogStore::<WeightLog>::new(source).with_insert_hook(
            move |record: &WeightLog| {
                let pushed = profile_source.upsert_by_key(
                    "user_profiles",
                    json!({ "id": record.owner_id, "current_weight_kg": record.weight_kg }),
                );
                if let Err(err) = pushed {
                    log::warn!("failed to sync weight into profile: {err:#}");
                }
            },
        ),
    );

    let coordinator = DateCursorCoordinator::new(local_today(device_offset()));
    coordinator.register(nutrition.clone())?;
    coordinator.register(activity.clone())?;
    coordinator.register(water.clone())?;
    coordinator.register(sleep.clone())?;
    coordinator.register(weight.clone())?;

    Ok(LogRuntime {
        nutrition,
        activity,
        water,
        sleep,
        weight,
        coordinator,
    })
}

fn runtime() -> Result<&'static LogRuntime> {
    RUNTIME
        .get()
        .ok_or_else(|| anyhow!("log stores not initialized; call logs_init first"))
}

fn parse_day(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| anyhow!("invalid day: {day}"))
}

fn init_with_source(source: Arc<dyn LogSource>) -> Result<()> {
    let built = build_runtime(source)?;
    RUNTIME
        .set(built)
        .map_err(|_| anyhow!("log stores already initialized"))
}

#[flutter_rust_bridge::frb]
pub fn logs_init(base_url: String, api_key: String, access_token: String) -> Result<()> {
    init_with_source(Arc::new(RestLogSource::new(base_url, api_key, access_token)))
}

/// Move every domain's date cursor in lockstep. Callers refetch per domain.
#[flutter_rust_bridge::frb]
pub fn logs_set_selected_day(day: String) -> Result<()> {
    runtime()?.coordinator.set_day(parse_day(&day)?)
}

#[flutter_rust_bridge::frb]
pub fn logs_selected_day() -> Result<String> {
    Ok(day_key(runtime()?.coordinator.day()?))
}

// ---------------------------------------------------------------------------
// Nutrition

#[flutter_rust_bridge::frb]
pub fn nutrition_fetch_all_logs(owner_id: String) -> Result<()> {
    runtime()?.nutrition.fetch_all_logs(&owner_id)
}

#[flutter_rust_bridge::frb]
pub fn nutrition_fetch_date_logs(owner_id: String, day: Option<String>) -> Result<()> {
    let day = day.as_deref().map(parse_day).transpose()?;
    runtime()?.nutrition.fetch_date_logs(&owner_id, day)
}

#[flutter_rust_bridge::frb]
pub fn nutrition_add_log(
    app_dir: String,
    owner_id: String,
    food_name: String,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fats_g: f64,
    meal_type: String,
) -> Result<FoodLog> {
    let record = runtime()?.nutrition.add_log(
        &FoodLogPayload {
            food_name,
            calories,
            protein_g,
            carbs_g,
            fats_g,
            meal_type,
        },
        &owner_id,
    )?;

    // Meal logging is the one event wired into the streak tracker. A failed
    // streak update must not mask the committed insert.
    if let Err(err) = record_meal_streak(&app_dir) {
        log::warn!("failed to record streak for meal log: {err:#}");
    }

    Ok(record)
}

fn record_meal_streak(app_dir: &str) -> Result<()> {
    let conn = db::open(Path::new(app_dir))?;
    let mut state = gamification::load(&conn)?;
    state.record_activity_today(device_offset());
    gamification::save(&conn, &state)
}

#[flutter_rust_bridge::frb]
pub fn nutrition_delete_log(id: String) -> Result<()> {
    runtime()?.nutrition.delete_log(&id)
}

#[flutter_rust_bridge::frb]
pub fn nutrition_date_logs() -> Result<Vec<FoodLog>> {
    runtime()?.nutrition.date_logs()
}

#[flutter_rust_bridge::frb]
pub fn nutrition_is_loading() -> Result<bool> {
    runtime()?.nutrition.is_loading()
}

#[flutter_rust_bridge::frb]
pub fn nutrition_totals_for_date() -> Result<MacroTotals> {
    Ok(domains::nutrition_totals(&runtime()?.nutrition.date_logs()?))
}

/// Goal minus calories eaten today, plus calories burned today.
#[flutter_rust_bridge::frb]
pub fn calories_remaining_for_date(daily_goal: f64) -> Result<f64> {
    let rt = runtime()?;
    let consumed = domains::nutrition_totals(&rt.nutrition.date_logs()?).calories;
    let burned = domains::calories_burned_total(&rt.activity.date_logs()?);
    Ok(domains::calories_remaining(daily_goal, consumed, burned))
}

// ---------------------------------------------------------------------------
// Activity

#[flutter_rust_bridge::frb]
pub fn activity_fetch_all_logs(owner_id: String) -> Result<()> {
    runtime()?.activity.fetch_all_logs(&owner_id)
}

#[flutter_rust_bridge::frb]
pub fn activity_fetch_date_logs(owner_id: String, day: Option<String>) -> Result<()> {
    let day = day.as_deref().map(parse_day).transpose()?;
    runtime()?.activity.fetch_date_logs(&owner_id, day)
}

#[flutter_rust_bridge::frb]
pub fn activity_add_log(
    owner_id: String,
    activity_type: String,
    duration_minutes: i64,
    calories_burned: f64,
    activity_group: Option<String>,
) -> Result<ActivityLog> {
    runtime()?.activity.add_log(
        &ActivityLogPayload {
            activity_type,
            duration_minutes,
            calories_burned,
            activity_group,
        },
        &owner_id,
    )
}

#[flutter_rust_bridge::frb]
pub fn activity_delete_log(id: String) -> Result<()> {
    runtime()?.activity.delete_log(&id)
}

#[flutter_rust_bridge::frb]
pub fn activity_date_logs() -> Result<Vec<ActivityLog>> {
    runtime()?.activity.date_logs()
}

#[flutter_rust_bridge::frb]
pub fn activity_is_loading() -> Result<bool> {
    runtime()?.activity.is_loading()
}

#[flutter_rust_bridge::frb]
pub fn activity_calories_burned_for_date() -> Result<f64> {
    Ok(domains::calories_burned_total(&runtime()?.activity.date_logs()?))
}

// ---------------------------------------------------------------------------
// Water

#[flutter_rust_bridge::frb]
pub fn water_fetch_all_logs(owner_id: String) -> Result<()> {
    runtime()?.water.fetch_all_logs(&owner_id)
}

#[flutter_rust_bridge::frb]
pub fn water_fetch_date_logs(owner_id: String, day: Option<String>) -> Result<()> {
    let day = day.as_deref().map(parse_day).transpose()?;
    runtime()?.water.fetch_date_logs(&owner_id, day)
}

#[flutter_rust_bridge::frb]
pub fn water_add_log(owner_id: String, amount_ml: i64) -> Result<WaterLog> {
    runtime()?.water.add_log(&WaterLogPayload { amount_ml }, &owner_id)
}

#[flutter_rust_bridge::frb]
pub fn water_delete_log(id: String) -> Result<()> {
    runtime()?.water.delete_log(&id)
}

#[flutter_rust_bridge::frb]
pub fn water_date_logs() -> Result<Vec<WaterLog>> {
    runtime()?.water.date_logs()
}

#[flutter_rust_bridge::frb]
pub fn water_is_loading() -> Result<bool> {
    runtime()?.water.is_loading()
}

#[flutter_rust_bridge::frb]
pub fn water_total_for_date() -> Result<i64> {
    Ok(domains::water_total_ml(&runtime()?.water.date_logs()?))
}

/// Percentage of the persisted daily goal reached on the selected day.
#[flutter_rust_bridge::frb]
pub fn water_progress_for_date(app_dir: String) -> Result<f64> {
    let total = domains::water_total_ml(&runtime()?.water.date_logs()?);
    let conn = db::open(Path::new(&app_dir))?;
    Ok(domains::water_goal_percentage(total, db::water_goal_ml(&conn)?))
}

// ---------------------------------------------------------------------------
// Sleep

#[flutter_rust_bridge::frb]
pub fn sleep_fetch_all_logs(owner_id: String) -> Result<()> {
    runtime()?.sleep.fetch_all_logs(&owner_id)
}

#[flutter_rust_bridge::frb]
pub fn sleep_fetch_date_logs(owner_id: String, day: Option<String>) -> Result<()> {
    let day = day.as_deref().map(parse_day).transpose()?;
    runtime()?.sleep.fetch_date_logs(&owner_id, day)
}

#[flutter_rust_bridge::frb]
pub fn sleep_add_log(
    owner_id: String,
    duration_minutes: i64,
    quality: String,
    notes: Option<String>,
) -> Result<SleepLog> {
    runtime()?.sleep.add_log(
        &SleepLogPayload {
            duration_minutes,
            quality,
            notes,
        },
        &owner_id,
    )
}

#[flutter_rust_bridge::frb]
pub fn sleep_delete_log(id: String) -> Result<()> {
    runtime()?.sleep.delete_log(&id)
}

/// The day's sleep log, or none when nothing was logged yet. Sleep is a
/// point-in-time domain; "no log for this date" is not an error.
#[flutter_rust_bridge::frb]
pub fn sleep_log_for_date() -> Result<Option<SleepLog>> {
    Ok(domains::latest_sleep_log(&runtime()?.sleep.date_logs()?).cloned())
}

#[flutter_rust_bridge::frb]
pub fn sleep_is_loading() -> Result<bool> {
    runtime()?.sleep.is_loading()
}

// ---------------------------------------------------------------------------
// Weight

#[flutter_rust_bridge::frb]
pub fn weight_fetch_all_logs(owner_id: String) -> Result<()> {
    runtime()?.weight.fetch_all_logs(&owner_id)
}

#[flutter_rust_bridge::frb]
pub fn weight_add_log(owner_id: String, weight_kg: f64) -> Result<WeightLog> {
    runtime()?.weight.add_log(&WeightLogPayload { weight_kg }, &owner_id)
}

#[flutter_rust_bridge::frb]
pub fn weight_delete_log(id: String) -> Result<()> {
    runtime()?.weight.delete_log(&id)
}

#[flutter_rust_bridge::frb]
pub fn weight_all_logs() -> Result<Vec<WeightLog>> {
    runtime()?.weight.all_logs()
}

#[flutter_rust_bridge::frb]
pub fn weight_is_loading() -> Result<bool> {
    runtime()?.weight.is_loading()
}

/// Most recent weight in the user's display unit. Storage stays kilograms.
#[flutter_rust_bridge::frb]
pub fn weight_current(app_dir: String) -> Result<Option<f64>> {
    let current = domains::current_weight_kg(&runtime()?.weight.all_logs()?);
    let conn = db::open(Path::new(&app_dir))?;
    let unit = db::weight_unit(&conn)?;
    Ok(current.map(|kg| domains::display_weight(kg, &unit)))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::source::InMemoryLogSource;

    use super::*;

    #[test]
    fn nutrition_add_log_succeeds_even_when_the_streak_update_cannot() {
        let source = Arc::new(InMemoryLogSource::new());
        init_with_source(source.clone()).expect("init");

        // A file where the app dir should be makes the settings db unopenable,
        // so the streak side-effect fails while the insert commits.
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write");

        let record = nutrition_add_log(
            blocker.to_string_lossy().into_owned(),
            "u1".to_string(),
            "Oatmeal".to_string(),
            300.0,
            10.0,
            50.0,
            6.0,
            "breakfast".to_string(),
        )
        .expect("add");

        assert_eq!(record.food_name, "Oatmeal");
        assert_eq!(nutrition_date_logs().expect("dated")[0], record);
    }
}
