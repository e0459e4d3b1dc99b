//! The five log domains and their aggregate derivations.
//!
//! Aggregates are pure reductions over the dated sublist only. They are not
//! memoized: a day's list is at most a few dozen records, so recomputing on
//! every read is cheaper than getting invalidation wrong.

use serde::{Deserialize, Serialize};

use super::LogRecord;

pub const LBS_PER_KG: f64 = 2.20462;
pub const KG_PER_LB: f64 = 0.453592;

const MINUTES_PER_DAY: i64 = 24 * 60;

// ---------------------------------------------------------------------------
// Nutrition

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodLog {
    pub id: String,
    pub owner_id: String,
    pub food_name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub meal_type: String,
    pub logged_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FoodLogPayload {
    pub food_name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub meal_type: String,
}

impl LogRecord for FoodLog {
    const TABLE: &'static str = "food_logs";
    type Payload = FoodLogPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn logged_at_ms(&self) -> i64 {
        self.logged_at_ms
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

pub fn nutrition_totals(logs: &[FoodLog]) -> MacroTotals {
    logs.iter().fold(MacroTotals::default(), |acc, log| MacroTotals {
        calories: acc.calories + log.calories,
        protein_g: acc.protein_g + log.protein_g,
        carbs_g: acc.carbs_g + log.carbs_g,
        fats_g: acc.fats_g + log.fats_g,
    })
}

pub fn calories_remaining(daily_goal: f64, consumed: f64, burned: f64) -> f64 {
    daily_goal - consumed + burned
}

// ---------------------------------------------------------------------------
// Activity

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: String,
    pub owner_id: String,
    pub activity_type: String,
    pub duration_minutes: i64,
    pub calories_burned: f64,
    pub activity_group: Option<String>,
    pub performed_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityLogPayload {
    pub activity_type: String,
    pub duration_minutes: i64,
    pub calories_burned: f64,
    pub activity_group: Option<String>,
}

impl LogRecord for ActivityLog {
    const TABLE: &'static str = "workouts";
    const TS_FIELD: &'static str = "performed_at_ms";
    type Payload = ActivityLogPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn logged_at_ms(&self) -> i64 {
        self.performed_at_ms
    }
}

pub fn calories_burned_total(logs: &[ActivityLog]) -> f64 {
    logs.iter().map(|log| log.calories_burned).sum()
}

pub fn active_minutes_total(logs: &[ActivityLog]) -> i64 {
    logs.iter().map(|log| log.duration_minutes).sum()
}

// ---------------------------------------------------------------------------
// Water

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterLog {
    pub id: String,
    pub owner_id: String,
    pub amount_ml: i64,
    pub logged_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaterLogPayload {
    pub amount_ml: i64,
}

impl LogRecord for WaterLog {
    const TABLE: &'static str = "water_logs";
    type Payload = WaterLogPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn logged_at_ms(&self) -> i64 {
        self.logged_at_ms
    }
}

pub fn water_total_ml(logs: &[WaterLog]) -> i64 {
    logs.iter().map(|log| log.amount_ml).sum()
}

/// Percentage of the daily goal reached, capped at 100. A missing or zero
/// goal reads as 0 rather than dividing by zero.
pub fn water_goal_percentage(total_ml: i64, goal_ml: i64) -> f64 {
    if goal_ml <= 0 {
        return 0.0;
    }
    (total_ml as f64 / goal_ml as f64 * 100.0).min(100.0)
}

// ---------------------------------------------------------------------------
// Sleep

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SleepLog {
    pub id: String,
    pub owner_id: String,
    pub duration_minutes: i64,
    pub quality: String,
    pub notes: Option<String>,
    pub logged_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SleepLogPayload {
    pub duration_minutes: i64,
    pub quality: String,
    pub notes: Option<String>,
}

impl LogRecord for SleepLog {
    const TABLE: &'static str = "sleep_logs";
    type Payload = SleepLogPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn logged_at_ms(&self) -> i64 {
        self.logged_at_ms
    }
}

/// Sleep is a point-in-time domain: the per-day read is the most recent
/// record for that day, or none at all. "No log yet" is not an error.
pub fn latest_sleep_log(logs: &[SleepLog]) -> Option<&SleepLog> {
    logs.first()
}

/// Minutes between a bedtime and waketime given as minutes-of-day. A wake
/// clock-time at or before the bed clock-time means the next day, so
/// 23:00 -> 07:00 is 8 hours, not -16.
pub fn schedule_duration_minutes(bedtime_minutes: i64, waketime_minutes: i64) -> i64 {
    let mut duration = waketime_minutes - bedtime_minutes;
    if duration <= 0 {
        duration += MINUTES_PER_DAY;
    }
    duration
}

// ---------------------------------------------------------------------------
// Weight

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightLog {
    pub id: String,
    pub owner_id: String,
    pub weight_kg: f64,
    pub unit: Option<String>,
    pub logged_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightLogPayload {
    pub weight_kg: f64,
}

impl LogRecord for WeightLog {
    const TABLE: &'static str = "weight_logs";
    type Payload = WeightLogPayload;

    fn id(&self) -> &str {
        &self.id
    }

    fn logged_at_ms(&self) -> i64 {
        self.logged_at_ms
    }
}

pub fn current_weight_kg(logs: &[WeightLog]) -> Option<f64> {
    logs.first().map(|log| log.weight_kg)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn kg_to_lbs(kg: f64) -> f64 {
    round_tenth(kg * LBS_PER_KG)
}

pub fn lbs_to_kg(lbs: f64) -> f64 {
    lbs * KG_PER_LB
}

/// Weight in the user's display unit. Storage is always kilograms.
pub fn display_weight(weight_kg: f64, unit: &str) -> f64 {
    if unit == "lbs" {
        kg_to_lbs(weight_kg)
    } else {
        weight_kg
    }
}
