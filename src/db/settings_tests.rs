use tempfile::tempdir;

use super::*;

#[test]
fn fresh_database_serves_defaults() {
    let dir = tempdir().expect("tempdir");
    let conn = open(dir.path()).expect("open");

    assert_eq!(water_goal_ml(&conn).expect("goal"), DEFAULT_WATER_GOAL_ML);
    assert_eq!(sleep_goal_hours(&conn).expect("goal"), DEFAULT_SLEEP_GOAL_HOURS);
    assert_eq!(
        sleep_schedule(&conn).expect("schedule"),
        SleepSchedule {
            bedtime_minutes: DEFAULT_BEDTIME_MINUTES,
            waketime_minutes: DEFAULT_WAKETIME_MINUTES,
        }
    );
    assert_eq!(weight_unit(&conn).expect("unit"), "kg");
}

#[test]
fn settings_survive_reopening_the_database() {
    let dir = tempdir().expect("tempdir");

    {
        let conn = open(dir.path()).expect("open");
        set_water_goal_ml(&conn, 3000).expect("set goal");
        set_sleep_goal_hours(&conn, 7).expect("set goal");
        set_sleep_schedule(
            &conn,
            &SleepSchedule {
                bedtime_minutes: 23 * 60,
                waketime_minutes: 6 * 60 + 30,
            },
        )
        .expect("set schedule");
        set_weight_unit(&conn, "lbs").expect("set unit");
    }

    let conn = open(dir.path()).expect("reopen");
    assert_eq!(water_goal_ml(&conn).expect("goal"), 3000);
    assert_eq!(sleep_goal_hours(&conn).expect("goal"), 7);
    assert_eq!(
        sleep_schedule(&conn).expect("schedule"),
        SleepSchedule {
            bedtime_minutes: 23 * 60,
            waketime_minutes: 6 * 60 + 30,
        }
    );
    assert_eq!(weight_unit(&conn).expect("unit"), "lbs");
}

#[test]
fn invalid_settings_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let conn = open(dir.path()).expect("open");

    assert!(set_water_goal_ml(&conn, 0).is_err());
    assert!(set_water_goal_ml(&conn, -100).is_err());
    assert!(set_sleep_goal_hours(&conn, 0).is_err());
    assert!(set_sleep_goal_hours(&conn, 25).is_err());
    assert!(set_weight_unit(&conn, "stone").is_err());
    assert!(set_sleep_schedule(
        &conn,
        &SleepSchedule {
            bedtime_minutes: 24 * 60,
            waketime_minutes: 7 * 60,
        }
    )
    .is_err());

    // Rejected writes leave the defaults in place.
    assert_eq!(water_goal_ml(&conn).expect("goal"), DEFAULT_WATER_GOAL_ML);
    assert_eq!(weight_unit(&conn).expect("unit"), "kg");
}

#[test]
fn kv_set_overwrites_previous_value() {
    let dir = tempdir().expect("tempdir");
    let conn = open(dir.path()).expect("open");

    kv_set_string(&conn, "k", "a").expect("set");
    kv_set_string(&conn, "k", "b").expect("set");
    assert_eq!(kv_get_string(&conn, "k").expect("get"), Some("b".to_string()));
    assert_eq!(kv_get_string(&conn, "missing").expect("get"), None);
}
