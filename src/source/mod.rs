use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::datetime::now_ms;

pub mod rest;

/// Boundary to the remote per-domain log tables. Every call may fail or hang;
/// callers decide whether a failure is swallowed (cache population) or
/// propagated (mutation).
///
/// Rows are JSON objects. `ts_field` names the table's timestamp column; the
/// source assigns it (and `id`) on insert when the submitted row omits them.
/// Range bounds are inclusive epoch milliseconds and results are ordered
/// descending by `ts_field`.
pub trait LogSource: Send + Sync {
    fn insert(&self, table: &str, ts_field: &str, row: Value) -> Result<Value>;
    fn delete_by_id(&self, table: &str, id: &str) -> Result<()>;
    fn select_by_owner(
        &self,
        table: &str,
        ts_field: &str,
        owner_id: &str,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<Value>>;
    fn upsert_by_key(&self, table: &str, row: Value) -> Result<Value>;
}

/// In-process stand-in for the remote backend, used by tests and local demos.
pub struct InMemoryLogSource {
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
    clock_override_ms: Mutex<Option<i64>>,
    fail_remote: Mutex<bool>,
}

impl InMemoryLogSource {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            clock_override_ms: Mutex::new(None),
            fail_remote: Mutex::new(false),
        }
    }

    /// Pin the timestamp assigned to inserted rows. Test hook.
    pub fn set_clock_ms(&self, ts_ms: Option<i64>) -> Result<()> {
        let mut clock = self
            .clock_override_ms
            .lock()
            .map_err(|_| anyhow!("poisoned lock"))?;
        *clock = ts_ms;
        Ok(())
    }

    /// Make every subsequent call fail, simulating a network outage. Test hook.
    pub fn set_fail_remote(&self, fail: bool) -> Result<()> {
        let mut flag = self
            .fail_remote
            .lock()
            .map_err(|_| anyhow!("poisoned lock"))?;
        *flag = fail;
        Ok(())
    }

    fn check_remote(&self) -> Result<()> {
        let flag = self
            .fail_remote
            .lock()
            .map_err(|_| anyhow!("poisoned lock"))?;
        if *flag {
            return Err(anyhow!("remote source unavailable"));
        }
        Ok(())
    }

    fn assigned_ts_ms(&self) -> Result<i64> {
        let clock = self
            .clock_override_ms
            .lock()
            .map_err(|_| anyhow!("poisoned lock"))?;
        Ok(clock.unwrap_or_else(now_ms))
    }
}

impl Default for InMemoryLogSource {
    fn default() -> Self {
        Self::new()
    }
}

fn row_str<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

fn row_i64(row: &Value, field: &str) -> Option<i64> {
    row.get(field).and_then(Value::as_i64)
}

impl LogSource for InMemoryLogSource {
    fn insert(&self, table: &str, ts_field: &str, row: Value) -> Result<Value> {
        self.check_remote()?;

        let mut row = row;
        let ts_ms = self.assigned_ts_ms()?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| anyhow!("insert row must be a JSON object"))?;
        if !obj.contains_key("id") {
            obj.insert("id".to_string(), Value::from(uuid::Uuid::new_v4().to_string()));
        }
        if !obj.contains_key(ts_field) {
            obj.insert(ts_field.to_string(), Value::from(ts_ms));
        }

        let mut tables = self.tables.lock().map_err(|_| anyhow!("poisoned lock"))?;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        self.check_remote()?;

        let mut tables = self.tables.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if let Some(rows) = tables.get_mut(table) {
            // Deleting a row that does not exist is not an error.
            rows.retain(|row| row_str(row, "id") != Some(id));
        }
        Ok(())
    }

    fn select_by_owner(
        &self,
        table: &str,
        ts_field: &str,
        owner_id: &str,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<Value>> {
        self.check_remote()?;

        let tables = self.tables.lock().map_err(|_| anyhow!("poisoned lock"))?;
        let mut out: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row_str(row, "owner_id") == Some(owner_id))
                    .filter(|row| match range {
                        Some((start, end)) => row_i64(row, ts_field)
                            .map(|ts| ts >= start && ts <= end)
                            .unwrap_or(false),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        out.sort_by_key(|row| std::cmp::Reverse(row_i64(row, ts_field).unwrap_or(i64::MIN)));
        Ok(out)
    }

    fn upsert_by_key(&self, table: &str, row: Value) -> Result<Value> {
        self.check_remote()?;

        let id = row_str(&row, "id")
            .ok_or_else(|| anyhow!("upsert row must carry an id"))?
            .to_string();

        let mut tables = self.tables.lock().map_err(|_| anyhow!("poisoned lock"))?;
        let rows = tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| row_str(r, "id") == Some(&id)) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let source = InMemoryLogSource::new();
        source.set_clock_ms(Some(1_000)).expect("clock");

        let row = source
            .insert("water_logs", "logged_at_ms", json!({ "owner_id": "u1", "amount_ml": 250 }))
            .expect("insert");

        assert!(row["id"].as_str().is_some());
        assert_eq!(row["logged_at_ms"].as_i64(), Some(1_000));
    }

    #[test]
    fn select_filters_by_owner_and_inclusive_range_descending() {
        let source = InMemoryLogSource::new();
        for (owner, ts) in [("u1", 100), ("u1", 300), ("u1", 200), ("u2", 250)] {
            source
                .insert(
                    "water_logs",
                    "logged_at_ms",
                    json!({ "owner_id": owner, "logged_at_ms": ts, "amount_ml": 1 }),
                )
                .expect("insert");
        }

        let rows = source
            .select_by_owner("water_logs", "logged_at_ms", "u1", Some((100, 300)))
            .expect("select");
        let ts: Vec<i64> = rows.iter().filter_map(|r| r["logged_at_ms"].as_i64()).collect();
        assert_eq!(ts, vec![300, 200, 100]);
    }

    #[test]
    fn delete_of_missing_row_is_not_an_error() {
        let source = InMemoryLogSource::new();
        source.delete_by_id("water_logs", "nope").expect("delete");
    }

    #[test]
    fn upsert_replaces_row_with_same_id() {
        let source = InMemoryLogSource::new();
        source
            .upsert_by_key("user_profiles", json!({ "id": "u1", "current_weight_kg": 70.0 }))
            .expect("upsert");
        source
            .upsert_by_key("user_profiles", json!({ "id": "u1", "current_weight_kg": 71.5 }))
            .expect("upsert");

        let rows = source
            .select_by_owner("user_profiles", "logged_at_ms", "u1", None)
            .expect("select");
        // Profile rows are keyed by id, not owner_id; select by owner finds nothing.
        assert!(rows.is_empty());

        let tables = source.tables.lock().expect("lock");
        let rows = tables.get("user_profiles").expect("table");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["current_weight_kg"].as_f64(), Some(71.5));
    }

    #[test]
    fn failure_injection_fails_every_call() {
        let source = InMemoryLogSource::new();
        source.set_fail_remote(true).expect("fail");

        assert!(source
            .insert("water_logs", "logged_at_ms", json!({ "owner_id": "u1" }))
            .is_err());
        assert!(source
            .select_by_owner("water_logs", "logged_at_ms", "u1", None)
            .is_err());
        assert!(source.delete_by_id("water_logs", "x").is_err());
    }
}
