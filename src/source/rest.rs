use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderValue;
use serde_json::Value;

use super::LogSource;

// The stores never enforce timeouts themselves; the boundary does, so a
// hanging backend cannot leave a spinner stuck forever.
const REMOTE_TIMEOUT_SECONDS: u64 = 15;

pub fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table)
}

/// Query string for an owner-scoped select, PostgREST operator syntax.
/// Range bounds are inclusive on both ends.
pub fn select_query(
    ts_field: &str,
    owner_id: &str,
    range: Option<(i64, i64)>,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("select".to_string(), "*".to_string()),
        ("owner_id".to_string(), format!("eq.{owner_id}")),
    ];
    if let Some((start, end)) = range {
        query.push((ts_field.to_string(), format!("gte.{start}")));
        query.push((ts_field.to_string(), format!("lte.{end}")));
    }
    query.push(("order".to_string(), format!("{ts_field}.desc")));
    query
}

/// Remote log source speaking a PostgREST-style row API.
pub struct RestLogSource {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl RestLogSource {
    pub fn new(base_url: String, api_key: String, access_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            access_token,
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECONDS))
    }

    fn expect_rows(resp: reqwest::blocking::Response, table: &str) -> Result<Vec<Value>> {
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("log source request failed for {table}: {status}"));
        }
        let rows: Vec<Value> = resp.json()?;
        Ok(rows)
    }

    fn expect_single_row(resp: reqwest::blocking::Response, table: &str) -> Result<Value> {
        let mut rows = Self::expect_rows(resp, table)?;
        if rows.is_empty() {
            return Err(anyhow!("log source returned no row for {table}"));
        }
        Ok(rows.swap_remove(0))
    }
}

impl LogSource for RestLogSource {
    fn insert(&self, table: &str, _ts_field: &str, row: Value) -> Result<Value> {
        let resp = self
            .request(self.client.post(table_url(&self.base_url, table)))
            .header("Prefer", HeaderValue::from_static("return=representation"))
            .json(&row)
            .send()?;
        Self::expect_single_row(resp, table)
    }

    fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        let resp = self
            .request(self.client.delete(table_url(&self.base_url, table)))
            .query(&[("id", format!("eq.{id}"))])
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("log source delete failed for {table}: {status}"));
        }
        // A delete that matched nothing still returns success; that is fine.
        Ok(())
    }

    fn select_by_owner(
        &self,
        table: &str,
        ts_field: &str,
        owner_id: &str,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<Value>> {
        let resp = self
            .request(self.client.get(table_url(&self.base_url, table)))
            .query(&select_query(ts_field, owner_id, range))
            .send()?;
        Self::expect_rows(resp, table)
    }

    fn upsert_by_key(&self, table: &str, row: Value) -> Result<Value> {
        let resp = self
            .request(self.client.post(table_url(&self.base_url, table)))
            .header(
                "Prefer",
                HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
            )
            .json(&row)
            .send()?;
        Self::expect_single_row(resp, table)
    }
}

#[cfg(test)]
mod tests {
    use super::{select_query, table_url};

    #[test]
    fn table_url_trims_trailing_slash() {
        assert_eq!(
            table_url("https://api.example.com/", "water_logs"),
            "https://api.example.com/rest/v1/water_logs"
        );
        assert_eq!(
            table_url("https://api.example.com", "food_logs"),
            "https://api.example.com/rest/v1/food_logs"
        );
    }

    #[test]
    fn select_query_without_range_orders_descending() {
        let query = select_query("logged_at_ms", "user-1", None);
        assert_eq!(
            query,
            vec![
                ("select".to_string(), "*".to_string()),
                ("owner_id".to_string(), "eq.user-1".to_string()),
                ("order".to_string(), "logged_at_ms.desc".to_string()),
            ]
        );
    }

    #[test]
    fn select_query_range_bounds_are_inclusive() {
        let query = select_query("performed_at_ms", "user-1", Some((100, 200)));
        assert!(query.contains(&("performed_at_ms".to_string(), "gte.100".to_string())));
        assert!(query.contains(&("performed_at_ms".to_string(), "lte.200".to_string())));
    }
}
