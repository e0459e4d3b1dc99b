//! Date-partitioned log caches.
//!
//! Each domain (nutrition, activity, water, sleep, weight) owns one
//! [`DatedLogStore`]: a local mirror of that user's remote log table plus a
//! sublist scoped to the selected calendar day. List data is never persisted
//! locally; it is a cache of the remote source and is refetched after restart.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::{FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::datetime::{day_bounds_ms, device_offset, local_day, local_today};
use crate::source::LogSource;

pub mod coordinator;
pub mod domains;


/// One row of a domain's remote log table. Payload fields are opaque to the
/// cache; it only ever looks at the id and the timestamp.
pub trait LogRecord: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const TABLE: &'static str;
    const TS_FIELD: &'static str = "logged_at_ms";

    /// Insert shape: the payload without `id`, `owner_id` or the timestamp,
    /// which the source assigns.
    type Payload: Serialize;

    fn id(&self) -> &str;
    fn logged_at_ms(&self) -> i64;
}

struct CacheState<R> {
    all_logs: Vec<R>,
    date_logs: Vec<R>,
    selected_day: NaiveDate,
    is_loading: bool,
    // Monotonic per-fetch counters. A fetch commits its response only if no
    // newer fetch (or cursor move, for the dated list) started after it, so a
    // slow response for day A can never overwrite day B's logs.
    all_generation: u64,
    date_generation: u64,
}

pub struct DatedLogStore<R: LogRecord> {
    source: Arc<dyn LogSource>,
    // Re-read on every operation; storing a snapshot would freeze day
    // boundaries across DST transitions and device timezone changes.
    offset_provider: Box<dyn Fn() -> FixedOffset + Send + Sync>,
    insert_hook: Option<Box<dyn Fn(&R) + Send + Sync>>,
    state: Mutex<CacheState<R>>,
}

fn decode_rows<R: LogRecord>(rows: Vec<Value>) -> Result<Vec<R>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

impl<R: LogRecord> DatedLogStore<R> {
    /// A store tracking the device's current UTC offset for day math.
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        Self::with_offset_provider(source, device_offset)
    }

    pub fn with_offset_provider(
        source: Arc<dyn LogSource>,
        offset_provider: impl Fn() -> FixedOffset + Send + Sync + 'static,
    ) -> Self {
        let today = local_today(offset_provider());
        Self {
            source,
            offset_provider: Box::new(offset_provider),
            insert_hook: None,
            state: Mutex::new(CacheState {
                all_logs: Vec::new(),
                date_logs: Vec::new(),
                selected_day: today,
                is_loading: false,
                all_generation: 0,
                date_generation: 0,
            }),
        }
    }

    /// Pin the offset instead of tracking the device clock. Test seam.
    pub fn with_fixed_offset(source: Arc<dyn LogSource>, offset: FixedOffset) -> Self {
        Self::with_offset_provider(source, move || offset)
    }

    /// Register a side-channel callback run after every committed insert.
    /// The weight domain uses this to push the new weight into the profile
    /// row without the cache knowing the profile's shape.
    pub fn with_insert_hook(mut self, hook: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.insert_hook = Some(Box::new(hook));
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState<R>>> {
        self.state.lock().map_err(|_| anyhow!("poisoned lock"))
    }

    fn set_loading(&self, loading: bool) -> Result<()> {
        self.lock()?.is_loading = loading;
        Ok(())
    }

    fn offset(&self) -> FixedOffset {
        (self.offset_provider)()
    }

    pub fn selected_day(&self) -> Result<NaiveDate> {
        Ok(self.lock()?.selected_day)
    }

    pub fn is_loading(&self) -> Result<bool> {
        Ok(self.lock()?.is_loading)
    }

    pub fn all_logs(&self) -> Result<Vec<R>> {
        Ok(self.lock()?.all_logs.clone())
    }

    pub fn date_logs(&self) -> Result<Vec<R>> {
        Ok(self.lock()?.date_logs.clone())
    }

    /// Move the date cursor. Never fetches: until the caller follows up with
    /// [`fetch_date_logs`](Self::fetch_date_logs), `date_logs` still reflects
    /// the previous day. That staleness window is intentional.
    pub fn set_selected_day(&self, day: NaiveDate) -> Result<()> {
        let mut st = self.lock()?;
        st.selected_day = day;
        st.date_generation = st.date_generation.wrapping_add(1);
        Ok(())
    }

    /// Refresh the full log mirror. Population failures are swallowed here:
    /// stale-but-present data beats an empty screen, so the cache keeps its
    /// last-known-good contents and the failure is only logged.
    pub fn fetch_all_logs(&self, owner_id: &str) -> Result<()> {
        let generation = {
            let mut st = self.lock()?;
            st.is_loading = true;
            st.all_generation = st.all_generation.wrapping_add(1);
            st.all_generation
        };

        let fetched = self
            .source
            .select_by_owner(R::TABLE, R::TS_FIELD, owner_id, None);

        let mut st = self.lock()?;
        st.is_loading = false;
        match fetched.and_then(decode_rows::<R>) {
            Ok(rows) => {
                if st.all_generation == generation {
                    st.all_logs = rows;
                } else {
                    log::debug!("discarding stale {} fetch", R::TABLE);
                }
            }
            Err(err) => log::warn!("failed to fetch {} logs: {err:#}", R::TABLE),
        }
        Ok(())
    }

    /// Refresh the dated sublist for `day`, or for the cursor when omitted.
    /// The response always replaces `date_logs` wholesale (never appended),
    /// and is discarded when the cursor moved or a newer fetch started while
    /// this one was in flight.
    pub fn fetch_date_logs(&self, owner_id: &str, day: Option<NaiveDate>) -> Result<()> {
        let (generation, target_day) = {
            let mut st = self.lock()?;
            st.is_loading = true;
            st.date_generation = st.date_generation.wrapping_add(1);
            (st.date_generation, day.unwrap_or(st.selected_day))
        };

        let (start, end) = day_bounds_ms(self.offset(), target_day);
        let fetched = self
            .source
            .select_by_owner(R::TABLE, R::TS_FIELD, owner_id, Some((start, end)));

        let mut st = self.lock()?;
        st.is_loading = false;
        match fetched.and_then(decode_rows::<R>) {
            Ok(rows) => {
                if st.date_generation == generation {
                    st.date_logs = rows;
                } else {
                    log::debug!("discarding stale {} fetch for {target_day}", R::TABLE);
                }
            }
            Err(err) => log::warn!("failed to fetch {} logs for {target_day}: {err:#}", R::TABLE),
        }
        Ok(())
    }

    /// Insert a log remotely, then prepend the persisted record to `all_logs`
    /// and, when its local calendar day matches the cursor, to `date_logs`.
    /// Unlike fetches, failures propagate: the caller must know whether the
    /// write happened.
    pub fn add_log(&self, payload: &R::Payload, owner_id: &str) -> Result<R> {
        let mut row = serde_json::to_value(payload)?;
        let obj = row
            .as_object_mut()
            .ok_or_else(|| anyhow!("log payload must serialize to a JSON object"))?;
        obj.insert("owner_id".to_string(), Value::from(owner_id));

        self.set_loading(true)?;
        let inserted = self.source.insert(R::TABLE, R::TS_FIELD, row);
        self.set_loading(false)?;

        let record: R = serde_json::from_value(inserted?)?;
        {
            let mut st = self.lock()?;
            st.all_logs.insert(0, record.clone());
            if local_day(self.offset(), record.logged_at_ms()) == st.selected_day {
                st.date_logs.insert(0, record.clone());
            }
        }
        if let Some(hook) = &self.insert_hook {
            hook(&record);
        }
        Ok(record)
    }

    /// Delete a log remotely, then drop it from both lists. Failures
    /// propagate and leave both lists untouched.
    pub fn delete_log(&self, id: &str) -> Result<()> {
        self.set_loading(true)?;
        let deleted = self.source.delete_by_id(R::TABLE, id);
        self.set_loading(false)?;
        deleted?;

        let mut st = self.lock()?;
        st.all_logs.retain(|r| r.id() != id);
        st.date_logs.retain(|r| r.id() != id);
        Ok(())
    }
}
