//! Single owner of the selected calendar day.
//!
//! Several screens change the active date for every domain at once. Rather
//! than stores reaching into each other, the coordinator owns the one cursor
//! and fans moves out to every registered store. It never fetches; callers
//! sequence `fetch_date_logs` per store after a move.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use super::{DatedLogStore, LogRecord};

pub trait DateCursor: Send + Sync {
    fn set_day(&self, day: NaiveDate) -> Result<()>;
}

impl<R: LogRecord> DateCursor for DatedLogStore<R> {
    fn set_day(&self, day: NaiveDate) -> Result<()> {
        self.set_selected_day(day)
    }
}

pub struct DateCursorCoordinator {
    day: Mutex<NaiveDate>,
    cursors: Mutex<Vec<Arc<dyn DateCursor>>>,
}

impl DateCursorCoordinator {
    pub fn new(initial_day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(initial_day),
            cursors: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, cursor: Arc<dyn DateCursor>) -> Result<()> {
        let mut cursors = self.cursors.lock().map_err(|_| anyhow!("poisoned lock"))?;
        cursors.push(cursor);
        Ok(())
    }

    pub fn day(&self) -> Result<NaiveDate> {
        Ok(*self.day.lock().map_err(|_| anyhow!("poisoned lock"))?)
    }

    /// Move every registered store's cursor in lockstep.
    pub fn set_day(&self, day: NaiveDate) -> Result<()> {
        {
            let mut current = self.day.lock().map_err(|_| anyhow!("poisoned lock"))?;
            *current = day;
        }
        let cursors = self.cursors.lock().map_err(|_| anyhow!("poisoned lock"))?;
        for cursor in cursors.iter() {
            cursor.set_day(day)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use crate::logstore::domains::{FoodLog, WaterLog};
    use crate::source::InMemoryLogSource;

    use super::*;

    #[test]
    fn set_day_moves_every_registered_cursor() {
        let source = Arc::new(InMemoryLogSource::new());
        let offset = FixedOffset::east_opt(0).expect("offset");
        let nutrition = Arc::new(DatedLogStore::<FoodLog>::with_fixed_offset(
            source.clone(),
            offset,
        ));
        let water = Arc::new(DatedLogStore::<WaterLog>::with_fixed_offset(source, offset));

        let coordinator = DateCursorCoordinator::new(nutrition.selected_day().expect("day"));
        coordinator.register(nutrition.clone()).expect("register");
        coordinator.register(water.clone()).expect("register");

        let day = NaiveDate::from_ymd_opt(2024, 2, 14).expect("date");
        coordinator.set_day(day).expect("set day");

        assert_eq!(coordinator.day().expect("day"), day);
        assert_eq!(nutrition.selected_day().expect("day"), day);
        assert_eq!(water.selected_day().expect("day"), day);
    }
}
