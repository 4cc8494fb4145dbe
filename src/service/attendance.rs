use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceRecord, OfficeStartTime, calculate_total_hours, is_valid_check_out_time,
};
use crate::model::period::MonthPeriod;
use crate::model::report::{AttendanceSummary, TodayStatus};
use crate::store::{AttendanceStore, StoreError};

/// Check-in/check-out lifecycle over a record store.
///
/// Holds no record state between calls: every operation re-reads the
/// store. The lookup and the write are not atomic; duplicate inserts are
/// left to the store's `(user_id, date)` unique key.
#[derive(Clone)]
pub struct AttendanceService<S> {
    pub(crate) store: S,
    office_start: OfficeStartTime,
}

impl<S> AttendanceService<S> {
    pub fn new(store: S, office_start: OfficeStartTime) -> Self {
        Self {
            store,
            office_start,
        }
    }

    pub fn office_start(&self) -> OfficeStartTime {
        self.office_start
    }
}

impl<S: AttendanceStore> AttendanceService<S> {
    #[instrument(name = "attendance_check_in", skip(self))]
    pub async fn check_in(
        &self,
        user_id: u64,
        now: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let today = now.date();
        let existing = self.store.find_by_user_and_date(user_id, today).await?;

        let mut record = match existing {
            Some(record) if record.check_in_time.is_some() => {
                info!("Rejected: already checked in");
                return Err(AttendanceError::AlreadyCheckedIn);
            }
            Some(record) => {
                warn!(record_id = record.id, "Existing record without check-in, completing it");
                record
            }
            None => AttendanceRecord::for_day(user_id, now),
        };

        record.check_in_time = Some(now);
        record.recompute_status(self.office_start);

        let saved = if record.is_persisted() {
            self.store.save_check_in(&record).await.map_err(|e| match e {
                StoreError::Conflict(detail) => {
                    info!(%detail, "Check-in lost race on existing record");
                    AttendanceError::AlreadyCheckedIn
                }
                StoreError::NotFound(detail) => {
                    warn!(%detail, "Record removed during check-in");
                    AttendanceError::Conflict
                }
                other => AttendanceError::Store(other),
            })?;
            record
        } else {
            self.store.insert(&record).await.map_err(|e| match e {
                StoreError::Conflict(detail) => {
                    info!(%detail, "Check-in lost race on unique key");
                    AttendanceError::Conflict
                }
                other => AttendanceError::Store(other),
            })?
        };

        info!(record_id = saved.id, status = %saved.status, "Checked in");
        Ok(saved)
    }

    #[instrument(name = "attendance_check_out", skip(self))]
    pub async fn check_out(
        &self,
        user_id: u64,
        now: NaiveDateTime,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let mut record = match self.store.find_by_user_and_date(user_id, now.date()).await? {
            Some(record) => record,
            None => return Err(AttendanceError::NotCheckedIn),
        };

        let Some(check_in_time) = record.check_in_time else {
            return Err(AttendanceError::NotCheckedIn);
        };

        if record.check_out_time.is_some() {
            return Err(AttendanceError::AlreadyCheckedOut);
        }

        if !is_valid_check_out_time(record.check_in_time, now) {
            warn!(%check_in_time, "Check-out before check-in");
            return Err(AttendanceError::InvalidCheckOutTime);
        }

        record.check_out_time = Some(now);
        record.total_hours = calculate_total_hours(check_in_time, now);
        record.recompute_status(self.office_start);

        self.store.save_check_out(&record).await.map_err(|e| match e {
            StoreError::Conflict(detail) => {
                info!(%detail, "Check-out lost race");
                AttendanceError::AlreadyCheckedOut
            }
            StoreError::NotFound(detail) => {
                warn!(%detail, "Record removed before check-out was saved");
                AttendanceError::NotCheckedIn
            }
            other => AttendanceError::Store(other),
        })?;

        info!(
            record_id = record.id,
            total_hours = record.total_hours,
            status = %record.status,
            "Checked out"
        );
        Ok(record)
    }

    pub async fn today_status(
        &self,
        user_id: u64,
        now: NaiveDateTime,
    ) -> Result<TodayStatus, AttendanceError> {
        let record = self.store.find_by_user_and_date(user_id, now.date()).await?;
        Ok(TodayStatus::from_record(record))
    }

    /// All records, or one month's when `period` is given; newest first.
    pub async fn history(
        &self,
        user_id: u64,
        period: Option<MonthPeriod>,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let records = self
            .store
            .list_for_user(user_id, period.map(|p| p.range()))
            .await?;
        debug!(user_id, count = records.len(), "Fetched attendance history");
        Ok(records)
    }

    pub async fn summary(
        &self,
        user_id: u64,
        period: MonthPeriod,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let records = self
            .store
            .list_for_user(user_id, Some(period.range()))
            .await?;
        Ok(AttendanceSummary::from_records(&records))
    }

    /// Administrative override: drops the day's record so the user reads as absent.
    #[instrument(name = "attendance_mark_absent", skip(self))]
    pub async fn mark_absent(&self, user_id: u64, date: NaiveDate) -> Result<bool, AttendanceError> {
        let removed = self.store.delete_by_user_and_date(user_id, date).await?;
        if removed {
            warn!("Attendance record removed by administrative override");
        } else {
            info!("No attendance record to remove");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use crate::store::AttendanceFilter;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    const USER: u64 = 7;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn service() -> (AttendanceService<MemoryStore>, MemoryStore) {
        let store = MemoryStore::default();
        (
            AttendanceService::new(store.clone(), OfficeStartTime::default()),
            store,
        )
    }

    #[actix_web::test]
    async fn on_time_check_in_is_present() {
        let (service, _) = service();

        let record = service.check_in(USER, at(8, 45)).await.unwrap();

        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.date, day());
        assert_eq!(record.check_in_time, Some(at(8, 45)));
        assert_eq!(record.check_out_time, None);
        assert_eq!(record.total_hours, 0.0);
        assert!(record.is_persisted());
    }

    #[actix_web::test]
    async fn short_day_after_on_time_check_in_becomes_half_day() {
        let (service, _) = service();
        service.check_in(USER, at(8, 45)).await.unwrap();

        let record = service.check_out(USER, at(13, 15)).await.unwrap();

        assert_eq!(record.total_hours, 4.5);
        assert_eq!(record.status, AttendanceStatus::HalfDay);
    }

    #[actix_web::test]
    async fn late_full_day_stays_late() {
        let (service, _) = service();
        let checked_in = service.check_in(USER, at(9, 30)).await.unwrap();
        assert_eq!(checked_in.status, AttendanceStatus::Late);

        let record = service.check_out(USER, at(18, 0)).await.unwrap();

        assert_eq!(record.total_hours, 8.5);
        assert_eq!(record.status, AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn exactly_four_hours_is_not_half_day() {
        let (service, _) = service();
        service.check_in(USER, at(9, 0)).await.unwrap();

        let record = service.check_out(USER, at(13, 0)).await.unwrap();

        assert_eq!(record.total_hours, 4.0);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn second_check_in_is_rejected_and_leaves_record_alone() {
        let (service, store) = service();
        service.check_in(USER, at(8, 45)).await.unwrap();
        let writes = store.writes();

        let err = service.check_in(USER, at(10, 0)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyCheckedIn));
        assert_eq!(store.get(USER, day()).unwrap().check_in_time, Some(at(8, 45)));
        assert_eq!(store.writes(), writes);
    }

    #[actix_web::test]
    async fn check_in_next_day_creates_new_record() {
        let (service, _) = service();
        let first = service.check_in(USER, at(8, 45)).await.unwrap();

        let second = service
            .check_in(USER, at(8, 50) + Duration::days(1))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(second.date, day() + Duration::days(1));
    }

    #[actix_web::test]
    async fn record_without_check_in_is_completed_not_duplicated() {
        let (service, store) = service();
        let seeded = store.seed(AttendanceRecord::for_day(USER, at(0, 0)));

        let record = service.check_in(USER, at(9, 5)).await.unwrap();

        assert_eq!(record.id, seeded.id);
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(store.get(USER, day()).unwrap().check_in_time, Some(at(9, 5)));
    }

    #[actix_web::test]
    async fn check_out_without_check_in_fails() {
        let (service, store) = service();

        let err = service.check_out(USER, at(17, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NotCheckedIn));

        store.seed(AttendanceRecord::for_day(USER, at(0, 0)));
        let err = service.check_out(USER, at(17, 0)).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NotCheckedIn));
        assert_eq!(store.writes(), 0);
    }

    #[actix_web::test]
    async fn second_check_out_is_rejected_and_leaves_record_alone() {
        let (service, store) = service();
        service.check_in(USER, at(9, 0)).await.unwrap();
        service.check_out(USER, at(17, 0)).await.unwrap();
        let writes = store.writes();

        let err = service.check_out(USER, at(18, 0)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyCheckedOut));
        let stored = store.get(USER, day()).unwrap();
        assert_eq!(stored.check_out_time, Some(at(17, 0)));
        assert_eq!(stored.total_hours, 8.0);
        assert_eq!(store.writes(), writes);
    }

    #[actix_web::test]
    async fn check_out_before_check_in_performs_no_write() {
        let (service, store) = service();
        // Check-in stamped ahead of the clock used for check-out.
        service.check_in(USER, at(10, 0)).await.unwrap();
        let writes = store.writes();

        let err = service.check_out(USER, at(9, 59)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::InvalidCheckOutTime));
        assert_eq!(store.get(USER, day()).unwrap().check_out_time, None);
        assert_eq!(store.writes(), writes);
    }

    #[actix_web::test]
    async fn zero_length_day_keeps_check_in_status() {
        let (service, _) = service();
        service.check_in(USER, at(9, 10)).await.unwrap();

        let record = service.check_out(USER, at(9, 10)).await.unwrap();

        assert_eq!(record.total_hours, 0.0);
        assert_eq!(record.status, AttendanceStatus::Late);
    }

    /// Store whose lookup can be frozen, so every later request sees the
    /// same stale state while writes go to the real store.
    #[derive(Clone, Default)]
    struct LaggingStore {
        inner: MemoryStore,
        frozen: Arc<Mutex<Option<Option<AttendanceRecord>>>>,
    }

    impl LaggingStore {
        fn freeze(&self, user_id: u64, date: NaiveDate) {
            *self.frozen.lock().unwrap() = Some(self.inner.get(user_id, date));
        }
    }

    impl AttendanceStore for LaggingStore {
        async fn find_by_user_and_date(
            &self,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            let frozen = self.frozen.lock().unwrap().clone();
            match frozen {
                Some(snapshot) => Ok(snapshot),
                None => self.inner.find_by_user_and_date(user_id, date).await,
            }
        }

        async fn insert(&self, record: &AttendanceRecord) -> Result<AttendanceRecord, StoreError> {
            self.inner.insert(record).await
        }

        async fn save_check_in(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
            self.inner.save_check_in(record).await
        }

        async fn save_check_out(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
            self.inner.save_check_out(record).await
        }

        async fn delete_by_user_and_date(
            &self,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<bool, StoreError> {
            self.inner.delete_by_user_and_date(user_id, date).await
        }

        async fn list_for_user(
            &self,
            user_id: u64,
            range: Option<crate::model::period::DateRange>,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.list_for_user(user_id, range).await
        }

        async fn list(
            &self,
            filter: &AttendanceFilter,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.list(filter).await
        }
    }

    fn lagging_service() -> (AttendanceService<LaggingStore>, LaggingStore) {
        let store = LaggingStore::default();
        (
            AttendanceService::new(store.clone(), OfficeStartTime::default()),
            store,
        )
    }

    #[actix_web::test]
    async fn concurrent_duplicate_check_in_loses_to_unique_key() {
        let (service, store) = lagging_service();
        store.freeze(USER, day());

        let winner = service.check_in(USER, at(8, 59)).await.unwrap();
        let err = service.check_in(USER, at(8, 59)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::Conflict));
        assert_eq!(store.inner.get(USER, day()).unwrap().id, winner.id);
    }

    #[actix_web::test]
    async fn concurrent_check_out_keeps_first_result() {
        let (service, store) = lagging_service();
        service.check_in(USER, at(9, 0)).await.unwrap();
        store.freeze(USER, day());

        let first = service.check_out(USER, at(13, 30)).await.unwrap();
        assert_eq!(first.status, AttendanceStatus::HalfDay);

        let err = service.check_out(USER, at(18, 0)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyCheckedOut));
        let stored = store.inner.get(USER, day()).unwrap();
        assert_eq!(stored.check_out_time, Some(at(13, 30)));
        assert_eq!(stored.total_hours, 4.5);
        assert_eq!(stored.status, AttendanceStatus::HalfDay);
    }

    #[actix_web::test]
    async fn check_out_of_removed_record_is_not_checked_in() {
        let (service, store) = lagging_service();
        service.check_in(USER, at(8, 30)).await.unwrap();
        store.freeze(USER, day());
        assert!(service.mark_absent(USER, day()).await.unwrap());
        let writes = store.inner.writes();

        let err = service.check_out(USER, at(17, 0)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::NotCheckedIn));
        assert!(store.inner.get(USER, day()).is_none());
        assert_eq!(store.inner.writes(), writes);
    }

    #[actix_web::test]
    async fn concurrent_completion_of_open_record_is_already_checked_in() {
        let (service, store) = lagging_service();
        store.inner.seed(AttendanceRecord::for_day(USER, at(0, 0)));
        store.freeze(USER, day());

        service.check_in(USER, at(8, 50)).await.unwrap();
        let err = service.check_in(USER, at(9, 20)).await.unwrap_err();

        assert!(matches!(err, AttendanceError::AlreadyCheckedIn));
        let stored = store.inner.get(USER, day()).unwrap();
        assert_eq!(stored.check_in_time, Some(at(8, 50)));
        assert_eq!(stored.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn today_status_reports_sentinel_before_check_in() {
        let (service, _) = service();

        let status = service.today_status(USER, at(8, 0)).await.unwrap();
        assert!(matches!(status, TodayStatus::NotCheckedIn { .. }));

        service.check_in(USER, at(8, 30)).await.unwrap();
        let status = service.today_status(USER, at(8, 31)).await.unwrap();
        assert!(matches!(status, TodayStatus::Recorded(ref r) if r.user_id == USER));
    }

    #[actix_web::test]
    async fn history_is_newest_first_and_month_scoped() {
        let (service, _) = service();
        for offset in [0, 1, 2, 25] {
            let now = at(8, 30) + Duration::days(offset);
            service.check_in(USER, now).await.unwrap();
            service.check_out(USER, now + Duration::hours(8)).await.unwrap();
        }

        let all = service.history(USER, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].date > w[1].date));

        let march = service
            .history(USER, MonthPeriod::new(2026, 3))
            .await
            .unwrap();
        assert_eq!(march.len(), 3);
        assert_eq!(march[0].date, day() + Duration::days(2));
    }

    #[actix_web::test]
    async fn summary_totals_hours_and_statuses() {
        let (service, _) = service();
        service.check_in(USER, at(8, 45)).await.unwrap();
        service.check_out(USER, at(13, 15)).await.unwrap();
        let tomorrow = Duration::days(1);
        service.check_in(USER, at(9, 30) + tomorrow).await.unwrap();
        service.check_out(USER, at(18, 0) + tomorrow).await.unwrap();

        let summary = service
            .summary(USER, MonthPeriod::new(2026, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(summary.half_day, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.present, 0);
        assert_eq!(summary.absent, 0);
        assert_eq!(summary.total_hours, 13.0);
        assert_eq!(summary.total_days, 2);
    }

    #[actix_web::test]
    async fn mark_absent_removes_the_day() {
        let (service, store) = service();
        service.check_in(USER, at(9, 0)).await.unwrap();

        assert!(service.mark_absent(USER, day()).await.unwrap());
        assert!(store.get(USER, day()).is_none());
        assert!(!service.mark_absent(USER, day()).await.unwrap());
    }
}
