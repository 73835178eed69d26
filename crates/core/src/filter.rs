use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::laporan::{Laporan, LaporanStatus};

/// Composable listing filter: each present field adds one AND predicate,
/// absent fields impose no constraint.
///
/// The date bounds are inclusive calendar days against `created_at`:
/// `start_date` becomes `>= 00:00:00` and `end_date` becomes
/// `<= 23:59:59.999` of the given day, both in UTC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaporanFilter {
    pub status: Option<LaporanStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl LaporanFilter {
    /// Inclusive lower bound on `created_at`, if a start date is set.
    pub fn created_after(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Inclusive upper bound on `created_at`, if an end date is set.
    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        // 23:59:59.999 is always a valid time of day.
        self.end_date
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .map(|dt| dt.and_utc())
    }

    /// Evaluate the composed predicate against one record. Used by the
    /// in-memory backend; the SQL backend renders the same bounds as WHERE
    /// clauses.
    pub fn matches(&self, laporan: &Laporan) -> bool {
        if let Some(status) = self.status {
            if laporan.status != status {
                return false;
            }
        }
        if let Some(after) = self.created_after() {
            if laporan.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before() {
            if laporan.created_at > before {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::laporan::{AssetType, LaporanDraft, PoType};

    fn record_created_at(ts: DateTime<Utc>) -> Laporan {
        let mut laporan = Laporan::new(
            LaporanDraft {
                request_id: "REQ-1".into(),
                title: "t".into(),
                request_name: "r".into(),
                company_code: "ID01".into(),
                request_objective: "o".into(),
                request_background: "b".into(),
                remarks: None,
                description: None,
                department: "IT".into(),
                buyer: "b".into(),
                currency: "IDR".into(),
                po_type: PoType::PurchaseOrder,
                asset_type: AssetType::FixedAsset,
                total_amount_idr: Decimal::ONE,
                total_amount_original_currency: Decimal::ONE,
                request_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                delivery_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                assign_to: None,
                created_by: None,
            },
            ts,
        );
        laporan.created_at = ts;
        laporan
    }

    #[test]
    fn empty_filter_matches_everything() {
        let laporan = record_created_at(Utc::now());
        assert!(LaporanFilter::default().matches(&laporan));
    }

    #[test]
    fn date_window_is_inclusive_of_both_ends() {
        let filter = LaporanFilter {
            status: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
        };

        let first_instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last_instant = Utc
            .with_ymd_and_hms(2024, 1, 31, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(999))
            .unwrap();
        let outside = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        assert!(filter.matches(&record_created_at(first_instant)));
        assert!(filter.matches(&record_created_at(last_instant)));
        assert!(!filter.matches(&record_created_at(outside)));
    }

    #[test]
    fn status_predicate_composes_with_dates() {
        let filter = LaporanFilter {
            status: Some(LaporanStatus::Rejected),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
        };
        let mut laporan = record_created_at(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap());
        assert!(!filter.matches(&laporan));
        laporan.status = LaporanStatus::Rejected;
        assert!(filter.matches(&laporan));
    }
}
