//! Behavioral conformance suite shared by every repository backend.
//!
//! Call [`run_store_conformance_tests`] from a backend's test module with a
//! fresh store instance.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use laporan_core::{AssetType, Laporan, LaporanDraft, LaporanFilter, LaporanStatus, PoType};

use crate::error::StoreError;
use crate::store::LaporanStore;

/// A minimal valid record for conformance tests.
pub fn sample_laporan(created_at: DateTime<Utc>) -> Laporan {
    let mut laporan = Laporan::new(
        LaporanDraft {
            request_id: "REQ-CONF".into(),
            title: "Conformance".into(),
            request_name: "Conformance run".into(),
            company_code: "ID01".into(),
            request_objective: "objective".into(),
            request_background: "background".into(),
            remarks: None,
            description: None,
            department: "IT".into(),
            buyer: "buyer".into(),
            currency: "IDR".into(),
            po_type: PoType::PurchaseOrder,
            asset_type: AssetType::FixedAsset,
            total_amount_idr: Decimal::new(250_000, 0),
            total_amount_original_currency: Decimal::new(250_000, 0),
            request_date: NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date"),
            delivery_date: NaiveDate::from_ymd_opt(2024, 1, 20).expect("valid date"),
            assign_to: None,
            created_by: None,
        },
        created_at,
    );
    laporan.created_at = created_at;
    laporan.updated_at = created_at;
    laporan
}

/// Run the full repository conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn LaporanStore) -> Result<(), StoreError> {
    test_find_missing(store).await?;
    test_insert_and_find(store).await?;
    test_save_bumps_version(store).await?;
    test_stale_save_conflicts(store).await?;
    test_listing_is_newest_first(store).await?;
    test_find_assigned(store).await?;
    test_filter_composes(store).await?;
    test_delete(store).await?;
    test_txn_commit_is_visible(store).await?;
    test_txn_rollback_discards(store).await?;
    Ok(())
}

async fn test_find_missing(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let found = store.find(Uuid::new_v4()).await?;
    assert!(found.is_none(), "find on a missing id should return None");
    Ok(())
}

async fn test_insert_and_find(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = sample_laporan(Utc::now());
    let id = laporan.id;
    store.insert(laporan).await?;
    let found = store.find(id).await?.expect("inserted record should exist");
    assert_eq!(found.id, id);
    assert_eq!(found.status, LaporanStatus::Entry);
    Ok(())
}

async fn test_save_bumps_version(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = store.insert(sample_laporan(Utc::now())).await?;
    let before = laporan.version;

    let mut changed = laporan;
    changed.title = "changed".into();
    let saved = store.save(changed).await?;
    assert_eq!(saved.version, before + 1, "save should bump the version");
    assert_eq!(saved.title, "changed");

    let reread = store.find(saved.id).await?.expect("record should exist");
    assert_eq!(reread.version, before + 1);
    Ok(())
}

async fn test_stale_save_conflicts(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = store.insert(sample_laporan(Utc::now())).await?;

    let mut first = laporan.clone();
    first.title = "first writer".into();
    store.save(first).await?;

    let mut second = laporan;
    second.title = "second writer".into();
    let err = store
        .save(second)
        .await
        .expect_err("stale save should conflict");
    assert!(
        matches!(err, StoreError::Conflict { .. }),
        "expected Conflict, got {err:?}"
    );
    Ok(())
}

async fn test_listing_is_newest_first(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let now = Utc::now();
    let older = store.insert(sample_laporan(now - Duration::hours(2))).await?;
    let newer = store.insert(sample_laporan(now - Duration::hours(1))).await?;

    let all = store.find_all().await?;
    let pos_older = all
        .iter()
        .position(|l| l.id == older.id)
        .expect("older record listed");
    let pos_newer = all
        .iter()
        .position(|l| l.id == newer.id)
        .expect("newer record listed");
    assert!(
        pos_newer < pos_older,
        "newer record should come before older in find_all"
    );
    Ok(())
}

async fn test_find_assigned(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let assignee = Uuid::new_v4();
    let mut assigned = sample_laporan(Utc::now());
    assigned.assign_to = Some(assignee);
    let assigned = store.insert(assigned).await?;
    store.insert(sample_laporan(Utc::now())).await?;

    let results = store.find_assigned(assignee).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, assigned.id);

    let none = store.find_assigned(Uuid::new_v4()).await?;
    assert!(none.is_empty(), "unknown assignee should yield empty list");
    Ok(())
}

async fn test_filter_composes(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let inside = Utc
        .with_ymd_and_hms(2021, 6, 15, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    let mut rejected = sample_laporan(inside);
    rejected.status = LaporanStatus::Rejected;
    let rejected = store.insert(rejected).await?;

    let mut wrong_status = sample_laporan(inside);
    wrong_status.status = LaporanStatus::Submitted;
    store.insert(wrong_status).await?;

    let mut outside_window = sample_laporan(inside + Duration::days(60));
    outside_window.status = LaporanStatus::Rejected;
    store.insert(outside_window).await?;

    let filter = LaporanFilter {
        status: Some(LaporanStatus::Rejected),
        start_date: NaiveDate::from_ymd_opt(2021, 6, 1),
        end_date: NaiveDate::from_ymd_opt(2021, 6, 30),
    };
    let results = store.filter(&filter).await?;
    assert_eq!(results.len(), 1, "only the in-window rejected record matches");
    assert_eq!(results[0].id, rejected.id);
    Ok(())
}

async fn test_delete(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = store.insert(sample_laporan(Utc::now())).await?;
    let existed = store.delete(laporan.id).await?;
    assert!(existed, "delete should report the record existed");
    assert!(store.find(laporan.id).await?.is_none());

    let existed = store.delete(laporan.id).await?;
    assert!(!existed, "second delete should report absence");
    Ok(())
}

async fn test_txn_commit_is_visible(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = store.insert(sample_laporan(Utc::now())).await?;

    let mut txn = store.begin().await?;
    let mut staged = txn
        .find(laporan.id)
        .await?
        .expect("record should be visible inside txn");
    staged.title = "committed".into();
    txn.save(staged).await?;
    txn.commit().await?;

    let reread = store.find(laporan.id).await?.expect("record should exist");
    assert_eq!(reread.title, "committed");
    assert_eq!(reread.version, laporan.version + 1);
    Ok(())
}

async fn test_txn_rollback_discards(store: &dyn LaporanStore) -> Result<(), StoreError> {
    let laporan = store.insert(sample_laporan(Utc::now())).await?;

    let mut txn = store.begin().await?;
    let mut staged = txn.find(laporan.id).await?.expect("record in txn");
    staged.title = "never seen".into();
    staged.resubmission_count = 99;
    txn.save(staged).await?;
    txn.rollback().await?;

    let reread = store.find(laporan.id).await?.expect("record should exist");
    assert_eq!(reread.title, "Conformance", "rollback must discard writes");
    assert_eq!(reread.resubmission_count, 0);
    assert_eq!(reread.version, laporan.version);
    Ok(())
}
