use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use laporan_blob::error::BlobError;
use laporan_blob::store::FileStore;
use laporan_blob_memory::MemoryFileStore;
use laporan_core::{
    ApproverRole, AssetType, Laporan, LaporanDraft, LaporanFilter, LaporanPatch, LaporanStatus,
    PoType,
};
use laporan_store::store::LaporanStore;
use laporan_store_memory::MemoryLaporanStore;
use laporan_workflow::{
    RawUpload, StaticDirectory, UploadSet, WorkflowEngine, WorkflowError,
};

/// A file store that starts failing puts after a set number of successes.
struct FlakyFileStore {
    inner: MemoryFileStore,
    puts_before_failure: usize,
    puts: AtomicUsize,
}

impl FlakyFileStore {
    fn failing_after(puts_before_failure: usize) -> Self {
        Self {
            inner: MemoryFileStore::new(),
            puts_before_failure,
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FileStore for FlakyFileStore {
    async fn put(&self, key: &str, content_type: &str, data: Bytes) -> Result<(), BlobError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) >= self.puts_before_failure {
            return Err(BlobError::Storage("injected put failure".into()));
        }
        self.inner.put(key, content_type, data).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        self.inner.signed_url(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        self.inner.delete(key).await
    }
}

struct Fixture {
    engine: WorkflowEngine,
    store: MemoryLaporanStore,
    files: Arc<MemoryFileStore>,
    known_user: Uuid,
}

fn fixture() -> Fixture {
    let store = MemoryLaporanStore::new();
    let files = Arc::new(MemoryFileStore::new());
    let known_user = Uuid::new_v4();
    let engine = WorkflowEngine::builder()
        .store(Arc::new(store.clone()))
        .file_store(Arc::clone(&files) as Arc<dyn FileStore>)
        .directory(Arc::new(StaticDirectory::with_users([known_user])))
        .build()
        .expect("engine should build");
    Fixture {
        engine,
        store,
        files,
        known_user,
    }
}

fn draft() -> LaporanDraft {
    LaporanDraft {
        request_id: "REQ-2024-001".into(),
        title: "Network switches".into(),
        request_name: "Switch refresh".into(),
        company_code: "ID01".into(),
        request_objective: "Replace end-of-life hardware".into(),
        request_background: "Core switches out of support".into(),
        remarks: None,
        description: None,
        department: "IT".into(),
        buyer: "procurement".into(),
        currency: "IDR".into(),
        po_type: PoType::PurchaseOrder,
        asset_type: AssetType::FixedAsset,
        total_amount_idr: Decimal::new(250_000_000, 0),
        total_amount_original_currency: Decimal::new(250_000_000, 0),
        request_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
        delivery_date: NaiveDate::from_ymd_opt(2024, 4, 1).expect("valid date"),
        assign_to: None,
        created_by: None,
    }
}

fn upload(name: &str) -> RawUpload {
    RawUpload::new(name, "application/pdf", Bytes::from_static(b"content"))
}

fn uploads(need: &[&str], no_need: &[&str]) -> UploadSet {
    UploadSet {
        need_approve: need.iter().map(|n| upload(n)).collect(),
        no_need_approve: no_need.iter().map(|n| upload(n)).collect(),
    }
}

#[tokio::test]
async fn create_stores_files_and_starts_at_entry() {
    let fx = fixture();
    let files = uploads(&["quote.pdf"], &["brochure.pdf", "datasheet.pdf"]);

    let laporan = fx.engine.create(draft(), files, false).await.unwrap();

    assert_eq!(laporan.status, LaporanStatus::Entry);
    assert_eq!(laporan.version, 0);
    assert_eq!(laporan.resubmission_count, 0);
    assert_eq!(laporan.need_approve_files.len(), 1);
    assert_eq!(laporan.no_need_approve_files.len(), 2);
    assert!(laporan.need_approve_files[0].key.starts_with("need-approve/"));
    assert!(
        laporan.no_need_approve_files[0]
            .key
            .starts_with("no-need-approve/")
    );
    assert_eq!(fx.files.len(), 3);
    assert_eq!(fx.store.len(), 1);
}

#[tokio::test]
async fn create_with_submit_now_starts_at_submitted() {
    let fx = fixture();
    let laporan = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();
    assert_eq!(laporan.status, LaporanStatus::Submitted);
}

#[tokio::test]
async fn create_rejects_negative_amounts_before_any_upload() {
    let fx = fixture();
    let mut bad = draft();
    bad.total_amount_idr = Decimal::new(-1, 0);

    let err = fx
        .engine
        .create(bad, uploads(&["quote.pdf"], &[]), false)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(fx.files.is_empty());
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn create_rejects_unknown_assignee() {
    let fx = fixture();
    let mut bad = draft();
    bad.assign_to = Some(Uuid::new_v4());

    let err = fx
        .engine
        .create(bad, UploadSet::default(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn create_cleans_up_uploads_when_a_later_upload_fails() {
    let store = MemoryLaporanStore::new();
    let flaky = Arc::new(FlakyFileStore::failing_after(2));
    let engine = WorkflowEngine::builder()
        .store(Arc::new(store.clone()))
        .file_store(Arc::clone(&flaky) as Arc<dyn FileStore>)
        .directory(Arc::new(StaticDirectory::new()))
        .upload_width(1)
        .build()
        .unwrap();

    let files = uploads(&["a.pdf", "b.pdf"], &["c.pdf"]);
    let err = engine.create(draft(), files, false).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Storage(_)));
    assert!(flaky.inner.is_empty(), "partial uploads must be removed");
    assert!(store.is_empty(), "no record may be created");
}

#[tokio::test]
async fn submit_then_dual_approval_reaches_approved() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), false)
        .await
        .unwrap();

    let submitted = fx.engine.submit(created.id).await.unwrap();
    assert_eq!(submitted.status, LaporanStatus::Submitted);

    let after_em = fx.engine.approve(created.id, ApproverRole::Em).await.unwrap();
    assert!(after_em.em_approved);
    assert_eq!(after_em.status, LaporanStatus::Submitted);

    let after_user = fx
        .engine
        .approve(created.id, ApproverRole::User)
        .await
        .unwrap();
    assert!(after_user.user_approved);
    assert_eq!(after_user.status, LaporanStatus::Approved);
}

#[tokio::test]
async fn vendor_approval_never_drives_the_status() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();

    fx.engine
        .approve(created.id, ApproverRole::Em)
        .await
        .unwrap();
    let after_vendor = fx
        .engine
        .approve(created.id, ApproverRole::Vendor)
        .await
        .unwrap();

    assert!(after_vendor.vendor_approved);
    assert_eq!(after_vendor.status, LaporanStatus::Submitted);
}

#[tokio::test]
async fn approving_the_same_role_twice_is_idempotent() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();

    fx.engine
        .approve(created.id, ApproverRole::Em)
        .await
        .unwrap();
    let again = fx.engine.approve(created.id, ApproverRole::Em).await.unwrap();

    assert!(again.em_approved);
    assert!(!again.user_approved);
    assert_eq!(again.status, LaporanStatus::Submitted);
}

#[tokio::test]
async fn reject_records_metadata_and_clears_approvals() {
    let fx = fixture();
    let actor = Uuid::new_v4();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();
    fx.engine
        .approve(created.id, ApproverRole::Em)
        .await
        .unwrap();

    let rejected = fx
        .engine
        .reject(created.id, "missing budget approval", actor)
        .await
        .unwrap();

    assert_eq!(rejected.status, LaporanStatus::Rejected);
    assert_eq!(rejected.reject_reason.as_deref(), Some("missing budget approval"));
    assert_eq!(rejected.rejected_by, Some(actor));
    assert!(rejected.rejected_at.is_some());
    assert!(!rejected.em_approved && !rejected.user_approved && !rejected.vendor_approved);
}

#[tokio::test]
async fn rejecting_twice_is_a_domain_rule_violation() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();
    fx.engine
        .reject(created.id, "first", Uuid::new_v4())
        .await
        .unwrap();

    let err = fx
        .engine
        .reject(created.id, "second", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::DomainRule(_)));
}

#[tokio::test]
async fn submit_is_illegal_from_terminal_states() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();

    let err = fx.engine.submit(created.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::DomainRule(_)));
}

#[tokio::test]
async fn resubmitted_record_needs_both_approvals_before_submit() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();
    fx.engine
        .reject(created.id, "rework", Uuid::new_v4())
        .await
        .unwrap();
    fx.engine.resubmit(created.id, None, None).await.unwrap();

    let err = fx.engine.submit(created.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::DomainRule(_)));

    // With both mandatory approvals in place the submit goes through.
    let mut approved = fx.store.find(created.id).await.unwrap().unwrap();
    approved.em_approved = true;
    approved.user_approved = true;
    fx.store.save(approved).await.unwrap();

    let submitted = fx.engine.submit(created.id).await.unwrap();
    assert_eq!(submitted.status, LaporanStatus::Submitted);
}

#[tokio::test]
async fn resubmit_after_reject_increments_count_and_clears_state() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();
    fx.engine
        .reject(created.id, "rework", Uuid::new_v4())
        .await
        .unwrap();

    let patch = LaporanPatch {
        title: Some("Network switches, revised".into()),
        ..LaporanPatch::default()
    };
    let resubmitted = fx
        .engine
        .resubmit(created.id, Some(patch), Some(uploads(&["revised.pdf"], &[])))
        .await
        .unwrap();

    assert_eq!(resubmitted.status, LaporanStatus::Resubmitted);
    assert_eq!(resubmitted.resubmission_count, 1);
    assert_eq!(resubmitted.title, "Network switches, revised");
    assert!(resubmitted.reject_reason.is_none());
    assert!(resubmitted.rejected_at.is_none());
    assert!(resubmitted.rejected_by.is_none());
    assert!(!resubmitted.em_approved && !resubmitted.user_approved);
    assert_eq!(resubmitted.need_approve_files.len(), 1);
}

#[tokio::test]
async fn resubmit_from_a_non_rejected_state_keeps_the_count() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), false)
        .await
        .unwrap();

    let resubmitted = fx.engine.resubmit(created.id, None, None).await.unwrap();

    assert_eq!(resubmitted.status, LaporanStatus::Resubmitted);
    assert_eq!(resubmitted.resubmission_count, 0);
}

#[tokio::test]
async fn repeated_reject_resubmit_cycles_count_each_rejection() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), true)
        .await
        .unwrap();

    for expected in 1..=3 {
        fx.engine
            .reject(created.id, "again", Uuid::new_v4())
            .await
            .unwrap();
        let resubmitted = fx.engine.resubmit(created.id, None, None).await.unwrap();
        assert_eq!(resubmitted.resubmission_count, expected);
    }
}

#[tokio::test]
async fn resubmit_of_a_missing_record_removes_its_uploads() {
    let fx = fixture();

    let err = fx
        .engine
        .resubmit(Uuid::new_v4(), None, Some(uploads(&["orphan.pdf"], &[])))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert!(fx.files.is_empty(), "uploads must not outlive a failed resubmit");
}

#[tokio::test]
async fn update_applies_fields_and_appends_files_in_order() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), uploads(&["original.pdf"], &[]), false)
        .await
        .unwrap();

    let patch = LaporanPatch {
        buyer: Some("direct procurement".into()),
        assign_to: Some(fx.known_user),
        ..LaporanPatch::default()
    };
    let updated = fx
        .engine
        .update(created.id, patch, Some(uploads(&["appended.pdf"], &[])))
        .await
        .unwrap();

    assert_eq!(updated.buyer, "direct procurement");
    assert_eq!(updated.assign_to, Some(fx.known_user));
    assert_eq!(updated.need_approve_files.len(), 2);
    assert_eq!(updated.need_approve_files[0].name, "original.pdf");
    assert_eq!(updated.need_approve_files[1].name, "appended.pdf");
    assert!(updated.no_need_approve_files.is_empty());
    assert_eq!(updated.version, 1);
}

#[tokio::test]
async fn update_ignores_status_changes_except_rejected_to_resubmitted() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), false)
        .await
        .unwrap();

    let patch = LaporanPatch {
        status: Some(LaporanStatus::Approved),
        ..LaporanPatch::default()
    };
    let updated = fx.engine.update(created.id, patch, None).await.unwrap();
    assert_eq!(updated.status, LaporanStatus::Entry);

    fx.engine.submit(created.id).await.unwrap();
    fx.engine
        .reject(created.id, "rework", Uuid::new_v4())
        .await
        .unwrap();

    let patch = LaporanPatch {
        status: Some(LaporanStatus::Resubmitted),
        ..LaporanPatch::default()
    };
    let resubmitted = fx.engine.update(created.id, patch, None).await.unwrap();
    assert_eq!(resubmitted.status, LaporanStatus::Resubmitted);
    assert_eq!(resubmitted.resubmission_count, 1);
    assert!(resubmitted.reject_reason.is_none());
}

#[tokio::test]
async fn update_rejects_unknown_assignee_without_touching_the_record() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), UploadSet::default(), false)
        .await
        .unwrap();

    let patch = LaporanPatch {
        assign_to: Some(Uuid::new_v4()),
        ..LaporanPatch::default()
    };
    let err = fx.engine.update(created.id, patch, None).await.unwrap_err();

    assert!(matches!(err, WorkflowError::NotFound(_)));
    let stored = fx.store.find(created.id).await.unwrap().unwrap();
    assert_eq!(stored.assign_to, None);
    assert_eq!(stored.version, 0);
}

#[tokio::test]
async fn remove_deletes_the_record_and_its_files() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), uploads(&["a.pdf"], &["b.pdf"]), false)
        .await
        .unwrap();
    assert_eq!(fx.files.len(), 2);

    fx.engine.remove(created.id).await.unwrap();

    assert!(fx.store.is_empty());
    assert!(fx.files.is_empty());

    let err = fx.engine.remove(created.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn find_one_returns_signed_urls_for_both_categories() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), uploads(&["quote.pdf"], &["brochure.pdf"]), false)
        .await
        .unwrap();

    let view = fx.engine.find_one(created.id).await.unwrap();

    assert_eq!(view.id, created.id);
    assert_eq!(view.need_approve_files.len(), 1);
    assert_eq!(view.no_need_approve_files.len(), 1);
    assert!(
        view.need_approve_files[0]
            .url
            .starts_with("memory://need-approve/")
    );
    assert!(view.need_approve_files[0].url.ends_with("expires_in=3600"));
}

#[tokio::test]
async fn find_one_of_a_missing_record_is_not_found() {
    let fx = fixture();
    let err = fx.engine.find_one(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

fn seeded(year: i32, month: u32, day: u32) -> Laporan {
    let created_at = Utc
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    Laporan::new(draft(), created_at)
}

#[tokio::test]
async fn listings_come_back_newest_first() {
    let fx = fixture();
    let older = seeded(2024, 1, 10);
    let newer = seeded(2024, 5, 10);
    let older_id = older.id;
    let newer_id = newer.id;
    fx.store.insert(older).await.unwrap();
    fx.store.insert(newer).await.unwrap();

    let views = fx.engine.find_all().await.unwrap();

    assert_eq!(views.len(), 2);
    assert_eq!(views[0].id, newer_id);
    assert_eq!(views[1].id, older_id);
}

#[tokio::test]
async fn find_assigned_only_lists_that_users_records() {
    let fx = fixture();
    let mut mine = seeded(2024, 2, 1);
    mine.assign_to = Some(fx.known_user);
    let mine_id = mine.id;
    fx.store.insert(mine).await.unwrap();
    fx.store.insert(seeded(2024, 2, 2)).await.unwrap();

    let views = fx.engine.find_assigned(fx.known_user).await.unwrap();

    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, mine_id);
}

#[tokio::test]
async fn filter_composes_status_and_date_window() {
    let fx = fixture();
    let mut in_window = seeded(2024, 6, 15);
    in_window.status = LaporanStatus::Rejected;
    let in_window_id = in_window.id;
    let mut wrong_status = seeded(2024, 6, 16);
    wrong_status.status = LaporanStatus::Approved;
    let mut out_of_window = seeded(2024, 8, 1);
    out_of_window.status = LaporanStatus::Rejected;
    fx.store.insert(in_window).await.unwrap();
    fx.store.insert(wrong_status).await.unwrap();
    fx.store.insert(out_of_window).await.unwrap();

    let filter = LaporanFilter {
        status: Some(LaporanStatus::Rejected),
        start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        end_date: NaiveDate::from_ymd_opt(2024, 6, 30),
    };
    let views = fx.engine.filter(&filter).await.unwrap();

    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, in_window_id);
}

#[tokio::test]
async fn empty_filter_lists_everything() {
    let fx = fixture();
    fx.store.insert(seeded(2024, 1, 1)).await.unwrap();
    fx.store.insert(seeded(2024, 1, 2)).await.unwrap();

    let views = fx.engine.filter(&LaporanFilter::default()).await.unwrap();
    assert_eq!(views.len(), 2);
}

#[tokio::test]
async fn views_serialize_with_flattened_attachment_fields() {
    let fx = fixture();
    let created = fx
        .engine
        .create(draft(), uploads(&["quote.pdf"], &[]), false)
        .await
        .unwrap();

    let view = fx.engine.find_one(created.id).await.unwrap();
    let json = serde_json::to_value(&view).unwrap();

    let file = &json["need_approve_files"][0];
    assert_eq!(file["name"], "quote.pdf");
    assert!(file["url"].as_str().unwrap().starts_with("memory://"));
    assert!(file["key"].as_str().unwrap().starts_with("need-approve/"));
    assert_eq!(json["status"], "entry");
}
