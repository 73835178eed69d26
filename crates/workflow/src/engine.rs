use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use laporan_core::{
    Attachment, ApproverRole, FileCategory, Laporan, LaporanDraft, LaporanFilter, LaporanPatch,
    LaporanStatus,
};
use laporan_store::store::{LaporanStore, LaporanTxn};

use crate::attachments::{AttachmentMapper, UploadSet};
use crate::builder::WorkflowEngineBuilder;
use crate::directory::UserDirectory;
use crate::error::WorkflowError;
use crate::views::LaporanView;

/// The laporan lifecycle state machine.
///
/// Stateless; share via [`Arc`] across request handlers. All collaborators
/// (repository, object store, user directory) are injected at construction
/// through [`WorkflowEngineBuilder`]. No in-process lock is held across any
/// store await point: per-record consistency comes from the repository's
/// version checks and the transaction wrapped around resubmission.
pub struct WorkflowEngine {
    store: Arc<dyn LaporanStore>,
    attachments: AttachmentMapper,
    directory: Arc<dyn UserDirectory>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine").finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Start building an engine.
    pub fn builder() -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new()
    }

    pub(crate) fn from_parts(
        store: Arc<dyn LaporanStore>,
        attachments: AttachmentMapper,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            attachments,
            directory,
        }
    }

    /// Create a record, uploading both file categories first.
    ///
    /// Status starts at `Submitted` when `submit_now` is set, otherwise
    /// `Entry`; approval flags start false and the resubmission counter at
    /// zero. If the insert fails after files were uploaded, the uploads are
    /// deleted before the error surfaces, so no half-created record and no
    /// orphaned blobs remain.
    #[instrument(skip(self, draft, files), fields(request_id = %draft.request_id, submit_now))]
    pub async fn create(
        &self,
        draft: LaporanDraft,
        files: UploadSet,
        submit_now: bool,
    ) -> Result<Laporan, WorkflowError> {
        ensure_non_negative("total_amount_idr", draft.total_amount_idr)?;
        ensure_non_negative(
            "total_amount_original_currency",
            draft.total_amount_original_currency,
        )?;
        if let Some(user_id) = draft.assign_to {
            self.validate_assignee(user_id).await?;
        }

        let (need, no_need) = self.store_upload_set(files).await?;
        let uploaded_keys = collect_keys(&need, &no_need);

        let mut laporan = Laporan::new(draft, Utc::now());
        laporan.need_approve_files = need;
        laporan.no_need_approve_files = no_need;
        if submit_now {
            laporan.status = LaporanStatus::Submitted;
        }

        match self.store.insert(laporan).await {
            Ok(saved) => {
                info!(id = %saved.id, status = %saved.status, "laporan created");
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "insert failed after upload; removing uploaded files");
                self.attachments.delete_keys(&uploaded_keys).await;
                Err(err.into())
            }
        }
    }

    /// Apply a partial update, appending any supplied files.
    ///
    /// Every field except `status` and `resubmission_count` is applied
    /// directly. The one status change honored here is an explicit
    /// `Rejected → Resubmitted` request via the patch, which increments the
    /// resubmission counter, clears the reject metadata, and resets the
    /// approval flags; any other requested status is ignored.
    #[instrument(skip(self, patch, files), fields(id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        patch: LaporanPatch,
        files: Option<UploadSet>,
    ) -> Result<Laporan, WorkflowError> {
        let mut laporan = self.load(id).await?;

        self.validate_patch(&laporan, &patch).await?;
        let requested_status = patch.status;
        laporan.apply_patch(patch);

        if requested_status == Some(LaporanStatus::Resubmitted)
            && laporan.status == LaporanStatus::Rejected
        {
            laporan.status = LaporanStatus::Resubmitted;
            laporan.resubmission_count += 1;
            laporan.clear_rejection();
            laporan.reset_approvals();
        }

        let (need, no_need) = self.store_upload_set(files.unwrap_or_default()).await?;
        let uploaded_keys = collect_keys(&need, &no_need);
        laporan.need_approve_files.extend(need);
        laporan.no_need_approve_files.extend(no_need);

        match self.store.save(laporan).await {
            Ok(saved) => {
                info!(id = %saved.id, status = %saved.status, "laporan updated");
                Ok(saved)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "save failed after upload; removing uploaded files");
                self.attachments.delete_keys(&uploaded_keys).await;
                Err(err.into())
            }
        }
    }

    /// Move a record into `Submitted`.
    ///
    /// Legal from `Entry`, and from `Resubmitted` once both EM and USER have
    /// approved; every other starting state is a domain-rule violation.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn submit(&self, id: Uuid) -> Result<Laporan, WorkflowError> {
        let mut laporan = self.load(id).await?;

        match laporan.status {
            LaporanStatus::Entry => {}
            LaporanStatus::Resubmitted => {
                if !laporan.fully_approved() {
                    return Err(WorkflowError::DomainRule(
                        "must be approved by EM and USER before submission".into(),
                    ));
                }
            }
            other => {
                return Err(WorkflowError::DomainRule(format!(
                    "cannot submit a laporan in status {other}"
                )));
            }
        }

        laporan.status = LaporanStatus::Submitted;
        let saved = self.store.save(laporan).await?;
        info!(id = %saved.id, "laporan submitted");
        Ok(saved)
    }

    /// Record one role's approval.
    ///
    /// Idempotent per role. Once both EM and USER have approved, the record
    /// moves to `Approved`; the vendor flag never drives the status.
    #[instrument(skip(self), fields(id = %id, role = %role))]
    pub async fn approve(&self, id: Uuid, role: ApproverRole) -> Result<Laporan, WorkflowError> {
        let mut laporan = self.load(id).await?;

        role.mark_approved(&mut laporan);
        if laporan.fully_approved() {
            laporan.status = LaporanStatus::Approved;
        }

        let saved = self.store.save(laporan).await?;
        info!(id = %saved.id, status = %saved.status, "approval recorded");
        Ok(saved)
    }

    /// Reject a record, recording reason, actor, and timestamp.
    ///
    /// Rejecting an already-rejected record is an error, not a no-op. All
    /// three approval flags reset together.
    #[instrument(skip(self, reason), fields(id = %id, actor = %actor))]
    pub async fn reject(
        &self,
        id: Uuid,
        reason: impl Into<String>,
        actor: Uuid,
    ) -> Result<Laporan, WorkflowError> {
        let mut laporan = self.load(id).await?;

        if laporan.status == LaporanStatus::Rejected {
            return Err(WorkflowError::DomainRule(
                "laporan is already rejected".into(),
            ));
        }

        laporan.status = LaporanStatus::Rejected;
        laporan.reject_reason = Some(reason.into());
        laporan.rejected_by = Some(actor);
        laporan.rejected_at = Some(Utc::now());
        laporan.reset_approvals();

        let saved = self.store.save(laporan).await?;
        info!(id = %saved.id, "laporan rejected");
        Ok(saved)
    }

    /// Re-enter the workflow after rejection, as one atomic unit.
    ///
    /// Field updates and file appends ride along. The status becomes
    /// `Resubmitted` unconditionally; the counter increments only when the
    /// previous status was exactly `Rejected`, which guards against double
    /// counting. Reject metadata and all approval flags clear. On any
    /// failure the transaction rolls back and files uploaded for this call
    /// are deleted, so no partial change persists.
    #[instrument(skip(self, patch, files), fields(id = %id))]
    pub async fn resubmit(
        &self,
        id: Uuid,
        patch: Option<LaporanPatch>,
        files: Option<UploadSet>,
    ) -> Result<Laporan, WorkflowError> {
        if let Some(ref patch) = patch {
            let current = self.load(id).await?;
            self.validate_patch(&current, patch).await?;
        }

        let (need, no_need) = self.store_upload_set(files.unwrap_or_default()).await?;
        let uploaded_keys = collect_keys(&need, &no_need);

        match self.resubmit_in_txn(id, patch, need, no_need).await {
            Ok(saved) => {
                info!(
                    id = %saved.id,
                    resubmission_count = saved.resubmission_count,
                    "laporan resubmitted"
                );
                Ok(saved)
            }
            Err(err) => {
                self.attachments.delete_keys(&uploaded_keys).await;
                Err(err)
            }
        }
    }

    async fn resubmit_in_txn(
        &self,
        id: Uuid,
        patch: Option<LaporanPatch>,
        need: Vec<Attachment>,
        no_need: Vec<Attachment>,
    ) -> Result<Laporan, WorkflowError> {
        let mut txn = self.store.begin().await?;
        match apply_resubmit(txn.as_mut(), id, patch, need, no_need).await {
            Ok(saved) => {
                txn.commit().await?;
                Ok(saved)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(id = %id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Delete a record and every attachment it owns.
    ///
    /// Attachment deletion is best-effort: individual storage failures are
    /// logged and the record is still deleted, rather than blocking removal
    /// on storage cleanup.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn remove(&self, id: Uuid) -> Result<(), WorkflowError> {
        let laporan = self.load(id).await?;

        let removed = self.attachments.delete_all(&laporan.need_approve_files).await
            + self
                .attachments
                .delete_all(&laporan.no_need_approve_files)
                .await;
        let owned = laporan.need_approve_files.len() + laporan.no_need_approve_files.len();
        if removed < owned {
            warn!(id = %id, removed, owned, "some attachments could not be deleted");
        }

        self.store.delete(id).await?;
        info!(id = %id, "laporan deleted");
        Ok(())
    }

    /// One record with signed attachment URLs. Fails with `NotFound` on a
    /// missing id.
    pub async fn find_one(&self, id: Uuid) -> Result<LaporanView, WorkflowError> {
        let laporan = self.load(id).await?;
        self.view(laporan).await
    }

    /// All records, newest first, with signed attachment URLs.
    pub async fn find_all(&self) -> Result<Vec<LaporanView>, WorkflowError> {
        let records = self.store.find_all().await?;
        self.views(records).await
    }

    /// Records assigned to one user, newest first.
    pub async fn find_assigned(&self, user_id: Uuid) -> Result<Vec<LaporanView>, WorkflowError> {
        let records = self.store.find_assigned(user_id).await?;
        self.views(records).await
    }

    /// Records matching the filter's AND-composed predicates, newest first.
    /// An empty filter lists everything.
    pub async fn filter(&self, filter: &LaporanFilter) -> Result<Vec<LaporanView>, WorkflowError> {
        let records = self.store.filter(filter).await?;
        self.views(records).await
    }

    async fn load(&self, id: Uuid) -> Result<Laporan, WorkflowError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("laporan {id} not found")))
    }

    async fn validate_assignee(&self, user_id: Uuid) -> Result<(), WorkflowError> {
        if self.directory.exists(user_id).await? {
            Ok(())
        } else {
            Err(WorkflowError::NotFound(format!(
                "assigned user {user_id} not found"
            )))
        }
    }

    async fn validate_patch(
        &self,
        current: &Laporan,
        patch: &LaporanPatch,
    ) -> Result<(), WorkflowError> {
        if let Some(amount) = patch.total_amount_idr {
            ensure_non_negative("total_amount_idr", amount)?;
        }
        if let Some(amount) = patch.total_amount_original_currency {
            ensure_non_negative("total_amount_original_currency", amount)?;
        }
        if let Some(user_id) = patch.assign_to {
            if current.assign_to != Some(user_id) {
                self.validate_assignee(user_id).await?;
            }
        }
        Ok(())
    }

    /// Upload both categories, all-or-nothing across the whole set: a
    /// failure in the second batch also removes the first.
    async fn store_upload_set(
        &self,
        files: UploadSet,
    ) -> Result<(Vec<Attachment>, Vec<Attachment>), WorkflowError> {
        let need = self
            .attachments
            .store_batch(files.need_approve, FileCategory::NeedApprove)
            .await?;
        match self
            .attachments
            .store_batch(files.no_need_approve, FileCategory::NoNeedApprove)
            .await
        {
            Ok(no_need) => Ok((need, no_need)),
            Err(err) => {
                self.attachments.delete_all(&need).await;
                Err(err)
            }
        }
    }

    async fn view(&self, laporan: Laporan) -> Result<LaporanView, WorkflowError> {
        let need = self.attachments.to_views(&laporan.need_approve_files).await?;
        let no_need = self
            .attachments
            .to_views(&laporan.no_need_approve_files)
            .await?;
        Ok(LaporanView::from_parts(laporan, need, no_need))
    }

    async fn views(&self, records: Vec<Laporan>) -> Result<Vec<LaporanView>, WorkflowError> {
        let mut views = Vec::with_capacity(records.len());
        for laporan in records {
            views.push(self.view(laporan).await?);
        }
        Ok(views)
    }
}

async fn apply_resubmit(
    txn: &mut dyn LaporanTxn,
    id: Uuid,
    patch: Option<LaporanPatch>,
    need: Vec<Attachment>,
    no_need: Vec<Attachment>,
) -> Result<Laporan, WorkflowError> {
    let mut laporan = txn
        .find(id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("laporan {id} not found")))?;

    let previous_status = laporan.status;

    if let Some(patch) = patch {
        laporan.apply_patch(patch);
    }
    laporan.need_approve_files.extend(need);
    laporan.no_need_approve_files.extend(no_need);

    laporan.status = LaporanStatus::Resubmitted;
    if previous_status == LaporanStatus::Rejected {
        laporan.resubmission_count += 1;
    }
    laporan.clear_rejection();
    laporan.reset_approvals();

    txn.save(laporan).await.map_err(Into::into)
}

fn collect_keys(need: &[Attachment], no_need: &[Attachment]) -> Vec<String> {
    need.iter()
        .chain(no_need.iter())
        .map(|a| a.key.clone())
        .collect()
}

fn ensure_non_negative(field: &str, amount: Decimal) -> Result<(), WorkflowError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(WorkflowError::Validation(format!(
            "{field} must be non-negative"
        )));
    }
    Ok(())
}
