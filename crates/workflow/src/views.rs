use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use laporan_core::{AssetType, AttachmentView, Laporan, LaporanStatus, PoType};

/// A laporan as returned to callers: the full record with both attachment
/// sequences decorated with signed URLs.
///
/// Raw storage keys still appear inside each attachment, but every file also
/// carries a fetchable URL, so read paths never force callers to talk to the
/// object store themselves.
#[derive(Debug, Clone, Serialize)]
pub struct LaporanView {
    pub id: Uuid,

    pub request_id: String,
    pub title: String,
    pub request_name: String,
    pub company_code: String,
    pub request_objective: String,
    pub request_background: String,
    pub remarks: Option<String>,
    pub description: Option<String>,
    pub department: String,
    pub buyer: String,
    pub currency: String,

    pub po_type: PoType,
    pub asset_type: AssetType,

    pub total_amount_idr: Decimal,
    pub total_amount_original_currency: Decimal,

    pub request_date: NaiveDate,
    pub delivery_date: NaiveDate,

    pub assign_to: Option<Uuid>,
    pub created_by: Option<Uuid>,

    pub need_approve_files: Vec<AttachmentView>,
    pub no_need_approve_files: Vec<AttachmentView>,

    pub status: LaporanStatus,
    pub em_approved: bool,
    pub user_approved: bool,
    pub vendor_approved: bool,

    pub reject_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub resubmission_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl LaporanView {
    /// Assemble a view from a record and its already-signed attachment views.
    pub fn from_parts(
        laporan: Laporan,
        need_approve_files: Vec<AttachmentView>,
        no_need_approve_files: Vec<AttachmentView>,
    ) -> Self {
        Self {
            id: laporan.id,
            request_id: laporan.request_id,
            title: laporan.title,
            request_name: laporan.request_name,
            company_code: laporan.company_code,
            request_objective: laporan.request_objective,
            request_background: laporan.request_background,
            remarks: laporan.remarks,
            description: laporan.description,
            department: laporan.department,
            buyer: laporan.buyer,
            currency: laporan.currency,
            po_type: laporan.po_type,
            asset_type: laporan.asset_type,
            total_amount_idr: laporan.total_amount_idr,
            total_amount_original_currency: laporan.total_amount_original_currency,
            request_date: laporan.request_date,
            delivery_date: laporan.delivery_date,
            assign_to: laporan.assign_to,
            created_by: laporan.created_by,
            need_approve_files,
            no_need_approve_files,
            status: laporan.status,
            em_approved: laporan.em_approved,
            user_approved: laporan.user_approved,
            vendor_approved: laporan.vendor_approved,
            reject_reason: laporan.reject_reason,
            rejected_at: laporan.rejected_at,
            rejected_by: laporan.rejected_by,
            resubmission_count: laporan.resubmission_count,
            created_at: laporan.created_at,
            updated_at: laporan.updated_at,
            version: laporan.version,
        }
    }
}
