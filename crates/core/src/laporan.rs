use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::Attachment;

/// Lifecycle status of a [`Laporan`].
///
/// Legal transitions: `Entry → Submitted → {Approved | Rejected}`;
/// `Rejected → Resubmitted → Submitted`. A `Resubmitted` record may be
/// rejected again, cycling back through `Rejected`. The workflow engine
/// enforces transition legality; this type only names the states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaporanStatus {
    Entry,
    Submitted,
    Approved,
    Rejected,
    Resubmitted,
}

impl LaporanStatus {
    /// The canonical wire/database string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Resubmitted => "resubmitted",
        }
    }
}

impl fmt::Display for LaporanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a string outside an enum's closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized value: {0}")]
pub struct ParseValueError(pub String);

impl FromStr for LaporanStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Self::Entry),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "resubmitted" => Ok(Self::Resubmitted),
            other => Err(ParseValueError(other.to_owned())),
        }
    }
}

/// Purchase order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoType {
    PurchaseOrder,
    DirectPurchase,
}

impl PoType {
    /// The canonical wire/database string for this classification.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PurchaseOrder => "purchase_order",
            Self::DirectPurchase => "direct_purchase",
        }
    }
}

impl FromStr for PoType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_order" => Ok(Self::PurchaseOrder),
            "direct_purchase" => Ok(Self::DirectPurchase),
            other => Err(ParseValueError(other.to_owned())),
        }
    }
}

/// Asset classification of the requested goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    FixedAsset,
    Consumable,
}

impl AssetType {
    /// The canonical wire/database string for this classification.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FixedAsset => "fixed_asset",
            Self::Consumable => "consumable",
        }
    }
}

impl FromStr for AssetType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_asset" => Ok(Self::FixedAsset),
            "consumable" => Ok(Self::Consumable),
            other => Err(ParseValueError(other.to_owned())),
        }
    }
}

/// The procurement request aggregate.
///
/// Attachments live in two independent ordered sequences; files never move
/// between them and existing entries are never mutated in place. The
/// `version` column backs optimistic concurrency in the repository: every
/// successful save increments it, and a save against a stale version fails
/// with a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Laporan {
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

    pub need_approve_files: Vec<Attachment>,
    pub no_need_approve_files: Vec<Attachment>,

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

impl Laporan {
    /// Build a fresh record from a draft. Status starts at `Entry`; the
    /// workflow engine flips it to `Submitted` when the caller asked for an
    /// immediate submit.
    pub fn new(draft: LaporanDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: draft.request_id,
            title: draft.title,
            request_name: draft.request_name,
            company_code: draft.company_code,
            request_objective: draft.request_objective,
            request_background: draft.request_background,
            remarks: draft.remarks,
            description: draft.description,
            department: draft.department,
            buyer: draft.buyer,
            currency: draft.currency,
            po_type: draft.po_type,
            asset_type: draft.asset_type,
            total_amount_idr: draft.total_amount_idr,
            total_amount_original_currency: draft.total_amount_original_currency,
            request_date: draft.request_date,
            delivery_date: draft.delivery_date,
            assign_to: draft.assign_to,
            created_by: draft.created_by,
            need_approve_files: Vec::new(),
            no_need_approve_files: Vec::new(),
            status: LaporanStatus::Entry,
            em_approved: false,
            user_approved: false,
            vendor_approved: false,
            reject_reason: None,
            rejected_at: None,
            rejected_by: None,
            resubmission_count: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Both mandatory approvals present.
    pub fn fully_approved(&self) -> bool {
        self.em_approved && self.user_approved
    }

    /// Reset all three approval flags. Always done together: the invariant is
    /// that the flags clear as a unit whenever status becomes `Rejected` or
    /// `Resubmitted`.
    pub fn reset_approvals(&mut self) {
        self.em_approved = false;
        self.user_approved = false;
        self.vendor_approved = false;
    }

    /// Clear the rejection metadata recorded by a reject.
    pub fn clear_rejection(&mut self) {
        self.reject_reason = None;
        self.rejected_at = None;
        self.rejected_by = None;
    }

    /// Apply every patched field except `status` and `resubmission_count`,
    /// which only change through dedicated workflow operations.
    pub fn apply_patch(&mut self, patch: LaporanPatch) {
        let LaporanPatch {
            request_id,
            title,
            request_name,
            company_code,
            request_objective,
            request_background,
            remarks,
            description,
            department,
            buyer,
            currency,
            po_type,
            asset_type,
            total_amount_idr,
            total_amount_original_currency,
            request_date,
            delivery_date,
            assign_to,
            status: _,
        } = patch;

        if let Some(v) = request_id {
            self.request_id = v;
        }
        if let Some(v) = title {
            self.title = v;
        }
        if let Some(v) = request_name {
            self.request_name = v;
        }
        if let Some(v) = company_code {
            self.company_code = v;
        }
        if let Some(v) = request_objective {
            self.request_objective = v;
        }
        if let Some(v) = request_background {
            self.request_background = v;
        }
        if let Some(v) = remarks {
            self.remarks = Some(v);
        }
        if let Some(v) = description {
            self.description = Some(v);
        }
        if let Some(v) = department {
            self.department = v;
        }
        if let Some(v) = buyer {
            self.buyer = v;
        }
        if let Some(v) = currency {
            self.currency = v;
        }
        if let Some(v) = po_type {
            self.po_type = v;
        }
        if let Some(v) = asset_type {
            self.asset_type = v;
        }
        if let Some(v) = total_amount_idr {
            self.total_amount_idr = v;
        }
        if let Some(v) = total_amount_original_currency {
            self.total_amount_original_currency = v;
        }
        if let Some(v) = request_date {
            self.request_date = v;
        }
        if let Some(v) = delivery_date {
            self.delivery_date = v;
        }
        if let Some(v) = assign_to {
            self.assign_to = Some(v);
        }
    }
}

/// Required fields for creating a new [`Laporan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaporanDraft {
    pub request_id: String,
    pub title: String,
    pub request_name: String,
    pub company_code: String,
    pub request_objective: String,
    pub request_background: String,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
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
    #[serde(default)]
    pub assign_to: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// Partial update for an existing [`Laporan`]. All fields optional; absent
/// fields leave the record untouched.
///
/// `status` is carried so a caller can request the one transition `update`
/// honors (`Rejected → Resubmitted`); every other status value in a patch is
/// ignored by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaporanPatch {
    pub request_id: Option<String>,
    pub title: Option<String>,
    pub request_name: Option<String>,
    pub company_code: Option<String>,
    pub request_objective: Option<String>,
    pub request_background: Option<String>,
    pub remarks: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub buyer: Option<String>,
    pub currency: Option<String>,
    pub po_type: Option<PoType>,
    pub asset_type: Option<AssetType>,
    pub total_amount_idr: Option<Decimal>,
    pub total_amount_original_currency: Option<Decimal>,
    pub request_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub assign_to: Option<Uuid>,
    pub status: Option<LaporanStatus>,
}
