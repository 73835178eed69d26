pub mod attachment;
pub mod filter;
pub mod laporan;
pub mod role;

pub use attachment::{Attachment, AttachmentView, FileCategory};
pub use filter::LaporanFilter;
pub use laporan::{
    AssetType, Laporan, LaporanDraft, LaporanPatch, LaporanStatus, ParseValueError, PoType,
};
pub use role::{ApproverRole, ParseRoleError};
