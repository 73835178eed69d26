use std::fmt;

use serde::{Deserialize, Serialize};

/// The two independent attachment categories on a laporan.
///
/// Files never move between categories, and each category maps to a fixed
/// folder in the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    NeedApprove,
    NoNeedApprove,
}

impl FileCategory {
    /// Storage folder prefix for keys in this category.
    pub fn folder(self) -> &'static str {
        match self {
            Self::NeedApprove => "need-approve",
            Self::NoNeedApprove => "no-need-approve",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

/// A stored file reference, immutable once created.
///
/// Carries enough raw-upload metadata (`field_name`, `encoding`) that the
/// attachment can be re-derived without the original upload context. Editing
/// a laporan's file set appends new records; existing ones are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename as uploaded.
    pub name: String,
    /// Opaque object-store key used to retrieve the blob.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
    /// Multipart field name the file arrived under.
    pub field_name: String,
    /// Transfer encoding recorded at upload time.
    pub encoding: String,
}

/// An [`Attachment`] decorated with a freshly signed URL for responses.
///
/// URLs are generated on read and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Time-limited, externally fetchable link to the blob.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_folders_are_fixed() {
        assert_eq!(FileCategory::NeedApprove.folder(), "need-approve");
        assert_eq!(FileCategory::NoNeedApprove.folder(), "no-need-approve");
    }

    #[test]
    fn view_flattens_attachment_fields() {
        let view = AttachmentView {
            attachment: Attachment {
                name: "quote.pdf".into(),
                key: "need-approve/1700000000000-quote.pdf".into(),
                size_bytes: 512,
                content_type: "application/pdf".into(),
                field_name: "needApproveFiles".into(),
                encoding: "7bit".into(),
            },
            url: "https://bucket.example/signed".into(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["name"], "quote.pdf");
        assert_eq!(json["url"], "https://bucket.example/signed");
    }
}
