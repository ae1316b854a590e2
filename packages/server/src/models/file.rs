use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::ingest::IngestResult;
use crate::records::{ContentRecord, Predicate, RecordFilter, StoreStats};

/// Response DTO for a single stored file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    /// Record ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    /// SHA-256 content digest.
    #[schema(example = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")]
    pub digest: String,
    /// Filename from the first upload of this content.
    #[schema(example = "report.pdf")]
    pub original_filename: String,
    /// MIME type from the first upload of this content.
    #[schema(example = "application/pdf")]
    pub content_type: String,
    /// Content size in bytes.
    #[schema(example = 142857)]
    pub size: i64,
    /// Number of uploads of this content.
    #[schema(example = 3)]
    pub upload_count: i64,
    /// Bytes not stored thanks to deduplication.
    #[schema(example = 285714)]
    pub bytes_saved: i64,
    pub created_at: DateTime<Utc>,
    /// Whether this request created the record.
    pub created: bool,
}

impl FileResponse {
    pub fn from_record(record: ContentRecord, created: bool) -> Self {
        Self {
            bytes_saved: record.bytes_saved(),
            id: record.id.to_string(),
            digest: record.digest,
            original_filename: record.original_filename,
            content_type: record.content_type,
            size: record.size_bytes,
            upload_count: record.upload_count,
            created_at: record.created_at,
            created,
        }
    }
}

impl From<IngestResult> for FileResponse {
    fn from(result: IngestResult) -> Self {
        Self::from_record(result.record, result.created)
    }
}

/// Response DTO for listing files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: u64,
}

/// Storage-wide deduplication figures.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageStatsResponse {
    /// Distinct contents stored.
    #[schema(example = 12)]
    pub records: i64,
    /// Uploads received across all contents.
    #[schema(example = 30)]
    pub uploads: i64,
    /// Bytes held in the blob store.
    pub bytes_stored: i64,
    /// Bytes not stored thanks to deduplication.
    pub bytes_saved: i64,
}

impl From<StoreStats> for StorageStatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            records: stats.records,
            uploads: stats.uploads,
            bytes_stored: stats.bytes_stored,
            bytes_saved: stats.bytes_saved,
        }
    }
}

/// List filters. All are optional and combined with AND; blank values are ignored.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// Case-insensitive substring of the filename.
    pub filename: Option<String>,
    /// Case-insensitive substring of the MIME type.
    pub file_type: Option<String>,
    /// Minimum size in bytes (inclusive).
    pub size_min: Option<String>,
    /// Maximum size in bytes (inclusive).
    pub size_max: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC); only files created at or after it.
    pub uploaded_after: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC); only files created at or before it.
    pub uploaded_before: Option<String>,
}

impl FileListQuery {
    pub fn into_filter(self) -> Result<RecordFilter, AppError> {
        let mut filter = RecordFilter::new();

        if let Some(term) = non_blank(self.filename) {
            filter = filter.and(Predicate::FilenameContains(term));
        }
        if let Some(term) = non_blank(self.file_type) {
            filter = filter.and(Predicate::ContentTypeContains(term));
        }

        let size_min = parse_size(self.size_min, "size_min")?;
        let size_max = parse_size(self.size_max, "size_max")?;
        if let (Some(min), Some(max)) = (size_min, size_max)
            && min > max
        {
            return Err(AppError::Validation(
                "size_min must not exceed size_max".into(),
            ));
        }
        if let Some(min) = size_min {
            filter = filter.and(Predicate::SizeAtLeast(min));
        }
        if let Some(max) = size_max {
            filter = filter.and(Predicate::SizeAtMost(max));
        }

        if let Some(after) = parse_time(self.uploaded_after, "uploaded_after")? {
            filter = filter.and(Predicate::CreatedAfter(after));
        }
        if let Some(before) = parse_time(self.uploaded_before, "uploaded_before")? {
            filter = filter.and(Predicate::CreatedBefore(before));
        }

        Ok(filter)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_size(value: Option<String>, name: &str) -> Result<Option<i64>, AppError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        _ => Err(AppError::Validation(format!(
            "{name} must be a non-negative integer"
        ))),
    }
}

fn parse_time(value: Option<String>, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    // Date pickers send a bare date; it stands for midnight UTC.
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|d| Some(d.and_time(NaiveTime::MIN).and_utc()))
        .map_err(|_| {
            AppError::Validation(format!(
                "{name} must be an RFC 3339 timestamp or a YYYY-MM-DD date"
            ))
        })
}
