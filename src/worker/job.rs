//! The download job itself - the only component with external side effects
//!
//! Transfers the descriptor's resource and writes exactly one artifact to
//! storage on success. On any failure nothing is persisted; the buffered
//! body is dropped with the error.

use super::http::{DownloadError, HttpClient};
use crate::scheduler::record::JobRecord;
use crate::storage::{StorageClient, StorageError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Transfer failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Artifact write failed: {0}")]
    Storage(#[from] StorageError),
}

/// Run the transfer for `record`. Returns the artifact location on success.
pub async fn execute(
    record: &JobRecord,
    http: &HttpClient,
    storage: &StorageClient,
) -> Result<String, TransferError> {
    let descriptor = &record.descriptor;

    let bytes = http.download(&descriptor.source_url).await?;
    info!(
        job_id = %record.id,
        url = %descriptor.source_url,
        size = bytes.len(),
        "Transfer completed"
    );

    let key = artifact_key(record);
    storage.upload(&key, bytes).await?;
    let location = storage.location(&key);

    info!(job_id = %record.id, location, "Artifact stored");
    Ok(location)
}

/// Storage key for a record's artifact: artifacts/{record id}/{file name}.
/// The record id segment keeps a replaced job's late write from clobbering
/// its successor's artifact.
pub fn artifact_key(record: &JobRecord) -> String {
    format!("artifacts/{}/{}", record.id, file_name(&record.descriptor.name, &record.descriptor.content_type))
}

/// Artifact file name from the descriptor's name and content type. The
/// extension comes from the MIME subtype unless the name already carries it.
pub fn file_name(name: &str, content_type: &str) -> String {
    let base = sanitize(name);

    let extension = content_type
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.subtype().as_str().to_string())
        .map(|sub| if sub == "octet-stream" { "bin".to_string() } else { sub })
        .unwrap_or_else(|| "bin".to_string());

    if base.ends_with(&format!(".{}", extension)) {
        base
    } else {
        format!("{}.{}", base, extension)
    }
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintPolicy;
    use crate::descriptor::DownloadDescriptor;

    #[test]
    fn test_file_name_appends_extension() {
        assert_eq!(file_name("report", "application/pdf"), "report.pdf");
        assert_eq!(file_name("photo", "image/jpeg"), "photo.jpeg");
    }

    #[test]
    fn test_file_name_keeps_existing_extension() {
        assert_eq!(file_name("report.pdf", "application/pdf"), "report.pdf");
    }

    #[test]
    fn test_file_name_octet_stream_maps_to_bin() {
        assert_eq!(file_name("blob", "application/octet-stream"), "blob.bin");
    }

    #[test]
    fn test_file_name_sanitizes_separators() {
        assert_eq!(file_name("q4 report/final", "application/pdf"), "q4_report_final.pdf");
    }

    #[test]
    fn test_artifact_key_is_scoped_by_record_id() {
        let descriptor =
            DownloadDescriptor::new("report", "http://host/report.pdf", "application/pdf").unwrap();
        let a = JobRecord::new("slot", descriptor.clone(), ConstraintPolicy::default());
        let b = JobRecord::new("slot", descriptor, ConstraintPolicy::default());

        assert_eq!(artifact_key(&a), format!("artifacts/{}/report.pdf", a.id));
        assert_ne!(artifact_key(&a), artifact_key(&b));
    }
}
