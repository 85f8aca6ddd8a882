//! Metadata Validator
//!
//! Reads the embedded capture time and GPS indicator from the claim image and
//! classifies the capture date against the policy start and the date of loss.
//! Missing or unparsable metadata is never an error; it classifies as
//! `Unknown` and drives the decision toward review.

use std::io::Cursor;

use chrono::NaiveDateTime;
use exif::{Context, Exif, Field, In, Tag, Value};
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::record::{ClaimRecord, RecordError};
use crate::types::{CaptureVsLossDate, CaptureVsPolicy, MetadataFindings, PolicyTerms};

/// Embedded facts read from an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Original capture time, if present and parsable
    pub capture_timestamp: Option<NaiveDateTime>,

    /// Whether any GPS information is embedded
    pub gps_present: bool,

    /// Camera make, informational only
    pub camera_make: Option<String>,

    /// Camera model, informational only
    pub camera_model: Option<String>,
}

impl ImageMetadata {
    /// Build from a raw timestamp string. Malformed strings become `None`.
    pub fn from_raw(capture_timestamp: Option<&str>, gps_present: bool) -> Self {
        Self {
            capture_timestamp: capture_timestamp.and_then(dates::parse_datetime),
            gps_present,
            camera_make: None,
            camera_model: None,
        }
    }
}

/// Source of embedded image metadata.
///
/// Implementations must not fail for missing data; an image without
/// metadata yields `ImageMetadata::default()`.
pub trait MetadataReader: Send + Sync {
    fn read(&self, image: &[u8]) -> ImageMetadata;
}

/// Reads EXIF `DateTimeOriginal` and the GPS IFD from JPEG, TIFF, PNG,
/// HEIF and WebP containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataReader;

impl ExifMetadataReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for ExifMetadataReader {
    fn read(&self, image: &[u8]) -> ImageMetadata {
        let mut cursor = Cursor::new(image);
        let exif = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::debug!(error = %e, "No readable EXIF block in image");
                return ImageMetadata::default();
            }
        };

        let capture_timestamp = ascii_field(&exif, Tag::DateTimeOriginal)
            .and_then(|raw| dates::parse_datetime(&raw));

        let gps_present = exif
            .fields()
            .any(|f| f.tag.context() == Context::Gps || f.tag == Tag::GPSInfoIFDPointer);

        ImageMetadata {
            capture_timestamp,
            gps_present,
            camera_make: ascii_field(&exif, Tag::Make),
            camera_model: ascii_field(&exif, Tag::Model),
        }
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY).and_then(first_ascii)
}

fn first_ascii(field: &Field) -> Option<String> {
    match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Classifies capture metadata against the policy terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataValidator;

impl MetadataValidator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the metadata findings for one claim.
    pub fn validate(&self, metadata: &ImageMetadata, policy: &PolicyTerms) -> MetadataFindings {
        let capture_date = metadata.capture_timestamp.map(|ts| ts.date());

        let capture_vs_policy = match capture_date {
            Some(date) if date >= policy.policy_start_date => CaptureVsPolicy::Valid,
            Some(_) => CaptureVsPolicy::Invalid,
            None => CaptureVsPolicy::Unknown,
        };

        let capture_day_difference =
            capture_date.map(|date| dates::day_difference(date, policy.date_of_loss));

        let capture_vs_loss_date = match capture_day_difference {
            Some(diff) if diff <= u64::from(policy.allowed_day_threshold) => {
                CaptureVsLossDate::WithinThreshold
            }
            Some(_) => CaptureVsLossDate::TooFar,
            None => CaptureVsLossDate::Unknown,
        };

        tracing::debug!(
            capture = ?metadata.capture_timestamp,
            day_difference = ?capture_day_difference,
            threshold = policy.allowed_day_threshold,
            %capture_vs_policy,
            %capture_vs_loss_date,
            "Metadata classified"
        );

        MetadataFindings {
            capture_timestamp: metadata.capture_timestamp,
            gps_present: metadata.gps_present,
            capture_vs_policy,
            capture_vs_loss_date,
            capture_day_difference,
        }
    }

    /// Write the metadata findings into the record.
    pub fn apply(
        &self,
        record: ClaimRecord,
        metadata: &ImageMetadata,
    ) -> Result<ClaimRecord, RecordError> {
        let findings = self.validate(metadata, record.policy());
        record.with_metadata(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn policy(start: &str, loss: &str, threshold: u32) -> PolicyTerms {
        PolicyTerms::parse(start, loss, threshold).unwrap()
    }

    #[test]
    fn test_capture_on_policy_start_is_valid() {
        let meta = ImageMetadata::from_raw(Some("2024-04-01T08:00:00"), false);
        let findings = MetadataValidator::new().validate(&meta, &policy("2024-04-01", "2024-04-02", 2));

        assert_eq!(findings.capture_vs_policy, CaptureVsPolicy::Valid);
        assert_eq!(findings.capture_vs_loss_date, CaptureVsLossDate::WithinThreshold);
        assert_eq!(findings.capture_day_difference, Some(1));
    }

    #[test]
    fn test_capture_before_policy_start_is_invalid() {
        let meta = ImageMetadata::from_raw(Some("2024:03:31 23:59:59"), true);
        let findings = MetadataValidator::new().validate(&meta, &policy("2024-04-01", "2024-04-01", 2));

        assert_eq!(findings.capture_vs_policy, CaptureVsPolicy::Invalid);
        assert!(findings.gps_present);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let meta = ImageMetadata::from_raw(Some("2024-05-03"), false);
        let validator = MetadataValidator::new();

        let at = validator.validate(&meta, &policy("2024-04-01", "2024-05-01", 2));
        assert_eq!(at.capture_vs_loss_date, CaptureVsLossDate::WithinThreshold);

        let beyond = validator.validate(&meta, &policy("2024-04-01", "2024-05-01", 1));
        assert_eq!(beyond.capture_vs_loss_date, CaptureVsLossDate::TooFar);
    }

    #[test]
    fn test_capture_after_loss_uses_absolute_difference() {
        let meta = ImageMetadata::from_raw(Some("2024-04-20"), false);
        let findings = MetadataValidator::new().validate(&meta, &policy("2024-04-01", "2024-04-10", 3));

        assert_eq!(findings.capture_day_difference, Some(10));
        assert_eq!(findings.capture_vs_loss_date, CaptureVsLossDate::TooFar);
    }

    #[test]
    fn test_missing_timestamp_is_unknown() {
        let findings = MetadataValidator::new()
            .validate(&ImageMetadata::default(), &policy("2024-04-01", "2024-05-01", 2));

        assert_eq!(findings.capture_timestamp, None);
        assert_eq!(findings.capture_vs_policy, CaptureVsPolicy::Unknown);
        assert_eq!(findings.capture_vs_loss_date, CaptureVsLossDate::Unknown);
        assert_eq!(findings.capture_day_difference, None);
    }

    #[test]
    fn test_malformed_timestamp_degrades_to_unknown() {
        let meta = ImageMetadata::from_raw(Some("0000:00:00 00:00:00"), false);
        assert_eq!(meta.capture_timestamp, None);

        let findings = MetadataValidator::new().validate(&meta, &policy("2024-04-01", "2024-05-01", 2));
        assert_eq!(findings.capture_vs_policy, CaptureVsPolicy::Unknown);
    }

    #[test]
    fn test_exif_reader_tolerates_non_image_bytes() {
        let meta = ExifMetadataReader::new().read(b"definitely not a jpeg");
        assert_eq!(meta, ImageMetadata::default());
    }

    #[test]
    fn test_exif_reader_tolerates_empty_input() {
        let meta = ExifMetadataReader::new().read(&[]);
        assert_eq!(meta.capture_timestamp, None);
        assert!(!meta.gps_present);
    }

    #[test]
    fn test_capture_time_of_day_is_ignored() {
        let meta = ImageMetadata::from_raw(Some("2024-05-01T23:59:59"), false);
        let findings = MetadataValidator::new().validate(&meta, &policy("2024-04-01", "2024-05-01", 0));

        assert_eq!(findings.capture_day_difference, Some(0));
        assert_eq!(
            findings.capture_timestamp.map(|t| t.date()),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
    }
}
