//! Notary submission types and temporary storage credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of the notary submissions collection.
pub const NOTARY_SUBMISSIONS_PATH: &str = "/notary/v2/submissions";

/// Temporary object-storage credentials handed out for one submission.
///
/// Used for a single upload and never written anywhere.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub bucket: String,
    pub object: String,
}

impl S3Credentials {
    /// Fail if any field is blank.
    pub fn validate(&self) -> crate::Result<()> {
        let fields = [
            ("access key id", &self.access_key_id),
            ("secret access key", &self.secret_access_key),
            ("session token", &self.session_token),
            ("bucket", &self.bucket),
            ("object key", &self.object),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(crate::Error::IncompleteCredentials(name));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .field("object", &self.object)
            .finish()
    }
}

/// Body of a new submission request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarySubmissionRequest {
    pub sha256: String,
    pub submission_name: String,
}

impl NotarySubmissionRequest {
    pub fn new(sha256: impl Into<String>, submission_name: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
            submission_name: submission_name.into(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        crate::Checksum::parse(crate::ChecksumAlgorithm::Sha256, &self.sha256)?;
        if self.submission_name.trim().is_empty() {
            return Err(crate::Error::InvalidOperation(
                "submission name is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionResponse {
    pub data: NotarySubmissionData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: NotarySubmissionAttributes,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarySubmissionAttributes {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: String,
    pub bucket: String,
    pub object: String,
}

impl NotarySubmissionAttributes {
    pub fn credentials(&self) -> S3Credentials {
        S3Credentials {
            access_key_id: self.aws_access_key_id.clone(),
            secret_access_key: self.aws_secret_access_key.clone(),
            session_token: self.aws_session_token.clone(),
            bucket: self.bucket.clone(),
            object: self.object.clone(),
        }
    }
}

impl fmt::Debug for NotarySubmissionAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.credentials(), f)
    }
}

/// Processing state of a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotarySubmissionStatus {
    Accepted,
    #[serde(rename = "In Progress")]
    InProgress,
    Invalid,
    Rejected,
    #[serde(untagged)]
    Other(String),
}

impl NotarySubmissionStatus {
    /// Whether the submission has stopped changing.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for NotarySubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("Accepted"),
            Self::InProgress => f.write_str("In Progress"),
            Self::Invalid => f.write_str("Invalid"),
            Self::Rejected => f.write_str("Rejected"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionStatusResponse {
    pub data: NotarySubmissionStatusData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionsListResponse {
    #[serde(default)]
    pub data: Vec<NotarySubmissionStatusData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionStatusData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: NotarySubmissionStatusAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarySubmissionStatusAttributes {
    pub status: NotarySubmissionStatus,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_date: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionLogsResponse {
    pub data: NotarySubmissionLogsData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarySubmissionLogsData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: NotarySubmissionLogsAttributes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotarySubmissionLogsAttributes {
    #[serde(rename = "developerLogUrl")]
    pub developer_log_url: String,
}
