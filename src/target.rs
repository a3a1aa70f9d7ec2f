// Where a submission goes: the LMS instance, course and assignment, plus the
// read-only context shared by every concurrent upload.

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use url::Url;

/// Errors raised while working out the submission target.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    #[error("token is empty or not a valid header value")]
    InvalidToken,
}

/// Resolved LMS instance, course and assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub base_url: String,
    pub course_id: u64,
    pub assignment_id: u64,
}

/// A course as returned by the course list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Parse an assignment page URL such as
/// `https://canvas.example.edu/courses/10/assignments/25`.
///
/// Path segments alternate between a resource type and its identifier; pairs
/// other than `courses` and `assignments` are ignored.
pub fn parse_assignment_url(raw: &str) -> Result<Target, TargetError> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let mut course_id = None;
    let mut assignment_id = None;
    for pair in segments.chunks(2) {
        let (kind, value) = match pair {
            [kind, value] => (*kind, *value),
            _ => break,
        };
        match kind {
            "courses" if course_id.is_none() => course_id = Some(parse_id("course", value)?),
            "assignments" if assignment_id.is_none() => {
                assignment_id = Some(parse_id("assignment", value)?)
            }
            _ => {}
        }
    }

    Ok(Target {
        base_url: url.origin().ascii_serialization(),
        course_id: course_id.ok_or(TargetError::Missing("course id in URL"))?,
        assignment_id: assignment_id.ok_or(TargetError::Missing("assignment id in URL"))?,
    })
}

fn parse_id(kind: &'static str, value: &str) -> Result<u64, TargetError> {
    value.parse().map_err(|_| TargetError::InvalidId {
        kind,
        value: value.to_string(),
    })
}

pub fn find_course(courses: &[Course], id: u64) -> Option<&Course> {
    courses.iter().find(|c| c.id == id)
}

/// Immutable per-run context shared by all uploads.
#[derive(Debug, Clone)]
pub struct UploadContext {
    base_url: String,
    course_id: u64,
    assignment_id: u64,
    authorization: HeaderValue,
}

impl UploadContext {
    pub fn new(
        token: &str,
        base_url: &str,
        course_id: u64,
        assignment_id: u64,
    ) -> Result<Self, TargetError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TargetError::InvalidToken);
        }
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| TargetError::InvalidToken)?;
        authorization.set_sensitive(true);

        let base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TargetError::UnsupportedScheme(base.scheme().to_string()));
        }

        Ok(UploadContext {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            course_id,
            assignment_id,
            authorization,
        })
    }

    pub fn from_target(token: &str, target: &Target) -> Result<Self, TargetError> {
        Self::new(token, &target.base_url, target.course_id, target.assignment_id)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn course_id(&self) -> u64 {
        self.course_id
    }

    pub fn assignment_id(&self) -> u64 {
        self.assignment_id
    }

    /// `Authorization: Bearer <token>` value, marked sensitive.
    pub fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    /// Absolute URL for an API path, keeping any prefix of the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn assignment_path(&self) -> String {
        format!(
            "api/v1/courses/{}/assignments/{}",
            self.course_id, self.assignment_id
        )
    }
}
