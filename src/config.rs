// Command-line configuration. Every option can also come from the
// environment, so the tool can run unattended in CI.

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::Parser;

use crate::target::{parse_assignment_url, Target, TargetError};

/// Submit local files to an LMS assignment.
#[derive(Parser, Debug, Clone)]
#[command(name = "canvas-submit", version, about, long_about = None)]
pub struct Args {
    /// Files or glob patterns to submit
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<String>,

    /// Assignment page URL, e.g. https://canvas.example.edu/courses/10/assignments/25
    #[arg(long, env = "CANVAS_ASSIGNMENT_URL")]
    pub url: Option<String>,

    /// LMS base URL, used with --course and --assignment
    #[arg(long, env = "CANVAS_BASE_URL")]
    pub base_url: Option<String>,

    /// Course id
    #[arg(long, requires = "assignment")]
    pub course: Option<u64>,

    /// Assignment id
    #[arg(long, requires = "course")]
    pub assignment: Option<u64>,

    /// API access token
    #[arg(long, env = "CANVAS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Remember the token for later runs
    #[arg(long)]
    pub save_token: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of files uploaded at once (default: all)
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<NonZeroUsize>,

    /// Do not check that the course exists before uploading
    #[arg(long)]
    pub skip_course_check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Work out the target: the assignment URL wins over explicit ids.
    pub fn target(&self) -> Result<Target, TargetError> {
        if let Some(url) = &self.url {
            return parse_assignment_url(url);
        }
        match (self.course, self.assignment) {
            (Some(course_id), Some(assignment_id)) => {
                let base_url = self
                    .base_url
                    .clone()
                    .ok_or(TargetError::Missing("--base-url"))?;
                Ok(Target {
                    base_url,
                    course_id,
                    assignment_id,
                })
            }
            _ => Err(TargetError::Missing(
                "--url, or --base-url with --course and --assignment",
            )),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn concurrency_limit(&self) -> Option<usize> {
        self.max_concurrent.map(NonZeroUsize::get)
    }
}
