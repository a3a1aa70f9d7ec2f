// Library root
// -----------
// This crate exposes the submission pipeline as a library; the binary
// (`main.rs`) only parses arguments, sets up logging and calls `ui::run`.
//
// Module responsibilities:
// - `api`: HTTP calls to the LMS and its storage backend.
// - `config`: command-line and environment options.
// - `error`: error types for each pipeline stage and the submission.
// - `file`: resolving local files and expanding glob patterns.
// - `submission`: building the single submission request.
// - `target`: assignment URL parsing and the shared upload context.
// - `ui`: the terminal flow that ties everything together.
// - `upload`: the per-file pipeline and the concurrent fan-out.
pub mod api;
pub mod config;
pub mod error;
pub mod file;
pub mod submission;
pub mod target;
pub mod ui;
pub mod upload;

pub use api::{ApiClient, UploadBucket, UploadedFileRef};
pub use error::{ErrorKind, FileUploadError, RunError, Stage, StepError, SubmitError};
pub use target::UploadContext;
pub use upload::{upload_all, upload_and_submit, upload_file, LmsApi};
