// Per-file upload pipeline and the fan-out over all matched files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{UploadBucket, UploadedFileRef};
use crate::error::{FileUploadError, RunError, Stage, StepError, SubmitError};
use crate::file::LocalFile;
use crate::submission;
use crate::target::UploadContext;

/// The LMS operations the pipeline needs. `ApiClient` is the real
/// implementation; tests swap in their own.
#[async_trait]
pub trait LmsApi: Sync {
    /// Ask the LMS for a storage destination for `file_name` of `size` bytes.
    async fn request_bucket(
        &self,
        ctx: &UploadContext,
        file_name: &str,
        size: u64,
    ) -> Result<UploadBucket, StepError>;

    /// Post the file to storage and return the confirmation location.
    async fn upload_to_storage(
        &self,
        bucket: UploadBucket,
        file: LocalFile,
    ) -> Result<Url, StepError>;

    async fn confirm_upload(
        &self,
        ctx: &UploadContext,
        location: &Url,
    ) -> Result<UploadedFileRef, StepError>;

    async fn submit(&self, ctx: &UploadContext, file_ids: &[u64]) -> Result<(), SubmitError>;
}

fn at(path: &Path, stage: Stage) -> impl FnOnce(StepError) -> FileUploadError + '_ {
    move |source| FileUploadError {
        path: path.to_path_buf(),
        stage,
        source,
    }
}

/// Upload one file: resolve, request a bucket, post to storage, confirm.
pub async fn upload_file<A>(
    api: &A,
    ctx: &UploadContext,
    path: &Path,
) -> Result<UploadedFileRef, FileUploadError>
where
    A: LmsApi + ?Sized,
{
    let file = LocalFile::resolve(path)
        .await
        .map_err(at(path, Stage::Resolve))?;
    debug!(path = %path.display(), size = file.size(), "resolved file");

    let bucket = api
        .request_bucket(ctx, file.name(), file.size())
        .await
        .map_err(at(path, Stage::RequestBucket))?;
    debug!(path = %path.display(), upload_url = %bucket.upload_url, "got upload bucket");

    let location = api
        .upload_to_storage(bucket, file)
        .await
        .map_err(at(path, Stage::UploadToStorage))?;
    debug!(path = %path.display(), %location, "stored file");

    let file_ref = api
        .confirm_upload(ctx, &location)
        .await
        .map_err(at(path, Stage::ConfirmUpload))?;
    info!(path = %path.display(), id = file_ref.id, "uploaded file");
    Ok(file_ref)
}

/// Upload every path concurrently, at most `limit` at a time when set.
///
/// Results come back in the order of `paths`. After a failure, uploads that
/// have not started yet are skipped; those already running finish. The error
/// returned is the one for the earliest failing path.
pub async fn upload_all<A>(
    api: &A,
    ctx: &UploadContext,
    paths: &[PathBuf],
    limit: Option<usize>,
) -> Result<Vec<UploadedFileRef>, FileUploadError>
where
    A: LmsApi + ?Sized,
{
    let width = limit.unwrap_or(paths.len()).max(1);
    let failed = AtomicBool::new(false);

    let uploads = paths.iter().map(|path| {
        let failed = &failed;
        async move {
            if failed.load(Ordering::Relaxed) {
                debug!(path = %path.display(), "skipping upload after earlier failure");
                return None;
            }
            let result = upload_file(api, ctx, path).await;
            if let Err(e) = &result {
                warn!(path = %path.display(), stage = %e.stage, "upload failed: {}", e.source);
                failed.store(true, Ordering::Relaxed);
            }
            Some(result)
        }
    });

    let results: Vec<_> = stream::iter(uploads).buffered(width).collect().await;

    let mut refs = Vec::with_capacity(paths.len());
    for result in results.into_iter().flatten() {
        refs.push(result?);
    }
    Ok(refs)
}

/// Upload all files, then submit them together. Nothing is submitted unless
/// every file uploaded.
pub async fn upload_and_submit<A>(
    api: &A,
    ctx: &UploadContext,
    paths: &[PathBuf],
    limit: Option<usize>,
) -> Result<Vec<UploadedFileRef>, RunError>
where
    A: LmsApi + ?Sized,
{
    let refs = upload_all(api, ctx, paths, limit).await?;
    submission::submit(api, ctx, &refs).await?;
    Ok(refs)
}
