// Submission aggregation: turns the confirmed uploads of one run into a
// single assignment submission.

use crate::api::UploadedFileRef;
use crate::error::SubmitError;
use crate::target::UploadContext;
use crate::upload::LmsApi;

/// Submit every uploaded file as one "online upload" submission, preserving
/// the order of `refs`. Never issues a request for an empty list.
pub async fn submit<A>(
    api: &A,
    ctx: &UploadContext,
    refs: &[UploadedFileRef],
) -> Result<(), SubmitError>
where
    A: LmsApi + ?Sized,
{
    if refs.is_empty() {
        return Err(SubmitError::Empty);
    }
    let ids: Vec<u64> = refs.iter().map(|r| r.id).collect();
    tracing::info!(
        course = ctx.course_id(),
        assignment = ctx.assignment_id(),
        files = ids.len(),
        "submitting assignment"
    );
    api.submit(ctx, &ids).await
}

/// Query string for the submission request. Brackets are left literal, which
/// is how the LMS documents the parameters.
pub fn submission_query(file_ids: &[u64]) -> String {
    let mut query = String::from("submission[submission_type]=online_upload");
    for id in file_ids {
        query.push_str(&format!("&submission[file_ids][]={id}"));
    }
    query
}
