// API client module: talks to the LMS REST API and to the storage backend
// that file payloads are posted to. Each protocol step is one method; the
// orchestration lives in `upload`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH, LINK, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{StepError, SubmitError};
use crate::file::LocalFile;
use crate::submission::submission_query;
use crate::target::{Course, UploadContext};
use crate::upload::LmsApi;

/// Form field the file content goes under when the LMS does not name one.
const DEFAULT_FILE_PARAM: &str = "file";

const MAX_COURSE_PAGES: usize = 50;

/// Storage destination returned by the bucket request.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBucket {
    pub upload_url: Url,
    /// Fields to echo back to storage verbatim, in response order.
    pub upload_params: Vec<(String, String)>,
    pub file_param: String,
}

/// Durable file object returned by the confirm step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileRef {
    pub id: u64,
    pub url: Url,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, rename = "content-type", alias = "content_type")]
    pub content_type: Option<String>,
}

/// Raw bucket response, before the params are checked.
#[derive(Debug, Deserialize)]
struct BucketResponse {
    upload_url: Url,
    upload_params: Map<String, Value>,
    #[serde(default)]
    file_param: Option<String>,
}

impl TryFrom<BucketResponse> for UploadBucket {
    type Error = StepError;

    fn try_from(resp: BucketResponse) -> Result<Self, StepError> {
        let mut upload_params = Vec::with_capacity(resp.upload_params.len());
        for (key, value) in resp.upload_params {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(StepError::protocol(format!(
                        "upload param {key} has non-scalar value {other}"
                    )))
                }
            };
            upload_params.push((key, text));
        }
        Ok(UploadBucket {
            upload_url: resp.upload_url,
            upload_params,
            file_param: resp
                .file_param
                .unwrap_or_else(|| DEFAULT_FILE_PARAM.to_string()),
        })
    }
}

/// Async client for the LMS API and its storage backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    /// Does not follow redirects, so the storage `Location` header is visible.
    storage: Client,
}

impl ApiClient {
    /// Build both HTTP clients, applying `timeout` to every request when set.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut api = Client::builder();
        let mut storage = Client::builder().redirect(redirect::Policy::none());
        if let Some(t) = timeout {
            api = api.timeout(t);
            storage = storage.timeout(t);
        }
        Ok(ApiClient {
            client: api.build().context("Failed to build HTTP client")?,
            storage: storage
                .build()
                .context("Failed to build storage HTTP client")?,
        })
    }

    /// List the courses visible to the token's owner, following `Link`
    /// pagination up to `MAX_COURSE_PAGES` pages.
    pub async fn list_courses(&self, ctx: &UploadContext) -> Result<Vec<Course>, StepError> {
        let mut courses = Vec::new();
        let mut next = Some(format!("{}?per_page=100", ctx.endpoint("api/v1/courses")));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_COURSE_PAGES {
                tracing::warn!(pages, "stopped following course list pagination");
                break;
            }
            pages += 1;
            let res = self
                .client
                .get(url)
                .header(AUTHORIZATION, ctx.authorization().clone())
                .send()
                .await?;
            next = next_link(res.headers());
            let page: Vec<Course> = decode(res).await?;
            courses.extend(page);
        }
        Ok(courses)
    }
}

#[async_trait]
impl LmsApi for ApiClient {
    async fn request_bucket(
        &self,
        ctx: &UploadContext,
        file_name: &str,
        size: u64,
    ) -> Result<UploadBucket, StepError> {
        let url = ctx.endpoint(&format!("{}/submissions/self/files", ctx.assignment_path()));
        let form = Form::new()
            .text("name", file_name.to_string())
            .text("size", size.to_string());

        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, ctx.authorization().clone())
            .multipart(form)
            .send()
            .await?;
        let raw: BucketResponse = decode(res).await?;
        UploadBucket::try_from(raw)
    }

    async fn upload_to_storage(
        &self,
        bucket: UploadBucket,
        file: LocalFile,
    ) -> Result<Url, StepError> {
        let UploadBucket {
            upload_url,
            upload_params,
            file_param,
        } = bucket;

        let mut form = Form::new();
        for (key, value) in upload_params {
            form = form.text(key, value);
        }
        let name = file.name().to_string();
        let size = file.size();
        let part = Part::stream_with_length(file.into_body(), size).file_name(name);
        form = form.part(file_param, part);

        let res = self
            .storage
            .post(upload_url.clone())
            .multipart(form)
            .send()
            .await?;
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(status_error(res).await);
        }

        let location = res
            .headers()
            .get(LOCATION)
            .ok_or_else(|| StepError::protocol("storage response has no Location header"))?
            .to_str()
            .map_err(|_| StepError::protocol("storage Location header is not valid text"))?;
        upload_url
            .join(location)
            .map_err(|e| StepError::protocol(format!("bad storage Location {location:?}: {e}")))
    }

    async fn confirm_upload(
        &self,
        ctx: &UploadContext,
        location: &Url,
    ) -> Result<UploadedFileRef, StepError> {
        let res = self
            .client
            .post(location.clone())
            .header(AUTHORIZATION, ctx.authorization().clone())
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;
        decode(res).await
    }

    async fn submit(&self, ctx: &UploadContext, file_ids: &[u64]) -> Result<(), SubmitError> {
        let url = format!(
            "{}?{}",
            ctx.endpoint(&format!("{}/submissions", ctx.assignment_path())),
            submission_query(file_ids)
        );
        let res = self
            .client
            .post(url)
            .header(AUTHORIZATION, ctx.authorization().clone())
            .header(CONTENT_LENGTH, 0)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Check the status, then decode the body; shape mismatches are protocol errors.
async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, StepError> {
    if !res.status().is_success() {
        return Err(status_error(res).await);
    }
    let body = res.bytes().await?;
    parse_body(&body)
}

/// Target of the `rel="next"` entry of a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            matches!(p.trim().split_once('='), Some(("rel", v)) if v.trim_matches('"') == "next")
        });
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| target.to_string())
    })
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, StepError> {
    serde_json::from_slice(body).map_err(|e| StepError::protocol(e.to_string()))
}

async fn status_error(res: Response) -> StepError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    StepError::Status { status, body }
}
