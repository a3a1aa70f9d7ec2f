// UI layer: drives one submission run from the terminal. Prompts and the
// spinner live here; everything that talks to the network is in `api` and
// `upload`.

use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::api::ApiClient;
use crate::config::Args;
use crate::error::RunError;
use crate::file::expand_patterns;
use crate::target::{find_course, Target, UploadContext};
use crate::upload::upload_and_submit;

const TOKEN_FILE: &str = ".canvas_submit_token";

/// Run one submission: resolve target and token, check the course, upload
/// every matched file and submit them together.
pub async fn run(args: Args) -> Result<()> {
    let target = args.target().context("Could not determine the assignment")?;
    let token = resolve_token(args.token.as_deref())?;
    let save_to = args.save_token.then(token_path);
    let ctx = build_context(&token, &target, save_to.as_deref())?;
    let api = ApiClient::new(args.timeout())?;

    if !args.skip_course_check {
        let courses = api
            .list_courses(&ctx)
            .await
            .context("Failed to list courses")?;
        let course = find_course(&courses, ctx.course_id()).with_context(|| {
            format!(
                "Course {} is not among your {} courses (use --skip-course-check to bypass)",
                ctx.course_id(),
                courses.len()
            )
        })?;
        info!(id = course.id, name = %course.name, "found course");
    }

    let paths = expand_patterns(&args.files)?;
    info!(
        files = paths.len(),
        course = ctx.course_id(),
        assignment = ctx.assignment_id(),
        "uploading to {}",
        ctx.base_url()
    );

    let spinner = spinner(format!("Uploading {} file(s)...", paths.len()))?;
    let result = upload_and_submit(&api, &ctx, &paths, args.concurrency_limit()).await;
    spinner.finish_and_clear();

    match result {
        Ok(refs) => {
            for (path, file_ref) in paths.iter().zip(&refs) {
                println!("  {} -> file {}", path.display(), file_ref.id);
            }
            println!("Submitted {} file(s).", refs.len());
            Ok(())
        }
        Err(e) => {
            report(&e);
            Err(e.into())
        }
    }
}

fn report(err: &RunError) {
    match err {
        RunError::Upload(e) => error!(
            path = %e.path.display(),
            stage = %e.stage,
            kind = ?e.kind(),
            "upload failed, nothing was submitted: {}",
            e.source
        ),
        RunError::Submit(e) => error!("submission failed: {e}"),
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Pick the token from the command line or environment, then the saved token
/// file, then an interactive prompt.
fn resolve_token(given: Option<&str>) -> Result<String> {
    if let Some(token) = given.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Ok(token) = load_token() {
        let token = token.trim();
        if !token.is_empty() {
            info!("using saved token");
            return Ok(token.to_string());
        }
    }
    if !std::io::stdin().is_terminal() {
        bail!("No API token: pass --token or set CANVAS_TOKEN");
    }
    // Hidden input so the token does not end up in the scrollback.
    let token: String = Password::new().with_prompt("API token").interact()?;
    Ok(token)
}

fn token_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(TOKEN_FILE)
}

/// Validate the token by building the context, and only then save it when
/// `save_to` is set.
fn build_context(token: &str, target: &Target, save_to: Option<&Path>) -> Result<UploadContext> {
    let ctx = UploadContext::from_target(token, target).context("Invalid upload target")?;
    if let Some(path) = save_to {
        persist_token(path, token)?;
    }
    Ok(ctx)
}

/// Persist token into a file readable only by the current user.
fn persist_token(path: &Path, token: &str) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to save token to {}", path.display()))?;
    // `mode` only applies on creation; tighten an older file too.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(token.as_bytes())?;
    info!(path = %path.display(), "saved token");
    Ok(())
}

/// Load token from the user's home directory file.
fn load_token() -> Result<String> {
    let data = std::fs::read_to_string(token_path())?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target {
            base_url: "https://canvas.example.edu".into(),
            course_id: 10,
            assignment_id: 25,
        }
    }

    #[test]
    fn rejected_token_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        let err = build_context("bad\ntoken", &target(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid upload target"));
        assert!(!path.exists());
    }

    #[test]
    fn valid_token_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        let ctx = build_context("secret", &target(), Some(&path)).unwrap();
        assert_eq!(ctx.course_id(), 10);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "secret");
    }

    #[cfg(unix)]
    #[test]
    fn saved_token_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        persist_token(&path, "secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "secret");
    }
}
