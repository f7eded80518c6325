//! Incremental FTP deploy.
//!
//! Mirrors a local build directory into a remote folder, uploading only
//! files that are missing remotely or whose local modification time is newer
//! than the remote one.

pub mod credentials;
pub mod remote;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, instrument};

use themekit_assets::FileSet;
use themekit_shared::{Result, ThemekitError};

pub use credentials::{Credentials, load_credentials};
pub use remote::{Connector, FtpConnector, FtpRemote, MemoryRemote, RemoteStore};

/// Why a file is scheduled for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadReason {
    Missing,
    Newer,
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    pub reason: UploadReason,
}

#[derive(Debug, Clone, Default)]
pub struct DeployPlan {
    pub uploads: Vec<Upload>,
    /// Remote paths already up to date.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub uploaded: Vec<String>,
    pub skipped: usize,
}

/// Join a remote folder and a relative local path with `/` separators.
pub fn remote_path(folder: &str, relative: &Path) -> String {
    let mut out = folder.trim_end_matches('/').to_string();
    for component in relative.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn remote_parent(path: &str) -> Option<&str> {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .filter(|p| !p.is_empty())
}

/// Local modification time truncated to whole seconds (FTP `MDTM` precision).
fn local_modified(path: &Path) -> Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ThemekitError::io(path, e))?;
    Ok(DateTime::<Utc>::from(modified).trunc_subsecs(0))
}

/// Compare every file under `local_root` with its remote counterpart.
pub fn plan_uploads(
    local_root: &Path,
    remote_folder: &str,
    remote: &mut dyn RemoteStore,
) -> Result<DeployPlan> {
    if !local_root.is_dir() {
        return Err(ThemekitError::Deploy(format!(
            "nothing to deploy: {} does not exist, run the build first",
            local_root.display()
        )));
    }

    let files = FileSet::collect(local_root, "**/*")?;
    let mut plan = DeployPlan::default();

    for (local, relative) in files.iter() {
        let target = remote_path(remote_folder, relative);
        let reason = match remote.modified(&target)? {
            None => Some(UploadReason::Missing),
            Some(remote_time) if local_modified(&local)? > remote_time => Some(UploadReason::Newer),
            Some(_) => None,
        };

        match reason {
            Some(reason) => plan.uploads.push(Upload {
                local,
                remote: target,
                reason,
            }),
            None => plan.skipped.push(target),
        }
    }

    Ok(plan)
}

/// Upload the changed files under `local_root`.
///
/// With `dry_run` the plan is computed and logged but nothing is written.
#[instrument(skip_all, fields(root = %local_root.display(), dry_run = dry_run))]
pub fn deploy(local_root: &Path, connector: &dyn Connector, dry_run: bool) -> Result<DeployReport> {
    let folder = connector.remote_folder().to_string();
    let mut session = connector.connect()?;

    let plan = plan_uploads(local_root, &folder, session.as_mut())?;
    info!(
        uploads = plan.uploads.len(),
        up_to_date = plan.skipped.len(),
        "deploy plan ready"
    );

    let mut report = DeployReport {
        uploaded: Vec::with_capacity(plan.uploads.len()),
        skipped: plan.skipped.len(),
    };

    for upload in &plan.uploads {
        if dry_run {
            info!(path = %upload.remote, reason = ?upload.reason, "would upload");
            report.uploaded.push(upload.remote.clone());
            continue;
        }

        if let Some(parent) = remote_parent(&upload.remote) {
            session.ensure_dir(parent)?;
        }
        let contents =
            std::fs::read(&upload.local).map_err(|e| ThemekitError::io(&upload.local, e))?;
        session.upload(&upload.remote, &contents)?;
        debug!(path = %upload.remote, bytes = contents.len(), "uploaded");
        report.uploaded.push(upload.remote.clone());
    }

    session.finish()?;
    info!(uploaded = report.uploaded.len(), skipped = report.skipped, "deploy finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn build_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();
        std::fs::write(dir.path().join("assets/css/main.min.css"), "body{}").unwrap();
        dir
    }

    #[test]
    fn remote_paths_use_forward_slashes() {
        assert_eq!(
            remote_path("/public_html/", Path::new("assets/css/main.min.css")),
            "/public_html/assets/css/main.min.css"
        );
        assert_eq!(remote_path("", Path::new("index.html")), "/index.html");
        assert_eq!(remote_parent("/public_html/index.html"), Some("/public_html"));
        assert_eq!(remote_parent("/index.html"), None);
    }

    #[test]
    fn first_deploy_uploads_everything_then_nothing() {
        let dir = build_dir();
        let remote = MemoryRemote::new("/www");

        let first = deploy(dir.path(), &remote, false).unwrap();
        assert_eq!(first.uploaded.len(), 2);
        assert_eq!(
            remote.paths(),
            vec!["/www/assets/css/main.min.css", "/www/index.html"]
        );
        assert!(remote.has_dir("/www/assets/css"));

        let second = deploy(dir.path(), &remote, false).unwrap();
        assert!(second.uploaded.is_empty());
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn stale_remote_file_is_replaced() {
        let dir = build_dir();
        let remote = MemoryRemote::new("/www");
        let old = Utc::now() - Duration::days(30);
        remote.insert("/www/index.html", b"old", old).unwrap();
        remote
            .insert("/www/assets/css/main.min.css", b"body{}", Utc::now() + Duration::days(1))
            .unwrap();

        let mut session = remote.clone();
        let plan = plan_uploads(dir.path(), "/www", &mut session).unwrap();
        assert_eq!(plan.uploads.len(), 1);
        assert_eq!(plan.uploads[0].remote, "/www/index.html");
        assert_eq!(plan.uploads[0].reason, UploadReason::Newer);

        deploy(dir.path(), &remote, false).unwrap();
        assert_eq!(remote.get("/www/index.html").unwrap(), b"<p>hi</p>");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = build_dir();
        let remote = MemoryRemote::new("/www");

        let report = deploy(dir.path(), &remote, true).unwrap();
        assert_eq!(report.uploaded.len(), 2);
        assert!(remote.paths().is_empty());
    }

    #[test]
    fn missing_build_dir_is_deploy_error() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemote::new("/www");
        let err = deploy(&dir.path().join("dist"), &remote, false).unwrap_err();
        assert!(matches!(err, ThemekitError::Deploy(_)));
    }
}
