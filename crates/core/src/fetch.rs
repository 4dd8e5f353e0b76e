//! Remote source fetcher: raw file contents of a repository at a commit.

use std::io::Read;
use std::time::Duration;

use crate::services::oracle::{OracleError, SourceRef};

/// Anything that can hand back file bytes for `(repo, commit, path)`.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, OracleError>;
}

/// Split a repository URL into `(user, project)` using its last two path segments.
///
/// Accepts `https://host/user/project(.git)` as well as `git@host:user/project.git`.
pub fn repo_owner_and_name(repo_url: &str) -> Option<(String, String)> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let mut segments = trimmed.rsplit(['/', ':']).filter(|s| !s.is_empty() && !s.contains('@'));
    let project = segments.next()?;
    let user = segments.next()?;
    let project = project.strip_suffix(".git").unwrap_or(project);
    if project.is_empty() {
        return None;
    }
    Some((user.to_string(), project.to_string()))
}

/// Build `<host>/<user>/<project>/<commit>/<path>`.
pub fn raw_content_url(raw_host: &str, source: &SourceRef) -> Option<String> {
    let (user, project) = repo_owner_and_name(&source.repo)?;
    Some(format!(
        "{}/{}/{}/{}/{}",
        raw_host.trim_end_matches('/'),
        user,
        project,
        source.commit,
        source.path.trim_start_matches('/')
    ))
}

/// Fetches files from a raw-content HTTP endpoint (GitHub style).
pub struct RawContentFetcher {
    raw_host: String,
    agent: ureq::Agent,
}

impl RawContentFetcher {
    pub fn new(raw_host: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(timeout)
            .build();
        Self { raw_host: raw_host.into(), agent }
    }
}

impl SourceFetcher for RawContentFetcher {
    fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, OracleError> {
        let url = raw_content_url(&self.raw_host, source).ok_or_else(|| OracleError::Fetch {
            url: source.repo.clone(),
            reason: "cannot derive user/project from repository URL".to_string(),
        })?;
        log::debug!("fetching {url}");

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(OracleError::NotFound { url }),
            Err(e) => return Err(OracleError::Fetch { url, reason: e.to_string() }),
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| OracleError::Fetch { url: url.clone(), reason: e.to_string() })?;
        Ok(body)
    }
}
