//! GitHub REST adapter
//!
//! Repository metadata and recursive trees come from the REST API; file bodies
//! come from the raw-content host, always addressed by an explicit branch.
//!
//! ## Authentication
//!
//! Set `GITHUB_TOKEN` to raise the anonymous rate limit from 60/hr to 5000/hr:
//! ```bash
//! export GITHUB_TOKEN="ghp_xxxxxxxxxxxxxxxxxxxx"
//! ```

use super::{ContentReader, EntryKind, RemoteHost, RemoteTree, TreeEntry};
use crate::core::config::Settings;
use crate::core::error::{FetchError, Result};
use crate::location::{RepositoryLocation, encode_path, encode_segment};
use serde::Deserialize;

const USER_AGENT: &str = concat!("gitslice/", env!("CARGO_PKG_VERSION"));

/// Longest upstream body excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GitHubHost {
    agent: ureq::Agent,
    api_base: String,
    raw_base: String,
    token: Option<String>,
}

impl GitHubHost {
    pub fn new(settings: &Settings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.http_timeout)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: settings.api_base.clone(),
            raw_base: settings.raw_base.clone(),
            token: settings.token.clone(),
        }
    }

    /// Create a request builder with the GitHub JSON accept header and optional auth.
    fn api_request(&self, url: &str) -> ureq::Request {
        let request = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json");
        self.authorize(request)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {}", token)),
            None => request,
        }
    }

    fn repo_url(&self, location: &RepositoryLocation) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            encode_segment(&location.owner),
            encode_segment(&location.repository)
        )
    }
}

impl RemoteHost for GitHubHost {
    fn default_branch(&self, location: &RepositoryLocation) -> Result<String> {
        let what = format!("repository {}", location.slug());
        let response = self
            .api_request(&self.repo_url(location))
            .call()
            .map_err(|e| classify(e, &what))?;

        let body: RepoResponse = response
            .into_json()
            .map_err(|e| FetchError::InvalidResponse(format!("repository metadata: {}", e)))?;

        body.default_branch
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| FetchError::MissingDefaultBranch(location.slug()))
    }

    fn tree(&self, location: &RepositoryLocation, tree_ish: &str) -> Result<RemoteTree> {
        let url = format!(
            "{}/git/trees/{}?recursive=1",
            self.repo_url(location),
            encode_path(tree_ish)
        );
        let what = format!("tree '{}' in {}", tree_ish, location.slug());
        let response = self
            .api_request(&url)
            .call()
            .map_err(|e| classify(e, &what))?;

        let body: TreeResponse = response
            .into_json()
            .map_err(|e| FetchError::InvalidResponse(format!("tree listing: {}", e)))?;

        // "commit" entries are submodules; they have no content here.
        let entries = body
            .tree
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "blob" => EntryKind::File,
                    "tree" => EntryKind::Directory,
                    _ => return None,
                };
                Some(TreeEntry {
                    path: item.path,
                    kind,
                })
            })
            .collect();

        Ok(RemoteTree {
            entries,
            truncated: body.truncated,
        })
    }

    fn open_file(&self, location: &RepositoryLocation, path: &str) -> Result<ContentReader> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            encode_segment(&location.owner),
            encode_segment(&location.repository),
            encode_path(&location.branch),
            encode_path(path)
        );
        let response = self
            .authorize(self.agent.get(&url))
            .call()
            .map_err(|e| classify(e, path))?;
        Ok(response.into_reader())
    }
}

/// Map a ureq failure onto the error taxonomy.
fn classify(err: ureq::Error, what: &str) -> FetchError {
    match err {
        ureq::Error::Status(404, _) => FetchError::NotFound(what.to_owned()),
        ureq::Error::Status(403, response) | ureq::Error::Status(429, response)
            if is_rate_limited(&response) =>
        {
            FetchError::RateLimited {
                reset_at: rate_limit_reset(&response),
            }
        }
        ureq::Error::Status(403, _) => FetchError::Forbidden(what.to_owned()),
        ureq::Error::Status(status, response) => {
            let mut message = response.into_string().unwrap_or_default();
            if message.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            if message.trim().is_empty() {
                message = what.to_owned();
            }
            FetchError::Upstream { status, message }
        }
        ureq::Error::Transport(t) => FetchError::NetworkUnavailable(t.to_string()),
    }
}

fn is_rate_limited(response: &ureq::Response) -> bool {
    response.status() == 429
        || response
            .header("x-ratelimit-remaining")
            .is_some_and(|v| v.trim() == "0")
}

/// Reset time as a unix timestamp, from `x-ratelimit-reset` or `retry-after`.
fn rate_limit_reset(response: &ureq::Response) -> Option<u64> {
    if let Some(reset) = response
        .header("x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(reset);
    }
    let retry_after = response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())?;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(now + retry_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host_for(server: &MockServer) -> GitHubHost {
        let settings = Settings::default().with_bases(server.uri(), format!("{}/raw", server.uri()));
        GitHubHost::new(&settings)
    }

    fn location(branch: &str) -> RepositoryLocation {
        RepositoryLocation {
            host: "github.com".into(),
            owner: "owner".into(),
            repository: "repo".into(),
            branch: branch.into(),
            subpath: String::new(),
        }
    }

    #[tokio::test]
    async fn test_default_branch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"default_branch": "trunk"})),
            )
            .mount(&server)
            .await;

        let branch = host_for(&server).default_branch(&location("")).unwrap();
        assert_eq!(branch, "trunk");
    }

    #[tokio::test]
    async fn test_default_branch_missing_is_hard_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let result = host_for(&server).default_branch(&location(""));
        assert!(matches!(result, Err(FetchError::MissingDefaultBranch(_))));
    }

    #[tokio::test]
    async fn test_tree_maps_kinds_and_skips_submodules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/git/trees/main"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc",
                "truncated": true,
                "tree": [
                    {"path": "docs", "type": "tree"},
                    {"path": "docs/a.md", "type": "blob"},
                    {"path": "vendor/lib", "type": "commit"}
                ]
            })))
            .mount(&server)
            .await;

        let tree = host_for(&server).tree(&location("main"), "main").unwrap();
        assert!(tree.truncated);
        assert_eq!(
            tree.entries,
            vec![TreeEntry::dir("docs"), TreeEntry::file("docs/a.md")]
        );
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = host_for(&server).default_branch(&location(""));
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_403_with_exhausted_quota_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "1700000000"),
            )
            .mount(&server)
            .await;

        match host_for(&server).default_branch(&location("")) {
            Err(FetchError::RateLimited { reset_at }) => assert_eq!(reset_at, Some(1_700_000_000)),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_403_with_quota_left_is_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "42"))
            .mount(&server)
            .await;

        let result = host_for(&server).default_branch(&location(""));
        assert!(matches!(result, Err(FetchError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_500_is_upstream_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo/git/trees/main"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        match host_for(&server).tree(&location("main"), "main") {
            Err(FetchError::Upstream { status, message }) => {
                assert_eq!(status, 502);
                assert!(message.contains("bad gateway"));
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_host_is_network_unavailable() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let settings = Settings::default().with_bases("http://127.0.0.1:9", "http://127.0.0.1:9");
        let host = GitHubHost::new(&settings);
        let result = host.default_branch(&location(""));
        assert!(matches!(result, Err(FetchError::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_open_file_uses_explicit_branch_and_encodes_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw/owner/repo/main/docs/my%20file.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("content"))
            .mount(&server)
            .await;

        let mut reader = host_for(&server)
            .open_file(&location("main"), "docs/my file.md")
            .unwrap();
        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        assert_eq!(body, "content");
    }

    #[tokio::test]
    async fn test_token_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/repo"))
            .and(header("Authorization", "Bearer sekrit"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"default_branch": "main"})),
            )
            .mount(&server)
            .await;

        let mut settings = Settings::default().with_bases(server.uri(), server.uri());
        settings.token = Some("sekrit".into());
        let branch = GitHubHost::new(&settings).default_branch(&location("")).unwrap();
        assert_eq!(branch, "main");
    }
}
