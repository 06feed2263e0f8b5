//! Repository location parsing
//!
//! Turns `host/owner/repo[/{tree|blob}/branch[/subpath]]` (with or without an
//! `https://` scheme) into a [`RepositoryLocation`]. Purely syntactic: no
//! network access happens here.

use crate::core::error::{FetchError, Result};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt;

/// Characters escaped inside a single URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode one path segment.
pub(crate) fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Percent-encode a slash-separated path, leaving the slashes intact.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Where to fetch from. `branch` and `subpath` are empty when the URL did not
/// name them; an empty branch is resolved to the default branch later, an
/// empty subpath means the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocation {
    pub host: String,
    pub owner: String,
    pub repository: String,
    pub branch: String,
    pub subpath: String,
}

impl RepositoryLocation {
    /// Parse a repository URL.
    ///
    /// # Example
    /// ```
    /// use gitslice::RepositoryLocation;
    ///
    /// let loc = RepositoryLocation::parse("https://github.com/o/r/tree/main/docs/api").unwrap();
    /// assert_eq!(loc.owner, "o");
    /// assert_eq!(loc.branch, "main");
    /// assert_eq!(loc.subpath, "docs/api");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| FetchError::InvalidLocation {
            input: input.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty input"));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("https://{}", trimmed)
        };

        let url = url::Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http:// and https:// URLs are supported"));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_owned();

        let raw: Vec<&str> = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let owner = raw
            .first()
            .map(|s| decode(s))
            .transpose()
            .map_err(|e| invalid(&e))?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing owner"))?;

        let repository = raw
            .get(1)
            .map(|s| decode(s))
            .transpose()
            .map_err(|e| invalid(&e))?
            .map(|s| s.strip_suffix(".git").map(str::to_owned).unwrap_or(s))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing repository"))?;

        let (branch, subpath) = match raw.get(2) {
            None => (String::new(), String::new()),
            Some(&"tree") | Some(&"blob") => {
                let branch = match raw.get(3) {
                    Some(s) => decode(s).map_err(|e| invalid(&e))?,
                    None => String::new(),
                };
                let subpath = if raw.len() > 4 {
                    decode(&raw[4..].join("/")).map_err(|e| invalid(&e))?
                } else {
                    String::new()
                };
                (branch, subpath.trim_matches('/').to_owned())
            }
            Some(other) => {
                return Err(invalid(&format!(
                    "expected 'tree' or 'blob' after the repository, got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            host,
            owner,
            repository,
            branch,
            subpath,
        })
    }

    /// Copy of this location with `branch` filled in.
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..self.clone()
        }
    }

    /// `owner/repo`, used in messages.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// Canonical URL form. Parsing it yields the same fields.
    pub fn canonical_url(&self) -> String {
        let mut out = format!(
            "https://{}/{}/{}",
            self.host,
            encode_segment(&self.owner),
            encode_segment(&self.repository)
        );
        if !self.branch.is_empty() {
            out.push_str("/tree/");
            out.push_str(&encode_segment(&self.branch));
            if !self.subpath.is_empty() {
                out.push('/');
                out.push_str(&encode_path(&self.subpath));
            }
        }
        out
    }

    /// Last component of the subpath, if any.
    pub fn leaf_name(&self) -> Option<&str> {
        self.subpath.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())?;
        if !self.subpath.is_empty() {
            write!(f, "/{}", self.subpath)?;
        }
        if !self.branch.is_empty() {
            write!(f, " @ {}", self.branch)?;
        }
        Ok(())
    }
}

fn decode(segment: &str) -> std::result::Result<String, String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| format!("invalid percent-encoding in '{}': {}", segment, e))
}
