// GitHub REST implementation of the CommitSource port.
//
// Responsibilities
// - Call GET /repos/{owner}/{name} and GET /repos/{owner}/{name}/commits.
// - Follow the Link rel="next" header until the listing is drained. A listing longer than the
//   page cap is an error, never a partial result.
// - Skip listed commits that carry no author or committer signature.

use crate::modules::commits_sync::adapters::outbound::commit_source::{
    CommitSource, UpstreamError,
};
use crate::modules::commits_sync::core::commit::{CommitAuthor, CommitRecord, RepositoryInfo};
use crate::modules::commits_sync::core::fetch_window::FetchWindow;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: &str = "100";

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Upper bound on pages followed for one listing.
    pub max_pages: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            max_pages: 1_000,
        }
    }
}

pub struct GithubCommitSource {
    client: Client,
    api_url: String,
    timeout: Duration,
    max_pages: usize,
}

impl GithubCommitSource {
    pub fn new(config: GithubConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("commit_watch/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| UpstreamError::Transport(format!("invalid token header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            max_pages: config.max_pages.max(1),
        })
    }

    async fn get(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(UpstreamError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn transport(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else if error.is_decode() {
            UpstreamError::Decode(error.to_string())
        } else {
            UpstreamError::Transport(error.to_string())
        }
    }
}

fn not_found(repository: &RepositoryId, error: UpstreamError) -> UpstreamError {
    match error {
        UpstreamError::Status { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            UpstreamError::NotFound(repository.clone())
        }
        other => other,
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Extracts the rel="next" target from a Link header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut segments = part.split(';').map(str::trim);
        let target = segments.next()?;
        let is_next = segments.any(|param| param == r#"rel="next""#);
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| url.to_string())
    })
}

#[derive(Deserialize)]
struct RepoDto {
    id: i64,
    full_name: String,
    #[serde(default)]
    watchers_count: i32,
    #[serde(default)]
    stargazers_count: i32,
    #[serde(default)]
    forks_count: i32,
    language: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RepoDto> for RepositoryInfo {
    fn from(dto: RepoDto) -> Self {
        Self {
            id: dto.id,
            full_name: dto.full_name,
            watchers: dto.watchers_count,
            star_gazers: dto.stargazers_count,
            forks: dto.forks_count,
            language: dto.language,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct SignatureDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct GitCommitDto {
    author: Option<SignatureDto>,
    committer: Option<SignatureDto>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct AccountDto {
    #[serde(default)]
    login: String,
    #[serde(default)]
    id: i64,
}

#[derive(Deserialize)]
struct CommitDto {
    sha: String,
    html_url: Option<String>,
    commit: GitCommitDto,
    author: Option<AccountDto>,
}

impl CommitDto {
    fn into_record(self, repository: &RepositoryId) -> Option<CommitRecord> {
        let signature = self.commit.author?;
        let committed = self.commit.committer?;
        let account = self.author;
        Some(CommitRecord {
            hash: self.sha,
            author: CommitAuthor {
                id: account.as_ref().map(|a| a.id).unwrap_or_default(),
                name: signature.name,
                email: signature.email,
                username: account.map(|a| a.login).unwrap_or_default(),
            },
            message: self.commit.message,
            url: self.html_url,
            created_at: committed.date,
            repository: repository.clone(),
        })
    }
}

pub fn decode_commit_page(
    repository: &RepositoryId,
    body: &[u8],
) -> Result<Vec<CommitRecord>, UpstreamError> {
    let page: Vec<CommitDto> =
        serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    Ok(page
        .into_iter()
        .filter_map(|dto| dto.into_record(repository))
        .collect())
}

#[async_trait]
impl CommitSource for GithubCommitSource {
    async fn fetch_repo(&self, repository: &RepositoryId) -> Result<RepositoryInfo, UpstreamError> {
        let url = format!(
            "{}/repos/{}/{}",
            self.api_url,
            repository.owner(),
            repository.name()
        );
        let response = self
            .get(self.client.get(&url))
            .await
            .map_err(|e| not_found(repository, e))?;
        let dto: RepoDto = response.json().await.map_err(|e| self.transport(e))?;
        Ok(dto.into())
    }

    async fn fetch_commits(
        &self,
        repository: &RepositoryId,
        window: FetchWindow,
    ) -> Result<Vec<CommitRecord>, UpstreamError> {
        let mut query = vec![
            ("since", timestamp(window.since)),
            ("per_page", PER_PAGE.to_string()),
        ];
        if let Some(until) = window.until {
            query.push(("until", timestamp(until)));
        }

        let first = format!(
            "{}/repos/{}/{}/commits",
            self.api_url,
            repository.owner(),
            repository.name()
        );
        let mut request = self.client.get(&first).query(&query);
        let mut commits = Vec::new();

        for page in 1..=self.max_pages {
            let response = self
                .get(request)
                .await
                .map_err(|e| not_found(repository, e))?;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_link);
            let body = response.bytes().await.map_err(|e| self.transport(e))?;
            commits.extend(decode_commit_page(repository, &body)?);

            let Some(next) = next else {
                tracing::debug!(%repository, pages = page, commits = commits.len(), "commit listing drained");
                return Ok(commits);
            };
            request = self.client.get(next);
        }

        tracing::warn!(%repository, max_pages = self.max_pages, "commit listing exceeds page cap");
        Err(UpstreamError::Truncated {
            repository: repository.clone(),
            max_pages: self.max_pages,
        })
    }
}

#[cfg(test)]
mod github_commit_source_tests {
    use super::*;
    use crate::shared::infrastructure::retry::Retryable;
    use crate::tests::fixtures::github_stub::serve_commit_pages;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(
        r#"<https://api.github.com/repositories/1/commits?page=2>; rel="next", <https://api.github.com/repositories/1/commits?page=9>; rel="last""#,
        Some("https://api.github.com/repositories/1/commits?page=2")
    )]
    #[case(
        r#"<https://api.github.com/repositories/1/commits?page=1>; rel="prev", <https://api.github.com/repositories/1/commits?page=1>; rel="first""#,
        None
    )]
    #[case("", None)]
    fn it_should_find_the_next_page_link(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(next_link(header).as_deref(), expected);
    }

    #[rstest]
    fn it_should_map_listed_commits_and_skip_unsigned_ones() {
        let repository = RepositoryId::parse("octo/hello").unwrap();
        let body = json!([
            {
                "sha": "abc",
                "html_url": "https://github.com/octo/hello/commit/abc",
                "commit": {
                    "author": {"name": "Mona", "email": "mona@example.com", "date": "2024-01-02T00:00:00Z"},
                    "committer": {"name": "GitHub", "email": "noreply@github.com", "date": "2024-01-03T00:00:00Z"},
                    "message": "fix"
                },
                "author": {"login": "mona", "id": 7}
            },
            {
                "sha": "def",
                "html_url": null,
                "commit": {
                    "author": {"name": "Ghost", "email": "ghost@example.com", "date": "2024-01-01T00:00:00Z"},
                    "committer": {"name": "Ghost", "email": "ghost@example.com", "date": "2024-01-01T00:00:00Z"},
                    "message": "unlinked"
                },
                "author": null
            },
            {
                "sha": "ghi",
                "commit": {"author": null, "committer": null, "message": "broken"},
                "author": null
            }
        ]);
        let commits =
            decode_commit_page(&repository, body.to_string().as_bytes()).unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc");
        assert_eq!(commits[0].author.username, "mona");
        assert_eq!(commits[0].author.id, 7);
        assert_eq!(commits[0].author.name, "Mona");
        assert_eq!(
            commits[0].created_at,
            "2024-01-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(commits[1].author.username, "");
        assert_eq!(commits[1].author.identity_key(), "ghost@example.com");
        assert_eq!(commits[1].url, None);
    }

    #[rstest]
    fn it_should_report_an_undecodable_page() {
        let repository = RepositoryId::parse("octo/hello").unwrap();
        let result = decode_commit_page(&repository, b"{}");
        assert!(matches!(result, Err(UpstreamError::Decode(_))));
    }

    #[rstest]
    fn it_should_format_window_bounds_as_utc_seconds() {
        let value = "2024-01-03T04:05:06.789Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(timestamp(value), "2024-01-03T04:05:06Z");
    }

    fn stub_source(base: String, max_pages: usize) -> GithubCommitSource {
        GithubCommitSource::new(GithubConfig {
            api_url: base,
            max_pages,
            timeout: Duration::from_secs(2),
            ..GithubConfig::default()
        })
        .unwrap()
    }

    fn window() -> FetchWindow {
        FetchWindow {
            since: "2024-01-01T00:00:00Z".parse().unwrap(),
            until: None,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_follow_next_links_until_the_listing_is_drained() {
        let base = serve_commit_pages(3, Duration::ZERO).await;
        let source = stub_source(base, 5);
        let repository = RepositoryId::parse("a/b").unwrap();

        let commits = source.fetch_commits(&repository, window()).await.unwrap();

        let hashes: Vec<_> = commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec!["p1", "p2", "p3"]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_instead_of_returning_a_listing_cut_at_the_page_cap() {
        let base = serve_commit_pages(3, Duration::ZERO).await;
        let source = stub_source(base, 2);
        let repository = RepositoryId::parse("a/b").unwrap();

        let result = source.fetch_commits(&repository, window()).await;

        let error = result.unwrap_err();
        assert!(matches!(
            &error,
            UpstreamError::Truncated { max_pages: 2, .. }
        ));
        assert!(!error.is_transient());
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "integration: calls api.github.com"]
    async fn integration_it_should_fetch_a_public_repository() {
        let source = GithubCommitSource::new(GithubConfig::default()).unwrap();
        let repository = RepositoryId::parse("octocat/Hello-World").unwrap();
        let info = source.fetch_repo(&repository).await.unwrap();
        assert_eq!(info.full_name, "octocat/Hello-World");
    }
}
