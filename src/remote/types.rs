use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which repository and branch recipes are read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoCoordinates {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// One remote recipe file, with enough metadata to notice a change without
/// downloading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileDescriptor {
    pub path: String,
    /// Git blob sha of the file content
    pub sha: String,
    pub html_url: String,
    pub download_url: String,
}

impl RemoteFileDescriptor {
    /// Name of the directory holding the recipe file (`recipes/<name>/build.yaml`).
    pub fn recipe_name(&self) -> Option<&str> {
        let mut segments = self.path.rsplit('/');
        segments.next()?;
        segments.next().filter(|s| !s.is_empty())
    }
}

/// Latest commit on the tracked branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub message: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub sha: String,
}

/// Recipe listing plus repository metadata at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    pub recipes: Vec<RemoteFileDescriptor>,
    pub repository: RepositoryInfo,
    pub fetched_at: DateTime<Utc>,
}

impl RepositorySnapshot {
    /// Case-insensitive lookup by recipe name.
    pub fn find(&self, name: &str) -> Option<&RemoteFileDescriptor> {
        self.recipes.iter().find(|d| {
            d.recipe_name()
                .is_some_and(|recipe| recipe.eq_ignore_ascii_case(name))
        })
    }

    /// Recipe names in listing order.
    pub fn recipe_names(&self) -> Vec<&str> {
        self.recipes.iter().filter_map(|d| d.recipe_name()).collect()
    }
}

/// Freshness of the cached snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub is_valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub coordinates: Option<RepoCoordinates>,
}

/// Entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

// GitHub REST response shapes (only the fields read here).

#[derive(Debug, Deserialize)]
pub(super) struct BranchResponse {
    pub commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
pub(super) struct BranchCommit {
    pub commit: BranchCommitDetail,
}

#[derive(Debug, Deserialize)]
pub(super) struct BranchCommitDetail {
    pub tree: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub(super) struct ObjectRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitResponse {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitDetail {
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitAuthor {
    pub name: String,
    pub date: Option<DateTime<Utc>>,
}

impl From<CommitResponse> for RepositoryInfo {
    fn from(response: CommitResponse) -> Self {
        let (author, date) = match response.commit.author {
            Some(a) => (a.name, a.date),
            None => (String::new(), None),
        };
        Self {
            message: response.commit.message,
            author,
            date,
            sha: response.sha,
        }
    }
}
