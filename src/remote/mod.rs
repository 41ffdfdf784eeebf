//! Remote recipe repository access.
//!
//! A GitHub client behind the [`RepositoryApi`] trait, a TTL cache of the
//! recipe listing with stale-on-error fallback, and the URL helpers used for
//! browsing and publishing.

mod cache;
mod github;
mod http;
mod links;
mod types;

pub use cache::RepositoryCache;
pub use github::{GitHubClient, RepositoryApi};
pub use links::publish_url;
pub use types::{RemoteFileDescriptor, RepoCoordinates};

#[cfg(test)]
pub(crate) use cache::fake::FakeRepositoryApi;
