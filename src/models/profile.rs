//! User-directory profile served by the proxy

use serde::{Deserialize, Serialize};

/// Fixed subset of a GitHub user profile.
///
/// Every field is optional upstream; missing fields serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: Option<String>,
    pub name: Option<String>,
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
}
