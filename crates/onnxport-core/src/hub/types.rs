//! Wire types for the registry API.

use serde::{Deserialize, Serialize};

/// Response from the `whoami-v2` endpoint. Only the account name is used.
#[derive(Debug, Clone, Deserialize)]
pub struct WhoamiResponse {
    pub name: String,
}

/// Request body for repository creation.
///
/// `organization` carries the destination namespace. The registry treats
/// the authenticated account's own name like any other namespace here, so
/// organization repositories and personal ones go through the same shape.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    pub repo_type: &'a str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<&'a str>,
    pub private: bool,
}
