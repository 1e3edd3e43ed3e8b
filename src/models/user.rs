use serde::{Deserialize, Serialize};

use super::enums::Role;

/// Registered identity as stored under `users/{uid}`.
///
/// `uid` never changes and `role` is fixed at signup; `display_name`
/// and `photo_url` follow profile edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

/// Partial edit of the fields every user may change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}
