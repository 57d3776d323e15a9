use std::fmt;

use serde::{Deserialize, Serialize};

// ── Users ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    #[default]
    Personal,
    Academic,
    Professional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaritalStatus {
    Married,
    #[default]
    Single,
    Widowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Public view of a user. The credential hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub profile_photo: Option<String>,
    pub header_image: Option<String>,
    pub account_type: AccountType,
    pub marital_status: MaritalStatus,
    pub biography: Option<String>,
    pub date_of_birth: Option<String>,
    pub joined: String,
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

/// Editable profile fields. Absent fields are left unchanged on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub profile_photo: Option<String>,
    pub header_image: Option<String>,
    pub account_type: Option<AccountType>,
    pub marital_status: Option<MaritalStatus>,
    pub biography: Option<String>,
    pub date_of_birth: Option<String>,
    pub location: Option<Location>,
}

// ── Tuits ──

/// Counters embedded in every tuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub replies: i64,
    pub retuits: i64,
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuit {
    pub id: i64,
    pub tuit: String,
    pub posted_by: i64,
    pub posted_on: String,
    pub stats: Stats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTuit {
    pub tuit: String,
}

// ── Reactions ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub kind: ReactionKind,
    pub user_id: i64,
    pub tuit_id: i64,
    pub created_at: String,
}

/// Result of a like/dislike toggle: the pair's new state and the tuit's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub reaction: Option<ReactionKind>,
    pub stats: Stats,
}

// ── Social graph ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub user_following: User,
    pub user_followed: User,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub bookmarked_by: i64,
    pub tuit: Tuit,
    pub created_at: String,
}

// ── Messages ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub from: i64,
    pub to: i64,
    pub message: String,
    pub sent_on: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub message: String,
}
