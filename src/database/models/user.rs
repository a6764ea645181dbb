use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Record;
use crate::types::{AccountState, Role};

/// Application-owned profile stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub surname: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: AccountState,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccion_academica: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccion_tecnica: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frase: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Profile fields safe for the public yearbook listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub uid: String,
    pub name: String,
    pub surname: String,
    pub profile_picture: Option<String>,
    pub carnet: Option<String>,
    pub seccion_academica: Option<String>,
    pub seccion_tecnica: Option<String>,
    pub frase: Option<String>,
}

impl From<Record<Profile>> for PublicProfile {
    fn from(record: Record<Profile>) -> Self {
        let p = record.data;
        Self {
            uid: record.id,
            name: p.name,
            surname: p.surname,
            profile_picture: p.profile_picture,
            carnet: p.carnet,
            seccion_academica: p.seccion_academica,
            seccion_tecnica: p.seccion_tecnica,
            frase: p.frase,
        }
    }
}

/// Full profile with its uid, for the owner and administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub uid: String,
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<Record<Profile>> for ProfileView {
    fn from(record: Record<Profile>) -> Self {
        Self {
            uid: record.id,
            profile: record.data,
        }
    }
}
