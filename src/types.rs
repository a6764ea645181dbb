/// Shared types used across the codebase

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// Roles a profile can hold. Stored upper-case (`USER`, `ADMIN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Exact match only; `admin` is not `ADMIN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}', expected 'ADMIN' or 'USER'", other)),
        }
    }
}

/// Set of roles a route accepts. Membership of any one role is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet(Arc<[Role]>);

impl RoleSet {
    pub fn new(roles: impl Into<Vec<Role>>) -> Self {
        let mut unique: Vec<Role> = Vec::new();
        for role in roles.into() {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        Self(unique.into())
    }

    pub fn admin() -> Self {
        Self::new(vec![Role::Admin])
    }

    pub fn any_role() -> Self {
        Self::new(vec![Role::Admin, Role::User])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Parse a comma separated list such as `ADMIN,USER`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let roles = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Role::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if roles.is_empty() {
            return Err("role list is empty".to_string());
        }
        Ok(Self::new(roles))
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Role::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// Account lifecycle. Persisted as the boolean `status` field (`true` = active).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum AccountState {
    #[default]
    Active,
    Deactivated,
}

impl AccountState {
    pub fn is_active(&self) -> bool {
        matches!(self, AccountState::Active)
    }

    /// Soft delete. Already deactivated accounts stay deactivated.
    pub fn deactivate(self) -> Self {
        AccountState::Deactivated
    }

    pub fn activate(self) -> Self {
        AccountState::Active
    }
}

impl From<bool> for AccountState {
    fn from(active: bool) -> Self {
        if active {
            AccountState::Active
        } else {
            AccountState::Deactivated
        }
    }
}

impl From<AccountState> for bool {
    fn from(state: AccountState) -> Self {
        state.is_active()
    }
}

/// What a schedule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Profesor,
    Seccion,
    Salon,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Profesor => "profesor",
            ScheduleType::Seccion => "seccion",
            ScheduleType::Salon => "salon",
        }
    }
}

impl FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profesor" => Ok(ScheduleType::Profesor),
            "seccion" => Ok(ScheduleType::Seccion),
            "salon" => Ok(ScheduleType::Salon),
            other => Err(format!(
                "Invalid type '{}', expected one of: profesor, seccion, salon",
                other
            )),
        }
    }
}

/// School shift of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Jornada {
    Matutina,
    Vespertina,
}

impl Jornada {
    pub fn as_str(&self) -> &'static str {
        match self {
            Jornada::Matutina => "matutina",
            Jornada::Vespertina => "vespertina",
        }
    }
}

impl FromStr for Jornada {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matutina" => Ok(Jornada::Matutina),
            "vespertina" => Ok(Jornada::Vespertina),
            other => Err(format!(
                "Invalid jornada '{}', expected one of: matutina, vespertina",
                other
            )),
        }
    }
}

/// An image accepted by the upload extractor, held in memory until relayed.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// File name without extension, reduced to characters safe for a public id.
    pub fn stem(&self) -> String {
        let stem = self
            .file_name
            .split('.')
            .next()
            .unwrap_or_default();
        let cleaned: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if cleaned.is_empty() {
            "upload".to_string()
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_exact() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("admin".parse::<Role>().is_err());
        assert!("CLIENT".parse::<Role>().is_err());
    }

    #[test]
    fn role_set_membership_is_or() {
        let set = RoleSet::parse_list("ADMIN, USER").unwrap();
        assert!(set.contains(Role::Admin));
        assert!(set.contains(Role::User));
        assert!(!RoleSet::admin().contains(Role::User));
        assert!(RoleSet::parse_list(" , ").is_err());
    }

    #[test]
    fn account_state_serializes_as_status_flag() {
        assert_eq!(serde_json::to_value(AccountState::Active).unwrap(), serde_json::json!(true));
        let state: AccountState = serde_json::from_value(serde_json::json!(false)).unwrap();
        assert_eq!(state, AccountState::Deactivated);
        assert_eq!(state.deactivate(), AccountState::Deactivated);
        assert!(state.activate().is_active());
    }

    #[test]
    fn upload_stem_strips_extension_and_unsafe_characters() {
        let file = UploadedFile {
            file_name: "mi foto.final.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: Bytes::from_static(b"x"),
        };
        assert_eq!(file.stem(), "mi_foto");
    }
}
