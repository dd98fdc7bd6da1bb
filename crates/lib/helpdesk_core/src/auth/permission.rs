//! Permission codes carried by every account and every token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::AuthError;

/// Closed set of permission codes. `User` is the lowest privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Permission {
    Admin,
    Technician,
    Support,
    Infra,
    Telephony,
    Printers,
    Registrar,
    #[default]
    User,
    Developer,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::Admin,
        Permission::Technician,
        Permission::Support,
        Permission::Infra,
        Permission::Telephony,
        Permission::Printers,
        Permission::Registrar,
        Permission::User,
        Permission::Developer,
    ];

    /// Wire/storage code.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Admin => "admin",
            Permission::Technician => "technician",
            Permission::Support => "support",
            Permission::Infra => "infra",
            Permission::Telephony => "telephony",
            Permission::Printers => "printers",
            Permission::Registrar => "registrar",
            Permission::User => "user",
            Permission::Developer => "developer",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| AuthError::ValidationError(format!("unknown permission '{code}'")))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
