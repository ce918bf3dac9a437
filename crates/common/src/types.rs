//! Common data types for mesh authentication components.

use crate::error::MeshAuthError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric security identity of an endpoint.
///
/// An identity names a security principal (a group of workloads), not an
/// address. The same identity is shared by every endpoint carrying the
/// same security-relevant labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub u32);

impl Identity {
    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Identity {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identifier of a node hosting remote endpoints.
///
/// Node `0` always refers to the local node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The local node.
    pub const LOCAL: NodeId = NodeId(0);

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Whether this id refers to the local node.
    #[must_use]
    pub const fn is_local(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for NodeId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// Authentication strategy required by policy for a pair of identities.
///
/// The discriminants are the codes the datapath uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum AuthType {
    /// No real authentication; served by the null handler which always succeeds.
    Disabled = 0,
    /// Mutual certificate-based authentication.
    Mutual = 1,
    /// Always rejects. Used for deny-by-policy setups and testing.
    AlwaysFail = 2,
}

impl AuthType {
    /// All known auth types.
    pub const ALL: [AuthType; 3] = [AuthType::Disabled, AuthType::Mutual, AuthType::AlwaysFail];

    /// Returns the auth type as a string for log fields and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthType::Disabled => "disabled",
            AuthType::Mutual => "mutual",
            AuthType::AlwaysFail => "always-fail",
        }
    }

    /// Returns the wire code of this auth type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for AuthType {
    type Error = MeshAuthError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AuthType::Disabled),
            1 => Ok(AuthType::Mutual),
            2 => Ok(AuthType::AlwaysFail),
            other => Err(MeshAuthError::UnknownAuthType(other)),
        }
    }
}

impl std::str::FromStr for AuthType {
    type Err = MeshAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MeshAuthError::InvalidValue(format!("unknown auth type '{s}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_codes_are_stable() {
        assert_eq!(AuthType::Disabled.code(), 0);
        assert_eq!(AuthType::Mutual.code(), 1);
        assert_eq!(AuthType::AlwaysFail.code(), 2);

        for auth_type in AuthType::ALL {
            assert_eq!(AuthType::try_from(auth_type.code()).unwrap(), auth_type);
        }
    }

    #[test]
    fn test_auth_type_rejects_unknown_code() {
        let err = AuthType::try_from(7).unwrap_err();
        assert!(matches!(err, MeshAuthError::UnknownAuthType(7)));
        assert_eq!(err.to_string(), "Unknown auth type code: 7");
    }

    #[test]
    fn test_auth_type_from_str() {
        assert_eq!("mutual".parse::<AuthType>().unwrap(), AuthType::Mutual);
        assert_eq!(
            "always-fail".parse::<AuthType>().unwrap(),
            AuthType::AlwaysFail
        );
        assert!("spiffe".parse::<AuthType>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_bare_numbers() {
        assert_eq!(serde_json::to_string(&Identity(1000)).unwrap(), "1000");
        assert_eq!(serde_json::to_string(&NodeId(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&AuthType::AlwaysFail).unwrap(),
            "\"always-fail\""
        );
        let identity: Identity = serde_json::from_str("42").unwrap();
        assert_eq!(identity, Identity(42));
    }

    #[test]
    fn test_local_node() {
        assert!(NodeId::LOCAL.is_local());
        assert!(!NodeId(3).is_local());
        assert_eq!(NodeId::default(), NodeId::LOCAL);
    }
}
