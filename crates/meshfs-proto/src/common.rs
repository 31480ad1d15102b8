//! Authentication and credential types attached to every DIR call.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Authentication mechanism of an RPC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum AuthType {
    /// No authentication; internal cluster traffic.
    None = 0,
    /// Shared-secret password authentication.
    Password = 1,
}

/// Authentication token of an RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub auth_type: AuthType,
}

impl Auth {
    /// The anonymous token used by internal cluster services.
    pub fn none() -> Self {
        Self {
            auth_type: AuthType::None,
        }
    }
}

/// User identity attached to an RPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub groups: Vec<String>,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            groups,
        }
    }
}

/// Auth token plus credentials, passed with every DIR operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcContext {
    pub auth: Auth,
    pub creds: UserCredentials,
}

impl RpcContext {
    /// Context with the anonymous token and the given identity.
    pub fn with_credentials(username: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            auth: Auth::none(),
            creds: UserCredentials::new(username, vec![group.into()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_type_conversion() {
        assert_eq!(u8::from(AuthType::None), 0);
        assert_eq!(AuthType::try_from(1u8).unwrap(), AuthType::Password);
        assert!(AuthType::try_from(7u8).is_err());
    }

    #[test]
    fn test_rpc_context_with_credentials() {
        let ctx = RpcContext::with_credentials("hb-thread", "meshfs-services");
        assert_eq!(ctx.auth.auth_type, AuthType::None);
        assert_eq!(ctx.creds.username, "hb-thread");
        assert_eq!(ctx.creds.groups, vec!["meshfs-services".to_string()]);
    }

    #[test]
    fn test_credentials_serde() {
        let creds = UserCredentials::new("svc", vec!["g1".into(), "g2".into()]);
        let json = serde_json::to_string(&creds).unwrap();
        let parsed: UserCredentials = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, creds);
    }
}
