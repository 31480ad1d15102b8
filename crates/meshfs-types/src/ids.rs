use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a service instance, stable for the process lifetime.
///
/// The value is an opaque string assigned when the service is provisioned;
/// the cluster never derives meaning from its contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceUuid(String);

impl ServiceUuid {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceUuid({})", self.0)
    }
}

impl fmt::Display for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ServiceUuid {
    fn from(uuid: String) -> Self {
        Self(uuid)
    }
}

impl From<&str> for ServiceUuid {
    fn from(uuid: &str) -> Self {
        Self(uuid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_service_uuid_basic() {
        let id = ServiceUuid::new("osd-1");
        assert_eq!(id.as_str(), "osd-1");
        assert_eq!(format!("{}", id), "osd-1");
        assert_eq!(format!("{:?}", id), "ServiceUuid(osd-1)");
    }

    #[test]
    fn test_service_uuid_from() {
        let a: ServiceUuid = "mrc-7".into();
        let b = ServiceUuid::from("mrc-7".to_string());
        assert_eq!(a, b);
        assert_eq!(b.into_string(), "mrc-7");
    }

    #[test]
    fn test_service_uuid_hash() {
        let mut set = HashSet::new();
        set.insert(ServiceUuid::new("a"));
        set.insert(ServiceUuid::new("b"));
        set.insert(ServiceUuid::new("a"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_service_uuid_serde() {
        let id = ServiceUuid::new("vol-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"vol-42\"");
        let parsed: ServiceUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
