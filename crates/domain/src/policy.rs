use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::CallAddress;

/// Name of an authorization group, unique within one policy.
pub type UniqueGroupName = String;

/// Grants access to exactly one call address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPermission {
    /// Address the holder may call.
    #[serde(rename = "callAddress")]
    pub call_address: CallAddress,
}

/// All permissions held by one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermissions {
    /// Permission entries scanned in order during authorization.
    pub permissions: Vec<CallPermission>,
}

impl GroupPermissions {
    /// Returns whether any entry matches the address on all four fields.
    #[must_use]
    pub fn allows(&self, call_address: &CallAddress) -> bool {
        self.permissions
            .iter()
            .any(|permission| &permission.call_address == call_address)
    }
}

/// Persisted permission policy: group name to granted call addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Group entries keyed by unique group name.
    #[serde(rename = "permissionsRecords")]
    pub permissions_records: HashMap<UniqueGroupName, GroupPermissions>,
}

/// Authorization group derived from validated token claims.
///
/// One token currently yields exactly one group; callers receive a
/// list to leave room for multi-group derivation later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// The group's unique name, today the caller's `owner/repo` identity.
    #[serde(rename = "uniqueGroupName")]
    pub unique_group_name: UniqueGroupName,
}
