use std::fmt;

use serde::{Deserialize, Serialize};

/// The `(role, group, action)` triple resolved by the routing layer.
///
/// The dispatch core never parses URLs; it only receives these three labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteLabels {
    /// Class of callers sharing common pre-processing (e.g. `"user"`, `"admin"`).
    pub role: String,
    /// Second-level grouping under the role (e.g. `"profile"`).
    pub group: String,
    /// Terminal named operation inside the group (e.g. `"get"`).
    pub action: String,
}

impl RouteLabels {
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        group: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            group: group.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for RouteLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.role, self.group, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_with_slashes() {
        let labels = RouteLabels::new("user", "profile", "get");
        assert_eq!(labels.to_string(), "user/profile/get");
    }
}
