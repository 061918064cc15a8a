//! Role and group registration.
//!
//! Registration happens once at startup through [`RegistryBuilder`]. Calling
//! [`RegistryBuilder::build`] freezes everything into a [`Registry`] that has
//! no mutation methods and is shared read-only by the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::group::Group;
use super::role::Role;

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Conflicting registrations. The server must not start serving after one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("role already exists: {role}")]
    DuplicateRole { role: String },
    #[error("group already exists: {role}/{group}")]
    DuplicateGroup { role: String, group: String },
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Startup-time builder for roles and groups.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    roles: HashMap<String, Role>,
    /// role label -> group label -> group
    groups: HashMap<String, HashMap<String, Group>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty role and returns it for configuration.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateRole` if `label` is already registered.
    /// The existing role is left untouched.
    pub fn register_role(&mut self, label: &str) -> Result<&mut Role, RegistryError> {
        if self.roles.contains_key(label) {
            return Err(RegistryError::DuplicateRole {
                role: label.to_string(),
            });
        }
        Ok(self
            .roles
            .entry(label.to_string())
            .or_insert_with(|| Role::new(label)))
    }

    /// Registers an empty group under `role_label` and returns it for configuration.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateGroup` if the `(role, group)` pair is
    /// already registered.
    pub fn register_group(
        &mut self,
        role_label: &str,
        group_label: &str,
    ) -> Result<&mut Group, RegistryError> {
        let groups = self.groups.entry(role_label.to_string()).or_default();
        if groups.contains_key(group_label) {
            return Err(RegistryError::DuplicateGroup {
                role: role_label.to_string(),
                group: group_label.to_string(),
            });
        }
        Ok(groups
            .entry(group_label.to_string())
            .or_insert_with(|| Group::new(role_label, group_label)))
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> Registry {
        for role in self.groups.keys() {
            if !self.roles.contains_key(role) {
                warn!(role = %role, "groups registered for unknown role are unreachable");
            }
        }

        let roles: HashMap<String, Arc<Role>> = self
            .roles
            .into_iter()
            .map(|(label, role)| (label, Arc::new(role)))
            .collect();
        let groups: HashMap<String, HashMap<String, Arc<Group>>> = self
            .groups
            .into_iter()
            .map(|(role, groups)| {
                let groups = groups
                    .into_iter()
                    .map(|(label, group)| (label, Arc::new(group)))
                    .collect();
                (role, groups)
            })
            .collect();

        info!(
            roles = roles.len(),
            groups = groups.values().map(HashMap::len).sum::<usize>(),
            "dispatch registry built"
        );
        Registry { roles, groups }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable role/group lookup table.
#[derive(Debug)]
pub struct Registry {
    roles: HashMap<String, Arc<Role>>,
    groups: HashMap<String, HashMap<String, Arc<Group>>>,
}

impl Registry {
    #[must_use]
    pub fn find_role(&self, label: &str) -> Option<&Arc<Role>> {
        self.roles.get(label)
    }

    #[must_use]
    pub fn find_group(&self, role_label: &str, group_label: &str) -> Option<&Arc<Group>> {
        self.groups.get(role_label)?.get(group_label)
    }

    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
