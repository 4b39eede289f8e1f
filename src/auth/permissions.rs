//! Role based module visibility.
//!
//! Roles and their modules come from `[permissions.roles]` in the config
//! rather than from code, so a deployment can change them without a release.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::config::PermissionsConfig;

/// Grants every module.
pub const ALL_MODULES: &str = "*";

#[derive(Debug, Clone, Default)]
pub struct ModulePolicy {
    roles: HashMap<String, BTreeSet<String>>,
}

impl ModulePolicy {
    pub fn from_config(config: &PermissionsConfig) -> Self {
        let roles = config
            .roles
            .iter()
            .map(|(role, modules)| {
                (
                    role.to_lowercase(),
                    modules.iter().map(|m| m.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { roles }
    }

    /// Role of a backend user object: `role`, `perfil`, or the first group.
    pub fn role_of(user: &Value) -> Option<&str> {
        user.get("role")
            .or_else(|| user.get("perfil"))
            .and_then(Value::as_str)
            .or_else(|| {
                let first = user.get("groups")?.as_array()?.first()?;
                first.as_str().or_else(|| first.get("name")?.as_str())
            })
    }

    fn is_superuser(user: &Value) -> bool {
        user.get("is_superuser").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn has_module(&self, user: &Value, module: &str) -> bool {
        if Self::is_superuser(user) {
            return true;
        }
        let Some(modules) = Self::role_of(user).and_then(|r| self.roles.get(&r.to_lowercase())) else {
            return false;
        };
        modules.contains(ALL_MODULES) || modules.contains(&module.to_lowercase())
    }

    /// Sorted module list, `["*"]` for unrestricted users.
    pub fn modules_for(&self, user: &Value) -> Vec<String> {
        if Self::is_superuser(user) {
            return vec![ALL_MODULES.to_string()];
        }
        match Self::role_of(user).and_then(|r| self.roles.get(&r.to_lowercase())) {
            Some(modules) if modules.contains(ALL_MODULES) => vec![ALL_MODULES.to_string()],
            Some(modules) => modules.iter().cloned().collect(),
            None => Vec::new(),
        }
    }
}
