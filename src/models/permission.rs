//! Permission rules and the role-indexed permission table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::user::Role;

/// HTTP methods a permission rule can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

impl TryFrom<&axum::http::Method> for HttpMethod {
    type Error = String;

    fn try_from(method: &axum::http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// One grant: `role` may call `method` on any path under `path_prefix`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub role: Role,
    pub method: HttpMethod,
    pub path_prefix: String,
}

impl PermissionRule {
    pub fn new(role: Role, method: HttpMethod, path_prefix: impl Into<String>) -> Self {
        Self {
            role,
            method,
            path_prefix: path_prefix.into(),
        }
    }

    /// Method must be equal; the path must start with the prefix on a segment boundary,
    /// so `/book` covers `/book` and `/book/7/instance` but not `/bookshelf`.
    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        if self.method != method {
            return false;
        }

        let prefix = self.path_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return path.starts_with('/');
        }

        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Rules indexed by role. Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    rules: HashMap<Role, Vec<PermissionRule>>,
}

impl PermissionTable {
    pub fn from_rules(rules: impl IntoIterator<Item = PermissionRule>) -> Self {
        let mut table: HashMap<Role, Vec<PermissionRule>> = HashMap::new();
        for rule in rules {
            if !rule.role.is_recognized() {
                tracing::warn!(role = %rule.role, "Ignoring permission rule for unrecognized role");
                continue;
            }
            table.entry(rule.role.clone()).or_default().push(rule);
        }
        Self { rules: table }
    }

    pub fn rules_for(&self, role: &Role) -> &[PermissionRule] {
        self.rules.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Built-in grants used when the configuration does not list any rule
pub fn default_rules() -> Vec<PermissionRule> {
    use HttpMethod::*;

    let member = |role: Role| {
        vec![
            PermissionRule::new(role.clone(), Patch, "/reset-password"),
            PermissionRule::new(role.clone(), Get, "/review"),
            PermissionRule::new(role.clone(), Post, "/review"),
            PermissionRule::new(role.clone(), Get, "/borrow"),
            PermissionRule::new(role.clone(), Post, "/borrow"),
            PermissionRule::new(role, Get, "/history"),
        ]
    };

    let mut rules = member(Role::Student);
    rules.extend(member(Role::Teacher));
    rules.extend([
        PermissionRule::new(Role::Manager, Patch, "/reset-password"),
        PermissionRule::new(Role::Manager, Get, "/book"),
        PermissionRule::new(Role::Manager, Post, "/book"),
        PermissionRule::new(Role::Manager, Patch, "/book"),
        PermissionRule::new(Role::Manager, Delete, "/book"),
        PermissionRule::new(Role::Manager, Post, "/return"),
        PermissionRule::new(Role::Admin, Patch, "/reset-password"),
        PermissionRule::new(Role::Admin, Post, "/register-manager"),
        PermissionRule::new(Role::Admin, Get, "/system-logs"),
        PermissionRule::new(Role::Admin, Get, "/users"),
    ]);
    rules
}
