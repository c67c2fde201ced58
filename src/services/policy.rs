//! Access policy engine
//!
//! Decides whether a role may invoke `(method, path)`. Grants are purely additive:
//! one matching rule allows the request, anything else is denied.

use std::sync::Arc;

use crate::models::{
    permission::{HttpMethod, PermissionTable},
    user::Role,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

#[derive(Clone)]
pub struct AccessPolicy {
    table: Arc<PermissionTable>,
}

impl AccessPolicy {
    pub fn new(table: Arc<PermissionTable>) -> Self {
        Self { table }
    }

    /// `path` must already have the routing prefix stripped.
    pub fn authorize(&self, role: &Role, method: HttpMethod, path: &str) -> Decision {
        if !role.is_recognized() {
            return Decision::Deny;
        }

        let allowed = self
            .table
            .rules_for(role)
            .iter()
            .any(|rule| rule.matches(method, path));

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Same as [`authorize`](Self::authorize) for a raw request method. Methods no rule can
    /// name (HEAD, OPTIONS, ...) are denied.
    pub fn authorize_request(&self, role: &Role, method: &axum::http::Method, path: &str) -> Decision {
        match HttpMethod::try_from(method) {
            Ok(method) => self.authorize(role, method, path),
            Err(_) => Decision::Deny,
        }
    }
}
