//! Business logic services

pub mod audit;
pub mod ledger;
pub mod lending;
pub mod policy;

use std::sync::Arc;

use crate::{models::permission::PermissionTable, repository::LendingStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub policy: policy::AccessPolicy,
    pub lending: lending::LendingService,
    pub audit: Arc<dyn audit::AuditSink>,
}

impl Services {
    /// Wire services over a lending store and an audit sink
    pub fn new(
        store: Arc<dyn LendingStore>,
        audit: Arc<dyn audit::AuditSink>,
        permissions: PermissionTable,
    ) -> Self {
        Self {
            policy: policy::AccessPolicy::new(Arc::new(permissions)),
            lending: lending::LendingService::new(store, audit.clone()),
            audit,
        }
    }
}
