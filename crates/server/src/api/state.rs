use std::sync::Arc;

use purchasing_core::workflow::ApprovalWorkflow;
use purchasing_db::repositories::{
    AuditRepository, RequestRepository, SqlAuditRepository, SqlRequestRepository,
    SqlUserRepository, UserRepository,
};
use purchasing_db::DbPool;

#[derive(Clone)]
pub struct ApiState {
    pub requests: Arc<dyn RequestRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl ApiState {
    pub fn from_pool(db_pool: DbPool, workflow: ApprovalWorkflow) -> Self {
        Self {
            requests: Arc::new(SqlRequestRepository::new(db_pool.clone(), workflow)),
            audit: Arc::new(SqlAuditRepository::new(db_pool.clone())),
            users: Arc::new(SqlUserRepository::new(db_pool)),
        }
    }
}
