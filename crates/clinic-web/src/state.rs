//! 应用共享状态

use crate::auth::AuthService;
use clinic_database::{DatabasePool, DatabaseQueries, PgStore};
use clinic_workflow::{AppointmentService, NotificationService, QueueService};
use std::sync::Arc;

/// 所有处理器共享的状态，克隆开销很小
#[derive(Clone)]
pub struct AppState {
    pub db: DatabasePool,
    pub auth: Arc<AuthService>,
    pub booking: AppointmentService,
    pub queue: QueueService,
    pub notifications: NotificationService,
}

impl AppState {
    /// 以 PostgreSQL 存储组装各业务服务
    pub fn new(db: DatabasePool, auth: AuthService) -> Self {
        let store = Arc::new(PgStore::new(db.clone()));
        let notifications = NotificationService::new(store.clone());
        let queue = QueueService::new(store.clone());
        let booking = AppointmentService::new(store, queue.clone());

        Self {
            db,
            auth: Arc::new(auth),
            booking,
            queue,
            notifications,
        }
    }

    pub fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.db)
    }
}
