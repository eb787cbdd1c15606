//! 通知分发
//!
//! 单用户通知作为其他操作的副作用写入；群发按角色取出全部用户后一次性批量写入。
//! 没有推送，用户轮询自己的通知列表。

use clinic_core::store::NotificationStore;
use clinic_core::{ClinicError, NewNotification, Notification, NotificationKind, Result, Role};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 群发请求
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub role: Role,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// 通知服务
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// 给单个用户发送通知
    pub async fn notify(&self, notification: NewNotification) -> Result<Notification> {
        validate_content(&notification.title, &notification.message)?;
        let stored = self.store.insert_notification(&notification).await?;
        info!(
            "Notification {} ({}) sent to user {}",
            stored.id, stored.kind, stored.user_id
        );
        Ok(stored)
    }

    /// 按角色群发，返回收件人数量
    pub async fn broadcast(&self, broadcast: Broadcast) -> Result<usize> {
        validate_content(&broadcast.title, &broadcast.message)?;

        let recipients = self.store.user_ids_by_role(broadcast.role).await?;
        if recipients.is_empty() {
            info!("Broadcast to role {} skipped: no recipients", broadcast.role);
            return Ok(0);
        }

        let batch: Vec<NewNotification> = recipients
            .iter()
            .map(|user_id| {
                NewNotification::new(
                    *user_id,
                    broadcast.title.clone(),
                    broadcast.message.clone(),
                    broadcast.kind,
                )
            })
            .collect();

        let inserted = self.store.insert_notifications(&batch).await?;
        info!("Broadcast to role {} delivered to {} users", broadcast.role, inserted);
        Ok(batch.len())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.list_notifications(user_id).await
    }

    /// 标记单条通知为已读，只能操作自己的通知
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<()> {
        if self.store.mark_notification_read(user_id, notification_id).await? {
            Ok(())
        } else {
            Err(ClinicError::NotFound("Notifikasi tidak ditemukan".to_string()))
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.store.mark_all_notifications_read(user_id).await
    }
}

fn validate_content(title: &str, message: &str) -> Result<()> {
    if title.trim().is_empty() || message.trim().is_empty() {
        return Err(ClinicError::Validation(
            "Judul dan pesan notifikasi wajib diisi".to_string(),
        ));
    }
    Ok(())
}
