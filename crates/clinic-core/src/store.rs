//! 存储抽象
//!
//! 挂号、排队和通知三条业务流程只依赖这里的 trait，
//! PostgreSQL 实现位于 `clinic-database`，内存实现位于 `clinic-workflow`。

use crate::error::Result;
use crate::models::*;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// 挂号事务的入口
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// 开启一个新的挂号事务
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>>;
}

/// 单次挂号事务
///
/// 未调用 `commit` 就被丢弃的事务必须整体回滚。
#[async_trait]
pub trait BookingTransaction: Send {
    /// 指定用户是否为医生
    async fn is_doctor(&mut self, user_id: Uuid) -> Result<bool>;

    /// 同一患者、同一医生、同一天是否已有未取消的预约
    async fn has_active_appointment(
        &mut self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool>;

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> Result<Appointment>;

    /// 原子地取得指定日期的下一个排队号
    async fn next_queue_number(&mut self, date: NaiveDate) -> Result<i32>;

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry>;

    async fn insert_notification(&mut self, notification: &NewNotification) -> Result<Notification>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 排队与预约状态存储
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn get_queue_entry(&self, id: Uuid) -> Result<Option<QueueEntry>>;

    async fn get_queue_entry_by_appointment(&self, appointment_id: Uuid) -> Result<Option<QueueEntry>>;

    /// 某日全部排队条目，按排队号升序
    async fn list_queue_by_date(&self, date: NaiveDate) -> Result<Vec<QueueEntry>>;

    /// 比较并设置：仅当当前状态为 `from` 时更新为 `to`。
    ///
    /// 进入 `in_progress` 时记录 `called_at`，进入 `completed` 时记录 `completed_at`。
    /// 状态不匹配或条目不存在时返回 `None`。
    async fn update_queue_status(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>>;

    /// 同 `update_queue_status`，更新成功时在同一事务内写入通知。
    ///
    /// 通知写入失败时状态更新一并回滚。
    async fn update_queue_status_with_notification(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
        notification: &NewNotification,
    ) -> Result<Option<QueueEntry>>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// 比较并设置预约状态，返回是否有行被更新
    async fn update_appointment_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool>;

    /// 取消预约：预约 confirmed → cancelled，同时把排队条目 waiting → skipped。
    ///
    /// 两处更新在同一事务内完成。预约不是 confirmed，或排队条目存在但不是
    /// waiting 时不做任何修改并返回 `false`。
    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<bool>;
}

/// 通知存储
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification>;

    /// 批量插入，单条语句完成，返回插入行数
    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64>;

    async fn user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>>;

    /// 用户自己的通知，最新的在前
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64>;
}
