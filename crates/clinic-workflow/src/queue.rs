//! 排队服务
//!
//! 叫号、完成、过号三种操作都先读出当前状态，经状态机校验后
//! 以"比较并设置"的单条更新落库，保证状态只会单调前进。
//! 叫号时的患者通知与状态更新一同提交。

use crate::state_machine::{QueueEvent, QueueStateMachine};
use chrono::{NaiveDate, Utc};
use clinic_core::store::QueueStore;
use clinic_core::{
    Appointment, AppointmentStatus, ClinicError, NewNotification, NotificationKind, QueueEntry,
    QueueStatus, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 患者查看自己排队进度时的返回结构
#[derive(Debug, Clone, Serialize)]
pub struct QueuePosition {
    pub queue: QueueEntry,
    /// 当天正在就诊的号码，没有则为 0
    #[serde(rename = "currentQueueNumber")]
    pub current_queue_number: i32,
}

/// 排队服务
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    machine: Arc<QueueStateMachine>,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            machine: Arc::new(QueueStateMachine::new()),
        }
    }

    /// 叫号：waiting → in_progress，并通知患者
    pub async fn call(&self, queue_id: Uuid) -> Result<QueueEntry> {
        self.apply(queue_id, QueueEvent::Call).await
    }

    /// 就诊完成：in_progress → completed，关联预约同时标记完成
    pub async fn complete(&self, queue_id: Uuid) -> Result<QueueEntry> {
        self.apply(queue_id, QueueEvent::Complete).await
    }

    /// 过号：waiting → skipped
    pub async fn skip(&self, queue_id: Uuid) -> Result<QueueEntry> {
        self.apply(queue_id, QueueEvent::Skip).await
    }

    /// 对排队条目执行一次状态转换
    pub async fn apply(&self, queue_id: Uuid, event: QueueEvent) -> Result<QueueEntry> {
        let entry = self
            .store
            .get_queue_entry(queue_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound("Antrian tidak ditemukan".to_string()))?;

        let target = self.machine.transition(entry.status, event).map_err(|e| {
            warn!("Rejected queue {} event {}: {}", queue_id, event.as_str(), e);
            e
        })?;

        let notification = match event {
            QueueEvent::Call => self.called_notification(&entry).await?,
            _ => None,
        };

        // 读取之后状态可能已被并发请求改变，更新语句只在状态未变时生效
        let at = Utc::now();
        let updated = match &notification {
            Some(notification) => {
                self.store
                    .update_queue_status_with_notification(
                        queue_id,
                        entry.status,
                        target,
                        at,
                        notification,
                    )
                    .await?
            }
            None => {
                self.store
                    .update_queue_status(queue_id, entry.status, target, at)
                    .await?
            }
        }
        .ok_or_else(|| {
            warn!("Queue {} changed concurrently before {}", queue_id, event.as_str());
            ClinicError::InvalidStateTransition {
                from: entry.status.as_str().to_string(),
                event: event.as_str().to_string(),
            }
        })?;

        info!(
            "Queue {} (#{} on {}) {} -> {}",
            updated.id, updated.queue_number, updated.queue_date, entry.status, updated.status
        );
        if let Some(notification) = &notification {
            info!("Notification {} sent to user {}", notification.id, notification.user_id);
        }

        match event {
            QueueEvent::Call | QueueEvent::Skip => {}
            QueueEvent::Complete => {
                let moved = self
                    .store
                    .update_appointment_status(
                        updated.appointment_id,
                        AppointmentStatus::Confirmed,
                        AppointmentStatus::Completed,
                    )
                    .await?;
                if !moved {
                    warn!(
                        "Appointment {} was not confirmed when queue {} completed",
                        updated.appointment_id, updated.id
                    );
                }
            }
        }

        Ok(updated)
    }

    /// 叫号通知，随状态更新一起写入
    async fn called_notification(&self, entry: &QueueEntry) -> Result<Option<NewNotification>> {
        let appointment = match self.store.get_appointment(entry.appointment_id).await? {
            Some(appointment) => appointment,
            None => {
                warn!("Queue {} has no appointment, skipping notification", entry.id);
                return Ok(None);
            }
        };

        Ok(Some(
            NewNotification::new(
                appointment.patient_id,
                "Giliran Anda",
                format!(
                    "Nomor antrian {} dipanggil. Silakan menuju ruang praktek.",
                    entry.queue_number
                ),
                NotificationKind::Queue,
            )
            .related_to(entry.id),
        ))
    }

    /// 某日全部排队条目，按号码升序
    pub async fn queue_for_date(&self, date: NaiveDate) -> Result<Vec<QueueEntry>> {
        self.store.list_queue_by_date(date).await
    }

    /// 患者查看某个预约的排队进度
    pub async fn position_for_appointment(
        &self,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<QueuePosition> {
        let not_found = || ClinicError::NotFound("Antrian tidak ditemukan".to_string());

        let appointment = self.store.get_appointment(appointment_id).await?.ok_or_else(not_found)?;
        if appointment.patient_id != patient_id {
            return Err(not_found());
        }

        let queue = self
            .store
            .get_queue_entry_by_appointment(appointment_id)
            .await?
            .ok_or_else(not_found)?;

        let current_queue_number = self
            .store
            .list_queue_by_date(queue.queue_date)
            .await?
            .iter()
            .filter(|q| q.status == QueueStatus::InProgress)
            .map(|q| q.queue_number)
            .max()
            .unwrap_or(0);

        Ok(QueuePosition {
            queue,
            current_queue_number,
        })
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>> {
        self.store.get_appointment(appointment_id).await
    }

    pub async fn entry_for_appointment(&self, appointment_id: Uuid) -> Result<Option<QueueEntry>> {
        self.store.get_queue_entry_by_appointment(appointment_id).await
    }

    pub(crate) async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<bool> {
        self.store.cancel_appointment(appointment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{AppointmentService, BookingRequest};
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveTime};
    use clinic_core::store::NotificationStore;
    use clinic_core::Role;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 第一次写入叫号通知时失败，其余操作交给内存存储
    struct FlakyNotificationStore {
        inner: MemoryStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl QueueStore for FlakyNotificationStore {
        async fn get_queue_entry(&self, id: Uuid) -> Result<Option<QueueEntry>> {
            self.inner.get_queue_entry(id).await
        }

        async fn get_queue_entry_by_appointment(&self, appointment_id: Uuid) -> Result<Option<QueueEntry>> {
            self.inner.get_queue_entry_by_appointment(appointment_id).await
        }

        async fn list_queue_by_date(&self, date: NaiveDate) -> Result<Vec<QueueEntry>> {
            self.inner.list_queue_by_date(date).await
        }

        async fn update_queue_status(
            &self,
            id: Uuid,
            from: QueueStatus,
            to: QueueStatus,
            at: DateTime<Utc>,
        ) -> Result<Option<QueueEntry>> {
            self.inner.update_queue_status(id, from, to, at).await
        }

        async fn update_queue_status_with_notification(
            &self,
            id: Uuid,
            from: QueueStatus,
            to: QueueStatus,
            at: DateTime<Utc>,
            notification: &NewNotification,
        ) -> Result<Option<QueueEntry>> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(ClinicError::Database("notification insert failed".to_string()));
            }
            self.inner
                .update_queue_status_with_notification(id, from, to, at, notification)
                .await
        }

        async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
            self.inner.get_appointment(id).await
        }

        async fn update_appointment_status(
            &self,
            id: Uuid,
            from: AppointmentStatus,
            to: AppointmentStatus,
        ) -> Result<bool> {
            self.inner.update_appointment_status(id, from, to).await
        }

        async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<bool> {
            self.inner.cancel_appointment(appointment_id).await
        }
    }

    struct Fixture {
        store: MemoryStore,
        booking: AppointmentService,
        queue: QueueService,
        doctor: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let doctor = store.add_user(Role::Doctor).await;
        let queue = QueueService::new(Arc::new(store.clone()));
        let booking = AppointmentService::new(Arc::new(store.clone()), queue.clone());
        Fixture {
            store,
            booking,
            queue,
            doctor,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    async fn book(fx: &Fixture, patient: Uuid) -> QueueEntry {
        fx.booking
            .book(BookingRequest {
                patient_id: patient,
                doctor_id: fx.doctor,
                date: date(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                complaint: None,
            })
            .await
            .unwrap()
            .queue_entry
    }

    #[tokio::test]
    async fn test_call_then_complete() {
        let fx = fixture().await;
        let patient = fx.store.add_user(Role::Patient).await;
        let entry = book(&fx, patient).await;

        let called = fx.queue.call(entry.id).await.unwrap();
        assert_eq!(called.status, QueueStatus::InProgress);
        assert!(called.called_at.is_some());

        let inbox = fx.store.list_notifications(patient).await.unwrap();
        assert_eq!(inbox[0].title, "Giliran Anda");
        assert_eq!(inbox[0].kind, NotificationKind::Queue);
        assert_eq!(inbox[0].related_id, Some(entry.id));
        assert_eq!(
            inbox[0].message,
            "Nomor antrian 1 dipanggil. Silakan menuju ruang praktek."
        );

        let completed = fx.queue.complete(entry.id).await.unwrap();
        assert_eq!(completed.status, QueueStatus::Completed);
        assert!(completed.completed_at.is_some());

        let appointment = fx.queue.appointment(entry.appointment_id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_double_call_notifies_once() {
        let fx = fixture().await;
        let patient = fx.store.add_user(Role::Patient).await;
        let entry = book(&fx, patient).await;

        fx.queue.call(entry.id).await.unwrap();
        let second = fx.queue.call(entry.id).await;
        assert!(matches!(second, Err(ClinicError::InvalidStateTransition { .. })));

        let calls = fx
            .store
            .list_notifications(patient)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Queue)
            .count();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_unknown_queue_id_is_not_found() {
        let fx = fixture().await;

        for result in [
            fx.queue.call(Uuid::new_v4()).await,
            fx.queue.complete(Uuid::new_v4()).await,
            fx.queue.skip(Uuid::new_v4()).await,
        ] {
            assert!(matches!(result, Err(ClinicError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_complete_requires_in_progress() {
        let fx = fixture().await;
        let patient = fx.store.add_user(Role::Patient).await;
        let entry = book(&fx, patient).await;

        let result = fx.queue.complete(entry.id).await;
        assert!(matches!(result, Err(ClinicError::InvalidStateTransition { .. })));
        let unchanged = fx.store.get_queue_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, QueueStatus::Waiting);
    }

    #[tokio::test]
    async fn test_skip_is_terminal_and_silent() {
        let fx = fixture().await;
        let patient = fx.store.add_user(Role::Patient).await;
        let entry = book(&fx, patient).await;
        let before = fx.store.notification_count().await;

        let skipped = fx.queue.skip(entry.id).await.unwrap();
        assert_eq!(skipped.status, QueueStatus::Skipped);
        assert_eq!(fx.store.notification_count().await, before);

        assert!(fx.queue.call(entry.id).await.is_err());
    }

    #[tokio::test]
    async fn test_position_reports_current_number() {
        let fx = fixture().await;
        let first = fx.store.add_user(Role::Patient).await;
        let second = fx.store.add_user(Role::Patient).await;
        let first_entry = book(&fx, first).await;
        let second_entry = book(&fx, second).await;

        let position = fx
            .queue
            .position_for_appointment(second, second_entry.appointment_id)
            .await
            .unwrap();
        assert_eq!(position.queue.queue_number, 2);
        assert_eq!(position.current_queue_number, 0);

        fx.queue.call(first_entry.id).await.unwrap();
        let position = fx
            .queue
            .position_for_appointment(second, second_entry.appointment_id)
            .await
            .unwrap();
        assert_eq!(position.current_queue_number, 1);

        // 只能查看自己的预约
        let result = fx
            .queue
            .position_for_appointment(first, second_entry.appointment_id)
            .await;
        assert!(matches!(result, Err(ClinicError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_queue_for_date_is_contiguous() {
        let fx = fixture().await;
        for _ in 0..5 {
            let patient = fx.store.add_user(Role::Patient).await;
            book(&fx, patient).await;
        }

        let numbers: Vec<i32> = fx
            .queue
            .queue_for_date(date())
            .await
            .unwrap()
            .iter()
            .map(|q| q.queue_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_failed_call_notification_leaves_entry_waiting() {
        let fx = fixture().await;
        let patient = fx.store.add_user(Role::Patient).await;
        let entry = book(&fx, patient).await;
        let before = fx.store.notification_count().await;

        let queue = QueueService::new(Arc::new(FlakyNotificationStore {
            inner: fx.store.clone(),
            failed: AtomicBool::new(false),
        }));

        let result = queue.call(entry.id).await;
        assert!(matches!(result, Err(ClinicError::Database(_))));
        let unchanged = fx.store.get_queue_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, QueueStatus::Waiting);
        assert_eq!(fx.store.notification_count().await, before);

        // 重试不会因为状态已变而被拒绝
        let called = queue.call(entry.id).await.unwrap();
        assert_eq!(called.status, QueueStatus::InProgress);
        assert_eq!(fx.store.notification_count().await, before + 1);
    }
}
