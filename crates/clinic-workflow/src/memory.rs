//! 内存存储
//!
//! 实现全部存储 trait，用于测试和无数据库的本地演示。
//! 挂号事务持有整个状态的互斥锁直到提交或回滚，相当于表级锁。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::store::{BookingStore, BookingTransaction, NotificationStore, QueueStore};
use clinic_core::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, Role>,
    appointments: HashMap<Uuid, Appointment>,
    queue: HashMap<Uuid, QueueEntry>,
    counters: HashMap<NaiveDate, i32>,
    notifications: Vec<Notification>,
}

impl MemoryState {
    fn insert_notification(&mut self, notification: &NewNotification) -> Notification {
        let stored = notification.clone().into_notification(Utc::now());
        self.notifications.push(stored.clone());
        stored
    }

    fn update_queue_status(
        &mut self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
    ) -> Option<QueueEntry> {
        let entry = self.queue.get_mut(&id).filter(|entry| entry.status == from)?;
        entry.status = to;
        match to {
            QueueStatus::InProgress => entry.called_at = Some(at),
            QueueStatus::Completed => entry.completed_at = Some(at),
            _ => {}
        }
        Some(entry.clone())
    }
}

/// 内存存储
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个用户及其角色
    pub async fn add_user(&self, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.users.insert(id, role);
        id
    }

    /// 删除用户，级联删除其预约、排队条目和通知
    pub async fn remove_user(&self, user_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        if state.users.remove(&user_id).is_none() {
            return false;
        }

        let removed: Vec<Uuid> = state
            .appointments
            .values()
            .filter(|a| a.patient_id == user_id || a.doctor_id == user_id)
            .map(|a| a.id)
            .collect();
        for appointment_id in &removed {
            state.appointments.remove(appointment_id);
        }
        state.queue.retain(|_, entry| !removed.contains(&entry.appointment_id));
        state.notifications.retain(|n| n.user_id != user_id);
        true
    }

    pub async fn appointment_count(&self) -> usize {
        self.state.lock().await.appointments.len()
    }

    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }
}

/// 内存挂号事务
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    // 提交前保存事务开始时的状态，丢弃时据此回滚
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = Some(guard.clone());
        Ok(Box::new(MemoryTransaction { guard, snapshot }))
    }
}

#[async_trait]
impl BookingTransaction for MemoryTransaction {
    async fn is_doctor(&mut self, user_id: Uuid) -> Result<bool> {
        Ok(self.guard.users.get(&user_id) == Some(&Role::Doctor))
    }

    async fn has_active_appointment(
        &mut self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool> {
        Ok(self.guard.appointments.values().any(|a| {
            a.patient_id == patient_id
                && a.doctor_id == doctor_id
                && a.appointment_date == date
                && a.status != AppointmentStatus::Cancelled
        }))
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> Result<Appointment> {
        let stored = Appointment {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            complaint: appointment.complaint.clone(),
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
        };
        self.guard.appointments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn next_queue_number(&mut self, date: NaiveDate) -> Result<i32> {
        let counter = self.guard.counters.entry(date).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry> {
        let duplicate = self
            .guard
            .queue
            .values()
            .any(|q| q.queue_date == entry.queue_date && q.queue_number == entry.queue_number);
        if duplicate {
            return Err(ClinicError::Database(format!(
                "duplicate queue number {} on {}",
                entry.queue_number, entry.queue_date
            )));
        }

        let stored = QueueEntry {
            id: entry.id,
            appointment_id: entry.appointment_id,
            queue_number: entry.queue_number,
            queue_date: entry.queue_date,
            status: QueueStatus::Waiting,
            called_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.guard.queue.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_notification(&mut self, notification: &NewNotification) -> Result<Notification> {
        Ok(self.guard.insert_notification(notification))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Drop 时恢复快照
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn get_queue_entry(&self, id: Uuid) -> Result<Option<QueueEntry>> {
        Ok(self.state.lock().await.queue.get(&id).cloned())
    }

    async fn get_queue_entry_by_appointment(&self, appointment_id: Uuid) -> Result<Option<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .queue
            .values()
            .find(|q| q.appointment_id == appointment_id)
            .cloned())
    }

    async fn list_queue_by_date(&self, date: NaiveDate) -> Result<Vec<QueueEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<QueueEntry> = state
            .queue
            .values()
            .filter(|q| q.queue_date == date)
            .cloned()
            .collect();
        entries.sort_by_key(|q| q.queue_number);
        Ok(entries)
    }

    async fn update_queue_status(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>> {
        Ok(self.state.lock().await.update_queue_status(id, from, to, at))
    }

    async fn update_queue_status_with_notification(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
        notification: &NewNotification,
    ) -> Result<Option<QueueEntry>> {
        let mut state = self.state.lock().await;
        let updated = state.update_queue_status(id, from, to, at);
        if updated.is_some() {
            state.insert_notification(notification);
        }
        Ok(updated)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.state.lock().await.appointments.get(&id).cloned())
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.appointments.get_mut(&id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;

        let entry_id = match state.queue.values().find(|q| q.appointment_id == appointment_id) {
            Some(entry) if entry.status != QueueStatus::Waiting => return Ok(false),
            Some(entry) => Some(entry.id),
            None => None,
        };

        match state.appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status == AppointmentStatus::Confirmed => {
                appointment.status = AppointmentStatus::Cancelled;
            }
            _ => return Ok(false),
        }

        if let Some(entry) = entry_id.and_then(|id| state.queue.get_mut(&id)) {
            entry.status = QueueStatus::Skipped;
        }
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification> {
        Ok(self.state.lock().await.insert_notification(notification))
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64> {
        let mut state = self.state.lock().await;
        for notification in notifications {
            state.insert_notification(notification);
        }
        Ok(notifications.len() as u64)
    }

    async fn user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }
}
