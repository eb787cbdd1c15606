//! 挂号服务
//!
//! 一次挂号在同一个事务中完成：重复预约检查、写入预约、分配排队号、
//! 写入排队条目、通知患者。任一步失败整个事务回滚。

use crate::queue::QueueService;
use chrono::{NaiveDate, NaiveTime};
use clinic_core::store::BookingStore;
use clinic_core::{
    Appointment, AppointmentStatus, ClinicError, NewAppointment, NewNotification, NewQueueEntry,
    Notification, NotificationKind, QueueEntry, QueueStatus, Result,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 挂号请求
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub complaint: Option<String>,
}

/// 挂号结果
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub appointment: Appointment,
    pub queue_entry: QueueEntry,
    pub notification: Notification,
}

/// 挂号服务
#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn BookingStore>,
    queue: QueueService,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn BookingStore>, queue: QueueService) -> Self {
        Self { store, queue }
    }

    /// 创建预约并分配当日排队号
    pub async fn book(&self, request: BookingRequest) -> Result<BookingReceipt> {
        if request.patient_id == request.doctor_id {
            return Err(ClinicError::Validation(
                "Pasien dan dokter tidak boleh sama".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        if !tx.is_doctor(request.doctor_id).await? {
            tx.rollback().await?;
            return Err(ClinicError::NotFound("Dokter tidak ditemukan".to_string()));
        }

        if tx
            .has_active_appointment(request.patient_id, request.doctor_id, request.date)
            .await?
        {
            tx.rollback().await?;
            warn!(
                "Duplicate appointment rejected: patient {} doctor {} on {}",
                request.patient_id, request.doctor_id, request.date
            );
            return Err(ClinicError::Conflict(
                "Anda sudah memiliki janji di tanggal ini".to_string(),
            ));
        }

        // 以下任一步返回错误时 tx 被丢弃，事务回滚
        let appointment = tx
            .insert_appointment(&NewAppointment {
                id: Uuid::new_v4(),
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                appointment_date: request.date,
                appointment_time: request.time,
                complaint: request.complaint,
            })
            .await?;

        let queue_number = tx.next_queue_number(request.date).await?;

        let queue_entry = tx
            .insert_queue_entry(&NewQueueEntry {
                id: Uuid::new_v4(),
                appointment_id: appointment.id,
                queue_number,
                queue_date: request.date,
            })
            .await?;

        let notification = tx
            .insert_notification(
                &NewNotification::new(
                    request.patient_id,
                    "Pendaftaran Berhasil",
                    format!("Nomor antrian Anda: {}. Tanggal: {}", queue_number, request.date),
                    NotificationKind::Appointment,
                )
                .related_to(appointment.id),
            )
            .await?;

        tx.commit().await?;

        info!(
            "Appointment {} booked for patient {} with doctor {} on {}, queue #{}",
            appointment.id, appointment.patient_id, appointment.doctor_id, request.date, queue_number
        );

        Ok(BookingReceipt {
            appointment,
            queue_entry,
            notification,
        })
    }

    /// 患者取消自己的预约
    ///
    /// 只有 confirmed 且排队条目仍在等待（或没有排队条目）的预约可以取消，
    /// 排队条目随之过号。已叫号的预约返回状态冲突。
    pub async fn cancel(&self, patient_id: Uuid, appointment_id: Uuid) -> Result<Appointment> {
        let mut appointment = self
            .queue
            .appointment(appointment_id)
            .await?
            .filter(|a| a.patient_id == patient_id)
            .ok_or_else(|| ClinicError::NotFound("Janji temu tidak ditemukan".to_string()))?;

        let invalid = |from: &str| ClinicError::InvalidStateTransition {
            from: from.to_string(),
            event: "cancel".to_string(),
        };

        if appointment.status != AppointmentStatus::Confirmed {
            return Err(invalid(appointment.status.as_str()));
        }
        if let Some(entry) = self.queue.entry_for_appointment(appointment_id).await? {
            if entry.status != QueueStatus::Waiting {
                warn!(
                    "Cancel of appointment {} rejected: queue {} is {}",
                    appointment_id, entry.id, entry.status
                );
                return Err(invalid(entry.status.as_str()));
            }
        }

        // 预约与排队条目在同一事务中更新，检查之后发生的并发叫号会使其整体失败
        if !self.queue.cancel_appointment(appointment_id).await? {
            warn!("Appointment {} changed concurrently before cancel", appointment_id);
            return Err(invalid(appointment.status.as_str()));
        }
        appointment.status = AppointmentStatus::Cancelled;

        info!("Appointment {} cancelled by patient {}", appointment_id, patient_id);
        Ok(appointment)
    }
}
