//! 存储 trait 的 PostgreSQL 实现

use crate::connection::DatabasePool;
use crate::models::{DbAppointment, DbNotification, DbQueueEntry};
use crate::queries::is_unique_violation;
use crate::schema::ACTIVE_APPOINTMENT_INDEX;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::store::{BookingStore, BookingTransaction, NotificationStore, QueueStore};
use clinic_core::{
    Appointment, AppointmentStatus, ClinicError, NewAppointment, NewNotification, NewQueueEntry,
    Notification, QueueEntry, QueueStatus, Result, Role,
};
use sqlx::{Executor, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

const QUEUE_COLUMNS: &str =
    "id, appointment_id, queue_number, queue_date, status, called_at, completed_at, created_at";

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor_id, appointment_date, appointment_time, complaint, status, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, notification_type, related_id, scheduled_at, is_read, created_at";

/// 每条批量插入语句的最大行数，受 PostgreSQL 绑定参数上限约束
const NOTIFICATION_BATCH_SIZE: usize = 1000;

/// PostgreSQL 存储
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabasePool,
}

impl PgStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

async fn insert_notification_with<'e, E>(
    executor: E,
    notification: &NewNotification,
) -> Result<Notification>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"
        INSERT INTO notifications
            (id, user_id, title, message, notification_type, related_id, scheduled_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        NOTIFICATION_COLUMNS
    );
    let row = sqlx::query_as::<_, DbNotification>(&sql)
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.related_id)
        .bind(notification.scheduled_at)
        .fetch_one(executor)
        .await?;

    Notification::try_from(row)
}

async fn update_queue_status_with<'e, E>(
    executor: E,
    id: Uuid,
    from: QueueStatus,
    to: QueueStatus,
    at: DateTime<Utc>,
) -> Result<Option<QueueEntry>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        r#"
        UPDATE queue
        SET status = $3::text,
            called_at = CASE WHEN $3::text = 'in_progress' THEN $4 ELSE called_at END,
            completed_at = CASE WHEN $3::text = 'completed' THEN $4 ELSE completed_at END
        WHERE id = $1 AND status = $2::text
        RETURNING {}
        "#,
        QUEUE_COLUMNS
    );
    let row = sqlx::query_as::<_, DbQueueEntry>(&sql)
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .fetch_optional(executor)
        .await?;

    row.map(QueueEntry::try_from).transpose()
}

/// 挂号事务，丢弃时由 sqlx 自动回滚
pub struct PgBookingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>> {
        let tx = self.db.pool().begin().await?;
        Ok(Box::new(PgBookingTransaction { tx }))
    }
}

#[async_trait]
impl BookingTransaction for PgBookingTransaction {
    async fn is_doctor(&mut self, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1 AND role = 'dokter')",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn has_active_appointment(
        &mut self,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE patient_id = $1 AND doctor_id = $2 AND appointment_date = $3
                  AND status <> 'cancelled'
            )
            "#,
        )
        .bind(patient_id)
        .bind(doctor_id)
        .bind(date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> Result<Appointment> {
        let sql = format!(
            r#"
            INSERT INTO appointments
                (id, patient_id, doctor_id, appointment_date, appointment_time, complaint, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'confirmed')
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, DbAppointment>(&sql)
            .bind(appointment.id)
            .bind(appointment.patient_id)
            .bind(appointment.doctor_id)
            .bind(appointment.appointment_date)
            .bind(appointment.appointment_time)
            .bind(appointment.complaint.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                // 并发的重复预约越过了前置检查，由部分唯一索引拦截
                if is_unique_violation(&e, ACTIVE_APPOINTMENT_INDEX) {
                    ClinicError::Conflict("Anda sudah memiliki janji di tanggal ini".to_string())
                } else {
                    e.into()
                }
            })?;

        Appointment::try_from(row)
    }

    async fn next_queue_number(&mut self, date: NaiveDate) -> Result<i32> {
        // 计数行在提交前一直被锁住，同日的并发挂号在此排队
        let number: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO queue_counters (queue_date, last_number)
            VALUES ($1, (SELECT COALESCE(MAX(queue_number), 0) + 1 FROM queue WHERE queue_date = $1))
            ON CONFLICT (queue_date)
            DO UPDATE SET last_number = queue_counters.last_number + 1
            RETURNING last_number
            "#,
        )
        .bind(date)
        .fetch_one(&mut *self.tx)
        .await?;

        debug!("Allocated queue number {} for {}", number, date);
        Ok(number)
    }

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> Result<QueueEntry> {
        let sql = format!(
            r#"
            INSERT INTO queue (id, appointment_id, queue_number, queue_date, status)
            VALUES ($1, $2, $3, $4, 'waiting')
            RETURNING {}
            "#,
            QUEUE_COLUMNS
        );
        let row = sqlx::query_as::<_, DbQueueEntry>(&sql)
            .bind(entry.id)
            .bind(entry.appointment_id)
            .bind(entry.queue_number)
            .bind(entry.queue_date)
            .fetch_one(&mut *self.tx)
            .await?;

        QueueEntry::try_from(row)
    }

    async fn insert_notification(&mut self, notification: &NewNotification) -> Result<Notification> {
        insert_notification_with(&mut *self.tx, notification).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgBookingTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgBookingTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn get_queue_entry(&self, id: Uuid) -> Result<Option<QueueEntry>> {
        let sql = format!("SELECT {} FROM queue WHERE id = $1", QUEUE_COLUMNS);
        let row = sqlx::query_as::<_, DbQueueEntry>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(QueueEntry::try_from).transpose()
    }

    async fn get_queue_entry_by_appointment(&self, appointment_id: Uuid) -> Result<Option<QueueEntry>> {
        let sql = format!("SELECT {} FROM queue WHERE appointment_id = $1", QUEUE_COLUMNS);
        let row = sqlx::query_as::<_, DbQueueEntry>(&sql)
            .bind(appointment_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(QueueEntry::try_from).transpose()
    }

    async fn list_queue_by_date(&self, date: NaiveDate) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM queue WHERE queue_date = $1 ORDER BY queue_number ASC",
            QUEUE_COLUMNS
        );
        let rows = sqlx::query_as::<_, DbQueueEntry>(&sql)
            .bind(date)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(QueueEntry::try_from).collect()
    }

    async fn update_queue_status(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>> {
        update_queue_status_with(self.db.pool(), id, from, to, at).await
    }

    async fn update_queue_status_with_notification(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<Utc>,
        notification: &NewNotification,
    ) -> Result<Option<QueueEntry>> {
        let mut tx = self.db.pool().begin().await?;

        let updated = match update_queue_status_with(&mut *tx, id, from, to, at).await? {
            Some(entry) => entry,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };
        // 出错时 tx 被丢弃，状态更新一并回滚
        insert_notification_with(&mut *tx, notification).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
        let sql = format!("SELECT {} FROM appointments WHERE id = $1", APPOINTMENT_COLUMNS);
        let row = sqlx::query_as::<_, DbAppointment>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(Appointment::try_from).transpose()
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE appointments SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        // 锁住排队条目，并发的叫号在此等待提交后重新比较状态
        let queue_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM queue WHERE appointment_id = $1 FOR UPDATE")
                .bind(appointment_id)
                .fetch_optional(&mut *tx)
                .await?;
        if matches!(queue_status.as_deref(), Some(status) if status != QueueStatus::Waiting.as_str()) {
            tx.rollback().await?;
            return Ok(false);
        }

        let cancelled = sqlx::query(
            r#"
            UPDATE appointments SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'confirmed'
            "#,
        )
        .bind(appointment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if cancelled == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if queue_status.is_some() {
            sqlx::query(
                "UPDATE queue SET status = 'skipped' WHERE appointment_id = $1 AND status = 'waiting'",
            )
            .bind(appointment_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Appointment {} cancelled with its queue entry", appointment_id);
        Ok(true)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: &NewNotification) -> Result<Notification> {
        insert_notification_with(self.db.pool(), notification).await
    }

    async fn insert_notifications(&self, notifications: &[NewNotification]) -> Result<u64> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;

        for batch in notifications.chunks(NOTIFICATION_BATCH_SIZE) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO notifications \
                 (id, user_id, title, message, notification_type, related_id, scheduled_at) ",
            );
            builder.push_values(batch, |mut row, n| {
                row.push_bind(n.id)
                    .push_bind(n.user_id)
                    .push_bind(n.title.as_str())
                    .push_bind(n.message.as_str())
                    .push_bind(n.kind.as_str())
                    .push_bind(n.related_id)
                    .push_bind(n.scheduled_at);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn user_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT id FROM users WHERE role = $1 ORDER BY created_at")
            .bind(role.as_str())
            .fetch_all(self.db.pool())
            .await?;

        Ok(ids)
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, DbNotification>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

/// 需要真实的 PostgreSQL：设置 `DATABASE_URL` 后运行，未设置时跳过
#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabaseOptions;
    use crate::models::{NewUser, ProfileChanges};
    use crate::queries::DatabaseQueries;
    use chrono::{Duration, NaiveTime};
    use clinic_core::NotificationKind;
    use clinic_workflow::{
        AppointmentService, Broadcast, BookingRequest, NotificationService, QueueService,
    };
    use std::sync::Arc;
    use tokio::sync::OnceCell;

    static SCHEMA: OnceCell<()> = OnceCell::const_new();

    async fn test_db() -> Option<DatabasePool> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
                return None;
            }
        };

        let db = DatabasePool::connect(&DatabaseOptions {
            url,
            max_connections: 30,
            ..DatabaseOptions::default()
        })
        .await
        .unwrap();

        SCHEMA
            .get_or_try_init(|| async {
                let queries = DatabaseQueries::new(&db);
                queries.create_tables().await?;
                queries.create_indexes().await
            })
            .await
            .unwrap();

        Some(db)
    }

    /// 每个测试使用各自的日期，避免共用数据库时排队号互相干扰
    fn unique_date() -> NaiveDate {
        let offset = (Uuid::new_v4().as_u128() % 200_000) as i64;
        NaiveDate::from_ymd_opt(2100, 1, 1).unwrap() + Duration::days(offset)
    }

    async fn add_user(db: &DatabasePool, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        DatabaseQueries::new(db)
            .create_user(&NewUser {
                id,
                email: format!("{}@test.klinik.id", id),
                password_hash: "not-a-real-hash".to_string(),
                role,
                profile: ProfileChanges {
                    full_name: "Pengguna Uji".to_string(),
                    ..ProfileChanges::default()
                },
            })
            .await
            .unwrap();
        id
    }

    fn services(db: &DatabasePool) -> (AppointmentService, QueueService) {
        let store = Arc::new(PgStore::new(db.clone()));
        let queue = QueueService::new(store.clone());
        (AppointmentService::new(store, queue.clone()), queue)
    }

    fn request(patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> BookingRequest {
        BookingRequest {
            patient_id,
            doctor_id,
            date,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            complaint: Some("Pusing".to_string()),
        }
    }

    #[tokio::test]
    async fn test_concurrent_bookings_get_contiguous_numbers() {
        let Some(db) = test_db().await else { return };
        let doctor = add_user(&db, Role::Doctor).await;
        let date = unique_date();
        let (booking, queue) = services(&db);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let patient = add_user(&db, Role::Patient).await;
            let booking = booking.clone();
            handles.push(tokio::spawn(async move {
                booking.book(request(patient, doctor, date)).await
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().queue_entry.queue_number);
        }
        numbers.sort();
        assert_eq!(numbers, (1..=20).collect::<Vec<i32>>());

        let listed: Vec<i32> = queue
            .queue_for_date(date)
            .await
            .unwrap()
            .iter()
            .map(|q| q.queue_number)
            .collect();
        assert_eq!(listed, numbers);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_bookings_conflict() {
        let Some(db) = test_db().await else { return };
        let doctor = add_user(&db, Role::Doctor).await;
        let patient = add_user(&db, Role::Patient).await;
        let date = unique_date();
        let (booking, queue) = services(&db);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let booking = booking.clone();
            handles.push(tokio::spawn(async move {
                booking.book(request(patient, doctor, date)).await
            }));
        }

        let mut booked = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(ClinicError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected booking error: {}", e),
            }
        }
        assert_eq!(booked, 1);
        assert_eq!(conflicts, 9);

        let entries = queue.queue_for_date(date).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].queue_number, 1);
    }

    #[tokio::test]
    async fn test_queue_transitions_compare_and_set() {
        let Some(db) = test_db().await else { return };
        let doctor = add_user(&db, Role::Doctor).await;
        let patient = add_user(&db, Role::Patient).await;
        let late = add_user(&db, Role::Patient).await;
        let date = unique_date();
        let (booking, queue) = services(&db);
        let store = PgStore::new(db.clone());

        let receipt = booking.book(request(patient, doctor, date)).await.unwrap();
        let entry_id = receipt.queue_entry.id;

        // 并发叫号只有一个生效，患者只收到一条叫号通知
        let mut handles = Vec::new();
        for _ in 0..5 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.call(entry_id).await }));
        }
        let mut called = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(entry) => {
                    assert_eq!(entry.status, QueueStatus::InProgress);
                    assert!(entry.called_at.is_some());
                    called += 1;
                }
                Err(ClinicError::InvalidStateTransition { .. }) => {}
                Err(e) => panic!("unexpected call error: {}", e),
            }
        }
        assert_eq!(called, 1);

        let calls: Vec<Notification> = store
            .list_notifications(patient)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Queue)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].related_id, Some(entry_id));

        let completed = queue.complete(entry_id).await.unwrap();
        assert_eq!(completed.status, QueueStatus::Completed);
        assert!(completed.completed_at.is_some());
        let appointment = store.get_appointment(receipt.appointment.id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Completed);

        assert!(matches!(
            queue.skip(entry_id).await,
            Err(ClinicError::InvalidStateTransition { .. })
        ));

        let receipt = booking.book(request(late, doctor, date)).await.unwrap();
        assert_eq!(receipt.queue_entry.queue_number, 2);
        let skipped = queue.skip(receipt.queue_entry.id).await.unwrap();
        assert_eq!(skipped.status, QueueStatus::Skipped);
        assert!(matches!(
            queue.call(receipt.queue_entry.id).await,
            Err(ClinicError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_call_notification_rolls_back_status() {
        let Some(db) = test_db().await else { return };
        let doctor = add_user(&db, Role::Doctor).await;
        let patient = add_user(&db, Role::Patient).await;
        let date = unique_date();
        let (booking, queue) = services(&db);
        let store = PgStore::new(db.clone());

        let receipt = booking.book(request(patient, doctor, date)).await.unwrap();
        let entry_id = receipt.queue_entry.id;

        // 收件人不存在，外键约束使通知写入失败
        let orphan = NewNotification::new(
            Uuid::new_v4(),
            "Giliran Anda",
            "Nomor antrian 1 dipanggil.",
            NotificationKind::Queue,
        );
        let result = store
            .update_queue_status_with_notification(
                entry_id,
                QueueStatus::Waiting,
                QueueStatus::InProgress,
                Utc::now(),
                &orphan,
            )
            .await;
        assert!(result.is_err());

        let entry = store.get_queue_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Waiting);
        assert!(entry.called_at.is_none());

        let called = queue.call(entry_id).await.unwrap();
        assert_eq!(called.status, QueueStatus::InProgress);
    }

    #[tokio::test]
    async fn test_cancel_is_atomic_with_queue() {
        let Some(db) = test_db().await else { return };
        let doctor = add_user(&db, Role::Doctor).await;
        let patient = add_user(&db, Role::Patient).await;
        let date = unique_date();
        let (booking, queue) = services(&db);
        let store = PgStore::new(db.clone());

        let receipt = booking.book(request(patient, doctor, date)).await.unwrap();
        queue.call(receipt.queue_entry.id).await.unwrap();

        assert!(matches!(
            booking.cancel(patient, receipt.appointment.id).await,
            Err(ClinicError::InvalidStateTransition { .. })
        ));
        assert!(!store.cancel_appointment(receipt.appointment.id).await.unwrap());
        let appointment = store.get_appointment(receipt.appointment.id).await.unwrap().unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);

        let other_doctor = add_user(&db, Role::Doctor).await;
        let receipt = booking.book(request(patient, other_doctor, date)).await.unwrap();
        let cancelled = booking.cancel(patient, receipt.appointment.id).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        let entry = store.get_queue_entry(receipt.queue_entry.id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Skipped);

        // 取消后同一医生同一天可以重新预约
        let again = booking.book(request(patient, other_doctor, date)).await.unwrap();
        assert_eq!(again.queue_entry.queue_number, 3);
    }

    #[tokio::test]
    async fn test_bulk_notifications_span_batches() {
        let Some(db) = test_db().await else { return };
        let user = add_user(&db, Role::Patient).await;
        let store = PgStore::new(db.clone());

        assert_eq!(store.insert_notifications(&[]).await.unwrap(), 0);

        let batch: Vec<NewNotification> = (0..2500)
            .map(|i| {
                NewNotification::new(
                    user,
                    "Pengumuman",
                    format!("Pesan {}", i),
                    NotificationKind::General,
                )
            })
            .collect();
        assert_eq!(store.insert_notifications(&batch).await.unwrap(), 2500);
        assert_eq!(store.list_notifications(user).await.unwrap().len(), 2500);
        assert_eq!(store.mark_all_notifications_read(user).await.unwrap(), 2500);
        assert_eq!(store.mark_all_notifications_read(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_admin() {
        let Some(db) = test_db().await else { return };
        let first = add_user(&db, Role::Admin).await;
        let second = add_user(&db, Role::Admin).await;
        let store = Arc::new(PgStore::new(db.clone()));
        let service = NotificationService::new(store.clone());

        let admins = store.user_ids_by_role(Role::Admin).await.unwrap();
        assert!(admins.contains(&first) && admins.contains(&second));

        let sent = service
            .broadcast(Broadcast {
                role: Role::Admin,
                title: "Rapat".to_string(),
                message: "Rapat staf pukul 14:00".to_string(),
                kind: NotificationKind::General,
            })
            .await
            .unwrap();
        assert!(sent >= admins.len());

        for admin in [first, second] {
            let inbox = store.list_notifications(admin).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].title, "Rapat");
        }
    }
}
