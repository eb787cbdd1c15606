//! 数据库查询操作：账户、用户管理、患者库与统计

use crate::connection::DatabasePool;
use crate::models::*;
use chrono::NaiveDate;
use clinic_core::{ClinicError, Result, Role, User};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

/// 是否为指定约束上的唯一性冲突（SQLSTATE 23505）
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

fn map_email_conflict(err: sqlx::Error) -> ClinicError {
    if is_unique_violation(&err, USERS_EMAIL_CONSTRAINT) {
        ClinicError::Validation("Email sudah terdaftar".to_string())
    } else {
        err.into()
    }
}

const USER_SUMMARY_COLUMNS: &str = r#"
    u.id, u.email, u.role, u.created_at,
    p.full_name, p.phone, p.address, p.date_of_birth, p.gender
"#;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        self.pool.pool()
    }

    // 账户操作

    /// 登录时按邮箱查询凭据
    pub async fn find_credentials(&self, email: &str) -> Result<Option<DbCredentials>> {
        let row = sqlx::query_as::<_, DbCredentials>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.role, p.full_name
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn email_exists(&self, email: &str, except: Option<Uuid>) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, email, password_hash, role, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn get_password_hash(&self, user_id: Uuid) -> Result<Option<String>> {
        let hash = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(hash)
    }

    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 用户与资料在同一事务中创建
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (id, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, role, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_email_conflict)?;

        upsert_profile(&mut tx, user.id, &user.profile).await?;
        tx.commit().await?;

        User::try_from(row)
    }

    /// 用户与资料在同一事务中更新，未提供新密码时保留原密码
    pub async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<bool> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, role = $3,
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(changes.role.as_str())
        .bind(changes.password_hash.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(map_email_conflict)?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        upsert_profile(&mut tx, id, &changes.profile).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// 删除用户，关联数据按外键级联删除
    pub async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user_summary(&self, id: Uuid) -> Result<Option<UserSummary>> {
        let sql = format!(
            "SELECT {} FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE u.id = $1",
            USER_SUMMARY_COLUMNS
        );
        let row = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    /// 更新本人资料
    pub async fn update_profile(&self, user_id: Uuid, profile: &ProfileChanges) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        upsert_profile(&mut tx, user_id, profile).await?;
        sqlx::query("UPDATE users SET updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// 用户列表，可按角色过滤，最新注册的在前
    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<UserSummary>> {
        let sql = format!(
            r#"
            SELECT {} FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE ($1::text IS NULL OR u.role = $1::text)
            ORDER BY u.created_at DESC
            "#,
            USER_SUMMARY_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    // 患者库

    /// 患者列表及就诊次数、最近就诊日期
    pub async fn list_patients(&self) -> Result<Vec<PatientSummary>> {
        let rows = sqlx::query_as::<_, PatientSummary>(
            r#"
            SELECT u.id, u.email, u.created_at,
                   p.full_name, p.phone, p.address, p.date_of_birth, p.gender,
                   COUNT(DISTINCT a.id) AS total_visits,
                   MAX(a.appointment_date) AS last_visit
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            LEFT JOIN appointments a ON a.patient_id = u.id
            WHERE u.role = 'pasien'
            GROUP BY u.id, p.user_id
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<Option<UserSummary>> {
        let sql = format!(
            r#"
            SELECT {} FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE u.id = $1 AND u.role = 'pasien'
            "#,
            USER_SUMMARY_COLUMNS
        );
        let row = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    pub async fn list_doctors(&self) -> Result<Vec<DoctorSummary>> {
        let rows = sqlx::query_as::<_, DoctorSummary>(
            r#"
            SELECT u.id, p.full_name, p.phone, p.profile_picture
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE u.role = 'dokter'
            ORDER BY p.full_name
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    // 管理后台

    /// 当日叫号看板，按排队号升序
    pub async fn queue_board(&self, date: NaiveDate) -> Result<Vec<QueueBoardRow>> {
        let rows = sqlx::query_as::<_, QueueBoardRow>(
            r#"
            SELECT q.id, q.appointment_id, q.queue_number, q.queue_date, q.status,
                   q.called_at, q.completed_at, a.appointment_time,
                   pp.full_name AS patient_name, pd.full_name AS doctor_name
            FROM queue q
            LEFT JOIN appointments a ON a.id = q.appointment_id
            LEFT JOIN profiles pp ON pp.user_id = a.patient_id
            LEFT JOIN profiles pd ON pd.user_id = a.doctor_id
            WHERE q.queue_date = $1
            ORDER BY q.queue_number ASC
            "#,
        )
        .bind(date)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats> {
        let (total_patients, total_doctors, today_appointments, today_queue): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users WHERE role = 'pasien'),
                    (SELECT COUNT(*) FROM users WHERE role = 'dokter'),
                    (SELECT COUNT(*) FROM appointments WHERE appointment_date = $1),
                    (SELECT COUNT(*) FROM queue WHERE queue_date = $1 AND status = 'waiting')
                "#,
            )
            .bind(today)
            .fetch_one(self.pool())
            .await?;

        Ok(DashboardStats {
            total_patients,
            total_doctors,
            today_appointments,
            today_queue,
        })
    }

    /// 最近创建的预约
    pub async fn recent_appointments(&self, limit: i64) -> Result<Vec<AppointmentView>> {
        let sql = format!("{} ORDER BY a.created_at DESC LIMIT $1", APPOINTMENT_VIEW_SELECT);
        let rows = sqlx::query_as::<_, AppointmentView>(&sql)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }
}

pub(crate) const APPOINTMENT_VIEW_SELECT: &str = r#"
    SELECT a.id, a.patient_id, a.doctor_id, a.appointment_date, a.appointment_time,
           a.complaint, a.status, a.created_at,
           pp.full_name AS patient_name, pd.full_name AS doctor_name,
           q.queue_number, q.status AS queue_status
    FROM appointments a
    LEFT JOIN profiles pp ON pp.user_id = a.patient_id
    LEFT JOIN profiles pd ON pd.user_id = a.doctor_id
    LEFT JOIN queue q ON q.appointment_id = a.id
"#;

async fn upsert_profile(
    tx: &mut Transaction<'static, Postgres>,
    user_id: Uuid,
    profile: &ProfileChanges,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, full_name, phone, address, date_of_birth, gender)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            full_name = EXCLUDED.full_name,
            phone = EXCLUDED.phone,
            address = EXCLUDED.address,
            date_of_birth = EXCLUDED.date_of_birth,
            gender = EXCLUDED.gender,
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(&profile.full_name)
    .bind(profile.phone.as_deref())
    .bind(profile.address.as_deref())
    .bind(profile.date_of_birth)
    .bind(profile.gender.map(|g| g.as_str()))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, USERS_EMAIL_CONSTRAINT));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut, USERS_EMAIL_CONSTRAINT));
    }

    #[test]
    fn test_email_conflict_falls_back_to_database_error() {
        let err = map_email_conflict(sqlx::Error::RowNotFound);
        assert!(matches!(err, ClinicError::Database(_)));
    }

    #[test]
    fn test_appointment_view_select_joins_queue() {
        assert!(APPOINTMENT_VIEW_SELECT.contains("LEFT JOIN queue q"));
        assert!(!APPOINTMENT_VIEW_SELECT.contains("WHERE"));
    }
}
