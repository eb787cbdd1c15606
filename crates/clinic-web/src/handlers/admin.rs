//! 管理后台：排队看板、用户管理、患者档案、通知、统计

use super::account::{validate_email, validate_password};
use super::{created, message, ProfileFields};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{require_text, Validate, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use clinic_core::utils::{blank_to_none, normalize_email, today};
use clinic_core::{ClinicError, NewNotification, NotificationKind, Result, Role};
use clinic_database::{NewUser, UserChanges};
use clinic_workflow::Broadcast;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

const RECENT_APPOINTMENTS: i64 = 5;

/// 叫号、完成、过号共用的请求体
#[derive(Debug, Deserialize)]
pub struct QueueActionRequest {
    pub queue_id: Uuid,
}

impl Validate for QueueActionRequest {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
}

impl UserFilter {
    fn role(&self) -> Result<Option<Role>> {
        blank_to_none(self.role.clone())
            .map(|role| role.parse())
            .transpose()
    }
}

/// 管理员创建/修改用户；修改时密码留空表示不变
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub email: String,
    pub password: Option<String>,
    pub role: Role,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

impl UserRequest {
    fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.trim().is_empty())
    }
}

impl Validate for UserRequest {
    fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if let Some(password) = self.new_password() {
            validate_password(password)?;
        }
        self.profile.validate()
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl Validate for NotificationRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.title, "Judul notifikasi wajib diisi")?;
        require_text(&self.message, "Pesan notifikasi wajib diisi")
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkNotificationRequest {
    pub role: Role,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
}

impl Validate for BulkNotificationRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.title, "Judul notifikasi wajib diisi")?;
        require_text(&self.message, "Pesan notifikasi wajib diisi")
    }
}

// 排队看板

/// 今日排队，按号码升序
pub async fn today_queue(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let queue = state.queries().queue_board(today()).await?;
    Ok(Json(json!({ "queue": queue })))
}

pub async fn call_queue(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<QueueActionRequest>,
) -> ApiResult<Json<Value>> {
    state.queue.call(request.queue_id).await?;
    Ok(message("Antrian berhasil dipanggil"))
}

pub async fn complete_queue(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<QueueActionRequest>,
) -> ApiResult<Json<Value>> {
    state.queue.complete(request.queue_id).await?;
    Ok(message("Antrian selesai"))
}

pub async fn skip_queue(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<QueueActionRequest>,
) -> ApiResult<Json<Value>> {
    state.queue.skip(request.queue_id).await?;
    Ok(message("Antrian dilewati"))
}

// 用户管理

pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Value>> {
    let users = state.queries().list_users(filter.role()?).await?;
    Ok(Json(json!({ "users": users })))
}

/// 用户与资料在同一事务中创建
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<UserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let password = request
        .new_password()
        .ok_or_else(|| ClinicError::Validation("Password wajib diisi".to_string()))?;
    let password_hash = state.auth.hash_password(password)?;

    let queries = state.queries();
    let email = normalize_email(&request.email);
    if queries.email_exists(&email, None).await? {
        return Err(ClinicError::Validation("Email sudah terdaftar".to_string()).into());
    }

    let user = queries
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
            role: request.role,
            profile: request.profile.into_changes()?,
        })
        .await?;
    info!("Admin created user {} ({})", user.email, user.role);

    created(json!({
        "message": "User berhasil dibuat",
        "userId": user.id,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UserRequest>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let email = normalize_email(&request.email);
    if queries.email_exists(&email, Some(user_id)).await? {
        return Err(ClinicError::Validation("Email sudah terdaftar".to_string()).into());
    }

    let password_hash = request
        .new_password()
        .map(|password| state.auth.hash_password(password))
        .transpose()?;

    let changes = UserChanges {
        email,
        role: request.role,
        password_hash,
        profile: request.profile.into_changes()?,
    };

    if !queries.update_user(user_id, &changes).await? {
        return Err(ClinicError::NotFound("User tidak ditemukan".to_string()).into());
    }

    info!("Admin updated user {}", user_id);
    Ok(message("User berhasil diperbarui"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if admin.id == user_id {
        return Err(ClinicError::Validation(
            "Tidak dapat menghapus akun sendiri".to_string(),
        )
        .into());
    }

    if !state.queries().delete_user(user_id).await? {
        return Err(ClinicError::NotFound("User tidak ditemukan".to_string()).into());
    }

    info!("Admin {} deleted user {}", admin.email, user_id);
    Ok(message("User berhasil dihapus"))
}

// 患者档案

pub async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let patients = state.queries().list_patients().await?;
    Ok(Json(json!({ "patients": patients })))
}

/// 患者详情，附预约与病历
pub async fn patient_detail(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let patient = queries
        .get_patient(patient_id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("Pasien tidak ditemukan".to_string()))?;

    let appointments = queries.list_patient_appointments(patient_id).await?;
    let medical_records = queries.list_medical_records(patient_id).await?;

    Ok(Json(json!({
        "patient": patient,
        "appointments": appointments,
        "medicalRecords": medical_records,
    })))
}

// 通知

pub async fn create_notification(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<NotificationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if state.queries().get_user(request.user_id).await?.is_none() {
        return Err(ClinicError::NotFound("User tidak ditemukan".to_string()).into());
    }

    let mut notification =
        NewNotification::new(request.user_id, request.title, request.message, request.kind);
    notification.scheduled_at = request.scheduled_at;

    let notification = state.notifications.notify(notification).await?;

    created(json!({
        "message": "Notifikasi berhasil dibuat",
        "notificationId": notification.id,
    }))
}

/// 按角色群发
pub async fn bulk_notification(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BulkNotificationRequest>,
) -> ApiResult<Json<Value>> {
    let recipients = state
        .notifications
        .broadcast(Broadcast {
            role: request.role,
            title: request.title,
            message: request.message,
            kind: request.kind,
        })
        .await?;

    Ok(message(format!(
        "Notifikasi berhasil dikirim ke {} user",
        recipients
    )))
}

// 统计

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let stats = queries.dashboard_stats(today()).await?;
    let recent = queries.recent_appointments(RECENT_APPOINTMENTS).await?;

    Ok(Json(json!({
        "stats": stats,
        "recentAppointments": recent,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_request(password: Option<&str>) -> UserRequest {
        serde_json::from_value(json!({
            "email": "dokter@klinik.id",
            "password": password,
            "role": "dokter",
            "full_name": "dr. Rina",
        }))
        .unwrap()
    }

    #[test]
    fn test_user_request_password_optional() {
        let request = user_request(None);
        assert!(request.validate().is_ok());
        assert_eq!(request.new_password(), None);

        let request = user_request(Some("   "));
        assert_eq!(request.new_password(), None);

        let request = user_request(Some("123"));
        assert!(matches!(request.validate(), Err(ClinicError::Validation(_))));

        let request = user_request(Some("rahasia123"));
        assert_eq!(request.new_password(), Some("rahasia123"));
        assert_eq!(request.role, Role::Doctor);
    }

    #[test]
    fn test_user_filter_role() {
        let filter = UserFilter { role: Some("pasien".to_string()) };
        assert_eq!(filter.role().unwrap(), Some(Role::Patient));

        let filter = UserFilter { role: Some("".to_string()) };
        assert_eq!(filter.role().unwrap(), None);

        let filter = UserFilter { role: Some("perawat".to_string()) };
        assert!(filter.role().is_err());
    }

    #[test]
    fn test_notification_request_defaults() {
        let request: NotificationRequest = serde_json::from_value(json!({
            "user_id": Uuid::new_v4(),
            "title": "Pengingat",
            "message": "Jangan lupa kontrol",
        }))
        .unwrap();
        assert_eq!(request.kind, NotificationKind::General);
        assert!(request.scheduled_at.is_none());

        let request: BulkNotificationRequest = serde_json::from_value(json!({
            "role": "pasien",
            "title": " ",
            "message": "Klinik libur",
            "type": "reminder",
        }))
        .unwrap();
        assert_eq!(request.kind, NotificationKind::Reminder);
        assert!(request.validate().is_err());
    }
}
