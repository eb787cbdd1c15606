//! 账户：注册、登录、个人资料、修改密码、个人通知

use super::{created, message, ProfileFields};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{require_text, Validate, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use clinic_core::utils::{is_valid_email, normalize_email};
use clinic_core::{ClinicError, Result, Role};
use clinic_database::NewUser;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

const BAD_CREDENTIALS: &str = "Email atau password salah";

pub(crate) fn validate_email(email: &str) -> Result<()> {
    if is_valid_email(&normalize_email(email)) {
        Ok(())
    } else {
        Err(ClinicError::Validation("Format email tidak valid".to_string()))
    }
}

pub(crate) fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClinicError::Validation(format!(
            "Password minimal {} karakter",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// 注册请求
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.role == Some(Role::Admin) {
            return Err(ClinicError::Permission(
                "Pendaftaran sebagai admin tidak diizinkan".to_string(),
            ));
        }
        self.profile.validate()
    }
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.email, "Email wajib diisi")?;
        require_text(&self.password, "Password wajib diisi")
    }
}

/// 修改密码请求
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.current_password, "Password lama wajib diisi")?;
        validate_password(&self.new_password)
    }
}

fn user_body(id: Uuid, email: &str, role: Role, full_name: Option<&str>) -> Value {
    json!({
        "id": id,
        "email": email,
        "role": role,
        "full_name": full_name,
    })
}

/// 注册，默认角色为患者
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let queries = state.queries();
    let email = normalize_email(&request.email);

    if queries.email_exists(&email, None).await? {
        return Err(ClinicError::Validation("Email sudah terdaftar".to_string()).into());
    }

    let role = request.role.unwrap_or(Role::Patient);
    let profile = request.profile.into_changes()?;
    let full_name = profile.full_name.clone();

    let user = queries
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: state.auth.hash_password(&request.password)?,
            role,
            profile,
        })
        .await?;

    let token = state.auth.issue_token(user.id, &user.email, user.role)?;
    info!("Registered {} as {}", user.email, user.role);

    created(json!({
        "message": "Registrasi berhasil",
        "token": token,
        "user": user_body(user.id, &user.email, user.role, Some(&full_name)),
    }))
}

/// 登录
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let email = normalize_email(&request.email);
    let bad_credentials = || ApiError(ClinicError::Unauthorized(BAD_CREDENTIALS.to_string()));

    let credentials = match state.queries().find_credentials(&email).await? {
        Some(credentials) => credentials,
        None => {
            warn!("Login failed for unknown email {}", email);
            return Err(bad_credentials());
        }
    };

    if !state
        .auth
        .verify_password(&request.password, &credentials.password_hash)?
    {
        warn!("Login failed for {}: wrong password", email);
        return Err(bad_credentials());
    }

    let role: Role = credentials
        .role
        .parse()
        .map_err(|e: ClinicError| ClinicError::Database(e.to_string()))?;
    let token = state.auth.issue_token(credentials.id, &credentials.email, role)?;
    info!("User {} logged in", credentials.email);

    Ok(Json(json!({
        "message": "Login berhasil",
        "token": token,
        "user": user_body(credentials.id, &credentials.email, role, credentials.full_name.as_deref()),
    })))
}

pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let profile = state
        .queries()
        .get_user_summary(user.id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("User tidak ditemukan".to_string()))?;

    Ok(Json(json!({ "user": profile })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ProfileFields>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    if queries.get_user(user.id).await?.is_none() {
        return Err(ClinicError::NotFound("User tidak ditemukan".to_string()).into());
    }

    queries.update_profile(user.id, &request.into_changes()?).await?;
    Ok(message("Profil berhasil diperbarui"))
}

/// 修改密码，需要验证原密码
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let current_hash = queries
        .get_password_hash(user.id)
        .await?
        .ok_or_else(|| ClinicError::NotFound("User tidak ditemukan".to_string()))?;

    if !state
        .auth
        .verify_password(&request.current_password, &current_hash)?
    {
        warn!("Password change rejected for {}: wrong current password", user.email);
        return Err(ClinicError::Validation("Password lama salah".to_string()).into());
    }

    let new_hash = state.auth.hash_password(&request.new_password)?;
    queries.update_password(user.id, &new_hash).await?;
    info!("Password changed for {}", user.email);

    Ok(message("Password berhasil diubah"))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let notifications = state.notifications.list_for_user(user.id).await?;
    Ok(Json(json!({ "notifications": notifications })))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.notifications.mark_read(user.id, notification_id).await?;
    Ok(message("Notifikasi ditandai sudah dibaca"))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(Json(json!({
        "message": "Semua notifikasi ditandai sudah dibaca",
        "updated": updated,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_request(role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            email: "Pasien@Klinik.id ".to_string(),
            password: "rahasia123".to_string(),
            role,
            profile: ProfileFields {
                full_name: "Siti".to_string(),
                phone: None,
                address: None,
                date_of_birth: None,
                gender: None,
            },
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register_request(None).validate().is_ok());
        assert!(register_request(Some(Role::Doctor)).validate().is_ok());
        assert!(matches!(
            register_request(Some(Role::Admin)).validate(),
            Err(ClinicError::Permission(_))
        ));

        let mut request = register_request(None);
        request.password = "123".to_string();
        assert!(matches!(request.validate(), Err(ClinicError::Validation(_))));

        let mut request = register_request(None);
        request.email = "bukan-email".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_register_request_deserializes_flat_body() {
        let request: RegisterRequest = serde_json::from_value(json!({
            "email": "a@klinik.id",
            "password": "rahasia123",
            "full_name": "Andi",
            "gender": "Laki-laki",
            "role": "patient"
        }))
        .unwrap();

        assert_eq!(request.role, Some(Role::Patient));
        assert_eq!(request.profile.full_name, "Andi");
    }
}
