//! HTTP处理器

pub mod account;
pub mod admin;
pub mod consultation;
pub mod doctor;
pub mod patient;

use crate::error::ApiResult;
use crate::extract::{require_text, Validate};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{NaiveDate, NaiveTime};
use clinic_core::utils::blank_to_none;
use clinic_core::{ClinicError, Gender, Result};
use clinic_database::ProfileChanges;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 就绪检查，确认数据库可用
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// 只含提示信息的响应体
pub(crate) fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "message": text.into() }))
}

pub(crate) fn created(body: Value) -> ApiResult<(StatusCode, Json<Value>)> {
    Ok((StatusCode::CREATED, Json(body)))
}

/// 用户资料字段，注册、管理员建号和修改资料共用
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileFields {
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
}

impl Validate for ProfileFields {
    fn validate(&self) -> Result<()> {
        require_text(&self.full_name, "Nama lengkap wajib diisi")?;
        self.parsed_date_of_birth()?;
        self.parsed_gender()?;
        Ok(())
    }
}

impl ProfileFields {
    fn parsed_date_of_birth(&self) -> Result<Option<NaiveDate>> {
        blank_to_none(self.date_of_birth.clone())
            .map(|value| parse_date(&value))
            .transpose()
    }

    fn parsed_gender(&self) -> Result<Option<Gender>> {
        blank_to_none(self.gender.clone())
            .map(|value| value.parse())
            .transpose()
    }

    pub fn into_changes(self) -> Result<ProfileChanges> {
        let date_of_birth = self.parsed_date_of_birth()?;
        let gender = self.parsed_gender()?;

        Ok(ProfileChanges {
            full_name: self.full_name.trim().to_string(),
            phone: blank_to_none(self.phone),
            address: blank_to_none(self.address),
            date_of_birth,
            gender,
        })
    }
}

/// 接受 `YYYY-MM-DD`，以及前端可能发送的完整 ISO 时间戳
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| ClinicError::Validation(format!("Format tanggal tidak valid: {}", value)))
}

/// 接受 `HH:MM` 与 `HH:MM:SS`
pub(crate) fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ClinicError::Validation(format!("Format waktu tidak valid: {}", value)))
}

pub(crate) fn deserialize_time<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_time(value.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("08:30").unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(parse_time("08:30:15").unwrap(), NaiveTime::from_hms_opt(8, 30, 15).unwrap());
        assert!(parse_time("8.30").is_err());
    }

    #[test]
    fn test_parse_date_accepts_timestamp() {
        let expected = NaiveDate::from_ymd_opt(1990, 5, 1).unwrap();
        assert_eq!(parse_date("1990-05-01").unwrap(), expected);
        assert_eq!(parse_date("1990-05-01T00:00:00.000Z").unwrap(), expected);
        assert!(parse_date("01/05/1990").is_err());
    }

    #[test]
    fn test_profile_fields_blank_values() {
        let fields = ProfileFields {
            full_name: "  Budi Santoso ".to_string(),
            phone: Some("".to_string()),
            address: None,
            date_of_birth: Some("".to_string()),
            gender: Some("Laki-laki".to_string()),
        };
        assert!(fields.validate().is_ok());

        let changes = fields.into_changes().unwrap();
        assert_eq!(changes.full_name, "Budi Santoso");
        assert_eq!(changes.phone, None);
        assert_eq!(changes.date_of_birth, None);
        assert_eq!(changes.gender, Some(Gender::Male));
    }

    #[test]
    fn test_profile_fields_rejects_unknown_gender() {
        let fields = ProfileFields {
            full_name: "Budi".to_string(),
            phone: None,
            address: None,
            date_of_birth: None,
            gender: Some("X".to_string()),
        };
        assert!(matches!(fields.validate(), Err(ClinicError::Validation(_))));
    }
}
