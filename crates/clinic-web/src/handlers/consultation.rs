//! 问诊消息，医生端与患者端共用

use super::created;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{require_text, Validate, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use clinic_core::{ClinicError, Consultation, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

impl Validate for MessageRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.message, "Pesan wajib diisi")
    }
}

/// 只有问诊双方可以读写消息，其他人一律视为不存在
async fn participant_consultation(
    state: &AppState,
    user: &AuthUser,
    consultation_id: Uuid,
) -> Result<Consultation> {
    state
        .queries()
        .get_consultation(consultation_id)
        .await?
        .filter(|consultation| consultation.is_participant(user.id))
        .ok_or_else(|| ClinicError::NotFound("Konsultasi tidak ditemukan".to_string()))
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(consultation_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let consultation = participant_consultation(&state, &user, consultation_id).await?;

    let messages = state
        .queries()
        .list_consultation_messages(consultation.id)
        .await?;
    Ok(Json(json!({ "messages": messages })))
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(consultation_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<MessageRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let consultation = participant_consultation(&state, &user, consultation_id).await?;

    let sent = state
        .queries()
        .add_consultation_message(consultation.id, user.id, request.message.trim())
        .await?;

    created(json!({
        "message": "Pesan berhasil dikirim",
        "messageId": sent.id,
    }))
}
