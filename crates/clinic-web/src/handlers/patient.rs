//! 患者端：医生列表、挂号、预约、排队进度、在线问诊

use super::{created, deserialize_time, message, parse_date};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::{require_text, Validate, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::utils::{blank_to_none, today};
use clinic_core::{ClinicError, ConsultationType, Result, Role};
use clinic_database::NewConsultation;
use clinic_workflow::{BookingRequest, QueuePosition};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// 挂号请求
#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_date: String,
    #[serde(deserialize_with = "deserialize_time")]
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
}

impl AppointmentRequest {
    fn date(&self) -> Result<NaiveDate> {
        parse_date(&self.appointment_date)
    }
}

impl Validate for AppointmentRequest {
    fn validate(&self) -> Result<()> {
        require_text(&self.appointment_date, "Tanggal janji wajib diisi")?;
        if self.date()? < today() {
            return Err(ClinicError::Validation(
                "Tanggal janji tidak boleh di masa lalu".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_consultation_type() -> ConsultationType {
    ConsultationType::Chat
}

/// 在线问诊申请
#[derive(Debug, Deserialize)]
pub struct ConsultationRequest {
    pub doctor_id: Uuid,
    #[serde(default = "default_consultation_type")]
    pub consultation_type: ConsultationType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Validate for ConsultationRequest {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

async fn ensure_doctor(state: &AppState, doctor_id: Uuid) -> Result<()> {
    match state.queries().get_user(doctor_id).await? {
        Some(user) if user.role == Role::Doctor => Ok(()),
        _ => Err(ClinicError::NotFound("Dokter tidak ditemukan".to_string())),
    }
}

// 医生与排班

pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let doctors = state.queries().list_doctors().await?;
    Ok(Json(json!({ "doctors": doctors })))
}

pub async fn doctor_schedules(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let schedules = state.queries().list_schedules(doctor_id).await?;
    Ok(Json(json!({ "schedules": schedules })))
}

// 预约

/// 挂号并分配当日排队号
pub async fn book_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<AppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let date = request.date()?;

    let receipt = state
        .booking
        .book(BookingRequest {
            patient_id: user.id,
            doctor_id: request.doctor_id,
            date,
            time: request.appointment_time,
            complaint: blank_to_none(request.complaint),
        })
        .await?;

    created(json!({
        "message": "Pendaftaran berhasil",
        "appointmentId": receipt.appointment.id,
        "queueNumber": receipt.queue_entry.queue_number,
    }))
}

pub async fn my_appointments(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let appointments = state.queries().list_patient_appointments(user.id).await?;
    Ok(Json(json!({ "appointments": appointments })))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.booking.cancel(user.id, appointment_id).await?;
    Ok(message("Janji temu berhasil dibatalkan"))
}

/// 某个预约的排队进度，只能查看自己的
pub async fn queue_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> ApiResult<Json<QueuePosition>> {
    let position = state
        .queue
        .position_for_appointment(user.id, appointment_id)
        .await?;
    Ok(Json(position))
}

// 在线问诊

pub async fn create_consultation(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ConsultationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    ensure_doctor(&state, request.doctor_id).await?;

    let consultation = state
        .queries()
        .create_consultation(&NewConsultation {
            id: Uuid::new_v4(),
            patient_id: user.id,
            doctor_id: request.doctor_id,
            consultation_type: request.consultation_type,
            scheduled_at: request.scheduled_at,
            notes: blank_to_none(request.notes),
        })
        .await?;
    info!(
        "Patient {} requested {} consultation with {}",
        user.id, consultation.consultation_type, consultation.doctor_id
    );

    created(json!({
        "message": "Konsultasi berhasil dibuat",
        "consultationId": consultation.id,
    }))
}

pub async fn my_consultations(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let consultations = state.queries().list_patient_consultations(user.id).await?;
    Ok(Json(json!({ "consultations": consultations })))
}
