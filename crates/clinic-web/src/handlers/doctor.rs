//! 医生端：排班、病历、今日患者、问诊列表
//!
//! 读取类路由同时开放给管理员，写操作只允许医生本人。

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
use chrono::NaiveTime;
use clinic_core::utils::{blank_to_none, today};
use clinic_core::{Appointment, ClinicError, DayOfWeek, Result, Role};
use clinic_database::{MedicalRecordChanges, NewMedicalRecord, ScheduleChanges};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

fn default_max_patients() -> i32 {
    20
}

fn default_active() -> bool {
    true
}

/// 排班请求
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub day_of_week: DayOfWeek,
    #[serde(deserialize_with = "deserialize_time")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "deserialize_time")]
    pub end_time: NaiveTime,
    #[serde(default = "default_max_patients")]
    pub max_patients: i32,
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Validate for ScheduleRequest {
    fn validate(&self) -> Result<()> {
        if self.end_time <= self.start_time {
            return Err(ClinicError::Validation(
                "Jam selesai harus setelah jam mulai".to_string(),
            ));
        }
        if self.max_patients <= 0 {
            return Err(ClinicError::Validation(
                "Maksimal pasien harus lebih dari 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<ScheduleRequest> for ScheduleChanges {
    fn from(request: ScheduleRequest) -> Self {
        Self {
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            max_patients: request.max_patients,
            notes: blank_to_none(request.notes),
            is_active: request.is_active,
        }
    }
}

/// 病历字段，新建与修改共用
#[derive(Debug, Deserialize)]
pub struct MedicalRecordFields {
    pub diagnosis: String,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub blood_pressure: Option<String>,
    pub temperature: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub notes: Option<String>,
}

impl Validate for MedicalRecordFields {
    fn validate(&self) -> Result<()> {
        require_text(&self.diagnosis, "Diagnosis wajib diisi")?;
        let measurements = [self.temperature, self.weight, self.height];
        if measurements.iter().flatten().any(|value| *value < 0.0) {
            return Err(ClinicError::Validation(
                "Nilai pemeriksaan tidak boleh negatif".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<MedicalRecordFields> for MedicalRecordChanges {
    fn from(fields: MedicalRecordFields) -> Self {
        Self {
            diagnosis: fields.diagnosis.trim().to_string(),
            symptoms: blank_to_none(fields.symptoms),
            treatment: blank_to_none(fields.treatment),
            prescription: blank_to_none(fields.prescription),
            blood_pressure: blank_to_none(fields.blood_pressure),
            temperature: fields.temperature,
            weight: fields.weight,
            height: fields.height,
            notes: blank_to_none(fields.notes),
        }
    }
}

/// 新建病历请求，`record_date` 缺省为今天
#[derive(Debug, Deserialize)]
pub struct MedicalRecordRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub record_date: Option<String>,
    #[serde(flatten)]
    pub fields: MedicalRecordFields,
}

impl Validate for MedicalRecordRequest {
    fn validate(&self) -> Result<()> {
        if let Some(date) = blank_to_none(self.record_date.clone()) {
            parse_date(&date)?;
        }
        self.fields.validate()
    }
}

// 排班

/// 医生查看自己的排班；管理员需指定医生
pub async fn my_schedules(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    if user.role != Role::Doctor {
        return Err(ClinicError::Validation("ID dokter wajib diisi".to_string()).into());
    }

    let schedules = state.queries().list_schedules(user.id).await?;
    Ok(Json(json!({ "schedules": schedules })))
}

pub async fn doctor_schedules(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let schedules = state.queries().list_schedules(doctor_id).await?;
    Ok(Json(json!({ "schedules": schedules })))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    user.require(Role::Doctor)?;

    let schedule = state
        .queries()
        .create_schedule(user.id, &request.into())
        .await?;
    info!(
        "Doctor {} added schedule {} {}-{}",
        user.id, schedule.day_of_week, schedule.start_time, schedule.end_time
    );

    created(json!({
        "message": "Jadwal berhasil ditambahkan",
        "scheduleId": schedule.id,
    }))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(schedule_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ScheduleRequest>,
) -> ApiResult<Json<Value>> {
    user.require(Role::Doctor)?;

    if !state
        .queries()
        .update_schedule(schedule_id, user.id, &request.into())
        .await?
    {
        return Err(ClinicError::NotFound("Jadwal tidak ditemukan".to_string()).into());
    }

    Ok(message("Jadwal berhasil diperbarui"))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Path(schedule_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    user.require(Role::Doctor)?;

    if !state.queries().delete_schedule(schedule_id, user.id).await? {
        return Err(ClinicError::NotFound("Jadwal tidak ditemukan".to_string()).into());
    }

    Ok(message("Jadwal berhasil dihapus"))
}

// 病历

pub async fn create_medical_record(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<MedicalRecordRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    user.require(Role::Doctor)?;

    let queries = state.queries();
    if queries.get_patient(request.patient_id).await?.is_none() {
        return Err(ClinicError::NotFound("Pasien tidak ditemukan".to_string()).into());
    }
    if let Some(appointment_id) = request.appointment_id {
        let appointment = state.queue.appointment(appointment_id).await?;
        ensure_patient_appointment(appointment.as_ref(), request.patient_id)?;
    }

    let record_date = match blank_to_none(request.record_date) {
        Some(date) => parse_date(&date)?,
        None => today(),
    };

    let record = queries
        .create_medical_record(&NewMedicalRecord {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: user.id,
            appointment_id: request.appointment_id,
            record_date,
            fields: request.fields.into(),
        })
        .await?;
    info!("Doctor {} added medical record for {}", user.id, record.patient_id);

    created(json!({
        "message": "Rekam medis berhasil ditambahkan",
        "recordId": record.id,
    }))
}

/// 病历关联的预约必须存在且属于该患者
fn ensure_patient_appointment(appointment: Option<&Appointment>, patient_id: Uuid) -> Result<()> {
    match appointment {
        Some(appointment) if appointment.patient_id == patient_id => Ok(()),
        _ => Err(ClinicError::NotFound("Janji temu tidak ditemukan".to_string())),
    }
}

/// 患者病历，按就诊日期倒序
pub async fn patient_medical_records(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let records = state.queries().list_medical_records(patient_id).await?;
    Ok(Json(json!({ "records": records })))
}

pub async fn update_medical_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path(record_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<MedicalRecordFields>,
) -> ApiResult<Json<Value>> {
    user.require(Role::Doctor)?;

    if !state
        .queries()
        .update_medical_record(record_id, user.id, &request.into())
        .await?
    {
        return Err(ClinicError::NotFound("Rekam medis tidak ditemukan".to_string()).into());
    }

    Ok(message("Rekam medis berhasil diperbarui"))
}

// 今日患者与问诊

pub async fn today_patients(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    user.require(Role::Doctor)?;

    let patients = state.queries().doctor_patients_on(user.id, today()).await?;
    Ok(Json(json!({ "patients": patients })))
}

pub async fn consultations(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    user.require(Role::Doctor)?;

    let consultations = state.queries().list_doctor_consultations(user.id).await?;
    Ok(Json(json!({ "consultations": consultations })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clinic_core::AppointmentStatus;

    #[test]
    fn test_schedule_request_defaults_and_times() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "day_of_week": "Senin",
            "start_time": "08:00",
            "end_time": "12:00:00",
        }))
        .unwrap();

        assert_eq!(request.day_of_week, DayOfWeek::Monday);
        assert_eq!(request.max_patients, 20);
        assert!(request.is_active);
        assert!(request.validate().is_ok());

        let changes: ScheduleChanges = request.into();
        assert_eq!(changes.end_time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn test_schedule_request_rejects_inverted_range() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "day_of_week": "Jumat",
            "start_time": "13:00",
            "end_time": "09:00",
        }))
        .unwrap();
        assert!(matches!(request.validate(), Err(ClinicError::Validation(_))));

        let result = serde_json::from_value::<ScheduleRequest>(json!({
            "day_of_week": "Friday",
            "start_time": "13:00",
            "end_time": "15:00",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_medical_record_request() {
        let request: MedicalRecordRequest = serde_json::from_value(json!({
            "patient_id": Uuid::new_v4(),
            "diagnosis": " Influenza ",
            "temperature": 38.5,
            "symptoms": "",
            "record_date": "2024-01-10",
        }))
        .unwrap();
        assert!(request.validate().is_ok());

        let changes: MedicalRecordChanges = request.fields.into();
        assert_eq!(changes.diagnosis, "Influenza");
        assert_eq!(changes.symptoms, None);
        assert_eq!(changes.temperature, Some(38.5));

        let request: MedicalRecordFields = serde_json::from_value(json!({
            "diagnosis": "Demam",
            "weight": -1.0,
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_record_appointment_must_belong_to_patient() {
        let patient = Uuid::new_v4();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: Uuid::new_v4(),
            appointment_date: today(),
            appointment_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            complaint: None,
            status: AppointmentStatus::Completed,
            created_at: Utc::now(),
        };

        assert!(ensure_patient_appointment(Some(&appointment), patient).is_ok());
        assert!(matches!(
            ensure_patient_appointment(Some(&appointment), Uuid::new_v4()),
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            ensure_patient_appointment(None, patient),
            Err(ClinicError::NotFound(_))
        ));
    }
}
