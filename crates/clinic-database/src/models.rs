//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::models::*;
use clinic_core::{ClinicError, Result};
use serde::Serialize;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询
// 枚举列以字符串存储，转换失败说明库中数据损坏，按数据库错误处理

fn parse_column<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = ClinicError>,
{
    value
        .parse()
        .map_err(|e: ClinicError| ClinicError::Database(format!("Corrupted column value: {}", e)))
}

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = ClinicError;

    fn try_from(db_user: DbUser) -> Result<Self> {
        Ok(User {
            id: db_user.id,
            email: db_user.email,
            role: parse_column(&db_user.role)?,
            created_at: db_user.created_at,
            updated_at: db_user.updated_at,
        })
    }
}

/// 登录校验所需的凭据
#[derive(Debug, FromRow)]
pub struct DbCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: Option<String>,
}

/// 数据库用户资料表
#[derive(Debug, FromRow)]
pub struct DbProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

impl TryFrom<DbProfile> for Profile {
    type Error = ClinicError;

    fn try_from(db_profile: DbProfile) -> Result<Self> {
        Ok(Profile {
            user_id: db_profile.user_id,
            full_name: db_profile.full_name,
            phone: db_profile.phone,
            address: db_profile.address,
            date_of_birth: db_profile.date_of_birth,
            gender: db_profile.gender.as_deref().map(parse_column).transpose()?,
        })
    }
}

/// 数据库医生排班表
#[derive(Debug, FromRow)]
pub struct DbSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

impl TryFrom<DbSchedule> for DoctorSchedule {
    type Error = ClinicError;

    fn try_from(db_schedule: DbSchedule) -> Result<Self> {
        Ok(DoctorSchedule {
            id: db_schedule.id,
            doctor_id: db_schedule.doctor_id,
            day_of_week: parse_column(&db_schedule.day_of_week)?,
            start_time: db_schedule.start_time,
            end_time: db_schedule.end_time,
            max_patients: db_schedule.max_patients,
            notes: db_schedule.notes,
            is_active: db_schedule.is_active,
        })
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAppointment> for Appointment {
    type Error = ClinicError;

    fn try_from(db_appointment: DbAppointment) -> Result<Self> {
        Ok(Appointment {
            id: db_appointment.id,
            patient_id: db_appointment.patient_id,
            doctor_id: db_appointment.doctor_id,
            appointment_date: db_appointment.appointment_date,
            appointment_time: db_appointment.appointment_time,
            complaint: db_appointment.complaint,
            status: parse_column(&db_appointment.status)?,
            created_at: db_appointment.created_at,
        })
    }
}

/// 数据库排队表
#[derive(Debug, FromRow)]
pub struct DbQueueEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub queue_number: i32,
    pub queue_date: NaiveDate,
    pub status: String,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbQueueEntry> for QueueEntry {
    type Error = ClinicError;

    fn try_from(db_entry: DbQueueEntry) -> Result<Self> {
        Ok(QueueEntry {
            id: db_entry.id,
            appointment_id: db_entry.appointment_id,
            queue_number: db_entry.queue_number,
            queue_date: db_entry.queue_date,
            status: parse_column(&db_entry.status)?,
            called_at: db_entry.called_at,
            completed_at: db_entry.completed_at,
            created_at: db_entry.created_at,
        })
    }
}

/// 数据库病历表
#[derive(Debug, FromRow)]
pub struct DbMedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub blood_pressure: Option<String>,
    pub temperature: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub notes: Option<String>,
    pub record_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<DbMedicalRecord> for MedicalRecord {
    fn from(db_record: DbMedicalRecord) -> Self {
        MedicalRecord {
            id: db_record.id,
            patient_id: db_record.patient_id,
            doctor_id: db_record.doctor_id,
            appointment_id: db_record.appointment_id,
            diagnosis: db_record.diagnosis,
            symptoms: db_record.symptoms,
            treatment: db_record.treatment,
            prescription: db_record.prescription,
            blood_pressure: db_record.blood_pressure,
            temperature: db_record.temperature,
            weight: db_record.weight,
            height: db_record.height,
            notes: db_record.notes,
            record_date: db_record.record_date,
            created_at: db_record.created_at,
        }
    }
}

/// 数据库通知表
#[derive(Debug, FromRow)]
pub struct DbNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbNotification> for Notification {
    type Error = ClinicError;

    fn try_from(db_notification: DbNotification) -> Result<Self> {
        Ok(Notification {
            id: db_notification.id,
            user_id: db_notification.user_id,
            title: db_notification.title,
            message: db_notification.message,
            kind: parse_column(&db_notification.notification_type)?,
            related_id: db_notification.related_id,
            scheduled_at: db_notification.scheduled_at,
            is_read: db_notification.is_read,
            created_at: db_notification.created_at,
        })
    }
}

/// 数据库在线问诊表
#[derive(Debug, FromRow)]
pub struct DbConsultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbConsultation> for Consultation {
    type Error = ClinicError;

    fn try_from(db_consultation: DbConsultation) -> Result<Self> {
        Ok(Consultation {
            id: db_consultation.id,
            patient_id: db_consultation.patient_id,
            doctor_id: db_consultation.doctor_id,
            consultation_type: parse_column(&db_consultation.consultation_type)?,
            status: parse_column(&db_consultation.status)?,
            scheduled_at: db_consultation.scheduled_at,
            notes: db_consultation.notes,
            created_at: db_consultation.created_at,
        })
    }
}

/// 数据库问诊消息表
#[derive(Debug, FromRow)]
pub struct DbConsultationMessage {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbConsultationMessage> for ConsultationMessage {
    fn from(db_message: DbConsultationMessage) -> Self {
        ConsultationMessage {
            id: db_message.id,
            consultation_id: db_message.consultation_id,
            sender_id: db_message.sender_id,
            message: db_message.message,
            created_at: db_message.created_at,
        }
    }
}

// 查询视图 - 多表联查结果，直接序列化返回给前端

/// 用户列表行
#[derive(Debug, FromRow, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// 患者列表行，附带就诊统计
#[derive(Debug, FromRow, Serialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub total_visits: i64,
    pub last_visit: Option<NaiveDate>,
}

/// 医生列表行
#[derive(Debug, FromRow, Serialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

/// 排班视图
#[derive(Debug, FromRow, Serialize)]
pub struct ScheduleView {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: Option<String>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

/// 当日叫号看板行
#[derive(Debug, FromRow, Serialize)]
pub struct QueueBoardRow {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub queue_number: i32,
    pub queue_date: NaiveDate,
    pub status: String,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub appointment_time: Option<NaiveTime>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

/// 预约视图，带双方姓名和排队信息
#[derive(Debug, FromRow, Serialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub queue_number: Option<i32>,
    pub queue_status: Option<String>,
}

/// 医生当日患者行
#[derive(Debug, FromRow, Serialize)]
pub struct TodayPatientRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
    pub status: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub queue_id: Option<Uuid>,
    pub queue_number: Option<i32>,
    pub queue_status: Option<String>,
}

/// 病历视图
#[derive(Debug, FromRow, Serialize)]
pub struct MedicalRecordView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub prescription: Option<String>,
    pub blood_pressure: Option<String>,
    pub temperature: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub notes: Option<String>,
    pub record_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

/// 问诊视图
#[derive(Debug, FromRow, Serialize)]
pub struct ConsultationView {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_picture: Option<String>,
}

/// 问诊消息视图
#[derive(Debug, FromRow, Serialize)]
pub struct ConsultationMessageView {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub sender_name: Option<String>,
}

/// 管理后台统计
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: i64,
    pub total_doctors: i64,
    pub today_appointments: i64,
    pub today_queue: i64,
}

// 写入模型 - 用于创建/更新记录

/// 新用户（含资料）插入模型
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: ProfileChanges,
}

/// 资料字段
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// 管理员修改用户
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub email: String,
    pub role: Role,
    /// 为 None 时保留原密码
    pub password_hash: Option<String>,
    pub profile: ProfileChanges,
}

/// 排班字段
#[derive(Debug, Clone)]
pub struct ScheduleChanges {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

/// 病历字段
#[derive(Debug, Clone, Default)]
pub struct MedicalRecordChanges {
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

/// 新病历插入模型
#[derive(Debug, Clone)]
pub struct NewMedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub record_date: NaiveDate,
    pub fields: MedicalRecordChanges,
}

/// 新问诊插入模型
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: ConsultationType,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_row_conversion() {
        let row = DbQueueEntry {
            id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            queue_number: 3,
            queue_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            status: "in_progress".to_string(),
            called_at: Some(Utc::now()),
            completed_at: None,
            created_at: Utc::now(),
        };

        let entry = QueueEntry::try_from(row).unwrap();
        assert_eq!(entry.status, QueueStatus::InProgress);
        assert_eq!(entry.queue_number, 3);
    }

    #[test]
    fn test_corrupted_value_is_database_error() {
        let row = DbUser {
            id: Uuid::new_v4(),
            email: "x@klinik.id".to_string(),
            password_hash: String::new(),
            role: "superuser".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(matches!(User::try_from(row), Err(ClinicError::Database(_))));
    }

    #[test]
    fn test_profile_gender_conversion() {
        let row = DbProfile {
            user_id: Uuid::new_v4(),
            full_name: "Siti".to_string(),
            phone: None,
            address: None,
            date_of_birth: None,
            gender: Some("Perempuan".to_string()),
        };

        let profile = Profile::try_from(row).unwrap();
        assert_eq!(profile.gender, Some(Gender::Female));
    }
}
