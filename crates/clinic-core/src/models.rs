//! 核心数据模型定义

use crate::error::{ClinicError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 定义与数据库/JSON 中字符串取值一一对应的枚举
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ClinicError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ClinicError::Validation(format!(
                        "Nilai {} tidak dikenal: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// 用户角色
///
/// 存储值沿用印尼语（`dokter`、`pasien`），反序列化时也接受英文别名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "dokter", alias = "doctor")]
    Doctor,
    #[serde(rename = "pasien", alias = "patient")]
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "dokter",
            Role::Patient => "pasien",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "dokter" | "doctor" => Ok(Role::Doctor),
            "pasien" | "patient" => Ok(Role::Patient),
            other => Err(ClinicError::Validation(format!("Role tidak dikenal: {}", other))),
        }
    }
}

wire_enum! {
    /// 性别
    Gender {
        Male => "Laki-laki",
        Female => "Perempuan",
    }
}

wire_enum! {
    /// 排班星期（周一在前）
    DayOfWeek {
        Monday => "Senin",
        Tuesday => "Selasa",
        Wednesday => "Rabu",
        Thursday => "Kamis",
        Friday => "Jumat",
        Saturday => "Sabtu",
        Sunday => "Minggu",
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

wire_enum! {
    /// 预约状态
    AppointmentStatus {
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

wire_enum! {
    /// 排队状态
    QueueStatus {
        Waiting => "waiting",       // 等待中
        InProgress => "in_progress", // 就诊中
        Completed => "completed",   // 已完成
        Skipped => "skipped",       // 已跳过
    }
}

impl QueueStatus {
    /// 终态不再接受任何事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Skipped)
    }
}

wire_enum! {
    /// 通知类型
    NotificationKind {
        General => "general",
        Appointment => "appointment",
        Queue => "queue",
        Reminder => "reminder",
        Consultation => "consultation",
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        NotificationKind::General
    }
}

wire_enum! {
    /// 在线问诊方式
    ConsultationType {
        Chat => "chat",
        Video => "video",
    }
}

wire_enum! {
    /// 在线问诊状态
    ConsultationStatus {
        Pending => "pending",
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

/// 用户账号（不含密码哈希）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 用户资料，与 User 一对一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

/// 医生排班
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_patients: i32,
    pub notes: Option<String>,
    pub is_active: bool,
}

/// 预约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// 当日排队条目，与预约一对一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub queue_number: i32,
    pub queue_date: NaiveDate,
    pub status: QueueStatus,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 病历
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
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

/// 站内通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 在线问诊
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_type: ConsultationType,
    pub status: ConsultationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Consultation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

/// 问诊消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationMessage {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

// 插入模型 - 用于创建新记录

/// 新预约插入模型
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub complaint: Option<String>,
}

/// 新排队条目插入模型
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub queue_number: i32,
    pub queue_date: NaiveDate,
}

/// 新通知插入模型
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            related_id: None,
            scheduled_at: None,
        }
    }

    pub fn related_to(mut self, related_id: Uuid) -> Self {
        self.related_id = Some(related_id);
        self
    }

    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            related_id: self.related_id,
            scheduled_at: self.scheduled_at,
            is_read: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_values() {
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"dokter\"");
        let role: Role = serde_json::from_str("\"patient\"").unwrap();
        assert_eq!(role, Role::Patient);
        assert_eq!("pasien".parse::<Role>().unwrap(), Role::Patient);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn test_queue_status_round_trip_strings() {
        for status in QueueStatus::ALL {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), *status);
        }
        assert!(QueueStatus::Skipped.is_terminal());
        assert!(!QueueStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_day_of_week_order() {
        let mut days = vec![DayOfWeek::Sunday, DayOfWeek::Wednesday, DayOfWeek::Monday];
        days.sort();
        assert_eq!(days, vec![DayOfWeek::Monday, DayOfWeek::Wednesday, DayOfWeek::Sunday]);
        assert_eq!(DayOfWeek::from(Weekday::Fri).as_str(), "Jumat");
    }

    #[test]
    fn test_notification_kind_field_name() {
        let notification = NewNotification::new(Uuid::new_v4(), "t", "m", NotificationKind::Queue)
            .into_notification(Utc::now());
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "queue");
        assert_eq!(value["is_read"], false);
    }
}
