//! 数据库表结构
//!
//! 所有语句都可重复执行，启动时按配置自动建表。

use crate::queries::DatabaseQueries;
use clinic_core::Result;
use tracing::info;

/// 建表语句，按外键依赖顺序排列
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role VARCHAR(16) NOT NULL CHECK (role IN ('admin', 'dokter', 'pasien')),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "profiles",
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            full_name VARCHAR(255) NOT NULL,
            phone VARCHAR(32),
            address TEXT,
            date_of_birth DATE,
            gender VARCHAR(16) CHECK (gender IN ('Laki-laki', 'Perempuan')),
            profile_picture TEXT,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "doctor_schedules",
        r#"
        CREATE TABLE IF NOT EXISTS doctor_schedules (
            id UUID PRIMARY KEY,
            doctor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            day_of_week VARCHAR(10) NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            max_patients INTEGER NOT NULL DEFAULT 20 CHECK (max_patients > 0),
            notes TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            CHECK (end_time > start_time)
        )
        "#,
    ),
    (
        "appointments",
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            doctor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            appointment_date DATE NOT NULL,
            appointment_time TIME NOT NULL,
            complaint TEXT,
            status VARCHAR(16) NOT NULL DEFAULT 'confirmed'
                CHECK (status IN ('confirmed', 'completed', 'cancelled')),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "queue",
        r#"
        CREATE TABLE IF NOT EXISTS queue (
            id UUID PRIMARY KEY,
            appointment_id UUID NOT NULL UNIQUE REFERENCES appointments(id) ON DELETE CASCADE,
            queue_number INTEGER NOT NULL CHECK (queue_number > 0),
            queue_date DATE NOT NULL,
            status VARCHAR(16) NOT NULL DEFAULT 'waiting'
                CHECK (status IN ('waiting', 'in_progress', 'completed', 'skipped')),
            called_at TIMESTAMP WITH TIME ZONE,
            completed_at TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            CONSTRAINT uq_queue_date_number UNIQUE (queue_date, queue_number)
        )
        "#,
    ),
    (
        "queue_counters",
        r#"
        CREATE TABLE IF NOT EXISTS queue_counters (
            queue_date DATE PRIMARY KEY,
            last_number INTEGER NOT NULL
        )
        "#,
    ),
    (
        "medical_records",
        r#"
        CREATE TABLE IF NOT EXISTS medical_records (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            doctor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            appointment_id UUID REFERENCES appointments(id) ON DELETE SET NULL,
            diagnosis TEXT NOT NULL,
            symptoms TEXT,
            treatment TEXT,
            prescription TEXT,
            blood_pressure VARCHAR(16),
            temperature DOUBLE PRECISION,
            weight DOUBLE PRECISION,
            height DOUBLE PRECISION,
            notes TEXT,
            record_date DATE NOT NULL DEFAULT CURRENT_DATE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "notifications",
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title VARCHAR(255) NOT NULL,
            message TEXT NOT NULL,
            notification_type VARCHAR(20) NOT NULL DEFAULT 'general',
            related_id UUID,
            scheduled_at TIMESTAMP WITH TIME ZONE,
            is_read BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "consultations",
        r#"
        CREATE TABLE IF NOT EXISTS consultations (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            doctor_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            consultation_type VARCHAR(10) NOT NULL CHECK (consultation_type IN ('chat', 'video')),
            status VARCHAR(16) NOT NULL DEFAULT 'pending',
            scheduled_at TIMESTAMP WITH TIME ZONE,
            notes TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "consultation_messages",
        r#"
        CREATE TABLE IF NOT EXISTS consultation_messages (
            id UUID PRIMARY KEY,
            consultation_id UUID NOT NULL REFERENCES consultations(id) ON DELETE CASCADE,
            sender_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

/// 唯一预约约束的索引名，违反时映射为重复预约
pub const ACTIVE_APPOINTMENT_INDEX: &str = "uq_appointments_active";

const INDEXES: &[&str] = &[
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS uq_appointments_active
        ON appointments (patient_id, doctor_id, appointment_date)
        WHERE status <> 'cancelled'
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users (role)",
    "CREATE INDEX IF NOT EXISTS idx_schedules_doctor ON doctor_schedules (doctor_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments (appointment_date)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments (doctor_id, appointment_date)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_queue_date_status ON queue (queue_date, status)",
    "CREATE INDEX IF NOT EXISTS idx_medical_records_patient ON medical_records (patient_id, record_date)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_consultations_patient ON consultations (patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_consultations_doctor ON consultations (doctor_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_consultation ON consultation_messages (consultation_id, created_at)",
];

impl<'a> DatabaseQueries<'a> {
    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool();

        for (name, ddl) in TABLES {
            sqlx::query(ddl).execute(pool).await?;
            info!("Table {} ready", name);
        }

        self.create_indexes().await
    }

    /// 创建索引
    pub async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool();

        for ddl in INDEXES {
            sqlx::query(ddl).execute(pool).await?;
        }

        info!("{} indexes ready", INDEXES.len());
        Ok(())
    }
}
