//! 数据库查询操作：排班、病历、预约视图与在线问诊

use crate::models::*;
use crate::queries::{DatabaseQueries, APPOINTMENT_VIEW_SELECT};
use chrono::NaiveDate;
use clinic_core::{Consultation, ConsultationMessage, DoctorSchedule, MedicalRecord, Result};
use uuid::Uuid;

/// 排班按 Senin…Minggu 排序
const DAY_ORDER: &str =
    "array_position(ARRAY['Senin','Selasa','Rabu','Kamis','Jumat','Sabtu','Minggu']::text[], ds.day_of_week::text)";

const CONSULTATION_VIEW_SELECT: &str = r#"
    SELECT c.id, c.patient_id, c.doctor_id, c.consultation_type, c.status,
           c.scheduled_at, c.notes, c.created_at,
           pp.full_name AS patient_name, pd.full_name AS doctor_name,
           pd.profile_picture AS doctor_picture
    FROM consultations c
    LEFT JOIN profiles pp ON pp.user_id = c.patient_id
    LEFT JOIN profiles pd ON pd.user_id = c.doctor_id
"#;

impl<'a> DatabaseQueries<'a> {
    // 医生排班

    /// 医生当前有效的排班
    pub async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<ScheduleView>> {
        let sql = format!(
            r#"
            SELECT ds.id, ds.doctor_id, p.full_name AS doctor_name, ds.day_of_week,
                   ds.start_time, ds.end_time, ds.max_patients, ds.notes, ds.is_active
            FROM doctor_schedules ds
            LEFT JOIN profiles p ON p.user_id = ds.doctor_id
            WHERE ds.doctor_id = $1 AND ds.is_active = TRUE
            ORDER BY {}, ds.start_time
            "#,
            DAY_ORDER
        );
        let rows = sqlx::query_as::<_, ScheduleView>(&sql)
            .bind(doctor_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    pub async fn create_schedule(
        &self,
        doctor_id: Uuid,
        schedule: &ScheduleChanges,
    ) -> Result<DoctorSchedule> {
        let row = sqlx::query_as::<_, DbSchedule>(
            r#"
            INSERT INTO doctor_schedules
                (id, doctor_id, day_of_week, start_time, end_time, max_patients, notes, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, doctor_id, day_of_week, start_time, end_time, max_patients, notes, is_active
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(doctor_id)
        .bind(schedule.day_of_week.as_str())
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.max_patients)
        .bind(schedule.notes.as_deref())
        .bind(schedule.is_active)
        .fetch_one(self.pool())
        .await?;

        DoctorSchedule::try_from(row)
    }

    /// 只能修改自己的排班
    pub async fn update_schedule(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        schedule: &ScheduleChanges,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE doctor_schedules
            SET day_of_week = $3, start_time = $4, end_time = $5,
                max_patients = $6, notes = $7, is_active = $8
            WHERE id = $1 AND doctor_id = $2
            "#,
        )
        .bind(id)
        .bind(doctor_id)
        .bind(schedule.day_of_week.as_str())
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.max_patients)
        .bind(schedule.notes.as_deref())
        .bind(schedule.is_active)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_schedule(&self, id: Uuid, doctor_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM doctor_schedules WHERE id = $1 AND doctor_id = $2")
            .bind(id)
            .bind(doctor_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // 病历

    pub async fn create_medical_record(&self, record: &NewMedicalRecord) -> Result<MedicalRecord> {
        let fields = &record.fields;
        let row = sqlx::query_as::<_, DbMedicalRecord>(
            r#"
            INSERT INTO medical_records
                (id, patient_id, doctor_id, appointment_id, diagnosis, symptoms, treatment,
                 prescription, blood_pressure, temperature, weight, height, notes, record_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id, patient_id, doctor_id, appointment_id, diagnosis, symptoms, treatment,
                      prescription, blood_pressure, temperature, weight, height, notes,
                      record_date, created_at
            "#,
        )
        .bind(record.id)
        .bind(record.patient_id)
        .bind(record.doctor_id)
        .bind(record.appointment_id)
        .bind(&fields.diagnosis)
        .bind(fields.symptoms.as_deref())
        .bind(fields.treatment.as_deref())
        .bind(fields.prescription.as_deref())
        .bind(fields.blood_pressure.as_deref())
        .bind(fields.temperature)
        .bind(fields.weight)
        .bind(fields.height)
        .bind(fields.notes.as_deref())
        .bind(record.record_date)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    /// 患者病历，最近的在前
    pub async fn list_medical_records(&self, patient_id: Uuid) -> Result<Vec<MedicalRecordView>> {
        let rows = sqlx::query_as::<_, MedicalRecordView>(
            r#"
            SELECT mr.id, mr.patient_id, mr.doctor_id, mr.appointment_id, mr.diagnosis,
                   mr.symptoms, mr.treatment, mr.prescription, mr.blood_pressure,
                   mr.temperature, mr.weight, mr.height, mr.notes, mr.record_date, mr.created_at,
                   pp.full_name AS patient_name, pd.full_name AS doctor_name
            FROM medical_records mr
            LEFT JOIN profiles pp ON pp.user_id = mr.patient_id
            LEFT JOIN profiles pd ON pd.user_id = mr.doctor_id
            WHERE mr.patient_id = $1
            ORDER BY mr.record_date DESC, mr.created_at DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// 只有书写病历的医生可以修改
    pub async fn update_medical_record(
        &self,
        id: Uuid,
        doctor_id: Uuid,
        fields: &MedicalRecordChanges,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE medical_records
            SET diagnosis = $3, symptoms = $4, treatment = $5, prescription = $6,
                blood_pressure = $7, temperature = $8, weight = $9, height = $10,
                notes = $11, updated_at = NOW()
            WHERE id = $1 AND doctor_id = $2
            "#,
        )
        .bind(id)
        .bind(doctor_id)
        .bind(&fields.diagnosis)
        .bind(fields.symptoms.as_deref())
        .bind(fields.treatment.as_deref())
        .bind(fields.prescription.as_deref())
        .bind(fields.blood_pressure.as_deref())
        .bind(fields.temperature)
        .bind(fields.weight)
        .bind(fields.height)
        .bind(fields.notes.as_deref())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // 预约视图

    /// 患者自己的预约，附排队号与排队状态
    pub async fn list_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<AppointmentView>> {
        let sql = format!(
            "{} WHERE a.patient_id = $1 ORDER BY a.appointment_date DESC, a.appointment_time DESC",
            APPOINTMENT_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, AppointmentView>(&sql)
            .bind(patient_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// 医生某日的患者，按排队号升序
    pub async fn doctor_patients_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TodayPatientRow>> {
        let rows = sqlx::query_as::<_, TodayPatientRow>(
            r#"
            SELECT a.id, a.patient_id, a.appointment_date, a.appointment_time, a.complaint,
                   a.status, p.full_name, p.phone, p.date_of_birth,
                   q.id AS queue_id, q.queue_number, q.status AS queue_status
            FROM appointments a
            LEFT JOIN profiles p ON p.user_id = a.patient_id
            LEFT JOIN queue q ON q.appointment_id = a.id
            WHERE a.doctor_id = $1 AND a.appointment_date = $2
            ORDER BY q.queue_number ASC NULLS LAST
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    // 在线问诊

    pub async fn create_consultation(&self, consultation: &NewConsultation) -> Result<Consultation> {
        let row = sqlx::query_as::<_, DbConsultation>(
            r#"
            INSERT INTO consultations
                (id, patient_id, doctor_id, consultation_type, status, scheduled_at, notes)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6)
            RETURNING id, patient_id, doctor_id, consultation_type, status,
                      scheduled_at, notes, created_at
            "#,
        )
        .bind(consultation.id)
        .bind(consultation.patient_id)
        .bind(consultation.doctor_id)
        .bind(consultation.consultation_type.as_str())
        .bind(consultation.scheduled_at)
        .bind(consultation.notes.as_deref())
        .fetch_one(self.pool())
        .await?;

        Consultation::try_from(row)
    }

    pub async fn get_consultation(&self, id: Uuid) -> Result<Option<Consultation>> {
        let row = sqlx::query_as::<_, DbConsultation>(
            r#"
            SELECT id, patient_id, doctor_id, consultation_type, status,
                   scheduled_at, notes, created_at
            FROM consultations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Consultation::try_from).transpose()
    }

    pub async fn list_patient_consultations(&self, patient_id: Uuid) -> Result<Vec<ConsultationView>> {
        self.list_consultations_where("c.patient_id = $1", patient_id).await
    }

    pub async fn list_doctor_consultations(&self, doctor_id: Uuid) -> Result<Vec<ConsultationView>> {
        self.list_consultations_where("c.doctor_id = $1", doctor_id).await
    }

    async fn list_consultations_where(
        &self,
        condition: &str,
        user_id: Uuid,
    ) -> Result<Vec<ConsultationView>> {
        let sql = format!(
            "{} WHERE {} ORDER BY c.created_at DESC",
            CONSULTATION_VIEW_SELECT, condition
        );
        let rows = sqlx::query_as::<_, ConsultationView>(&sql)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    pub async fn add_consultation_message(
        &self,
        consultation_id: Uuid,
        sender_id: Uuid,
        message: &str,
    ) -> Result<ConsultationMessage> {
        let row = sqlx::query_as::<_, DbConsultationMessage>(
            r#"
            INSERT INTO consultation_messages (id, consultation_id, sender_id, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, consultation_id, sender_id, message, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(consultation_id)
        .bind(sender_id)
        .bind(message)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    /// 问诊消息，按发送时间升序
    pub async fn list_consultation_messages(
        &self,
        consultation_id: Uuid,
    ) -> Result<Vec<ConsultationMessageView>> {
        let rows = sqlx::query_as::<_, ConsultationMessageView>(
            r#"
            SELECT cm.id, cm.consultation_id, cm.sender_id, cm.message, cm.created_at,
                   p.full_name AS sender_name
            FROM consultation_messages cm
            LEFT JOIN profiles p ON p.user_id = cm.sender_id
            WHERE cm.consultation_id = $1
            ORDER BY cm.created_at ASC
            "#,
        )
        .bind(consultation_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
