//! Web服务器

use crate::auth::{auth_middleware, require_admin, require_doctor_or_admin, require_patient};
use crate::handlers::{account, admin, consultation, doctor, health, patient, readiness};
use crate::state::AppState;
use crate::static_files::{spa_service, StaticFileConfig};
use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use clinic_core::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Web 层选项
#[derive(Debug, Clone, Default)]
pub struct WebOptions {
    /// 前端构建产物目录
    pub static_dir: Option<PathBuf>,
    /// 为空时允许任意来源
    pub cors_allowed_origins: Vec<String>,
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, options: &WebOptions) -> Self {
        let app = create_app(state, options);
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 组装完整路由
pub fn create_app(state: AppState, options: &WebOptions) -> Router {
    let mut app = Router::new()
        // 健康检查
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        // API路由
        .nest("/api/auth", auth_routes(&state))
        .nest("/api/admin", admin_routes(&state))
        .nest("/api/doctor", doctor_routes(&state))
        .nest("/api/patient", patient_routes(&state))
        .with_state(state);

    // 前端单页应用
    if let Some(static_dir) = &options.static_dir {
        if let Some(spa) = spa_service(&StaticFileConfig::new(static_dir)) {
            app = app.fallback_service(spa);
        }
    }

    // 全局中间件
    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&options.cors_allowed_origins)),
    )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// 认证路由：注册、登录公开，其余需要令牌
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/profile", get(account::get_profile).put(account::update_profile))
        .route("/change-password", put(account::change_password))
        .route("/notifications", get(account::list_notifications))
        .route(
            "/notifications/:notification_id/read",
            put(account::mark_notification_read),
        )
        .route(
            "/notifications/mark-all-read",
            put(account::mark_all_notifications_read),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .merge(protected)
}

/// 管理员路由
fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/queue/today", get(admin::today_queue))
        .route("/queue/call", post(admin::call_queue))
        .route("/queue/complete", post(admin::complete_queue))
        .route("/queue/skip", post(admin::skip_queue))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/:id", put(admin::update_user).delete(admin::delete_user))
        .route("/patients", get(admin::list_patients))
        .route("/patients/:id", get(admin::patient_detail))
        .route("/notifications", post(admin::create_notification))
        .route("/notifications/bulk", post(admin::bulk_notification))
        .route("/dashboard/stats", get(admin::dashboard))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// 医生路由，读取类接口管理员也可访问
fn doctor_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/schedules",
            get(doctor::my_schedules).post(doctor::create_schedule),
        )
        .route(
            "/schedules/:id",
            get(doctor::doctor_schedules)
                .put(doctor::update_schedule)
                .delete(doctor::delete_schedule),
        )
        .route("/medical-records", post(doctor::create_medical_record))
        .route(
            "/medical-records/:id",
            get(doctor::patient_medical_records).put(doctor::update_medical_record),
        )
        .route("/today-patients", get(doctor::today_patients))
        .route("/consultations", get(doctor::consultations))
        .route(
            "/consultations/:id/messages",
            get(consultation::list_messages).post(consultation::send_message),
        )
        .route_layer(middleware::from_fn(require_doctor_or_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// 患者路由
fn patient_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/doctors", get(patient::list_doctors))
        .route("/doctors/:id/schedules", get(patient::doctor_schedules))
        .route(
            "/appointments",
            get(patient::my_appointments).post(patient::book_appointment),
        )
        .route("/appointments/:id/cancel", put(patient::cancel_appointment))
        .route("/queue/:id", get(patient::queue_status))
        .route(
            "/consultations",
            get(patient::my_consultations).post(patient::create_consultation),
        )
        .route(
            "/consultations/:id/messages",
            get(consultation::list_messages).post(consultation::send_message),
        )
        .route_layer(middleware::from_fn(require_patient))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
