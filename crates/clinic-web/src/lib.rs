//! # Clinic Web 模块
//!
//! HTTP/JSON 接口：JWT 认证与角色守卫、各角色的路由与处理器、错误映射、前端静态文件。

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;
pub mod state;
pub mod static_files;

pub use auth::{AuthService, AuthUser, Claims};
pub use error::{ApiError, ApiResult};
pub use server::{create_app, WebOptions, WebServer};
pub use state::AppState;
