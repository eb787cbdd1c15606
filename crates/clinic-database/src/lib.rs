//! # Clinic 数据库模块
//!
//! 负责诊所业务数据的存储和管理，提供 PostgreSQL 连接池、表结构、
//! 常用 CRUD 查询，以及挂号、排队、通知三个存储 trait 的实现。

pub mod clinical;
pub mod connection;
pub mod models;
pub mod queries;
pub mod schema;
pub mod store;

// 重新导出主要类型
pub use connection::{DatabaseOptions, DatabasePool};
pub use models::*;
pub use queries::DatabaseQueries;
pub use store::PgStore;
