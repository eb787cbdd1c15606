//! # Clinic Core
//!
//! 诊所排队与预约系统的核心模块，提供基础数据结构、错误定义、存储抽象和通用工具。

pub mod error;
pub mod models;
pub mod store;
pub mod utils;

pub use error::{ClinicError, Result};
pub use models::*;
pub use store::{BookingStore, BookingTransaction, NotificationStore, QueueStore};
