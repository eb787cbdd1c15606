//! # Clinic 工作流模块
//!
//! 诊所就诊流程的核心业务：
//! - 挂号服务：重复预约检查、预约写入、排队号分配在同一事务内完成
//! - 排队状态机：waiting → in_progress → completed，或 waiting → skipped
//! - 排队服务：叫号、完成、过号，叫号时通知患者
//! - 通知服务：单用户通知与按角色群发

pub mod booking;
pub mod memory;
pub mod notification;
pub mod queue;
pub mod state_machine;

// 重新导出主要类型
pub use booking::{AppointmentService, BookingReceipt, BookingRequest};
pub use memory::MemoryStore;
pub use notification::{Broadcast, NotificationService};
pub use queue::{QueuePosition, QueueService};
pub use state_machine::{QueueEvent, QueueStateMachine};
