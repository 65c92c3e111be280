//! # 分诊工作流模块
//!
//! 提供急诊自助签到与排队管理功能，包括：
//! - 签到受理：把多模态输入转换为带排队号的患者记录
//! - 排队视图：按分诊级别和到达时间排序，统计候诊与危重人数
//! - 患者状态机：状态只能向前推进
//! - 分诊引擎：调用外部分类器并在失败时降级

pub mod engine;
pub mod intake;
pub mod queue;
pub mod state_machine;

// 重新导出主要类型
pub use engine::{CheckInOutcome, DashboardSnapshot, EngineConfig, KioskStatus, TriageEngine};
pub use intake::CheckInIntake;
pub use queue::{
    compare_priority, critical_count, filtered_view, sorted_view, update_status, waiting_count,
    PatientQueue, QueueFilter, QueueStats,
};
pub use state_machine::StatusStateMachine;
