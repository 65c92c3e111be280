//! QuickTriage ER
//!
//! 急诊自助分诊签到与护士排队监控系统，汇总各子模块的公共接口

pub use triage_classifier as classifier;
pub use triage_core as core;
pub use triage_workflow as workflow;

pub use triage_classifier::{DisabledClassifier, TriageClassifier};
pub use triage_core::{
    KioskSubmission, PatientRecord, PatientStatus, Result, TriageError, TriageLevel,
    TriageRequest, TriageResult,
};
pub use triage_workflow::{EngineConfig, QueueFilter, TriageEngine};
