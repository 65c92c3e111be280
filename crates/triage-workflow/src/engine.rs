//! 分诊引擎
//!
//! 协调分类器、签到受理和排队视图的核心引擎

use crate::queue::{PatientQueue, QueueFilter, QueueStats};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use triage_classifier::{classify_or_fallback, TriageClassifier};
use triage_core::{KioskSubmission, PatientRecord, PatientStatus, Result, TriageError, TriageResult};
use uuid::Uuid;

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 分类器调用超时
    pub classifier_timeout: Duration,
    /// 自助机未选择语言时使用的语言
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier_timeout: Duration::from_secs(15),
            default_language: "English".to_string(),
        }
    }
}

/// 一次自助签到的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub record: PatientRecord,
    pub triage: TriageResult,
    pub fallback_used: bool,
    pub classifier_elapsed: Duration,
}

/// 护士看板快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub patients: Vec<PatientRecord>,
    pub waiting_count: usize,
    pub critical_count: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// 自助机屏幕显示的队列信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskStatus {
    pub waiting_count: usize,
    pub next_queue_number: String,
}

/// 会话签到守卫，释放时清除进行中标记
struct IntakeGuard {
    sessions: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for IntakeGuard {
    fn drop(&mut self) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(&self.session_id);
    }
}

/// 分诊引擎
///
/// 同一会话同一时刻只允许一个签到在进行中；分类器调用期间不持有队列锁。
#[derive(Clone)]
pub struct TriageEngine {
    queue: Arc<RwLock<PatientQueue>>,
    classifier: Arc<dyn TriageClassifier>,
    config: EngineConfig,
    active_sessions: Arc<Mutex<HashSet<String>>>,
}

impl TriageEngine {
    /// 创建新的分诊引擎
    pub fn new(classifier: Arc<dyn TriageClassifier>, config: EngineConfig) -> Self {
        Self::with_queue(PatientQueue::new(), classifier, config)
    }

    /// 使用已有队列创建引擎
    pub fn with_queue(
        queue: PatientQueue,
        classifier: Arc<dyn TriageClassifier>,
        config: EngineConfig,
    ) -> Self {
        tracing::info!(
            "Triage engine using classifier {} with {} ms timeout",
            classifier.name(),
            config.classifier_timeout.as_millis()
        );

        Self {
            queue: Arc::new(RwLock::new(queue)),
            classifier,
            config,
            active_sessions: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// 共享队列句柄
    pub fn queue(&self) -> Arc<RwLock<PatientQueue>> {
        self.queue.clone()
    }

    fn begin_intake(&self, session_id: &str) -> Result<IntakeGuard> {
        let mut sessions = self
            .active_sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if !sessions.insert(session_id.to_string()) {
            tracing::warn!("Rejected concurrent check-in for session {}", session_id);
            return Err(TriageError::SessionBusy(format!(
                "Session {} already has a check-in in progress",
                session_id
            )));
        }

        Ok(IntakeGuard {
            sessions: self.active_sessions.clone(),
            session_id: session_id.to_string(),
        })
    }

    /// 自助签到：分类一次，失败降级，然后入队
    pub async fn submit_check_in(
        &self,
        session_id: &str,
        submission: KioskSubmission,
    ) -> Result<CheckInOutcome> {
        let _guard = self.begin_intake(session_id)?;

        let request = submission.triage_request(&self.config.default_language);
        let classification = classify_or_fallback(
            self.classifier.as_ref(),
            &request,
            self.config.classifier_timeout,
        )
        .await;

        let input = submission.into_check_in(&classification.result);
        let record = self.queue.write().await.check_in(input);

        if record.urgency_flag {
            tracing::warn!(
                "Urgent patient #{} checked in at level {}",
                record.queue_number,
                record.triage_level
            );
        }

        Ok(CheckInOutcome {
            record,
            triage: classification.result,
            fallback_used: classification.fallback_used,
            classifier_elapsed: classification.elapsed,
        })
    }

    /// 紧急按钮
    pub async fn trigger_emergency(&self) -> PatientRecord {
        self.queue.write().await.emergency_check_in()
    }

    /// 叫号
    pub async fn call_patient(&self, id: Uuid) -> Result<PatientRecord> {
        self.update_status(id, PatientStatus::Called).await
    }

    pub async fn update_status(&self, id: Uuid, status: PatientStatus) -> Result<PatientRecord> {
        self.queue.write().await.update_status(id, status)
    }

    pub async fn advance_status(&self, id: Uuid) -> Result<PatientRecord> {
        self.queue.write().await.advance_status(id)
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<PatientRecord> {
        self.queue
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| TriageError::NotFound(format!("Patient {} not found", id)))
    }

    /// 看板快照，每次都重新计算
    pub async fn dashboard(&self, filter: &QueueFilter) -> DashboardSnapshot {
        let queue = self.queue.read().await;

        DashboardSnapshot {
            patients: queue.filtered_view(filter),
            waiting_count: queue.waiting_count(),
            critical_count: queue.critical_count(),
            generated_at: chrono::Utc::now(),
        }
    }

    pub async fn stats(&self) -> QueueStats {
        self.queue.read().await.stats()
    }

    pub async fn kiosk_status(&self) -> KioskStatus {
        let queue = self.queue.read().await;

        KioskStatus {
            waiting_count: queue.waiting_count(),
            next_queue_number: queue.intake().peek_next_queue_number(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use triage_classifier::{DisabledClassifier, FALLBACK_REASON, FALLBACK_SUMMARY_PREFIX};
    use triage_core::{TriageLevel, TriageRequest, EMERGENCY_ALERT_NAME};

    /// 按调用顺序返回预设级别
    struct ScriptedClassifier {
        levels: Mutex<Vec<TriageLevel>>,
    }

    impl ScriptedClassifier {
        fn new(levels: Vec<TriageLevel>) -> Self {
            let mut levels = levels;
            levels.reverse();
            Self {
                levels: Mutex::new(levels),
            }
        }
    }

    #[async_trait]
    impl TriageClassifier for ScriptedClassifier {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn classify(&self, request: &TriageRequest) -> anyhow::Result<TriageResult> {
            let level = self
                .levels
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;

            Ok(TriageResult {
                level,
                summary: format!("Summary of {}", request.written_symptoms),
                is_emergency: level.is_critical(),
                reason: "scripted".to_string(),
            })
        }
    }

    /// 在被释放前一直挂起
    struct GatedClassifier {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl TriageClassifier for GatedClassifier {
        fn name(&self) -> &str {
            "gated"
        }

        async fn classify(&self, _request: &TriageRequest) -> anyhow::Result<TriageResult> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(TriageResult {
                level: TriageLevel::NonUrgent,
                summary: "ok".to_string(),
                is_emergency: false,
                reason: "gated".to_string(),
            })
        }
    }

    fn submission(symptoms: &str) -> KioskSubmission {
        KioskSubmission {
            symptoms: symptoms.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_ordering() {
        let classifier = ScriptedClassifier::new(vec![
            TriageLevel::Urgent,
            TriageLevel::Resuscitation,
            TriageLevel::LessUrgent,
        ]);
        let engine = TriageEngine::new(Arc::new(classifier), EngineConfig::default());

        let first = engine.submit_check_in("kiosk-1", submission("fever")).await.unwrap();
        let second = engine.submit_check_in("kiosk-1", submission("not breathing")).await.unwrap();
        let third = engine.submit_check_in("kiosk-1", submission("rash")).await.unwrap();

        assert!(first.record.check_in_time <= second.record.check_in_time);
        assert!(second.record.check_in_time <= third.record.check_in_time);

        let snapshot = engine.dashboard(&QueueFilter::default()).await;
        let order: Vec<Uuid> = snapshot.patients.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![second.record.id, first.record.id, third.record.id]);
        assert_eq!(snapshot.waiting_count, 3);
        assert_eq!(snapshot.critical_count, 1);
        assert!(!first.fallback_used);
        assert_eq!(second.record.ai_summary.as_deref(), Some("Summary of not breathing"));
    }

    #[tokio::test]
    async fn test_classifier_failure_still_checks_in() {
        let engine = TriageEngine::new(Arc::new(DisabledClassifier), EngineConfig::default());

        let outcome = engine
            .submit_check_in("kiosk-1", submission("twisted knee while running"))
            .await
            .unwrap();

        assert!(outcome.fallback_used);
        assert_eq!(outcome.triage.reason, FALLBACK_REASON);
        assert_eq!(outcome.record.triage_level, TriageLevel::Urgent);
        assert!(!outcome.record.urgency_flag);
        assert!(outcome
            .record
            .ai_summary
            .as_deref()
            .unwrap()
            .starts_with(FALLBACK_SUMMARY_PREFIX));
        assert_eq!(outcome.record.queue_number, "101");
    }

    #[tokio::test]
    async fn test_emergency_takes_next_number() {
        let engine = TriageEngine::new(Arc::new(DisabledClassifier), EngineConfig::default());

        engine.submit_check_in("kiosk-1", submission("cough")).await.unwrap();
        let emergency = engine.trigger_emergency().await;

        assert_eq!(emergency.queue_number, "102");
        assert_eq!(emergency.triage_level, TriageLevel::Resuscitation);
        assert!(emergency.urgency_flag);
        assert_eq!(emergency.name, EMERGENCY_ALERT_NAME);

        let snapshot = engine.dashboard(&QueueFilter::default()).await;
        assert_eq!(snapshot.patients.len(), 2);
        assert_eq!(snapshot.patients[0].id, emergency.id);

        let status = engine.kiosk_status().await;
        assert_eq!(status.waiting_count, 2);
        assert_eq!(status.next_queue_number, "103");
    }

    #[tokio::test]
    async fn test_session_is_not_reentrant() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let classifier = GatedClassifier {
            entered: entered.clone(),
            release: release.clone(),
        };
        let engine = TriageEngine::new(Arc::new(classifier), EngineConfig::default());

        let background = engine.clone();
        let pending = tokio::spawn(async move {
            background.submit_check_in("kiosk-1", submission("back pain")).await
        });
        entered.notified().await;

        let result = engine.submit_check_in("kiosk-1", submission("again")).await;
        assert!(matches!(result, Err(TriageError::SessionBusy(_))));
        assert!(engine.queue().read().await.is_empty());

        release.notify_one();
        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome.record.queue_number, "101");

        // 守卫释放后同一会话可以再次签到
        let next = engine.clone();
        let again = tokio::spawn(async move {
            next.submit_check_in("kiosk-1", submission("follow up")).await
        });
        entered.notified().await;
        release.notify_one();
        assert_eq!(again.await.unwrap().unwrap().record.queue_number, "102");
    }

    #[tokio::test]
    async fn test_abandoned_intake_creates_no_record() {
        let entered = Arc::new(Notify::new());
        let classifier = GatedClassifier {
            entered: entered.clone(),
            release: Arc::new(Notify::new()),
        };
        let engine = TriageEngine::new(Arc::new(classifier), EngineConfig::default());

        let background = engine.clone();
        let pending = tokio::spawn(async move {
            background.submit_check_in("kiosk-1", submission("nausea")).await
        });
        entered.notified().await;
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        assert!(engine.queue().read().await.is_empty());
        assert_eq!(engine.kiosk_status().await.next_queue_number, "101");
        assert!(engine.begin_intake("kiosk-1").is_ok());
    }

    #[tokio::test]
    async fn test_status_actions() {
        let engine = TriageEngine::new(Arc::new(DisabledClassifier), EngineConfig::default());
        let record = engine.trigger_emergency().await;

        let called = engine.call_patient(record.id).await.unwrap();
        assert_eq!(called.status, PatientStatus::Called);
        assert_eq!(engine.kiosk_status().await.waiting_count, 0);

        let result = engine.update_status(record.id, PatientStatus::Waiting).await;
        assert!(matches!(result, Err(TriageError::InvalidStateTransition { .. })));

        let treating = engine.advance_status(record.id).await.unwrap();
        assert_eq!(treating.status, PatientStatus::Treating);

        assert!(matches!(
            engine.get_patient(Uuid::new_v4()).await,
            Err(TriageError::NotFound(_))
        ));
        assert_eq!(engine.stats().await.treating, 1);
    }
}
