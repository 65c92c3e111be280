//! 自助分诊演示程序
//!
//! 使用脚本化分类器模拟几位患者签到、按下紧急按钮，并展示护士看板

use async_trait::async_trait;
use quick_triage::core::IdentificationMode;
use quick_triage::workflow::KioskStatus;
use quick_triage::{
    EngineConfig, KioskSubmission, PatientStatus, QueueFilter, TriageClassifier, TriageEngine,
    TriageLevel, TriageRequest, TriageResult,
};
use std::sync::Arc;
use tracing::info;

/// 根据关键词给出分级的演示分类器
struct KeywordClassifier;

#[async_trait]
impl TriageClassifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword-demo"
    }

    async fn classify(&self, request: &TriageRequest) -> anyhow::Result<TriageResult> {
        let text = format!(
            "{} {}",
            request.written_symptoms,
            request.voice_transcript.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        if text.contains("offline") {
            anyhow::bail!("classifier unavailable");
        }

        let level = if text.contains("chest") {
            TriageLevel::Emergent
        } else if text.contains("fever") {
            TriageLevel::Urgent
        } else {
            TriageLevel::LessUrgent
        };

        Ok(TriageResult {
            level,
            summary: format!("Patient reports: {}", request.written_symptoms),
            is_emergency: level.is_critical(),
            reason: format!("Keyword match ({})", request.language),
        })
    }
}

fn submission(name: &str, symptoms: &str) -> KioskSubmission {
    KioskSubmission {
        name: Some(name.to_string()),
        identification: IdentificationMode::Registered,
        symptoms: symptoms.to_string(),
        ..Default::default()
    }
}

fn print_kiosk(status: &KioskStatus) {
    println!(
        "🖥️  自助机: 候诊 {} 人，下一个号码 {}",
        status.waiting_count, status.next_queue_number
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let engine = TriageEngine::new(Arc::new(KeywordClassifier), EngineConfig::default());
    info!("Demo engine ready with classifier {}", engine.classifier_name());

    println!("🚀 QuickTriage ER 演示\n");
    print_kiosk(&engine.kiosk_status().await);

    // 1. 自助签到
    let patients = [
        ("Maria", "sprained ankle"),
        ("Tom", "high fever since yesterday"),
        ("Li", "chest tightness and sweating"),
        ("", "offline headache"),
    ];
    for (session, (name, symptoms)) in patients.iter().enumerate() {
        let outcome = engine
            .submit_check_in(&format!("kiosk-{}", session), submission(name, symptoms))
            .await?;
        println!(
            "📋 {} 签到，号码 {}，级别 {}{}",
            outcome.record.name,
            outcome.record.queue_number,
            outcome.record.triage_level,
            if outcome.fallback_used { "（人工分诊）" } else { "" }
        );
    }

    // 2. 紧急按钮
    let alert = engine.trigger_emergency().await;
    println!("🚨 紧急按钮，号码 {}", alert.queue_number);

    // 3. 护士叫号
    let called = engine.call_patient(alert.id).await?;
    info!("Nurse called patient {}", called.id);
    println!("📣 叫号 {} -> {}", called.queue_number, called.status);

    // 4. 护士看板
    let snapshot = engine.dashboard(&QueueFilter::default()).await;
    println!(
        "\n📊 护士看板: 候诊 {}，危重 {}",
        snapshot.waiting_count, snapshot.critical_count
    );
    for record in &snapshot.patients {
        println!(
            "   {} {:<18} {:<12} {:<9} {}",
            record.queue_number,
            record.name,
            record.triage_level.label(),
            record.status,
            record.ai_summary.as_deref().unwrap_or("-")
        );
    }

    // 5. 只看候诊
    let waiting = engine
        .dashboard(&QueueFilter {
            statuses: Some(vec![PatientStatus::Waiting]),
            ..Default::default()
        })
        .await;
    println!("\n⏳ 候诊中 {} 人", waiting.patients.len());

    print_kiosk(&engine.kiosk_status().await);
    Ok(())
}
