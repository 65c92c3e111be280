//! 运行指标
//!
//! 以 Prometheus 格式暴露签到、降级和队列指标

use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::time::Duration;
use tracing::debug;

/// 分诊系统指标收集器
#[derive(Debug, Clone)]
pub struct TriageMetrics {
    /// Prometheus指标注册表
    registry: Registry,
    /// 签到总数（含紧急按钮）
    check_ins_total: IntCounter,
    /// 紧急按钮次数
    emergency_alerts_total: IntCounter,
    /// 分类器降级次数
    classifier_fallbacks_total: IntCounter,
    /// 状态变更次数
    status_updates_total: IntCounter,
    /// 当前候诊人数
    waiting_patients: IntGauge,
    /// 分类器耗时
    classifier_duration: Histogram,
}

impl TriageMetrics {
    /// 创建并注册所有指标
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let check_ins_total = IntCounter::with_opts(Opts::new(
            "triage_check_ins_total",
            "Total number of patient check-ins",
        ))?;

        let emergency_alerts_total = IntCounter::with_opts(Opts::new(
            "triage_emergency_alerts_total",
            "Total number of kiosk emergency button presses",
        ))?;

        let classifier_fallbacks_total = IntCounter::with_opts(Opts::new(
            "triage_classifier_fallbacks_total",
            "Check-ins that fell back to manual triage",
        ))?;

        let status_updates_total = IntCounter::with_opts(Opts::new(
            "triage_status_updates_total",
            "Total number of patient status updates",
        ))?;

        let waiting_patients = IntGauge::with_opts(Opts::new(
            "triage_waiting_patients",
            "Number of patients currently waiting",
        ))?;

        let classifier_duration = Histogram::with_opts(
            HistogramOpts::new(
                "triage_classifier_duration_seconds",
                "Classifier call duration in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0]),
        )?;

        registry.register(Box::new(check_ins_total.clone()))?;
        registry.register(Box::new(emergency_alerts_total.clone()))?;
        registry.register(Box::new(classifier_fallbacks_total.clone()))?;
        registry.register(Box::new(status_updates_total.clone()))?;
        registry.register(Box::new(waiting_patients.clone()))?;
        registry.register(Box::new(classifier_duration.clone()))?;

        Ok(Self {
            registry,
            check_ins_total,
            emergency_alerts_total,
            classifier_fallbacks_total,
            status_updates_total,
            waiting_patients,
            classifier_duration,
        })
    }

    /// 记录一次自助签到
    pub fn record_check_in(&self, fallback_used: bool, classifier_elapsed: Duration) {
        debug!(
            "Recording check-in (fallback: {}, classifier: {:?})",
            fallback_used, classifier_elapsed
        );

        self.check_ins_total.inc();
        self.classifier_duration.observe(classifier_elapsed.as_secs_f64());
        if fallback_used {
            self.classifier_fallbacks_total.inc();
        }
    }

    /// 记录紧急按钮
    pub fn record_emergency(&self) {
        self.check_ins_total.inc();
        self.emergency_alerts_total.inc();
    }

    pub fn record_status_update(&self) {
        self.status_updates_total.inc();
    }

    pub fn set_waiting_patients(&self, count: usize) {
        self.waiting_patients.set(count as i64);
    }

    /// 获取Prometheus文本格式指标
    pub fn render(&self) -> Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() {
        let metrics = TriageMetrics::new().unwrap();

        metrics.record_check_in(false, Duration::from_millis(300));
        metrics.record_check_in(true, Duration::from_secs(15));
        metrics.record_emergency();
        metrics.record_status_update();
        metrics.set_waiting_patients(2);

        let output = metrics.render().unwrap();
        assert!(output.contains("triage_check_ins_total 3"));
        assert!(output.contains("triage_emergency_alerts_total 1"));
        assert!(output.contains("triage_classifier_fallbacks_total 1"));
        assert!(output.contains("triage_status_updates_total 1"));
        assert!(output.contains("triage_waiting_patients 2"));
        assert!(output.contains("triage_classifier_duration_seconds_count 2"));
    }

    #[test]
    fn test_independent_registries() {
        let first = TriageMetrics::new().unwrap();
        let second = TriageMetrics::new().unwrap();

        first.record_emergency();
        assert!(second.render().unwrap().contains("triage_emergency_alerts_total 0"));
    }
}
