//! 排队视图
//!
//! 为护士看板提供按优先级排序的患者队列、统计和状态变更

use crate::intake::CheckInIntake;
use crate::state_machine::StatusStateMachine;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use triage_core::{CheckInInput, PatientRecord, PatientStatus, Result, TriageError, TriageLevel};
use uuid::Uuid;

/// 队列优先级比较：分诊级别升序，其次签到时间，最后签到序号
pub fn compare_priority(a: &PatientRecord, b: &PatientRecord) -> Ordering {
    a.triage_level
        .cmp(&b.triage_level)
        .then_with(|| a.check_in_time.cmp(&b.check_in_time))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

/// 生成排序后的队列视图，每次调用都从当前记录重新计算
pub fn sorted_view(records: &[PatientRecord]) -> Vec<PatientRecord> {
    let mut view = records.to_vec();
    view.sort_by(compare_priority);
    view
}

/// 按过滤条件生成排序视图
pub fn filtered_view(records: &[PatientRecord], filter: &QueueFilter) -> Vec<PatientRecord> {
    let mut items: Vec<&PatientRecord> = records.iter().filter(|r| filter.matches(r)).collect();
    items.sort_by(|a, b| compare_priority(a, b));

    let offset = filter.offset.unwrap_or(0);
    let limit = filter.limit.unwrap_or(usize::MAX);

    items
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect()
}

/// 返回只替换了目标患者状态的新记录集
///
/// 未知 id 返回 `NotFound`，回退状态返回 `InvalidStateTransition`。
pub fn update_status(
    records: &[PatientRecord],
    id: Uuid,
    new_status: PatientStatus,
) -> Result<Vec<PatientRecord>> {
    let state_machine = StatusStateMachine::new();

    let current = records
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| TriageError::NotFound(format!("Patient {} not found", id)))?;
    state_machine.transition(current.status, new_status)?;

    Ok(records
        .iter()
        .map(|r| {
            if r.id == id {
                PatientRecord {
                    status: new_status,
                    ..r.clone()
                }
            } else {
                r.clone()
            }
        })
        .collect())
}

/// 候诊人数
pub fn waiting_count(records: &[PatientRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.status == PatientStatus::Waiting)
        .count()
}

/// 危重 (P1/P2) 人数
pub fn critical_count(records: &[PatientRecord]) -> usize {
    records.iter().filter(|r| r.triage_level.is_critical()).count()
}

/// 队列过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueFilter {
    pub statuses: Option<Vec<PatientStatus>>,
    pub levels: Option<Vec<TriageLevel>>,
    pub urgent_only: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueueFilter {
    pub fn matches(&self, record: &PatientRecord) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&record.status) {
                return false;
            }
        }

        if let Some(levels) = &self.levels {
            if !levels.contains(&record.triage_level) {
                return false;
            }
        }

        !self.urgent_only || record.urgency_flag
    }
}

/// 队列统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub waiting: usize,
    pub called: usize,
    pub treating: usize,
    pub completed: usize,
    pub critical: usize,
    pub by_level: BTreeMap<u8, usize>,
}

impl QueueStats {
    pub fn compute(records: &[PatientRecord]) -> Self {
        let mut stats = QueueStats {
            total: records.len(),
            waiting: 0,
            called: 0,
            treating: 0,
            completed: 0,
            critical: critical_count(records),
            by_level: TriageLevel::ALL.iter().map(|l| (l.as_u8(), 0)).collect(),
        };

        for record in records {
            match record.status {
                PatientStatus::Waiting => stats.waiting += 1,
                PatientStatus::Called => stats.called += 1,
                PatientStatus::Treating => stats.treating += 1,
                PatientStatus::Completed => stats.completed += 1,
            }
            *stats.by_level.entry(record.triage_level.as_u8()).or_insert(0) += 1;
        }

        stats
    }
}

/// 患者队列
///
/// 进程内的显式队列状态句柄，持有按签到顺序存放的记录和签到计数。
#[derive(Debug, Default)]
pub struct PatientQueue {
    records: Vec<PatientRecord>,
    intake: CheckInIntake,
    state_machine: StatusStateMachine,
}

impl PatientQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            intake: CheckInIntake::new(),
            state_machine: StatusStateMachine::new(),
        }
    }

    /// 签到
    pub fn check_in(&mut self, input: CheckInInput) -> PatientRecord {
        self.intake.check_in(&mut self.records, input)
    }

    /// 紧急按钮签到
    pub fn emergency_check_in(&mut self) -> PatientRecord {
        self.intake.emergency_check_in(&mut self.records)
    }

    /// 按签到顺序的全部记录
    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn get(&self, id: Uuid) -> Option<&PatientRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn intake(&self) -> &CheckInIntake {
        &self.intake
    }

    pub fn sorted_view(&self) -> Vec<PatientRecord> {
        sorted_view(&self.records)
    }

    pub fn filtered_view(&self, filter: &QueueFilter) -> Vec<PatientRecord> {
        filtered_view(&self.records, filter)
    }

    /// 更新患者状态，失败时队列保持不变
    pub fn update_status(&mut self, id: Uuid, status: PatientStatus) -> Result<PatientRecord> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| TriageError::NotFound(format!("Patient {} not found", id)))?;

        let old_status = record.status;
        record.status = self.state_machine.transition(old_status, status)?;

        tracing::info!(
            "Updated patient {} (#{}) status from {} to {}",
            id,
            record.queue_number,
            old_status,
            status
        );
        Ok(record.clone())
    }

    /// 将患者推进到下一个状态
    pub fn advance_status(&mut self, id: Uuid) -> Result<PatientRecord> {
        let current = self
            .get(id)
            .ok_or_else(|| TriageError::NotFound(format!("Patient {} not found", id)))?
            .status;

        let next = self.state_machine.next_status(current).ok_or_else(|| {
            TriageError::InvalidStateTransition {
                from: current.to_string(),
                to: "none".to_string(),
            }
        })?;

        self.update_status(id, next)
    }

    pub fn waiting_count(&self) -> usize {
        waiting_count(&self.records)
    }

    pub fn critical_count(&self) -> usize {
        critical_count(&self.records)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::compute(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn record_at(sequence: u64, level: TriageLevel, at: DateTime<Utc>) -> PatientRecord {
        PatientRecord {
            id: Uuid::new_v4(),
            queue_number: triage_core::utils::format_queue_number(sequence),
            sequence,
            name: format!("Patient {}", sequence),
            check_in_time: at,
            symptoms: String::new(),
            voice_transcript: None,
            drawing_data: None,
            photo_data: None,
            triage_level: level,
            status: PatientStatus::Waiting,
            ai_summary: None,
            urgency_flag: level.is_critical(),
        }
    }

    /// 确定性的伪随机记录集
    fn generated_records(count: u64) -> Vec<PatientRecord> {
        let start = Utc::now();
        let statuses = StatusStateMachine::all_states();
        let mut seed: u64 = 0x2545_f491;

        (1..=count)
            .map(|sequence| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let level = TriageLevel::ALL[(seed >> 33) as usize % 5];
                let offset = Duration::seconds((seed % 7) as i64);
                let mut record = record_at(sequence, level, start + offset);
                record.status = statuses[(seed >> 17) as usize % statuses.len()];
                record
            })
            .collect()
    }

    #[test]
    fn test_sorted_view_orders_by_level_then_arrival() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(30);
        let t3 = t2 + Duration::seconds(30);

        let records = vec![
            record_at(1, TriageLevel::Urgent, t1),
            record_at(2, TriageLevel::Resuscitation, t2),
            record_at(3, TriageLevel::LessUrgent, t3),
        ];

        let view = sorted_view(&records);
        let order: Vec<u64> = view.iter().map(|r| r.sequence).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_sorted_view_is_stable_for_equal_keys() {
        let at = Utc::now();
        let records = vec![
            record_at(1, TriageLevel::Urgent, at),
            record_at(2, TriageLevel::Urgent, at),
            record_at(3, TriageLevel::Urgent, at),
        ];

        let mut shuffled = records.clone();
        shuffled.reverse();

        let first = sorted_view(&records);
        let second = sorted_view(&shuffled);
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sorted_view_preserves_records() {
        let records = generated_records(40);
        let view = sorted_view(&records);

        assert_eq!(view.len(), records.len());
        for record in &records {
            assert_eq!(view.iter().filter(|r| *r == record).count(), 1);
        }
        for pair in view.windows(2) {
            assert_ne!(compare_priority(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_sorted_view_empty() {
        assert!(sorted_view(&[]).is_empty());
    }

    #[test]
    fn test_update_status_changes_only_target() {
        let mut records = generated_records(10);
        records[4].status = PatientStatus::Waiting;
        let target = records[4].id;

        let updated = update_status(&records, target, PatientStatus::Called).unwrap();

        assert_eq!(updated.len(), records.len());
        for (before, after) in records.iter().zip(updated.iter()) {
            if before.id == target {
                assert_eq!(after.status, PatientStatus::Called);
                assert_eq!(
                    PatientRecord {
                        status: before.status,
                        ..after.clone()
                    },
                    *before
                );
            } else {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_update_status_unknown_id() {
        let records = generated_records(3);
        let result = update_status(&records, Uuid::new_v4(), PatientStatus::Called);
        assert!(matches!(result, Err(TriageError::NotFound(_))));
    }

    #[test]
    fn test_update_status_rejects_backward_move() {
        let mut records = generated_records(3);
        records[1].status = PatientStatus::Treating;

        let result = update_status(&records, records[1].id, PatientStatus::Waiting);
        assert!(matches!(result, Err(TriageError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_counts_match_manual_counts() {
        assert_eq!(waiting_count(&[]), 0);
        assert_eq!(critical_count(&[]), 0);

        let records = generated_records(100);
        let waiting = records.iter().filter(|r| r.status == PatientStatus::Waiting).count();
        let critical = records.iter().filter(|r| r.triage_level.as_u8() <= 2).count();

        assert_eq!(waiting_count(&records), waiting);
        assert_eq!(critical_count(&records), critical);

        let stats = QueueStats::compute(&records);
        assert_eq!(stats.total, 100);
        assert_eq!(stats.waiting, waiting);
        assert_eq!(stats.critical, critical);
        assert_eq!(
            stats.waiting + stats.called + stats.treating + stats.completed,
            stats.total
        );
        assert_eq!(stats.by_level.values().sum::<usize>(), 100);
    }

    #[test]
    fn test_filtered_view() {
        let records = generated_records(30);

        let filter = QueueFilter {
            urgent_only: true,
            ..Default::default()
        };
        let urgent = filtered_view(&records, &filter);
        assert!(urgent.iter().all(|r| r.urgency_flag));
        assert_eq!(urgent.len(), critical_count(&records));

        let filter = QueueFilter {
            statuses: Some(vec![PatientStatus::Waiting]),
            limit: Some(2),
            ..Default::default()
        };
        let waiting = filtered_view(&records, &filter);
        assert!(waiting.len() <= 2);
        assert!(waiting.iter().all(|r| r.status == PatientStatus::Waiting));
    }

    #[test]
    fn test_patient_queue_end_to_end() {
        let mut queue = PatientQueue::new();

        for level in [3, 1, 4] {
            queue.check_in(CheckInInput {
                triage_level: Some(level),
                ..Default::default()
            });
        }

        let levels: Vec<u8> = queue
            .sorted_view()
            .iter()
            .map(|r| r.triage_level.as_u8())
            .collect();
        assert_eq!(levels, vec![1, 3, 4]);

        let numbers: Vec<&str> = queue.records().iter().map(|r| r.queue_number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "102", "103"]);
        assert_eq!(queue.waiting_count(), 3);
        assert_eq!(queue.critical_count(), 1);
    }

    #[test]
    fn test_patient_queue_status_updates() {
        let mut queue = PatientQueue::new();
        let record = queue.check_in(CheckInInput::default());

        let called = queue.update_status(record.id, PatientStatus::Called).unwrap();
        assert_eq!(called.status, PatientStatus::Called);
        assert_eq!(queue.waiting_count(), 0);

        let result = queue.update_status(record.id, PatientStatus::Waiting);
        assert!(matches!(result, Err(TriageError::InvalidStateTransition { .. })));
        assert_eq!(queue.get(record.id).unwrap().status, PatientStatus::Called);

        assert_eq!(queue.advance_status(record.id).unwrap().status, PatientStatus::Treating);
        assert_eq!(queue.advance_status(record.id).unwrap().status, PatientStatus::Completed);
        assert!(queue.advance_status(record.id).is_err());

        assert!(matches!(
            queue.update_status(Uuid::new_v4(), PatientStatus::Called),
            Err(TriageError::NotFound(_))
        ));
    }

    #[test]
    fn test_independent_queues() {
        let mut first = PatientQueue::new();
        let mut second = PatientQueue::new();

        first.check_in(CheckInInput::default());
        first.check_in(CheckInInput::default());
        let record = second.check_in(CheckInInput::default());

        assert_eq!(record.queue_number, "101");
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_emergency_in_queue() {
        let mut queue = PatientQueue::new();
        queue.check_in(CheckInInput::default());
        let emergency = queue.emergency_check_in();

        assert_eq!(emergency.queue_number, "102");
        assert_eq!(queue.sorted_view()[0].id, emergency.id);
        assert_eq!(queue.critical_count(), 1);
    }
}
