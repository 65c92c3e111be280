//! 患者状态机
//!
//! 管理排队患者状态的单向推进

use std::collections::HashSet;
use triage_core::{PatientStatus, Result, TriageError};

/// 患者状态机
#[derive(Debug)]
pub struct StatusStateMachine {
    transitions: HashSet<(PatientStatus, PatientStatus)>,
}

impl StatusStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashSet::new();

        // 任何向前的跳转都允许，例如候诊患者直接完成
        let states = Self::all_states();
        for from in &states {
            for to in &states {
                if to.rank() > from.rank() {
                    transitions.insert((*from, *to));
                }
            }
        }

        Self { transitions }
    }

    /// 检查状态转换是否有效，相同状态视为有效
    pub fn can_transition(&self, from: PatientStatus, to: PatientStatus) -> bool {
        from == to || self.transitions.contains(&(from, to))
    }

    /// 执行状态转换
    pub fn transition(&self, from: PatientStatus, to: PatientStatus) -> Result<PatientStatus> {
        if self.can_transition(from, to) {
            Ok(to)
        } else {
            Err(TriageError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// 下一个状态，已完成时返回 None
    pub fn next_status(&self, current: PatientStatus) -> Option<PatientStatus> {
        Self::all_states()
            .into_iter()
            .find(|state| state.rank() == current.rank() + 1)
    }

    /// 获取所有可能的状态
    pub fn all_states() -> Vec<PatientStatus> {
        vec![
            PatientStatus::Waiting,
            PatientStatus::Called,
            PatientStatus::Treating,
            PatientStatus::Completed,
        ]
    }

    /// 获取状态的所有可达状态
    pub fn reachable_from(&self, current: PatientStatus) -> Vec<PatientStatus> {
        let mut states: Vec<PatientStatus> = self
            .transitions
            .iter()
            .filter(|(from, _)| *from == current)
            .map(|(_, to)| *to)
            .collect();
        states.sort_by_key(|state| state.rank());
        states
    }
}

impl Default for StatusStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
