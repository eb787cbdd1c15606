//! 排队状态机
//!
//! 管理当日排队条目的状态转换：
//! `waiting → in_progress → completed`，或 `waiting → skipped`。

use clinic_core::{ClinicError, QueueStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 排队状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueEvent {
    /// 叫号
    Call,
    /// 就诊完成
    Complete,
    /// 过号
    Skip,
}

impl QueueEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEvent::Call => "call",
            QueueEvent::Complete => "complete",
            QueueEvent::Skip => "skip",
        }
    }
}

/// 排队状态机
#[derive(Debug)]
pub struct QueueStateMachine {
    transitions: HashMap<(QueueStatus, QueueEvent), QueueStatus>,
}

impl QueueStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((QueueStatus::Waiting, QueueEvent::Call), QueueStatus::InProgress);
        transitions.insert((QueueStatus::InProgress, QueueEvent::Complete), QueueStatus::Completed);
        transitions.insert((QueueStatus::Waiting, QueueEvent::Skip), QueueStatus::Skipped);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: QueueStatus, event: QueueEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: QueueStatus, event: QueueEvent) -> Result<QueueStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidStateTransition {
                from: from.as_str().to_string(),
                event: event.as_str().to_string(),
            }),
        }
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: QueueStatus) -> Vec<QueueEvent> {
        let mut events: Vec<QueueEvent> = self
            .transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect();
        events.sort_by_key(|event| event.as_str());
        events
    }
}

impl Default for QueueStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = QueueStateMachine::new();

        assert!(sm.can_transition(QueueStatus::Waiting, QueueEvent::Call));
        assert!(sm.can_transition(QueueStatus::InProgress, QueueEvent::Complete));
        assert!(sm.can_transition(QueueStatus::Waiting, QueueEvent::Skip));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = QueueStateMachine::new();

        // complete 只允许从 in_progress 出发
        assert!(!sm.can_transition(QueueStatus::Waiting, QueueEvent::Complete));
        assert!(!sm.can_transition(QueueStatus::InProgress, QueueEvent::Call));
        assert!(!sm.can_transition(QueueStatus::InProgress, QueueEvent::Skip));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let sm = QueueStateMachine::new();

        for status in [QueueStatus::Completed, QueueStatus::Skipped] {
            assert!(sm.get_possible_events(status).is_empty());
            for event in [QueueEvent::Call, QueueEvent::Complete, QueueEvent::Skip] {
                assert!(sm.transition(status, event).is_err());
            }
        }
    }

    #[test]
    fn test_state_execution() {
        let sm = QueueStateMachine::new();

        let result = sm.transition(QueueStatus::Waiting, QueueEvent::Call);
        assert_eq!(result.unwrap(), QueueStatus::InProgress);

        match sm.transition(QueueStatus::Waiting, QueueEvent::Complete) {
            Err(ClinicError::InvalidStateTransition { from, event }) => {
                assert_eq!(from, "waiting");
                assert_eq!(event, "complete");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert_eq!(
            sm.get_possible_events(QueueStatus::Waiting),
            vec![QueueEvent::Call, QueueEvent::Skip]
        );
    }
}
