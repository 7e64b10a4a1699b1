//! Worker configuration and lifecycle state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

/// Settings applied to every game worker a registry spawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Time between progression steps. Zero means event-driven: the worker
    /// only reacts to notifications and never calls `GameRules::step`.
    pub step_interval: Duration,

    /// Capacity of the notification queue into each worker. When it is
    /// full, further notifications are dropped instead of waiting.
    pub command_capacity: usize,

    /// Upper bound of a random delay added before the first step, so
    /// workers created in the same instant do not step in lock-step.
    pub initial_jitter: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::ZERO,
            command_capacity: 64,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl WorkerConfig {
    /// A config stepping every `step_interval`, other fields defaulted.
    pub fn stepping_every(step_interval: Duration) -> Self {
        Self {
            step_interval,
            ..Self::default()
        }
    }

    /// The step period, or `None` in event-driven mode.
    pub fn step_period(&self) -> Option<Duration> {
        (!self.step_interval.is_zero()).then_some(self.step_interval)
    }
}

// ---------------------------------------------------------------------------
// WorkerState
// ---------------------------------------------------------------------------

/// The lifecycle state of a game worker.
///
/// ```text
/// Created → Running → Stopping → Stopped
/// ```
///
/// A worker told to stop before its task was first polled goes straight
/// from Created to Stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Spawned, task not yet running.
    Created,
    /// Task loop is executing and accepting notifications.
    Running,
    /// Stop has been signalled; the loop exits at its next wake-up.
    Stopping,
    /// The task has exited.
    Stopped,
}

impl WorkerState {
    /// `true` while the worker accepts notifications.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }

    /// `true` once a stop has been signalled.
    pub fn is_stopping(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Running)
                | (Self::Created, Self::Stopping)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_transitions_follow_lifecycle() {
        use WorkerState::*;
        assert!(Created.can_transition_to(Running));
        assert!(Created.can_transition_to(Stopping));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));

        assert!(!Running.can_transition_to(Created));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Running.can_transition_to(Stopped));
    }

    #[test]
    fn test_worker_state_liveness() {
        assert!(WorkerState::Created.is_live());
        assert!(WorkerState::Running.is_live());
        assert!(!WorkerState::Stopping.is_live());
        assert!(!WorkerState::Stopped.is_live());
        assert!(WorkerState::Stopping.is_stopping());
        assert!(!WorkerState::Running.is_stopping());
    }

    #[test]
    fn test_default_config_is_event_driven() {
        let config = WorkerConfig::default();
        assert_eq!(config.step_period(), None);
        assert_eq!(config.command_capacity, 64);
    }

    #[test]
    fn test_stepping_every_sets_period() {
        let config = WorkerConfig::stepping_every(Duration::from_secs(3));
        assert_eq!(config.step_period(), Some(Duration::from_secs(3)));
    }
}
