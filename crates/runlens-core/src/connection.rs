use std::time::Duration;

/// Result of one console health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthProbe {
    Healthy,
    Refused,
    /// Any other failure (timeout, bad response). Does not move the monitor.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
    /// Was connected (or never connected) and got refused.
    Lost { retry_in: Duration },
    /// Still refused; interval grew or sits at the ceiling.
    Retrying { retry_in: Duration },
    Restored,
    Unchanged,
}

/// Liveness tracking for the console's own health poll, with doubling
/// backoff on refusal. Independent of any per-run poll state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMonitor {
    base: Duration,
    ceiling: Duration,
    interval: Duration,
    connected: bool,
    refusals: u32,
}

impl ConnectionMonitor {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            interval: base,
            connected: false,
            refusals: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Delay until the next health probe.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn refusals(&self) -> u32 {
        self.refusals
    }

    pub fn record(&mut self, probe: HealthProbe) -> ConnectionTransition {
        match probe {
            HealthProbe::Refused => {
                self.interval = self.interval.saturating_mul(2).min(self.ceiling);
                self.refusals = self.refusals.saturating_add(1);
                let retry_in = self.interval;
                if std::mem::replace(&mut self.connected, false) || self.refusals == 1 {
                    ConnectionTransition::Lost { retry_in }
                } else {
                    ConnectionTransition::Retrying { retry_in }
                }
            }
            HealthProbe::Healthy => {
                self.refusals = 0;
                if self.connected {
                    return ConnectionTransition::Unchanged;
                }
                self.connected = true;
                self.interval = self.base;
                ConnectionTransition::Restored
            }
            HealthProbe::Failed => ConnectionTransition::Unchanged,
        }
    }
}
