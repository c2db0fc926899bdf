//! Readiness state machine for the document engine of one tab.
//!
//! `Unknown -> Probing -> Ready`, or `Probing -> Injecting -> Probing ...`
//! until the attempt budget runs out and the state settles on `Failed`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectionStatus {
    #[default]
    Unknown,
    Probing,
    Injecting,
    Ready,
    Failed,
}

/// What the caller should do after a probe found no receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Inject the engine, wait for it to settle and probe again.
    Inject { attempt: u32 },
    /// The attempt budget is spent; the state is now `Failed`.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InjectionState {
    status: InjectionStatus,
    retry_count: u32,
}

impl InjectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> InjectionStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_ready(&self) -> bool {
        self.status == InjectionStatus::Ready
    }

    pub fn begin_probe(&mut self) {
        self.status = InjectionStatus::Probing;
    }

    pub fn mark_ready(&mut self) {
        self.status = InjectionStatus::Ready;
        self.retry_count = 0;
    }

    pub fn probe_failed(&mut self, max_attempts: u32) -> ProbeVerdict {
        if self.retry_count >= max_attempts {
            self.status = InjectionStatus::Failed;
            return ProbeVerdict::Exhausted {
                attempts: self.retry_count,
            };
        }
        self.retry_count += 1;
        self.status = InjectionStatus::Injecting;
        ProbeVerdict::Inject {
            attempt: self.retry_count,
        }
    }

    pub fn mark_failed(&mut self) {
        self.status = InjectionStatus::Failed;
    }

    /// Forget everything known about the engine, e.g. after a send failed
    /// because the page navigated away.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
