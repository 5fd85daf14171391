//! Idle monitor.
//!
//! Runs next to the rendering service and applies the panel maker's precautions:
//!
//! - a panel should not stay powered while nothing is displayed, so after a minute without a
//!   refresh it goes into deep sleep;
//! - a panel must be refreshed at least once every 24 hours, so a panel that slept that long
//!   gets its last frame redrawn with a full refresh before going back to sleep.

use std::time::Duration;

use log::{debug, error, info};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::DisplayMode;
use super::error::ServiceError;
use super::guard::HardwareGuard;

/// Timing constants of the idle monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    /// Time between two checks
    pub tick: Duration,
    /// Idle time after which an awake panel is put to sleep
    pub idle_before_sleep: Duration,
    /// Idle time after which a sleeping panel must be refreshed
    pub max_idle: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            idle_before_sleep: Duration::from_secs(60),
            max_idle: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What a tick does to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    Nothing,
    EnterSleep,
    ForceFullRefresh,
}

impl IdleAction {
    /// Picks the action for a panel in `mode` that was last refreshed `elapsed` ago.
    pub fn decide(mode: DisplayMode, elapsed: Duration, timing: &SchedulerTiming) -> Self {
        if elapsed < timing.idle_before_sleep {
            // refreshed recently, don't bounce in and out of sleep
            return IdleAction::Nothing;
        }
        match mode {
            DisplayMode::DeepSleep if elapsed > timing.max_idle => IdleAction::ForceFullRefresh,
            DisplayMode::DeepSleep => IdleAction::Nothing,
            DisplayMode::PartialUpdate | DisplayMode::FullUpdate => IdleAction::EnterSleep,
        }
    }
}

/// Periodic task driving the panel into deep sleep.
pub struct IdleScheduler {
    guard: HardwareGuard,
    timing: SchedulerTiming,
    token: CancellationToken,
}

impl IdleScheduler {
    pub fn new(guard: HardwareGuard, timing: SchedulerTiming, token: CancellationToken) -> Self {
        Self {
            guard,
            timing,
            token,
        }
    }

    /// Ticks until the token is cancelled.
    ///
    /// The wait between two ticks holds nothing, and cancellation is observed during that wait.
    /// A hardware fault ends the loop: the monitor does not keep poking a failed panel.
    pub async fn run(self) -> Result<(), ServiceError> {
        let mut ticker = interval_at(Instant::now() + self.timing.tick, self.timing.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("eInk idle monitor started (tick {:?})", self.timing.tick);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    info!("eInk idle monitor received shutdown signal");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick().await {
                error!("eInk idle monitor stopped after hardware fault: {}", e);
                return Err(e);
            }
        }
    }

    /// Runs one check and returns what it did.
    pub async fn tick(&self) -> Result<IdleAction, ServiceError> {
        let now = Instant::now();
        let timing = self.timing;

        let (mode, last_refresh) = self
            .guard
            .inspect(|ctl| (ctl.mode(), ctl.refresh_state().last_refresh()))
            .await;
        if IdleAction::decide(mode, now.saturating_duration_since(last_refresh), &timing)
            == IdleAction::Nothing
        {
            return Ok(IdleAction::Nothing);
        }

        self.apply(now).await
    }

    /// Decides again under the guard and acts. A render may have landed since `now`.
    async fn apply(&self, now: Instant) -> Result<IdleAction, ServiceError> {
        let timing = self.timing;
        self.guard
            .run(move |ctl| {
                let elapsed = now.saturating_duration_since(ctl.refresh_state().last_refresh());
                let action = IdleAction::decide(ctl.mode(), elapsed, &timing);
                match action {
                    IdleAction::Nothing => {}
                    IdleAction::EnterSleep => {
                        debug!("last frame has been displayed {:?} ago, entering deep sleep", elapsed);
                        ctl.sleep()?;
                    }
                    IdleAction::ForceFullRefresh => {
                        debug!("last frame has been displayed {:?} ago, screen update required", elapsed);
                        ctl.display_full()?;
                        ctl.sleep()?;
                    }
                }
                Ok(action)
            })
            .await
    }
}
