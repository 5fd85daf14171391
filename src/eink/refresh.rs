//! Refresh counting policy.
//!
//! Partial refreshes are fast but leave ghosting behind, so the panel gets a full refresh at
//! least once every `REFRESH_BUDGET + 1` accepted frames, and always when waking from deep
//! sleep.

use tokio::time::Instant;

use super::controller::DisplayMode;

/// Partial refreshes allowed between two full refreshes.
pub const REFRESH_BUDGET: i32 = 15;

/// Kind of refresh chosen for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    Full,
    Partial,
}

/// Refresh bookkeeping shared by the rendering path and the idle scheduler.
#[derive(Debug, Clone)]
pub struct RefreshState {
    /// Partial refreshes left before a full refresh is due
    frames_before_full_refresh: i32,
    /// When the panel last completed a refresh of any kind
    last_refresh: Instant,
    budget: i32,
}

impl RefreshState {
    pub fn new(budget: i32) -> Self {
        Self {
            frames_before_full_refresh: 0,
            last_refresh: Instant::now(),
            budget,
        }
    }

    /// Accounts for one accepted frame and picks its refresh kind.
    ///
    /// A partial refresh from a powered-down panel is unreliable, so deep sleep always forces
    /// a full refresh.
    pub fn on_request(&mut self, mode: DisplayMode) -> RefreshKind {
        self.frames_before_full_refresh -= 1;
        if self.frames_before_full_refresh < 0 || mode == DisplayMode::DeepSleep {
            self.frames_before_full_refresh = self.budget;
            RefreshKind::Full
        } else {
            RefreshKind::Partial
        }
    }

    pub fn frames_before_full_refresh(&self) -> i32 {
        self.frames_before_full_refresh
    }

    pub fn last_refresh(&self) -> Instant {
        self.last_refresh
    }

    /// Records a completed refresh.
    pub fn mark_refreshed(&mut self) {
        self.last_refresh = Instant::now();
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new(REFRESH_BUDGET)
    }
}
