//! Display mode state machine.
//!
//! The panel is always in exactly one of three modes. Every transition goes through the
//! driver, and a mode is only recorded once the driver call succeeded, so a hardware fault
//! leaves the controller describing what the panel actually did.

use log::{debug, info};

use super::convert::DeviceBuffer;
use super::driver::PanelDriver;
use super::error::ServiceError;
use super::refresh::{RefreshKind, RefreshState};

/// Panel modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Low-power state; needs a full refresh to display again
    DeepSleep,
    /// Initialised with the partial update waveform
    PartialUpdate,
    /// Initialised with the full update waveform
    FullUpdate,
}

/// Owns the panel driver together with the panel's mode and refresh bookkeeping.
///
/// The controller has no locking of its own. It lives inside the
/// [`HardwareGuard`](super::HardwareGuard), which is what serialises callers.
pub struct DisplayModeController {
    driver: Box<dyn PanelDriver>,
    mode: DisplayMode,
    refresh: RefreshState,
    last_frame: DeviceBuffer,
    powered_down: bool,
}

impl DisplayModeController {
    /// Creates a controller for a panel assumed to be asleep, with a fresh refresh counter.
    pub fn new(driver: impl PanelDriver, budget: i32) -> Self {
        Self {
            driver: Box::new(driver),
            mode: DisplayMode::DeepSleep,
            refresh: RefreshState::new(budget),
            last_frame: DeviceBuffer::filled(0xFF),
            powered_down: false,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn refresh_state(&self) -> &RefreshState {
        &self.refresh
    }

    pub fn last_frame(&self) -> &DeviceBuffer {
        &self.last_frame
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// Wakes the panel at service start: full update mode, cleared to white.
    pub fn power_on(&mut self) -> Result<(), ServiceError> {
        self.enter(DisplayMode::FullUpdate)?;
        self.driver.clear(0xFF)?;
        self.last_frame = DeviceBuffer::filled(0xFF);
        self.refresh.mark_refreshed();
        info!("eInk screen initialised and cleared");
        Ok(())
    }

    /// Switches the panel to `mode`. Does nothing if the panel is already there.
    pub fn enter(&mut self, mode: DisplayMode) -> Result<(), ServiceError> {
        self.ensure_powered()?;
        if self.mode == mode {
            return Ok(());
        }

        match mode {
            DisplayMode::DeepSleep => {
                debug!("eInk screen entering in deep sleep mode (low consumption)");
                self.driver.sleep()?;
            }
            DisplayMode::PartialUpdate => {
                debug!("eInk screen entering in partial update mode");
                self.driver.init(RefreshKind::Partial)?;
            }
            DisplayMode::FullUpdate => {
                debug!("eInk screen entering in full update mode");
                self.driver.init(RefreshKind::Full)?;
            }
        }

        self.mode = mode;
        Ok(())
    }

    /// Stores `buffer` as the last frame and shows it with the refresh kind the counting
    /// policy picks.
    pub fn render(&mut self, buffer: DeviceBuffer) -> Result<RefreshKind, ServiceError> {
        self.ensure_powered()?;
        self.last_frame = buffer;

        let kind = self.refresh.on_request(self.mode);
        match kind {
            RefreshKind::Full => self.display_full()?,
            RefreshKind::Partial => self.display_partial()?,
        }
        Ok(kind)
    }

    /// Shows the last frame with a full refresh.
    pub fn display_full(&mut self) -> Result<(), ServiceError> {
        self.enter(DisplayMode::FullUpdate)?;
        self.driver.display_full(&self.last_frame)?;
        self.refresh.mark_refreshed();
        Ok(())
    }

    /// Shows the last frame with a partial refresh.
    pub fn display_partial(&mut self) -> Result<(), ServiceError> {
        self.enter(DisplayMode::PartialUpdate)?;
        self.driver.display_partial(&self.last_frame)?;
        self.refresh.mark_refreshed();
        Ok(())
    }

    pub fn sleep(&mut self) -> Result<(), ServiceError> {
        self.enter(DisplayMode::DeepSleep)
    }

    /// Puts the panel to sleep and cuts its power. Any later hardware call is refused.
    pub fn power_down(&mut self) -> Result<(), ServiceError> {
        if self.powered_down {
            return Ok(());
        }
        self.sleep()?;
        self.driver.power_down()?;
        self.powered_down = true;
        info!("eInk screen powered down");
        Ok(())
    }

    fn ensure_powered(&self) -> Result<(), ServiceError> {
        if self.powered_down {
            return Err(ServiceError::PoweredDown);
        }
        Ok(())
    }
}
