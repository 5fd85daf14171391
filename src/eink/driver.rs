//! Panel driver capability.

use super::convert::DeviceBuffer;
use super::error::DriverError;
use super::refresh::RefreshKind;

/// Abstracts the SPI/GPIO sequences of the physical panel.
///
/// Every method blocks until the panel reports idle. Callers never invoke a driver directly:
/// it is owned by the [`DisplayModeController`](super::DisplayModeController), which is only
/// reachable through the hardware guard.
pub trait PanelDriver: Send + 'static {
    /// Initialise the panel for the given refresh kind (loads the matching waveform LUT).
    fn init(&mut self, kind: RefreshKind) -> Result<(), DriverError>;

    /// Fill the whole panel with a single byte and refresh it.
    fn clear(&mut self, fill: u8) -> Result<(), DriverError>;

    /// Write a buffer to both RAM banks and run a full refresh.
    fn display_full(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError>;

    /// Write a buffer and run a partial refresh against the previous frame.
    fn display_partial(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError>;

    /// Enter deep sleep. Leaving it requires a new `init`.
    fn sleep(&mut self) -> Result<(), DriverError>;

    /// Release the SPI bus and GPIO lines and cut panel power.
    fn power_down(&mut self) -> Result<(), DriverError>;
}

impl<D: PanelDriver + ?Sized> PanelDriver for Box<D> {
    fn init(&mut self, kind: RefreshKind) -> Result<(), DriverError> {
        (**self).init(kind)
    }

    fn clear(&mut self, fill: u8) -> Result<(), DriverError> {
        (**self).clear(fill)
    }

    fn display_full(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError> {
        (**self).display_full(buffer)
    }

    fn display_partial(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError> {
        (**self).display_partial(buffer)
    }

    fn sleep(&mut self) -> Result<(), DriverError> {
        (**self).sleep()
    }

    fn power_down(&mut self) -> Result<(), DriverError> {
        (**self).power_down()
    }
}
