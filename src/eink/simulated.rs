//! In-memory panel used when no hardware is attached.
//!
//! The simulated panel models the parts of the real controller the service relies on: a BUSY
//! line that is held for the duration of every command, the mode a command needs, and the
//! image currently on the glass. It can also write every displayed frame to a PBM file so the
//! output can be inspected on a desktop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use super::convert::{DeviceBuffer, NATIVE_HEIGHT, NATIVE_WIDTH};
use super::driver::PanelDriver;
use super::error::DriverError;
use super::refresh::RefreshKind;

/// A command as received by the simulated panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOp {
    Init(RefreshKind),
    Clear(u8),
    DisplayFull,
    DisplayPartial,
    Sleep,
    PowerDown,
}

#[derive(Default)]
struct PanelShared {
    ops: Mutex<Vec<PanelOp>>,
    busy: AtomicBool,
    fault: AtomicBool,
    overlaps: Mutex<usize>,
    glass: Mutex<Option<DeviceBuffer>>,
}

/// A [`PanelDriver`] that keeps everything in memory.
///
/// Clones share state, so a test can keep one clone to inspect what the service did with the
/// other.
#[derive(Clone, Default)]
pub struct SimulatedPanel {
    shared: Arc<PanelShared>,
    busy_time: Duration,
    snapshot: Option<PathBuf>,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the BUSY line for `busy_time` on every command.
    pub fn with_busy_time(mut self, busy_time: Duration) -> Self {
        self.busy_time = busy_time;
        self
    }

    /// Writes each displayed frame to `path` as a binary PBM image.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// Commands received so far, in order.
    pub fn ops(&self) -> Vec<PanelOp> {
        lock(&self.shared.ops).clone()
    }

    /// Number of commands that arrived while another one was still running.
    pub fn overlaps(&self) -> usize {
        *lock(&self.shared.overlaps)
    }

    /// The image currently shown.
    pub fn glass(&self) -> Option<DeviceBuffer> {
        lock(&self.shared.glass).clone()
    }

    /// Makes every following display command fail, as a disconnected panel would.
    pub fn set_fault(&self, fault: bool) {
        self.shared.fault.store(fault, Ordering::SeqCst);
    }

    fn command(&self, op: PanelOp) -> Result<(), DriverError> {
        if self.shared.busy.swap(true, Ordering::SeqCst) {
            *lock(&self.shared.overlaps) += 1;
            warn!("simulated panel received {:?} while busy", op);
            return Err(DriverError::Fault(format!("{:?} issued while panel busy", op)));
        }

        let result = self.execute(op);
        self.shared.busy.store(false, Ordering::SeqCst);
        result
    }

    fn execute(&self, op: PanelOp) -> Result<(), DriverError> {
        let display = matches!(op, PanelOp::DisplayFull | PanelOp::DisplayPartial);
        if display && self.shared.fault.load(Ordering::SeqCst) {
            return Err(DriverError::BusyTimeout(self.busy_time.as_millis() as u64));
        }

        debug!("simulated panel: {:?}", op);
        if !self.busy_time.is_zero() {
            std::thread::sleep(self.busy_time);
        }
        lock(&self.shared.ops).push(op);
        Ok(())
    }

    fn show(&self, op: PanelOp, buffer: &DeviceBuffer) -> Result<(), DriverError> {
        self.command(op)?;
        *lock(&self.shared.glass) = Some(buffer.clone());
        if let Some(path) = &self.snapshot {
            std::fs::write(path, encode_pbm(buffer))?;
        }
        Ok(())
    }
}

impl PanelDriver for SimulatedPanel {
    fn init(&mut self, kind: RefreshKind) -> Result<(), DriverError> {
        self.command(PanelOp::Init(kind))
    }

    fn clear(&mut self, fill: u8) -> Result<(), DriverError> {
        self.show(PanelOp::Clear(fill), &DeviceBuffer::filled(fill))
    }

    fn display_full(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError> {
        self.show(PanelOp::DisplayFull, buffer)
    }

    fn display_partial(&mut self, buffer: &DeviceBuffer) -> Result<(), DriverError> {
        self.show(PanelOp::DisplayPartial, buffer)
    }

    fn sleep(&mut self) -> Result<(), DriverError> {
        self.command(PanelOp::Sleep)
    }

    fn power_down(&mut self) -> Result<(), DriverError> {
        self.command(PanelOp::PowerDown)
    }
}

// A poisoned log only means a test thread panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Encodes a device buffer as a landscape P4 image (1 = black in PBM).
fn encode_pbm(buffer: &DeviceBuffer) -> Vec<u8> {
    let (width, height) = (NATIVE_HEIGHT, NATIVE_WIDTH);
    let line = width.div_ceil(8);
    let mut out = format!("P4\n{} {}\n", width, height).into_bytes();
    let header = out.len();
    out.resize(header + line * height, 0);

    for y in 0..height {
        for x in 0..width {
            if buffer.is_black(y, NATIVE_HEIGHT - x - 1) == Some(true) {
                out[header + y * line + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_are_shared_between_clones() {
        let panel = SimulatedPanel::new();
        let mut driver = panel.clone();
        driver.init(RefreshKind::Full).unwrap();
        driver.sleep().unwrap();
        assert_eq!(panel.ops(), vec![PanelOp::Init(RefreshKind::Full), PanelOp::Sleep]);
    }

    #[test]
    fn test_fault_only_affects_display() {
        let panel = SimulatedPanel::new();
        let mut driver = panel.clone();
        panel.set_fault(true);
        assert!(driver.init(RefreshKind::Partial).is_ok());
        assert!(driver.display_partial(&DeviceBuffer::filled(0xFF)).is_err());
        assert_eq!(panel.ops(), vec![PanelOp::Init(RefreshKind::Partial)]);
        assert!(panel.glass().is_none());
    }

    #[test]
    fn test_concurrent_commands_are_detected() {
        let panel = SimulatedPanel::new().with_busy_time(Duration::from_millis(200));
        let mut first = panel.clone();
        let mut second = panel.clone();

        let handle = std::thread::spawn(move || first.sleep());
        std::thread::sleep(Duration::from_millis(50));
        assert!(second.init(RefreshKind::Full).is_err());
        assert!(handle.join().unwrap().is_ok());
        assert_eq!(panel.overlaps(), 1);
    }

    #[test]
    fn test_pbm_snapshot() {
        let buffer = DeviceBuffer::filled(0x00);
        let pbm = encode_pbm(&buffer);
        let header = b"P4\n250 122\n";
        assert!(pbm.starts_with(header));
        assert_eq!(pbm.len(), header.len() + 32 * 122);
        // every visible pixel is black, row padding stays clear
        assert_eq!(pbm[header.len()], 0xFF);
        assert_eq!(pbm[header.len() + 31], 0xC0);
    }
}
