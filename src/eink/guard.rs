//! Mutual exclusion around the panel.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::controller::DisplayModeController;
use super::error::ServiceError;

/// The single lock in front of the [`DisplayModeController`].
///
/// The controller is owned by the lock, so there is no way to reach the driver without holding
/// it. Rendering requests and the idle scheduler share clones of the same guard.
#[derive(Clone)]
pub struct HardwareGuard {
    controller: Arc<Mutex<DisplayModeController>>,
}

impl HardwareGuard {
    pub fn new(controller: DisplayModeController) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Runs a hardware operation while holding the guard.
    ///
    /// Driver calls block until the panel is idle, so the operation runs on the blocking pool.
    /// The guard moves with it: dropping the returned future does not release the panel until
    /// the operation has finished.
    pub async fn run<F, T>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut DisplayModeController) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let mut controller = self.controller.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || op(&mut controller))
            .await
            .map_err(|e| ServiceError::Worker(e.to_string()))?
    }

    /// Reads controller state without touching the hardware.
    pub async fn inspect<F, T>(&self, read: F) -> T
    where
        F: FnOnce(&DisplayModeController) -> T,
    {
        let controller = self.controller.lock().await;
        read(&controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eink::controller::DisplayMode;
    use crate::eink::convert::DeviceBuffer;
    use crate::eink::simulated::SimulatedPanel;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_operations_never_overlap() {
        let panel = SimulatedPanel::new().with_busy_time(Duration::from_millis(5));
        let guard = HardwareGuard::new(DisplayModeController::new(panel.clone(), 15));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    guard.run(|ctl| ctl.sleep()).await
                } else {
                    guard
                        .run(|ctl| ctl.render(DeviceBuffer::filled(0x00)).map(|_| ()))
                        .await
                }
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(panel.overlaps(), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_keeps_guard_until_done() {
        let panel = SimulatedPanel::new().with_busy_time(Duration::from_millis(100));
        let guard = HardwareGuard::new(DisplayModeController::new(panel.clone(), 15));

        let pending = guard.run(|ctl| ctl.enter(DisplayMode::PartialUpdate));
        // start the operation, then abandon it
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;

        let mode = guard.inspect(|ctl| ctl.mode()).await;
        assert_eq!(mode, DisplayMode::PartialUpdate);
        assert_eq!(panel.overlaps(), 0);
    }
}
