//! Rendering entry point and service lifecycle.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::controller::DisplayModeController;
use super::convert::to_device_buffer;
use super::driver::PanelDriver;
use super::error::ServiceError;
use super::frame::{self, Frame, PixelFormat};
use super::guard::HardwareGuard;
use super::refresh::{RefreshKind, REFRESH_BUDGET};
use super::scheduler::{IdleScheduler, SchedulerTiming};

/// Tunables of the rendering service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Partial refreshes allowed between two full refreshes
    pub refresh_budget: i32,
    pub timing: SchedulerTiming,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            refresh_budget: REFRESH_BUDGET,
            timing: SchedulerTiming::default(),
        }
    }
}

/// A `DisplayRendering` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingRequest {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Outcome reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingStatus {
    Ok,
    DimensionNotAllowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderingResponse {
    pub status: RenderingStatus,
    pub details: String,
}

impl RenderingResponse {
    pub fn ok() -> Self {
        Self {
            status: RenderingStatus::Ok,
            details: String::new(),
        }
    }
}

/// The rendering service: hardware guard, idle monitor and lifecycle.
pub struct DisplayService {
    guard: HardwareGuard,
    timing: SchedulerTiming,
    token: CancellationToken,
    tracker: TaskTracker,
    /// Fault that stopped the idle monitor
    fault: Arc<Mutex<Option<ServiceError>>>,
}

impl DisplayService {
    /// Takes ownership of the panel and wakes it.
    ///
    /// A panel that cannot be initialised is fatal: the service is not created.
    pub async fn new(driver: impl PanelDriver, config: ServiceConfig) -> Result<Self, ServiceError> {
        let guard = HardwareGuard::new(DisplayModeController::new(driver, config.refresh_budget));
        guard.run(|ctl| ctl.power_on()).await?;

        Ok(Self {
            guard,
            timing: config.timing,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            fault: Arc::new(Mutex::new(None)),
        })
    }

    /// Starts the idle monitor.
    ///
    /// A hardware fault in the monitor requests shutdown and is returned by
    /// [`wait_for_termination`](Self::wait_for_termination).
    pub fn start(&self) {
        let scheduler = IdleScheduler::new(self.guard.clone(), self.timing, self.token.child_token());
        let token = self.token.clone();
        let fault = self.fault.clone();
        self.tracker.spawn(async move {
            if let Err(e) = scheduler.run().await {
                *fault.lock().await = Some(e);
                token.cancel();
            }
        });
    }

    pub fn guard(&self) -> &HardwareGuard {
        &self.guard
    }

    /// Token cancelled by [`pre_stop`](Self::pre_stop).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Displays the frame carried by `request`.
    ///
    /// Frames of the wrong size are answered with `DimensionNotAllowed` before anything else
    /// happens. A hardware fault is returned as an error, never as an `Ok` status.
    pub async fn display_rendering(
        &self,
        request: RenderingRequest,
    ) -> Result<RenderingResponse, ServiceError> {
        if let Err(e) = frame::validate(request.width, request.height) {
            debug!("rejecting frame: {}", e);
            return Ok(RenderingResponse {
                status: RenderingStatus::DimensionNotAllowed,
                details: e.to_string(),
            });
        }

        let frame = Frame::new(request.pixel_format, request.width, request.height, request.data);
        let buffer = to_device_buffer(&frame)?;

        let kind = self.guard.run(move |ctl| ctl.render(buffer)).await.map_err(|e| {
            if !matches!(e, ServiceError::PoweredDown) {
                error!("failed to display frame: {}", e);
            }
            e
        })?;
        match kind {
            RefreshKind::Full => debug!("frame displayed with a full refresh"),
            RefreshKind::Partial => debug!("frame displayed with a partial refresh"),
        }

        Ok(RenderingResponse::ok())
    }

    /// Resolves once shutdown was requested and the idle monitor has stopped.
    ///
    /// Returns the fault that stopped the idle monitor, if any. The panel still needs
    /// [`stop`](Self::stop) either way.
    pub async fn wait_for_termination(&self) -> Result<(), ServiceError> {
        self.token.cancelled().await;
        self.tracker.close();
        self.tracker.wait().await;
        match self.fault.lock().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Requests shutdown. Safe to call from a signal handler task, and more than once.
    pub fn pre_stop(&self) {
        self.token.cancel();
    }

    /// Puts the panel to sleep, leaves `grace` for in-flight requests, then powers it down.
    ///
    /// Does nothing once the panel is powered down.
    pub async fn stop(&self, grace: Duration) -> Result<(), ServiceError> {
        self.pre_stop();

        let asleep = self
            .guard
            .run(|ctl| {
                if ctl.is_powered_down() {
                    return Ok(false);
                }
                ctl.sleep().map(|_| true)
            })
            .await?;
        if !asleep {
            return Ok(());
        }

        info!("stopping eInk display service (grace {:?})", grace);
        tokio::time::sleep(grace).await;
        self.guard.run(|ctl| ctl.power_down()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eink::controller::DisplayMode;
    use crate::eink::frame::{PANEL_HEIGHT, PANEL_WIDTH};
    use crate::eink::simulated::{PanelOp, SimulatedPanel};

    fn request(width: u32, height: u32) -> RenderingRequest {
        RenderingRequest {
            pixel_format: PixelFormat::Luma,
            width,
            height,
            data: vec![0x00; PixelFormat::Luma.buffer_size(width, height)],
        }
    }

    async fn service() -> (DisplayService, SimulatedPanel) {
        let panel = SimulatedPanel::new();
        let service = DisplayService::new(panel.clone(), ServiceConfig::default())
            .await
            .unwrap();
        (service, panel)
    }

    async fn state(service: &DisplayService) -> (DisplayMode, i32) {
        service
            .guard()
            .inspect(|ctl| (ctl.mode(), ctl.refresh_state().frames_before_full_refresh()))
            .await
    }

    #[tokio::test]
    async fn test_valid_frame_full_refresh() {
        let (service, panel) = service().await;

        let response = service.display_rendering(request(250, 122)).await.unwrap();
        assert_eq!(response, RenderingResponse::ok());
        assert_eq!(state(&service).await, (DisplayMode::FullUpdate, 15));
        assert_eq!(panel.ops().last(), Some(&PanelOp::DisplayFull));
        let glass = panel.glass().unwrap();
        assert_eq!(glass.is_black(0, 0), Some(true));
        assert_eq!(glass.is_black(121, 249), Some(true));
    }

    #[tokio::test]
    async fn test_wrong_dimension_touches_nothing() {
        let (service, panel) = service().await;
        let ops = panel.ops();
        let before = state(&service).await;

        let response = service.display_rendering(request(100, 50)).await.unwrap();
        assert_eq!(response.status, RenderingStatus::DimensionNotAllowed);
        assert!(!response.details.is_empty());
        assert_eq!(panel.ops(), ops);
        assert_eq!(state(&service).await, before);
    }

    #[tokio::test]
    async fn test_short_data_is_invalid_frame() {
        let (service, panel) = service().await;
        let ops = panel.ops();

        let mut bad = request(PANEL_WIDTH, PANEL_HEIGHT);
        bad.data.truncate(10);
        let err = service.display_rendering(bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidFrame(_)));
        assert_eq!(panel.ops(), ops);
        assert_eq!(state(&service).await.1, 0);
    }

    #[tokio::test]
    async fn test_full_refresh_every_sixteen_frames() {
        let (service, panel) = service().await;
        service.display_rendering(request(250, 122)).await.unwrap();

        for expected in (0..15).rev() {
            service.display_rendering(request(250, 122)).await.unwrap();
            assert_eq!(state(&service).await, (DisplayMode::PartialUpdate, expected));
        }

        service.display_rendering(request(250, 122)).await.unwrap();
        assert_eq!(state(&service).await, (DisplayMode::FullUpdate, 15));

        let ops = panel.ops();
        let full = ops.iter().filter(|op| **op == PanelOp::DisplayFull).count();
        let partial = ops.iter().filter(|op| **op == PanelOp::DisplayPartial).count();
        assert_eq!((full, partial), (2, 15));
    }

    #[tokio::test]
    async fn test_driver_fault_is_an_error() {
        let (service, panel) = service().await;
        panel.set_fault(true);

        let err = service.display_rendering(request(250, 122)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Driver(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sequence() {
        let (service, panel) = service().await;
        service.start();
        service.display_rendering(request(250, 122)).await.unwrap();

        service.stop(Duration::from_secs(5)).await.unwrap();
        service.wait_for_termination().await.unwrap();

        let ops = panel.ops();
        assert_eq!(&ops[ops.len() - 2..], &[PanelOp::Sleep, PanelOp::PowerDown]);
        assert!(matches!(
            service.display_rendering(request(250, 122)).await,
            Err(ServiceError::PoweredDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_partial_panel_falls_asleep() {
        let (service, _panel) = service().await;
        service.start();
        service.display_rendering(request(250, 122)).await.unwrap();
        service.display_rendering(request(250, 122)).await.unwrap();
        assert_eq!(state(&service).await.0, DisplayMode::PartialUpdate);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(state(&service).await.0, DisplayMode::DeepSleep);

        service.pre_stop();
        service.wait_for_termination().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_monitor_fault_ends_service() {
        let panel = SimulatedPanel::new();
        let config = ServiceConfig {
            timing: SchedulerTiming {
                max_idle: Duration::from_secs(600),
                ..SchedulerTiming::default()
            },
            ..ServiceConfig::default()
        };
        let service = DisplayService::new(panel.clone(), config).await.unwrap();
        service.start();
        service.display_rendering(request(250, 122)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(state(&service).await.0, DisplayMode::DeepSleep);

        // the forced refresh fails
        panel.set_fault(true);
        let err = service.wait_for_termination().await.unwrap_err();
        assert!(matches!(err, ServiceError::Driver(_)));
        assert!(service.shutdown_token().is_cancelled());

        panel.set_fault(false);
        service.stop(Duration::from_secs(1)).await.unwrap();
        let ops = panel.ops();
        assert_eq!(&ops[ops.len() - 2..], &[PanelOp::Sleep, PanelOp::PowerDown]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice() {
        let (service, panel) = service().await;
        service.stop(Duration::from_secs(1)).await.unwrap();
        let ops = panel.ops();

        service.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(panel.ops(), ops);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_idle_ticks_and_renders_never_overlap() {
        let panel = SimulatedPanel::new().with_busy_time(Duration::from_millis(2));
        let timing = SchedulerTiming {
            tick: Duration::from_millis(1),
            idle_before_sleep: Duration::from_millis(1),
            ..SchedulerTiming::default()
        };
        let config = ServiceConfig {
            timing,
            ..ServiceConfig::default()
        };
        let service = Arc::new(DisplayService::new(panel.clone(), config).await.unwrap());
        let scheduler =
            IdleScheduler::new(service.guard().clone(), timing, CancellationToken::new());

        let mut renders = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            renders.push(tokio::spawn(async move {
                for _ in 0..10 {
                    service.display_rendering(request(250, 122)).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(3)).await;
                }
            }));
        }
        let ticks = tokio::spawn(async move {
            for _ in 0..60 {
                scheduler.tick().await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        for render in renders {
            render.await.unwrap();
        }
        ticks.await.unwrap();

        assert_eq!(panel.overlaps(), 0);
        let displays = panel
            .ops()
            .into_iter()
            .filter(|op| matches!(op, PanelOp::DisplayFull | PanelOp::DisplayPartial))
            .count();
        assert_eq!(displays, 40);
    }
}
