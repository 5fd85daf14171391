//! Core e-ink panel management.
//!
//! E-ink panels have two refresh mechanisms: a slow full refresh that resets every pixel and
//! a fast partial refresh that only updates changed pixels but leaves ghosting behind when
//! used too many times in a row. They also need to be put in deep sleep when idle. This module
//! decides, for every incoming frame and every idle tick, which of those the panel gets.
//!
//! # Architecture
//!
//! - **`frame`**: Frame model, pixel formats and the dimension validator
//! - **`convert`**: Conversion of raw frames into the panel's packed 1-bit layout
//! - **`refresh`**: Full/partial refresh counting policy
//! - **`driver`**: The `PanelDriver` capability consumed by the controller
//! - **`simulated`**: In-memory panel used when no hardware is attached
//! - **`controller`**: Display mode state machine
//! - **`guard`**: The hardware guard serialising every panel operation
//! - **`scheduler`**: Idle monitor driving deep sleep and the daily full refresh
//! - **`service`**: Rendering entry point and service lifecycle
//!
//! # Example Flow
//!
//! ```ignore
//! let service = DisplayService::new(SimulatedPanel::new(), ServiceConfig::default()).await?;
//! service.start();
//!
//! let response = service.display_rendering(request).await?;
//!
//! service.pre_stop();
//! service.wait_for_termination().await;
//! service.stop(Duration::from_secs(5)).await?;
//! ```

pub mod controller;
pub mod convert;
pub mod driver;
pub mod error;
pub mod frame;
pub mod guard;
pub mod refresh;
pub mod scheduler;
pub mod service;
pub mod simulated;

pub use controller::{DisplayMode, DisplayModeController};
pub use driver::PanelDriver;
pub use error::{DriverError, ServiceError};
pub use frame::{Frame, PixelFormat, PANEL_HEIGHT, PANEL_WIDTH};
pub use guard::HardwareGuard;
pub use refresh::{RefreshKind, RefreshState};
pub use scheduler::{IdleAction, IdleScheduler, SchedulerTiming};
pub use service::{
    DisplayService, RenderingRequest, RenderingResponse, RenderingStatus, ServiceConfig,
};
pub use simulated::SimulatedPanel;
