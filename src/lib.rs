//! Rendering service for the Waveshare 2.13inch eInk screen.
//!
//! This crate drives a 250x122 e-paper panel on behalf of remote callers. Callers push
//! already-composed frames over a small framed TCP protocol; the service decides for every
//! frame whether the panel gets a partial or a full refresh, and a background monitor puts
//! the panel into deep sleep when it sits idle.
//!
//! # Modules
//!
//! - `eink`: Panel mode controller, refresh policy, idle scheduler and the rendering service.
//! - `rpc`: Wire protocol, TCP server and client for the `DisplayRendering` call.
//! - `config`: Command line configuration for the `eink-display` binary.

pub mod config;
pub mod eink;
pub mod rpc;
