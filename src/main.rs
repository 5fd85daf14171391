use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::net::TcpListener;

use eink_display::config::Args;
use eink_display::eink::{DisplayService, ServiceConfig, SimulatedPanel};
use eink_display::rpc::RpcServer;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level.into())
        .format_timestamp_millis()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut panel = SimulatedPanel::new();
    if let Some(path) = &args.snapshot {
        info!("writing displayed frames to {}", path.display());
        panel = panel.with_snapshot(path);
    }

    let service = DisplayService::new(panel, ServiceConfig::default())
        .await
        .map_err(|e| format!("failed to initialise eInk screen: {}", e))?;
    let service = Arc::new(service);
    service.start();

    let listener = TcpListener::bind(args.listen_addr).await?;
    let server = Arc::new(RpcServer::new(service.clone()));
    let token = service.shutdown_token();
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener, token).await })
    };

    let signals = service.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested");
        signals.pre_stop();
    });

    let terminated = service.wait_for_termination().await;
    if terminated.is_err() {
        warn!("eInk idle monitor failed, shutting down");
    }

    let grace = args.grace();
    let (stopped, drained) = tokio::join!(service.stop(grace), server.drain(grace));
    if !drained {
        warn!("closing with connections still open");
    }
    match serving.await {
        Ok(Err(e)) => warn!("rendering server failed: {}", e),
        Err(e) => warn!("rendering server task panicked: {}", e),
        Ok(Ok(())) => {}
    }
    stopped?;
    terminated?;

    info!("eInk display service stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("cannot listen for SIGTERM: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for SIGINT: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for ctrl-c: {}", e);
    }
}
