// The broadcaster-node binary: HTTP API, duplex WebSocket channel and
// the cooperating tick/sweep/reaper tasks of spec.md section 5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use eyre::Report;
use mimalloc::MiMalloc;
use tracing::info;

use broadcaster_daemon::{build, Args};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::parse();
    broadcaster_common::init_tracing(false)?;

    let node = build(&args)?;
    let listen_address = args.listen_address.clone();

    let kill_switch = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, kill_switch.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, kill_switch.clone())?;
    let signal_poll_cancel = node.cancel.clone();
    let signal_poll_task = tokio::spawn(async move {
        loop {
            if kill_switch.load(Ordering::Relaxed) {
                signal_poll_cancel.cancel();
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    info!(address = %listen_address, "broadcaster-node listening");

    let shutdown_cancel = node.cancel.clone();
    axum::serve(listener, node.router.into_make_service())
        .with_graceful_shutdown(async move { shutdown_cancel.cancelled().await })
        .await?;

    node.cancel.cancel();
    let _ = node.dispatcher_task.await;
    let _ = node.sweeper_task.await;
    signal_poll_task.abort();

    info!("broadcaster-node shut down cleanly");
    Ok(())
}
