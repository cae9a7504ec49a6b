//! `notification_pusher` binary: drains a notification queue and delivers
//! each task as an HTTP POST callback.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use dispatchd::cli::Args;
use dispatchd::dispatch::notify::build_http_client;
use dispatchd::dispatch::{DispatchLoop, DispatchTuning};
use dispatchd::error::{AppResult, DispatchError};
use dispatchd::queue::{QueueAdapter, TcpQueueAdapter};
use dispatchd::supervisor::{bootstrap, run_supervised};
use tracing::info;

fn main() -> ExitCode {
    let args = Args::parse();
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(run(args)),
        Err(err) => {
            eprintln!("failed to start tokio runtime: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> ExitCode {
    match run_inner(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("startup failed: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(args: Args) -> AppResult<ExitCode> {
    let (settings, controller) = bootstrap(args).await?;
    info!("notification_pusher starting");

    let queue: Arc<dyn QueueAdapter> = Arc::new(TcpQueueAdapter::new(
        settings.queue_host.clone(),
        settings.queue_port,
        settings.queue_space,
        settings.queue_tube.clone(),
    ));

    let http_client = build_http_client(settings.http_connection_timeout(), settings.http_timeout(), settings.verify_tls)
        .map_err(|e| DispatchError::Startup(e.to_string()))?;

    let tuning = DispatchTuning {
        take_timeout: settings.take_timeout(),
        sleep: settings.sleep(),
    };
    let worker_pool_size = settings.worker_pool_size;
    let sleep_on_fail = settings.sleep_on_fail();

    let run_flag = controller.run_flag.clone();
    run_supervised(controller.run_flag.clone(), sleep_on_fail, || {
        let queue = queue.clone();
        let http_client = http_client.clone();
        let run_flag = run_flag.clone();
        async move {
            let dispatch = DispatchLoop::new(queue, worker_pool_size, http_client, run_flag, tuning);
            dispatch.run().await
        }
    })
    .await;

    let code = controller.exit_code.load(Ordering::SeqCst);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(ExitCode::from(code.clamp(0, 255) as u8))
}
