//! `url_check_worker` binary: drains a URL-check queue, follows redirect
//! chains, and routes each task to an output queue or back to the input
//! queue for a delayed recheck.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use dispatchd::cli::Args;
use dispatchd::error::{AppResult, DispatchError};
use dispatchd::queue::{QueueAdapter, TcpQueueAdapter};
use dispatchd::supervisor::{bootstrap, run_supervised};
use dispatchd::urlcheck::{run_loop, ReqwestRedirectAnalyzer, WorkerTuning};
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
    info!("url_check_worker starting");

    let in_queue: Arc<dyn QueueAdapter> = Arc::new(TcpQueueAdapter::new(
        settings.resolved_input_host().to_string(),
        settings.resolved_input_port(),
        settings.resolved_input_space(),
        settings.resolved_input_tube().to_string(),
    ));
    let out_queue: Arc<dyn QueueAdapter> = Arc::new(TcpQueueAdapter::new(
        settings.resolved_output_host().to_string(),
        settings.resolved_output_port(),
        settings.resolved_output_space(),
        settings.resolved_output_tube().to_string(),
    ));

    let analyzer = Arc::new(
        ReqwestRedirectAnalyzer::new(settings.http_timeout(), settings.max_redirects, &settings.user_agent)
            .map_err(|e| DispatchError::Startup(e.to_string()))?,
    );

    let tuning = WorkerTuning {
        take_timeout: settings.take_timeout(),
        recheck_delay: settings.recheck_delay(),
        sleep: settings.sleep(),
    };
    let sleep_on_fail = settings.sleep_on_fail();

    let run_flag = controller.run_flag.clone();
    run_supervised(controller.run_flag.clone(), sleep_on_fail, || {
        let in_queue = in_queue.clone();
        let out_queue = out_queue.clone();
        let analyzer = analyzer.clone();
        let run_flag = run_flag.clone();
        async move {
            run_loop(&run_flag, in_queue.as_ref(), out_queue.as_ref(), analyzer.as_ref(), tuning)
                .await
                .map_err(DispatchError::from)
        }
    })
    .await;

    let code = controller.exit_code.load(Ordering::SeqCst);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(ExitCode::from(code.clamp(0, 255) as u8))
}
