use anyhow::Context;
use fanout_bus::fanout::{FanoutSummary, Termination};
use tokio_util::sync::CancellationToken;

use crate::{cli::Cli, config::FanoutConfig};

mod cli;
mod config;

fn init_logging(level: log::LevelFilter) {
    // RUST_LOG, when set, wins over the command line
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("ffmpeg_next", level.min(log::LevelFilter::Info))
        .filter_module("fanout_bus", level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.log_level());

    let result = run(FanoutConfig::from(&cli)).await;
    match &result {
        Ok(summary) => report(summary),
        Err(e) => log::error!("{:#}", e),
    }
    std::process::exit(exit_code(&result));
}

/// `0` only when the input ran to its end.
fn exit_code(result: &anyhow::Result<FanoutSummary>) -> i32 {
    match result {
        Ok(summary) if summary.termination == Termination::EndOfStream => 0,
        Ok(_) | Err(_) => 1,
    }
}

async fn run(config: FanoutConfig) -> anyhow::Result<FanoutSummary> {
    fanout_bus::init()?;

    let cancel = CancellationToken::new();
    let session_cancel = cancel.clone();
    // FFmpeg reads, opens and writes all block
    let mut worker = tokio::task::spawn_blocking(move || -> anyhow::Result<FanoutSummary> {
        let mut session = config.build_session()?.with_cancel(session_cancel);
        Ok(session.run()?)
    });

    loop {
        tokio::select! {
            res = &mut worker => {
                return res.context("fan-out worker panicked")?;
            },
            _ = tokio::signal::ctrl_c() => {
                if cancel.is_cancelled() {
                    log::warn!("second interrupt, exiting without waiting for outputs");
                    std::process::exit(1);
                }
                log::info!("interrupt received, stopping after the current packet");
                cancel.cancel();
            },
        }
    }
}

fn report(summary: &FanoutSummary) {
    for sink in &summary.sinks {
        log::info!(
            "output {}: {:?}, {} written, {} write errors, {} reconnects, {} dropped",
            sink.url,
            sink.state,
            sink.stats.written,
            sink.stats.write_errors,
            sink.stats.reconnects,
            sink.stats.dropped
        );
    }
}
