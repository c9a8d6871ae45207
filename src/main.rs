use bedrock_cli::{AiCli, CliArgs, Settings};
use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
use tracing_log::AsTrace;
use tracing_subscriber::prelude::*;

fn main() -> Result<()> {
    let start = std::time::Instant::now();

    let args = CliArgs::parse();
    let settings = Settings::new()?;
    let _guard = init_tracing(&args);
    info!("Initialized args, settings, and logging in {:?}", start.elapsed());

    let ai_cli = AiCli::new(settings, args, Some(start));
    ai_cli.exec()?;

    Ok(())
}

/// Logs go to stderr so stdout only carries the response.
fn init_tracing(args: &CliArgs) -> Option<FlushGuard> {
    let (chrome_layer, guard) = if args.tracing {
        let (layer, guard) = ChromeLayerBuilder::new().build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(args.verbose.log_level_filter().as_trace());

    tracing_subscriber::registry()
        .with(chrome_layer)
        .with(fmt_layer)
        .init();
    guard
}
