// File: ./src/bin/eventfold.rs
use anyhow::Result;
use eventfold::cache::RunCache;
use eventfold::cli::{CliArgs, print_help};
use eventfold::config::Config;
use eventfold::context::{AppContext, StandardContext};
use eventfold::pipeline::{Pipeline, RunOutcome};
use eventfold::registry::SourceRegistry;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse(env::args().skip(1))?;
    if args.help {
        print_help("eventfold");
        return Ok(());
    }

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("eventfold")
        .build();
    TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)?;

    let ctx = StandardContext::new(args.root.clone());

    let outcome = if args.cached {
        match RunCache::load(&ctx) {
            Some(outcome) => outcome,
            None => {
                log::warn!("No cached run available");
                RunOutcome::default()
            }
        }
    } else {
        fetch(&ctx, &args).await
    };

    let json = if args.health {
        serde_json::to_string_pretty(&outcome.health)?
    } else {
        serde_json::to_string_pretty(&outcome.events)?
    };
    println!("{}", json);
    Ok(())
}

async fn fetch(ctx: &dyn AppContext, args: &CliArgs) -> RunOutcome {
    let mut config = Config::load_or_default(ctx);
    if let Some(days) = args.horizon_days {
        config.horizon_days = days;
    }
    let sources = SourceRegistry::load(ctx);

    let progress = |name: &str, index: usize, total: usize| {
        log::info!("[{}/{}] {}", index, total, name);
    };
    let outcome = Pipeline::new(config).run(&sources, &progress).await;

    if let Err(e) = RunCache::save(ctx, &outcome) {
        log::warn!("Failed to save run cache: {:#}", e);
    }
    outcome
}
