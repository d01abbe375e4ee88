use anyhow::Context;
use clap::Parser;
use docket::cli::{self, Cli, Commands};
use docket::config::{AppConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("failed to load configuration from {}", cli.config_dir))?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Run(args) => cli::run(args, config).await,
        Commands::Config(cmd) => cmd.run(&config),
    }
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},docket=debug", logging.level)));

    // File logging only when DOCKET_LOG_DIR is set.
    //
    // `tracing_appender::rolling::daily` panics if it can't create the initial
    // log file, so writability is checked first.
    let log_dir = std::env::var("DOCKET_LOG_DIR").ok();
    let file_layer = log_dir.as_deref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory {dir} ({e}), file logging disabled");
            return None;
        }
        let test_path = std::path::Path::new(dir).join(".docket_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(dir, "docket.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Flushes on drop; must live for the whole process
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {dir} ({e}), file logging disabled"
                );
                None
            }
        }
    });

    // Console goes to stderr so `--json` reports stay clean on stdout
    let json_layer = logging.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {dir}/docket.log");
    }
}
