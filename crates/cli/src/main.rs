mod doctor_commands;
mod sticker_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    stickerbot_bridge::{BridgeConnector, FileCredentialStore},
    stickerbot_config::{Severity, StickerBotConfig},
    stickerbot_media::{
        AnimatedStickerEncoder, FfmpegTranscoder, StaticStickerEncoder, TranscodeOptions,
        VideoTranscoder,
    },
    stickerbot_whatsapp::{Encoders, SessionController, Shutdown, TerminalQrRenderer},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "stickerbot", about = "stickerbot: WhatsApp sticker and door-keyword bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./stickerbot.toml and friends).
    #[arg(long, global = true, env = "STICKERBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and answer messages (default when no subcommand is provided).
    Run,
    /// Validate config and check the sticker backends.
    Doctor,
    /// Turn a local image or video into a sticker.
    Sticker {
        input: PathBuf,
        output: PathBuf,
        /// Use the animated encoder even for still images.
        #[arg(long)]
        animated: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Explicit `--config` must load; otherwise discovery falls back to defaults.
fn load_config(cli: &Cli) -> anyhow::Result<(StickerBotConfig, Option<PathBuf>)> {
    match cli.config {
        Some(ref path) => {
            let config = stickerbot_config::load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok((config, Some(path.clone())))
        },
        None => Ok((
            stickerbot_config::discover_and_load(),
            stickerbot_config::find_config_file(),
        )),
    }
}

#[cfg(feature = "metrics")]
fn init_metrics(config: &StickerBotConfig) -> anyhow::Result<stickerbot_metrics::MetricsHandle> {
    let handle = stickerbot_metrics::init_metrics(stickerbot_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("version".into(), env!("CARGO_PKG_VERSION").into())],
    })?;
    Ok(handle)
}

async fn run_bot(config: StickerBotConfig) -> anyhow::Result<()> {
    let validation = stickerbot_config::validate(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        anyhow::bail!(
            "config has {} error(s), run `stickerbot doctor` for details",
            validation.count(Severity::Error)
        );
    }

    #[cfg(feature = "metrics")]
    let metrics = init_metrics(&config)?;

    let size = config.sticker.canvas_size;
    let transcoder = FfmpegTranscoder::with_binary(config.sticker.ffmpeg_path.clone());
    if !transcoder.is_available() {
        warn!("ffmpeg not found, GIF and video stickers are disabled");
    }
    let encoders = Encoders {
        still: Arc::new(StaticStickerEncoder::new(size)),
        animated: Arc::new(AnimatedStickerEncoder::new(
            transcoder,
            TranscodeOptions::with_size(size),
        )),
    };

    let connector = Arc::new(BridgeConnector::new(
        config.session.bridge_url.clone(),
        config.session.request_timeout(),
    ));
    let store = Arc::new(FileCredentialStore::in_dir(&config.session.auth_dir));
    let mut controller = SessionController::new(
        connector,
        store,
        Arc::new(TerminalQrRenderer),
        encoders,
        config,
    );

    let outcome = tokio::select! {
        outcome = controller.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            return Ok(());
        },
    };

    #[cfg(feature = "metrics")]
    {
        let rendered = metrics.render();
        if !rendered.is_empty() {
            info!("final metrics:\n{rendered}");
        }
    }

    match outcome? {
        Shutdown::LoggedOut => {
            info!("session logged out, exiting");
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "stickerbot starting");

    let (config, source) = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot(config).await,
        Some(Commands::Doctor) => doctor_commands::handle_doctor(&config, source.as_deref()).await,
        Some(Commands::Sticker {
            input,
            output,
            animated,
        }) => sticker_commands::handle_sticker(&config, &input, &output, animated).await,
    }
}
