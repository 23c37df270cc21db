//! Hornet - Docker Swarm 编排引擎
//!
//! Usage:
//! - Start the engine: `hornet`
//! - Load a swarm config on start: `hornet --load swarm.json`
//! - Print the tracked swarm after start: `hornet --dump`
//! - Keep the swarm on exit: `hornet --no-clean`

use anyhow::Context;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hornet::config::constants::VERSION;
use hornet::domain::SwarmConfig;
use hornet::{AppState, EngineConfig};

/// 命令行参数
#[derive(Debug, Default)]
struct CliArgs {
    /// 启动后加载的 swarm 配置文件
    load: Option<PathBuf>,
    /// 启动后打印当前 swarm 配置
    dump: bool,
    /// 退出时不清理 swarm
    no_clean: bool,
}

/// 解析命令行参数
fn parse_args() -> anyhow::Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--load" => {
                let path = args.get(i + 1).context("--load requires a file path")?;
                cli.load = Some(PathBuf::from(path));
                i += 2;
            }
            "--dump" => {
                cli.dump = true;
                i += 1;
            }
            "--no-clean" => {
                cli.no_clean = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    Ok(cli)
}

fn print_help() {
    println!("Hornet {} - Docker Swarm orchestration engine", VERSION);
    println!();
    println!("USAGE:");
    println!("    hornet [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --load <FILE>    Load a swarm config (JSON) after start");
    println!("    --dump           Print the tracked swarm config after start");
    println!("    --no-clean       Leave the swarm in place on exit");
    println!("    -h, --help       Print help information");
    println!();
    println!("Configuration is read from HORNET_* environment variables.");
}

fn init_tracing() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hornet=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

async fn run(cli: CliArgs) -> anyhow::Result<()> {
    let config = EngineConfig::from_env();
    let state = AppState::init(config)
        .await
        .context("Failed to start swarm engine")?;

    if let Some(join) = state.engine.join_token().await {
        tracing::info!("Workers can join with: {}", join);
    }

    if let Some(path) = &cli.load {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let swarm: SwarmConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid swarm config in {}", path.display()))?;

        if let Err(e) = state.engine.load_swarm_config(&swarm, None).await {
            tracing::error!(error = %e, path = %path.display(), "Failed to load swarm config");
        }
    }

    if cli.dump {
        let swarm = state.engine.dump_swarm_config().await;
        println!("{}", serde_json::to_string_pretty(&swarm)?);
    }

    tracing::info!("Hornet running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    if cli.no_clean {
        tracing::info!("Leaving swarm in place");
        return Ok(());
    }

    state.shutdown().await.context("Failed to clean swarm on exit")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = parse_args()?;
    init_tracing()?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(run(cli))
}
