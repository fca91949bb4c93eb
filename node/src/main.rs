use anyhow::Context;
use arcade_execution::{Engine, GameRng, Memory};
use arcade_node::{
    console::{self, Command, GRANT_SOURCE},
    observer, Config,
};
use clap::Parser;
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::path::PathBuf;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Arcade session engine driven from stdin.", long_about = None)]
struct Args {
    /// Path to the YAML config.
    #[arg(short, long)]
    config: PathBuf,

    /// Emit structured (JSON) logs regardless of the config.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Load config
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("could not read config file {}", args.config.display()))?;
    let config: Config = serde_yaml::from_str(&raw).context("could not parse config file")?;
    let config = config.validate().context("invalid config")?;

    // Create logger
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr);
    if args.json_logs || config.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Create engine
    let engine = Engine::new(config.engine, Memory::default(), GameRng::from_entropy());
    let mut registry = Registry::default();
    engine.metrics().register(&mut registry);
    for grant in &config.grants {
        engine
            .ledger()
            .credit(grant.user, grant.amount, GRANT_SOURCE, "startup")
            .await
            .with_context(|| format!("could not grant coins to {}", grant.user))?;
    }
    info!(grants = config.grants.len(), "engine ready");

    // Start observer
    let observer = tokio::spawn(observer::run(engine.subscribe()));

    // Drive commands from stdin until it closes or `quit`
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => console::execute(&engine, command).await,
            Err(err) => Err(err.into()),
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%line, %err, "command failed");
                format!("error {}: {err}", err.code())
            }
        };
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    // Force-resolve whatever is still live, then report
    let reports = engine.shutdown().await;
    info!(resolved = reports.len(), "shutdown complete");
    drop(engine);
    let tally = observer.await.context("observer task failed")?;
    for (user, stats) in tally.iter() {
        info!(
            user,
            played = stats.played,
            won = stats.won,
            lost = stats.lost,
            refunded = stats.refunded,
            net = stats.net,
            "player summary"
        );
    }

    let mut metrics = String::new();
    encode(&mut metrics, &registry).context("failed to encode metrics")?;
    stdout.write_all(metrics.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
