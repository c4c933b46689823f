use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use driftkv_common::{DEFAULT_AOF_PATH, DEFAULT_HOST, DEFAULT_PORT, SWEEP_INTERVAL};
use driftkv_server::run_primary;
use driftkv_storage::{FsyncPolicy, Store, open_aof, replay_aof, spawn_sweeper};

#[derive(Parser, Debug)]
#[command(name = "driftkv-server", about = "driftkv: in-memory key-value store (primário)")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AOF_PATH)]
    aof: PathBuf,
    #[arg(long, default_value = "everysec", value_parser = parse_fsync)]
    fsync: FsyncPolicy,
    /// Período do sweeper de chaves expiradas, em segundos
    #[arg(long, default_value_t = SWEEP_INTERVAL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval: u64,
    /// Limite inicial de chaves (0 = ilimitado)
    #[arg(long, default_value_t = 0)]
    max_keys: usize,
}

fn parse_fsync(s: &str) -> Result<FsyncPolicy, String> {
    match s.to_lowercase().as_str() {
        "always" => Ok(FsyncPolicy::Always),
        "everysec" => Ok(FsyncPolicy::EverySec),
        "no" => Ok(FsyncPolicy::No),
        _ => Err(format!("valor inválido: '{s}'. Use: always, everysec, no")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftkv_server=info,driftkv_storage=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let store = Store::new();
    store.set_capacity(args.max_keys);

    // Sem o arquivo de log não sobe
    let (aof, writer) = open_aof(args.aof.clone(), args.fsync, 10_000)
        .await
        .with_context(|| format!("falha ao abrir AOF {:?}", args.aof))?;

    // Replay antes de aceitar qualquer cliente
    match replay_aof(&args.aof, &store).await {
        Ok(count) if count > 0 => info!("{count} registros restaurados do AOF"),
        Ok(_) => {}
        Err(e) => error!("erro no replay do AOF: {e}"),
    }

    let writer_handle = tokio::spawn(writer.run());
    spawn_sweeper(store.clone(), Duration::from_secs(args.sweep_interval));

    let listener = TcpListener::bind(&addr).await?;
    info!("driftkv escutando em {addr}");

    run_primary(listener, store, Some(aof), async {
        let _ = signal::ctrl_c().await;
    })
    .await;

    // Conexões soltam seus handles ao encerrar; o writer drena e faz o fsync final.
    if tokio::time::timeout(Duration::from_secs(5), writer_handle)
        .await
        .is_err()
    {
        warn!("AOF writer não encerrou a tempo");
    }

    Ok(())
}
