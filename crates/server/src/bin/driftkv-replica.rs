use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

use driftkv_common::{DEFAULT_HOST, DEFAULT_PRIMARY_ADDR, DEFAULT_REPLICA_PORT, SYNC_INTERVAL};
use driftkv_server::{replica_task, run_replica};
use driftkv_storage::Store;

#[derive(Parser, Debug)]
#[command(name = "driftkv-replica", about = "driftkv: réplica somente-leitura")]
struct Args {
    /// Endereço do primário (host:porta)
    #[arg(default_value = DEFAULT_PRIMARY_ADDR)]
    primary: String,
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_REPLICA_PORT)]
    port: u16,
    /// Período entre sincronizações, em segundos
    #[arg(long, default_value_t = SYNC_INTERVAL.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    sync_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driftkv_server=info,driftkv_replica=info".into()),
        )
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let store = Store::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    tokio::spawn(replica_task(
        args.primary.clone(),
        store.clone(),
        Duration::from_secs(args.sync_interval),
        shutdown_tx.subscribe(),
    ));

    let listener = TcpListener::bind(&addr).await?;
    info!("driftkv réplica escutando em {addr} (primário={})", args.primary);

    run_replica(listener, store, async {
        let _ = signal::ctrl_c().await;
    })
    .await;

    drop(shutdown_tx);
    Ok(())
}
