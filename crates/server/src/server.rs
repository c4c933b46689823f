use std::future::Future;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use driftkv_common::ConnectionError;
use driftkv_storage::{Aof, Store};

use crate::Connection;
use crate::handler::{handle_connection, handle_replica_connection};

/// Aceita clientes do primário até `shutdown` completar. Cada conexão roda
/// na sua própria task, sem limite de conexões simultâneas.
pub async fn run_primary(
    listener: TcpListener,
    store: Store,
    aof: Option<Aof>,
    shutdown: impl Future<Output = ()>,
) {
    accept_loop(listener, shutdown, move |conn, mut shutdown_rx| {
        let store = store.clone();
        let aof = aof.clone();
        async move { handle_connection(conn, store, &mut shutdown_rx, aof).await }
    })
    .await;
}

/// Aceita clientes somente-leitura da réplica até `shutdown` completar.
pub async fn run_replica(listener: TcpListener, store: Store, shutdown: impl Future<Output = ()>) {
    accept_loop(listener, shutdown, move |conn, mut shutdown_rx| {
        let store = store.clone();
        async move { handle_replica_connection(conn, store, &mut shutdown_rx).await }
    })
    .await;
}

async fn accept_loop<F, Fut>(listener: TcpListener, shutdown: impl Future<Output = ()>, handler: F)
where
    F: Fn(Connection, broadcast::Receiver<()>) -> Fut,
    Fut: Future<Output = Result<(), ConnectionError>> + Send + 'static,
{
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    tokio::pin!(shutdown);

    loop {
        let (socket, addr) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(v) => v,
                    Err(e) => {
                        error!("erro ao aceitar conexão: {e}");
                        continue;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal recebido");
                break;
            }
        };

        info!("nova conexão: {addr}");
        let task = handler(Connection::new(socket), shutdown_tx.subscribe());

        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!("erro na conexão {addr}: {e}");
            }
            info!("conexão encerrada: {addr}");
        });
    }

    // Drop do sender avisa as conexões abertas
    drop(shutdown_tx);
}
