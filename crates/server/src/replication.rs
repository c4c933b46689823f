//! Replicação por snapshot: o primário responde DUMPALL com o estado atual
//! e a réplica puxa esse dump periodicamente, instalando-o de uma vez.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use driftkv_common::{ReplicationError, SYNC_TIMEOUT};
use driftkv_protocol::banner::{is_banner, strip_prompt};
use driftkv_protocol::{Record, Reply, SNAPSHOT_SENTINEL};
use driftkv_storage::Store;

use crate::Connection;

/// Lado do PRIMÁRIO: registros de todas as chaves vivas seguidos do sentinela.
pub fn snapshot_reply(store: &Store) -> Reply {
    let mut lines: Vec<String> = store
        .dump_records()
        .iter()
        .map(ToString::to_string)
        .collect();
    lines.push(SNAPSHOT_SENTINEL.to_string());
    Reply::Lines(lines)
}

/// Tarefa de fundo da réplica: um ciclo de sincronização a cada `period`.
///
/// Falhas nunca derrubam a réplica; o último snapshot instalado continua
/// sendo servido e o próximo ciclo tenta de novo.
pub async fn replica_task(
    primary: String,
    store: Store,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Iniciando replicação de {primary} (período {period:?})");

    loop {
        match sync_once(&primary, &store).await {
            Ok(n) => info!("sync: snapshot com {n} chaves instalado"),
            Err(e) => warn!("sync: ciclo abortado, snapshot anterior mantido: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shutdown.recv() => {
                info!("Encerrando tarefa de replicação.");
                return;
            }
        }
    }
}

/// Um ciclo completo: busca o snapshot, monta um Store novo e instala.
/// Retorna o número de chaves instaladas.
pub async fn sync_once(primary: &str, store: &Store) -> Result<usize, ReplicationError> {
    sync_once_within(primary, store, SYNC_TIMEOUT).await
}

/// Como [`sync_once`], com limite de tempo explícito para o ciclo.
pub async fn sync_once_within(
    primary: &str,
    store: &Store,
    limit: Duration,
) -> Result<usize, ReplicationError> {
    let records = timeout(limit, fetch_snapshot(primary))
        .await
        .map_err(|_| ReplicationError::Timeout(limit))??;

    debug!("sync: {} registros recebidos de {primary}", records.len());

    let fresh = Store::new();
    for record in &records {
        fresh.apply(record);
    }
    Ok(store.install(fresh))
}

async fn fetch_snapshot(primary: &str) -> Result<Vec<Record>, ReplicationError> {
    let stream = TcpStream::connect(primary)
        .await
        .map_err(|source| ReplicationError::Connect {
            addr: primary.to_string(),
            source,
        })?;
    let mut conn = Connection::new(stream);

    conn.write_lines(&["DUMPALL"]).await?;

    let mut records = Vec::new();
    loop {
        let Some(line) = conn.read_line().await? else {
            return Err(ReplicationError::UnexpectedEof);
        };
        let line = strip_prompt(line.trim());

        if line == SNAPSHOT_SENTINEL {
            break;
        }
        if line.is_empty() || is_banner(line) {
            continue;
        }

        let record = Record::parse(line).map_err(|source| ReplicationError::InvalidRecord {
            line: line.to_string(),
            source,
        })?;
        if !record.is_snapshot_record() {
            return Err(ReplicationError::UnexpectedRecord(line.to_string()));
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_ends_with_sentinel() {
        let store = Store::new();
        store.set("b".into(), "2".into());
        store.set("a".into(), "one two".into());

        assert_eq!(
            snapshot_reply(&store),
            Reply::Lines(vec!["SET a one two".into(), "SET b 2".into(), ".".into()])
        );
    }

    #[test]
    fn empty_snapshot_is_just_sentinel() {
        assert_eq!(
            snapshot_reply(&Store::new()),
            Reply::Lines(vec![".".into()])
        );
    }
}
