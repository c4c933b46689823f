use tokio::sync::broadcast;
use tracing::debug;

use driftkv_common::ConnectionError;
use driftkv_protocol::{
    Command, GREETING, HELP_TEXT, Parse, READONLY_REPLY, REPLICA_GREETING, Record, Reply,
};
use driftkv_storage::{Aof, Stats, Store};

use crate::Connection;
use crate::replication::snapshot_reply;

/// Loop principal de tratamento de uma conexão no primário.
pub async fn handle_connection(
    mut conn: Connection,
    store: Store,
    shutdown: &mut broadcast::Receiver<()>,
    aof: Option<Aof>,
) -> Result<(), ConnectionError> {
    conn.write_lines(GREETING).await?;

    loop {
        let line = tokio::select! {
            result = conn.read_line() => result?,
            _ = shutdown.recv() => {
                return Ok(());
            }
        };

        let line = match line {
            Some(l) => l,
            None => return Ok(()), // EOF
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match Command::from_line(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                conn.write_reply(&Reply::error(e)).await?;
                continue;
            }
        };

        debug!("comando recebido: {cmd:?}");

        let (reply, record) = execute_command(&cmd, &store);

        // Memória já mudou; o log é best-effort.
        if let (Some(record), Some(aof)) = (record, &aof) {
            aof.append(record).await;
        }

        conn.write_reply(&reply).await?;

        if cmd == Command::Quit {
            return Ok(());
        }
    }
}

/// Loop de uma conexão de cliente na réplica: só GET, INFO e QUIT.
pub async fn handle_replica_connection(
    mut conn: Connection,
    store: Store,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    conn.write_lines(REPLICA_GREETING).await?;

    loop {
        let line = tokio::select! {
            result = conn.read_line() => result?,
            _ = shutdown.recv() => {
                return Ok(());
            }
        };

        let line = match line {
            Some(l) => l,
            None => return Ok(()),
        };
        let Ok(parse) = Parse::new(&line) else {
            continue;
        };

        let reply = match Command::from_line(&line) {
            Ok(cmd) if cmd.allowed_on_replica() => execute_readonly(&cmd, &store),
            Err(e) if matches!(parse.command(), "GET" | "INFO" | "QUIT") => Reply::error(e),
            _ => Reply::error(READONLY_REPLY),
        };

        conn.write_reply(&reply).await?;

        if parse.command() == "QUIT" && matches!(reply, Reply::Simple(_)) {
            return Ok(());
        }
    }
}

/// Executa um comando no store e retorna a resposta e o registro a anexar
/// ao log, se a mutação de fato aconteceu.
pub fn execute_command(cmd: &Command, store: &Store) -> (Reply, Option<Record>) {
    match cmd {
        Command::Write(record) => execute_write(record, store),
        Command::Get(key) => (get_reply(store, key), None),
        Command::Exists(key) => {
            let found = store.get(key).is_some();
            (Reply::Integer(found as i64), None)
        }
        Command::Ttl(key) => (Reply::Integer(store.ttl(key)), None),
        Command::Incr(key) => incr_reply(store, key, 1),
        Command::Decr(key) => incr_reply(store, key, -1),
        Command::ConfigMaxKeys(n) => {
            store.set_capacity(*n);
            (Reply::ok(), None)
        }
        Command::Info => (Reply::Lines(info_lines("# Server", &store.stats())), None),
        Command::DumpAll => (snapshot_reply(store), None),
        Command::Keys => {
            let keys = store.keys();
            if keys.is_empty() {
                (Reply::Line("(empty)".into()), None)
            } else {
                (Reply::Lines(keys), None)
            }
        }
        Command::Help => (
            Reply::Lines(HELP_TEXT.iter().map(|l| l.to_string()).collect()),
            None,
        ),
        Command::Ping(msg) => match msg {
            Some(m) => (Reply::Line(m.clone()), None),
            None => (Reply::Line("PONG".into()), None),
        },
        Command::Quit => (Reply::Simple("OK bye".into()), None),
        Command::Unknown(name) => (Reply::error(format!("unknown command '{name}'")), None),
    }
}

fn execute_write(record: &Record, store: &Store) -> (Reply, Option<Record>) {
    match record {
        Record::Set { key, value } => {
            store.set(key.clone(), value.clone());
            (Reply::ok(), Some(record.clone()))
        }
        Record::SetEx { key, ttl, value } => {
            store.set_with_ttl(key.clone(), value.clone(), *ttl);
            (Reply::ok(), Some(record.clone()))
        }
        Record::Del { key } => {
            if store.delete(key) {
                (Reply::Integer(1), Some(record.clone()))
            } else {
                (Reply::Integer(0), None)
            }
        }
        Record::Expire { key, ttl } => {
            if store.set_expiry(key, *ttl) {
                (Reply::ok(), Some(record.clone()))
            } else {
                (Reply::Integer(0), None)
            }
        }
    }
}

fn incr_reply(store: &Store, key: &str, delta: i64) -> (Reply, Option<Record>) {
    match store.incr_by(key, delta) {
        Ok(n) => (
            Reply::Integer(n),
            Some(Record::Set {
                key: key.to_string(),
                value: n.to_string(),
            }),
        ),
        Err(_) => (
            Reply::error("value is not an integer or out of range"),
            None,
        ),
    }
}

/// Executa um comando do subconjunto de leitura da réplica.
fn execute_readonly(cmd: &Command, store: &Store) -> Reply {
    match cmd {
        Command::Get(key) => get_reply(store, key),
        Command::Info => Reply::Lines(info_lines("# Replica", &store.stats())),
        Command::Quit => Reply::Simple("OK bye".into()),
        _ => Reply::error(READONLY_REPLY),
    }
}

fn get_reply(store: &Store, key: &str) -> Reply {
    match store.get(key) {
        Some(value) => Reply::Value(value),
        None => Reply::Nil,
    }
}

/// Bloco `key:value` do INFO.
pub fn info_lines(header: &str, stats: &Stats) -> Vec<String> {
    vec![
        header.to_string(),
        format!("keys:{}", stats.keys),
        format!("max_keys:{}", stats.capacity),
        format!("evictions:{}", stats.evictions),
        format!("reads:{}", stats.reads),
        format!("writes:{}", stats.writes),
    ]
}
