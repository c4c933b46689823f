mod common;

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use common::{Client, start_primary, start_replica};
use driftkv_common::ReplicationError;
use driftkv_server::replication::sync_once_within;
use driftkv_server::{replica_task, sync_once};
use driftkv_storage::Store;

/// Primário falso: aceita uma conexão, espera o DUMPALL e responde `script`.
async fn fake_primary(script: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "DUMPALL");
        write.write_all(script.as_bytes()).await.unwrap();
        write.flush().await.unwrap();
    });

    addr.to_string()
}

fn stale_replica() -> Store {
    let store = Store::new();
    store.set("stale".into(), "old".into());
    store.set("shared".into(), "old".into());
    store
}

#[tokio::test]
async fn test_sync_replaces_replica_state() {
    let primary = Store::new();
    primary.set("shared".into(), "new value".into());
    primary.set_with_ttl("session".into(), "abc".into(), 100);
    let server = start_primary(primary, None).await;

    let replica = stale_replica();
    let installed = sync_once(&server.addr.to_string(), &replica).await.unwrap();

    assert_eq!(installed, 2);
    assert_eq!(replica.get("shared"), Some("new value".into()));
    assert_eq!(replica.get("session"), Some("abc".into()));
    assert_eq!(replica.get("stale"), None);
    assert!((99..=100).contains(&replica.ttl("session")));

    server.stop().await;
}

#[tokio::test]
async fn test_sync_empty_primary_clears_replica() {
    let server = start_primary(Store::new(), None).await;

    let replica = stale_replica();
    assert_eq!(sync_once(&server.addr.to_string(), &replica).await.unwrap(), 0);
    assert!(replica.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_sync_connect_failure_keeps_snapshot() {
    // Porta liberada logo após o bind: ninguém escuta ali
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let replica = stale_replica();
    let err = sync_once(&addr, &replica).await.unwrap_err();

    assert!(matches!(err, ReplicationError::Connect { .. }), "{err:?}");
    assert_eq!(replica.get("stale"), Some("old".into()));
    assert_eq!(replica.len(), 2);
}

#[tokio::test]
async fn test_sync_malformed_record_aborts_cycle() {
    let addr = fake_primary("SET good 1\r\nSETEX bad notanumber v\r\n.\r\n").await;

    let replica = stale_replica();
    let err = sync_once(&addr, &replica).await.unwrap_err();

    assert!(
        matches!(err, ReplicationError::InvalidRecord { ref line, .. } if line == "SETEX bad notanumber v"),
        "{err:?}"
    );
    assert_eq!(replica.get("good"), None);
    assert_eq!(replica.get("stale"), Some("old".into()));
}

#[tokio::test]
async fn test_sync_rejects_log_only_records() {
    let addr = fake_primary("SET a 1\r\nDEL a\r\n.\r\n").await;

    let replica = stale_replica();
    let err = sync_once(&addr, &replica).await.unwrap_err();

    assert!(matches!(err, ReplicationError::UnexpectedRecord(_)), "{err:?}");
    assert_eq!(replica.len(), 2);
}

#[tokio::test]
async fn test_sync_eof_before_sentinel() {
    let addr = fake_primary("SET a 1\r\nSET b 2\r\n").await;

    let replica = stale_replica();
    let err = sync_once(&addr, &replica).await.unwrap_err();

    assert!(matches!(err, ReplicationError::UnexpectedEof), "{err:?}");
    assert_eq!(replica.get("a"), None);
    assert_eq!(replica.get("stale"), Some("old".into()));
}

#[tokio::test]
async fn test_sync_tolerates_banner_and_prompt() {
    let addr = fake_primary(
        "+OK driftkv ready\r\nSupports SET, GET\r\nType HELP for commands.\r\n> SET a hello world\r\n>\r\n\r\nSETEX b 60 x\r\n> .\r\n",
    )
    .await;

    let replica = stale_replica();
    assert_eq!(sync_once(&addr, &replica).await.unwrap(), 2);
    assert_eq!(replica.get("a"), Some("hello world".into()));
    assert_eq!(replica.get("b"), Some("x".into()));
    assert_eq!(replica.get("stale"), None);
}

#[tokio::test]
async fn test_sync_times_out_on_silent_primary() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    // Aceita e nunca responde
    let holder = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let replica = stale_replica();
    let err = sync_once_within(&addr, &replica, Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, ReplicationError::Timeout(_)), "{err:?}");
    assert_eq!(replica.len(), 2);
    holder.abort();
}

#[tokio::test]
async fn test_replica_task_converges() {
    let primary = Store::new();
    let server = start_primary(primary.clone(), None).await;
    let replica = Store::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn(replica_task(
        server.addr.to_string(),
        replica.clone(),
        Duration::from_millis(50),
        shutdown_rx,
    ));

    primary.set("k".into(), "v1".into());
    wait_for(&replica, "k", "v1").await;

    primary.set("k".into(), "v2".into());
    wait_for(&replica, "k", "v2").await;

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_replica_task_survives_dead_primary() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let replica = stale_replica();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(replica_task(
        addr,
        replica.clone(),
        Duration::from_millis(20),
        shutdown_rx,
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());
    assert_eq!(replica.get("stale"), Some("old".into()));

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_replica_server_is_read_only() {
    let store = Store::new();
    store.set("a".into(), "1".into());
    let server = start_replica(store).await;
    let mut client = Client::connect_replica(server.addr).await;

    let readonly = "-ERR READONLY replica: only GET/INFO/QUIT allowed";
    assert_eq!(client.send("SET a 2").await, readonly);
    assert_eq!(client.send("DEL a").await, readonly);
    assert_eq!(client.send("KEYS").await, readonly);
    assert_eq!(client.send("NOSUCH").await, readonly);

    assert_eq!(client.send("GET a").await, "\"1\"");
    assert_eq!(client.send("get missing").await, "(nil)");
    assert!(client.send("GET").await.starts_with("-ERR"));

    let info = client.send_multi("INFO", 6).await;
    assert_eq!(info[0], "# Replica");
    assert_eq!(info[1], "keys:1");

    assert_eq!(client.send("QUIT").await, "+OK bye");
    assert_eq!(client.read_line().await, None);

    server.stop().await;
}

async fn wait_for(store: &Store, key: &str, expected: &str) {
    for _ in 0..100 {
        if store.get(key).as_deref() == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("réplica não convergiu para {key}={expected}");
}
