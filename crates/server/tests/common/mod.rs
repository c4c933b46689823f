#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

use driftkv_protocol::{GREETING, REPLICA_GREETING};
use driftkv_storage::{Aof, Store};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Servidor rodando em background numa porta efêmera.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Store,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Encerra o accept loop e aguarda o término.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

pub async fn start_primary(store: Store, aof: Option<Aof>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let served = store.clone();
    let handle = tokio::spawn(async move {
        driftkv_server::run_primary(listener, served, aof, async {
            let _ = rx.await;
        })
        .await;
    });

    TestServer {
        addr,
        store,
        shutdown: Some(tx),
        handle,
    }
}

pub async fn start_replica(store: Store) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let served = store.clone();
    let handle = tokio::spawn(async move {
        driftkv_server::run_replica(listener, served, async {
            let _ = rx.await;
        })
        .await;
    });

    TestServer {
        addr,
        store,
        shutdown: Some(tx),
        handle,
    }
}

/// Cliente de linha: envia um comando e lê as linhas de resposta.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Conecta e consome a saudação do primário.
    pub async fn connect(addr: SocketAddr) -> Client {
        Self::connect_with_greeting(addr, GREETING).await
    }

    /// Conecta e consome a saudação da réplica.
    pub async fn connect_replica(addr: SocketAddr) -> Client {
        Self::connect_with_greeting(addr, REPLICA_GREETING).await
    }

    async fn connect_with_greeting(addr: SocketAddr, greeting: &[&str]) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        let mut client = Client {
            reader: BufReader::new(read),
            writer,
        };
        for expected in greeting {
            assert_eq!(client.read_line().await.as_deref(), Some(*expected));
        }
        client
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Próxima linha sem CRLF; None no EOF.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timeout lendo resposta")
            .unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Envia um comando e retorna a primeira linha da resposta.
    pub async fn send(&mut self, line: &str) -> String {
        self.send_raw(line).await;
        self.read_line().await.expect("servidor fechou a conexão")
    }

    /// Envia um comando e lê exatamente `n` linhas.
    pub async fn send_multi(&mut self, line: &str, n: usize) -> Vec<String> {
        self.send_raw(line).await;
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            lines.push(self.read_line().await.expect("servidor fechou a conexão"));
        }
        lines
    }

    /// Envia DUMPALL e lê até o sentinela (exclusive).
    pub async fn dump_all(&mut self) -> Vec<String> {
        self.send_raw("DUMPALL").await;
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await.expect("servidor fechou a conexão");
            if line == "." {
                return lines;
            }
            lines.push(line);
        }
    }
}
