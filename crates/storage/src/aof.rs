use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};
use tracing::{error, info, warn};

use driftkv_protocol::Record;

use crate::Store;

/// Política de fsync. Todo registro chega ao buffer do OS logo após a
/// escrita; a política decide só quando chamar `sync_data`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum FsyncPolicy {
    /// Fsync após cada registro.
    Always,
    /// Fsync a cada segundo.
    #[default]
    EverySec,
    /// Sem fsync explícito (deixa pro OS).
    No,
}

/// Handle clonável usado pelas conexões para anexar registros ao log.
#[derive(Debug, Clone)]
pub struct Aof {
    tx: mpsc::Sender<Record>,
}

impl Aof {
    /// Envia um registro ao writer. Falhas são logadas e não propagadas:
    /// a mutação em memória já aconteceu.
    pub async fn append(&self, record: Record) {
        if let Err(e) = self.tx.send(record).await {
            warn!("AOF: writer indisponível, registro descartado: {}", e.0);
        }
    }
}

/// Único dono do arquivo: recebe registros via channel e faz append, uma
/// linha por registro, sem intercalar escritas de tarefas diferentes.
pub struct AofWriter {
    rx: mpsc::Receiver<Record>,
    writer: BufWriter<File>,
    path: PathBuf,
    policy: FsyncPolicy,
}

/// Abre (ou cria) o arquivo em modo append e devolve o par (handle, writer).
///
/// Erro aqui é fatal para o processo: sem o arquivo não há durabilidade.
pub async fn open_aof(
    path: PathBuf,
    policy: FsyncPolicy,
    buffer_size: usize,
) -> std::io::Result<(Aof, AofWriter)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;

    let (tx, rx) = mpsc::channel(buffer_size);
    let writer = AofWriter {
        rx,
        writer: BufWriter::new(file),
        path,
        policy,
    };
    Ok((Aof { tx }, writer))
}

impl AofWriter {
    /// Loop principal: recebe registros e escreve no arquivo até todos os
    /// handles serem descartados.
    pub async fn run(mut self) {
        let mut tick = interval(Duration::from_secs(1));

        info!("AOF writer iniciado: {:?} ({:?})", self.path, self.policy);

        loop {
            tokio::select! {
                record = self.rx.recv() => {
                    match record {
                        Some(record) => {
                            if let Err(e) = self.write_record(&record).await {
                                error!("AOF: falha ao gravar '{record}': {e}");
                            }
                        }
                        None => {
                            // Channel fechado: flush final
                            if let Err(e) = self.sync().await {
                                error!("AOF: falha no flush final: {e}");
                            }
                            info!("AOF writer encerrado");
                            return;
                        }
                    }
                }
                _ = tick.tick(), if self.policy == FsyncPolicy::EverySec => {
                    if let Err(e) = self.writer.get_ref().sync_data().await {
                        warn!("AOF: fsync periódico falhou: {e}");
                    }
                }
            }
        }
    }

    async fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        let line = format!("{record}\n");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        if self.policy == FsyncPolicy::Always {
            self.writer.get_ref().sync_data().await?;
        }
        Ok(())
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_data().await
    }
}

/// Lê o arquivo AOF e re-aplica os registros no Store para reconstruir estado.
///
/// Registros malformados são ignorados, assim como um fragmento final sem
/// `\n` (escrita parcial antes de um crash). Arquivo ausente não é erro.
/// Retorna o número de registros aplicados.
pub async fn replay_aof(path: &Path, store: &Store) -> std::io::Result<usize> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("arquivo AOF não encontrado, iniciando sem dados");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let (complete, tail) = match data.iter().rposition(|b| *b == b'\n') {
        Some(i) => (&data[..=i], &data[i + 1..]),
        None => (&data[..0], &data[..]),
    };

    let mut applied = 0;
    let mut skipped = 0;

    for raw in complete.split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Record::parse(line) {
            Ok(record) => {
                store.apply(&record);
                applied += 1;
            }
            Err(e) => {
                warn!("AOF: registro inválido ignorado ({e}): {line}");
                skipped += 1;
            }
        }
    }

    if !String::from_utf8_lossy(tail).trim().is_empty() {
        warn!("AOF: registro incompleto no final do arquivo ignorado");
        skipped += 1;
    }

    info!("AOF replay completo: {applied} registros restaurados, {skipped} ignorados");
    Ok(applied)
}
