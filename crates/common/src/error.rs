/// Erros de leitura de linhas do protocolo texto.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("linha excede tamanho máximo ({0} bytes)")]
    LineTooLarge(usize),
}

/// Erros de armazenamento/engine de dados.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("valor não é um inteiro válido ou está fora do intervalo")]
    NotAnInteger,
}

/// Erros de conexão TCP.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("conexão resetada pelo peer")]
    ConnectionReset,
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Erros de parsing/validação de comandos e registros.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("linha vazia")]
    Empty,
    #[error("número errado de argumentos para '{0}'")]
    WrongArity(String),
    #[error("ttl inválido '{0}'")]
    InvalidTtl(String),
    #[error("argumento inválido: {0}")]
    InvalidArgument(String),
}

/// Erros de um ciclo de sincronização da réplica.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("falha ao conectar no primário {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("primário fechou a conexão antes do sentinela")]
    UnexpectedEof,
    #[error("ciclo de sincronização excedeu {0:?}")]
    Timeout(std::time::Duration),
    #[error("registro inválido no snapshot '{line}': {source}")]
    InvalidRecord { line: String, source: CommandError },
    #[error("registro não permitido em snapshot: '{0}'")]
    UnexpectedRecord(String),
}

/// Erro top-level do driftkv.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// Result type alias.
pub type DriftResult<T> = Result<T, DriftError>;

// Conversão implícita de io::Error → DriftError (via ConnectionError)
impl From<std::io::Error> for DriftError {
    fn from(e: std::io::Error) -> Self {
        DriftError::Connection(ConnectionError::Io(e))
    }
}
