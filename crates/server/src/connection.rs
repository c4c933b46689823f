use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use driftkv_common::{ConnectionError, INITIAL_BUFFER_CAPACITY, MAX_LINE_SIZE, ProtocolError};
use driftkv_protocol::Reply;

/// Wrapper sobre TcpStream com buffer para leitura de linhas e escrita de respostas.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Lê uma linha completa (sem o CRLF). Retorna None no EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        loop {
            if let Some(line) = self.parse_line()? {
                return Ok(Some(line));
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ConnectionError::ConnectionReset);
            }
        }
    }

    /// Escreve uma resposta no stream.
    pub async fn write_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let mut buf = BytesMut::new();
        reply.encode(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Escreve linhas cruas (saudação, comandos do cliente de sincronização).
    pub async fn write_lines(&mut self, lines: &[&str]) -> Result<(), ConnectionError> {
        for line in lines {
            self.stream.write_all(line.as_bytes()).await?;
            self.stream.write_all(b"\r\n").await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Option<String>, ConnectionError> {
        match self.buffer.iter().position(|b| *b == b'\n') {
            Some(end) => {
                let raw = self.buffer.split_to(end + 1);
                let line = String::from_utf8_lossy(&raw);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
            None if self.buffer.len() > MAX_LINE_SIZE => {
                Err(ProtocolError::LineTooLarge(self.buffer.len()).into())
            }
            None => Ok(None),
        }
    }
}
