use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use driftkv_common::{DEFAULT_HOST, DEFAULT_PORT};
use driftkv_protocol::{GREETING, SNAPSHOT_SENTINEL};

/// Tempo sem novas linhas que encerra uma resposta de várias linhas.
const IDLE_TIMEOUT: Duration = Duration::from_millis(100);
/// Espera máxima pela primeira linha da resposta.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "driftkv-cli", about = "DriftKV CLI client")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Comando para executar diretamente (modo não interativo)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn connect(addr: &str) -> anyhow::Result<Session> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("falha ao conectar em {addr}"))?;
        let (read, writer) = stream.into_split();
        let mut session = Session {
            reader: BufReader::new(read),
            writer,
        };

        // A réplica manda uma linha só; o primário, duas.
        let first = session
            .next_line(REPLY_TIMEOUT)
            .await?
            .context("servidor fechou a conexão")?;
        if first == GREETING[0] {
            session.next_line(REPLY_TIMEOUT).await?;
        }
        Ok(session)
    }

    /// Envia uma linha de comando e retorna as linhas da resposta.
    async fn request(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;

        let Some(first) = self.next_line(REPLY_TIMEOUT).await? else {
            bail!("servidor fechou a conexão");
        };

        let dump = is_dump(line) && !first.starts_with('-');
        let mut lines = vec![first];

        if dump {
            while lines.last().map(String::as_str) != Some(SNAPSHOT_SENTINEL) {
                match self.next_line(REPLY_TIMEOUT).await? {
                    Some(l) => lines.push(l),
                    None => bail!("servidor fechou a conexão no meio do dump"),
                }
            }
            lines.pop();
            return Ok(lines);
        }

        while let Some(l) = self.next_line(IDLE_TIMEOUT).await? {
            lines.push(l);
        }
        Ok(lines)
    }

    /// Próxima linha, ou None em EOF/timeout.
    async fn next_line(&mut self, limit: Duration) -> anyhow::Result<Option<String>> {
        let mut buf = String::new();
        match timeout(limit, self.reader.read_line(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Ok(None),
            Ok(Ok(_)) => Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string())),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut session = Session::connect(&addr).await?;

    // Modo comando único (via argumentos)
    if !args.command.is_empty() {
        let reply = session.request(&args.command.join(" ")).await?;
        print_reply(&reply);
        return Ok(());
    }

    println!("Conectado a {addr}");

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("driftkv> ");
        io::stdout().flush()?;

        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break; // EOF
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        match session.request(line).await {
            Ok(reply) => print_reply(&reply),
            Err(e) => {
                println!("(error) {e}");
                break;
            }
        }

        if line.eq_ignore_ascii_case("quit") {
            break;
        }
    }

    Ok(())
}

fn is_dump(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|cmd| cmd.eq_ignore_ascii_case("DUMPALL"))
}

fn print_reply(lines: &[String]) {
    if lines.is_empty() {
        println!("(empty)");
    }
    for line in lines {
        println!("{}", format_reply_line(line));
    }
}

/// Formata uma linha de resposta para exibição humana.
fn format_reply_line(line: &str) -> String {
    if let Some(msg) = line.strip_prefix('+') {
        return msg.to_string();
    }
    if let Some(msg) = line.strip_prefix('-') {
        return format!("(error) {msg}");
    }
    if let Some(n) = line.strip_prefix(':') {
        if n.parse::<i64>().is_ok() {
            return format!("(integer) {n}");
        }
    }
    line.to_string()
}
