use driftkv_common::CommandError;

use crate::{Parse, Record};

/// Enum com todos os comandos suportados.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// SET, SETEX, DEL e EXPIRE: mutações que também viram registros no log.
    Write(Record),
    Get(String),
    Exists(String),
    Ttl(String),
    Incr(String),
    Decr(String),
    ConfigMaxKeys(usize),
    Info,
    DumpAll,
    Keys,
    Help,
    Ping(Option<String>),
    Quit,
    Unknown(String),
}

/// Texto estático do HELP.
pub const HELP_TEXT: &[&str] = &[
    "Supported commands (simple text protocol):",
    "  SET key value           - set value for key (no TTL)",
    "  SETEX key ttl value     - set value with TTL in seconds",
    "  GET key                 - get value for key",
    "  DEL key                 - delete key",
    "  EXISTS key              - check if key exists",
    "  TTL key                 - get remaining TTL (seconds)",
    "  EXPIRE key ttl          - set a new TTL in seconds",
    "  INCR key                - increment integer value (init 0 if missing)",
    "  DECR key                - decrement integer value (init 0 if missing)",
    "  CONFIG MAXKEYS n        - set max allowed keys (0 = unlimited)",
    "  INFO                    - show basic stats (keys, evictions, reads, writes)",
    "  KEYS                    - list all keys",
    "  DUMPALL                 - dump every live key as SET/SETEX lines, then '.'",
    "  PING [msg]              - ping or echo message",
    "  HELP                    - show this help",
    "  QUIT                    - close connection",
];

impl Command {
    /// Faz o parse de uma linha de texto em um Command.
    pub fn from_line(line: &str) -> Result<Command, CommandError> {
        let mut parse = Parse::new(line)?;

        if let Some(record) = Record::from_parse(&mut parse)? {
            // No protocolo de clientes o TTL precisa ser positivo; no log não.
            if let Record::SetEx { ttl, .. } | Record::Expire { ttl, .. } = &record
                && *ttl <= 0
            {
                return Err(CommandError::InvalidTtl(ttl.to_string()));
            }
            return Ok(Command::Write(record));
        }

        let name = parse.command().to_owned();
        let cmd = match name.as_str() {
            "GET" => Command::Get(single_key(&mut parse)?),
            "EXISTS" => Command::Exists(single_key(&mut parse)?),
            "TTL" => Command::Ttl(single_key(&mut parse)?),
            "INCR" => Command::Incr(single_key(&mut parse)?),
            "DECR" => Command::Decr(single_key(&mut parse)?),
            "CONFIG" => parse_config(&mut parse)?,
            "INFO" => no_args(&parse, Command::Info)?,
            "DUMPALL" => no_args(&parse, Command::DumpAll)?,
            "KEYS" => no_args(&parse, Command::Keys)?,
            "HELP" => no_args(&parse, Command::Help)?,
            "QUIT" => no_args(&parse, Command::Quit)?,
            "PING" => Command::Ping(parse.rest_opt()),
            _ => Command::Unknown(name),
        };

        Ok(cmd)
    }

    /// Comandos aceitos pela réplica (somente leitura).
    pub fn allowed_on_replica(&self) -> bool {
        matches!(self, Command::Get(_) | Command::Info | Command::Quit)
    }
}

fn single_key(parse: &mut Parse<'_>) -> Result<String, CommandError> {
    let key = parse.next_string()?;
    parse.finish()?;
    Ok(key)
}

fn no_args(parse: &Parse<'_>, cmd: Command) -> Result<Command, CommandError> {
    parse.finish()?;
    Ok(cmd)
}

fn parse_config(parse: &mut Parse<'_>) -> Result<Command, CommandError> {
    let sub = parse.next_string()?.to_ascii_uppercase();
    if sub != "MAXKEYS" {
        return Err(CommandError::InvalidArgument(format!(
            "CONFIG suporta apenas MAXKEYS, recebido '{sub}'"
        )));
    }
    let raw = parse.next_string()?;
    parse.finish()?;
    let n = raw.parse::<usize>().map_err(|_| {
        CommandError::InvalidArgument(format!("valor inválido para MAXKEYS '{raw}'"))
    })?;
    Ok(Command::ConfigMaxKeys(n))
}
