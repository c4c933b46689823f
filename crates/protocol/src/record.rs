use std::fmt;

use driftkv_common::CommandError;

use crate::Parse;

/// Registro de uma mutação, no formato de uma linha de texto.
///
/// A mesma gramática é usada pelo log de persistência e pelo snapshot de
/// replicação:
///
/// ```text
/// SET <key> <value...>
/// SETEX <key> <ttlSeconds> <value...>
/// DEL <key>
/// EXPIRE <key> <ttlSeconds>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Set { key: String, value: String },
    SetEx { key: String, ttl: i64, value: String },
    Del { key: String },
    Expire { key: String, ttl: i64 },
}

impl Record {
    /// Faz o parse de uma linha completa em um Record.
    pub fn parse(line: &str) -> Result<Record, CommandError> {
        let mut parse = Parse::new(line)?;
        match Record::from_parse(&mut parse)? {
            Some(record) => Ok(record),
            None => Err(CommandError::InvalidArgument(format!(
                "registro desconhecido '{}'",
                parse.command()
            ))),
        }
    }

    /// Lê os argumentos de um registro. Retorna `None` se o comando não é
    /// uma mutação registrável.
    pub(crate) fn from_parse(parse: &mut Parse<'_>) -> Result<Option<Record>, CommandError> {
        let name = parse.command().to_owned();
        let record = match name.as_str() {
            "SET" => {
                let key = parse.next_string()?;
                let value = parse.rest()?;
                Record::Set { key, value }
            }
            "SETEX" => {
                let key = parse.next_string()?;
                let ttl = parse.next_ttl()?;
                let value = parse.rest()?;
                Record::SetEx { key, ttl, value }
            }
            "DEL" => {
                let key = parse.next_string()?;
                parse.finish()?;
                Record::Del { key }
            }
            "EXPIRE" => {
                let key = parse.next_string()?;
                let ttl = parse.next_ttl()?;
                parse.finish()?;
                Record::Expire { key, ttl }
            }
            _ => return Ok(None),
        };
        Ok(Some(record))
    }

    pub fn key(&self) -> &str {
        match self {
            Record::Set { key, .. }
            | Record::SetEx { key, .. }
            | Record::Del { key }
            | Record::Expire { key, .. } => key,
        }
    }

    /// Snapshots só carregam SET e SETEX.
    pub fn is_snapshot_record(&self) -> bool {
        matches!(self, Record::Set { .. } | Record::SetEx { .. })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Set { key, value } => write!(f, "SET {key} {value}"),
            Record::SetEx { key, ttl, value } => write!(f, "SETEX {key} {ttl} {value}"),
            Record::Del { key } => write!(f, "DEL {key}"),
            Record::Expire { key, ttl } => write!(f, "EXPIRE {key} {ttl}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_set_with_spaces_in_value() {
        assert_eq!(
            Record::parse("SET greeting hello world").unwrap(),
            Record::Set {
                key: "greeting".into(),
                value: "hello world".into(),
            }
        );
    }

    #[test]
    fn parse_setex() {
        assert_eq!(
            Record::parse("setex session 30 abc").unwrap(),
            Record::SetEx {
                key: "session".into(),
                ttl: 30,
                value: "abc".into(),
            }
        );
    }

    #[test]
    fn parse_del_and_expire() {
        assert_eq!(
            Record::parse("DEL k").unwrap(),
            Record::Del { key: "k".into() }
        );
        assert_eq!(
            Record::parse("EXPIRE k 0").unwrap(),
            Record::Expire {
                key: "k".into(),
                ttl: 0,
            }
        );
    }

    #[test]
    fn incomplete_records_fail() {
        assert!(Record::parse("SET onlykey").is_err());
        assert!(Record::parse("SETEX k 10").is_err());
        assert!(Record::parse("SETEX k abc v").is_err());
        assert!(Record::parse("DEL").is_err());
        assert!(Record::parse("DEL a b").is_err());
        assert!(Record::parse("EXPIRE k").is_err());
    }

    #[test]
    fn unknown_record_fails() {
        assert!(matches!(
            Record::parse("RPUSH list a"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn display_matches_grammar() {
        let record = Record::SetEx {
            key: "k".into(),
            ttl: 5,
            value: "a b".into(),
        };
        assert_eq!(record.to_string(), "SETEX k 5 a b");
        assert_eq!(Record::parse(&record.to_string()).unwrap(), record);
    }

    #[test]
    fn snapshot_records() {
        assert!(Record::parse("SET a 1").unwrap().is_snapshot_record());
        assert!(!Record::parse("DEL a").unwrap().is_snapshot_record());
        assert_eq!(Record::parse("EXPIRE a 3").unwrap().key(), "a");
    }
}
