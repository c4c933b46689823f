use driftkv_common::CommandError;

/// Cursor sobre uma linha de texto para extrair argumentos sequencialmente.
///
/// O primeiro token é o nome do comando (normalizado para maiúsculas). Os
/// demais são separados por espaço; `rest()` consome o restante da linha
/// como um único argumento, preservando espaços internos.
#[derive(Debug)]
pub struct Parse<'a> {
    line: &'a str,
    pos: usize,
    command: String,
}

impl<'a> Parse<'a> {
    /// Cria um Parse a partir de uma linha. Falha se a linha não tem tokens.
    pub fn new(line: &'a str) -> Result<Parse<'a>, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parse = Parse {
            line,
            pos: 0,
            command: String::new(),
        };
        let name = parse.next_token().ok_or(CommandError::Empty)?;
        parse.command = name.to_ascii_uppercase();
        Ok(parse)
    }

    /// Nome do comando em maiúsculas.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Retorna o próximo token como String.
    pub fn next_string(&mut self) -> Result<String, CommandError> {
        self.next_token()
            .map(str::to_string)
            .ok_or_else(|| self.arity())
    }

    /// Retorna o próximo token como i64.
    pub fn next_int(&mut self) -> Result<i64, CommandError> {
        let token = self.next_token().ok_or_else(|| self.arity())?;
        token
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidArgument(format!("'{token}' não é um inteiro")))
    }

    /// Retorna o próximo token como TTL em segundos (qualquer inteiro).
    pub fn next_ttl(&mut self) -> Result<i64, CommandError> {
        let token = self.next_token().ok_or_else(|| self.arity())?;
        token
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidTtl(token.to_string()))
    }

    /// Consome o restante da linha como um único argumento obrigatório.
    pub fn rest(&mut self) -> Result<String, CommandError> {
        self.rest_opt().ok_or_else(|| self.arity())
    }

    /// Consome o restante da linha, se houver.
    pub fn rest_opt(&mut self) -> Option<String> {
        let rest = self.line[self.pos..].trim();
        self.pos = self.line.len();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    /// Verifica se todos os argumentos foram consumidos.
    pub fn finish(&self) -> Result<(), CommandError> {
        if self.has_remaining() {
            Err(self.arity())
        } else {
            Ok(())
        }
    }

    /// Verifica se ainda há argumentos restantes.
    pub fn has_remaining(&self) -> bool {
        !self.line[self.pos..].trim().is_empty()
    }

    fn arity(&self) -> CommandError {
        CommandError::WrongArity(self.command.clone())
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let line = self.line;
        let rest = &line[self.pos..];
        let start = rest.len() - rest.trim_start().len();
        let rest = &rest[start..];
        if rest.is_empty() {
            self.pos = line.len();
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.pos += start + end;
        Some(&rest[..end])
    }
}
