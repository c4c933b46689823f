//! Linhas de sessão que não são dados: saudação, prompt e sentinela.

/// Saudação enviada pelo primário ao aceitar uma conexão.
pub const GREETING: &[&str] = &["+OK driftkv ready", "Type HELP for commands."];

/// Saudação enviada pela réplica.
pub const REPLICA_GREETING: &[&str] = &["+OK driftkv replica (read-only)"];

/// Resposta da réplica para comandos fora do subconjunto de leitura.
pub const READONLY_REPLY: &str = "READONLY replica: only GET/INFO/QUIT allowed";

/// Marca o fim de um DUMPALL.
pub const SNAPSHOT_SENTINEL: &str = ".";

const PROMPT: &str = ">";

/// Linhas de saudação/prompt que um cliente de sincronização deve ignorar.
pub fn is_banner(line: &str) -> bool {
    line.starts_with("+OK")
        || line.starts_with("Supports ")
        || line.starts_with("Type HELP")
        || line == PROMPT
}

/// Remove um prompt `> ` colado no início da linha.
pub fn strip_prompt(line: &str) -> &str {
    match line.strip_prefix(PROMPT) {
        Some(rest) if rest.starts_with(' ') => rest.trim_start(),
        _ => line,
    }
}
