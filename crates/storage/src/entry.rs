use std::time::{SystemTime, UNIX_EPOCH};

/// Segundos desde a epoch (base de `expires_at`).
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Milissegundos desde a epoch (base de `last_access`).
pub(crate) fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Converte um TTL relativo em instante absoluto. `ttl <= 0` significa sem expiração.
pub(crate) fn expiry_from_ttl(ttl: i64, now: i64) -> i64 {
    if ttl > 0 { now.saturating_add(ttl) } else { 0 }
}

/// Entrada no store: valor + expiração absoluta (0 = nunca) + último acesso.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: String,
    pub expires_at: i64,
    pub last_access: u64,
}

impl Entry {
    pub fn new(value: String, expires_at: i64, last_access: u64) -> Self {
        Self {
            value,
            expires_at,
            last_access,
        }
    }

    /// Predicado único de expiração: usado pela leitura lazy, pelo TTL,
    /// pelo dump e pelo sweeper.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at != 0 && self.expires_at < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_never_expires() {
        let entry = Entry::new("v".into(), 0, 0);
        assert!(!entry.is_expired_at(i64::MAX));
    }

    #[test]
    fn expires_strictly_after_deadline() {
        let entry = Entry::new("v".into(), 100, 0);
        assert!(!entry.is_expired_at(99));
        assert!(!entry.is_expired_at(100));
        assert!(entry.is_expired_at(101));
    }

    #[test]
    fn ttl_conversion() {
        assert_eq!(expiry_from_ttl(10, 1_000), 1_010);
        assert_eq!(expiry_from_ttl(0, 1_000), 0);
        assert_eq!(expiry_from_ttl(-5, 1_000), 0);
    }
}
