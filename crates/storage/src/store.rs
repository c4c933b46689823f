use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use driftkv_common::StorageError;
use driftkv_protocol::Record;

use crate::entry::{Entry, expiry_from_ttl, unix_now, unix_now_millis};

/// Snapshot pontual dos contadores, usado pelo INFO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub keys: usize,
    pub capacity: usize,
    pub evictions: u64,
    pub reads: u64,
    pub writes: u64,
}

/// Estado protegido pelo lock: mapa + limite + contadores.
#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    capacity: usize,
    evictions: u64,
    reads: u64,
    writes: u64,
}

impl State {
    fn insert(&mut self, key: String, entry: Entry) {
        if !self.entries.contains_key(&key) {
            self.ensure_capacity();
        }
        self.entries.insert(key, entry);
        self.writes += 1;
    }

    /// Abre espaço para uma chave nova despejando a entrada menos recentemente
    /// acessada. Empates ficam com a primeira encontrada na iteração do mapa.
    fn ensure_capacity(&mut self) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            self.entries.remove(&victim);
            self.evictions += 1;
            debug!("chave despejada por capacidade: {victim}");
        }
    }
}

/// Handle para o store in-memory. Clonar compartilha o mesmo estado.
///
/// Todas as mutações, inclusive `get` (que atualiza `last_access`), usam o
/// lock exclusivo. Leituras que não tocam o estado usam o lock compartilhado.
#[derive(Debug, Clone, Default)]
pub struct Store {
    shared: Arc<RwLock<State>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.shared.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.shared.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert sem expiração.
    pub fn set(&self, key: String, value: String) {
        let entry = Entry::new(value, 0, unix_now_millis());
        self.write().insert(key, entry);
    }

    /// Upsert com TTL em segundos; `ttl <= 0` grava sem expiração.
    pub fn set_with_ttl(&self, key: String, value: String, ttl: i64) {
        let entry = Entry::new(value, expiry_from_ttl(ttl, unix_now()), unix_now_millis());
        self.write().insert(key, entry);
    }

    /// Retorna o valor se a chave existe e não expirou. Entradas expiradas
    /// ficam no mapa até o sweeper ou um despejo.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = unix_now();
        let mut guard = self.write();
        let state = &mut *guard;
        state.reads += 1;
        match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.last_access = unix_now_millis();
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.write();
        if state.entries.remove(key).is_some() {
            state.writes += 1;
            true
        } else {
            false
        }
    }

    /// Redefine o TTL de uma chave viva. `ttl <= 0` torna a chave permanente.
    pub fn set_expiry(&self, key: &str, ttl: i64) -> bool {
        let now = unix_now();
        let mut guard = self.write();
        let state = &mut *guard;
        match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.expires_at = expiry_from_ttl(ttl, now);
                state.writes += 1;
                true
            }
            _ => false,
        }
    }

    /// `-2` ausente ou expirada, `-1` sem TTL, senão segundos restantes.
    pub fn ttl(&self, key: &str) -> i64 {
        let now = unix_now();
        let state = self.read();
        match state.entries.get(key) {
            None => -2,
            Some(entry) if entry.expires_at == 0 => -1,
            Some(entry) if entry.is_expired_at(now) => -2,
            Some(entry) => entry.expires_at - now,
        }
    }

    /// Soma `delta` ao valor inteiro da chave (ausente ou expirada conta como 0).
    /// O resultado é gravado sem TTL.
    pub fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StorageError> {
        let now = unix_now();
        let mut state = self.write();
        let current = match state.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => entry
                .value
                .parse::<i64>()
                .map_err(|_| StorageError::NotAnInteger)?,
            _ => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or(StorageError::NotAnInteger)?;
        state.insert(
            key.to_string(),
            Entry::new(next.to_string(), 0, unix_now_millis()),
        );
        Ok(next)
    }

    /// Remove todas as chaves expiradas. Cada remoção conta como despejo.
    pub fn cleanup_expired(&self) -> usize {
        let now = unix_now();
        let mut state = self.write();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - state.entries.len();
        state.evictions += removed as u64;
        removed
    }

    /// Define o limite de chaves (0 = ilimitado). Não despeja retroativamente.
    pub fn set_capacity(&self, capacity: usize) {
        self.write().capacity = capacity;
    }

    pub fn stats(&self) -> Stats {
        let state = self.read();
        Stats {
            keys: state.entries.len(),
            capacity: state.capacity,
            evictions: state.evictions,
            reads: state.reads,
            writes: state.writes,
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Todas as chaves do mapa, sem filtrar expiradas.
    pub fn keys(&self) -> Vec<String> {
        self.read().entries.keys().cloned().collect()
    }

    /// Um SET/SETEX por chave viva, ordenado por chave.
    ///
    /// A enumeração inteira acontece sob uma única aquisição do lock, então
    /// o resultado é consistente (embora possa ficar velho logo depois).
    pub fn dump_records(&self) -> Vec<Record> {
        let now = unix_now();
        let mut records: Vec<Record> = {
            let state = self.read();
            state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .map(|(key, entry)| {
                    if entry.expires_at == 0 {
                        Record::Set {
                            key: key.clone(),
                            value: entry.value.clone(),
                        }
                    } else {
                        // TTL 0 no replay viraria chave permanente.
                        Record::SetEx {
                            key: key.clone(),
                            ttl: (entry.expires_at - now).max(1),
                            value: entry.value.clone(),
                        }
                    }
                })
                .collect()
        };
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    /// Aplica um registro do log ou de um snapshot.
    pub fn apply(&self, record: &Record) {
        match record {
            Record::Set { key, value } => self.set(key.clone(), value.clone()),
            Record::SetEx { key, ttl, value } => {
                self.set_with_ttl(key.clone(), value.clone(), *ttl)
            }
            Record::Del { key } => {
                self.delete(key);
            }
            Record::Expire { key, ttl } => {
                self.set_expiry(key, *ttl);
            }
        }
    }

    /// Substitui o conteúdo deste store pelo de `snapshot` numa única
    /// aquisição do lock. Limite e contadores deste store são preservados.
    /// Retorna o número de chaves instaladas.
    pub fn install(&self, snapshot: Store) -> usize {
        let fresh = std::mem::take(&mut snapshot.write().entries);
        let installed = fresh.len();
        let previous = std::mem::replace(&mut self.write().entries, fresh);
        drop(previous);
        installed
    }

    #[cfg(test)]
    pub(crate) fn put_entry(&self, key: &str, entry: Entry) {
        self.write().entries.insert(key.to_string(), entry);
    }
}
