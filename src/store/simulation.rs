//! Simulation store: an in-memory keyspace with fault injection.
//!
//! Mirrors the Redis reply semantics the collector depends on (missing keys,
//! WRONGTYPE, negative LRANGE indexes, LPUSH-at-head) and can be told to fail
//! specific commands to exercise the fatal error path.

use super::{Store, StoreError, StoreResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
    SortedSet(BTreeMap<String, f64>),
}

/// A command the collector sent, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    pub command: &'static str,
    pub key: String,
}

#[derive(Debug, Clone)]
struct Fault {
    command: String,
    key: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    keyspace: HashMap<String, Entry>,
    faults: Vec<Fault>,
    issued: Vec<IssuedCommand>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.keyspace
            .insert(key.to_string(), Entry::Str(value.into()));
        self
    }

    pub fn hset(&mut self, key: &str, field: &str, value: impl Into<String>) -> &mut Self {
        let entry = self
            .keyspace
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        if let Entry::Hash(hash) = entry {
            hash.insert(field.to_string(), value.into());
        } else {
            *entry = Entry::Hash(HashMap::from([(field.to_string(), value.into())]));
        }
        self
    }

    pub fn sadd(&mut self, key: &str, member: impl Into<String>) -> &mut Self {
        let entry = self
            .keyspace
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        if let Entry::Set(set) = entry {
            set.insert(member.into());
        } else {
            *entry = Entry::Set(BTreeSet::from([member.into()]));
        }
        self
    }

    /// Insert at the head, as Sidekiq's client does when enqueuing
    pub fn lpush(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.list_mut(key).push_front(value.into());
        self
    }

    pub fn rpush(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.list_mut(key).push_back(value.into());
        self
    }

    pub fn zadd(&mut self, key: &str, member: impl Into<String>, score: f64) -> &mut Self {
        let entry = self
            .keyspace
            .entry(key.to_string())
            .or_insert_with(|| Entry::SortedSet(BTreeMap::new()));
        if let Entry::SortedSet(zset) = entry {
            zset.insert(member.into(), score);
        } else {
            *entry = Entry::SortedSet(BTreeMap::from([(member.into(), score)]));
        }
        self
    }

    pub fn del(&mut self, key: &str) -> &mut Self {
        self.keyspace.remove(key);
        self
    }

    fn list_mut(&mut self, key: &str) -> &mut VecDeque<String> {
        let entry = self
            .keyspace
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        if !matches!(entry, Entry::List(_)) {
            *entry = Entry::List(VecDeque::new());
        }
        match entry {
            Entry::List(list) => list,
            _ => unreachable!("entry was just replaced with a list"),
        }
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Every call of `command` fails with a connection error
    pub fn fail_command(&mut self, command: &str) -> &mut Self {
        self.faults.push(Fault {
            command: command.to_ascii_uppercase(),
            key: None,
        });
        self
    }

    /// Calls of `command` against `key` fail with a connection error
    pub fn fail_key(&mut self, command: &str, key: &str) -> &mut Self {
        self.faults.push(Fault {
            command: command.to_ascii_uppercase(),
            key: Some(key.to_string()),
        });
        self
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn issued(&self) -> &[IssuedCommand] {
        &self.issued
    }

    pub fn issued_keys(&self, command: &str) -> Vec<&str> {
        self.issued
            .iter()
            .filter(|c| c.command.eq_ignore_ascii_case(command))
            .map(|c| c.key.as_str())
            .collect()
    }

    fn record(&mut self, command: &'static str, key: &str) -> StoreResult<()> {
        self.issued.push(IssuedCommand {
            command,
            key: key.to_string(),
        });

        let injected = self.faults.iter().any(|fault| {
            fault.command == command && fault.key.as_deref().map_or(true, |k| k == key)
        });
        if injected {
            return Err(StoreError::Connection(format!(
                "injected fault on {} {}",
                command, key
            )));
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&Entry> {
        self.keyspace.get(key)
    }
}

fn wrong_type() -> StoreError {
    StoreError::Protocol(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    )
}

/// Resolve Redis LRANGE bounds against a list of `len` items.
fn range_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl Store for InMemoryStore {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.record("GET", key)?;
        match self.lookup(key) {
            None => Ok(None),
            Some(Entry::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type()),
        }
    }

    fn zcard(&mut self, key: &str) -> StoreResult<u64> {
        self.record("ZCARD", key)?;
        match self.lookup(key) {
            None => Ok(0),
            Some(Entry::SortedSet(zset)) => Ok(zset.len() as u64),
            Some(_) => Err(wrong_type()),
        }
    }

    fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>> {
        self.record("SMEMBERS", key)?;
        match self.lookup(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.record("HGET", key)?;
        match self.lookup(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type()),
        }
    }

    fn llen(&mut self, key: &str) -> StoreResult<u64> {
        self.record("LLEN", key)?;
        match self.lookup(key) {
            None => Ok(0),
            Some(Entry::List(list)) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type()),
        }
    }

    fn lrange(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.record("LRANGE", key)?;
        match self.lookup(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(list)) => Ok(match range_bounds(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(wrong_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys() {
        let mut store = InMemoryStore::new();
        assert_eq!(store.get("nope").unwrap(), None);
        assert_eq!(store.hget("nope", "busy").unwrap(), None);
        assert_eq!(store.zcard("nope").unwrap(), 0);
        assert_eq!(store.llen("nope").unwrap(), 0);
        assert!(store.smembers("nope").unwrap().is_empty());
        assert!(store.lrange("nope", -1, -1).unwrap().is_empty());
    }

    #[test]
    fn test_lpush_tail_is_oldest() {
        let mut store = InMemoryStore::new();
        store.lpush("q", "first").lpush("q", "second").lpush("q", "third");

        assert_eq!(store.lrange("q", -1, -1).unwrap(), vec!["first"]);
        assert_eq!(store.lrange("q", 0, 0).unwrap(), vec!["third"]);
        assert_eq!(
            store.lrange("q", 0, -1).unwrap(),
            vec!["third", "second", "first"]
        );
        assert_eq!(store.llen("q").unwrap(), 3);
    }

    #[test]
    fn test_lrange_bounds() {
        assert_eq!(range_bounds(0, -1, -1), None);
        assert_eq!(range_bounds(3, -1, -1), Some((2, 2)));
        assert_eq!(range_bounds(3, -10, 100), Some((0, 2)));
        assert_eq!(range_bounds(3, 2, 1), None);
        assert_eq!(range_bounds(3, 5, 7), None);
        assert_eq!(range_bounds(3, 0, -4), None);
    }

    #[test]
    fn test_wrong_type_is_protocol_error() {
        let mut store = InMemoryStore::new();
        store.sadd("queues", "default");
        assert!(matches!(store.get("queues"), Err(StoreError::Protocol(_))));
        assert!(matches!(store.llen("queues"), Err(StoreError::Protocol(_))));
    }

    #[test]
    fn test_fail_command_and_key() {
        let mut store = InMemoryStore::new();
        store.set("a", "1").set("b", "2").fail_key("GET", "b");

        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert!(matches!(store.get("b"), Err(StoreError::Connection(_))));

        store.clear_faults();
        store.fail_command("zcard");
        assert!(store.get("b").is_ok());
        assert!(matches!(store.zcard("a"), Err(StoreError::Connection(_))));
    }

    #[test]
    fn test_issued_commands_recorded() {
        let mut store = InMemoryStore::new();
        store.hset("p1", "busy", "2");
        let _ = store.hget("p1", "busy");
        let _ = store.zcard("retry");

        assert_eq!(
            store.issued(),
            &[
                IssuedCommand { command: "HGET", key: "p1".to_string() },
                IssuedCommand { command: "ZCARD", key: "retry".to_string() },
            ]
        );
        assert_eq!(store.issued_keys("zcard"), vec!["retry"]);
    }
}
