//! Sidekiq Redis Key Layout
//!
//! Every key Sidekiq writes lives under an optional namespace
//! (`redis-namespace` in Ruby land). All lookups go through [`resolve`] so the
//! namespace is applied the same way to top-level and per-member keys.

pub const PROCESSED: &str = "stat:processed";
pub const FAILED: &str = "stat:failed";
pub const PROCESSES: &str = "processes";
pub const QUEUES: &str = "queues";
pub const SCHEDULE: &str = "schedule";
pub const RETRY: &str = "retry";
pub const DEAD: &str = "dead";

/// Prefix of the list holding one queue's jobs (`queue:<name>`).
pub const QUEUE_PREFIX: &str = "queue:";

/// Hash field holding the number of jobs a process is working on.
pub const BUSY_FIELD: &str = "busy";

/// Apply `namespace` to a logical key.
pub fn resolve(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

/// Key namer bound to one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamer {
    namespace: String,
}

impl KeyNamer {
    pub fn new(namespace: impl Into<String>) -> Self {
        KeyNamer {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resolve(&self, key: &str) -> String {
        resolve(&self.namespace, key)
    }

    pub fn processed(&self) -> String {
        self.resolve(PROCESSED)
    }

    pub fn failed(&self) -> String {
        self.resolve(FAILED)
    }

    pub fn processes(&self) -> String {
        self.resolve(PROCESSES)
    }

    /// Hash holding one process's status. Process identifiers are stored
    /// bare in the `processes` set, so the namespace is added here.
    pub fn process(&self, identity: &str) -> String {
        self.resolve(identity)
    }

    pub fn queues(&self) -> String {
        self.resolve(QUEUES)
    }

    /// List backing a queue: `ns:queue:<name>`, never `queue:ns:<name>`.
    pub fn queue(&self, name: &str) -> String {
        let mut key = self.resolve(QUEUE_PREFIX);
        key.push_str(name);
        key
    }

    pub fn schedule(&self) -> String {
        self.resolve(SCHEDULE)
    }

    pub fn retry(&self) -> String {
        self.resolve(RETRY)
    }

    pub fn dead(&self) -> String {
        self.resolve(DEAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_namespace() {
        for key in ["stat:processed", "queues", "", "queue:default"] {
            assert_eq!(resolve("", key), key);
        }
    }

    #[test]
    fn test_resolve_with_namespace() {
        for ns in ["app", "staging:app", "x"] {
            assert_eq!(resolve(ns, "retry"), format!("{}:retry", ns));
        }
        assert_eq!(resolve("app", ""), "app:");
    }

    #[test]
    fn test_composed_keys_namespace_first() {
        let keys = KeyNamer::new("app");
        assert_eq!(keys.queue("default"), "app:queue:default");
        assert_eq!(keys.process("host:1234:abcd"), "app:host:1234:abcd");
        assert_eq!(keys.processed(), "app:stat:processed");
        assert_eq!(keys.dead(), "app:dead");
    }

    #[test]
    fn test_composed_keys_empty_namespace() {
        let keys = KeyNamer::default();
        assert_eq!(keys.queue("low"), "queue:low");
        assert_eq!(keys.process("worker-1"), "worker-1");
        assert_eq!(keys.schedule(), "schedule");
    }
}
