//! On-disk cache of validated model replies, keyed by module documentation content.

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::llm::ModelModuleReply;

pub struct ReplyCache {
    dir: PathBuf,
}

impl ReplyCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// SHA256 over the module name and its RETURN text.
    pub fn key(fqcn: &str, return_text: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fqcn.as_bytes());
        hasher.update([0u8]);
        hasher.update(return_text.unwrap_or("").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Missing or unreadable entries are misses.
    pub fn get(&self, key: &str) -> Option<ModelModuleReply> {
        let path = self.path_for(key);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(reply) => {
                debug!(path = %path.display(), "Reply cache hit");
                Some(reply)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Failures are logged and otherwise ignored.
    pub fn put(&self, key: &str, reply: &ModelModuleReply) {
        let path = self.path_for(key);
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| serde_json::to_vec_pretty(reply).map_err(std::io::Error::other))
            .and_then(|bytes| fs::write(&path, bytes));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Could not write cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply() -> ModelModuleReply {
        ModelModuleReply {
            module: "vmware.vmware.vm".into(),
            resource_type: "virtual_machine".into(),
            container: "instance".into(),
            container_type: "dict".into(),
            identifier: "moid".into(),
            jq_expression: ".instance | select(. != null) | {moid: .moid} // empty".into(),
            description: None,
            confidence: Some("high".into()),
            note: None,
        }
    }

    #[test]
    fn key_depends_on_name_and_content() {
        let a = ReplyCache::key("a.b.vm", Some("x: 1"));
        assert_eq!(a, ReplyCache::key("a.b.vm", Some("x: 1")));
        assert_ne!(a, ReplyCache::key("a.b.vm", Some("x: 2")));
        assert_ne!(a, ReplyCache::key("a.b.host", Some("x: 1")));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn stores_and_loads_replies() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReplyCache::new(dir.path().join("nested"));
        let key = ReplyCache::key("vmware.vmware.vm", None);
        assert!(cache.get(&key).is_none());
        cache.put(&key, &reply());
        assert_eq!(cache.get(&key), Some(reply()));
    }

    #[test]
    fn corrupt_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReplyCache::new(dir.path());
        fs::write(dir.path().join("abc.json"), "not json").unwrap();
        assert!(cache.get("abc").is_none());
    }
}
