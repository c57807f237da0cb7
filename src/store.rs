use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{collections::BTreeSet, path::Path};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid memory document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// State carried between runs: links already posted and the index of the
/// affiliate tag to use next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayMemory {
    pub links: BTreeSet<String>,
    pub last_index: usize,
}

/// Accepted on-disk shapes. Early versions wrote a bare array of links.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredMemory {
    Legacy(Vec<String>),
    Current {
        #[serde(default)]
        links: Vec<String>,
        #[serde(default, deserialize_with = "lenient_index")]
        last_index: usize,
    },
}

/// Negative, fractional or non-numeric indexes read as 0.
fn lenient_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|index| usize::try_from(index).ok())
        .unwrap_or(0))
}

#[derive(Serialize)]
struct StoredMemoryRef<'a> {
    links: &'a BTreeSet<String>,
    last_index: usize,
}

impl RelayMemory {
    /// Loads the memory document, falling back to an empty memory when the
    /// file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(memory) => memory,
            Err(err) => {
                debug!(
                    target = "relay.store",
                    path = %path.display(),
                    error = %err,
                    "starting with empty memory"
                );
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, StoreError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, StoreError> {
        let memory = match serde_json::from_str::<StoredMemory>(data)? {
            StoredMemory::Legacy(links) => Self {
                links: links.into_iter().collect(),
                last_index: 0,
            },
            StoredMemory::Current { links, last_index } => Self {
                links: links.into_iter().collect(),
                last_index,
            },
        };
        Ok(memory)
    }

    /// Overwrites the document in the current object shape. Not atomic.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let doc = StoredMemoryRef {
            links: &self.links,
            last_index: self.last_index,
        };
        write_json(path, &doc)
    }

    /// Overwrites the document as a bare array of links, the shape used when
    /// there is no tag rotation to remember. Not atomic.
    pub fn save_links(&self, path: &Path) -> Result<(), StoreError> {
        write_json(path, &self.links)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.links.contains(url)
    }

    pub fn record(&mut self, url: impl Into<String>) {
        self.links.insert(url.into());
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, doc: &T) -> Result<(), StoreError> {
    let data = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LINK_A: &str = "https://www.amazon.in/Widget/dp/B0AAAAAAAA";
    const LINK_B: &str = "https://www.amazon.in/Gadget/dp/B0BBBBBBBB";

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posted_links.json");
        let mut memory = RelayMemory::default();
        memory.record(LINK_A);
        memory.record(LINK_B);
        memory.last_index = 1;

        memory.save(&path).unwrap();
        let loaded = RelayMemory::try_load(&path).unwrap();
        assert_eq!(loaded, memory);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["last_index"], serde_json::json!(1));
        assert_eq!(raw["links"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn legacy_array_defaults_index_to_zero() {
        let data = format!(r#"["{LINK_A}", "{LINK_B}", "{LINK_A}"]"#);
        let memory = RelayMemory::from_json(&data).unwrap();
        assert_eq!(memory.links.len(), 2);
        assert!(memory.contains(LINK_A));
        assert_eq!(memory.last_index, 0);
    }

    #[test]
    fn object_without_index_defaults_to_zero() {
        let data = format!(r#"{{"links": ["{LINK_A}"]}}"#);
        let memory = RelayMemory::from_json(&data).unwrap();
        assert!(memory.contains(LINK_A));
        assert_eq!(memory.last_index, 0);
    }

    #[test]
    fn bad_index_keeps_links() {
        for index in ["-1", "1.5", "\"one\"", "null"] {
            let data = format!(r#"{{"links": ["{LINK_A}"], "last_index": {index}}}"#);
            let memory = RelayMemory::from_json(&data).unwrap();
            assert!(memory.contains(LINK_A), "{index}");
            assert_eq!(memory.last_index, 0, "{index}");
        }
    }

    #[test]
    fn links_only_document_is_a_bare_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posted_links.json");
        let mut memory = RelayMemory::default();
        memory.record(LINK_B);
        memory.record(LINK_A);

        memory.save_links(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!([LINK_B, LINK_A]));
        assert_eq!(RelayMemory::try_load(&path).unwrap(), memory);
    }

    #[test]
    fn missing_or_malformed_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(RelayMemory::load(&missing), RelayMemory::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(RelayMemory::load(&broken), RelayMemory::default());
        assert!(matches!(
            RelayMemory::try_load(&broken),
            Err(StoreError::Parse(_))
        ));

        let wrong_type = dir.path().join("number.json");
        std::fs::write(&wrong_type, "42").unwrap();
        assert_eq!(RelayMemory::load(&wrong_type), RelayMemory::default());
    }
}
