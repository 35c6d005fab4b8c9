//! Rendering of `event_query.yml` and the review report, and atomic file writes.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::contract::{IdentifierQuery, QueryEntry, ResourceType};
use crate::error::OutputError;
use crate::source::split_collection_name;

/// The `event_query.yml` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFile {
    pub extension_name: String,
    pub extension_version: String,
    pub description: String,
    pub queries: Vec<QueryBlock>,
}

/// One module's block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBlock {
    pub name: String,
    pub query_type: String,
    pub collection_pattern: String,
    pub resource_type: ResourceType,
    pub queries: Vec<IdentifierQuery>,
}

impl QueryFile {
    /// Entries keep their given order.
    pub fn from_entries(collection_name: &str, version: &str, entries: &[QueryEntry]) -> Self {
        let (namespace, collection) = split_collection_name(collection_name);
        QueryFile {
            extension_name: format!("{namespace}.{collection}_audit"),
            extension_version: version.to_string(),
            description: format!(
                "Indirect node counting queries for the {namespace}.{collection} collection"
            ),
            queries: entries
                .iter()
                .map(|entry| QueryBlock {
                    name: entry.display_name.clone(),
                    query_type: "jq".to_string(),
                    collection_pattern: entry.collection_pattern(),
                    resource_type: entry.resource_type,
                    queries: entry.queries.clone(),
                })
                .collect(),
        }
    }

    pub fn render(&self, path: &Path) -> Result<String, OutputError> {
        let body = serde_yaml::to_string(self).map_err(|e| OutputError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(format!("---\n{body}"))
    }
}

const REPORT_COLUMNS: [&str; 7] = [
    "module",
    "container",
    "container_type",
    "resource_type",
    "confidence",
    "signal",
    "note",
];

/// One row of the review report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub module: String,
    pub container: String,
    pub container_type: String,
    pub resource_type: String,
    pub confidence: String,
    pub signal: String,
    pub note: String,
}

/// Every decision that is not high confidence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewReport {
    pub items: Vec<ReviewItem>,
}

impl ReviewReport {
    pub fn from_entries(entries: &[QueryEntry]) -> Self {
        ReviewReport {
            items: entries
                .iter()
                .filter(|e| e.confidence.needs_review())
                .map(|e| ReviewItem {
                    module: e.fqcn.clone(),
                    container: e.container.clone(),
                    container_type: e.container_kind.to_string(),
                    resource_type: e.resource_type.to_string(),
                    confidence: e.confidence.to_string(),
                    signal: e.signal.to_string(),
                    note: e.note.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Header plus one tab-separated row per item.
    pub fn render(&self) -> String {
        let mut out = REPORT_COLUMNS.join("\t");
        out.push('\n');
        for item in &self.items {
            let cells = [
                &item.module,
                &item.container,
                &item.container_type,
                &item.resource_type,
                &item.confidence,
                &item.signal,
                &item.note,
            ];
            let row: Vec<String> = cells.iter().map(|c| cell(c)).collect();
            let _ = writeln!(out, "{}", row.join("\t"));
        }
        out
    }
}

fn cell(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Writes every file through a temp file in its destination directory and
/// renames them into place only once all of them were written. No destination
/// is touched when any write fails.
pub fn write_all_atomic(files: &[(&Path, &str)]) -> Result<(), OutputError> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, contents) in files {
        staged.push((*path, stage(path, contents)?));
    }
    for (path, tmp) in staged {
        tmp.persist(path).map_err(|e| write_error(path, e.error))?;
        debug!(path = %path.display(), "Wrote file");
    }
    Ok(())
}

fn stage(path: &Path, contents: &str) -> Result<tempfile::NamedTempFile, OutputError> {
    let dir: PathBuf = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| write_error(path, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| write_error(path, e))?;
    Ok(tmp)
}

fn write_error(path: &Path, source: std::io::Error) -> OutputError {
    error!(path = %path.display(), error = %source, "[EMIT][ERROR] Write failed");
    OutputError::Write {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Confidence, ContainerKind, InferenceSignal};
    use crate::jq;

    fn entry(module: &str, confidence: Confidence, note: Option<&str>) -> QueryEntry {
        QueryEntry {
            fqcn: format!("vmware.vmware.{module}"),
            display_name: format!("Virtual machines (vmware.vmware.{module})"),
            resource_type: ResourceType::VirtualMachine,
            container: "guests".into(),
            container_kind: ContainerKind::List,
            queries: vec![IdentifierQuery {
                name: "moid".into(),
                description: "Canonical moid".into(),
                jq_expression: jq::list_accessor("guests", "moid", "moid"),
            }],
            confidence,
            signal: InferenceSignal::DeclaredType,
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn renders_schema_with_escaped_pattern() {
        let file = QueryFile::from_entries(
            "vmware.vmware",
            "1.2.0",
            &[entry("guest_info", Confidence::High, None)],
        );
        let text = file.render(Path::new("event_query.yml")).unwrap();
        assert!(text.starts_with("---\n"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed["extension_name"].as_str(), Some("vmware.vmware_audit"));
        assert_eq!(parsed["extension_version"].as_str(), Some("1.2.0"));
        let block = &parsed["queries"][0];
        assert_eq!(block["query_type"].as_str(), Some("jq"));
        assert_eq!(block["resource_type"].as_str(), Some("virtual_machine"));
        assert_eq!(
            block["collection_pattern"].as_str(),
            Some(r"^vmware\.vmware\.guest_info$")
        );
        assert_eq!(
            block["queries"][0]["jq_expression"].as_str(),
            Some(".guests[] | {moid: .moid} // empty")
        );

        let round: QueryFile = serde_yaml::from_str(&text).unwrap();
        assert_eq!(round, file);
    }

    #[test]
    fn single_word_collection_names_double_up() {
        let file = QueryFile::from_entries("standalone", "1.0.0", &[]);
        assert_eq!(file.extension_name, "standalone.standalone_audit");
    }

    #[test]
    fn report_lists_only_reviewable_entries() {
        let report = ReviewReport::from_entries(&[
            entry("a", Confidence::High, None),
            entry("b", Confidence::Fallback, Some("no RETURN\tblock")),
            entry("c", Confidence::Medium, None),
        ]);
        assert_eq!(report.len(), 2);
        let text = report.render();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], REPORT_COLUMNS.join("\t"));
        assert_eq!(
            lines[1],
            "vmware.vmware.b\tguests\tlist\tvirtual_machine\tfallback\tdeclared_type\tno RETURN block"
        );
        assert!(lines[2].starts_with("vmware.vmware.c\t"));
        assert_eq!(lines[2].split('\t').count(), REPORT_COLUMNS.len());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yml");
        write_all_atomic(&[(path.as_path(), "one")]).unwrap();
        write_all_atomic(&[(path.as_path(), "two")]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_an_output_error_naming_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.yml");
        let err = write_all_atomic(&[(path.as_path(), "x")]).unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(!path.exists());
    }

    #[test]
    fn failed_write_leaves_every_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("event_query.yml");
        std::fs::write(&first, "old").unwrap();
        let second = dir.path().join("missing").join("review.txt");

        assert!(write_all_atomic(&[(first.as_path(), "new"), (second.as_path(), "report")]).is_err());
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "old");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
