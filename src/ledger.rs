// src/ledger.rs
//! Publication ledger: the persisted set of links that were confirmed sent.
//!
//! File format is a JSON array of `{link, title?, published_at}` objects. Older files
//! written as a bare array of links, or as `{enlace, titulo, fecha}` objects, are read too.
//! Reads fail soft: elements that do not parse are skipped, and a file that is not a JSON
//! array loads empty and is moved aside to `*.corrupt` before the next write. Writes go
//! through a temp file and a rename so an interrupted write never truncates the ledger.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Link(String),
    Object {
        #[serde(alias = "enlace")]
        link: String,
        #[serde(default, alias = "titulo")]
        title: Option<String>,
        #[serde(default, alias = "fecha")]
        published_at: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct PublicationLedger {
    path: Option<PathBuf>,
    entries: Vec<LedgerEntry>,
    links: HashSet<String>,
    /// Backing file exists but could not be parsed; keep it before overwriting.
    corrupt: bool,
}

impl PublicationLedger {
    /// Ledger that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. Entries older than `retention_days` are dropped when set.
    pub fn load(path: impl Into<PathBuf>, retention_days: Option<i64>) -> Self {
        let path = path.into();
        let now = Utc::now();
        let mut corrupt = false;
        let mut entries = match read_entries(&path, now) {
            Ok(v) => v,
            Err(e) => {
                corrupt = e.kind() == io::ErrorKind::InvalidData;
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "ledger unreadable; deduplication degraded for this run"
                    );
                }
                Vec::new()
            }
        };

        if let Some(days) = retention_days.filter(|d| *d > 0) {
            let cutoff = now - Duration::days(days);
            let before = entries.len();
            entries.retain(|e| e.published_at > cutoff);
            if entries.len() != before {
                tracing::debug!(pruned = before - entries.len(), "ledger retention applied");
            }
        }

        let mut ledger = Self {
            path: Some(path),
            entries: Vec::with_capacity(entries.len()),
            links: HashSet::with_capacity(entries.len()),
            corrupt,
        };
        for e in entries {
            ledger.insert(e);
        }
        ledger
    }

    /// Re-read the backing file, keeping in-memory entries the file does not have yet.
    pub fn reload(&mut self, retention_days: Option<i64>) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let pending = std::mem::take(&mut self.entries);
        *self = Self::load(path, retention_days);
        for e in pending {
            self.insert(e);
        }
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn links(&self) -> HashSet<String> {
        self.links.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `link` and persist. The in-memory set is updated even when the write fails.
    pub fn record(
        &mut self,
        link: &str,
        title: Option<&str>,
        published_at: DateTime<Utc>,
    ) -> Result<()> {
        let added = self.insert(LedgerEntry {
            link: link.to_string(),
            title: title.map(str::to_string),
            published_at,
        });
        if !added {
            return Ok(());
        }
        if self.corrupt {
            self.set_aside_corrupt();
        }
        self.persist().inspect_err(|e| {
            counter!("ledger_persist_errors_total").increment(1);
            tracing::warn!(error = %e, link, "ledger write failed; keeping in-memory entry");
        })
    }

    /// Write the full ledger atomically (temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.entries).map_err(io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Rename the unparseable backing file to `*.corrupt` so the next write does not erase it.
    fn set_aside_corrupt(&mut self) {
        let Some(path) = &self.path else {
            return;
        };
        let target = path.with_extension("json.corrupt");
        match fs::rename(path, &target) {
            Ok(()) => {
                self.corrupt = false;
                tracing::warn!(moved_to = %target.display(), "corrupt ledger moved aside");
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "could not move corrupt ledger aside")
            }
        }
    }

    fn insert(&mut self, entry: LedgerEntry) -> bool {
        if !self.links.insert(entry.link.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }
}

/// Only the link set; missing or corrupt storage yields an empty set.
pub fn load_links(path: impl AsRef<Path>) -> HashSet<String> {
    PublicationLedger::load(path.as_ref(), None).links()
}

fn read_entries(path: &Path, now: DateTime<Utc>) -> io::Result<Vec<LedgerEntry>> {
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let stored: Vec<serde_json::Value> =
        serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut entries = Vec::with_capacity(stored.len());
    for (idx, value) in stored.into_iter().enumerate() {
        let entry = match serde_json::from_value::<StoredEntry>(value) {
            Ok(StoredEntry::Link(link)) => LedgerEntry {
                link,
                title: None,
                published_at: now,
            },
            Ok(StoredEntry::Object {
                link,
                title,
                published_at,
            }) => LedgerEntry {
                link,
                title,
                published_at: published_at.as_deref().and_then(parse_ts).unwrap_or(now),
            },
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping unreadable ledger element");
                continue;
            }
        };
        if !entry.link.trim().is_empty() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_link_array_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("noticias_publicadas.json");
        fs::write(&p, r#"["https://a.example/1", "https://a.example/2"]"#).unwrap();
        let ledger = PublicationLedger::load(&p, None);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("https://a.example/2"));
    }

    #[test]
    fn legacy_objects_with_naive_dates_are_read_and_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("publicadas.json");
        let recent = (Utc::now() - Duration::days(1))
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S%.f")
            .to_string();
        fs::write(
            &p,
            format!(
                r#"[{{"titulo":"old","enlace":"https://a.example/old","fecha":"2020-01-01T10:00:00.000001"}},
                    {{"titulo":"new","enlace":"https://a.example/new","fecha":"{recent}"}}]"#
            ),
        )
        .unwrap();

        let all = PublicationLedger::load(&p, None);
        assert_eq!(all.len(), 2);

        let pruned = PublicationLedger::load(&p, Some(7));
        assert_eq!(pruned.len(), 1);
        assert!(pruned.contains("https://a.example/new"));
        assert_eq!(pruned.entries()[0].title.as_deref(), Some("new"));
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ledger.json");
        fs::write(&p, "{not json").unwrap();
        assert!(PublicationLedger::load(&p, None).is_empty());
    }

    #[test]
    fn bad_elements_are_skipped_and_history_survives_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ledger.json");
        fs::write(&p, r#"["https://a.example/1", 42, "https://a.example/2", null]"#).unwrap();

        let mut ledger = PublicationLedger::load(&p, None);
        assert_eq!(ledger.len(), 2);
        ledger.record("https://a.example/3", None, Utc::now()).unwrap();

        let again = PublicationLedger::load(&p, None);
        assert_eq!(again.len(), 3);
        assert!(again.contains("https://a.example/1"));
        assert!(again.contains("https://a.example/3"));
    }

    #[test]
    fn corrupt_file_is_moved_aside_before_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ledger.json");
        fs::write(&p, "{not json").unwrap();

        let mut ledger = PublicationLedger::load(&p, None);
        assert!(ledger.is_empty());
        // Loading alone leaves the file where it is.
        assert_eq!(fs::read_to_string(&p).unwrap(), "{not json");

        ledger.record("https://a.example/1", None, Utc::now()).unwrap();
        let kept = dir.path().join("ledger.json.corrupt");
        assert_eq!(fs::read_to_string(&kept).unwrap(), "{not json");
        assert!(PublicationLedger::load(&p, None).contains("https://a.example/1"));
    }

    #[test]
    fn duplicate_record_keeps_first_entry() {
        let mut ledger = PublicationLedger::in_memory();
        let t0 = Utc::now();
        ledger.record("https://a.example/1", Some("first"), t0).unwrap();
        ledger
            .record("https://a.example/1", Some("second"), t0 + Duration::hours(1))
            .unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn reload_merges_unpersisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ledger.json");
        fs::write(&p, r#"["https://a.example/disk"]"#).unwrap();
        let mut ledger = PublicationLedger::load(&p, None);
        ledger.insert(LedgerEntry {
            link: "https://a.example/mem".into(),
            title: None,
            published_at: Utc::now(),
        });
        ledger.reload(None);
        assert!(ledger.contains("https://a.example/disk"));
        assert!(ledger.contains("https://a.example/mem"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn write_failure_keeps_in_memory_entry() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let p = dir.path().join("ledger.json");
        fs::create_dir(&p).unwrap();
        let mut ledger = PublicationLedger::load(&p, None);
        let res = ledger.record("https://a.example/x", None, Utc::now());
        assert!(res.is_err());
        assert!(ledger.contains("https://a.example/x"));
    }
}
