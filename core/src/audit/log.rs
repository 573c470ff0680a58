use crate::audit::event::{compute_event_hash, finalize_event, AuditEvent, ZERO_HASH_64};
use crate::error::{CoreError, CoreResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

enum Backing {
    File(PathBuf),
    Memory(Vec<AuditEvent>),
}

/// Append-only, hash-chained NDJSON event log.
pub struct AuditLog {
    backing: Backing,
    last_hash: String,
}

impl AuditLog {
    pub fn open_or_create(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            File::create(&path)?;
            return Ok(Self {
                backing: Backing::File(path),
                last_hash: ZERO_HASH_64.to_string(),
            });
        }

        let events = read_events(&path)?;
        let last_hash = verify_chain(&events)?;
        Ok(Self {
            backing: Backing::File(path),
            last_hash,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(Vec::new()),
            last_hash: ZERO_HASH_64.to_string(),
        }
    }

    pub fn append(&mut self, mut event: AuditEvent) -> CoreResult<AuditEvent> {
        event.prev_event_hash = self.last_hash.clone();
        let event = finalize_event(event)?;
        match &mut self.backing {
            Backing::File(path) => {
                let line = serde_json::to_string(&event)?;
                let mut f = OpenOptions::new().append(true).open(path.as_path())?;
                f.write_all(line.as_bytes())?;
                f.write_all(b"\n")?;
            }
            Backing::Memory(events) => events.push(event.clone()),
        }
        self.last_hash = event.event_hash.clone();
        Ok(event)
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    /// All events, oldest first. Re-reads the file for a file-backed log.
    pub fn events(&self) -> CoreResult<Vec<AuditEvent>> {
        match &self.backing {
            Backing::File(path) => read_events(path),
            Backing::Memory(events) => Ok(events.clone()),
        }
    }
}

pub fn read_events(path: &Path) -> CoreResult<Vec<AuditEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AuditEvent = serde_json::from_str(&line).map_err(|e| {
            CoreError::InvalidInput(format!("audit log line {} unreadable: {}", idx + 1, e))
        })?;
        out.push(event);
    }
    Ok(out)
}

/// Checks linkage and recomputes every hash. Returns the head hash.
pub fn verify_chain(events: &[AuditEvent]) -> CoreResult<String> {
    let mut prev = ZERO_HASH_64.to_string();
    for (idx, e) in events.iter().enumerate() {
        if e.prev_event_hash != prev {
            return Err(CoreError::InvalidInput(format!(
                "audit chain broken at event {}: prev_event_hash mismatch",
                idx
            )));
        }
        if compute_event_hash(e)? != e.event_hash {
            return Err(CoreError::InvalidInput(format!(
                "audit chain broken at event {}: event_hash mismatch",
                idx
            )));
        }
        prev = e.event_hash.clone();
    }
    Ok(prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::Actor;
    use serde_json::json;

    fn blocked(run_id: &str) -> AuditEvent {
        AuditEvent::new(
            "DELIVERY_BLOCKED",
            run_id,
            Actor::Clinician,
            json!({"pending_sections": ["risks"]}),
        )
    }

    #[test]
    fn memory_log_chains_events() {
        let mut log = AuditLog::in_memory();
        let a = log.append(blocked("wr_a")).unwrap();
        let b = log.append(blocked("wr_a")).unwrap();
        assert_eq!(a.prev_event_hash, ZERO_HASH_64);
        assert_eq!(b.prev_event_hash, a.event_hash);
        assert_eq!(log.last_hash(), b.event_hash);
        assert_eq!(verify_chain(&log.events().unwrap()).unwrap(), b.event_hash);
    }

    #[test]
    fn reopened_file_log_continues_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/audit.ndjson");
        let first = {
            let mut log = AuditLog::open_or_create(&path).unwrap();
            log.append(blocked("wr_a")).unwrap()
        };
        let mut log = AuditLog::open_or_create(&path).unwrap();
        let second = log.append(blocked("wr_a")).unwrap();
        assert_eq!(second.prev_event_hash, first.event_hash);
        assert_eq!(read_events(&path).unwrap().len(), 2);
    }

    #[test]
    fn tampered_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.ndjson");
        {
            let mut log = AuditLog::open_or_create(&path).unwrap();
            log.append(blocked("wr_a")).unwrap();
        }
        let text = fs::read_to_string(&path).unwrap().replace("risks", "summary");
        fs::write(&path, text).unwrap();
        assert!(AuditLog::open_or_create(&path).is_err());
    }
}
