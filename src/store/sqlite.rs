//! SQLite Store
//!
//! Durable backend. All multi-row units of work run inside real SQLite
//! transactions; conditional updates are plain `WHERE status = ?` guards,
//! so concurrent writers serialize on the database instead of on us.
//!
//! Nested payloads (infrastructure, capture, custody, ...) are stored as
//! JSON text columns; everything queried on is a first-class column.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::evidence::types::{AiEvidenceAnalysis, EvidenceJob, EvidenceSnapshot};
use crate::external::TimestampProof;
use crate::feedback::recorder::{LearningPattern, PatternKey, PatternOutcome};
use crate::lifecycle::types::{
    Actor, InfringementRecord, InfringementStatus, StatusTransition, TriggeredBy,
};
use crate::enforcement::types::{ActionStatus, ActionType, EnforcementAction};

use super::{Store, TransitionUpdate};

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS infringements (
    id                    TEXT PRIMARY KEY,
    product_id            TEXT NOT NULL,
    source_url            TEXT NOT NULL,
    platform              TEXT NOT NULL,
    status                TEXT NOT NULL,
    priority              TEXT NOT NULL,
    severity_score        INTEGER NOT NULL,
    match_confidence      REAL NOT NULL,
    audience_count        INTEGER NOT NULL,
    monetization_detected INTEGER NOT NULL,
    infrastructure        TEXT NOT NULL,
    raw_matches           TEXT NOT NULL,
    first_seen_at         TEXT NOT NULL,
    last_seen_at          TEXT NOT NULL,
    next_check_at         TEXT NOT NULL,
    previous_status       TEXT,
    status_changed_at     TEXT,
    verified_by_user_id   TEXT,
    verified_at           TEXT,
    evidence_snapshot_id  TEXT
);

CREATE TABLE IF NOT EXISTS status_transitions (
    id              TEXT PRIMARY KEY,
    infringement_id TEXT NOT NULL,
    from_status     TEXT NOT NULL,
    to_status       TEXT NOT NULL,
    reason          TEXT NOT NULL,
    triggered_by    TEXT NOT NULL,
    metadata        TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transitions_infringement
    ON status_transitions (infringement_id, created_at);

CREATE TABLE IF NOT EXISTS product_whitelist (
    product_id TEXT NOT NULL,
    url        TEXT NOT NULL,
    added_at   TEXT NOT NULL,
    PRIMARY KEY (product_id, url)
);

CREATE TABLE IF NOT EXISTS evidence_snapshots (
    id              TEXT PRIMARY KEY,
    infringement_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    content_hash    TEXT NOT NULL,
    page_capture    TEXT,
    timestamp_proof TEXT,
    attestation     TEXT NOT NULL,
    chain_of_custody TEXT NOT NULL,
    ai_analysis     TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evidence_jobs (
    id              TEXT PRIMARY KEY,
    infringement_id TEXT NOT NULL,
    actor           TEXT NOT NULL,
    requested_at    TEXT NOT NULL,
    attempts        INTEGER NOT NULL DEFAULT 0,
    state           TEXT NOT NULL DEFAULT 'queued',
    last_error      TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_state ON evidence_jobs (state, requested_at);

CREATE TABLE IF NOT EXISTS enforcement_actions (
    id              TEXT PRIMARY KEY,
    infringement_id TEXT NOT NULL,
    action_type     TEXT NOT NULL,
    escalation_step INTEGER NOT NULL,
    status          TEXT NOT NULL,
    target_entity   TEXT NOT NULL,
    target_contact  TEXT,
    deadline_at     TEXT,
    sent_at         TEXT,
    resolved_at     TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_actions_deadline ON enforcement_actions (status, deadline_at);

CREATE TABLE IF NOT EXISTS learning_patterns (
    pattern_type     TEXT NOT NULL,
    pattern_value    TEXT NOT NULL,
    product_id       TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    occurrences      INTEGER NOT NULL,
    verified_count   INTEGER NOT NULL,
    PRIMARY KEY (pattern_type, pattern_value, product_id)
);
"#;

// ============================================================================
// HELPERS
// ============================================================================

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend { message: e.to_string() }
    }
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization { message: format!("bad timestamp '{}': {}", s, e) })
}

fn parse_opt_ts(s: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(parse_ts).transpose()
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s)
        .map_err(|e| StoreError::Serialization { message: format!("bad uuid '{}': {}", s, e) })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Serialization { message: e.to_string() })
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization { message: e.to_string() })
}

fn parse_status(s: &str) -> Result<InfringementStatus, StoreError> {
    InfringementStatus::parse(s)
        .ok_or(StoreError::Serialization { message: format!("unknown status '{}'", s) })
}

/// Raw primitive row for `infringements`, converted after fetch
struct InfringementRow {
    id: String,
    product_id: String,
    source_url: String,
    platform: String,
    status: String,
    priority: String,
    severity_score: i64,
    match_confidence: f64,
    audience_count: i64,
    monetization_detected: bool,
    infrastructure: String,
    raw_matches: String,
    first_seen_at: String,
    last_seen_at: String,
    next_check_at: String,
    previous_status: Option<String>,
    status_changed_at: Option<String>,
    verified_by_user_id: Option<String>,
    verified_at: Option<String>,
    evidence_snapshot_id: Option<String>,
}

const INFRINGEMENT_COLUMNS: &str = "id, product_id, source_url, platform, status, priority, \
     severity_score, match_confidence, audience_count, monetization_detected, infrastructure, \
     raw_matches, first_seen_at, last_seen_at, next_check_at, previous_status, status_changed_at, \
     verified_by_user_id, verified_at, evidence_snapshot_id";

fn read_infringement_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InfringementRow> {
    Ok(InfringementRow {
        id: row.get(0)?,
        product_id: row.get(1)?,
        source_url: row.get(2)?,
        platform: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        severity_score: row.get(6)?,
        match_confidence: row.get(7)?,
        audience_count: row.get(8)?,
        monetization_detected: row.get(9)?,
        infrastructure: row.get(10)?,
        raw_matches: row.get(11)?,
        first_seen_at: row.get(12)?,
        last_seen_at: row.get(13)?,
        next_check_at: row.get(14)?,
        previous_status: row.get(15)?,
        status_changed_at: row.get(16)?,
        verified_by_user_id: row.get(17)?,
        verified_at: row.get(18)?,
        evidence_snapshot_id: row.get(19)?,
    })
}

impl InfringementRow {
    fn into_record(self) -> Result<InfringementRecord, StoreError> {
        Ok(InfringementRecord {
            id: parse_uuid(&self.id)?,
            product_id: parse_uuid(&self.product_id)?,
            source_url: self.source_url,
            platform: self.platform,
            status: parse_status(&self.status)?,
            priority: crate::scoring::Priority::parse(&self.priority).ok_or(
                StoreError::Serialization { message: format!("unknown priority '{}'", self.priority) },
            )?,
            severity_score: self.severity_score as u32,
            match_confidence: self.match_confidence,
            audience_count: self.audience_count as u64,
            monetization_detected: self.monetization_detected,
            infrastructure: from_json(&self.infrastructure)?,
            raw_matches: from_json(&self.raw_matches)?,
            first_seen_at: parse_ts(&self.first_seen_at)?,
            last_seen_at: parse_ts(&self.last_seen_at)?,
            next_check_at: parse_ts(&self.next_check_at)?,
            previous_status: match self.previous_status.as_deref() {
                Some(s) => Some(parse_status(s)?),
                None => None,
            },
            status_changed_at: parse_opt_ts(self.status_changed_at.as_deref())?,
            verified_by_user_id: self
                .verified_by_user_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
            verified_at: parse_opt_ts(self.verified_at.as_deref())?,
            evidence_snapshot_id: self
                .evidence_snapshot_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
        })
    }
}

struct ActionRow {
    id: String,
    infringement_id: String,
    action_type: String,
    escalation_step: i64,
    status: String,
    target_entity: String,
    target_contact: Option<String>,
    deadline_at: Option<String>,
    sent_at: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

const ACTION_COLUMNS: &str = "id, infringement_id, action_type, escalation_step, status, \
     target_entity, target_contact, deadline_at, sent_at, resolved_at, created_at";

fn read_action_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRow> {
    Ok(ActionRow {
        id: row.get(0)?,
        infringement_id: row.get(1)?,
        action_type: row.get(2)?,
        escalation_step: row.get(3)?,
        status: row.get(4)?,
        target_entity: row.get(5)?,
        target_contact: row.get(6)?,
        deadline_at: row.get(7)?,
        sent_at: row.get(8)?,
        resolved_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl ActionRow {
    fn into_action(self) -> Result<EnforcementAction, StoreError> {
        Ok(EnforcementAction {
            id: parse_uuid(&self.id)?,
            infringement_id: parse_uuid(&self.infringement_id)?,
            action_type: ActionType::parse(&self.action_type).ok_or(StoreError::Serialization {
                message: format!("unknown action type '{}'", self.action_type),
            })?,
            escalation_step: self.escalation_step as u32,
            status: ActionStatus::parse(&self.status).ok_or(StoreError::Serialization {
                message: format!("unknown action status '{}'", self.status),
            })?,
            target_entity: self.target_entity,
            target_contact: self.target_contact,
            deadline_at: parse_opt_ts(self.deadline_at.as_deref())?,
            sent_at: parse_opt_ts(self.sent_at.as_deref())?,
            resolved_at: parse_opt_ts(self.resolved_at.as_deref())?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory database. Used by tests; behaves identically to
    /// the file-backed store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn insert_action_tx(
        tx: &rusqlite::Transaction<'_>,
        action: &EnforcementAction,
    ) -> Result<bool, StoreError> {
        let duplicates: i64 = tx.query_row(
            "SELECT COUNT(*) FROM enforcement_actions
             WHERE infringement_id = ?1 AND action_type = ?2
               AND status NOT IN ('removed', 'no_response', 'failed')",
            params![action.infringement_id.to_string(), action.action_type.as_str()],
            |row| row.get(0),
        )?;
        if duplicates > 0 {
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO enforcement_actions
             (id, infringement_id, action_type, escalation_step, status, target_entity,
              target_contact, deadline_at, sent_at, resolved_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                action.id.to_string(),
                action.infringement_id.to_string(),
                action.action_type.as_str(),
                action.escalation_step,
                action.status.as_str(),
                action.target_entity,
                action.target_contact,
                action.deadline_at.map(ts),
                action.sent_at.map(ts),
                action.resolved_at.map(ts),
                ts(action.created_at),
            ],
        )?;
        Ok(true)
    }
}

impl Store for SqliteStore {
    fn insert_infringement(&self, record: &InfringementRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO infringements
             (id, product_id, source_url, platform, status, priority, severity_score,
              match_confidence, audience_count, monetization_detected, infrastructure,
              raw_matches, first_seen_at, last_seen_at, next_check_at, previous_status,
              status_changed_at, verified_by_user_id, verified_at, evidence_snapshot_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19, ?20)",
            params![
                record.id.to_string(),
                record.product_id.to_string(),
                record.source_url,
                record.platform,
                record.status.as_str(),
                record.priority.as_str(),
                record.severity_score,
                record.match_confidence,
                record.audience_count as i64,
                record.monetization_detected,
                to_json(&record.infrastructure)?,
                to_json(&record.raw_matches)?,
                ts(record.first_seen_at),
                ts(record.last_seen_at),
                ts(record.next_check_at),
                record.previous_status.map(|s| s.as_str()),
                record.status_changed_at.map(ts),
                record.verified_by_user_id.map(|u| u.to_string()),
                record.verified_at.map(ts),
                record.evidence_snapshot_id.map(|u| u.to_string()),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Duplicate {
                entity: "infringement".to_string(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    fn get_infringement(&self, id: Uuid) -> Result<InfringementRecord, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM infringements WHERE id = ?1", INFRINGEMENT_COLUMNS),
                params![id.to_string()],
                read_infringement_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound { entity: "infringement".to_string(), id: id.to_string() })?;
        row.into_record()
    }

    fn commit_transition(
        &self,
        update: &TransitionUpdate,
        audit: &StatusTransition,
        job: Option<&EvidenceJob>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE infringements
             SET previous_status = status,
                 status = ?1,
                 status_changed_at = ?2,
                 verified_by_user_id = COALESCE(?3, verified_by_user_id),
                 verified_at = CASE WHEN ?3 IS NULL THEN verified_at ELSE ?2 END
             WHERE id = ?4 AND status = ?5",
            params![
                update.new_status.as_str(),
                ts(update.changed_at),
                update.verified_by.map(|u| u.to_string()),
                audit.infringement_id.to_string(),
                update.expected_status.as_str(),
            ],
        )?;

        if updated == 0 {
            let actual: Option<String> = tx
                .query_row(
                    "SELECT status FROM infringements WHERE id = ?1",
                    params![audit.infringement_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            return match actual {
                Some(actual) => Err(StoreError::Conflict {
                    expected: update.expected_status.to_string(),
                    actual,
                }),
                None => Err(StoreError::NotFound {
                    entity: "infringement".to_string(),
                    id: audit.infringement_id.to_string(),
                }),
            };
        }

        tx.execute(
            "INSERT INTO status_transitions
             (id, infringement_id, from_status, to_status, reason, triggered_by, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                audit.id.to_string(),
                audit.infringement_id.to_string(),
                audit.from_status.as_str(),
                audit.to_status.as_str(),
                audit.reason,
                audit.triggered_by.as_str(),
                to_json(&audit.metadata)?,
                ts(audit.created_at),
            ],
        )?;

        if let Some((product_id, url)) = &update.whitelist_url {
            tx.execute(
                "INSERT OR IGNORE INTO product_whitelist (product_id, url, added_at)
                 VALUES (?1, ?2, ?3)",
                params![product_id.to_string(), url, ts(update.changed_at)],
            )?;
        }

        if let Some(job) = job {
            tx.execute(
                "INSERT INTO evidence_jobs (id, infringement_id, actor, requested_at, attempts, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'queued')",
                params![
                    job.id.to_string(),
                    job.infringement_id.to_string(),
                    to_json(&job.actor)?,
                    ts(job.requested_at),
                    job.attempts,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_transitions(&self, infringement_id: Uuid) -> Result<Vec<StatusTransition>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, infringement_id, from_status, to_status, reason, triggered_by, metadata, created_at
             FROM status_transitions WHERE infringement_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![infringement_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut transitions = Vec::new();
        for row in rows {
            let (id, infr, from, to, reason, trig, metadata, created) = row?;
            transitions.push(StatusTransition {
                id: parse_uuid(&id)?,
                infringement_id: parse_uuid(&infr)?,
                from_status: parse_status(&from)?,
                to_status: parse_status(&to)?,
                reason,
                triggered_by: if trig == "system" { TriggeredBy::System } else { TriggeredBy::User },
                metadata: from_json(&metadata)?,
                created_at: parse_ts(&created)?,
            });
        }
        Ok(transitions)
    }

    fn set_next_check(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE infringements SET next_check_at = ?1 WHERE id = ?2",
            params![ts(at), id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound { entity: "infringement".to_string(), id: id.to_string() });
        }
        Ok(())
    }

    fn is_whitelisted(&self, product_id: Uuid, url: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM product_whitelist WHERE product_id = ?1 AND url = ?2",
            params![product_id.to_string(), url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_snapshot(&self, snapshot: &EvidenceSnapshot) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let linked = tx.execute(
            "UPDATE infringements SET evidence_snapshot_id = ?1
             WHERE id = ?2 AND evidence_snapshot_id IS NULL",
            params![snapshot.id.to_string(), snapshot.infringement_id.to_string()],
        )?;
        if linked == 0 {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM infringements WHERE id = ?1",
                params![snapshot.infringement_id.to_string()],
                |row| row.get(0),
            )?;
            return if exists == 0 {
                Err(StoreError::NotFound {
                    entity: "infringement".to_string(),
                    id: snapshot.infringement_id.to_string(),
                })
            } else {
                Err(StoreError::AlreadyLinked {
                    entity: "infringement".to_string(),
                    id: snapshot.infringement_id.to_string(),
                })
            };
        }

        tx.execute(
            "INSERT INTO evidence_snapshots
             (id, infringement_id, user_id, content_hash, page_capture, timestamp_proof,
              attestation, chain_of_custody, ai_analysis, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                snapshot.id.to_string(),
                snapshot.infringement_id.to_string(),
                snapshot.user_id.to_string(),
                snapshot.content_hash,
                snapshot.page_capture.as_ref().map(to_json).transpose()?,
                snapshot.timestamp_proof.as_ref().map(to_json).transpose()?,
                to_json(&snapshot.attestation)?,
                to_json(&snapshot.chain_of_custody)?,
                snapshot.ai_analysis.as_ref().map(to_json).transpose()?,
                ts(snapshot.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_snapshot(&self, id: Uuid) -> Result<EvidenceSnapshot, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, infringement_id, user_id, content_hash, page_capture,
                        timestamp_proof, attestation, chain_of_custody, ai_analysis, created_at
                 FROM evidence_snapshots WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound { entity: "evidence_snapshot".to_string(), id: id.to_string() })?;

        let (id, infr, user, hash, capture, proof, attestation, custody, analysis, created) = row;
        Ok(EvidenceSnapshot {
            id: parse_uuid(&id)?,
            infringement_id: parse_uuid(&infr)?,
            user_id: parse_uuid(&user)?,
            content_hash: hash,
            page_capture: capture.as_deref().map(from_json).transpose()?,
            timestamp_proof: proof.as_deref().map(from_json).transpose()?,
            attestation: from_json(&attestation)?,
            chain_of_custody: from_json(&custody)?,
            ai_analysis: analysis.as_deref().map(from_json).transpose()?,
            created_at: parse_ts(&created)?,
        })
    }

    fn patch_snapshot_analysis(
        &self,
        snapshot_id: Uuid,
        analysis: &AiEvidenceAnalysis,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE evidence_snapshots SET ai_analysis = ?1 WHERE id = ?2",
            params![to_json(analysis)?, snapshot_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "evidence_snapshot".to_string(),
                id: snapshot_id.to_string(),
            });
        }
        Ok(())
    }

    fn update_snapshot_proof(
        &self,
        snapshot_id: Uuid,
        proof: &TimestampProof,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE evidence_snapshots SET timestamp_proof = ?1 WHERE id = ?2",
            params![to_json(proof)?, snapshot_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "evidence_snapshot".to_string(),
                id: snapshot_id.to_string(),
            });
        }
        Ok(())
    }

    fn claim_evidence_jobs(&self, limit: usize) -> Result<Vec<EvidenceJob>, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut claimed = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT id, infringement_id, actor, requested_at, attempts
                 FROM evidence_jobs WHERE state = 'queued'
                 ORDER BY requested_at LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;
            for row in rows {
                let (id, infr, actor, requested, attempts) = row?;
                let actor: Actor = from_json(&actor)?;
                claimed.push(EvidenceJob {
                    id: parse_uuid(&id)?,
                    infringement_id: parse_uuid(&infr)?,
                    actor,
                    requested_at: parse_ts(&requested)?,
                    attempts: attempts as u32 + 1,
                });
            }
        }

        for job in &claimed {
            tx.execute(
                "UPDATE evidence_jobs SET state = 'running', attempts = attempts + 1 WHERE id = ?1",
                params![job.id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(claimed)
    }

    fn complete_evidence_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE evidence_jobs SET state = 'done' WHERE id = ?1",
            params![job_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound { entity: "evidence_job".to_string(), id: job_id.to_string() });
        }
        Ok(())
    }

    fn fail_evidence_job(&self, job_id: Uuid, error: &str, retry: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let state = if retry { "queued" } else { "failed" };
        let updated = conn.execute(
            "UPDATE evidence_jobs SET state = ?1, last_error = ?2 WHERE id = ?3",
            params![state, error, job_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound { entity: "evidence_job".to_string(), id: job_id.to_string() });
        }
        Ok(())
    }

    fn insert_action_if_absent(&self, action: &EnforcementAction) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let inserted = Self::insert_action_tx(&tx, action)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn get_actions(&self, infringement_id: Uuid) -> Result<Vec<EnforcementAction>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM enforcement_actions WHERE infringement_id = ?1 ORDER BY created_at",
            ACTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![infringement_id.to_string()], read_action_row)?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?.into_action()?);
        }
        Ok(actions)
    }

    fn mark_action_sent(
        &self,
        action_id: Uuid,
        sent_at: DateTime<Utc>,
        deadline_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE enforcement_actions SET status = 'sent', sent_at = ?1, deadline_at = ?2
             WHERE id = ?3",
            params![ts(sent_at), ts(deadline_at), action_id.to_string()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "enforcement_action".to_string(),
                id: action_id.to_string(),
            });
        }
        Ok(())
    }

    fn list_overdue_sent(&self, now: DateTime<Utc>) -> Result<Vec<EnforcementAction>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM enforcement_actions
             WHERE status = 'sent' AND deadline_at IS NOT NULL AND deadline_at <= ?1
             ORDER BY deadline_at",
            ACTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![ts(now)], read_action_row)?;
        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?.into_action()?);
        }
        Ok(actions)
    }

    fn resolve_no_response(&self, action_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE enforcement_actions SET status = 'no_response', resolved_at = ?1
             WHERE id = ?2 AND status = 'sent'",
            params![ts(now), action_id.to_string()],
        )?;
        Ok(updated > 0)
    }

    fn list_due_for_review(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<InfringementRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM infringements
             WHERE status IN ('active', 'takedown_sent') AND next_check_at <= ?1
             ORDER BY priority, next_check_at LIMIT ?2",
            INFRINGEMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![ts(now), limit as i64], read_infringement_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn record_pattern(
        &self,
        key: &PatternKey,
        outcome: PatternOutcome,
    ) -> Result<LearningPattern, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT occurrences, verified_count FROM learning_patterns
                 WHERE pattern_type = ?1 AND pattern_value = ?2 AND product_id = ?3",
                params![key.pattern_type, key.pattern_value, key.product_id.to_string()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let mut pattern = match existing {
            Some((occurrences, verified_count)) => {
                let mut p = LearningPattern {
                    pattern_type: key.pattern_type.clone(),
                    pattern_value: key.pattern_value.clone(),
                    product_id: key.product_id,
                    confidence_score: 0.0,
                    occurrences: occurrences as u64,
                    verified_count: verified_count as u64,
                };
                p.apply(outcome);
                p
            }
            None => LearningPattern::first(key, outcome),
        };
        pattern.confidence_score = pattern.confidence_score.clamp(0.0, 1.0);

        tx.execute(
            "INSERT OR REPLACE INTO learning_patterns
             (pattern_type, pattern_value, product_id, confidence_score, occurrences, verified_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pattern.pattern_type,
                pattern.pattern_value,
                pattern.product_id.to_string(),
                pattern.confidence_score,
                pattern.occurrences as i64,
                pattern.verified_count as i64,
            ],
        )?;

        tx.commit()?;
        Ok(pattern)
    }

    fn get_pattern(&self, key: &PatternKey) -> Result<Option<LearningPattern>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT confidence_score, occurrences, verified_count FROM learning_patterns
                 WHERE pattern_type = ?1 AND pattern_value = ?2 AND product_id = ?3",
                params![key.pattern_type, key.pattern_value, key.product_id.to_string()],
                |row| {
                    Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                },
            )
            .optional()?;
        Ok(row.map(|(confidence_score, occurrences, verified_count)| LearningPattern {
            pattern_type: key.pattern_type.clone(),
            pattern_value: key.pattern_value.clone(),
            product_id: key.product_id,
            confidence_score,
            occurrences: occurrences as u64,
            verified_count: verified_count as u64,
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Priority;

    fn sample_record() -> InfringementRecord {
        let now = Utc::now();
        InfringementRecord {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            source_url: "https://t.me/leaks".to_string(),
            platform: "telegram".to_string(),
            status: InfringementStatus::PendingVerification,
            priority: Priority::P0,
            severity_score: 85,
            match_confidence: 0.9,
            audience_count: 12_400,
            monetization_detected: true,
            infrastructure: Default::default(),
            raw_matches: vec![],
            first_seen_at: now,
            last_seen_at: now,
            next_check_at: now,
            previous_status: None,
            status_changed_at: None,
            verified_by_user_id: None,
            verified_at: None,
            evidence_snapshot_id: None,
        }
    }

    #[test]
    fn infringement_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record();
        store.insert_infringement(&record).unwrap();

        let loaded = store.get_infringement(record.id).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.status, InfringementStatus::PendingVerification);
        assert_eq!(loaded.priority, Priority::P0);
        assert_eq!(loaded.audience_count, 12_400);
        assert!(loaded.monetization_detected);
    }

    #[test]
    fn reused_id_does_not_clobber_the_existing_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record();
        store.insert_infringement(&record).unwrap();

        let mut imposter = record.clone();
        imposter.status = InfringementStatus::Active;
        imposter.severity_score = 1;
        let err = store.insert_infringement(&imposter).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let loaded = store.get_infringement(record.id).unwrap();
        assert_eq!(loaded.status, InfringementStatus::PendingVerification);
        assert_eq!(loaded.severity_score, 85);
    }

    #[test]
    fn conditional_transition_writes_exactly_one_audit_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record();
        store.insert_infringement(&record).unwrap();

        let changed_at = Utc::now();
        let user = Uuid::new_v4();
        let update = TransitionUpdate {
            expected_status: InfringementStatus::PendingVerification,
            new_status: InfringementStatus::Active,
            changed_at,
            verified_by: Some(user),
            whitelist_url: None,
        };
        let audit = StatusTransition {
            id: Uuid::new_v4(),
            infringement_id: record.id,
            from_status: InfringementStatus::PendingVerification,
            to_status: InfringementStatus::Active,
            reason: "verified by reviewer".to_string(),
            triggered_by: TriggeredBy::User,
            metadata: serde_json::json!({"decision": "verify"}),
            created_at: changed_at,
        };

        store.commit_transition(&update, &audit, None).unwrap();

        // Stale second writer loses the CAS; no second audit row appears.
        let err = store.commit_transition(&update, &audit, None).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let loaded = store.get_infringement(record.id).unwrap();
        assert_eq!(loaded.status, InfringementStatus::Active);
        assert_eq!(loaded.previous_status, Some(InfringementStatus::PendingVerification));
        assert_eq!(loaded.verified_by_user_id, Some(user));
        assert_eq!(store.list_transitions(record.id).unwrap().len(), 1);
    }

    #[test]
    fn overdue_sweep_filters_on_sent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let action = EnforcementAction::draft(Uuid::new_v4(), ActionType::DmcaPlatform, now);
        assert!(store.insert_action_if_absent(&action).unwrap());

        // Draft actions never show up as overdue.
        assert!(store.list_overdue_sent(now).unwrap().is_empty());

        store
            .mark_action_sent(action.id, now, now - chrono::Duration::days(1))
            .unwrap();
        let overdue = store.list_overdue_sent(now).unwrap();
        assert_eq!(overdue.len(), 1);

        assert!(store.resolve_no_response(action.id, now).unwrap());
        assert!(!store.resolve_no_response(action.id, now).unwrap());
        assert!(store.list_overdue_sent(now).unwrap().is_empty());
    }
}
