//! Session History Module
//!
//! Persists completed practice sessions and aggregates long-run putting
//! stats. Detailed putt data is kept for a retention window; after that only
//! the per-round summaries survive.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use putting_core::{validate_distance, ConfidenceModel, ConfidenceReport, PuttAttempt, PuttOutcome};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::session::PracticeSession;

/// Days of detailed putt data kept per session
pub const DETAIL_RETENTION_DAYS: i64 = 30;
/// A distance counts toward the long-run CoC at this rounded make percentage...
pub const COC_MIN_PERCENTAGE: u32 = 90;
/// ...with at least this many attempts
pub const COC_MIN_ATTEMPTS: u32 = 50;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS putting_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    rounds TEXT NOT NULL,
    total_makes INTEGER NOT NULL,
    total_attempts INTEGER NOT NULL,
    percentage REAL NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_putting_sessions_player
    ON putting_sessions (player_id, completed_at)
"#;

/// What kind of practice produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Training,
    CocChallenge,
    HeadToHead,
    Daily,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Training => "training",
            SessionKind::CocChallenge => "coc_challenge",
            SessionKind::HeadToHead => "head_to_head",
            SessionKind::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "training" => Some(SessionKind::Training),
            "coc_challenge" => Some(SessionKind::CocChallenge),
            "head_to_head" => Some(SessionKind::HeadToHead),
            "daily" => Some(SessionKind::Daily),
            _ => None,
        }
    }
}

/// One putt inside a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundPutt {
    /// Exact distance; the round's label is rounded
    pub distance: f64,
    pub outcome: PuttOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// A block of putts from a single distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Nearest whole distance, used to bucket stats
    pub distance: u32,
    /// Emptied once the session ages out of the retention window
    pub putts: Vec<RoundPutt>,
    pub makes: u32,
    pub attempts: u32,
}

impl Round {
    pub fn new(distance: u32) -> Self {
        Self {
            distance,
            putts: Vec::new(),
            makes: 0,
            attempts: 0,
        }
    }

    pub fn push(&mut self, putt: RoundPutt) {
        self.attempts += 1;
        if putt.outcome.is_make() {
            self.makes += 1;
        }
        self.putts.push(putt);
    }
}

/// A session ready to be saved
#[derive(Debug, Clone)]
pub struct NewSession {
    pub player_id: String,
    pub kind: SessionKind,
    pub rounds: Vec<Round>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl NewSession {
    /// Wrap up a finished practice session, completed now.
    pub fn from_practice(player_id: impl Into<String>, kind: SessionKind, practice: PracticeSession) -> Self {
        let completed_at = Utc::now();
        let started_at = practice.started_at().unwrap_or(completed_at);

        Self {
            player_id: player_id.into(),
            kind,
            rounds: practice.into_rounds(),
            started_at,
            completed_at,
        }
    }
}

/// A stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub player_id: String,
    pub kind: SessionKind,
    pub rounds: Vec<Round>,
    pub total_makes: u32,
    pub total_attempts: u32,
    /// 0-100
    pub percentage: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Session {
    /// Detailed putts still on record, as estimator input
    pub fn attempts(&self) -> Vec<PuttAttempt> {
        self.rounds
            .iter()
            .flat_map(|round| &round.putts)
            .map(|putt| PuttAttempt {
                distance: putt.distance,
                outcome: putt.outcome,
                recorded_at: putt.recorded_at,
            })
            .collect()
    }
}

/// Internal DB row type with String dates (compatible with sqlx Any backend)
#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    player_id: String,
    kind: String,
    rounds: String,
    total_makes: i64,
    total_attempts: i64,
    percentage: f64,
    started_at: String,
    completed_at: String,
}

impl SessionRow {
    fn into_session(self) -> Result<Session> {
        let kind = SessionKind::parse(&self.kind)
            .with_context(|| format!("session {} has unknown kind '{}'", self.id, self.kind))?;
        let rounds: Vec<Round> = serde_json::from_str(&self.rounds)
            .with_context(|| format!("session {} has malformed rounds", self.id))?;

        Ok(Session {
            id: self.id,
            player_id: self.player_id,
            kind,
            rounds,
            total_makes: self.total_makes as u32,
            total_attempts: self.total_attempts as u32,
            percentage: self.percentage,
            started_at: parse_time(&self.started_at)?,
            completed_at: parse_time(&self.completed_at)?,
        })
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("invalid timestamp '{raw}'"))
}

fn rounded_percentage(makes: u32, attempts: u32) -> u32 {
    if attempts == 0 {
        0
    } else {
        (makes as f64 / attempts as f64 * 100.0).round() as u32
    }
}

/// Store for practice session history
#[derive(Clone)]
pub struct SessionHistoryStore {
    pool: sqlx::AnyPool,
}

impl SessionHistoryStore {
    /// Create a new history store
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self { pool }
    }

    /// Create the sessions table if it does not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        // One statement per query
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    /// Save a finished session, then prune detail from sessions past retention.
    ///
    /// Putts outside the accepted distance range are rejected before anything
    /// is written. Timestamps are stored, and returned, at microsecond precision.
    pub async fn save_session(&self, session: NewSession) -> Result<Session> {
        for (round_idx, round) in session.rounds.iter().enumerate() {
            for putt in &round.putts {
                validate_distance(putt.distance)
                    .with_context(|| format!("round {round_idx} of session for {}", session.player_id))?;
            }
        }

        let started_at = session.started_at.trunc_subsecs(6);
        let completed_at = session.completed_at.trunc_subsecs(6);
        let total_makes: u32 = session.rounds.iter().map(|r| r.makes).sum();
        let total_attempts: u32 = session.rounds.iter().map(|r| r.attempts).sum();
        let percentage = if total_attempts > 0 {
            total_makes as f64 / total_attempts as f64 * 100.0
        } else {
            0.0
        };
        let rounds_json = serde_json::to_string(&session.rounds)?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO putting_sessions (
                player_id, kind, rounds, total_makes, total_attempts,
                percentage, started_at, completed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&session.player_id)
        .bind(session.kind.as_str())
        .bind(&rounds_json)
        .bind(total_makes as i64)
        .bind(total_attempts as i64)
        .bind(percentage)
        .bind(format_time(&started_at))
        .bind(format_time(&completed_at))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            id,
            player_id = %session.player_id,
            kind = session.kind.as_str(),
            total_attempts,
            "saved putting session"
        );

        self.prune_detail_before(Utc::now() - Duration::days(DETAIL_RETENTION_DAYS))
            .await?;

        Ok(Session {
            id,
            player_id: session.player_id,
            kind: session.kind,
            rounds: session.rounds,
            total_makes,
            total_attempts,
            percentage,
            started_at,
            completed_at,
        })
    }

    /// All sessions, oldest first, optionally for a single player
    pub async fn get_sessions(&self, player_id: Option<&str>) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = if let Some(player_id) = player_id {
            sqlx::query_as(
                r#"
                SELECT
                    id, player_id, kind, rounds, total_makes, total_attempts,
                    percentage, started_at, completed_at
                FROM putting_sessions
                WHERE player_id = ?
                ORDER BY completed_at ASC, id ASC
                "#,
            )
            .bind(player_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT
                    id, player_id, kind, rounds, total_makes, total_attempts,
                    percentage, started_at, completed_at
                FROM putting_sessions
                ORDER BY completed_at ASC, id ASC
                "#,
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Most recently completed sessions, newest first
    pub async fn get_recent_sessions(&self, limit: i64) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT
                id, player_id, kind, rounds, total_makes, total_attempts,
                percentage, started_at, completed_at
            FROM putting_sessions
            ORDER BY completed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Long-run totals and per-distance make rates
    pub async fn get_stats(&self, player_id: Option<&str>) -> Result<PracticeStats> {
        let sessions = self.get_sessions(player_id).await?;
        Ok(PracticeStats::from_sessions(&sessions))
    }

    /// Clear detailed putts of sessions completed before `cutoff`.
    ///
    /// Round summaries are kept. Returns the number of sessions touched.
    pub async fn prune_detail_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT
                id, player_id, kind, rounds, total_makes, total_attempts,
                percentage, started_at, completed_at
            FROM putting_sessions
            WHERE completed_at < ?
            "#,
        )
        .bind(format_time(&cutoff))
        .fetch_all(&self.pool)
        .await?;

        let mut pruned = 0;
        for row in rows {
            let mut session = row.into_session()?;
            if session.rounds.iter().all(|r| r.putts.is_empty()) {
                continue;
            }
            for round in &mut session.rounds {
                round.putts.clear();
            }

            sqlx::query("UPDATE putting_sessions SET rounds = ? WHERE id = ?")
                .bind(serde_json::to_string(&session.rounds)?)
                .bind(session.id)
                .execute(&self.pool)
                .await?;
            pruned += 1;
        }

        if pruned > 0 {
            tracing::info!(pruned, cutoff = %cutoff, "pruned detailed putt data");
        }
        Ok(pruned)
    }

    /// Confidence report over every detailed putt still on record
    pub async fn confidence_report<M: ConfidenceModel + ?Sized>(
        &self,
        player_id: Option<&str>,
        model: &M,
    ) -> Result<ConfidenceReport> {
        let attempts: Vec<PuttAttempt> = self
            .get_sessions(player_id)
            .await?
            .iter()
            .flat_map(Session::attempts)
            .collect();

        Ok(model.report(&attempts)?)
    }
}

/// Make rate at one distance across sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    pub makes: u32,
    pub attempts: u32,
    /// Rounded, 0-100
    pub percentage: u32,
}

/// Aggregate putting stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeStats {
    pub total_sessions: usize,
    pub total_putts: u32,
    pub total_makes: u32,
    /// Rounded, 0-100
    pub overall_percentage: u32,
    /// Farthest distance at 90%+ over at least 50 attempts, 0 if none
    pub coc_distance: u32,
    pub by_distance: BTreeMap<u32, DistanceStats>,
}

impl PracticeStats {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut by_distance: BTreeMap<u32, DistanceStats> = BTreeMap::new();

        for round in sessions.iter().flat_map(|s| &s.rounds) {
            let entry = by_distance.entry(round.distance).or_default();
            entry.makes += round.makes;
            entry.attempts += round.attempts;
        }

        for stats in by_distance.values_mut() {
            stats.percentage = rounded_percentage(stats.makes, stats.attempts);
        }

        let total_makes = by_distance.values().map(|s| s.makes).sum();
        let total_putts = by_distance.values().map(|s| s.attempts).sum();

        let coc_distance = by_distance
            .iter()
            .filter(|(_, s)| s.percentage >= COC_MIN_PERCENTAGE && s.attempts >= COC_MIN_ATTEMPTS)
            .map(|(&distance, _)| distance)
            .max()
            .unwrap_or(0);

        Self {
            total_sessions: sessions.len(),
            total_putts,
            total_makes,
            overall_percentage: rounded_percentage(total_makes, total_putts),
            coc_distance,
            by_distance,
        }
    }
}
