//! User-visible notifications.
//!
//! Every failure the engine reports ends up here, alongside progress records
//! for long-running work such as introspection. A UI shell drains the queue
//! and displays the entries. The CLI only sees them through the `tracing`
//! events each entry emits (`-v` shows info and progress).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Lifetime of a progress notification after its last update.
pub const PROGRESS_TTL_HOURS: i64 = 1;

/// State of the task behind a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Queued,
    Active,
    Success,
    Error,
}

impl ProgressState {
    pub fn is_complete(self) -> bool {
        matches!(self, ProgressState::Success | ProgressState::Error)
    }
}

/// Progress of a task. A `total` of zero or less means indeterminate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub title: String,
    pub total: f64,
    pub current: f64,
    pub state: ProgressState,
    pub message: String,
}

/// A single field update for [`ProgressRecord::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressField {
    Total(f64),
    Current(f64),
    State(ProgressState),
    Message(String),
}

impl ProgressRecord {
    pub fn new(title: impl Into<String>, total: f64) -> Self {
        Self {
            title: title.into(),
            total,
            current: 0.0,
            state: ProgressState::Active,
            message: String::new(),
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.total <= 0.0
    }

    pub fn update(&mut self, field: ProgressField) {
        match field {
            ProgressField::Total(v) => self.total = v,
            ProgressField::Current(v) => self.current = v,
            ProgressField::State(s) => self.state = s,
            ProgressField::Message(m) => self.message = m,
        }
    }

    /// Update a field by name, as a UI would when relaying an edit.
    pub fn update_named(&mut self, field: &str, value: &str) -> anyhow::Result<()> {
        let parsed = match field {
            "total" => ProgressField::Total(value.parse()?),
            "current" => ProgressField::Current(value.parse()?),
            "message" => ProgressField::Message(value.to_string()),
            "state" => ProgressField::State(match value {
                "queued" => ProgressState::Queued,
                "active" => ProgressState::Active,
                "success" => ProgressState::Success,
                "error" => ProgressState::Error,
                other => anyhow::bail!("invalid progress state: {}", other),
            }),
            other => anyhow::bail!("invalid progress field: {}", other),
        };
        self.update(parsed);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum NotificationKind {
    Progress(ProgressRecord),
    Error(String),
    Info(String),
}

/// Stable handle to a progress notification. Survives `drain` and `purge_expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProgressId(u64);

impl ProgressId {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub time: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
}

/// Ordered queue of notifications for one session.
#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
    next_id: u64,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(%message, "notification");
        self.push(NotificationKind::Error(message), None);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(%message, "notification");
        self.push(NotificationKind::Info(message), None);
    }

    /// Start a progress record and return its handle for later updates.
    pub fn start_progress(&mut self, record: ProgressRecord) -> ProgressId {
        tracing::debug!(title = %record.title, total = record.total, "progress started");
        let expires = Utc::now() + Duration::hours(PROGRESS_TTL_HOURS);
        ProgressId(self.push(NotificationKind::Progress(record), Some(expires)))
    }

    /// Apply updates to a progress record and refresh its expiry.
    ///
    /// Returns `false` when the record has been drained or purged.
    pub fn update_progress(&mut self, handle: ProgressId, fields: Vec<ProgressField>) -> bool {
        let Some(item) = self.items.iter_mut().find(|n| n.id == handle.0) else {
            tracing::debug!(id = handle.0, "progress update for a removed notification");
            return false;
        };
        let NotificationKind::Progress(record) = &mut item.kind else {
            return false;
        };
        for field in fields {
            record.update(field);
        }
        tracing::trace!(
            title = %record.title,
            current = record.current,
            state = ?record.state,
            "progress updated"
        );
        let now = Utc::now();
        item.time = now;
        item.expires = Some(now + Duration::hours(PROGRESS_TTL_HOURS));
        true
    }

    pub fn progress(&self, handle: ProgressId) -> Option<&ProgressRecord> {
        self.progress_records()
            .find(|(id, _)| *id == handle)
            .map(|(_, record)| record)
    }

    pub fn progress_records(&self) -> impl Iterator<Item = (ProgressId, &ProgressRecord)> {
        self.items.iter().filter_map(|n| match &n.kind {
            NotificationKind::Progress(record) => Some((ProgressId(n.id), record)),
            _ => None,
        })
    }

    /// Drop notifications whose expiry is at or before `now`.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.items.retain(|n| n.expires.map_or(true, |e| e > now));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|n| match &n.kind {
            NotificationKind::Error(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.items)
    }

    fn push(&mut self, kind: NotificationKind, expires: Option<DateTime<Utc>>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notification {
            id,
            kind,
            time: Utc::now(),
            expires,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_state_complete() {
        assert!(ProgressState::Success.is_complete());
        assert!(ProgressState::Error.is_complete());
        assert!(!ProgressState::Active.is_complete());
        assert!(!ProgressState::Queued.is_complete());
    }

    #[test]
    fn test_update_named_rejects_unknown_field() {
        let mut record = ProgressRecord::new("Scanning", 10.0);
        assert!(record.update_named("current", "4").is_ok());
        assert_eq!(record.current, 4.0);
        assert!(record.update_named("state", "success").is_ok());
        assert_eq!(record.state, ProgressState::Success);
        assert!(record.update_named("title", "other").is_err());
        assert_eq!(record.title, "Scanning");
    }

    #[test]
    fn test_indeterminate() {
        assert!(ProgressRecord::new("x", 0.0).is_indeterminate());
        assert!(!ProgressRecord::new("x", 3.0).is_indeterminate());
    }

    #[test]
    fn test_progress_updates_in_place() {
        let mut notes = Notifications::new();
        let handle = notes.start_progress(ProgressRecord::new("Introspecting", 2.0));
        assert!(notes.update_progress(
            handle,
            vec![ProgressField::Current(2.0), ProgressField::State(ProgressState::Success)],
        ));
        let record = notes.progress(handle).unwrap();
        assert_eq!(record.current, 2.0);
        assert!(record.state.is_complete());
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_update_after_drain_leaves_new_record_alone() {
        let mut notes = Notifications::new();
        let first = notes.start_progress(ProgressRecord::new("task A", 1.0));
        assert_eq!(notes.drain().len(), 1);
        let second = notes.start_progress(ProgressRecord::new("task B", 1.0));
        assert_ne!(first, second);

        assert!(!notes.update_progress(first, vec![ProgressField::State(ProgressState::Error)]));
        let record = notes.progress(second).unwrap();
        assert_eq!(record.title, "task B");
        assert_eq!(record.state, ProgressState::Active);
    }

    #[test]
    fn test_update_after_purge_is_rejected() {
        let mut notes = Notifications::new();
        let stale = notes.start_progress(ProgressRecord::new("old", 1.0));
        notes.purge_expired(Utc::now() + Duration::hours(2));
        let fresh = notes.start_progress(ProgressRecord::new("new", 1.0));
        assert!(!notes.update_progress(stale, vec![ProgressField::Current(1.0)]));
        assert_eq!(notes.progress(fresh).unwrap().current, 0.0);
    }

    #[test]
    fn test_purge_expired_keeps_errors() {
        let mut notes = Notifications::new();
        notes.start_progress(ProgressRecord::new("a", 1.0));
        notes.error("boom");
        notes.purge_expired(Utc::now() + Duration::hours(2));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes.errors().collect::<Vec<_>>(), vec!["boom"]);
    }

    #[test]
    fn test_serialize_shape() {
        let mut notes = Notifications::new();
        notes.info("rendered");
        let json = serde_json::to_value(notes.iter().next().unwrap()).unwrap();
        assert_eq!(json["type"], "info");
        assert_eq!(json["data"], "rendered");
    }
}
