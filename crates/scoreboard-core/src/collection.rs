//! Reactive record collection.
//!
//! Records are assembled from many small upserts and keyed by an identity
//! field. Triggers registered for CREATE, UPDATE or DELETE run synchronously
//! once a mutation has been committed.
//!
//! A collection may carry a completeness predicate. Records that don't yet
//! satisfy it are held pending: they accumulate fields but are invisible to
//! queries and fire nothing. The upsert that first completes a record makes
//! it visible (CREATE, then UPDATE). From then on every upsert fires UPDATE,
//! even if the record later stops being complete; [`RecordEvent::complete`]
//! tells consumers whether to treat it as dormant.
//!
//! Triggers must not call back into the same collection. The binders hold
//! the collection in a `RefCell` and refuse re-entrant borrows.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CollectionError;
use crate::model::{Matcher, Record};

/// Kind of collection event a trigger listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Create => "CREATE",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Payload passed to triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub kind: EventKind,
    /// The record after the change (before removal for DELETE).
    pub record: Record,
    /// The record before the change, when it was already visible.
    pub previous: Option<Record>,
    /// Fields touched by the change.
    pub fields: Vec<String>,
    /// Whether `record` satisfies the completeness predicate.
    pub complete: bool,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Fields were stored but the record is not complete yet.
    Pending,
    /// The record became visible.
    Created,
    /// A visible record was updated.
    Updated,
}

/// Extra trigger configuration. The default fires for every record.
#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    /// Only fire for records satisfying this matcher.
    pub filter: Option<Matcher>,
}

impl TriggerOptions {
    pub fn with_filter(filter: Matcher) -> Self {
        Self {
            filter: Some(filter),
        }
    }
}

/// Handle returned by [`ReactiveCollection::add_trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(u64);

#[derive(Debug, Clone, PartialEq)]
enum TriggerKey {
    Any,
    Field(String),
}

impl TriggerKey {
    fn parse(key: &str) -> Self {
        if key == "*" {
            TriggerKey::Any
        } else {
            TriggerKey::Field(key.to_string())
        }
    }

    fn matches(&self, event: &RecordEvent) -> bool {
        match self {
            TriggerKey::Any => true,
            TriggerKey::Field(field) => match event.kind {
                EventKind::Update => event.fields.iter().any(|f| f == field),
                EventKind::Create | EventKind::Delete => event.record.contains(field),
            },
        }
    }
}

struct Trigger {
    id: TriggerId,
    kind: EventKind,
    key: TriggerKey,
    options: TriggerOptions,
    callback: Box<dyn FnMut(&RecordEvent)>,
}

impl Trigger {
    fn wants(&self, event: &RecordEvent) -> bool {
        self.kind == event.kind
            && self.key.matches(event)
            && self
                .options
                .filter
                .as_ref()
                .map_or(true, |f| f.matches(&event.record))
    }
}

struct Entry {
    record: Record,
    visible: bool,
}

/// An indexed set of records, mutated only through upsert and delete.
pub struct ReactiveCollection {
    /// Field holding each record's unique identity.
    identity: String,
    /// Records keyed by identity value.
    entries: BTreeMap<String, Entry>,
    completeness: Option<Box<dyn Fn(&Record) -> bool>>,
    triggers: Vec<Trigger>,
    next_trigger: u64,
}

impl ReactiveCollection {
    /// Create a collection whose records are identified by `identity`.
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            entries: BTreeMap::new(),
            completeness: None,
            triggers: Vec::new(),
            next_trigger: 1,
        }
    }

    /// Gate visibility on a completeness predicate.
    pub fn with_completeness(mut self, predicate: impl Fn(&Record) -> bool + 'static) -> Self {
        self.completeness = Some(Box::new(predicate));
        self
    }

    /// Gate visibility on every listed field holding a non-empty value.
    pub fn with_required_fields(self, fields: &[&str]) -> Self {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        self.with_completeness(move |record| fields.iter().all(|f| record.has_value(f)))
    }

    pub fn identity_field(&self) -> &str {
        &self.identity
    }

    /// Merge `fields` into the record matched by `matcher`, creating it if
    /// nothing matches.
    pub fn upsert(&mut self, fields: Record, matcher: &Matcher) -> Result<UpsertOutcome, CollectionError> {
        let touched: Vec<String> = fields.field_names().map(String::from).collect();

        let (outcome, events) = match self.locate(matcher) {
            Some(key) => self.merge_existing(key, &fields, touched),
            None => {
                let mut record = matcher.to_record();
                record.merge(&fields);
                let key = self
                    .identity_of(&record)
                    .ok_or_else(|| CollectionError::MissingIdentity(self.identity.clone()))?;
                self.insert_new(key, record)
            }
        };

        self.emit(&events);
        Ok(outcome)
    }

    /// Remove every record satisfying `matcher`. Returns how many were removed.
    ///
    /// DELETE fires once per removed visible record, carrying its last fields.
    pub fn delete(&mut self, matcher: &Matcher) -> usize {
        let keys: Vec<String> = match self.identity_lookup(matcher) {
            Some(key) => vec![key],
            None => self
                .entries
                .iter()
                .filter(|(_, e)| matcher.matches(&e.record))
                .map(|(k, _)| k.clone())
                .collect(),
        };

        let mut events = Vec::new();
        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                debug!("Removed {} {}", self.identity, key);
                if entry.visible {
                    let complete = self.is_complete(&entry.record);
                    events.push(RecordEvent {
                        kind: EventKind::Delete,
                        fields: entry.record.field_names().map(String::from).collect(),
                        record: entry.record,
                        previous: None,
                        complete,
                    });
                }
            }
        }

        self.emit(&events);
        keys.len()
    }

    /// Register a trigger. `key` is `*` for every event of `kind`, or a field
    /// name to only fire when that field is involved.
    pub fn add_trigger<F>(&mut self, kind: EventKind, key: &str, options: TriggerOptions, callback: F) -> TriggerId
    where
        F: FnMut(&RecordEvent) + 'static,
    {
        let id = TriggerId(self.next_trigger);
        self.next_trigger += 1;
        self.triggers.push(Trigger {
            id,
            kind,
            key: TriggerKey::parse(key),
            options,
            callback: Box::new(callback),
        });
        id
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|t| t.id != id);
        before != self.triggers.len()
    }

    /// Visible record by identity value.
    pub fn get(&self, identity: &str) -> Option<&Record> {
        self.entries
            .get(identity)
            .filter(|e| e.visible)
            .map(|e| &e.record)
    }

    /// Visible records satisfying `matcher`.
    pub fn find(&self, matcher: &Matcher) -> Vec<&Record> {
        self.records().filter(|r| matcher.matches(r)).collect()
    }

    /// Visible records in identity order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries
            .values()
            .filter(|e| e.visible)
            .map(|e| &e.record)
    }

    /// Number of visible records.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.visible).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records still waiting to become complete.
    pub fn pending_len(&self) -> usize {
        self.entries.values().filter(|e| !e.visible).count()
    }

    fn merge_existing(&mut self, key: String, fields: &Record, mut touched: Vec<String>) -> (UpsertOutcome, Vec<RecordEvent>) {
        let Some(mut entry) = self.entries.remove(&key) else {
            return (UpsertOutcome::Pending, Vec::new());
        };
        let previous = entry.record.clone();
        entry.record.merge(fields);

        // a merge may rewrite the identity field itself
        let key = match self.identity_of(&entry.record) {
            Some(new_key) if new_key != key && self.entries.contains_key(&new_key) => {
                warn!(
                    "Refusing to re-key {} {} onto existing {}",
                    self.identity, key, new_key
                );
                let old = previous.get(&self.identity).cloned().unwrap_or(Value::Null);
                entry.record.insert(self.identity.clone(), old);
                touched.retain(|field| field != &self.identity);
                key
            }
            Some(new_key) if new_key != key => {
                debug!("Re-keyed {} {} -> {}", self.identity, key, new_key);
                new_key
            }
            _ => key,
        };

        let complete = self.is_complete(&entry.record);
        let (outcome, events) = if entry.visible {
            let update = RecordEvent {
                kind: EventKind::Update,
                record: entry.record.clone(),
                previous: Some(previous),
                fields: touched,
                complete,
            };
            (UpsertOutcome::Updated, vec![update])
        } else if complete {
            entry.visible = true;
            (UpsertOutcome::Created, Self::creation_events(&entry.record))
        } else {
            (UpsertOutcome::Pending, Vec::new())
        };

        self.entries.insert(key, entry);
        (outcome, events)
    }

    fn insert_new(&mut self, key: String, record: Record) -> (UpsertOutcome, Vec<RecordEvent>) {
        let visible = self.is_complete(&record);
        let (outcome, events) = if visible {
            (UpsertOutcome::Created, Self::creation_events(&record))
        } else {
            debug!("Holding incomplete {} {}", self.identity, key);
            (UpsertOutcome::Pending, Vec::new())
        };
        self.entries.insert(key, Entry { record, visible });
        (outcome, events)
    }

    fn creation_events(record: &Record) -> Vec<RecordEvent> {
        let fields: Vec<String> = record.field_names().map(String::from).collect();
        [EventKind::Create, EventKind::Update]
            .into_iter()
            .map(|kind| RecordEvent {
                kind,
                record: record.clone(),
                previous: None,
                fields: fields.clone(),
                complete: true,
            })
            .collect()
    }

    /// Find the single record an upsert should merge into.
    fn locate(&self, matcher: &Matcher) -> Option<String> {
        if let Some(key) = self.identity_lookup(matcher) {
            return Some(key);
        }
        if matcher.get(&self.identity).is_some() {
            // identity given but no such record (or other fields differ)
            return None;
        }

        let mut matching = self
            .entries
            .iter()
            .filter(|(_, e)| matcher.matches(&e.record))
            .map(|(k, _)| k);
        let first = matching.next()?.clone();
        if matching.next().is_some() {
            warn!(
                "Upsert matcher {:?} matches several records; merging into {} {}",
                matcher, self.identity, first
            );
        }
        Some(first)
    }

    /// Direct lookup when the matcher pins the identity field.
    fn identity_lookup(&self, matcher: &Matcher) -> Option<String> {
        let key = identity_key(matcher.get(&self.identity)?)?;
        self.entries
            .get(&key)
            .filter(|e| matcher.matches(&e.record))
            .map(|_| key)
    }

    fn identity_of(&self, record: &Record) -> Option<String> {
        record.get(&self.identity).and_then(identity_key)
    }

    fn is_complete(&self, record: &Record) -> bool {
        self.completeness.as_ref().map_or(true, |p| p(record))
    }

    fn emit(&mut self, events: &[RecordEvent]) {
        for event in events {
            debug!("{} {:?}", event.kind, event.record.get(&self.identity));
            for trigger in self.triggers.iter_mut() {
                if trigger.wants(event) {
                    (trigger.callback)(event);
                }
            }
        }
    }
}

fn identity_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<RecordEvent>>>;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields.iter().copied().collect()
    }

    fn skaters() -> ReactiveCollection {
        ReactiveCollection::new("Skater").with_required_fields(&["Name", "Team", "Id"])
    }

    fn watch(collection: &mut ReactiveCollection, kind: EventKind) -> Log {
        let log: Log = Rc::default();
        let sink = log.clone();
        collection.add_trigger(kind, "*", TriggerOptions::default(), move |e| {
            sink.borrow_mut().push(e.clone());
        });
        log
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let mut col = ReactiveCollection::new("Skater");
        let creates = watch(&mut col, EventKind::Create);
        let updates = watch(&mut col, EventKind::Update);

        let outcome = col
            .upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "42"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(creates.borrow().len(), 1);
        assert_eq!(updates.borrow().len(), 1);
        assert_eq!(col.get("42"), Some(&record(&[("Skater", "42"), ("Name", "A")])));

        let outcome = col
            .upsert(record(&[("Name", "B")]), &Matcher::field("Skater", "42"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(creates.borrow().len(), 1);

        let last = updates.borrow().last().cloned().unwrap();
        assert_eq!(last.record.get_str("Name"), Some("B"));
        assert_eq!(last.previous.unwrap().get_str("Name"), Some("A"));
        assert_eq!(last.fields, vec!["Name".to_string()]);
    }

    #[test]
    fn test_completeness_gating() {
        let mut col = skaters();
        let updates = watch(&mut col, EventKind::Update);
        let by_id = Matcher::field("Skater", "42");

        col.upsert(record(&[("Name", "A")]), &by_id).unwrap();
        assert!(col.get("42").is_none());
        assert!(col.is_empty());
        assert_eq!(col.pending_len(), 1);

        col.upsert(record(&[("Team", "1")]), &by_id).unwrap();
        assert!(col.find(&by_id).is_empty());
        assert!(updates.borrow().is_empty());

        let outcome = col.upsert(record(&[("Id", "42")]), &by_id).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(col.len(), 1);
        assert_eq!(updates.borrow().len(), 1);

        // later single-field updates don't re-require completeness
        col.upsert(record(&[("Number", "9")]), &by_id).unwrap();
        assert_eq!(updates.borrow().len(), 2);
        assert!(updates.borrow()[1].complete);
    }

    #[test]
    fn test_record_stays_visible_after_losing_completeness() {
        let mut col = skaters();
        let updates = watch(&mut col, EventKind::Update);
        let by_id = Matcher::field("Skater", "7");

        col.upsert(record(&[("Name", "A"), ("Team", "2"), ("Id", "7")]), &by_id)
            .unwrap();
        let mut blank = Record::new();
        blank.insert("Name", Value::Null);
        col.upsert(blank, &by_id).unwrap();

        assert!(col.get("7").is_some());
        let last = updates.borrow().last().cloned().unwrap();
        assert!(!last.complete);
    }

    #[test]
    fn test_delete_fires_once_with_last_fields() {
        let mut col = ReactiveCollection::new("Skater");
        let deletes = watch(&mut col, EventKind::Delete);
        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "42"))
            .unwrap();

        assert_eq!(col.delete(&Matcher::field("Skater", "42")), 1);
        assert!(col.get("42").is_none());
        assert_eq!(deletes.borrow().len(), 1);
        assert_eq!(deletes.borrow()[0].record.get_str("Name"), Some("A"));

        // deleting again is a no-op
        assert_eq!(col.delete(&Matcher::field("Skater", "42")), 0);
        assert_eq!(deletes.borrow().len(), 1);
    }

    #[test]
    fn test_delete_by_non_identity_matcher() {
        let mut col = ReactiveCollection::new("Skater");
        for (id, team) in [("1", "A"), ("2", "A"), ("3", "B")] {
            col.upsert(record(&[("Team", team)]), &Matcher::field("Skater", id))
                .unwrap();
        }

        assert_eq!(col.delete(&Matcher::field("Team", "A")), 2);
        let left: Vec<_> = col.records().filter_map(|r| r.get_str("Skater")).collect();
        assert_eq!(left, vec!["3"]);
    }

    #[test]
    fn test_delete_pending_record_is_silent() {
        let mut col = skaters();
        let deletes = watch(&mut col, EventKind::Delete);
        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "5"))
            .unwrap();

        assert_eq!(col.delete(&Matcher::field("Skater", "5")), 1);
        assert_eq!(col.pending_len(), 0);
        assert!(deletes.borrow().is_empty());
    }

    #[test]
    fn test_matcher_missing_field_creates_new_record() {
        let mut col = ReactiveCollection::new("Skater");
        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "1"))
            .unwrap();

        // `Team` is absent on the existing record, so this is a different record
        let outcome = col.upsert(
            record(&[("Name", "B")]),
            &Matcher::field("Skater", "2").and("Team", "1"),
        );
        assert_eq!(outcome, Ok(UpsertOutcome::Created));
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_upsert_without_identity_fails() {
        let mut col = ReactiveCollection::new("Skater");
        let result = col.upsert(record(&[("Name", "A")]), &Matcher::field("Team", "1"));
        assert_eq!(result, Err(CollectionError::MissingIdentity("Skater".into())));
        assert!(col.is_empty());
    }

    #[test]
    fn test_ambiguous_matcher_merges_into_first() {
        let mut col = ReactiveCollection::new("Skater");
        for id in ["1", "2"] {
            col.upsert(record(&[("Team", "A")]), &Matcher::field("Skater", id))
                .unwrap();
        }

        let outcome = col
            .upsert(record(&[("Name", "X")]), &Matcher::field("Team", "A"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(col.get("1").unwrap().get_str("Name"), Some("X"));
        assert_eq!(col.get("2").unwrap().get_str("Name"), None);
    }

    #[test]
    fn test_field_trigger_key() {
        let mut col = ReactiveCollection::new("Skater");
        let names: Log = Rc::default();
        let sink = names.clone();
        col.add_trigger(EventKind::Update, "Name", TriggerOptions::default(), move |e| {
            sink.borrow_mut().push(e.clone());
        });

        let by_id = Matcher::field("Skater", "1");
        col.upsert(record(&[("Number", "9")]), &by_id).unwrap();
        col.upsert(record(&[("Number", "10")]), &by_id).unwrap();
        assert!(names.borrow().is_empty());

        col.upsert(record(&[("Name", "A")]), &by_id).unwrap();
        assert_eq!(names.borrow().len(), 1);
    }

    #[test]
    fn test_trigger_filter_and_removal() {
        let mut col = ReactiveCollection::new("Skater");
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let id = col.add_trigger(
            EventKind::Create,
            "*",
            TriggerOptions::with_filter(Matcher::field("Team", "1")),
            move |_| *sink.borrow_mut() += 1,
        );

        col.upsert(record(&[("Team", "1")]), &Matcher::field("Skater", "a"))
            .unwrap();
        col.upsert(record(&[("Team", "2")]), &Matcher::field("Skater", "b"))
            .unwrap();
        assert_eq!(*count.borrow(), 1);

        assert!(col.remove_trigger(id));
        col.upsert(record(&[("Team", "1")]), &Matcher::field("Skater", "c"))
            .unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_overlapping_triggers_all_fire() {
        let mut col = ReactiveCollection::new("Skater");
        let a = watch(&mut col, EventKind::Update);
        let b = watch(&mut col, EventKind::Update);

        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "1"))
            .unwrap();
        assert_eq!(a.borrow().len(), 1);
        assert_eq!(b.borrow().len(), 1);
    }

    #[test]
    fn test_rekey_moves_record() {
        let mut col = ReactiveCollection::new("Skater");
        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "1"))
            .unwrap();

        col.upsert(record(&[("Skater", "3")]), &Matcher::field("Skater", "1"))
            .unwrap();
        assert!(col.get("1").is_none());
        assert_eq!(col.get("3").unwrap().get_str("Name"), Some("A"));
    }

    #[test]
    fn test_rekey_onto_existing_record_is_refused() {
        let mut col = ReactiveCollection::new("Skater");
        let deletes = watch(&mut col, EventKind::Delete);
        let updates = watch(&mut col, EventKind::Update);
        col.upsert(record(&[("Name", "A")]), &Matcher::field("Skater", "1"))
            .unwrap();
        col.upsert(record(&[("Name", "B")]), &Matcher::field("Skater", "2"))
            .unwrap();

        col.upsert(record(&[("Skater", "2")]), &Matcher::field("Skater", "1"))
            .unwrap();

        assert_eq!(col.len(), 2);
        assert!(deletes.borrow().is_empty());
        assert_eq!(col.get("1").unwrap().get_str("Name"), Some("A"));
        assert_eq!(col.get("1").unwrap().get_str("Skater"), Some("1"));
        assert_eq!(col.get("2").unwrap().get_str("Name"), Some("B"));
        assert!(updates.borrow().last().unwrap().fields.is_empty());
    }

    #[test]
    fn test_numeric_identity() {
        let mut col = ReactiveCollection::new("Skater");
        col.upsert(Record::new(), &Matcher::field("Skater", json!(42)))
            .unwrap();
        assert!(col.get("42").is_some());
    }
}
