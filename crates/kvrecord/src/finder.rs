//! # Finders
//!
//! Class-level queries over every stored record of a model type.
//!
//! There is no index: each query scans the `"{TypeName}:"` key prefix,
//! decodes every document and filters in memory, so cost grows with the
//! number of stored records of the type. Results of [`Model::all`] and
//! everything built on it are ordered by `created_at`, ties broken by id.
//!
//! Scans are not snapshots. A key that disappears between the scan and the
//! read is skipped.
//!
//! ```ignore
//! let big = widgets.filter(Query::new().eq("size", "large"))?;
//! let one = widgets.find_by(AttrFilter::eq("name", "gear"))?;
//! let w = widgets.find_or_create_by(json!({"name": "gear"}))?;
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::attributes::{AttrFilter, AttrValue, AttributeSchema, FilterOp};
use crate::error::{RecordError, Result};
use crate::model::Model;
use crate::naming;
use crate::record::{attribute_object, Record};
use crate::store::{id_from_key, is_valid_id, key_prefix};

type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Attribute conditions plus an optional predicate.
///
/// A record matches when every filter matches and the predicate, if any,
/// returns true. An empty query matches everything.
#[derive(Clone, Default)]
pub struct Query {
    filters: Vec<AttrFilter>,
    predicate: Option<Predicate>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filters", &self.filters)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality conditions from a JSON object, e.g. `{"count": 2}`.
    pub fn conditions(conditions: Value) -> Result<Self> {
        let map = attribute_object("conditions", conditions)?;
        Ok(Self {
            filters: map
                .into_iter()
                .map(|(attr, value)| AttrFilter::eq(attr, AttrValue::from(value)))
                .collect(),
            predicate: None,
        })
    }

    pub fn eq(self, attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.with(AttrFilter::eq(attr, value))
    }

    pub fn ne(self, attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.with(AttrFilter::ne(attr, value))
    }

    pub fn with(mut self, filter: AttrFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn filters(&self) -> &[AttrFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.predicate.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
            && self.predicate.as_ref().map_or(true, |p| p(record))
    }

    /// Check every filtered name against `schema` and cast each value
    /// through its attribute's kind.
    fn resolve(self, schema: &AttributeSchema) -> Result<Self> {
        let mut filters = Vec::with_capacity(self.filters.len());
        for filter in self.filters {
            if filter.attr == "id" {
                filters.push(filter);
                continue;
            }
            let kind = schema
                .get_spec(&filter.attr)
                .ok_or_else(|| RecordError::invalid_attribute(schema.model(), &filter.attr))?
                .kind;
            filters.push(filter.cast_for(kind));
        }
        Ok(Self {
            filters,
            predicate: self.predicate,
        })
    }

    /// The id of a query that is exactly `id == x` with no predicate.
    fn sole_id(&self) -> Option<&str> {
        match (self.filters.as_slice(), &self.predicate) {
            ([filter], None) if filter.attr == "id" && filter.op == FilterOp::Eq => {
                Some(&filter.value)
            }
            _ => None,
        }
    }

    fn describe(&self) -> String {
        self.filters
            .iter()
            .map(|filter| {
                let op = match filter.op {
                    FilterOp::Eq => ":",
                    FilterOp::Ne => " !=",
                };
                format!("{}{} {}", filter.attr, op, filter.value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<AttrFilter> for Query {
    fn from(filter: AttrFilter) -> Self {
        Query::new().with(filter)
    }
}

impl From<Vec<AttrFilter>> for Query {
    fn from(filters: Vec<AttrFilter>) -> Self {
        Self {
            filters,
            predicate: None,
        }
    }
}

impl Model {
    /// Every stored record of this type, oldest first.
    pub fn all(&self) -> Result<Vec<Record>> {
        let ids = self.ids()?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_document(&id)? {
                Some(doc) => records.push(self.instantiate(&id, doc)),
                None => {
                    debug!(target: "kvrecord::finder", model = self.name(), %id, "key vanished during scan");
                }
            }
        }
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.ids()?.len())
    }

    /// Ids of every stored record, in key order. Keys of namespaced types
    /// sharing the prefix (`Shop::Item` under `Shop`) are left out.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .backend()
            .scan(&key_prefix(self.name()))?
            .iter()
            .filter_map(|key| id_from_key(self.name(), key).map(str::to_string))
            .collect())
    }

    pub fn any(&self) -> Result<bool> {
        Ok(!self.ids()?.is_empty())
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(is_valid_id(id) && self.backend().exists(&self.key(id))?)
    }

    pub fn find(&self, id: &str) -> Result<Record> {
        if !is_valid_id(id) {
            return Err(self.not_found(id));
        }
        let doc = self.load_document(id)?.ok_or_else(|| self.not_found(id))?;
        Ok(self.instantiate(id, doc))
    }

    /// Find several records by id, failing if any one is missing.
    pub fn find_many<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Err(RecordError::RecordNotFound(format!(
                "Couldn't find {} without an id",
                self.name()
            )));
        }
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match self.find(id.as_ref()) {
                Ok(record) => found.push(record),
                Err(RecordError::RecordNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if found.len() == ids.len() {
            return Ok(found);
        }
        let wanted: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        Err(RecordError::RecordNotFound(format!(
            "Couldn't find all {} with ids: {} (found {} results, but was looking for {})",
            naming::pluralize(self.name()),
            wanted.join(", "),
            found.len(),
            ids.len()
        )))
    }

    /// Records matching `query`, oldest first.
    ///
    /// Every filtered name must be `"id"` or a declared attribute. A query
    /// that is only `id == x` reads that one key instead of scanning.
    #[doc(alias = "where")]
    pub fn filter(&self, query: impl Into<Query>) -> Result<Vec<Record>> {
        let query = query.into().resolve(self.schema())?;
        if query.is_empty() {
            return self.all();
        }
        if let Some(id) = query.sole_id() {
            return match self.find(id) {
                Ok(record) => Ok(vec![record]),
                Err(RecordError::RecordNotFound(_)) => Ok(Vec::new()),
                Err(err) => Err(err),
            };
        }
        Ok(self
            .all()?
            .into_iter()
            .filter(|record| query.matches(record))
            .collect())
    }

    pub fn find_by(&self, query: impl Into<Query>) -> Result<Option<Record>> {
        Ok(self.filter(query)?.into_iter().next())
    }

    pub fn find_by_strict(&self, query: impl Into<Query>) -> Result<Record> {
        let query = query.into();
        let description = query.describe();
        self.find_by(query)?.ok_or_else(|| {
            RecordError::RecordNotFound(format!(
                "Couldn't find {} with {}",
                self.name(),
                description
            ))
        })
    }

    /// The first record matching `attributes`, or a new one created from them.
    pub fn find_or_create_by(&self, attributes: Value) -> Result<Record> {
        match self.find_by(Query::conditions(attributes.clone())?)? {
            Some(record) => Ok(record),
            None => self.create(attributes),
        }
    }

    /// The first record matching `attributes`, or an unsaved one built from them.
    pub fn find_or_initialize_by(&self, attributes: Value) -> Result<Record> {
        match self.find_by(Query::conditions(attributes.clone())?)? {
            Some(record) => Ok(record),
            None => self.build(attributes),
        }
    }

    /// The only record matching `query`.
    pub fn find_sole_by(&self, query: impl Into<Query>) -> Result<Record> {
        let query = query.into();
        let description = query.describe();
        let records = self.filter(query)?;
        self.only(records, || {
            format!("Couldn't find {} with {}", self.name(), description)
        })
    }

    /// The only stored record of this type.
    pub fn sole(&self) -> Result<Record> {
        let records = self.all()?;
        self.only(records, || format!("Couldn't find {}", self.name()))
    }

    fn only(&self, records: Vec<Record>, missing: impl FnOnce() -> String) -> Result<Record> {
        let found = records.len();
        let mut records = records.into_iter();
        match (records.next(), found) {
            (Some(record), 1) => Ok(record),
            (None, _) => Err(RecordError::RecordNotFound(missing())),
            (Some(_), _) => Err(RecordError::SoleRecordExceeded {
                model: self.name().to_string(),
                found,
            }),
        }
    }

    /// The record at `index` in [`Model::all`] order.
    pub fn nth(&self, index: usize) -> Result<Option<Record>> {
        Ok(self.all()?.into_iter().nth(index))
    }

    /// The record at `index` counting back from the newest (0 is the last).
    pub fn nth_to_last(&self, index: usize) -> Result<Option<Record>> {
        Ok(self.all()?.into_iter().rev().nth(index))
    }

    pub fn first(&self) -> Result<Option<Record>> {
        self.nth(0)
    }

    pub fn second(&self) -> Result<Option<Record>> {
        self.nth(1)
    }

    pub fn third(&self) -> Result<Option<Record>> {
        self.nth(2)
    }

    pub fn fourth(&self) -> Result<Option<Record>> {
        self.nth(3)
    }

    pub fn fifth(&self) -> Result<Option<Record>> {
        self.nth(4)
    }

    pub fn forty_two(&self) -> Result<Option<Record>> {
        self.nth(41)
    }

    pub fn third_to_last(&self) -> Result<Option<Record>> {
        self.nth_to_last(2)
    }

    pub fn second_to_last(&self) -> Result<Option<Record>> {
        self.nth_to_last(1)
    }

    pub fn last(&self) -> Result<Option<Record>> {
        self.nth_to_last(0)
    }

    /// Remove every stored record of this type without callbacks. Returns
    /// the number of documents removed.
    pub fn delete_all(&self) -> Result<usize> {
        let mut removed = 0;
        for id in self.ids()? {
            if self.backend().delete(&self.key(&id))? {
                removed += 1;
            }
        }
        debug!(target: "kvrecord::finder", model = self.name(), removed, "deleted all records");
        Ok(removed)
    }

    /// Remove matching records without callbacks.
    pub fn delete_by(&self, query: impl Into<Query>) -> Result<usize> {
        let mut removed = 0;
        for record in self.filter(query)? {
            if self.backend().delete(&record.key())? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Destroy every record, running `Destroy` callbacks for each. Returns
    /// the destroyed records.
    pub fn destroy_all(&self) -> Result<Vec<Record>> {
        let mut records = self.all()?;
        for record in &mut records {
            record.destroy()?;
        }
        Ok(records)
    }

    pub fn destroy_by(&self, query: impl Into<Query>) -> Result<Vec<Record>> {
        let mut records = self.filter(query)?;
        for record in &mut records {
            record.destroy()?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvBackend;
    use crate::test_utils::widgets;
    use serde_json::json;

    fn seeded() -> Model {
        let model = widgets();
        for (id, count) in [("a", 1), ("b", 2), ("c", 2)] {
            model.create(json!({"id": id, "count": count})).unwrap();
        }
        model
    }

    #[test]
    fn all_is_ordered_by_creation() {
        let model = seeded();
        let ids: Vec<String> = model.all().unwrap().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(model.count().unwrap(), 3);
        assert_eq!(model.ids().unwrap(), vec!["a", "b", "c"]);
        assert!(model.any().unwrap());
    }

    #[test]
    fn empty_type() {
        let model = widgets();
        assert!(model.all().unwrap().is_empty());
        assert!(!model.any().unwrap());
        assert!(model.first().unwrap().is_none());
    }

    #[test]
    fn filter_by_value() {
        let model = seeded();
        let twos = model.filter(Query::new().eq("count", 2)).unwrap();
        assert_eq!(twos.len(), 2);

        let by_json = model.filter(Query::conditions(json!({"count": "2"})).unwrap()).unwrap();
        assert_eq!(by_json.len(), 2);

        let not_two = model.filter(AttrFilter::ne("count", 2)).unwrap();
        assert_eq!(not_two.len(), 1);
    }

    #[test]
    fn filter_with_predicate() {
        let model = seeded();
        let found = model
            .filter(Query::new().eq("count", 2).matching(|r| r.id() == "c"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "c");
    }

    #[test]
    fn filter_rejects_unknown_attribute() {
        let model = seeded();
        let err = model.filter(AttrFilter::eq("colour", "red")).unwrap_err();
        assert!(matches!(err, RecordError::InvalidAttribute { .. }));
    }

    #[test]
    fn sole_id_filter_is_point_lookup() {
        let model = seeded();
        assert_eq!(model.filter(AttrFilter::eq("id", "b")).unwrap().len(), 1);
        assert!(model.filter(AttrFilter::eq("id", "zzz")).unwrap().is_empty());
    }

    #[test]
    fn find_missing_is_not_found() {
        let err = widgets().find("nope").unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find Widget with id nope");
    }

    #[test]
    fn find_many_aggregates_misses() {
        let model = seeded();
        assert_eq!(model.find_many(&["a", "c"]).unwrap().len(), 2);

        let err = model.find_many(&["a", "x", "y"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Couldn't find all Widgets with ids: a, x, y (found 1 results, but was looking for 3)"
        );

        let none: [&str; 0] = [];
        assert!(matches!(
            model.find_many(&none),
            Err(RecordError::RecordNotFound(_))
        ));
    }

    #[test]
    fn find_by_variants() {
        let model = seeded();
        assert_eq!(model.find_by(AttrFilter::eq("count", 2)).unwrap().unwrap().id(), "b");
        assert!(model.find_by(AttrFilter::eq("count", 9)).unwrap().is_none());

        let err = model.find_by_strict(AttrFilter::eq("count", 9)).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find Widget with count: 9");
    }

    #[test]
    fn find_or_create_and_initialize() {
        let model = seeded();
        let existing = model.find_or_create_by(json!({"count": 1})).unwrap();
        assert_eq!(existing.id(), "a");

        let created = model.find_or_create_by(json!({"count": 7})).unwrap();
        assert!(created.is_persisted());
        assert_eq!(model.count().unwrap(), 4);

        let built = model.find_or_initialize_by(json!({"count": 8})).unwrap();
        assert!(built.is_new_record());
        assert_eq!(model.count().unwrap(), 4);
    }

    #[test]
    fn sole_lookups() {
        let model = seeded();
        assert_eq!(model.find_sole_by(AttrFilter::eq("count", 1)).unwrap().id(), "a");
        assert!(matches!(
            model.find_sole_by(AttrFilter::eq("count", 2)),
            Err(RecordError::SoleRecordExceeded { found: 2, .. })
        ));
        assert!(matches!(
            model.find_sole_by(AttrFilter::eq("count", 5)),
            Err(RecordError::RecordNotFound(_))
        ));
        assert!(matches!(model.sole(), Err(RecordError::SoleRecordExceeded { .. })));
    }

    #[test]
    fn ordinals() {
        let model = seeded();
        let id = |r: Option<Record>| r.map(|r| r.id().to_string());
        assert_eq!(id(model.first().unwrap()).as_deref(), Some("a"));
        assert_eq!(id(model.second().unwrap()).as_deref(), Some("b"));
        assert_eq!(id(model.third().unwrap()).as_deref(), Some("c"));
        assert_eq!(id(model.fourth().unwrap()), None);
        assert_eq!(id(model.fifth().unwrap()), None);
        assert_eq!(id(model.forty_two().unwrap()), None);
        assert_eq!(id(model.last().unwrap()).as_deref(), Some("c"));
        assert_eq!(id(model.second_to_last().unwrap()).as_deref(), Some("b"));
        assert_eq!(id(model.third_to_last().unwrap()).as_deref(), Some("a"));
    }

    #[test]
    fn delete_and_destroy_in_bulk() {
        let model = seeded();
        assert_eq!(model.delete_by(AttrFilter::eq("count", 2)).unwrap(), 2);
        assert_eq!(model.count().unwrap(), 1);

        let destroyed = model.destroy_all().unwrap();
        assert_eq!(destroyed.len(), 1);
        assert!(destroyed[0].is_destroyed());
        assert!(!model.any().unwrap());

        let model = seeded();
        assert_eq!(model.destroy_by(AttrFilter::eq("count", 1)).unwrap().len(), 1);
        assert_eq!(model.delete_all().unwrap(), 2);
    }

    #[test]
    fn vanished_keys_are_skipped() {
        let model = seeded();
        model.backend().delete("Widget:b").unwrap();
        assert_eq!(model.all().unwrap().len(), 2);
        assert!(!model.exists("b").unwrap());
        assert!(model.exists("a").unwrap());
    }

    #[test]
    fn filter_values_are_cast_like_the_attribute() {
        let events = Model::builder("Event")
            .attribute("at", crate::attributes::AttributeKind::DateTime)
            .attribute("public", crate::attributes::AttributeKind::Boolean)
            .build(Arc::new(crate::store::MemBackend::new()))
            .unwrap();
        events
            .create(json!({"at": "2024-01-01T00:00:00Z", "public": true}))
            .unwrap();
        events
            .create(json!({"at": "2024-02-01T00:00:00Z", "public": false}))
            .unwrap();

        let hits = events
            .filter(Query::conditions(json!({"at": "2024-01-01T00:00:00Z"})).unwrap())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(
            events
                .filter(AttrFilter::eq("at", "2024-01-01T01:00:00+01:00"))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(events.filter(AttrFilter::eq("public", "yes")).unwrap().len(), 1);
        assert_eq!(events.filter(AttrFilter::eq("public", 0)).unwrap().len(), 1);
        assert!(events.filter(AttrFilter::eq("public", "maybe")).unwrap().is_empty());
    }
}
