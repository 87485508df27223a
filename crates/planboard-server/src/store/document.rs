use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use planboard_shared::{MemberRole, TaskStatus};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::StoreError;

/// Fields every document carries outside of its data map.
pub(crate) const SYSTEM_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Workspaces,
    Members,
    Projects,
    Tasks,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Workspaces => "workspaces",
            Self::Members => "members",
            Self::Projects => "projects",
            Self::Tasks => "tasks",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Document {
    /// Reads a field as JSON, system fields included.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "created_at" => Some(Value::String(self.created_at.to_rfc3339())),
            "updated_at" => Some(Value::String(self.updated_at.to_rfc3339())),
            _ => self.data.get(name).cloned(),
        }
    }

    pub fn into_model<T: DeserializeOwned>(self) -> Result<T, StoreError> {
        let mut map = self.data;
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert(
            "created_at".to_string(),
            serde_json::to_value(self.created_at)?,
        );
        map.insert(
            "updated_at".to_string(),
            serde_json::to_value(self.updated_at)?,
        );
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Orders two documents by `field`, falling back to creation time.
    pub(crate) fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        let ordering = match field {
            "id" => self.id.cmp(&other.id),
            "created_at" => self.created_at.cmp(&other.created_at),
            "updated_at" => self.updated_at.cmp(&other.updated_at),
            _ => compare_values(self.data.get(field), other.data.get(field)),
        };
        ordering.then_with(|| self.created_at.cmp(&other.created_at))
    }
}

/// Serializes a model into a document data map, minus the system fields.
pub fn document_data<T: Serialize>(model: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(strip_system_fields(map)),
        other => Err(StoreError::InvalidQuery(format!(
            "document data must be an object, got {}",
            other
        ))),
    }
}

pub(crate) fn strip_system_fields(mut data: Map<String, Value>) -> Map<String, Value> {
    for field in SYSTEM_FIELDS {
        data.remove(field);
    }
    data
}

/// Values a filter can compare against, in the JSON form they take inside
/// stored documents.
pub trait FilterValue {
    fn into_filter_value(self) -> Value;
}

impl FilterValue for Value {
    fn into_filter_value(self) -> Value {
        self
    }
}

impl FilterValue for Uuid {
    fn into_filter_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FilterValue for &str {
    fn into_filter_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FilterValue for String {
    fn into_filter_value(self) -> Value {
        Value::String(self)
    }
}

impl FilterValue for i64 {
    fn into_filter_value(self) -> Value {
        Value::from(self)
    }
}

impl FilterValue for DateTime<Utc> {
    fn into_filter_value(self) -> Value {
        Value::String(self.to_rfc3339())
    }
}

impl FilterValue for NaiveDate {
    fn into_filter_value(self) -> Value {
        Value::String(self.format("%Y-%m-%d").to_string())
    }
}

impl FilterValue for TaskStatus {
    fn into_filter_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl FilterValue for MemberRole {
    fn into_filter_value(self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Value),
    /// Field equals any of the values.
    Any(String, Vec<Value>),
    /// Case-insensitive substring match on a string field.
    Search(String, String),
    OrderAsc(String),
    OrderDesc(String),
}

impl Query {
    pub fn equal(field: &str, value: impl FilterValue) -> Self {
        Self::Equal(field.to_string(), value.into_filter_value())
    }

    pub fn any<V: FilterValue>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::Any(
            field.to_string(),
            values.into_iter().map(FilterValue::into_filter_value).collect(),
        )
    }

    pub fn search(field: &str, text: impl Into<String>) -> Self {
        Self::Search(field.to_string(), text.into())
    }

    pub fn order_asc(field: &str) -> Self {
        Self::OrderAsc(field.to_string())
    }

    pub fn order_desc(field: &str) -> Self {
        Self::OrderDesc(field.to_string())
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Equal(f, _)
            | Self::Any(f, _)
            | Self::Search(f, _)
            | Self::OrderAsc(f)
            | Self::OrderDesc(f) => f,
        }
    }

    /// Whether a document passes this filter. Ordering queries match everything.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Equal(field, value) => field_matches(doc, field, value),
            Self::Any(field, values) => values.iter().any(|v| field_matches(doc, field, v)),
            Self::Search(field, text) => match doc.field(field) {
                Some(Value::String(s)) => s.to_lowercase().contains(&text.to_lowercase()),
                _ => false,
            },
            Self::OrderAsc(_) | Self::OrderDesc(_) => true,
        }
    }
}

/// Rejects field names that are not plain identifiers.
pub(crate) fn validate_queries(queries: &[Query]) -> Result<(), StoreError> {
    for query in queries {
        let field = query.field();
        let valid = !field.is_empty()
            && field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(StoreError::InvalidQuery(format!(
                "invalid field name '{}'",
                field
            )));
        }
    }
    Ok(())
}

fn field_matches(doc: &Document, field: &str, expected: &Value) -> bool {
    match field {
        "created_at" => parse_timestamp(expected) == Some(doc.created_at),
        "updated_at" => parse_timestamp(expected) == Some(doc.updated_at),
        _ => doc
            .field(field)
            .is_some_and(|actual| value_key(&actual) == value_key(expected)),
    }
}

/// Reads an RFC 3339 timestamp filter value.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Text form used for equality: strings by content, anything else by its JSON text.
pub(crate) fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents matching every filter in `queries`, ordered by the first
    /// ordering query (creation time ascending when there is none).
    async fn list_documents(
        &self,
        collection: Collection,
        queries: &[Query],
    ) -> Result<Vec<Document>, StoreError>;

    async fn get_document(&self, collection: Collection, id: Uuid) -> Result<Document, StoreError>;

    async fn create_document(
        &self,
        collection: Collection,
        id: Uuid,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    /// Shallow merge of `patch` into the stored data. `null` removes a field.
    async fn update_document(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    async fn delete_document(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            data: match data {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    #[test]
    fn equal_matches_uuid_strings() {
        let workspace_id = Uuid::new_v4();
        let d = doc(json!({ "workspace_id": workspace_id }));
        assert!(Query::equal("workspace_id", workspace_id).matches(&d));
        assert!(!Query::equal("workspace_id", Uuid::new_v4()).matches(&d));
    }

    #[test]
    fn filter_values_match_stored_form() {
        let due = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let d = doc(json!({
            "status": TaskStatus::InProgress,
            "role": MemberRole::Admin,
            "due_date": due,
            "position": 2000,
        }));
        assert!(Query::equal("status", TaskStatus::InProgress).matches(&d));
        assert!(Query::equal("role", MemberRole::Admin).matches(&d));
        assert!(Query::equal("due_date", due).matches(&d));
        assert!(Query::equal("position", 2000_i64).matches(&d));
        assert!(!Query::equal("status", TaskStatus::Done).matches(&d));
    }

    #[test]
    fn timestamps_compare_as_instants() {
        let d = doc(json!({}));
        let shifted = d
            .created_at
            .with_timezone(&chrono::FixedOffset::east_opt(2 * 3600).unwrap())
            .to_rfc3339();
        assert!(Query::equal("created_at", d.created_at).matches(&d));
        assert!(Query::equal("created_at", shifted.as_str()).matches(&d));
        assert!(!Query::equal("created_at", "not a date").matches(&d));
    }

    #[test]
    fn any_matches_system_id() {
        let d = doc(json!({}));
        assert!(Query::any("id", [Uuid::new_v4(), d.id]).matches(&d));
        assert!(!Query::any("id", Vec::<Uuid>::new()).matches(&d));
    }

    #[test]
    fn search_is_case_insensitive() {
        let d = doc(json!({ "title": "Fix Login Page" }));
        assert!(Query::search("title", "login").matches(&d));
        assert!(!Query::search("title", "signup").matches(&d));
    }

    #[test]
    fn numbers_order_numerically() {
        let a = doc(json!({ "position": 900 }));
        let b = doc(json!({ "position": 10000 }));
        assert_eq!(a.compare_by(&b, "position"), Ordering::Less);
    }

    #[test]
    fn invalid_field_names_are_rejected() {
        assert!(validate_queries(&[Query::equal("name", "x")]).is_ok());
        assert!(validate_queries(&[Query::equal("name'; --", "x")]).is_err());
        assert!(validate_queries(&[Query::order_desc("")]).is_err());
    }

    #[test]
    fn into_model_restores_system_fields() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: Uuid,
            name: String,
        }
        let d = doc(json!({ "name": "Demo" }));
        let id = d.id;
        let named: Named = d.into_model().unwrap();
        assert_eq!(named.id, id);
        assert_eq!(named.name, "Demo");
    }
}
