use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::{validate_name, ValidationError};
use crate::models::TaskStatus;

pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Highest position a client may set. Leaves room for new tasks to be
/// stacked below it.
pub const MAX_POSITION: i64 = 1_000_000_000_000_000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub workspace_id: Uuid,
    pub project_id: Uuid,
    pub assignee_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl CreateTaskRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.title = validate_name("title", &self.title)?;
        self.description = validate_description(self.description)?;
        Ok(self)
    }
}

/// Partial update. A `description` of `""` clears the stored one, and a
/// `dueDate` of `null` removes the due date.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl UpdateTaskRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        if let Some(title) = &self.title {
            self.title = Some(validate_name("title", title)?);
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(description_too_long());
            }
        }
        if let Some(position) = self.position {
            validate_position(position)?;
        }
        Ok(self)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkTaskUpdate {
    pub id: Uuid,
    pub status: TaskStatus,
    pub position: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateTasksRequest {
    pub tasks: Vec<BulkTaskUpdate>,
}

impl BulkUpdateTasksRequest {
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.tasks.is_empty() {
            return Err(ValidationError::new("tasks", "Required"));
        }
        for task in &self.tasks {
            validate_position(task.position)?;
        }
        Ok(self)
    }
}

/// Tells a field sent as `null` (`Some(None)`) from one left out (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_position(position: i64) -> Result<(), ValidationError> {
    if position < 0 {
        return Err(ValidationError::new("position", "Must not be negative"));
    }
    if position > MAX_POSITION {
        return Err(ValidationError::new(
            "position",
            format!("Must be at most {}", MAX_POSITION),
        ));
    }
    Ok(())
}

fn validate_description(description: Option<String>) -> Result<Option<String>, ValidationError> {
    match description {
        Some(d) if d.trim().is_empty() => Ok(None),
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(description_too_long()),
        other => Ok(other),
    }
}

fn description_too_long() -> ValidationError {
    ValidationError::new(
        "description",
        format!("Must be at most {} characters", MAX_DESCRIPTION_LEN),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses_camel_case() {
        let json = serde_json::json!({
            "workspaceId": Uuid::nil(),
            "projectId": Uuid::nil(),
            "assigneeId": Uuid::nil(),
            "title": " Write docs ",
            "status": "in_progress",
            "description": "  ",
        });
        let req: CreateTaskRequest = serde_json::from_value(json).unwrap();
        let req = req.validate().unwrap();
        assert_eq!(req.title, "Write docs");
        assert_eq!(req.status, TaskStatus::InProgress);
        assert!(req.description.is_none());
    }

    #[test]
    fn negative_position_is_rejected() {
        let req = UpdateTaskRequest {
            position: Some(-1),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err().field, "position");
    }

    #[test]
    fn null_due_date_differs_from_missing() {
        let cleared: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "dueDate": null })).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let untouched: UpdateTaskRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(untouched.due_date, None);

        let set: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "dueDate": "2026-11-01" })).unwrap();
        assert_eq!(set.due_date, NaiveDate::from_ymd_opt(2026, 11, 1).map(Some));
    }

    #[test]
    fn oversized_position_is_rejected() {
        let req = UpdateTaskRequest {
            position: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err().field, "position");

        let req = BulkUpdateTasksRequest {
            tasks: vec![BulkTaskUpdate {
                id: Uuid::nil(),
                status: TaskStatus::Todo,
                position: MAX_POSITION + 1,
            }],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_bulk_update_is_rejected() {
        let req = BulkUpdateTasksRequest { tasks: vec![] };
        assert!(req.validate().is_err());
    }
}
