use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinWorkspaceRequest {
    pub code: String,
}
