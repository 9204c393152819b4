use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A stored to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: i64,
    pub name: Option<String>,
    pub is_complete: bool,
}

/// Request body for creating or replacing a to-do item.
///
/// An absent or zero `id` asks the database to assign one; any other value
/// is stored as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
}

impl CreateTodoItem {
    /// The identifier the client asked for, if any.
    pub fn requested_id(&self) -> Option<i64> {
        self.id.filter(|id| *id != 0)
    }
}
