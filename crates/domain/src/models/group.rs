//! Group domain model.

use serde::{Deserialize, Serialize};

/// A device group as reported by the tracking platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Group {
    /// Name shown on the map, `Group {id}` when the platform has none.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Group {}", self.id))
    }
}
