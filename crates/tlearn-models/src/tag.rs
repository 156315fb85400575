//! Tags and their many-to-many link to videos.
//!
//! Tags are organizational glue; the pipeline never branches on them, but
//! the exporter embeds them in frontmatter.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

impl Tag {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}
