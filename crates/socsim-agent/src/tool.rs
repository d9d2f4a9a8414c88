//! Data access for the workflow.
//!
//! [`InteractionTool`] is the agent's only window onto users, items and
//! reviews. [`DatasetTool`] serves them from the JSON-lines files produced by
//! the dataset preparation step (`user.json`, `item.json`, `review.json`).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A stored review. Fields beyond the known ones are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            review_id: None,
            user_id: None,
            item_id: None,
            stars: None,
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// Filter for [`InteractionTool::get_reviews`]. Set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewQuery {
    pub user_id: Option<String>,
    pub item_id: Option<String>,
}

impl ReviewQuery {
    pub fn for_item(item_id: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            ..Self::default()
        }
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    fn matches(&self, review: &Review) -> bool {
        let user_ok = self
            .user_id
            .as_ref()
            .is_none_or(|id| review.user_id.as_ref() == Some(id));
        let item_ok = self
            .item_id
            .as_ref()
            .is_none_or(|id| review.item_id.as_ref() == Some(id));
        user_ok && item_ok
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Lookups the workflow performs. A missing record is `Ok(None)`; `Err` means
/// the lookup itself failed.
#[async_trait]
pub trait InteractionTool: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<Value>>;

    async fn get_item(&self, item_id: &str) -> Result<Option<Value>>;

    /// Matching reviews in dataset order.
    async fn get_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>>;
}

// ---------------------------------------------------------------------------
// Dataset-backed implementation
// ---------------------------------------------------------------------------

/// In-memory indexes over a prepared dataset directory.
#[derive(Debug, Default)]
pub struct DatasetTool {
    users: HashMap<String, Value>,
    items: HashMap<String, Value>,
    reviews: Vec<Review>,
    reviews_by_item: HashMap<String, Vec<usize>>,
    reviews_by_user: HashMap<String, Vec<usize>>,
}

impl DatasetTool {
    /// Load `user.json`, `item.json` and `review.json` from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let users = index_records(read_json_lines(&dir.join("user.json"))?, "user_id");
        let items = index_records(read_json_lines(&dir.join("item.json"))?, "item_id");

        let review_path = dir.join("review.json");
        let reviews = read_json_lines(&review_path)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Review>, _>>()
            .map_err(|e| AgentError::Dataset {
                path: review_path,
                reason: e.to_string(),
            })?;

        info!(
            dir = %dir.display(),
            users = users.len(),
            items = items.len(),
            reviews = reviews.len(),
            "dataset loaded"
        );
        Ok(Self::from_parts(users, items, reviews))
    }

    /// Build from records already in memory.
    pub fn from_parts(
        users: HashMap<String, Value>,
        items: HashMap<String, Value>,
        reviews: Vec<Review>,
    ) -> Self {
        let mut reviews_by_item: HashMap<String, Vec<usize>> = HashMap::new();
        let mut reviews_by_user: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, review) in reviews.iter().enumerate() {
            if let Some(item) = &review.item_id {
                reviews_by_item.entry(item.clone()).or_default().push(i);
            }
            if let Some(user) = &review.user_id {
                reviews_by_user.entry(user.clone()).or_default().push(i);
            }
        }
        Self {
            users,
            items,
            reviews,
            reviews_by_item,
            reviews_by_user,
        }
    }
}

#[async_trait]
impl InteractionTool for DatasetTool {
    async fn get_user(&self, user_id: &str) -> Result<Option<Value>> {
        Ok(self.users.get(user_id).cloned())
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<Value>> {
        Ok(self.items.get(item_id).cloned())
    }

    async fn get_reviews(&self, query: &ReviewQuery) -> Result<Vec<Review>> {
        let candidates: Box<dyn Iterator<Item = &Review> + '_> = match (&query.item_id, &query.user_id) {
            (Some(item), _) => Box::new(
                self.reviews_by_item
                    .get(item)
                    .into_iter()
                    .flatten()
                    .map(|i| &self.reviews[*i]),
            ),
            (None, Some(user)) => Box::new(
                self.reviews_by_user
                    .get(user)
                    .into_iter()
                    .flatten()
                    .map(|i| &self.reviews[*i]),
            ),
            (None, None) => Box::new(self.reviews.iter()),
        };
        Ok(candidates.filter(|r| query.matches(r)).cloned().collect())
    }
}

/// Parse a JSON-lines file. Blank lines are skipped.
fn read_json_lines(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|e| AgentError::Dataset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| AgentError::Dataset {
                path: path.to_path_buf(),
                reason: format!("line {}: {e}", n + 1),
            })
        })
        .collect()
}

/// Key records by a string field; records without it are dropped.
fn index_records(records: Vec<Value>, key: &str) -> HashMap<String, Value> {
    let total = records.len();
    let map: HashMap<String, Value> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.get(key)?.as_str()?.to_owned();
            Some((id, record))
        })
        .collect();
    if map.len() < total {
        warn!(key, dropped = total - map.len(), "records without a usable id");
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dataset(dir: &Path) {
        std::fs::write(
            dir.join("user.json"),
            "{\"user_id\":\"u1\",\"name\":\"Ann\"}\n{\"user_id\":\"u2\",\"name\":\"Bo\"}\n",
        )
        .unwrap();
        std::fs::write(dir.join("item.json"), "{\"item_id\":\"b1\",\"name\":\"Cafe\"}\n\n").unwrap();
        std::fs::write(
            dir.join("review.json"),
            concat!(
                "{\"review_id\":\"r1\",\"user_id\":\"u2\",\"item_id\":\"b1\",\"stars\":4.0,\"text\":\"Nice.\",\"useful\":2}\n",
                "{\"review_id\":\"r2\",\"user_id\":\"u1\",\"item_id\":\"b2\",\"stars\":1.0,\"text\":\"Bad.\"}\n",
                "{\"review_id\":\"r3\",\"user_id\":\"u1\",\"item_id\":\"b1\",\"stars\":5.0,\"text\":\"Great.\"}\n",
            ),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn loads_and_indexes_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let tool = DatasetTool::load(dir.path()).unwrap();

        assert_eq!(tool.get_user("u1").await.unwrap().unwrap()["name"], "Ann");
        assert!(tool.get_user("nobody").await.unwrap().is_none());
        assert_eq!(tool.get_item("b1").await.unwrap().unwrap()["name"], "Cafe");

        let item_reviews = tool.get_reviews(&ReviewQuery::for_item("b1")).await.unwrap();
        let ids: Vec<_> = item_reviews.iter().map(|r| r.review_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
        assert_eq!(item_reviews[0].extra["useful"], 2);

        let user_reviews = tool.get_reviews(&ReviewQuery::for_user("u1")).await.unwrap();
        assert_eq!(user_reviews[0].text, "Bad.");

        let both = ReviewQuery {
            user_id: Some("u1".into()),
            item_id: Some("b1".into()),
        };
        assert_eq!(tool.get_reviews(&both).await.unwrap().len(), 1);
    }

    #[test]
    fn missing_file_is_dataset_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetTool::load(dir.path()).unwrap_err();
        assert!(matches!(err, AgentError::Dataset { .. }));
    }

    #[test]
    fn bad_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.json"), "{}\nnot json\n").unwrap();
        let err = DatasetTool::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
