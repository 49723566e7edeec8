use serde::{Deserialize, Serialize};
use std::fmt;

/// A blog post as served by the `posts` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_id: u64,
    pub id: u64,
    pub title: String,
    pub body: String,
}

/// Path identifier used by `posts/getPostById`.
///
/// Kept as a string so callers can pass whatever the server accepts as a path
/// segment (`"5"`, a slug, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for PostId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_uses_camel_case_wire_names() {
        let json = serde_json::json!({
            "userId": 1,
            "id": 5,
            "title": "nesciunt quas odio",
            "body": "repudiandae veniam quaerat"
        });
        let post: Post = serde_json::from_value(json).unwrap();
        assert_eq!(post.user_id, 1);
        assert_eq!(post.id, 5);
    }

    #[test]
    fn test_post_id_serializes_as_plain_string() {
        let id = PostId::from(5);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"5\"");
        assert_eq!(id.to_string(), "5");
    }
}
