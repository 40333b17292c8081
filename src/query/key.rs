//! Cache keys

use std::fmt;

/// Kind of backend resource a [`QueryKey`] points at. Freshness windows and
/// metrics labels are per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ConversationList,
    Conversation,
    Templates,
    Template,
}

impl ResourceKind {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConversationList => "conversation_list",
            ResourceKind::Conversation => "conversation",
            ResourceKind::Templates => "templates",
            ResourceKind::Template => "template",
        }
    }
}

/// Identity of one cache entry: resource kind plus its parameters.
///
/// Two consumers asking for equal keys share one entry and one in-flight
/// request.
///
/// # Examples
///
/// ```
/// use cvforge::query::QueryKey;
///
/// assert_eq!(QueryKey::conversation("c1").to_string(), "conversation:c1");
/// assert_eq!(QueryKey::templates(1, 9).to_string(), "templates:page=1:pageSize=9");
/// assert_ne!(QueryKey::conversation("c1"), QueryKey::conversation("c2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// All conversations of the signed-in user
    ConversationList,
    /// One conversation with its messages
    Conversation(String),
    /// One page of the PDF gallery
    Templates { page: u32, page_size: u32 },
    /// One PDF
    Template(String),
}

impl QueryKey {
    pub fn conversation(id: impl Into<String>) -> Self {
        QueryKey::Conversation(id.into())
    }

    pub fn templates(page: u32, page_size: u32) -> Self {
        QueryKey::Templates { page, page_size }
    }

    pub fn template(id: impl Into<String>) -> Self {
        QueryKey::Template(id.into())
    }

    /// The resource kind of this key.
    pub fn kind(&self) -> ResourceKind {
        match self {
            QueryKey::ConversationList => ResourceKind::ConversationList,
            QueryKey::Conversation(_) => ResourceKind::Conversation,
            QueryKey::Templates { .. } => ResourceKind::Templates,
            QueryKey::Template(_) => ResourceKind::Template,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::ConversationList => f.write_str("conversations"),
            QueryKey::Conversation(id) => write!(f, "conversation:{}", id),
            QueryKey::Templates { page, page_size } => {
                write!(f, "templates:page={}:pageSize={}", page, page_size)
            }
            QueryKey::Template(id) => write!(f, "template:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_hash_by_parameters() {
        let mut set = HashSet::new();
        set.insert(QueryKey::templates(1, 9));
        set.insert(QueryKey::templates(1, 9));
        set.insert(QueryKey::templates(2, 9));
        set.insert(QueryKey::conversation("c1"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_kind() {
        assert_eq!(QueryKey::ConversationList.kind(), ResourceKind::ConversationList);
        assert_eq!(QueryKey::template("p").kind().as_str(), "template");
    }
}
