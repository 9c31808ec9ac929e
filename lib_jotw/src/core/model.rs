use serde::{Deserialize, Serialize};

/// Opaque identifier of a community (a chat server / guild).
pub type CommunityId = String;
/// Opaque identifier of a user account.
pub type UserId = String;
/// Reference to a text channel polls are published to.
pub type ChannelId = String;

/// The submitter of a joke, as captured at submission time.
///
/// `username` is denormalized for display and may go stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAuthor {
    pub id: UserId,
    pub username: String,
}

/// # Entry
///
/// One submitted joke. Immutable once created; owned by exactly one
/// community's pending list until a poll cycle drains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub author: EntryAuthor,
    #[serde(rename = "joke")]
    pub text: String,
}

impl Entry {
    pub fn new(author_id: impl Into<UserId>, author_display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: EntryAuthor {
                id: author_id.into(),
                username: author_display_name.into(),
            },
            text: text.into(),
        }
    }

    pub fn author_id(&self) -> &str {
        &self.author.id
    }

    pub fn author_display_name(&self) -> &str {
        &self.author.username
    }
}

/// # Community
///
/// Per-community record: where polls go and which jokes are waiting for the
/// next cycle. The serialized form keeps the `guilds.json` field names
/// (`channel`, `jokes`) so existing data files load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    #[serde(rename = "channel", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ChannelId>,
    #[serde(rename = "jokes", default)]
    pub entries: Vec<Entry>,
}

impl Community {
    pub fn new(id: impl Into<CommunityId>, destination: Option<ChannelId>) -> Self {
        Self {
            id: id.into(),
            destination,
            entries: Vec::new(),
        }
    }
}
