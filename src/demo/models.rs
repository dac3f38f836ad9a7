//! Typed documents for the sample collections

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Raw bytes of the id targeted by the update-by-id step
pub const SAMPLE_PODCAST_ID: [u8; 12] = [
    0x61, 0x04, 0x14, 0x77, 0x8b, 0x0a, 0x99, 0xf9, 0xbc, 0x7f, 0x24, 0x8b,
];

pub fn sample_podcast_id() -> ObjectId {
    ObjectId::from_bytes(SAMPLE_PODCAST_ID)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Podcast {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Id of the owning podcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Length in minutes
    #[serde(default)]
    pub duration: i32,
}
