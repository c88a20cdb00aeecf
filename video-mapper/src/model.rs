use serde::{Deserialize, Serialize};
use serde_json::Number;

pub const CONTENT_URI_BASE: &str = "http://next-video-mapper.svc.ft.com/video/model/";
pub const VIDEO_AUTHORITY: &str = "http://api.ft.com/system/NEXT-VIDEO-EDITOR";
pub const FT_BRAND_ID: &str = "http://api.ft.com/things/dbb0bdae-1f0c-11e4-b0cb-b2227cce2b54";
pub const WEB_URL_BASE: &str = "https://www.ft.com/content/";
pub const CAN_BE_DISTRIBUTED: &str = "yes";
pub const ACCESS_LEVEL: &str = "free";
pub const VIDEO_TYPE: &str = "MediaResource";

/// Event published downstream for every mapped native video message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationEvent {
    pub content_uri: String,
    pub payload: VideoPayload,
    pub last_modified: String,
}

impl PublicationEvent {
    pub fn new(content_id: &str, payload: VideoPayload, last_modified: String) -> Self {
        PublicationEvent {
            content_uri: format!("{CONTENT_URI_BASE}{content_id}"),
            payload,
            last_modified,
        }
    }

    /// Serializes the event. Markup in string fields is kept as-is, `<`, `>`
    /// and `&` are never escaped.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    #[serde(rename = "uuid")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standfirst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brands: Vec<Brand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captions: Vec<Caption>,
    #[serde(default, rename = "dataSource", skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_be_distributed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_be_syndicated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_web_url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotional_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotional_standfirst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl VideoPayload {
    /// Payload of an unpublish event: the identifier and the deletion flag.
    pub fn deletion(id: &str) -> Self {
        VideoPayload {
            id: id.to_owned(),
            deleted: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub authority: String,
    pub identifier_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub url: String,
    pub media_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_width: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_height: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}
