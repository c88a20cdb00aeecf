use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};
use tracing::warn;
use uuid::Uuid;

use crate::document::Document;
use crate::error::{ExtractionError, FieldError, IdentifierError, MapperError};
use crate::identifier::IdentifierDeriver;
use crate::message::{Message, MESSAGE_TIMESTAMP_HEADER, REQUEST_ID_HEADER};
use crate::model::{
    Brand, Caption, DataSource, Identifier, PublicationEvent, VideoPayload, ACCESS_LEVEL,
    CAN_BE_DISTRIBUTED, FT_BRAND_ID, VIDEO_AUTHORITY, VIDEO_TYPE, WEB_URL_BASE,
};
use crate::time::{SystemTime, TimeSource};
use crate::transcript;

const FIRST_PUBLISHED_KEYS: &[&str] = &["firstPublishedAt", "createdAt"];
const PUBLISHED_KEYS: &[&str] = &["publishedAt", "updatedAt", "createdAt"];

static UUID_IN_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$")
        .expect("uuid regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Publish,
    Unpublish,
}

impl EventKind {
    fn of(video: &Document<'_>) -> Self {
        match video.get_bool("deleted") {
            Ok(true) => EventKind::Unpublish,
            _ => EventKind::Publish,
        }
    }

    /// Keys the content id is read from, by priority. Unpublish events from
    /// older editor versions still carry the id as `uuid`.
    fn id_keys(self) -> &'static [&'static str] {
        match self {
            EventKind::Publish => &["id"],
            EventKind::Unpublish => &["id", "uuid"],
        }
    }
}

/// A field that could not be mapped. The field is left out of the payload.
#[derive(Debug)]
pub struct MappingWarning {
    pub field: &'static str,
    pub error: ExtractionError,
}

#[derive(Debug)]
pub struct MappedEvent {
    pub content_id: String,
    pub transaction_id: String,
    /// Event timestamp, from the message or substituted at mapping time
    pub last_modified: String,
    pub event: PublicationEvent,
    pub body: Vec<u8>,
    pub warnings: Vec<MappingWarning>,
}

#[derive(Clone)]
pub struct VideoMapper {
    deriver: IdentifierDeriver,
    time_source: Arc<dyn TimeSource + Send + Sync>,
}

impl Default for VideoMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoMapper {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTime {}))
    }

    pub fn with_time_source(time_source: Arc<dyn TimeSource + Send + Sync>) -> Self {
        VideoMapper {
            deriver: IdentifierDeriver::new(),
            time_source,
        }
    }

    /// Maps a native video message into a serialized publication event.
    ///
    /// Only a missing correlation id, an unparseable body or a missing
    /// content id fail the mapping. Problems with any other field are
    /// returned as warnings and the field is omitted.
    pub fn transform(&self, message: &Message) -> Result<MappedEvent, MapperError> {
        let transaction_id = message
            .header(REQUEST_ID_HEADER)
            .ok_or(MapperError::MissingCorrelationId)?
            .to_owned();
        let last_modified = match message.header(MESSAGE_TIMESTAMP_HEADER) {
            Some(timestamp) => timestamp.to_owned(),
            None => self.time_source.current_time(),
        };

        let body: Value = serde_json::from_slice(&message.body)
            .map_err(|err| MapperError::MalformedPayload(err.to_string()))?;
        let fields = body
            .as_object()
            .ok_or_else(|| MapperError::MalformedPayload("expected a JSON object".to_owned()))?;
        let video = Document::new(fields);

        let kind = EventKind::of(&video);
        let content_id = video
            .first_string(kind.id_keys())
            .map_err(MapperError::MissingContentId)?
            .to_owned();

        let mut warnings = Vec::new();
        let payload = match kind {
            EventKind::Unpublish => VideoPayload::deletion(&content_id),
            EventKind::Publish => self.video_payload(
                &video,
                &content_id,
                &transaction_id,
                &last_modified,
                &mut warnings,
            ),
        };

        for warning in &warnings {
            warn!(
                event = "mapping",
                transaction_id = %transaction_id,
                uuid = %content_id,
                field = warning.field,
                "{}",
                warning.error
            );
        }

        let event = PublicationEvent::new(&content_id, payload, last_modified.clone());
        let body = event
            .to_json()
            .map_err(|error| MapperError::Serialization {
                uuid: content_id.clone(),
                error,
            })?;

        Ok(MappedEvent {
            content_id,
            transaction_id,
            last_modified,
            event,
            body,
            warnings,
        })
    }

    fn video_payload(
        &self,
        video: &Document<'_>,
        content_id: &str,
        transaction_id: &str,
        last_modified: &str,
        warnings: &mut Vec<MappingWarning>,
    ) -> VideoPayload {
        let mut notes = Warnings(warnings);

        let published_date = video
            .first_string(PUBLISHED_KEYS)
            .map_err(|err| notes.push("publishedDate", err))
            .ok()
            .map(str::to_owned);

        let main_image = match video.get_string("image") {
            Ok(image) => self
                .main_image(image)
                .map_err(|err| notes.push("mainImage", err))
                .ok(),
            Err(err) => notes.unless_missing("mainImage", err),
        };

        let story_package = match video.get_list("related") {
            Ok(related) if !related.is_empty() => self
                .deriver
                .story_package(content_id)
                .map_err(|err| notes.push("storyPackage", err))
                .ok(),
            _ => None,
        };

        let (transcript, captions) = match transcription(video) {
            Ok(Some((transcript, transcription))) => {
                (Some(transcript), captions(&transcription, &mut notes))
            }
            Ok(None) => (None, Vec::new()),
            Err(err) => {
                notes.push("transcript", err);
                (None, Vec::new())
            }
        };

        let can_be_syndicated = match video.get_bool("canBeSyndicated") {
            Ok(true) => "yes",
            Ok(false) => "no",
            Err(err) => {
                notes.push("canBeSyndicated", err);
                "yes"
            }
        };

        VideoPayload {
            id: content_id.to_owned(),
            title: text(video, "title", &mut notes),
            standfirst: text(video, "standfirst", &mut notes),
            description: text(video, "description", &mut notes),
            byline: text(video, "byline", &mut notes),
            identifiers: vec![Identifier {
                authority: VIDEO_AUTHORITY.to_owned(),
                identifier_value: content_id.to_owned(),
            }],
            brands: vec![Brand {
                id: FT_BRAND_ID.to_owned(),
            }],
            first_published_date: video
                .first_string(FIRST_PUBLISHED_KEYS)
                .ok()
                .map(str::to_owned),
            published_date,
            main_image,
            story_package,
            transcript,
            captions,
            data_sources: data_sources(video, &mut notes),
            can_be_distributed: Some(CAN_BE_DISTRIBUTED.to_owned()),
            can_be_syndicated: Some(can_be_syndicated.to_owned()),
            access_level: Some(ACCESS_LEVEL.to_owned()),
            web_url: Some(format!("{WEB_URL_BASE}{content_id}")),
            canonical_web_url: Some(format!("{WEB_URL_BASE}{content_id}")),
            content_type: Some(VIDEO_TYPE.to_owned()),
            last_modified: Some(last_modified.to_owned()),
            publish_reference: Some(transaction_id.to_owned()),
            promotional_title: nested_text(
                video,
                "alternativeTitles",
                "promotionalTitle",
                &mut notes,
            ),
            promotional_standfirst: nested_text(
                video,
                "alternativeStandfirsts",
                "promotionalStandfirst",
                &mut notes,
            ),
            deleted: None,
        }
    }

    /// A bare identifier is kept, in lowercase hyphenated form. A reference
    /// ending with an image id is mapped to the id of the matching image set.
    fn main_image(&self, image: &str) -> Result<String, ExtractionError> {
        if let Ok(id) = Uuid::parse_str(image) {
            return Ok(id.hyphenated().to_string());
        }
        let captures = UUID_IN_URI
            .captures(image)
            .ok_or_else(|| IdentifierError::NotFoundInUri(image.to_owned()))?;
        Ok(self.deriver.image_set(&captures[1])?)
    }
}

struct Warnings<'w>(&'w mut Vec<MappingWarning>);

impl Warnings<'_> {
    fn push(&mut self, field: &'static str, error: impl Into<ExtractionError>) {
        self.0.push(MappingWarning {
            field,
            error: error.into(),
        });
    }

    /// Records `error` unless the field is simply absent.
    fn unless_missing<T>(&mut self, field: &'static str, error: FieldError) -> Option<T> {
        if !matches!(error, FieldError::MissingField(_)) {
            self.push(field, error);
        }
        None
    }
}

fn text(video: &Document<'_>, key: &'static str, notes: &mut Warnings<'_>) -> Option<String> {
    match video.get_string(key) {
        Ok("") => None,
        Ok(value) => Some(value.to_owned()),
        Err(err) => notes.unless_missing(key, err),
    }
}

fn nested_text(
    video: &Document<'_>,
    parent: &str,
    key: &'static str,
    notes: &mut Warnings<'_>,
) -> Option<String> {
    match video.get_document(parent) {
        Ok(nested) => text(&nested, key, notes),
        Err(err) => notes.unless_missing(key, err),
    }
}

/// The transcript if it is present and well-formed, along with the
/// transcription document the captions are read from.
fn transcription<'a>(
    video: &Document<'a>,
) -> Result<Option<(String, Document<'a>)>, ExtractionError> {
    let transcription = video.get_document("transcription")?;
    let transcript = transcription.get_string("transcript")?;
    if transcript.is_empty() {
        return Ok(None);
    }
    if !transcript::is_well_formed(transcript) {
        return Err(ExtractionError::InvalidTranscript);
    }
    Ok(Some((transcript.to_owned(), transcription)))
}

fn captions(transcription: &Document<'_>, notes: &mut Warnings<'_>) -> Vec<Caption> {
    let elements = match transcription.get_list("captions") {
        Ok(elements) => elements,
        Err(err) => return notes.unless_missing("captions", err).unwrap_or_default(),
    };

    let mut captions = Vec::with_capacity(elements.len());
    for element in elements {
        let caption = Document::from_value(element)
            .ok_or_else(|| FieldError::TypeMismatch {
                key: "captions".to_owned(),
                expected: "document",
            })
            .and_then(|caption| {
                Ok(Caption {
                    url: caption.get_string("url")?.to_owned(),
                    media_type: caption.get_string("mediaType")?.to_owned(),
                })
            });
        match caption {
            Ok(caption) => captions.push(caption),
            Err(err) => notes.push("captions", err),
        }
    }
    captions
}

fn data_sources(video: &Document<'_>, notes: &mut Warnings<'_>) -> Vec<DataSource> {
    let outputs = match video
        .get_document("encoding")
        .and_then(|encoding| encoding.get_list("outputs"))
    {
        Ok(outputs) => outputs,
        Err(err) => {
            notes.push("dataSource", err);
            return Vec::new();
        }
    };

    let mut sources = Vec::with_capacity(outputs.len());
    for output in outputs {
        let Some(output) = Document::from_value(output) else {
            notes.push(
                "dataSource",
                FieldError::TypeMismatch {
                    key: "outputs".to_owned(),
                    expected: "document",
                },
            );
            continue;
        };
        let string = |key: &str| {
            output
                .get_string(key)
                .ok()
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        sources.push(DataSource {
            binary_url: string("url"),
            pixel_width: number(&output, "width"),
            pixel_height: number(&output, "height"),
            media_type: string("mediaType"),
            duration: number(&output, "duration"),
            video_codec: string("videoCodec"),
            audio_codec: string("audioCodec"),
        });
    }
    sources
}

/// Whole numbers are written without a fraction, `640.0` becomes `640`.
fn number(output: &Document<'_>, key: &str) -> Option<Number> {
    let number = output.get_number(key).ok()?;
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e15 => {
            Some(Number::from(value as i64))
        }
        _ => Some(number.clone()),
    }
}
