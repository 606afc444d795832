//! Chat message model and media references.
//!
//! These types describe what the external message source hands us: a message
//! identity (enough to cite it later) plus the attachments, embeds and inline
//! links that may carry images or videos.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Identity and citation metadata of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Platform message identifier
    pub id: String,
    /// Channel the message was posted in
    pub channel_id: String,
    /// Guild/server identifier, None for direct messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Thread identifier when the message was posted inside a thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Author identifier
    pub author_id: String,
    /// Author display name at the time of posting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// When the message was posted
    pub timestamp: DateTime<Utc>,
}

impl MessageRef {
    /// Whether both references point at the same chat message.
    pub fn same_message(&self, other: &MessageRef) -> bool {
        self.id == other.id && self.channel_id == other.channel_id
    }

    /// Whether the message lives inside a thread.
    pub fn in_thread(&self) -> bool {
        self.thread_id.is_some()
    }

    /// Permalink used when citing the message.
    pub fn jump_url(&self) -> String {
        let channel = self.thread_id.as_deref().unwrap_or(&self.channel_id);
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.guild_id.as_deref().unwrap_or("@me"),
            channel,
            self.id
        )
    }
}

/// A file uploaded with the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A rich embed attached to the message (link previews, bot embeds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// A chat message as delivered by the message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub reference: MessageRef,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub content: String,
}

/// Where a media reference was found inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Attachment,
    Embed,
    Thumbnail,
    InlineLink,
}

/// A single piece of media to fetch and fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub source: MediaSource,
    pub content_type: Option<String>,
}

impl Message {
    /// Collect every media reference carried by the message.
    ///
    /// Order: attachments, embed media, then http(s) links found in the text.
    /// Duplicate URLs keep their first occurrence.
    pub fn media(&self) -> Vec<MediaRef> {
        let mut seen = HashSet::new();
        let mut refs = Vec::new();

        let mut push = |url: &str, source: MediaSource, content_type: Option<String>| {
            if seen.insert(url.to_string()) {
                refs.push(MediaRef {
                    url: url.to_string(),
                    source,
                    content_type,
                });
            }
        };

        for attachment in &self.attachments {
            push(
                &attachment.url,
                MediaSource::Attachment,
                attachment.content_type.clone(),
            );
        }

        for embed in &self.embeds {
            if let Some(url) = &embed.image_url {
                push(url, MediaSource::Embed, None);
            }
            if let Some(url) = &embed.video_url {
                push(url, MediaSource::Embed, None);
            }
            if let Some(url) = &embed.thumbnail_url {
                push(url, MediaSource::Thumbnail, None);
            }
        }

        for url in inline_links(&self.content) {
            push(url.as_str(), MediaSource::InlineLink, None);
        }

        refs
    }
}

/// Extract http(s) URLs from free text.
fn inline_links(content: &str) -> Vec<Url> {
    content
        .split_whitespace()
        .map(|token| token.trim_matches(|c| matches!(c, '<' | '>' | '(' | ')' | '"' | '\'')))
        .filter_map(|token| Url::parse(token).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Broad media category, decides which extraction path runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify from a MIME type such as `image/png` or `video/mp4`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        if essence.starts_with("image/") {
            Some(Self::Image)
        } else if essence.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Classify from the file extension of a URL path.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();

        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" => Some(Self::Image),
            "mp4" | "mov" | "webm" | "mkv" | "avi" | "m4v" => Some(Self::Video),
            _ => None,
        }
    }

    /// Classify by looking at the leading bytes.
    pub fn sniff(data: &[u8]) -> Self {
        if crate::fingerprint::is_supported_image(data) {
            Self::Image
        } else if is_video_container(data) {
            Self::Video
        } else {
            Self::Unknown
        }
    }

    /// Best-effort classification: content type, then URL, then magic bytes.
    pub fn detect(content_type: Option<&str>, url: &str, data: &[u8]) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| Self::from_url(url))
            .unwrap_or_else(|| Self::sniff(data))
    }
}

fn is_video_container(data: &[u8]) -> bool {
    // ISO BMFF (mp4/mov) carries "ftyp" at offset 4
    let iso_bmff = data.len() >= 8 && &data[4..8] == b"ftyp";
    // Matroska/WebM EBML header
    let matroska = data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]);
    let avi = data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"AVI ";
    iso_bmff || matroska || avi
}
