//! Platform-specific content formatting.
//!
//! Pure functions mapping a [`ContentItem`] (plus an optional custom
//! message) to a payload that fits each platform's hard limits. Truncation
//! always yields a valid payload; overflow is never an error.

use serde::Serialize;
use url::Url;

use crate::error::Result;
use crate::types::{ContentItem, Platform};

/// Instagram caption + CTA + hashtag block upper bound.
pub const INSTAGRAM_CAPTION_LIMIT: usize = 2200;
const INSTAGRAM_MAX_HASHTAGS: usize = 30;
const INSTAGRAM_CTA: &str = "Read the full post via the link in our bio!";

/// Twitter/X character limit.
pub const TWITTER_CHAR_LIMIT: usize = 280;
const TWITTER_MAX_HASHTAGS: usize = 3;
/// Twitter counts every link as 23 characters regardless of actual length.
const TWITTER_URL_BUDGET: usize = 23;

/// Facebook post character limit.
pub const FACEBOOK_CHAR_LIMIT: usize = 63_206;
const FACEBOOK_TITLE_PREFIX: &str = "\u{1F4DD}";

/// Discord plain-text message limit.
pub const DISCORD_TEXT_LIMIT: usize = 2000;
const DISCORD_ACCENT_COLOR: u32 = 0x5865F2;
const DISCORD_FALLBACK_TITLE: &str = "New Blog Post";
const DISCORD_FALLBACK_DESCRIPTION: &str = "A new post just went live. Come take a look!";

const ELLIPSIS: &str = "...";

/// A platform-shaped payload ready for its publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattedPost {
    Instagram {
        caption: String,
        image_url: Option<String>,
    },
    Twitter {
        text: String,
    },
    Facebook {
        message: String,
        link: String,
    },
    Discord(DiscordPayload),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscordPayload {
    Embed(DiscordEmbed),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    pub footer: String,
    pub timestamp: String,
    pub image_url: Option<String>,
}

/// Dispatch to the platform's formatter. Discord defaults to embed mode;
/// its publisher switches to plain text when the credential config says so.
pub fn format_for_platform(
    platform: Platform,
    content: &ContentItem,
    custom_message: Option<&str>,
) -> FormattedPost {
    match platform {
        Platform::Instagram => format_instagram(content, custom_message),
        Platform::Twitter => format_twitter(content, custom_message),
        Platform::Facebook => format_facebook(content, custom_message),
        Platform::Discord => format_discord(content, custom_message, true),
    }
}

/// Instagram caption: body, fixed bio-link CTA, then up to 30 hashtags.
/// On overflow only the body is truncated; CTA and hashtags survive
/// verbatim.
pub fn format_instagram(content: &ContentItem, custom_message: Option<&str>) -> FormattedPost {
    let caption = match custom_message {
        Some(message) => message.to_string(),
        None if content.excerpt.is_empty() => content.title.clone(),
        None => format!("{}\n\n{}", content.title, content.excerpt),
    };

    let hashtags = hashtag_line(&content.tags, INSTAGRAM_MAX_HASHTAGS);
    let mut suffix = format!("\n\n{INSTAGRAM_CTA}");
    if !hashtags.is_empty() {
        suffix.push_str("\n\n");
        suffix.push_str(&hashtags);
    }

    let suffix_len = suffix.chars().count();
    let caption = if caption.chars().count() + suffix_len > INSTAGRAM_CAPTION_LIMIT {
        let available = INSTAGRAM_CAPTION_LIMIT.saturating_sub(suffix_len + ELLIPSIS.len());
        format!("{}{ELLIPSIS}", truncate_chars(&caption, available))
    } else {
        caption
    };

    FormattedPost::Instagram {
        caption: format!("{caption}{suffix}"),
        image_url: content.image_for(Platform::Instagram).map(str::to_string),
    }
}

/// Tweet: text plus up to 3 hashtags on one paragraph, the link on the
/// next. The link is budgeted at a flat 23 characters (platform
/// auto-shortening), with 2 more reserved for the separating blank line.
pub fn format_twitter(content: &ContentItem, custom_message: Option<&str>) -> FormattedPost {
    let mut text = custom_message.unwrap_or(&content.title).to_string();

    let hashtags = hashtag_line(&content.tags, TWITTER_MAX_HASHTAGS);
    let hashtag_part = if hashtags.is_empty() {
        String::new()
    } else {
        format!(" {hashtags}")
    };

    let has_link = !content.url.is_empty();
    let reserved = hashtag_part.chars().count()
        + if has_link { TWITTER_URL_BUDGET + 2 } else { 0 };
    let budget = TWITTER_CHAR_LIMIT.saturating_sub(reserved);

    if text.chars().count() > budget {
        let available = budget.saturating_sub(ELLIPSIS.len());
        text = format!("{}{ELLIPSIS}", truncate_chars(&text, available));
    }

    let mut out = format!("{text}{hashtag_part}");
    if has_link {
        out.push_str("\n\n");
        out.push_str(&content.url);
    }

    FormattedPost::Twitter { text: out }
}

/// Facebook post: custom message or an emoji-prefixed title + excerpt,
/// followed by a read-more line. The 63,206 cap is practically never hit
/// but is enforced defensively.
pub fn format_facebook(content: &ContentItem, custom_message: Option<&str>) -> FormattedPost {
    let body = match custom_message {
        Some(message) => message.to_string(),
        None if content.excerpt.is_empty() => {
            format!("{FACEBOOK_TITLE_PREFIX} {}", content.title)
        }
        None => format!(
            "{FACEBOOK_TITLE_PREFIX} {}\n\n{}",
            content.title, content.excerpt
        ),
    };

    let mut message = format!("{body}\n\nRead more: {}", content.url);
    if message.chars().count() > FACEBOOK_CHAR_LIMIT {
        message = format!("{}{ELLIPSIS}", truncate_chars(&message, 62_997));
    }

    FormattedPost::Facebook {
        message,
        link: content.url.clone(),
    }
}

/// Discord payload in either embed or plain-text mode.
///
/// The embed description is never empty: custom message, then excerpt,
/// then a generic fallback. The image field is populated only when the
/// override image is a syntactically valid URL.
pub fn format_discord(
    content: &ContentItem,
    custom_message: Option<&str>,
    use_embeds: bool,
) -> FormattedPost {
    let description = custom_message
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if content.excerpt.is_empty() {
                DISCORD_FALLBACK_DESCRIPTION.to_string()
            } else {
                content.excerpt.clone()
            }
        });

    if use_embeds {
        let title = if content.title.is_empty() {
            DISCORD_FALLBACK_TITLE.to_string()
        } else {
            content.title.clone()
        };

        let image_url = content
            .image_for(Platform::Discord)
            .filter(|candidate| Url::parse(candidate).is_ok())
            .map(str::to_string);

        FormattedPost::Discord(DiscordPayload::Embed(DiscordEmbed {
            title,
            description,
            url: content.url.clone(),
            color: DISCORD_ACCENT_COLOR,
            footer: format!("Posted by {}", content.author),
            timestamp: chrono::Utc::now().to_rfc3339(),
            image_url,
        }))
    } else {
        let mut text = format!("**{}**\n{}\n{}", content.title, description, content.url);
        if text.chars().count() > DISCORD_TEXT_LIMIT {
            text = format!(
                "{}{ELLIPSIS}",
                truncate_chars(&text, DISCORD_TEXT_LIMIT - ELLIPSIS.len())
            );
        }
        FormattedPost::Discord(DiscordPayload::Text(text))
    }
}

/// Check candidate image dimensions against a platform's aspect-ratio and
/// minimum-size rules. Meant for UI guidance before an image is attached.
pub fn validate_image_dimensions(platform: Platform, width: u32, height: u32) -> Result<()> {
    use crate::error::SyndicateError;

    if width == 0 || height == 0 {
        return Err(SyndicateError::InvalidInput(
            "image dimensions must be non-zero".to_string(),
        ));
    }

    let ratio = width as f64 / height as f64;
    let close_to = |target: f64| (ratio - target).abs() / target <= 0.01;

    match platform {
        Platform::Instagram => {
            // Square 1:1 or portrait 4:5, within 1% tolerance.
            if !(close_to(1.0) || close_to(0.8)) {
                return Err(SyndicateError::InvalidInput(format!(
                    "instagram images must be square (1:1) or portrait (4:5), got {width}x{height}"
                )));
            }
        }
        Platform::Twitter => {
            if ratio <= 1.0 || width < 600 || height < 335 {
                return Err(SyndicateError::InvalidInput(format!(
                    "twitter images must be landscape and at least 600x335, got {width}x{height}"
                )));
            }
        }
        Platform::Facebook => {
            if ratio <= 1.0 || width < 1200 || height < 630 {
                return Err(SyndicateError::InvalidInput(format!(
                    "facebook images must be landscape and at least 1200x630, got {width}x{height}"
                )));
            }
        }
        Platform::Discord => {
            if width < 100 || height < 100 {
                return Err(SyndicateError::InvalidInput(format!(
                    "discord images must be at least 100x100, got {width}x{height}"
                )));
            }
        }
    }

    Ok(())
}

/// Recommended image dimensions per platform, for UI guidance.
pub fn recommended_dimensions(platform: Platform) -> (u32, u32) {
    match platform {
        Platform::Instagram => (1080, 1080),
        Platform::Twitter => (1200, 675),
        Platform::Facebook => (1200, 630),
        Platform::Discord => (1280, 720),
    }
}

fn sanitize_tag(tag: &str) -> String {
    tag.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn hashtag_line(tags: &[String], max: usize) -> String {
    tags.iter()
        .take(max)
        .map(|tag| sanitize_tag(tag))
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
