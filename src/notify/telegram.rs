// src/notify/telegram.rs

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::errors::DispatchError;

/// Telegram accepts at most this many items per media group.
const MEDIA_GROUP_MAX: usize = 10;

/// Outbound channel to the operator's recipients.
pub trait MessageChannel {
    /// Sends an HTML-formatted text with link previews disabled.
    fn send_text(&self, recipient: &str, html: &str) -> Result<(), DispatchError>;

    /// Sends local image files as one grouped message.
    fn send_photo_group(&self, recipient: &str, photos: &[String]) -> Result<(), DispatchError>;
}

pub struct TelegramChannel {
    api_base: String,
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    description: Option<String>,
}

impl TelegramChannel {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn check(method: &'static str, resp: reqwest::blocking::Response) -> Result<(), DispatchError> {
        let status = resp.status();
        let reply: ApiReply = resp.json().map_err(|e| DispatchError::Api {
            method,
            description: format!("HTTP {status}, unreadable reply: {}", e.without_url()),
        })?;

        if !reply.ok {
            return Err(DispatchError::Api {
                method,
                description: reply
                    .description
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }
        Ok(())
    }

    fn photo_part(path: &str) -> Result<Part, DispatchError> {
        let bytes = fs::read(path).map_err(|source| DispatchError::Io {
            path: path.to_string(),
            source,
        })?;
        let file_name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(image_mime(path).as_ref())?;
        Ok(part)
    }

    fn send_single_photo(&self, recipient: &str, photo: &str) -> Result<(), DispatchError> {
        let form = Form::new()
            .text("chat_id", recipient.to_string())
            .part("photo", Self::photo_part(photo)?);

        let resp = self.client.post(self.endpoint("sendPhoto")).multipart(form).send()?;
        Self::check("sendPhoto", resp)
    }

    fn send_media_group(&self, recipient: &str, photos: &[String]) -> Result<(), DispatchError> {
        let mut form = Form::new().text("chat_id", recipient.to_string());
        let mut media = Vec::with_capacity(photos.len());

        for (idx, photo) in photos.iter().enumerate() {
            let attach = format!("photo{idx}");
            media.push(json!({ "type": "photo", "media": format!("attach://{attach}") }));
            form = form.part(attach, Self::photo_part(photo)?);
        }
        form = form.text("media", serde_json::Value::Array(media).to_string());

        let resp = self
            .client
            .post(self.endpoint("sendMediaGroup"))
            .multipart(form)
            .send()?;
        Self::check("sendMediaGroup", resp)
    }
}

impl MessageChannel for TelegramChannel {
    fn send_text(&self, recipient: &str, html: &str) -> Result<(), DispatchError> {
        info!(recipient, "sending message");
        let payload = SendMessagePayload {
            chat_id: recipient,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let resp = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&payload)
            .send()?;
        Self::check("sendMessage", resp)
    }

    fn send_photo_group(&self, recipient: &str, photos: &[String]) -> Result<(), DispatchError> {
        info!(recipient, count = photos.len(), "sending images");
        for chunk in photos.chunks(MEDIA_GROUP_MAX) {
            // media groups need at least two items
            match chunk {
                [single] => self.send_single_photo(recipient, single)?,
                _ => self.send_media_group(recipient, chunk)?,
            }
        }
        Ok(())
    }
}

fn image_mime(path: &str) -> mime::Mime {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        _ => mime::IMAGE_JPEG,
    }
}
