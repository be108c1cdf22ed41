// src/notify/template.rs

use std::fs;
use std::path::Path;

use crate::domain::Listing;
use crate::errors::TemplateError;

/// Listing fields a message template may reference, by their exact names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    ExternalId,
    Url,
    SummaryText,
    LocationText,
    AddressText,
    PriceText,
    PriceNoteText,
    PublishedText,
    ScannedAt,
    RenovationText,
    AmenityTags,
    PhotoPaths,
}

impl ListingField {
    pub const ALL: [ListingField; 12] = [
        ListingField::ExternalId,
        ListingField::Url,
        ListingField::SummaryText,
        ListingField::LocationText,
        ListingField::AddressText,
        ListingField::PriceText,
        ListingField::PriceNoteText,
        ListingField::PublishedText,
        ListingField::ScannedAt,
        ListingField::RenovationText,
        ListingField::AmenityTags,
        ListingField::PhotoPaths,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListingField::ExternalId => "external_id",
            ListingField::Url => "url",
            ListingField::SummaryText => "summary_text",
            ListingField::LocationText => "location_text",
            ListingField::AddressText => "address_text",
            ListingField::PriceText => "price_text",
            ListingField::PriceNoteText => "price_note_text",
            ListingField::PublishedText => "published_text",
            ListingField::ScannedAt => "scanned_at",
            ListingField::RenovationText => "renovation_text",
            ListingField::AmenityTags => "amenity_tags",
            ListingField::PhotoPaths => "photo_paths",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn value(self, listing: &Listing) -> String {
        match self {
            ListingField::ExternalId => listing.external_id.to_string(),
            ListingField::Url => listing.url.clone(),
            ListingField::SummaryText => listing.summary_text.clone(),
            ListingField::LocationText => listing.location_text.clone(),
            ListingField::AddressText => listing.address_text.clone(),
            ListingField::PriceText => listing.price_text.clone(),
            ListingField::PriceNoteText => listing.price_note_text.clone(),
            ListingField::PublishedText => listing.published_text.clone(),
            ListingField::ScannedAt => listing.scanned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ListingField::RenovationText => listing.renovation_text.clone().unwrap_or_default(),
            ListingField::AmenityTags => listing.amenities_display(),
            ListingField::PhotoPaths => listing.photo_paths.join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(ListingField),
}

/// A message body with `{field_name}` placeholders; `{{` and `}}` are
/// literal braces. Placeholders are checked when the template is parsed, so
/// rendering can't fail.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    segments: Vec<Segment>,
}

impl MessageTemplate {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => return Err(TemplateError::Unbalanced(pos)),
                            Some((_, ch)) => name.push(ch),
                        }
                    }
                    let field = ListingField::from_name(&name)
                        .ok_or(TemplateError::UnknownField(name))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => return Err(TemplateError::Unbalanced(pos)),
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = fs::read_to_string(path).map_err(|source| TemplateError::Load {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(text.trim())
    }

    /// Substitutes listing values, HTML-escaped for the channel's HTML mode.
    pub fn render(&self, listing: &Listing) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&escape_html(&field.value(listing))),
            }
        }
        out
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
