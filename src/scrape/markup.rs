//! Named CSS hooks into the source site's markup.
//!
//! Every block the extractors touch is declared here once, with whether its
//! absence is a structural failure (`Required`) or an expected layout variant
//! (`Optional`). Markup drift then shows up as a named, field-local error
//! instead of a panic somewhere deep in a traversal.

use scraper::{ElementRef, Selector};

use crate::errors::ExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

pub struct Hook {
    pub name: &'static str,
    pub css: &'static str,
    pub presence: Presence,
    selector: Selector,
}

impl Hook {
    fn compile(name: &'static str, css: &'static str, presence: Presence) -> Result<Self, ExtractionError> {
        let selector = Selector::parse(css).map_err(|e| ExtractionError::Selector {
            css,
            message: format!("{e:?}"),
        })?;
        Ok(Self {
            name,
            css,
            presence,
            selector,
        })
    }

    /// First matching descendant of `scope`. A missing `Required` hook is an
    /// error, a missing `Optional` one is `None`.
    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Result<Option<ElementRef<'a>>, ExtractionError> {
        match scope.select(&self.selector).next() {
            Some(el) => Ok(Some(el)),
            None if self.presence == Presence::Required => Err(ExtractionError::Missing(self.name)),
            None => Ok(None),
        }
    }

    /// First match of a hook that can't be absent without failing.
    pub fn require<'a>(&self, scope: ElementRef<'a>) -> Result<ElementRef<'a>, ExtractionError> {
        scope
            .select(&self.selector)
            .next()
            .ok_or(ExtractionError::Missing(self.name))
    }

    /// First match regardless of the declared presence.
    pub fn find<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        scope.select(&self.selector).next()
    }

    pub fn all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        scope.select(&self.selector).collect()
    }

    pub fn last<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        scope.select(&self.selector).last()
    }
}

pub struct Markup {
    // results page
    pub results_page: Hook,
    pub offer_card: Hook,
    pub link_area: Hook,
    pub info_section: Hook,
    pub special_geo: Hook,
    pub geo_label: Hook,
    pub time_label: Hook,

    // detail page
    pub gallery: Hook,
    pub features_layout: Hook,
    pub features_item: Hook,
    pub summary_layout: Hook,
    pub summary_group: Hook,
    pub summary_item: Hook,

    // generic tags
    pub anchor: Hook,
    pub div: Hook,
    pub img: Hook,
    pub paragraph: Hook,
}

impl Markup {
    pub fn compile() -> Result<Self, ExtractionError> {
        use Presence::*;

        Ok(Self {
            results_page: Hook::compile("results page", r#"div[data-name="SearchEngineResultsPage"]"#, Required)?,
            offer_card: Hook::compile("offer card", r#"div[data-testid="offer-card"]"#, Optional)?,
            link_area: Hook::compile("link area", r#"div[data-name="LinkArea"]"#, Required)?,
            info_section: Hook::compile("info section", r#"div[data-name="GeneralInfoSectionRowComponent"]"#, Required)?,
            special_geo: Hook::compile("special geo", r#"div[data-name="SpecialGeo"]"#, Optional)?,
            geo_label: Hook::compile("geo label", r#"a[data-name="GeoLabel"]"#, Optional)?,
            time_label: Hook::compile("time label", r#"div[data-name="TimeLabel"]"#, Optional)?,

            gallery: Hook::compile("gallery", r#"div[data-name="GalleryInnerComponent"]"#, Required)?,
            features_layout: Hook::compile("features", r#"div[data-name="FeaturesLayout"]"#, Optional)?,
            features_item: Hook::compile("feature item", r#"div[data-name="FeaturesItem"]"#, Optional)?,
            summary_layout: Hook::compile("summary layout", r#"div[data-name="OfferSummaryInfoLayout"]"#, Optional)?,
            summary_group: Hook::compile("summary group", r#"div[data-name="OfferSummaryInfoGroup"]"#, Optional)?,
            summary_item: Hook::compile("summary item", r#"div[data-name="OfferSummaryInfoItem"]"#, Optional)?,

            anchor: Hook::compile("link", "a", Required)?,
            div: Hook::compile("div", "div", Optional)?,
            img: Hook::compile("image", "img", Optional)?,
            paragraph: Hook::compile("paragraph", "p", Optional)?,
        })
    }
}

/// Text content of an element with whitespace runs (including NBSP) squashed
/// to single spaces.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn all_hooks_compile() {
        assert!(Markup::compile().is_ok());
    }

    #[test]
    fn required_and_optional_absence_differ() {
        let markup = Markup::compile().unwrap();
        let doc = Html::parse_document("<div><p>nothing here</p></div>");
        let root = doc.root_element();

        let err = markup.gallery.first(root).unwrap_err();
        assert!(matches!(err, ExtractionError::Missing("gallery")));
        assert!(markup.features_layout.first(root).unwrap().is_none());
    }

    #[test]
    fn text_of_squashes_whitespace_and_nbsp() {
        let doc = Html::parse_fragment("<div>  150\u{a0}000 <b>₽</b>\n /мес. </div>");
        let markup = Markup::compile().unwrap();
        let div = markup.div.last(doc.root_element()).unwrap();
        assert_eq!(text_of(div), "150 000 ₽ /мес.");
    }
}
