use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::db::connection::{init_db, Database};
use crate::db::DedupStore;
use crate::domain::ExternalId;
use crate::errors::{DispatchError, FetchError, StoreError};
use crate::notify::MessageChannel;
use crate::scrape::{HttpResponse, HttpSource};

/// Fresh in-memory DB with the production schema.
pub fn init_test_db() -> Database {
    let db = Database::new(":memory:");
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    db
}

/// Unique, not yet existing path under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("flatwatch-{name}-{}-{n}", std::process::id()))
}

/// Store that remembers nothing and refuses every write.
pub struct ReadOnlyStore;

impl DedupStore for ReadOnlyStore {
    fn has_seen(&self, _ids: &HashSet<ExternalId>) -> Result<HashSet<ExternalId>, StoreError> {
        Ok(HashSet::new())
    }

    fn record_batch(&self, _markers: &[(ExternalId, DateTime<Utc>)]) -> Result<usize, StoreError> {
        Err(StoreError::Sql(rusqlite::Error::InvalidQuery))
    }
}

/// Canned responses keyed by URL; unknown URLs fail like a dead connection.
#[derive(Default)]
pub struct FakeHttp {
    routes: HashMap<String, (u16, Vec<u8>)>,
    requests: RefCell<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.bytes(url, 200, html.as_bytes().to_vec())
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.bytes(url, status, Vec::new())
    }

    pub fn bytes(mut self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.routes.insert(url.to_string(), (status, body));
        self
    }

    pub fn images(mut self, urls: &[String]) -> Self {
        for url in urls {
            self.routes
                .insert(url.clone(), (200, format!("image bytes of {url}").into_bytes()));
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl HttpSource for FakeHttp {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        match self.routes.get(url) {
            Some((status, body)) => Ok(HttpResponse {
                status: *status,
                body: Box::new(Cursor::new(body.clone())),
            }),
            None => Err(FetchError::transport(url, "connection refused")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String, String),
    /// Recipient and how many of the photo files existed at send time.
    Photos(String, usize),
}

#[derive(Default)]
pub struct RecordingChannel {
    sent: RefCell<Vec<Sent>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(_, text) => Some(text),
                Sent::Photos(..) => None,
            })
            .collect()
    }
}

impl MessageChannel for RecordingChannel {
    fn send_text(&self, recipient: &str, html: &str) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Transport("channel down".into()));
        }
        self.sent
            .borrow_mut()
            .push(Sent::Text(recipient.to_string(), html.to_string()));
        Ok(())
    }

    fn send_photo_group(&self, recipient: &str, photos: &[String]) -> Result<(), DispatchError> {
        if self.fail {
            return Err(DispatchError::Transport("channel down".into()));
        }
        let present = photos.iter().filter(|p| std::path::Path::new(p).exists()).count();
        self.sent
            .borrow_mut()
            .push(Sent::Photos(recipient.to_string(), present));
        Ok(())
    }
}

/// Knobs for a synthetic results-page card.
#[derive(Debug, Clone)]
pub struct CardSpec {
    pub id: i64,
    pub href: Option<String>,
    pub with_geo: bool,
    pub promo: bool,
    pub published: Option<String>,
}

impl CardSpec {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            href: None,
            with_geo: true,
            promo: false,
            published: Some("вчера, 10:00".to_string()),
        }
    }

    pub fn url(&self) -> String {
        self.href
            .clone()
            .unwrap_or_else(|| format!("https://www.cian.ru/rent/flat/{}/", self.id))
    }
}

pub fn card_html(spec: &CardSpec) -> String {
    let promo = if spec.promo {
        r#"<div data-name="GeneralInfoSectionRowComponent">Премиум-объявление</div>"#
    } else {
        ""
    };
    let special_geo = if spec.with_geo {
        r#"<div data-name="SpecialGeo"><a href="/metro/">Бауманская</a><div><div>7 минут пешком</div></div></div>"#
    } else {
        ""
    };
    let time_label = match &spec.published {
        Some(text) => format!(r#"<div data-name="TimeLabel"><div>🕑</div><div>{text}</div></div>"#),
        None => String::new(),
    };

    format!(
        r##"<div data-testid="offer-card">
  <div data-name="LinkArea">
    <a href="{href}"><span>Сдаётся квартира</span></a>
    <div data-name="GeneralInfoSectionRowComponent">2-комн. кв., 54 м², 7/12 этаж</div>
    {promo}
    <div data-name="GeneralInfoSectionRowComponent">
      {special_geo}
      <a data-name="GeoLabel" href="#">Москва</a>
      <a data-name="GeoLabel" href="#">ЦАО</a>
      <a data-name="GeoLabel" href="#">р-н Басманный</a>
      <a data-name="GeoLabel" href="#">м. Бауманская</a>
      <a data-name="GeoLabel" href="#">улица Спартаковская</a>
      <a data-name="GeoLabel" href="#">19</a>
    </div>
    <div data-name="GeneralInfoSectionRowComponent">150&nbsp;000&nbsp;₽/мес.+ком. платежи, залог 150&nbsp;000&nbsp;₽</div>
    <div data-name="GeneralInfoSectionRowComponent">Светлая квартира в пяти минутах от метро</div>
    <div data-name="GeneralInfoSectionRowComponent">Агентство «Дом»</div>
  </div>
  {time_label}
</div>"##,
        href = spec.url(),
    )
}

pub fn results_page(cards: &[CardSpec]) -> String {
    let cards: String = cards.iter().map(card_html).collect();
    format!(
        r#"<!DOCTYPE html><html><head><title>Снять квартиру</title></head><body>
<div data-name="SearchEngineResultsPage">{cards}</div>
</body></html>"#
    )
}

/// Knobs for a synthetic detail page.
#[derive(Debug, Clone)]
pub struct DetailSpec {
    pub images: usize,
    pub gallery: bool,
    pub features: bool,
    pub renovation: Option<String>,
}

impl DetailSpec {
    pub fn new(images: usize) -> Self {
        Self {
            images,
            gallery: true,
            features: true,
            renovation: Some("Евроремонт".to_string()),
        }
    }

    pub fn image_urls(&self) -> Vec<String> {
        (0..self.images)
            .map(|i| format!("https://images.cdn-cian.ru/images/{i}.jpg"))
            .collect()
    }
}

pub fn detail_html(spec: &DetailSpec) -> String {
    let gallery = if spec.gallery {
        let imgs: String = spec
            .image_urls()
            .iter()
            .map(|src| format!(r#"<img src="{src}" alt="">"#))
            .collect();
        format!(r#"<div data-name="GalleryInnerComponent">{imgs}</div>"#)
    } else {
        String::new()
    };
    let summary = match &spec.renovation {
        Some(value) => format!(
            r#"<div data-name="OfferSummaryInfoLayout"><div data-name="OfferSummaryInfoGroup">
  <div data-name="OfferSummaryInfoItem"><p>Тип жилья</p><p>Вторичка</p></div>
  <div data-name="OfferSummaryInfoItem"><p>Ремонт</p><p>{value}</p></div>
</div></div>"#
        ),
        None => String::new(),
    };

    let features = if spec.features {
        r#"<div data-name="FeaturesLayout">
  <div data-name="FeaturesItem">Холодильник</div>
  <div data-name="FeaturesItem">Парковка</div>
  <div data-name="FeaturesItem"> Стиральная машина </div>
  <div data-name="FeaturesItem">Интернет</div>
</div>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html><html><body>
{gallery}
{summary}
{features}
</body></html>"#
    )
}
