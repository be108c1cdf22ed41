mod card;
mod detail;
mod http;
mod images;
mod markup;
mod scanner;

pub use card::{listing_id_from_url, split_money, ListingExtractor};
pub use detail::{
    filter_amenities, listing_photo_dir, photo_window, renovation_status, DetailEnricher,
    EnrichSettings, RenovationAbsence, AMENITY_ALLOW_LIST,
};
pub use http::{fetch_page, BlockingHttp, HttpResponse, HttpSource};
pub use images::ImageFetcher;
pub use markup::{text_of, Hook, Markup, Presence};
pub use scanner::ListingScanner;
