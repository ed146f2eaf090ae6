pub mod catalog;
pub mod chat;
pub mod config;
pub mod gateway;
pub mod notify;
pub mod validate;

pub use catalog::{CatalogEngine, LoadStatus, Overlay};
pub use chat::{ChatEvent, ChatPhase, ChatSession};
pub use config::{load_settings, Settings};
pub use gateway::{
    build_http_client, CatalogGateway, ChatFragmentStream, ChatGateway, HttpCatalogGateway,
    HttpChatGateway,
};
pub use notify::NotificationSink;
pub use reqwest::Client as HttpClient;
pub use validate::{ProductDraft, ProductField, ValidationErrors};
