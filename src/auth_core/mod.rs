pub mod auth_service;
pub mod authentication;
pub mod authorize_step;
pub mod config;
pub mod http_client;
pub mod memory;
pub mod oauth1;
pub mod oauth2;
pub mod plugin;
pub mod popup;
pub mod provider;
pub mod router;
pub mod storage;
pub mod types;
pub mod utilities;
pub mod window;

#[cfg(feature = "reqwest")]
pub mod reqwest_client;
