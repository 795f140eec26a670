pub mod app_config;
pub mod error;
pub mod model;

pub use app_config::load_config;
