//! Control-plane settings loaded from `.tradevault.toml`.

pub mod settings;

pub use settings::Settings;
