/// Database connection and schema creation
pub mod database;

/// Process environment: bind address, secrets, provider settings
pub mod env;

/// Shop constants and catalog seed loaded from config.toml
pub mod settings;
