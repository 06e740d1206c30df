//! CLI subcommands.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Read the storefront database URL (`STOREFRONT_DATABASE_URL`, falling back
/// to `DATABASE_URL`), loading `.env` first.
pub(crate) fn database_url() -> Result<SecretString, &'static str> {
    dotenvy::dotenv().ok();
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")
}
