//! Data providers: collaborator traits and their implementations.

pub mod circuit_breaker;
pub mod extract_dir;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use extract_dir::ExtractDirSource;
pub use provider::{
    CorporateActionSource, Credential, DataError, Disclosure, DisclosureSource, FinancialsSource,
    PriceRequest, PriceSource,
};
pub use yahoo::YahooProvider;
