//! Domain types for the equity dataset.

pub mod entity;
pub mod membership;
pub mod series;

pub use entity::{EntityRecord, UpdateKind};
pub use membership::{EventType, MembershipEvent};
pub use series::{FinancialRow, PriceBar, SeriesRecord};

/// Entity code type alias (e.g. `7203.T`).
pub type Code = String;
