// Best Offer - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod auth;
pub mod bidding;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod projections;
pub mod registration;
pub mod validation;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use db::{setup_database, AuditEvent};
pub use error::{CoreError, CoreResult, FieldError};
pub use model::{
    Auction, AuctionCategory, AuctionKind, AuctionRules, AuctionState, Bid, Registration,
    RegistrationState, User, UserRole,
};

pub use auth::{login, signup};
pub use bidding::{admissible_boundary, default_bid_amount, place_bid};
pub use lifecycle::{
    create_auction, delete_auction, edit_auction, transition, AuctionPatch, NewAuction,
};
pub use registration::{decide, pending, request_registration, Decision};
pub use validation::{ProfileUpdate, SignupInput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
