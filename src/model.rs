// Domain model - users, auctions, bids, registrations
// Closed enum variants; display strings are a presentation concern and never
// take part in comparison logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ROLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Basic,
    Admin,
    Auctioneer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Basic => "basic",
            UserRole::Admin => "admin",
            UserRole::Auctioneer => "auctioneer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(UserRole::Basic),
            "admin" => Some(UserRole::Admin),
            "auctioneer" => Some(UserRole::Auctioneer),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    /// Capability check shared by lifecycle transitions and registration
    /// decisions: admins may act wherever an auctioneer may.
    pub fn can_manage_auctions(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Auctioneer)
    }
}

// ============================================================================
// AUCTION ENUMS
// ============================================================================

/// Offer: seller posts a rising price, bids must increase.
/// Demand: buyer posts a falling price, bids must decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionKind {
    Offer,
    Demand,
}

impl AuctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionKind::Offer => "offer",
            AuctionKind::Demand => "demand",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offer" => Some(AuctionKind::Offer),
            "demand" => Some(AuctionKind::Demand),
            _ => None,
        }
    }
}

/// Open: unlimited re-bidding while active.
/// Closed: sealed-bid style, one bid per participant ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionRules {
    Open,
    Closed,
}

impl AuctionRules {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionRules::Open => "open",
            AuctionRules::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AuctionRules::Open),
            "closed" => Some(AuctionRules::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionState {
    Created,
    Confirmed,
    Active,
    Closed,
}

impl AuctionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionState::Created => "created",
            AuctionState::Confirmed => "confirmed",
            AuctionState::Active => "active",
            AuctionState::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AuctionState::Created),
            "confirmed" => Some(AuctionState::Confirmed),
            "active" => Some(AuctionState::Active),
            "closed" => Some(AuctionState::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionCategory {
    Electronics,
    Car,
    Sport,
    Furniture,
    Property,
    Service,
    Others,
}

impl AuctionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionCategory::Electronics => "electronics",
            AuctionCategory::Car => "car",
            AuctionCategory::Sport => "sport",
            AuctionCategory::Furniture => "furniture",
            AuctionCategory::Property => "property",
            AuctionCategory::Service => "service",
            AuctionCategory::Others => "others",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "electronics" => Some(AuctionCategory::Electronics),
            "car" => Some(AuctionCategory::Car),
            "sport" => Some(AuctionCategory::Sport),
            "furniture" => Some(AuctionCategory::Furniture),
            "property" => Some(AuctionCategory::Property),
            "service" => Some(AuctionCategory::Service),
            "others" => Some(AuctionCategory::Others),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    Created,
    Allowed,
    Forbidden,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Created => "created",
            RegistrationState::Allowed => "allowed",
            RegistrationState::Forbidden => "forbidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(RegistrationState::Created),
            "allowed" => Some(RegistrationState::Allowed),
            "forbidden" => Some(RegistrationState::Forbidden),
            _ => None,
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub role: UserRole,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: String,

    /// Opaque credential digest; never serialized outward.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_hash: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn can_manage_auctions(&self) -> bool {
        self.role.can_manage_auctions()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,

    /// Current price. After creation this changes only when a bid is
    /// accepted (or while still editable, via a start-price edit).
    pub price: f64,
    pub start_price: f64,
    pub minimal_bid: f64,

    pub title: String,
    pub description: String,
    pub kind: AuctionKind,
    pub rules: AuctionRules,
    pub state: AuctionState,
    pub category: AuctionCategory,
    pub image: Option<String>,

    pub creator_id: i64,
    pub creation_ts: DateTime<Utc>,

    /// Set iff the auction has passed through Confirmed; cleared again on the
    /// reset path back to Created.
    pub auctioneer_id: Option<i64>,
    pub confirmation_ts: Option<DateTime<Utc>>,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
}

impl Auction {
    pub fn is_offer_kind(&self) -> bool {
        self.kind == AuctionKind::Offer
    }

    pub fn is_demand_kind(&self) -> bool {
        self.kind == AuctionKind::Demand
    }

    pub fn is_rules_closed(&self) -> bool {
        self.rules == AuctionRules::Closed
    }

    /// Content edits are permitted only before confirmation.
    pub fn is_editable(&self) -> bool {
        self.state == AuctionState::Created
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == AuctionState::Confirmed
    }

    pub fn is_active(&self) -> bool {
        self.state == AuctionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state == AuctionState::Closed
    }
}

/// Append-only ledger entry. Never updated or deleted individually; removed
/// only when the owning auction is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub price: f64,
    pub ts: DateTime<Utc>,
}

/// A user's request for bidding eligibility on a Confirmed auction.
/// At most one per (auction, requester) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub auction_id: i64,
    pub requester_id: i64,
    pub auctioneer_id: Option<i64>,
    pub state: RegistrationState,
    pub creation_ts: DateTime<Utc>,
    pub decided_ts: Option<DateTime<Utc>>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        assert!(UserRole::Admin.can_manage_auctions());
        assert!(UserRole::Auctioneer.can_manage_auctions());
        assert!(!UserRole::Basic.can_manage_auctions());

        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Auctioneer.is_admin());
    }

    #[test]
    fn test_enum_string_round_trip() {
        for state in [
            AuctionState::Created,
            AuctionState::Confirmed,
            AuctionState::Active,
            AuctionState::Closed,
        ] {
            assert_eq!(AuctionState::parse(state.as_str()), Some(state));
        }

        for category in [
            AuctionCategory::Electronics,
            AuctionCategory::Car,
            AuctionCategory::Sport,
            AuctionCategory::Furniture,
            AuctionCategory::Property,
            AuctionCategory::Service,
            AuctionCategory::Others,
        ] {
            assert_eq!(AuctionCategory::parse(category.as_str()), Some(category));
        }

        assert_eq!(AuctionState::parse("cancelled"), None);
        assert_eq!(UserRole::parse("root"), None);
    }

    #[test]
    fn test_auction_predicates() {
        let auction = Auction {
            id: 1,
            price: 100.0,
            start_price: 100.0,
            minimal_bid: 5.0,
            title: "Vintage radio".to_string(),
            description: "Tube radio from the 1950s".to_string(),
            kind: AuctionKind::Offer,
            rules: AuctionRules::Closed,
            state: AuctionState::Created,
            category: AuctionCategory::Electronics,
            image: None,
            creator_id: 1,
            creation_ts: Utc::now(),
            auctioneer_id: None,
            confirmation_ts: None,
            start_ts: None,
            end_ts: None,
        };

        assert!(auction.is_offer_kind());
        assert!(!auction.is_demand_kind());
        assert!(auction.is_rules_closed());
        assert!(auction.is_editable());
        assert!(!auction.is_active());
        assert!(!auction.is_confirmed());
        assert!(!auction.is_closed());
    }
}
