// Shared fixtures for module tests: in-memory database plus seed helpers.

use chrono::Utc;
use rusqlite::Connection;

use crate::db;
use crate::model::{
    Auction, AuctionCategory, AuctionKind, AuctionRules, AuctionState, User, UserRole,
};

pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::setup_database(&conn).unwrap();
    conn
}

pub fn seed_user(conn: &Connection, role: UserRole, email: &str) -> User {
    let mut user = User {
        id: 0,
        role,
        name: "Test".to_string(),
        surname: "User".to_string(),
        phone: "+421900000000".to_string(),
        email: email.to_string(),
        password_hash: "salt$digest".to_string(),
    };
    user.id = db::insert_user(conn, &user).unwrap();
    user
}

pub fn seed_auction(
    conn: &Connection,
    creator: &User,
    kind: AuctionKind,
    rules: AuctionRules,
    start_price: f64,
    minimal_bid: f64,
) -> Auction {
    let mut auction = Auction {
        id: 0,
        price: start_price,
        start_price,
        minimal_bid,
        title: "Test auction".to_string(),
        description: "An auction used by tests".to_string(),
        kind,
        rules,
        state: AuctionState::Created,
        category: AuctionCategory::Others,
        image: None,
        creator_id: creator.id,
        creation_ts: Utc::now(),
        auctioneer_id: None,
        confirmation_ts: None,
        start_ts: None,
        end_ts: None,
    };
    auction.id = db::insert_auction(conn, &auction).unwrap();
    auction
}

/// Move an auction straight into the given state, bypassing the lifecycle
/// controller. Tests that target the controller itself should not use this.
pub fn force_state(
    conn: &Connection,
    auction: &Auction,
    state: AuctionState,
    auctioneer_id: Option<i64>,
) -> Auction {
    let mut updated = auction.clone();
    updated.state = state;
    updated.auctioneer_id = auctioneer_id;
    if state != AuctionState::Created && auctioneer_id.is_some() {
        updated.confirmation_ts = Some(Utc::now());
    }
    db::update_auction(conn, &updated).unwrap();
    updated
}
