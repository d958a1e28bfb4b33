// SQLite persistence for the auction marketplace
// Schema setup, row mapping and query helpers. Timestamps are stored as
// RFC 3339 text; enums as their string tags. Ownership cascades follow the
// data model: deleting a user removes the auctions they created, deleting an
// auction removes its bids and registrations. The auctioneer reference is a
// plain reference and only gets nulled out.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::model::{
    Auction, AuctionCategory, AuctionKind, AuctionRules, AuctionState, Bid, Registration,
    RegistrationState, User, UserRole,
};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // WAL for crash recovery; foreign keys for the cascade rules below.
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL,
            name TEXT NOT NULL,
            surname TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auctions (
            auction_id INTEGER PRIMARY KEY AUTOINCREMENT,
            price REAL NOT NULL,
            start_price REAL NOT NULL,
            minimal_bid REAL NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            kind TEXT NOT NULL,
            rules TEXT NOT NULL,
            state TEXT NOT NULL,
            category TEXT NOT NULL,
            image TEXT,
            creator_id INTEGER NOT NULL
                REFERENCES users(user_id) ON DELETE CASCADE,
            creation_ts TEXT NOT NULL,
            auctioneer_id INTEGER
                REFERENCES users(user_id) ON DELETE SET NULL,
            confirmation_ts TEXT,
            start_ts TEXT,
            end_ts TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bids (
            bid_id INTEGER PRIMARY KEY AUTOINCREMENT,
            auction_id INTEGER NOT NULL
                REFERENCES auctions(auction_id) ON DELETE CASCADE,
            bidder_id INTEGER NOT NULL
                REFERENCES users(user_id) ON DELETE CASCADE,
            price REAL NOT NULL,
            ts TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS registrations (
            registration_id INTEGER PRIMARY KEY AUTOINCREMENT,
            auction_id INTEGER NOT NULL
                REFERENCES auctions(auction_id) ON DELETE CASCADE,
            requester_id INTEGER NOT NULL
                REFERENCES users(user_id) ON DELETE CASCADE,
            auctioneer_id INTEGER
                REFERENCES users(user_id) ON DELETE SET NULL,
            state TEXT NOT NULL,
            creation_ts TEXT NOT NULL,
            decided_ts TEXT,
            UNIQUE(auction_id, requester_id)
        )",
        [],
    )?;

    // Audit trail: every applied lifecycle transition, registration decision
    // and accepted bid lands here.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            ts TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_auctions_state ON auctions(state)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bids_auction ON bids(auction_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_registrations_auction ON registrations(auction_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn parse_ts(s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

fn parse_opt_ts(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

fn map_user(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(1)?;
    Ok(User {
        id: row.get(0)?,
        role: UserRole::parse(&role).ok_or(rusqlite::Error::InvalidQuery)?,
        name: row.get(2)?,
        surname: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        password_hash: row.get(6)?,
    })
}

fn map_auction(row: &Row) -> rusqlite::Result<Auction> {
    let kind: String = row.get(6)?;
    let rules: String = row.get(7)?;
    let state: String = row.get(8)?;
    let category: String = row.get(9)?;
    let creation_ts: String = row.get(12)?;

    Ok(Auction {
        id: row.get(0)?,
        price: row.get(1)?,
        start_price: row.get(2)?,
        minimal_bid: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        kind: AuctionKind::parse(&kind).ok_or(rusqlite::Error::InvalidQuery)?,
        rules: AuctionRules::parse(&rules).ok_or(rusqlite::Error::InvalidQuery)?,
        state: AuctionState::parse(&state).ok_or(rusqlite::Error::InvalidQuery)?,
        category: AuctionCategory::parse(&category).ok_or(rusqlite::Error::InvalidQuery)?,
        image: row.get(10)?,
        creator_id: row.get(11)?,
        creation_ts: parse_ts(creation_ts)?,
        auctioneer_id: row.get(13)?,
        confirmation_ts: parse_opt_ts(row.get(14)?)?,
        start_ts: parse_opt_ts(row.get(15)?)?,
        end_ts: parse_opt_ts(row.get(16)?)?,
    })
}

fn map_bid(row: &Row) -> rusqlite::Result<Bid> {
    let ts: String = row.get(4)?;
    Ok(Bid {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        bidder_id: row.get(2)?,
        price: row.get(3)?,
        ts: parse_ts(ts)?,
    })
}

fn map_registration(row: &Row) -> rusqlite::Result<Registration> {
    let state: String = row.get(4)?;
    let creation_ts: String = row.get(5)?;
    Ok(Registration {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        requester_id: row.get(2)?,
        auctioneer_id: row.get(3)?,
        state: RegistrationState::parse(&state).ok_or(rusqlite::Error::InvalidQuery)?,
        creation_ts: parse_ts(creation_ts)?,
        decided_ts: parse_opt_ts(row.get(6)?)?,
    })
}

const AUCTION_COLUMNS: &str = "auction_id, price, start_price, minimal_bid, title, description,
     kind, rules, state, category, image, creator_id, creation_ts,
     auctioneer_id, confirmation_ts, start_ts, end_ts";

const REGISTRATION_COLUMNS: &str =
    "registration_id, auction_id, requester_id, auctioneer_id, state, creation_ts, decided_ts";

// ============================================================================
// USERS
// ============================================================================

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (role, name, surname, phone, email, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.role.as_str(),
            user.name,
            user.surname,
            user.phone,
            user.email,
            user.password_hash,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT user_id, role, name, surname, phone, email, password_hash
         FROM users WHERE user_id = ?1",
        params![user_id],
        map_user,
    )
    .optional()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT user_id, role, name, surname, phone, email, password_hash
         FROM users WHERE email = ?1",
        params![email],
        map_user,
    )
    .optional()
}

pub fn get_all_users(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, role, name, surname, phone, email, password_hash
         FROM users ORDER BY user_id",
    )?;
    let users = stmt.query_map([], map_user)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn update_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET role = ?1, name = ?2, surname = ?3, phone = ?4,
                email = ?5, password_hash = ?6
         WHERE user_id = ?7",
        params![
            user.role.as_str(),
            user.name,
            user.surname,
            user.phone,
            user.email,
            user.password_hash,
            user.id,
        ],
    )?;
    Ok(())
}

/// Cascades to the auctions this user created (and transitively to their bids
/// and registrations); auctions merely referencing the user as auctioneer
/// survive with the reference nulled.
pub fn delete_user(conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
    let n = conn.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
    Ok(n > 0)
}

// ============================================================================
// AUCTIONS
// ============================================================================

pub fn insert_auction(conn: &Connection, auction: &Auction) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO auctions (
            price, start_price, minimal_bid, title, description, kind, rules,
            state, category, image, creator_id, creation_ts, auctioneer_id,
            confirmation_ts, start_ts, end_ts
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            auction.price,
            auction.start_price,
            auction.minimal_bid,
            auction.title,
            auction.description,
            auction.kind.as_str(),
            auction.rules.as_str(),
            auction.state.as_str(),
            auction.category.as_str(),
            auction.image,
            auction.creator_id,
            auction.creation_ts.to_rfc3339(),
            auction.auctioneer_id,
            auction.confirmation_ts.map(|dt| dt.to_rfc3339()),
            auction.start_ts.map(|dt| dt.to_rfc3339()),
            auction.end_ts.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_auction(conn: &Connection, auction_id: i64) -> rusqlite::Result<Option<Auction>> {
    conn.query_row(
        &format!("SELECT {} FROM auctions WHERE auction_id = ?1", AUCTION_COLUMNS),
        params![auction_id],
        map_auction,
    )
    .optional()
}

pub fn update_auction(conn: &Connection, auction: &Auction) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE auctions SET
            price = ?1, start_price = ?2, minimal_bid = ?3, title = ?4,
            description = ?5, kind = ?6, rules = ?7, state = ?8, category = ?9,
            image = ?10, auctioneer_id = ?11, confirmation_ts = ?12,
            start_ts = ?13, end_ts = ?14
         WHERE auction_id = ?15",
        params![
            auction.price,
            auction.start_price,
            auction.minimal_bid,
            auction.title,
            auction.description,
            auction.kind.as_str(),
            auction.rules.as_str(),
            auction.state.as_str(),
            auction.category.as_str(),
            auction.image,
            auction.auctioneer_id,
            auction.confirmation_ts.map(|dt| dt.to_rfc3339()),
            auction.start_ts.map(|dt| dt.to_rfc3339()),
            auction.end_ts.map(|dt| dt.to_rfc3339()),
            auction.id,
        ],
    )?;
    Ok(())
}

/// Cascades to the auction's bids and registrations.
pub fn delete_auction(conn: &Connection, auction_id: i64) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "DELETE FROM auctions WHERE auction_id = ?1",
        params![auction_id],
    )?;
    Ok(n > 0)
}

/// Auctions visible on the public listing: everything past Created.
pub fn get_public_auctions(conn: &Connection) -> rusqlite::Result<Vec<Auction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM auctions
         WHERE state IN ('confirmed', 'active', 'closed')
         ORDER BY auction_id",
        AUCTION_COLUMNS
    ))?;
    let auctions = stmt.query_map([], map_auction)?.collect::<Result<Vec<_>, _>>()?;
    Ok(auctions)
}

pub fn get_all_auctions(conn: &Connection) -> rusqlite::Result<Vec<Auction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM auctions ORDER BY auction_id",
        AUCTION_COLUMNS
    ))?;
    let auctions = stmt.query_map([], map_auction)?.collect::<Result<Vec<_>, _>>()?;
    Ok(auctions)
}

pub fn get_auctions_by_creator(conn: &Connection, creator_id: i64) -> rusqlite::Result<Vec<Auction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM auctions WHERE creator_id = ?1 ORDER BY auction_id",
        AUCTION_COLUMNS
    ))?;
    let auctions = stmt
        .query_map(params![creator_id], map_auction)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(auctions)
}

// ============================================================================
// BIDS
// ============================================================================

pub fn insert_bid(conn: &Connection, bid: &Bid) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO bids (auction_id, bidder_id, price, ts)
         VALUES (?1, ?2, ?3, ?4)",
        params![bid.auction_id, bid.bidder_id, bid.price, bid.ts.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn auction_has_bid(conn: &Connection, auction_id: i64) -> rusqlite::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM bids WHERE auction_id = ?1)",
        params![auction_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Any prior bid by this user on this auction, not just the latest one.
pub fn user_has_bid(conn: &Connection, auction_id: i64, user_id: i64) -> rusqlite::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM bids WHERE auction_id = ?1 AND bidder_id = ?2)",
        params![auction_id, user_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn get_bids_for_auction(conn: &Connection, auction_id: i64) -> rusqlite::Result<Vec<Bid>> {
    let mut stmt = conn.prepare(
        "SELECT bid_id, auction_id, bidder_id, price, ts
         FROM bids WHERE auction_id = ?1
         ORDER BY bid_id",
    )?;
    let bids = stmt
        .query_map(params![auction_id], map_bid)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bids)
}

// ============================================================================
// REGISTRATIONS
// ============================================================================

pub fn insert_registration(conn: &Connection, reg: &Registration) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO registrations (
            auction_id, requester_id, auctioneer_id, state, creation_ts, decided_ts
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            reg.auction_id,
            reg.requester_id,
            reg.auctioneer_id,
            reg.state.as_str(),
            reg.creation_ts.to_rfc3339(),
            reg.decided_ts.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_registration(
    conn: &Connection,
    registration_id: i64,
) -> rusqlite::Result<Option<Registration>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM registrations WHERE registration_id = ?1",
            REGISTRATION_COLUMNS
        ),
        params![registration_id],
        map_registration,
    )
    .optional()
}

pub fn find_registration(
    conn: &Connection,
    auction_id: i64,
    requester_id: i64,
) -> rusqlite::Result<Option<Registration>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM registrations WHERE auction_id = ?1 AND requester_id = ?2",
            REGISTRATION_COLUMNS
        ),
        params![auction_id, requester_id],
        map_registration,
    )
    .optional()
}

pub fn update_registration(conn: &Connection, reg: &Registration) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE registrations SET state = ?1, decided_ts = ?2
         WHERE registration_id = ?3",
        params![
            reg.state.as_str(),
            reg.decided_ts.map(|dt| dt.to_rfc3339()),
            reg.id,
        ],
    )?;
    Ok(())
}

/// Undecided registrations for an auction, in insertion order.
pub fn pending_registrations(
    conn: &Connection,
    auction_id: i64,
) -> rusqlite::Result<Vec<Registration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM registrations
         WHERE auction_id = ?1 AND state = 'created'
         ORDER BY creation_ts, registration_id",
        REGISTRATION_COLUMNS
    ))?;
    let regs = stmt
        .query_map(params![auction_id], map_registration)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(regs)
}

pub fn registrations_by_requester(
    conn: &Connection,
    requester_id: i64,
) -> rusqlite::Result<Vec<Registration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM registrations WHERE requester_id = ?1 ORDER BY registration_id",
        REGISTRATION_COLUMNS
    ))?;
    let regs = stmt
        .query_map(params![requester_id], map_registration)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(regs)
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub data: serde_json::Value,
    pub actor: String,
}

impl AuditEvent {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        data: serde_json::Value,
        actor_id: i64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            data,
            actor: format!("user:{}", actor_id),
        }
    }
}

pub fn insert_event(conn: &Connection, event: &AuditEvent) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, ts, event_type, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.ts.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data.to_string(),
            event.actor,
        ],
    )?;
    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: i64,
) -> rusqlite::Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, ts, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY ts, id",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let ts: String = row.get(1)?;
            let data_json: String = row.get(5)?;
            Ok(AuditEvent {
                event_id: row.get(0)?,
                ts: parse_ts(ts)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
