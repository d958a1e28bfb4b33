// Auction lifecycle controller
// The state machine moving an auction through Created -> Confirmed -> Active
// -> Closed, plus creation, content edits (Created only) and deletion. Every
// operation runs as one read-modify-write transaction; a rejection rolls the
// transaction back and leaves the record untouched.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, AuditEvent};
use crate::error::{CoreError, CoreResult};
use crate::model::{Auction, AuctionCategory, AuctionKind, AuctionRules, AuctionState, User};
use crate::validation::validate_auction_form;

// ============================================================================
// INPUT TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewAuction {
    pub title: String,
    pub description: String,
    pub start_price: f64,
    pub minimal_bid: f64,
    pub kind: AuctionKind,
    pub rules: AuctionRules,
    pub category: AuctionCategory,
    pub image: Option<String>,
}

/// Optional-field content patch; only applicable while the auction is still
/// in Created.
#[derive(Debug, Clone, Default)]
pub struct AuctionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_price: Option<f64>,
    pub kind: Option<AuctionKind>,
    pub rules: Option<AuctionRules>,
    pub category: Option<AuctionCategory>,
}

// ============================================================================
// CREATE / EDIT / DELETE
// ============================================================================

/// Any authenticated user may create an auction; they become its creator and
/// the current price starts at the start price.
pub fn create_auction(conn: &mut Connection, input: &NewAuction, creator: &User) -> CoreResult<Auction> {
    validate_auction_form(
        &input.title,
        &input.description,
        input.start_price,
        input.minimal_bid,
    )
    .map_err(CoreError::Validation)?;

    let tx = conn.transaction()?;

    let mut auction = Auction {
        id: 0,
        price: input.start_price,
        start_price: input.start_price,
        minimal_bid: input.minimal_bid,
        title: input.title.clone(),
        description: input.description.clone(),
        kind: input.kind,
        rules: input.rules,
        state: AuctionState::Created,
        category: input.category,
        image: input.image.clone(),
        creator_id: creator.id,
        creation_ts: Utc::now(),
        auctioneer_id: None,
        confirmation_ts: None,
        start_ts: None,
        end_ts: None,
    };
    auction.id = db::insert_auction(&tx, &auction)?;

    db::insert_event(
        &tx,
        &AuditEvent::new(
            "auction_created",
            "auction",
            auction.id,
            serde_json::json!({ "title": auction.title, "kind": auction.kind.as_str() }),
            creator.id,
        ),
    )?;

    tx.commit()?;
    Ok(auction)
}

/// Content edits are only possible while the auction sits in Created, and
/// only for the creator or a manager. Editing the start price also resets the
/// current price, since no bid can exist yet.
pub fn edit_auction(
    conn: &mut Connection,
    auction_id: i64,
    patch: &AuctionPatch,
    actor: &User,
) -> CoreResult<Auction> {
    let tx = conn.transaction()?;

    let mut auction =
        db::get_auction(&tx, auction_id)?.ok_or(CoreError::not_found("auction", auction_id))?;

    if auction.creator_id != actor.id && !actor.can_manage_auctions() {
        return Err(CoreError::authorization(
            "only the creator or a manager may edit an auction",
        ));
    }
    if !auction.is_editable() {
        return Err(CoreError::state_conflict("auction can no longer be edited"));
    }

    let title = patch.title.as_deref().unwrap_or(&auction.title);
    let description = patch.description.as_deref().unwrap_or(&auction.description);
    let start_price = patch.start_price.unwrap_or(auction.start_price);
    validate_auction_form(title, description, start_price, auction.minimal_bid)
        .map_err(CoreError::Validation)?;

    if let Some(title) = &patch.title {
        auction.title = title.clone();
    }
    if let Some(description) = &patch.description {
        auction.description = description.clone();
    }
    if let Some(start_price) = patch.start_price {
        auction.start_price = start_price;
        auction.price = start_price;
    }
    if let Some(kind) = patch.kind {
        auction.kind = kind;
    }
    if let Some(rules) = patch.rules {
        auction.rules = rules;
    }
    if let Some(category) = patch.category {
        auction.category = category;
    }

    db::update_auction(&tx, &auction)?;
    tx.commit()?;
    Ok(auction)
}

/// Manager-only; removes the auction together with its bids and registrations.
pub fn delete_auction(conn: &mut Connection, auction_id: i64, actor: &User) -> CoreResult<()> {
    if !actor.can_manage_auctions() {
        return Err(CoreError::authorization("auctioneer or admin role required"));
    }

    let tx = conn.transaction()?;
    if !db::delete_auction(&tx, auction_id)? {
        return Err(CoreError::not_found("auction", auction_id));
    }
    db::insert_event(
        &tx,
        &AuditEvent::new(
            "auction_deleted",
            "auction",
            auction_id,
            serde_json::json!({}),
            actor.id,
        ),
    )?;
    tx.commit()?;
    Ok(())
}

// ============================================================================
// STATE TRANSITIONS
// ============================================================================

/// Apply a lifecycle transition. Closed is terminal; nothing leaves it.
///
/// - `-> Confirmed`: claims the auction for the acting auctioneer and stamps
///   the confirmation time. Only a Created, non-self-created auction can be
///   claimed.
/// - `-> Active`: opens bidding, stamps the start time. Requires Confirmed.
/// - `-> Closed`: stamps the end time; allowed from any non-terminal state.
/// - `-> Created`: the reset path; clears the auctioneer claim and the
///   confirmation/start stamps.
pub fn transition(
    conn: &mut Connection,
    auction_id: i64,
    target: AuctionState,
    actor: &User,
) -> CoreResult<Auction> {
    if !actor.can_manage_auctions() {
        return Err(CoreError::authorization("auctioneer or admin role required"));
    }

    let tx = conn.transaction()?;

    let mut auction =
        db::get_auction(&tx, auction_id)?.ok_or(CoreError::not_found("auction", auction_id))?;

    if auction.is_closed() {
        return Err(CoreError::state_conflict("auction is closed"));
    }

    let now = Utc::now();
    let from = auction.state;

    match target {
        AuctionState::Confirmed => {
            if auction.is_confirmed() {
                return Err(CoreError::state_conflict("auction is already confirmed"));
            }
            if auction.state != AuctionState::Created {
                return Err(CoreError::state_conflict(
                    "only a created auction can be confirmed",
                ));
            }
            if auction.creator_id == actor.id {
                return Err(CoreError::authorization(
                    "an auctioneer cannot confirm their own auction",
                ));
            }
            auction.state = AuctionState::Confirmed;
            auction.auctioneer_id = Some(actor.id);
            auction.confirmation_ts = Some(now);
        }
        AuctionState::Active => {
            if auction.state != AuctionState::Confirmed {
                return Err(CoreError::state_conflict(
                    "only a confirmed auction can be started",
                ));
            }
            auction.state = AuctionState::Active;
            auction.start_ts = Some(now);
        }
        AuctionState::Closed => {
            auction.state = AuctionState::Closed;
            auction.end_ts = Some(now);
        }
        AuctionState::Created => {
            auction.state = AuctionState::Created;
            auction.auctioneer_id = None;
            auction.confirmation_ts = None;
            auction.start_ts = None;
        }
    }

    db::update_auction(&tx, &auction)?;
    db::insert_event(
        &tx,
        &AuditEvent::new(
            "auction_state_changed",
            "auction",
            auction.id,
            serde_json::json!({ "from": from.as_str(), "to": auction.state.as_str() }),
            actor.id,
        ),
    )?;

    tx.commit()?;
    Ok(auction)
}

// ============================================================================
// TESTS
// ============================================================================
