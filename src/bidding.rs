// Bid validator and ledger
// Validates a proposed bid against auction rules and state, then appends it
// to the append-only ledger and moves the auction's current price. Accepting
// a bid is the only way the price changes once an auction leaves Created.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, AuditEvent};
use crate::error::{CoreError, CoreResult};
use crate::model::{Auction, Bid, User};
use crate::registration;

/// The boundary a bid has to meet: a minimum for Offer auctions, a maximum
/// for Demand auctions. The first bid only has to meet the current price;
/// afterwards the minimal increment applies.
pub fn admissible_boundary(conn: &Connection, auction: &Auction) -> rusqlite::Result<f64> {
    let has_bid = db::auction_has_bid(conn, auction.id)?;
    let boundary = if auction.is_offer_kind() {
        if has_bid {
            auction.price + auction.minimal_bid
        } else {
            auction.price
        }
    } else if has_bid {
        auction.price - auction.minimal_bid
    } else {
        auction.price
    };
    Ok(boundary)
}

/// Pre-fill value shown to a prospective bidder. Mirrors the admissibility
/// boundary exactly; not enforced on its own.
pub fn default_bid_amount(conn: &Connection, auction: &Auction) -> rusqlite::Result<f64> {
    admissible_boundary(conn, auction)
}

/// Validate and place a bid, all within one transaction so the boundary is
/// checked against a price that cannot be concurrently stale.
///
/// Checks, in order: the bidder holds an Allowed registration; the auction is
/// Active; the price meets the kind-dependent boundary (the rejection reports
/// the boundary); under Closed rules the bidder has no prior bid on this
/// auction, ever.
pub fn place_bid(
    conn: &mut Connection,
    auction_id: i64,
    user: &User,
    price: f64,
) -> CoreResult<Bid> {
    let tx = conn.transaction()?;

    let mut auction =
        db::get_auction(&tx, auction_id)?.ok_or(CoreError::not_found("auction", auction_id))?;

    if !registration::is_registered_and_allowed(&tx, auction_id, user.id)? {
        return Err(CoreError::authorization(
            "not registered on this auction or registration not approved",
        ));
    }
    if !auction.is_active() {
        return Err(CoreError::state_conflict("auction is not active"));
    }

    let boundary = admissible_boundary(&tx, &auction)?;
    if auction.is_offer_kind() {
        if price < boundary {
            return Err(CoreError::validation(
                "price",
                format!("minimum admissible bid is {}", boundary),
            ));
        }
    } else if price > boundary {
        return Err(CoreError::validation(
            "price",
            format!("maximum admissible bid is {}", boundary),
        ));
    }

    if auction.is_rules_closed() && db::user_has_bid(&tx, auction_id, user.id)? {
        return Err(CoreError::state_conflict(
            "closed rules allow a single bid per user",
        ));
    }

    let mut bid = Bid {
        id: 0,
        auction_id,
        bidder_id: user.id,
        price,
        ts: Utc::now(),
    };
    bid.id = db::insert_bid(&tx, &bid)?;

    auction.price = price;
    db::update_auction(&tx, &auction)?;

    db::insert_event(
        &tx,
        &AuditEvent::new(
            "bid_accepted",
            "auction",
            auction_id,
            serde_json::json!({ "price": price }),
            user.id,
        ),
    )?;

    tx.commit()?;
    Ok(bid)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuctionKind, AuctionRules, AuctionState, UserRole};
    use crate::registration::{decide, request_registration, Decision};
    use crate::testutil::{force_state, seed_auction, seed_user, test_conn};

    /// Confirmed auction with an approved bidder, then moved to Active.
    fn bidding_fixture(
        conn: &mut Connection,
        kind: AuctionKind,
        rules: AuctionRules,
        start_price: f64,
        minimal_bid: f64,
    ) -> (Auction, User) {
        let creator = seed_user(conn, UserRole::Basic, "creator@example.com");
        let auctioneer = seed_user(conn, UserRole::Auctioneer, "auctioneer@example.com");
        let bidder = seed_user(conn, UserRole::Basic, "bidder@example.com");

        let auction = seed_auction(conn, &creator, kind, rules, start_price, minimal_bid);
        let auction = force_state(conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));

        let reg = request_registration(conn, auction.id, &bidder).unwrap().unwrap();
        decide(conn, reg.id, Decision::Allow, &auctioneer).unwrap();

        let auction = force_state(conn, &auction, AuctionState::Active, Some(auctioneer.id));
        (auction, bidder)
    }

    fn approve_bidder(conn: &mut Connection, auction: &Auction, email: &str) -> User {
        let auctioneer_id = auction.auctioneer_id.unwrap();
        let auctioneer = db::get_user(conn, auctioneer_id).unwrap().unwrap();
        let bidder = seed_user(conn, UserRole::Basic, email);

        // Registration only opens while Confirmed; dip back briefly.
        let confirmed = force_state(conn, auction, AuctionState::Confirmed, Some(auctioneer_id));
        let reg = request_registration(conn, confirmed.id, &bidder).unwrap().unwrap();
        decide(conn, reg.id, Decision::Allow, &auctioneer).unwrap();
        force_state(conn, &confirmed, AuctionState::Active, Some(auctioneer_id));
        bidder
    }

    #[test]
    fn test_offer_auction_scenario() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Offer, AuctionRules::Open, 100.0, 5.0);

        // No bid yet: the start price itself is admissible.
        place_bid(&mut conn, auction.id, &bidder, 100.0).unwrap();
        let auction_now = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(auction_now.price, 100.0);

        // Next bid must be at least price + minimal increment.
        let err = place_bid(&mut conn, auction.id, &bidder, 104.0).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert_eq!(errors[0].message, "minimum admissible bid is 105");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        place_bid(&mut conn, auction.id, &bidder, 105.0).unwrap();
        let auction_now = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(auction_now.price, 105.0);

        let ledger = db::get_bids_for_auction(&conn, auction.id).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].price, 100.0);
        assert_eq!(ledger[1].price, 105.0);
    }

    #[test]
    fn test_demand_auction_scenario() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Demand, AuctionRules::Open, 200.0, 10.0);

        place_bid(&mut conn, auction.id, &bidder, 200.0).unwrap();

        let err = place_bid(&mut conn, auction.id, &bidder, 195.0).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert_eq!(errors[0].message, "maximum admissible bid is 190");
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        place_bid(&mut conn, auction.id, &bidder, 190.0).unwrap();
        let auction_now = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(auction_now.price, 190.0);
    }

    #[test]
    fn test_bid_requires_allowed_registration() {
        let mut conn = test_conn();
        let creator = seed_user(&conn, UserRole::Basic, "creator@example.com");
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");
        let pending_bidder = seed_user(&conn, UserRole::Basic, "pending@example.com");

        let auction = seed_auction(
            &conn,
            &creator,
            AuctionKind::Offer,
            AuctionRules::Open,
            100.0,
            5.0,
        );
        let auction = force_state(&conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));
        request_registration(&mut conn, auction.id, &pending_bidder)
            .unwrap()
            .unwrap();
        let auction = force_state(&conn, &auction, AuctionState::Active, Some(auctioneer.id));

        // Pending (undecided) registration: rejected regardless of price.
        let err = place_bid(&mut conn, auction.id, &pending_bidder, 500.0).unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        // No registration at all: same rejection.
        let stranger = seed_user(&conn, UserRole::Basic, "stranger@example.com");
        assert!(matches!(
            place_bid(&mut conn, auction.id, &stranger, 500.0).unwrap_err(),
            CoreError::Authorization(_)
        ));
    }

    #[test]
    fn test_bid_requires_active_state() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Offer, AuctionRules::Open, 100.0, 5.0);

        for state in [
            AuctionState::Created,
            AuctionState::Confirmed,
            AuctionState::Closed,
        ] {
            let auctioneer_id = auction.auctioneer_id;
            force_state(&conn, &auction, state, auctioneer_id);
            let err = place_bid(&mut conn, auction.id, &bidder, 100.0).unwrap_err();
            assert!(
                matches!(err, CoreError::StateConflict(_)),
                "state {:?} must reject bids",
                state
            );
        }

        // Nothing reached the ledger.
        assert!(db::get_bids_for_auction(&conn, auction.id).unwrap().is_empty());
    }

    #[test]
    fn test_closed_rules_single_bid_per_user() {
        let mut conn = test_conn();
        let (auction, first) =
            bidding_fixture(&mut conn, AuctionKind::Offer, AuctionRules::Closed, 100.0, 5.0);
        let second = approve_bidder(&mut conn, &auction, "second@example.com");

        place_bid(&mut conn, auction.id, &first, 100.0).unwrap();

        // A second bid by the same user is refused even at an admissible price.
        let err = place_bid(&mut conn, auction.id, &first, 110.0).unwrap_err();
        assert!(matches!(err, CoreError::StateConflict(_)));

        // A different user may still place their one bid.
        place_bid(&mut conn, auction.id, &second, 110.0).unwrap();
        let err = place_bid(&mut conn, auction.id, &second, 120.0).unwrap_err();
        assert!(matches!(err, CoreError::StateConflict(_)));

        let ledger = db::get_bids_for_auction(&conn, auction.id).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_open_rules_allow_rebidding() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Offer, AuctionRules::Open, 100.0, 5.0);

        place_bid(&mut conn, auction.id, &bidder, 100.0).unwrap();
        place_bid(&mut conn, auction.id, &bidder, 105.0).unwrap();
        place_bid(&mut conn, auction.id, &bidder, 110.0).unwrap();

        assert_eq!(db::get_bids_for_auction(&conn, auction.id).unwrap().len(), 3);
    }

    #[test]
    fn test_default_bid_amount_tracks_boundary() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Demand, AuctionRules::Open, 200.0, 10.0);

        let auction_now = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(default_bid_amount(&conn, &auction_now).unwrap(), 200.0);

        place_bid(&mut conn, auction.id, &bidder, 200.0).unwrap();
        let auction_now = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(default_bid_amount(&conn, &auction_now).unwrap(), 190.0);
    }

    #[test]
    fn test_rejected_bid_leaves_price_unchanged() {
        let mut conn = test_conn();
        let (auction, bidder) =
            bidding_fixture(&mut conn, AuctionKind::Offer, AuctionRules::Open, 100.0, 5.0);

        place_bid(&mut conn, auction.id, &bidder, 100.0).unwrap();
        let before = db::get_auction(&conn, auction.id).unwrap().unwrap();

        assert!(place_bid(&mut conn, auction.id, &bidder, 104.9).is_err());

        let after = db::get_auction(&conn, auction.id).unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(db::get_bids_for_auction(&conn, auction.id).unwrap().len(), 1);
    }
}
