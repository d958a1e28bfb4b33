// Registration subsystem
// Tracks per-user registration requests against an auction. A registration
// gates bidding eligibility: only an Allowed registration lets a user bid.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::{self, AuditEvent};
use crate::error::{CoreError, CoreResult};
use crate::model::{Registration, RegistrationState, User};

/// Outcome of an auctioneer's review of a pending registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbid,
}

impl Decision {
    fn state(self) -> RegistrationState {
        match self {
            Decision::Allow => RegistrationState::Allowed,
            Decision::Forbid => RegistrationState::Forbidden,
        }
    }
}

/// Request bidding eligibility on an auction.
///
/// Silent no-op (Ok(None), nothing written) unless the auction is Confirmed,
/// the user is neither its creator nor its auctioneer, and no registration
/// for this (auction, user) pair exists yet - a re-request is idempotent.
pub fn request_registration(
    conn: &mut Connection,
    auction_id: i64,
    user: &User,
) -> CoreResult<Option<Registration>> {
    let tx = conn.transaction()?;

    let auction =
        db::get_auction(&tx, auction_id)?.ok_or(CoreError::not_found("auction", auction_id))?;

    if !auction.is_confirmed() {
        return Ok(None);
    }
    if auction.creator_id == user.id || auction.auctioneer_id == Some(user.id) {
        return Ok(None);
    }
    if db::find_registration(&tx, auction_id, user.id)?.is_some() {
        return Ok(None);
    }

    let mut registration = Registration {
        id: 0,
        auction_id,
        requester_id: user.id,
        auctioneer_id: auction.auctioneer_id,
        state: RegistrationState::Created,
        creation_ts: Utc::now(),
        decided_ts: None,
    };
    registration.id = db::insert_registration(&tx, &registration)?;

    db::insert_event(
        &tx,
        &AuditEvent::new(
            "registration_requested",
            "registration",
            registration.id,
            serde_json::json!({ "auction_id": auction_id }),
            user.id,
        ),
    )?;

    tx.commit()?;
    Ok(Some(registration))
}

/// Decide a registration. Manager capability required; deciding again simply
/// overwrites - the last decision wins and no history is kept.
pub fn decide(
    conn: &mut Connection,
    registration_id: i64,
    decision: Decision,
    actor: &User,
) -> CoreResult<Registration> {
    if !actor.can_manage_auctions() {
        return Err(CoreError::authorization("auctioneer or admin role required"));
    }

    let tx = conn.transaction()?;

    let mut registration = db::get_registration(&tx, registration_id)?
        .ok_or(CoreError::not_found("registration", registration_id))?;

    registration.state = decision.state();
    registration.decided_ts = Some(Utc::now());
    db::update_registration(&tx, &registration)?;

    db::insert_event(
        &tx,
        &AuditEvent::new(
            "registration_decided",
            "registration",
            registration.id,
            serde_json::json!({ "state": registration.state.as_str() }),
            actor.id,
        ),
    )?;

    tx.commit()?;
    Ok(registration)
}

/// Undecided registrations for an auction, oldest first.
pub fn pending(conn: &Connection, auction_id: i64) -> CoreResult<Vec<Registration>> {
    Ok(db::pending_registrations(conn, auction_id)?)
}

/// True iff the user holds an Allowed registration on this auction.
pub fn is_registered_and_allowed(
    conn: &Connection,
    auction_id: i64,
    user_id: i64,
) -> rusqlite::Result<bool> {
    Ok(db::find_registration(conn, auction_id, user_id)?
        .map(|reg| reg.state == RegistrationState::Allowed)
        .unwrap_or(false))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuctionKind, AuctionRules, AuctionState, UserRole};
    use crate::testutil::{force_state, seed_auction, seed_user, test_conn};

    #[test]
    fn test_request_only_on_confirmed() {
        let mut conn = test_conn();
        let creator = seed_user(&conn, UserRole::Basic, "creator@example.com");
        let requester = seed_user(&conn, UserRole::Basic, "requester@example.com");
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");
        let auction = seed_auction(
            &conn,
            &creator,
            AuctionKind::Offer,
            AuctionRules::Open,
            100.0,
            5.0,
        );

        // Created: silently refused.
        assert!(request_registration(&mut conn, auction.id, &requester)
            .unwrap()
            .is_none());

        let auction = force_state(&conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));
        let reg = request_registration(&mut conn, auction.id, &requester)
            .unwrap()
            .unwrap();
        assert_eq!(reg.state, RegistrationState::Created);
        assert_eq!(reg.auctioneer_id, Some(auctioneer.id));

        // Active and Closed: refused again.
        let auction = force_state(&conn, &auction, AuctionState::Active, Some(auctioneer.id));
        let late = seed_user(&conn, UserRole::Basic, "late@example.com");
        assert!(request_registration(&mut conn, auction.id, &late)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_request_refuses_creator_and_auctioneer() {
        let mut conn = test_conn();
        let creator = seed_user(&conn, UserRole::Basic, "creator@example.com");
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");
        let auction = seed_auction(
            &conn,
            &creator,
            AuctionKind::Offer,
            AuctionRules::Open,
            100.0,
            5.0,
        );
        let auction = force_state(&conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));

        assert!(request_registration(&mut conn, auction.id, &creator)
            .unwrap()
            .is_none());
        assert!(request_registration(&mut conn, auction.id, &auctioneer)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_request_is_idempotent() {
        let mut conn = test_conn();
        let creator = seed_user(&conn, UserRole::Basic, "creator@example.com");
        let requester = seed_user(&conn, UserRole::Basic, "requester@example.com");
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");
        let auction = seed_auction(
            &conn,
            &creator,
            AuctionKind::Offer,
            AuctionRules::Open,
            100.0,
            5.0,
        );
        let auction = force_state(&conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));

        let first = request_registration(&mut conn, auction.id, &requester).unwrap();
        assert!(first.is_some());
        let second = request_registration(&mut conn, auction.id, &requester).unwrap();
        assert!(second.is_none());

        // Exactly one record exists.
        let pending = pending(&conn, auction.id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requester_id, requester.id);
    }

    #[test]
    fn test_decide_requires_manager_and_overwrites() {
        let mut conn = test_conn();
        let creator = seed_user(&conn, UserRole::Basic, "creator@example.com");
        let requester = seed_user(&conn, UserRole::Basic, "requester@example.com");
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");
        let auction = seed_auction(
            &conn,
            &creator,
            AuctionKind::Offer,
            AuctionRules::Open,
            100.0,
            5.0,
        );
        let auction = force_state(&conn, &auction, AuctionState::Confirmed, Some(auctioneer.id));

        let reg = request_registration(&mut conn, auction.id, &requester)
            .unwrap()
            .unwrap();

        assert!(matches!(
            decide(&mut conn, reg.id, Decision::Allow, &requester).unwrap_err(),
            CoreError::Authorization(_)
        ));

        let allowed = decide(&mut conn, reg.id, Decision::Allow, &auctioneer).unwrap();
        assert_eq!(allowed.state, RegistrationState::Allowed);
        assert!(allowed.decided_ts.is_some());
        assert!(is_registered_and_allowed(&conn, auction.id, requester.id).unwrap());

        // Last decision wins.
        let forbidden = decide(&mut conn, reg.id, Decision::Forbid, &auctioneer).unwrap();
        assert_eq!(forbidden.state, RegistrationState::Forbidden);
        assert!(!is_registered_and_allowed(&conn, auction.id, requester.id).unwrap());

        // A decided registration no longer shows up as pending.
        assert!(pending(&conn, auction.id).unwrap().is_empty());
    }

    #[test]
    fn test_decide_unknown_registration() {
        let mut conn = test_conn();
        let auctioneer = seed_user(&conn, UserRole::Auctioneer, "auctioneer@example.com");

        assert!(matches!(
            decide(&mut conn, 404, Decision::Allow, &auctioneer).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }
}
