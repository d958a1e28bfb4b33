// Read-model projections
// JSON-facing views derived from auction, registration and viewer state.
// These carry no authority: enforcement stays with the core operations, the
// projections only tell the presentation layer what to render.

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::model::{Auction, RegistrationState, User};

// ============================================================================
// AUCTION VIEW
// ============================================================================

/// Public auction card with the viewer-dependent registration status and a
/// conditional action link.
#[derive(Debug, Clone, Serialize)]
pub struct AuctionView {
    pub auction_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub rules: String,
    pub state: String,
    pub category: String,
    pub image: Option<String>,
    pub detail: String,
    pub registered: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_link: Option<String>,
}

/// Derive the registration status and action link for one viewer.
///
/// Anonymous viewers and viewers without a registration see "not registered"
/// with a register link; the auctioneer and the creator get their role labels
/// and a management/edit link instead; otherwise the label follows the
/// registration state, and only an approved registration drops the link.
pub fn auction_view(
    conn: &Connection,
    auction: &Auction,
    viewer: Option<&User>,
) -> rusqlite::Result<AuctionView> {
    let mut view = AuctionView {
        auction_id: auction.id,
        creator_id: auction.creator_id,
        title: auction.title.clone(),
        description: auction.description.clone(),
        kind: auction.kind.as_str().to_string(),
        rules: auction.rules.as_str().to_string(),
        state: auction.state.as_str().to_string(),
        category: auction.category.as_str().to_string(),
        image: auction.image.clone(),
        detail: format!("/auctions/{}", auction.id),
        registered: "not registered".to_string(),
        register_link: Some(format!("/auctions/{}/register", auction.id)),
        edit_link: None,
    };

    let Some(viewer) = viewer else {
        return Ok(view);
    };

    if auction.auctioneer_id == Some(viewer.id) {
        view.registered = "auctioneer".to_string();
        view.register_link = None;
        view.edit_link = Some(format!("/auctions/{}/manage", auction.id));
        return Ok(view);
    }

    if auction.creator_id == viewer.id {
        view.registered = "my auction".to_string();
        view.register_link = None;
        view.edit_link = Some(format!("/auctions/{}/edit", auction.id));
        return Ok(view);
    }

    match db::find_registration(conn, auction.id, viewer.id)? {
        None => {}
        Some(reg) => match reg.state {
            RegistrationState::Created => {
                view.registered = "pending approval".to_string();
            }
            RegistrationState::Forbidden => {
                view.registered = "rejected".to_string();
            }
            RegistrationState::Allowed => {
                view.registered = "registered".to_string();
                view.register_link = None;
            }
        },
    }

    Ok(view)
}

/// The public listing: every auction past Created, viewed by `viewer`.
pub fn public_auction_views(
    conn: &Connection,
    viewer: Option<&User>,
) -> rusqlite::Result<Vec<AuctionView>> {
    db::get_public_auctions(conn)?
        .iter()
        .map(|auction| auction_view(conn, auction, viewer))
        .collect()
}

// ============================================================================
// LIST PROJECTIONS
// ============================================================================

/// Row on the "my auctions" edit screen.
#[derive(Debug, Clone, Serialize)]
pub struct EditListItem {
    pub auction_id: i64,
    pub title: String,
    pub start_price: f64,
    pub kind: String,
    pub state: String,
    pub category: String,
    pub link: String,
}

pub fn edit_list(conn: &Connection, user: &User) -> rusqlite::Result<Vec<EditListItem>> {
    let auctions = db::get_auctions_by_creator(conn, user.id)?;
    Ok(auctions
        .into_iter()
        .map(|a| EditListItem {
            auction_id: a.id,
            title: a.title,
            start_price: a.start_price,
            kind: a.kind.as_str().to_string(),
            state: a.state.as_str().to_string(),
            category: a.category.as_str().to_string(),
            link: format!("/auctions/{}/edit", a.id),
        })
        .collect())
}

/// Row on the "joined auctions" screen: auctions the user registered on,
/// with the registration state alongside.
#[derive(Debug, Clone, Serialize)]
pub struct BidListItem {
    pub auction_id: i64,
    pub title: String,
    pub start_price: f64,
    pub price: f64,
    pub kind: String,
    pub state: String,
    pub category: String,
    pub detail: String,
    pub registration_state: String,
}

pub fn bid_list(conn: &Connection, user: &User) -> rusqlite::Result<Vec<BidListItem>> {
    let regs = db::registrations_by_requester(conn, user.id)?;
    let mut items = Vec::new();
    for reg in regs {
        if let Some(a) = db::get_auction(conn, reg.auction_id)? {
            items.push(BidListItem {
                auction_id: a.id,
                title: a.title,
                start_price: a.start_price,
                price: a.price,
                kind: a.kind.as_str().to_string(),
                state: a.state.as_str().to_string(),
                category: a.category.as_str().to_string(),
                detail: format!("/auctions/{}", a.id),
                registration_state: reg.state.as_str().to_string(),
            });
        }
    }
    Ok(items)
}

/// Row on the management screen: auctions the manager may work on - not
/// their own, and either unclaimed or claimed by them.
#[derive(Debug, Clone, Serialize)]
pub struct ManageListItem {
    pub auction_id: i64,
    pub title: String,
    pub start_price: f64,
    pub kind: String,
    pub state: String,
    pub category: String,
    pub manage: String,
    pub delete: String,
}

pub fn manage_list(conn: &Connection, actor: &User) -> rusqlite::Result<Vec<ManageListItem>> {
    let auctions = db::get_all_auctions(conn)?;
    Ok(auctions
        .into_iter()
        .filter(|a| {
            a.creator_id != actor.id
                && (a.auctioneer_id == Some(actor.id) || a.auctioneer_id.is_none())
        })
        .map(|a| ManageListItem {
            auction_id: a.id,
            title: a.title,
            start_price: a.start_price,
            kind: a.kind.as_str().to_string(),
            state: a.state.as_str().to_string(),
            category: a.category.as_str().to_string(),
            manage: format!("/auctions/{}/manage", a.id),
            delete: format!("/auctions/{}/delete", a.id),
        })
        .collect())
}

/// Pending registration row on the management screen, joined with the
/// requesting user's contact data.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationListItem {
    pub registration_id: i64,
    pub user_id: i64,
    pub name: String,
    pub surname: String,
    pub role: String,
    pub phone: String,
    pub email: String,
    pub allow: String,
    pub deny: String,
}

pub fn registration_list(
    conn: &Connection,
    auction_id: i64,
) -> rusqlite::Result<Vec<RegistrationListItem>> {
    let regs = db::pending_registrations(conn, auction_id)?;
    let mut items = Vec::new();
    for reg in regs {
        if let Some(user) = db::get_user(conn, reg.requester_id)? {
            items.push(RegistrationListItem {
                registration_id: reg.id,
                user_id: user.id,
                name: user.name,
                surname: user.surname,
                role: user.role.as_str().to_string(),
                phone: user.phone,
                email: user.email,
                allow: format!("/registrations/{}/allow", reg.id),
                deny: format!("/registrations/{}/deny", reg.id),
            });
        }
    }
    Ok(items)
}

/// Row on the admin user-management screen.
#[derive(Debug, Clone, Serialize)]
pub struct UserListItem {
    pub user_id: i64,
    pub name: String,
    pub surname: String,
    pub role: String,
    pub phone: String,
    pub email: String,
    pub link: String,
    pub delete: String,
}

pub fn user_list(conn: &Connection) -> rusqlite::Result<Vec<UserListItem>> {
    let users = db::get_all_users(conn)?;
    Ok(users
        .into_iter()
        .map(|u| UserListItem {
            user_id: u.id,
            name: u.name,
            surname: u.surname,
            role: u.role.as_str().to_string(),
            phone: u.phone,
            email: u.email,
            link: format!("/users/{}", u.id),
            delete: format!("/users/{}/delete", u.id),
        })
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================
