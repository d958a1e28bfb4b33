// Best Offer - Web Server
// REST API over the auction core with Axum

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use best_offer::model::{
    Auction, AuctionCategory, AuctionKind, AuctionRules, AuctionState, User,
};
use best_offer::{
    auth, bidding, db, lifecycle, projections, registration, setup_database, AuctionPatch,
    CoreError, NewAuction, ProfileUpdate, SignupInput,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// Map a core rejection to a status code plus envelope. Validation errors
/// carry the field list so the client can re-render the form.
fn reject(err: CoreError) -> Response {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Authorization(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::StateConflict(_) => StatusCode::CONFLICT,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let data = match &err {
        CoreError::Validation(fields) => serde_json::to_value(fields).unwrap_or_default(),
        _ => serde_json::Value::Null,
    };

    let body = ApiResponse {
        success: false,
        data,
        error: Some(err.to_string()),
    };
    (status, Json(body)).into_response()
}

fn storage_error(err: rusqlite::Error) -> Response {
    reject(CoreError::Storage(err))
}

fn forbidden(msg: &str) -> Response {
    reject(CoreError::authorization(msg))
}

/// Resolve the acting user from the `x-user-id` header. Session management
/// lives outside this service; the header carries an already-authenticated id.
fn acting_user(conn: &Connection, headers: &HeaderMap) -> Result<Option<User>, rusqlite::Error> {
    let Some(value) = headers.get("x-user-id") else {
        return Ok(None);
    };
    let Some(id) = value.to_str().ok().and_then(|v| v.parse::<i64>().ok()) else {
        return Ok(None);
    };
    db::get_user(conn, id)
}

fn require_user(conn: &Connection, headers: &HeaderMap) -> Result<User, Response> {
    match acting_user(conn, headers) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(forbidden("sign in required")),
        Err(e) => Err(storage_error(e)),
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct SignupBody {
    name: String,
    surname: String,
    email: String,
    #[serde(default)]
    phone: String,
    password: String,
    password_confirm: String,
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct AuctionBody {
    title: String,
    #[serde(default)]
    description: String,
    start_price: f64,
    minimal_bid: f64,
    kind: String,
    rules: String,
    category: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Deserialize, Default)]
struct AuctionPatchBody {
    title: Option<String>,
    description: Option<String>,
    start_price: Option<f64>,
    kind: Option<String>,
    rules: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct TransitionBody {
    target: String,
}

#[derive(Deserialize, Default)]
struct BidBody {
    // Omitted price means "bid the admissible boundary".
    price: Option<f64>,
}

#[derive(Deserialize)]
struct UserPatchBody {
    name: Option<String>,
    surname: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

// ============================================================================
// API Handlers - accounts
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/signup - Create a basic account
async fn post_signup(State(state): State<AppState>, Json(body): Json<SignupBody>) -> Response {
    let conn = state.db.lock().unwrap();
    let input = SignupInput {
        name: body.name,
        surname: body.surname,
        email: body.email,
        phone: body.phone,
        password: body.password,
        password_confirm: body.password_confirm,
    };
    match auth::signup(&conn, &input) {
        Ok(user) => (StatusCode::CREATED, Json(ApiResponse::ok(user))).into_response(),
        Err(e) => reject(e),
    }
}

/// POST /api/login - Credential check
async fn post_login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    let conn = state.db.lock().unwrap();
    match auth::login(&conn, &body.email, &body.password) {
        Ok(user) => (StatusCode::OK, Json(ApiResponse::ok(user))).into_response(),
        Err(e) => reject(e),
    }
}

/// GET /api/users - Admin user listing
async fn get_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let conn = state.db.lock().unwrap();
    let actor = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    if !actor.is_admin() {
        return forbidden("admin role required");
    }
    match projections::user_list(&conn) {
        Ok(users) => (StatusCode::OK, Json(ApiResponse::ok(users))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// PUT /api/users/:id - Admin user management (profile fields and role)
async fn put_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<UserPatchBody>,
) -> Response {
    let conn = state.db.lock().unwrap();
    let actor = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };

    let role = match body.role.as_deref() {
        None => None,
        Some(tag) => match best_offer::UserRole::parse(tag) {
            Some(role) => Some(role),
            None => return reject(CoreError::validation("role", "unknown role")),
        },
    };
    let update = ProfileUpdate {
        name: body.name,
        surname: body.surname,
        email: body.email,
        phone: body.phone,
        password: body.password,
    };

    match auth::admin_update_user(&conn, &actor, user_id, &update, role) {
        Ok(user) => (StatusCode::OK, Json(ApiResponse::ok(user))).into_response(),
        Err(e) => reject(e),
    }
}

/// DELETE /api/users/:id - Admin user removal
async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();
    let actor = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match auth::delete_user(&conn, &actor, user_id) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok("deleted"))).into_response(),
        Err(e) => reject(e),
    }
}

// ============================================================================
// API Handlers - auction listings
// ============================================================================

/// GET /api/auctions - Public listing with viewer-dependent status
async fn get_auctions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let conn = state.db.lock().unwrap();
    let viewer = match acting_user(&conn, &headers) {
        Ok(v) => v,
        Err(e) => return storage_error(e),
    };
    match projections::public_auction_views(&conn, viewer.as_ref()) {
        Ok(views) => (StatusCode::OK, Json(ApiResponse::ok(views))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// GET /api/auctions/edit - Auctions the acting user created
async fn get_edit_auctions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match projections::edit_list(&conn, &user) {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::ok(items))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// GET /api/auctions/bid - Auctions the acting user registered on
async fn get_bid_auctions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match projections::bid_list(&conn, &user) {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::ok(items))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// GET /api/auctions/manage - Auctions the acting manager may work on
async fn get_manage_auctions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    if !user.can_manage_auctions() {
        return forbidden("auctioneer or admin role required");
    }
    match projections::manage_list(&conn, &user) {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::ok(items))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// GET /api/auctions/:id/registrations - Pending registrations for review
async fn get_auction_registrations(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    if !user.can_manage_auctions() {
        return forbidden("auctioneer or admin role required");
    }
    match projections::registration_list(&conn, auction_id) {
        Ok(items) => (StatusCode::OK, Json(ApiResponse::ok(items))).into_response(),
        Err(e) => storage_error(e),
    }
}

// ============================================================================
// API Handlers - auction lifecycle
// ============================================================================

fn parse_auction_body(body: AuctionBody) -> Result<NewAuction, Response> {
    let kind = AuctionKind::parse(&body.kind)
        .ok_or_else(|| reject(CoreError::validation("kind", "unknown auction kind")))?;
    let rules = AuctionRules::parse(&body.rules)
        .ok_or_else(|| reject(CoreError::validation("rules", "unknown ruleset")))?;
    let category = AuctionCategory::parse(&body.category)
        .ok_or_else(|| reject(CoreError::validation("category", "unknown category")))?;
    Ok(NewAuction {
        title: body.title,
        description: body.description,
        start_price: body.start_price,
        minimal_bid: body.minimal_bid,
        kind,
        rules,
        category,
        image: body.image,
    })
}

/// POST /api/auctions - Create an auction in the Created state
async fn post_auction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AuctionBody>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    let input = match parse_auction_body(body) {
        Ok(i) => i,
        Err(r) => return r,
    };
    match lifecycle::create_auction(&mut conn, &input, &user) {
        Ok(auction) => (StatusCode::CREATED, Json(ApiResponse::ok(auction))).into_response(),
        Err(e) => reject(e),
    }
}

/// PUT /api/auctions/:id - Edit an auction still in the Created state
async fn put_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<AuctionPatchBody>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };

    let kind = match body.kind.as_deref() {
        None => None,
        Some(tag) => match AuctionKind::parse(tag) {
            Some(kind) => Some(kind),
            None => return reject(CoreError::validation("kind", "unknown auction kind")),
        },
    };
    let rules = match body.rules.as_deref() {
        None => None,
        Some(tag) => match AuctionRules::parse(tag) {
            Some(rules) => Some(rules),
            None => return reject(CoreError::validation("rules", "unknown ruleset")),
        },
    };
    let category = match body.category.as_deref() {
        None => None,
        Some(tag) => match AuctionCategory::parse(tag) {
            Some(category) => Some(category),
            None => return reject(CoreError::validation("category", "unknown category")),
        },
    };
    let patch = AuctionPatch {
        title: body.title,
        description: body.description,
        start_price: body.start_price,
        kind,
        rules,
        category,
    };

    match lifecycle::edit_auction(&mut conn, auction_id, &patch, &user) {
        Ok(auction) => (StatusCode::OK, Json(ApiResponse::ok(auction))).into_response(),
        Err(e) => reject(e),
    }
}

/// DELETE /api/auctions/:id - Remove an auction with its bids and registrations
async fn delete_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match lifecycle::delete_auction(&mut conn, auction_id, &user) {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::ok("deleted"))).into_response(),
        Err(e) => reject(e),
    }
}

/// POST /api/auctions/:id/state - Drive the lifecycle state machine
async fn post_transition(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<TransitionBody>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    let Some(target) = AuctionState::parse(&body.target) else {
        return reject(CoreError::validation("target", "unknown auction state"));
    };
    match lifecycle::transition(&mut conn, auction_id, target, &user) {
        Ok(auction) => (StatusCode::OK, Json(ApiResponse::ok(auction))).into_response(),
        Err(e) => reject(e),
    }
}

// ============================================================================
// API Handlers - registration and bidding
// ============================================================================

/// POST /api/auctions/:id/register - Request bidding eligibility
async fn post_register(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match registration::request_registration(&mut conn, auction_id, &user) {
        Ok(reg) => (StatusCode::OK, Json(ApiResponse::ok(reg))).into_response(),
        Err(e) => reject(e),
    }
}

/// POST /api/registrations/:id/allow - Approve a registration
async fn post_allow(
    State(state): State<AppState>,
    Path(registration_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    decide_registration(state, registration_id, headers, registration::Decision::Allow)
}

/// POST /api/registrations/:id/deny - Reject a registration
async fn post_deny(
    State(state): State<AppState>,
    Path(registration_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    decide_registration(state, registration_id, headers, registration::Decision::Forbid)
}

fn decide_registration(
    state: AppState,
    registration_id: i64,
    headers: HeaderMap,
    decision: registration::Decision,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };
    match registration::decide(&mut conn, registration_id, decision, &user) {
        Ok(reg) => (StatusCode::OK, Json(ApiResponse::ok(reg))).into_response(),
        Err(e) => reject(e),
    }
}

/// POST /api/auctions/:id/bid - Place a bid; without a price the admissible
/// boundary is bid.
async fn post_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<BidBody>,
) -> Response {
    let mut conn = state.db.lock().unwrap();
    let user = match require_user(&conn, &headers) {
        Ok(u) => u,
        Err(r) => return r,
    };

    let price = match body.price {
        Some(price) => price,
        None => {
            let auction: Option<Auction> = match db::get_auction(&conn, auction_id) {
                Ok(a) => a,
                Err(e) => return storage_error(e),
            };
            let Some(auction) = auction else {
                return reject(CoreError::not_found("auction", auction_id));
            };
            match bidding::default_bid_amount(&conn, &auction) {
                Ok(price) => price,
                Err(e) => return storage_error(e),
            }
        }
    };

    match bidding::place_bid(&mut conn, auction_id, &user, price) {
        Ok(bid) => (StatusCode::CREATED, Json(ApiResponse::ok(bid))).into_response(),
        Err(e) => reject(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Best Offer - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::path::Path::new("best-offer.db");
    let conn = Connection::open(db_path).expect("Failed to open database");
    setup_database(&conn).expect("Failed to initialize schema");
    println!("✓ Database opened: {:?}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(post_signup))
        .route("/login", post(post_login))
        .route("/users", get(get_users))
        .route("/users/:id", axum::routing::put(put_user).delete(delete_user))
        .route("/auctions", get(get_auctions).post(post_auction))
        .route("/auctions/edit", get(get_edit_auctions))
        .route("/auctions/bid", get(get_bid_auctions))
        .route("/auctions/manage", get(get_manage_auctions))
        .route(
            "/auctions/:id",
            axum::routing::put(put_auction).delete(delete_auction),
        )
        .route("/auctions/:id/state", post(post_transition))
        .route("/auctions/:id/register", post(post_register))
        .route("/auctions/:id/registrations", get(get_auction_registrations))
        .route("/auctions/:id/bid", post(post_bid))
        .route("/registrations/:id/allow", post(post_allow))
        .route("/registrations/:id/deny", post(post_deny))
        .with_state(state.clone());

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   API: http://localhost:3000/api/auctions");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
