use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::Path;

use best_offer::db;
use best_offer::model::{User, UserRole};
use best_offer::{auth, projections, setup_database};

const DB_PATH: &str = "best-offer.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && args[1] == "init" {
        run_init()?;
    } else {
        run_summary()?;
    }

    Ok(())
}

/// Create the database schema and the three starter accounts.
fn run_init() -> Result<()> {
    println!("🔧 Initializing auction database at {}", DB_PATH);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = Connection::open(DB_PATH)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    println!("\n👤 Seeding starter accounts...");
    seed_account(&conn, UserRole::Admin, "Ada", "Admin", "admin@bestoffer.local", "admin123")?;
    seed_account(
        &conn,
        UserRole::Auctioneer,
        "Otto",
        "Auctioneer",
        "auctioneer@bestoffer.local",
        "auction123",
    )?;
    seed_account(&conn, UserRole::Basic, "Bea", "Bidder", "bidder@bestoffer.local", "bidder123")?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Ready. Start the API with:");
    println!("   cargo run --bin best-offer-server --features server");
    Ok(())
}

fn seed_account(
    conn: &Connection,
    role: UserRole,
    name: &str,
    surname: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    if db::get_user_by_email(conn, email)?.is_some() {
        println!("  - {} already exists, skipping", email);
        return Ok(());
    }
    let user = User {
        id: 0,
        name: name.to_string(),
        surname: surname.to_string(),
        email: email.to_string(),
        phone: String::new(),
        password_hash: auth::hash_password(password),
        role,
    };
    db::insert_user(conn, &user)?;
    println!("  ✓ {} ({})", email, role.as_str());
    Ok(())
}

/// Print a quick overview of the marketplace contents.
fn run_summary() -> Result<()> {
    if !Path::new(DB_PATH).exists() {
        eprintln!("❌ Database not found!");
        eprintln!("   Run: cargo run init");
        eprintln!("   to create it first.");
        std::process::exit(1);
    }

    let conn = Connection::open(DB_PATH)?;

    let users = db::get_all_users(&conn)?;
    let auctions = db::get_all_auctions(&conn)?;
    println!("📊 Best Offer marketplace");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Users:    {}", users.len());
    println!("Auctions: {}", auctions.len());

    let views = projections::public_auction_views(&conn, None)?;
    if views.is_empty() {
        println!("\nNo public auctions yet.");
    } else {
        println!("\nPublic auctions:");
        for view in views {
            println!(
                "  #{:<4} {:<30} [{}] {} / {}",
                view.auction_id, view.title, view.state, view.kind, view.category
            );
        }
    }

    Ok(())
}
