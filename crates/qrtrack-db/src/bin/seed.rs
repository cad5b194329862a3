//! # Seed Data Generator
//!
//! Populates the database with demo businesses, locations, and QR codes for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 10 businesses (default)
//! cargo run -p qrtrack-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p qrtrack-db --bin seed -- --count 50
//!
//! # Specify database path
//! cargo run -p qrtrack-db --bin seed -- --db ./data/qrtrack.db
//! ```
//!
//! ## Generated Data
//! Each business gets:
//! - A verified, active merchant record
//! - One geocoded location
//! - A commercial-terms override for every third business
//! - Three QR codes with a mix of limits and validity windows

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use qrtrack_core::{
    Business, BusinessLocation, BusinessModelOverrides, BusinessStatus, BusinessType,
    CommissionType, DiscountType, QrCode, QrStatus, VerificationStatus,
};
use qrtrack_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// City coordinates for location fixtures.
const CITIES: &[(&str, &str, f64, f64)] = &[
    ("Lisbon", "PT", 38.7223, -9.1393),
    ("Porto", "PT", 41.1579, -8.6291),
    ("Madrid", "ES", 40.4168, -3.7038),
    ("Barcelona", "ES", 41.3874, 2.1686),
    ("Paris", "FR", 48.8566, 2.3522),
    ("Rome", "IT", 41.9028, 12.4964),
    ("Vienna", "AT", 48.2082, 16.3738),
    ("Prague", "CZ", 50.0755, 14.4378),
];

const NAMES: &[&str] = &[
    "Hotel Sol",
    "Pensão Mar",
    "Grand Atlântico",
    "Casa do Rio",
    "Boutique Norte",
    "Hostal Centro",
    "Auberge Lumière",
    "Albergo Fiore",
];

const BUSINESS_TYPES: &[BusinessType] = &[
    BusinessType::Hotel,
    BusinessType::TravelAgent,
    BusinessType::Partner,
    BusinessType::HotelChain,
];

/// RUST_LOG overrides the default filter, e.g. `RUST_LOG=sqlx=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,qrtrack_db=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 10;
    let mut db_path = String::from("./qrtrack_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("qrtrack Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of businesses to generate (default: 10)");
                println!("  -d, --db <PATH>    Database file path (default: ./qrtrack_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 qrtrack Seed Data Generator");
    println!("==============================");
    println!("Database:   {}", db_path);
    println!("Businesses: {}", count);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Settings singleton with demo-friendly global terms
    let now = Utc::now();
    let mut settings = db.settings().get_or_create(now).await?;
    if settings.commission_rate == 0 {
        settings.discount_value = 500; // 5% default discount
        settings.commission_rate = 700; // 7% default commission
        settings.updated_at = now;
        db.settings().update(&settings).await?;
        println!("✓ Global settings seeded (5% discount / 7% commission)");
    } else {
        println!("⚠ Global settings already customized; leaving as-is");
    }

    println!();
    println!("Generating businesses...");

    let start = std::time::Instant::now();
    let mut qr_total = 0usize;

    for seed in 0..count {
        let business = generate_business(seed);
        db.businesses().insert(&business).await?;

        let location = generate_location(&business, seed);
        db.businesses().insert_location(&location).await?;

        // Every third business overrides the global terms.
        if seed % 3 == 0 {
            let overrides = BusinessModelOverrides {
                id: Uuid::new_v4().to_string(),
                business_id: business.id.clone(),
                discount_type: Some(DiscountType::Percentage),
                discount_value: Some(1_000),
                min_booking_amount_cents: Some(5_000),
                max_discount_amount_cents: Some(2_500),
                commission_rate: Some(800),
                commission_type: Some(CommissionType::Percentage),
                payout_threshold_cents: None,
                max_qr_per_month: None,
                qr_validity_days: None,
                configured_at: now,
            };
            db.businesses().upsert_model_overrides(&overrides).await?;
        }

        for qr_seed in 0..3 {
            let qr = generate_qr(&business, &location, seed * 10 + qr_seed);
            db.qr_codes().insert(&qr).await?;
            qr_total += 1;
        }

        if (seed + 1) % 10 == 0 {
            println!("  Generated {} businesses...", seed + 1);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} businesses with {} QR codes in {:?}",
        count, qr_total, elapsed
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single business with deterministic-ish demo data.
fn generate_business(seed: usize) -> Business {
    let now = Utc::now();
    let (city, country, _, _) = CITIES[seed % CITIES.len()];
    let name = format!("{} {}", NAMES[seed % NAMES.len()], seed + 1);

    Business {
        id: Uuid::new_v4().to_string(),
        name,
        business_type: BUSINESS_TYPES[seed % BUSINESS_TYPES.len()],
        contact_email: format!("front{}@demo.test", seed + 1),
        contact_phone: None,
        website: Some(format!("https://demo{}.test", seed + 1)),
        city: Some(city.to_string()),
        country: Some(country.to_string()),
        currency: "EUR".to_string(),
        verification_status: VerificationStatus::Verified,
        status: BusinessStatus::Active,
        verified_at: Some(now),
        dashboard_access_token: None,
        dashboard_token_expires_at: None,
        last_dashboard_access: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

fn generate_location(business: &Business, seed: usize) -> BusinessLocation {
    let now = Utc::now();
    let (city, country, lat, lon) = CITIES[seed % CITIES.len()];

    BusinessLocation {
        id: Uuid::new_v4().to_string(),
        business_id: business.id.clone(),
        name: "Front desk".to_string(),
        address_line: None,
        city: Some(city.to_string()),
        country: Some(country.to_string()),
        // Nudge coordinates a little so locations don't stack exactly
        latitude: lat + (seed as f64 % 7.0) * 0.0004,
        longitude: lon + (seed as f64 % 5.0) * 0.0004,
        accuracy_radius_m: 100,
        is_active: true,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

fn generate_qr(business: &Business, location: &BusinessLocation, seed: usize) -> QrCode {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    let short_code = id.replace('-', "")[..8].to_uppercase();

    QrCode {
        id: id.clone(),
        business_id: business.id.clone(),
        location_id: Some(location.id.clone()),
        qr_value: format!("QR-{id}"),
        qr_hash: format!("{:064x}", seed as u128 + 1),
        short_code: short_code.clone(),
        qr_url: format!("https://track.demo.test/r/{short_code}"),
        discount_type: DiscountType::Percentage,
        discount_value: 500 + (seed as i64 % 3) * 250,
        min_booking_amount_cents: None,
        max_discount_amount_cents: None,
        status: QrStatus::Active,
        valid_from: Some(now),
        valid_until: Some(now + Duration::days(365)),
        expires_at: None,
        usage_limit: if seed % 4 == 0 { Some(100) } else { None },
        daily_limit: None,
        monthly_limit: None,
        current_usage: 0,
        total_scans: 0,
        unique_scans: 0,
        conversion_count: 0,
        total_revenue_cents: 0,
        last_scanned_at: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
