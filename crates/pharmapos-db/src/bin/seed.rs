//! # Seed Data Generator
//!
//! Populates a development database with a small pharmacy catalog, lots and
//! opening stock.
//!
//! ## Usage
//! ```bash
//! # Use pos.toml / environment for the database path
//! cargo run -p pharmapos-db --bin seed
//!
//! # Specify database path
//! cargo run -p pharmapos-db --bin seed -- --db ./data/pharmapos_dev.db
//!
//! # Read a specific config file
//! cargo run -p pharmapos-db --bin seed -- --config ./pos.toml
//! ```
//!
//! ## Generated Data
//! Each catalog entry becomes one product with SKU `{FAMILY}-{INDEX}`,
//! a barcode, thresholds, and two lots. Stock enters through the stock
//! ledger, so every unit on the shelf has a matching `IN` movement.

use chrono::{Duration, Utc};
use pharmapos_db::repository::product::new_product;
use pharmapos_db::{Database, MovementRequest, PosConfig};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// (family code, name, active ingredient, regulation, price in cents)
const CATALOG: &[(&str, &str, &str, &str, i64)] = &[
    ("ANL", "Paracetamol 500mg x20", "paracetamol", "otc", 4550),
    ("ANL", "Ibuprofeno 400mg x10", "ibuprofeno", "otc", 5290),
    ("ANL", "Naproxeno 250mg x30", "naproxeno", "otc", 8900),
    ("ATB", "Amoxicilina 500mg x12", "amoxicilina", "antibiotic", 12_500),
    ("ATB", "Azitromicina 500mg x3", "azitromicina", "antibiotic", 18_900),
    ("ATB", "Ciprofloxacino 500mg x14", "ciprofloxacino", "antibiotic", 21_450),
    ("GAS", "Omeprazol 20mg x14", "omeprazol", "otc", 6_700),
    ("GAS", "Loperamida 2mg x12", "loperamida", "otc", 3_990),
    ("ALR", "Loratadina 10mg x10", "loratadina", "otc", 4_200),
    ("ALR", "Cetirizina 10mg x10", "cetirizina", "otc", 4_650),
    ("CTL", "Clonazepam 2mg x30", "clonazepam", "controlled", 15_800),
    ("CTL", "Tramadol 50mg x20", "tramadol", "controlled", 17_300),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("PharmaPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = PosConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    config.init_tracing();

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("🌱 PharmaPOS Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Register: {}", config.register.register_number);
    println!();

    let db = Database::new(config.db_config())
        .await?
        .with_register(config.register_settings());

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let start = std::time::Instant::now();
    let ledger = db.stock_ledger();
    let today = Utc::now().date_naive();
    let mut units = 0;

    for (index, (family, name, ingredient, regulation, price_cents)) in
        CATALOG.iter().enumerate()
    {
        let mut product = new_product(*name, *price_cents);
        product.sku = Some(format!("{}-{:03}", family, index + 1));
        product.barcode = Some(format!("750{:010}", index + 1));
        product.active_ingredient = Some(ingredient.to_string());
        product.regulation = Some(regulation.to_string());
        product.cost_cents = Some(price_cents * 65 / 100);
        product.min_stock = 5;
        product.optimal_stock = 40;

        db.products().insert(&product).await?;

        for (lot_index, months) in [6_i64, 18].into_iter().enumerate() {
            let lot_number = format!("L{}{:02}{}", family, index + 1, lot_index + 1);
            let expires_on = today + Duration::days(months * 30);
            let lot = db
                .lots()
                .create(&product.id, &lot_number, Some(expires_on))
                .await?;

            let quantity = 5 + ((index * 7 + lot_index * 11) % 20) as i64;
            ledger
                .receive(
                    MovementRequest::new(&product.id, quantity)
                        .lot(&lot.id)
                        .reason("Carga inicial")
                        .actor(Some("seed".to_string())),
                )
                .await?;
            units += quantity;
        }

        info!(sku = ?product.sku, name = %product.name, "Seeded product");
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Seeded {} products and {} units in {:?}",
        CATALOG.len(),
        units,
        elapsed
    );

    let low = db.products().low_stock().await?;
    println!("  Products at or below minimum: {}", low.len());

    let movements = db.movements().count().await?;
    println!("  Movements logged: {}", movements);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
