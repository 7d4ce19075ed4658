//! # Demo Catalog Seeder
//!
//! Registers a demo catalog in the configured SQLite database.
//!
//! ## Usage
//! ```bash
//! # 60 products (default) at LEDGER_DB_PATH or the platform data dir
//! cargo run -p ledger-engine --bin seed
//!
//! # Custom amount and location
//! cargo run -p ledger-engine --bin seed -- --count 200 --db ./data/shop.db
//! ```
//!
//! Codes look like `BEV-COC-003`; every fifth product starts at or below
//! its minimum so the low-stock report has something to show.

use std::env;
use std::path::PathBuf;

use ledger_core::{Money, NewProduct};
use ledger_engine::{init_tracing, Ledger, LedgerConfig};
use tracing::{info, warn};

const DEFAULT_COUNT: usize = 60;

const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &[
            "Cola",
            "Guarana",
            "Orange Juice",
            "Mineral Water",
            "Iced Tea",
            "Coffee",
        ],
    ),
    (
        "SNK",
        "Snacks",
        &["Potato Chips", "Peanuts", "Chocolate Bar", "Cookies", "Popcorn"],
    ),
    (
        "DAI",
        "Dairy",
        &["Whole Milk", "Yogurt", "Butter", "Cheese", "Cream"],
    ),
    (
        "GRO",
        "Grocery",
        &["Rice", "Beans", "Pasta", "Sugar", "Flour", "Olive Oil", "Salt"],
    ),
];

const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 150), ("Large", 300)];

struct Args {
    count: usize,
    db: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = Args {
        count: DEFAULT_COUNT,
        db: None,
    };

    let argv: Vec<String> = env::args().skip(1).collect();
    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--count" | "-c" => {
                if let Some(value) = iter.next() {
                    args.count = value.parse().unwrap_or(DEFAULT_COUNT);
                }
            }
            "--db" | "-d" => {
                if let Some(value) = iter.next() {
                    args.db = Some(PathBuf::from(value));
                }
            }
            "--help" | "-h" => {
                println!("Stockledger demo catalog seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Products to register (default: {DEFAULT_COUNT})");
                println!("  -d, --db <PATH>    Database file (default: LEDGER_DB_PATH or data dir)");
                println!("  -h, --help         Show this help message");
                return None;
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
    }

    Some(args)
}

fn demo_product(index: usize) -> NewProduct {
    let (prefix, category, names) = CATEGORIES[index % CATEGORIES.len()];
    let name = names[(index / CATEGORIES.len()) % names.len()];
    let (size, addon) = SIZES[(index / (CATEGORIES.len() * names.len())) % SIZES.len()];

    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect();
    let code = format!("{}-{}-{:03}", prefix, short.to_uppercase(), index);

    let price = 199 + ((index * 37) % 1800) as i64 + addon;
    let min_stock = 5 + (index % 4) as i64 * 5;
    let stock = if index % 5 == 0 {
        min_stock
    } else {
        min_stock + 10 + (index * 13 % 90) as i64
    };

    NewProduct::new(code, format!("{} {}", name, size), Money::from_cents(price))
        .with_stock(stock, min_stock)
        .with_category(category)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LedgerConfig::from_env();
    init_tracing(&config.log_filter);

    let Some(args) = parse_args() else {
        return Ok(());
    };
    if let Some(db) = args.db {
        config.database_path = db;
    }

    println!("Stockledger seeder");
    println!("Database: {}", config.database_path.display());
    println!("Products: {}", args.count);

    let ledger = Ledger::open(&config).await?;
    let catalog = ledger.catalog();

    let existing = catalog.list_active().await?.len();
    if existing > 0 {
        println!("Database already has {existing} active products; skipping.");
        return Ok(());
    }

    let started = std::time::Instant::now();
    let mut registered = 0;
    for index in 0..args.count {
        let product = demo_product(index);
        match catalog.register(product).await {
            Ok(_) => registered += 1,
            Err(e) => warn!(index, error = %e, "Skipped demo product"),
        }
    }

    let low = ledger.reports().low_stock().await?.len();
    info!(registered, low_stock = low, elapsed = ?started.elapsed(), "Seed complete");
    println!("Registered {registered} products ({low} low on stock) in {:?}", started.elapsed());

    Ok(())
}
