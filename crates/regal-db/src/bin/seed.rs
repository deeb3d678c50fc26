//! # Seed Data Generator
//!
//! Populates the database with test products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p regal-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p regal-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p regal-db --bin seed -- --db ./data/regal.db
//! ```
//!
//! Each product gets a unique SKU (`{CATEGORY}-{INDEX}`), a price between
//! $0.99 and $19.99, and an opening stock between 0 and 100 (which seeds
//! the stock ledger through the normal coordinator path).

use std::env;

use regal_db::{Database, DbConfig, NewProduct};

/// Product categories for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Red Bull",
            "Orange Juice",
            "Iced Tea",
            "Sparkling Water",
            "Cold Brew Coffee",
        ],
    ),
    (
        "SNK",
        &[
            "Potato Chips",
            "Tortilla Chips",
            "Chocolate Bar",
            "Trail Mix",
            "Cookies",
            "Popcorn",
            "Pretzels",
            "Granola Bar",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk",
            "Greek Yogurt",
            "Cheddar Cheese",
            "Butter",
            "Cream Cheese",
            "Oat Milk",
        ],
    ),
    (
        "GRC",
        &[
            "Pasta",
            "Basmati Rice",
            "Canned Tomatoes",
            "Olive Oil",
            "Black Beans",
            "Peanut Butter",
            "Honey",
        ],
    ),
];

/// Tax rates to cycle through (bps).
const TAX_RATES: &[u32] = &[0, 500, 825, 1000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let count = arg_value(&args, "--count")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(500);
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./regal.db".to_string());

    println!("Seeding {count} products into {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let products = db.products();

    // Cheap deterministic-ish generator, no extra dependencies needed.
    let mut state: u64 = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .subsec_nanos() as u64
        | 1;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as i64
    };

    let mut created = 0usize;
    'outer: for index in 0.. {
        for (category, names) in CATEGORIES {
            if created >= count {
                break 'outer;
            }

            let name = names[(next() as usize) % names.len()];
            let unit_price_cents = 99 + next() % 1900;
            let new = NewProduct {
                sku: format!("{category}-{index:05}"),
                barcode: None,
                name: format!("{name} ({category}-{index:05})"),
                description: None,
                unit_price_cents,
                cost_price_cents: unit_price_cents * 6 / 10,
                tax_rate_bps: TAX_RATES[(next() as usize) % TAX_RATES.len()],
                discount_bps: 0,
                initial_stock: next() % 101,
            };

            products.insert(&new).await?;
            created += 1;

            if created % 100 == 0 {
                println!("  {created}/{count}");
            }
        }
    }

    println!("Done: {created} products, {} total", products.count().await?);
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
