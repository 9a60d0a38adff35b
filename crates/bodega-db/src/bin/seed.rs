//! # Seed Data Generator
//!
//! Populates the database with a small catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./bodega_dev.db
//! cargo run -p bodega-db --bin seed
//!
//! # Specify database path
//! cargo run -p bodega-db --bin seed -- --db ./data/bodega.db
//! ```
//!
//! ## Generated Data
//! - `admin` (superuser, staff) and two sellers in the workers group
//! - A handful of categories (brands), each with a few products
//! - A `Created` history entry per product
//! - The company profile
//! - Two sales so the reports have something to show

use bodega_core::audit::{creation_detail, history_name};
use bodega_core::access::WORKERS_GROUP;
use bodega_core::{ChangeKind, PaymentMethod};
use bodega_db::{
    CompanyUpdate, Database, DbConfig, NewCategory, NewHistoryEntry, NewProduct, NewSale,
    NewSaleLine, NewUser,
};
use std::env;

/// Brands and their products: (name, price in cents, stock).
const CATALOG: &[(&str, &[(&str, i64, i64)])] = &[
    (
        "Logitech",
        &[
            ("Mouse M170", 2500, 40),
            ("Keyboard K120", 4500, 25),
            ("Webcam C270", 12900, 10),
            ("Headset H390", 8900, 12),
        ],
    ),
    (
        "Kingston",
        &[
            ("USB 32GB", 1800, 60),
            ("USB 64GB", 2900, 45),
            ("SSD A400 480GB", 15900, 8),
        ],
    ),
    (
        "Genius",
        &[
            ("Speaker SP-HF180", 3200, 20),
            ("Mouse Pad G-Pad", 900, 100),
        ],
    ),
    (
        "HP",
        &[
            ("Toner 85A", 21000, 6),
            ("Ink 664 Black", 5400, 30),
            ("Ink 664 Color", 5900, 30),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bodega_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bodega Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bodega_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bodega Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Users
    let admin = db
        .users()
        .insert(&NewUser {
            username: "admin".to_string(),
            is_staff: true,
            is_superuser: true,
        })
        .await?;

    let mut sellers = Vec::new();
    for username in ["maria", "carlos"] {
        let seller = db
            .users()
            .insert(&NewUser {
                username: username.to_string(),
                is_staff: false,
                is_superuser: false,
            })
            .await?;
        db.users().add_to_group(seller.id, WORKERS_GROUP).await?;
        sellers.push(seller);
    }
    println!("✓ Created {} users", sellers.len() + 1);

    // Catalog
    let mut product_ids = Vec::new();
    for (brand, products) in CATALOG {
        let category = db
            .categories()
            .insert(&NewCategory {
                name: brand.to_string(),
                image: None,
                actor: Some(admin.id),
            })
            .await?;

        for (name, price_cents, quantity) in products.iter() {
            let product = NewProduct {
                name: name.to_string(),
                description: Some(format!("{brand} {name}")),
                price_cents: *price_cents,
                quantity: *quantity,
                image: None,
                category_id: category.id,
                actor: Some(admin.id),
            };
            let entry = NewHistoryEntry {
                product_id: None,
                product_name: history_name(name),
                user_id: Some(admin.id),
                kind: ChangeKind::Created,
                detail: creation_detail(name),
                changes: Vec::new(),
                image: None,
            };

            match db.products().insert_recording(&product, entry).await {
                Ok(created) => product_ids.push((created.id, created.price_cents)),
                Err(e) => eprintln!("Failed to insert {}: {}", name, e),
            }
        }
    }
    println!("✓ Created {} categories, {} products", CATALOG.len(), product_ids.len());

    // Company profile
    db.company()
        .upsert(&CompanyUpdate {
            name: "Bodega Tecnológica".to_string(),
            tax_id: Some("900123456-7".to_string()),
            email: Some("ventas@bodega.example".to_string()),
            logo: None,
        })
        .await?;
    println!("✓ Company profile saved");

    // Sales
    if product_ids.len() >= 3 {
        let sales = [
            (&sellers[0], "Ana Gómez", PaymentMethod::Cash, &product_ids[0..2]),
            (&sellers[1], "Luis Pérez", PaymentMethod::Card, &product_ids[1..3]),
        ];
        for (seller, customer, payment_method, products) in sales {
            let lines: Vec<NewSaleLine> = products
                .iter()
                .map(|(product_id, price_cents)| NewSaleLine {
                    product_id: *product_id,
                    quantity: 2,
                    unit_price_cents: *price_cents,
                })
                .collect();

            let detail = db
                .sales()
                .create_with_lines(
                    &NewSale {
                        customer: customer.to_string(),
                        seller_id: seller.id,
                        payment_method,
                        actor: Some(seller.id),
                    },
                    &lines,
                )
                .await?;
            println!("  Sale #{} for {}: {}", detail.sale.id, customer, detail.sale.total());
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
