//! # Demo Data Generator
//!
//! Fills a ledger database with a small shop's worth of records so the
//! dashboard has something to show.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (shopkeep.toml, SHOPKEEP_DB_PATH)
//! cargo run -p shopkeep-ledger --bin seed
//!
//! # Seed a specific file
//! cargo run -p shopkeep-ledger --bin seed -- --db ./shopkeep_dev.db
//! ```
//!
//! ## Generated Records
//! - Products across a few grocery categories, with opening stock
//! - One credit and one invoice customer
//! - A monthly rent bill and a one-off supplier bill
//! - Cash, card, credit and invoice sales, then payments against them

use std::env;
use std::path::PathBuf;

use chrono::{Days, Utc};
use shopkeep_core::{
    Actor, Adjustment, CustomerKind, Money, PaymentMethod, Product, Recurrence, SaleItem,
};
use shopkeep_ledger::{LedgerConfig, NewBill, NewCustomer, NewProduct, SaleLedgerEngine, SaleRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Name, SKU, price and cost in cents, opening stock.
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("Basmati Rice 5kg", "GRO-RICE-5", 1850, 1400, 24),
    ("Chakki Atta 10kg", "GRO-ATTA-10", 2200, 1750, 18),
    ("Cooking Oil 1L", "GRO-OIL-1", 650, 480, 40),
    ("Sugar 1kg", "GRO-SUG-1", 180, 140, 60),
    ("Black Tea 950g", "BEV-TEA-950", 1450, 1100, 12),
    ("Mineral Water 1.5L", "BEV-WAT-15", 90, 55, 96),
    ("Fresh Milk 1L", "DRY-MILK-1", 280, 220, 30),
    ("Plain Yogurt 500g", "DRY-YOG-500", 160, 115, 4),
    ("Salted Crisps", "SNK-CRSP", 70, 40, 48),
    ("Chocolate Biscuits", "SNK-BISC", 120, 85, 3),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Shopkeep Demo Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from shopkeep.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(None)?;
    if let Some(path) = db_path {
        config.store.database_path = path;
    }

    println!("Shopkeep Demo Data Generator");
    println!("============================");
    println!("Database: {}", config.store.database_path.display());
    println!();

    let engine = SaleLedgerEngine::open(config).await?;
    println!("✓ Connected to database");

    let existing = engine.products().await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let owner = Actor::new("seed", "Demo Owner");
    let start = std::time::Instant::now();

    // Catalog
    let mut products = Vec::with_capacity(PRODUCTS.len());
    for &(name, sku, price, cost, stock) in PRODUCTS {
        let product = engine
            .create_product(
                NewProduct::new(name, Money::from_cents(price), Money::from_cents(cost))
                    .with_sku(sku)
                    .with_stock(stock),
                &owner,
            )
            .await?;
        products.push(product);
    }
    println!("✓ Created {} products", products.len());

    let corner_cafe = engine
        .create_customer(NewCustomer::new("Corner Cafe", CustomerKind::Credit))
        .await?;
    let school = engine
        .create_customer(NewCustomer::new("Green Valley School", CustomerKind::Invoice))
        .await?;
    println!("✓ Created 2 customers");

    let today = engine.business_date(Utc::now());
    let rent_due = today.checked_add_days(Days::new(3)).unwrap_or(today);
    let supplier_due = today.checked_sub_days(Days::new(2)).unwrap_or(today);

    let mut rent = NewBill::new("Plaza Estates", Money::from_cents(45_000), rent_due)
        .recurring(Recurrence::monthly());
    rent.description = "Shop rent".into();
    rent.category = "rent".into();
    engine.create_bill(rent).await?;

    let mut supplier = NewBill::new("Metro Wholesale", Money::from_cents(12_500), supplier_due);
    supplier.description = "Dairy restock".into();
    supplier.category = "supplies".into();
    let supplier_bill = engine.create_bill(supplier).await?;
    println!("✓ Created 2 bills");

    // Sales
    let cash = engine
        .record_sale(
            SaleRequest::paid(
                vec![line(&products[0], 1), line(&products[3], 2), line(&products[5], 6)],
                PaymentMethod::Cash,
            ),
            &owner,
        )
        .await?;
    println!("  {} cash        {}", cash.receipt_number, cash.total);

    let card = engine
        .record_sale(
            SaleRequest::paid(
                vec![
                    line(&products[4], 1).with_discount(Adjustment::percent_bps(1000)),
                    line(&products[8], 4),
                ],
                PaymentMethod::Card,
            )
            .with_tax(Adjustment::percent_bps(500)),
            &owner,
        )
        .await?;
    println!("  {} card        {}", card.receipt_number, card.total);

    let credit = engine
        .record_sale(
            SaleRequest::paid(vec![line(&products[6], 10), line(&products[7], 2)], PaymentMethod::Cash)
                .on_credit(&corner_cafe.id),
            &owner,
        )
        .await?;
    println!("  {} credit      {}", credit.receipt_number, credit.total);

    let invoice = engine
        .record_sale(
            SaleRequest::paid(vec![line(&products[1], 4), line(&products[2], 6)], PaymentMethod::Card)
                .on_invoice(&school.id, "GVS-2024-017")
                .with_order_discount(Adjustment::fixed_cents(500)),
            &owner,
        )
        .await?;
    println!("  {} invoice     {}", invoice.receipt_number, invoice.total);
    println!("✓ Recorded 4 sales");

    // Payments
    engine
        .apply_customer_payment(&corner_cafe.id, Money::from_cents(1000), PaymentMethod::Cash, &owner)
        .await?;
    let half = Money::from_cents(invoice.total.cents() / 2);
    engine
        .apply_invoice_payment(&invoice.id, half, PaymentMethod::Card, &owner)
        .await?;
    engine
        .apply_bill_payment(&supplier_bill.id, PaymentMethod::Card, &owner)
        .await?;
    engine
        .receive_supply(&products[9].id, 24, Some("weekly delivery"), &owner)
        .await?;
    println!("✓ Applied payments and a delivery");

    let overview = engine.daily_overview().await?;
    info!(
        date = %overview.date,
        low_stock = overview.low_stock.len(),
        receivables = %overview.receivables_total,
        "Seeded overview"
    );

    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());
    if let Some(summary) = overview.sales {
        println!("  Today's revenue: {} over {} sales", summary.revenue, summary.sale_count);
    }
    println!("  Owed by customers: {}", overview.receivables_total);
    println!("  Bills due soon: {}", overview.bills.upcoming.len());

    Ok(())
}

fn line(product: &Product, quantity: i64) -> SaleItem {
    SaleItem::from_product(product, quantity)
}

/// Initializes logging.
///
/// `RUST_LOG` overrides the default `info,shopkeep=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shopkeep=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
