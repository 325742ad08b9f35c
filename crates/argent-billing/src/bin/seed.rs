//! # Seed Data Generator
//!
//! Populates a database with silver rates, customers of both channels and a
//! handful of sales moved through every lifecycle operation.
//!
//! ## Usage
//! ```bash
//! # Seed ./argent_dev.db with 10 customers per channel (default)
//! cargo run -p argent-billing --bin seed
//!
//! # More customers, custom database
//! cargo run -p argent-billing --bin seed -- --customers 50 --db ./data/argent.db
//!
//! # Use a billing.toml (prefixes, tax, balance strategies)
//! cargo run -p argent-billing --bin seed -- --config ./billing.toml
//!
//! # Write the effective settings out for later runs
//! cargo run -p argent-billing --bin seed -- --save-config ./billing.toml
//! ```
//!
//! Without `--config` the platform billing.toml is used when present.
//!
//! Logging follows `RUST_LOG`, default `info,argent=debug,sqlx=warn`.

use argent_billing::{
    Billing, BillingConfig, CreateSaleRequest, DateRange, NewCustomer, PaymentRequest,
    SilverPaymentRequest, SilverReturnRequest, TaxChoice,
};
use argent_core::{Channel, ItemInput, Money, PaymentMode, Weight};
use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const ACTOR: &str = "seed";

/// Shop names for wholesale customers.
const WHOLESALE_NAMES: &[&str] = &[
    "Lakshmi Jewellers",
    "Sri Balaji Silver",
    "Ganesh Ornaments",
    "Mahalakshmi Traders",
    "Sai Silver House",
    "Annapurna Jewels",
    "Venkateswara Silver",
    "Kuber Bullion",
];

/// Walk-in customer names for the regular channel.
const REGULAR_NAMES: &[&str] = &[
    "Anita Sharma",
    "Ravi Kumar",
    "Priya Nair",
    "Suresh Reddy",
    "Kavya Iyer",
    "Arjun Mehta",
    "Deepa Rao",
    "Manoj Patil",
];

/// (description, gross g, net g, wastage %, touch %, labour ₹/kg)
const ITEMS: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("Anklet pair", "100", "95", "2", "80", "500"),
    ("Kada", "62.5", "61.8", "1.5", "92.5", "350"),
    ("Toe rings", "12.25", "12", "3", "70", "800"),
    ("Pooja plate", "250", "248.5", "0.5", "92.5", "200"),
    ("Chain", "40", "39.2", "4", "80", "650"),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,argent=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn item(index: usize) -> ItemInput {
    let (description, gross, net, wastage, touch, labour) = ITEMS[index % ITEMS.len()];
    ItemInput {
        description: Some(description.to_string()),
        gross_weight: Some(gross.into()),
        net_weight: Some(net.into()),
        wastage: Some(wastage.into()),
        touch: Some(touch.into()),
        labor_rate_per_kg: Some(labour.into()),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut per_channel: usize = 10;
    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut save_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--customers" | "-n" => {
                if i + 1 < args.len() {
                    per_channel = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--save-config" => {
                if i + 1 < args.len() {
                    save_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Argent Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --customers <N>  Customers per channel (default: 10)");
                println!("  -d, --db <PATH>      Database file path (default: ./argent_dev.db)");
                println!("  -c, --config <PATH>  billing.toml to load");
                println!("  --save-config <PATH> Write the effective billing.toml");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => BillingConfig::load(Some(path))?,
        None => BillingConfig::load_or_default(None),
    };
    config.database.path = Some(PathBuf::from(
        db_path.unwrap_or_else(|| "./argent_dev.db".to_string()),
    ));
    if let Some(path) = save_path {
        config.save(Some(path))?;
    }

    println!("Argent Seed Data Generator");
    println!("==========================");
    println!("Database:  {}", config.database_path().display());
    println!("Customers: {} per channel", per_channel);
    println!();

    let billing = Billing::open(config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = billing.database().customers().count_active(None).await?;
    if existing > 0 {
        println!("⚠ Database already has {} customers", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // A week of rates, today last
    let today = Utc::now().date_naive();
    for days_ago in (0..7i64).rev() {
        let rate = Money::from_rupees(75) + Money::from_paise(days_ago * 125);
        billing.rates().set_rate(today - Duration::days(days_ago), rate).await?;
    }
    println!("✓ Seeded 7 days of silver rates");

    let start = std::time::Instant::now();
    let mut sales = 0;

    for n in 0..per_channel {
        let name = WHOLESALE_NAMES[n % WHOLESALE_NAMES.len()];
        let (customer, _) = billing
            .customers()
            .get_or_create_wholesale(NewCustomer::new(
                format!("{} #{}", name, n + 1),
                format!("98{:08}", n),
            ))
            .await?;

        let items = vec![item(n), item(n + 1)];
        let mut request = CreateSaleRequest::new(&customer.id, Channel::Wholesale, items, ACTOR);
        request.paid_amount = Money::from_rupees(2000);
        request.paid_silver = Weight::from_grams(5);
        request.tax = TaxChoice::DefaultGst;
        request.sale_date = Some(today - Duration::days((n % 7) as i64));
        let created = billing.sales().create_sale(request).await?;
        sales += 1;

        billing
            .sales()
            .add_silver_payment(
                &created.sale.id,
                SilverPaymentRequest {
                    weight: Weight::from_grams(10),
                    rate: None,
                    notes: None,
                    created_by: ACTOR.to_string(),
                },
            )
            .await?;

        let half = Weight::from_milligrams(created.sale.silver_to_return.milligrams() / 2);
        if half.is_positive() {
            billing
                .sales()
                .add_silver_return(
                    &created.sale.id,
                    SilverReturnRequest {
                        weight: half,
                        notes: Some("First return".to_string()),
                        created_by: ACTOR.to_string(),
                    },
                )
                .await?;
        }
    }

    for n in 0..per_channel {
        let name = REGULAR_NAMES[n % REGULAR_NAMES.len()];
        let customer = billing
            .customers()
            .create_regular(NewCustomer::new(
                format!("{} #{}", name, n + 1),
                format!("97{:08}", n),
            ))
            .await?;

        let mut request =
            CreateSaleRequest::new(&customer.id, Channel::Regular, vec![item(n + 2)], ACTOR);
        request.paid_amount = Money::from_rupees(1000);
        request.payment_mode = Some(PaymentMode::Upi);
        request.reference_number = Some(format!("UPI{:06}", n + 1));
        let created = billing.sales().create_sale(request).await?;
        sales += 1;

        if n % 2 == 0 && created.sale.balance_amount.is_positive() {
            billing
                .sales()
                .add_payment(
                    &created.sale.id,
                    PaymentRequest::cash(created.sale.balance_amount, ACTOR),
                )
                .await?;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Created {} sales in {:?}", sales, elapsed);

    // Every customer's ledger should replay cleanly
    println!();
    println!("Auditing ledgers...");
    let mut inconsistent = 0;
    for channel in [Channel::Wholesale, Channel::Regular] {
        let mut filter = argent_db::CustomerFilter::new(channel);
        filter.limit = argent_db::MAX_PAGE_SIZE;
        let page = billing.customers().search(&filter).await?;
        for view in page.customers {
            let audit = billing.ledger().audit(&view.customer.id).await?;
            if !audit.is_consistent() {
                inconsistent += 1;
                eprintln!("✗ {} ({})", view.customer.name, view.customer.id);
            }
        }

        let stats = billing.reports().billing_stats(channel, DateRange::default()).await?;
        println!(
            "  {}: {} sales, total {}, received {}, outstanding {}",
            channel,
            stats.total_sales,
            stats.total_amount,
            stats.total_payments_received,
            stats.pending_balance
        );
    }

    if inconsistent == 0 {
        println!("✓ All ledgers consistent");
    } else {
        println!("✗ {} inconsistent ledgers", inconsistent);
    }

    println!();
    println!("Done! Database ready for development.");

    Ok(())
}
