//! Skyslot Engine Demo
//!
//! Walks through the booking flow end to end:
//! - Price quote with a weekday discount, a campaign and a coupon
//! - Booking, availability refresh and cancellation
//! - A tier-gated package refused, then booked after an entitlement grant
//!
//! # Usage
//!
//! ```bash
//! # In-memory stores
//! cargo run --bin demo
//!
//! # PostgreSQL (DATABASE_URL, see .env)
//! cargo run --bin demo -- --postgres
//! ```

use anyhow::Context;
use chrono::{Datelike, Duration, Weekday};
use skyslot_core::{
    Campaign, CampaignId, Coupon, CouponId, Discount, DiscountCondition, DiscountId, DiscountValue,
    Money, NaiveDate, NaiveTime, OperatorId, Package, PackageId, PassengerDetails, Percentage,
    SupportTier, TierId, UserId, Utc,
};
use skyslot_engine::{BookingRequest, Config, InMemoryBackend, SkyslotApp, SlotSchedule};
use skyslot_postgres::{
    PostgresCouponLedger, PostgresDiscountCatalog, PostgresEntitlementStore, PostgresPackageStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Catalog records the demo starts from.
struct Seed {
    operator_id: OperatorId,
    package: Package,
    gated_package: Package,
    discount: Discount,
    campaign: Campaign,
    coupon: Coupon,
    tiers: Vec<SupportTier>,
}

impl Seed {
    fn new() -> anyhow::Result<Self> {
        let operator_id = OperatorId::new();
        let percent = |p| {
            Percentage::from_percent(p)
                .map(DiscountValue::Percentage)
                .context("percentage out of range")
        };
        let package = Package {
            id: PackageId::new(),
            operator_id,
            name: "Sunrise balloon flight".to_string(),
            base_price: Money::from_minor(50_000),
            max_passengers: 4,
            min_tier_sort_order: None,
            is_active: true,
        };
        let gated_package = Package {
            id: PackageId::new(),
            name: "Supporters' sunset flight".to_string(),
            min_tier_sort_order: Some(2),
            ..package.clone()
        };
        let now = Utc::now();
        Ok(Self {
            operator_id,
            discount: Discount {
                id: DiscountId::new(),
                package_id: package.id,
                value: percent(10)?,
                condition: DiscountCondition::Weekday,
                is_active: true,
            },
            campaign: Campaign {
                id: CampaignId::new(),
                package_id: package.id,
                name: "Season opening".to_string(),
                value: percent(20)?,
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(30),
                is_active: true,
            },
            coupon: Coupon {
                id: CouponId::new(),
                operator_id,
                code: "SAVE10".to_string(),
                value: percent(10)?,
                package_id: None,
                expires_at: None,
                usage_limit: Some(100),
                times_used: 0,
                is_active: true,
            },
            tiers: vec![
                SupportTier {
                    id: TierId::new(),
                    operator_id,
                    name: "Friend".to_string(),
                    min_amount: Money::from_minor(1_000),
                    max_amount: Some(Money::from_minor(9_999)),
                    sort_order: 1,
                },
                SupportTier {
                    id: TierId::new(),
                    operator_id,
                    name: "Patron".to_string(),
                    min_amount: Money::from_minor(10_000),
                    max_amount: None,
                    sort_order: 2,
                },
            ],
            package,
            gated_package,
        })
    }

    fn load_in_memory(&self, backend: &InMemoryBackend) {
        backend.packages.add(self.package.clone());
        backend.packages.add(self.gated_package.clone());
        backend.catalog.add_discount(self.discount.clone());
        backend.catalog.add_campaign(self.campaign.clone());
        backend.coupons.add(self.coupon.clone());
        for tier in &self.tiers {
            backend.entitlements.add_tier(tier.clone());
        }
    }

    async fn load_postgres(&self, pool: &sqlx::PgPool) -> anyhow::Result<()> {
        let packages = PostgresPackageStore::new(pool.clone());
        packages.insert(&self.package).await?;
        packages.insert(&self.gated_package).await?;
        let catalog = PostgresDiscountCatalog::new(pool.clone());
        catalog.insert_discount(&self.discount).await?;
        catalog.insert_campaign(&self.campaign).await?;
        PostgresCouponLedger::new(pool.clone())
            .insert(&self.coupon)
            .await?;
        let entitlements = PostgresEntitlementStore::new(pool.clone());
        for tier in &self.tiers {
            entitlements.insert_tier(tier).await?;
        }
        Ok(())
    }
}

fn next_tuesday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Tue {
        date += Duration::days(1);
    }
    date
}

fn passengers(names: &[&str]) -> Vec<PassengerDetails> {
    names.iter().map(|n| PassengerDetails::named(*n)).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,skyslot_engine=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n============================================");
    println!("   Skyslot Engine - Live Demo");
    println!("============================================\n");

    let config = Config::from_env();
    let seed = Seed::new()?;
    let use_postgres = std::env::args().any(|a| a == "--postgres");

    let app = if use_postgres {
        println!("Connecting to PostgreSQL...");
        let app = SkyslotApp::connect(config).await?;
        let pool = app.pool().context("connected app has a pool")?;
        seed.load_postgres(pool).await?;
        app
    } else {
        println!("Using in-memory stores");
        let backend = InMemoryBackend::new();
        seed.load_in_memory(&backend);
        let mut app = SkyslotApp::in_memory(
            config,
            &backend,
            Arc::new(skyslot_core::environment::SystemClock),
        );
        app.start_metrics()?;
        app
    };

    let date = next_tuesday();
    let slot = app
        .operator
        .schedule_slot(SlotSchedule {
            operator_id: seed.operator_id,
            date,
            start_time: NaiveTime::from_hms_opt(6, 30, 0).context("valid time")?,
            duration_minutes: 60,
            max_passengers: 6,
            package_id: None,
        })
        .await?;
    println!("\n1. Scheduled slot {} on {date} for 6 passengers", slot.id);

    println!("\n2. Price for 2 passengers with coupon SAVE10:");
    let breakdown = app
        .coordinator
        .compute_price(seed.package.id, date, 2, Some("save10"))
        .await?;
    println!("   subtotal     {}", breakdown.subtotal);
    for step in breakdown.adjustments.iter() {
        println!(
            "   {:<12} -{} = {}",
            step.source.kind(),
            step.reduction,
            step.amount_after
        );
    }
    println!("   final        {}", breakdown.final_price);

    println!("\n3. Booking 2 passengers...");
    let user_id = UserId::new();
    let request = BookingRequest::new(
        user_id,
        slot.id,
        seed.package.id,
        passengers(&["Ada Lovelace", "Charles Babbage"]),
    )
    .with_coupon("SAVE10")
    .with_notes("Celebrating an anniversary");
    let booking = app.coordinator.reserve_booking(request).await?;
    println!("   booking {} is {} at {}", booking.id, booking.status, booking.total_price);

    let available = app.operator.available_slots(seed.package.id, date).await?;
    for s in &available {
        println!("   slot {} has {} seats left", s.id, s.available_seats());
    }

    println!("\n4. Cancelling the booking...");
    let cancelled = app.coordinator.cancel_booking(booking.id).await?;
    println!("   booking {} is {}", cancelled.id, cancelled.status);

    println!("\n5. Booking the supporters' flight without an entitlement...");
    let gated = BookingRequest::new(
        user_id,
        slot.id,
        seed.gated_package.id,
        passengers(&["Ada Lovelace"]),
    );
    match app.coordinator.reserve_booking(gated.clone()).await {
        Ok(b) => println!("   unexpectedly booked {}", b.id),
        Err(e) => println!("   refused: {e} (remedy: {})", e.remediation().as_str()),
    }

    let entitlement = app
        .operator
        .grant_entitlement(user_id, seed.operator_id, Money::from_minor(25_000))
        .await?;
    println!("   granted entitlement {} at rank {}", entitlement.id, entitlement.tier_sort_order);
    let booking = app.coordinator.reserve_booking(gated).await?;
    println!("   booked {} at {}", booking.id, booking.total_price);

    if let Some(rendered) = app.render_metrics() {
        println!("\nMetrics:\n{rendered}");
    }

    // Let fire-and-forget notifications flush before exit.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    app.shutdown().await;

    println!("\n============================================");
    println!("   Demo complete");
    println!("============================================\n");
    Ok(())
}
