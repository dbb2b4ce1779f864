use anyhow::{anyhow, Context, Result};
use common_auth::Role;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::user_handlers::hash_password;

pub const DEMO_REGIONS: &[&str] = &["Toshkent", "Samarqand", "Buxoro", "Andijon", "Farg'ona"];

pub const DEMO_ADMIN_PHONE: &str = "+998901234567";
pub const DEMO_ADMIN_PASSWORD: &str = "123456";

struct DemoRestaurant {
    name: &'static str,
    region: &'static str,
    tip: i32,
    kind: &'static str,
    address: &'static str,
    phone: &'static str,
}

const DEMO_RESTAURANTS: &[DemoRestaurant] = &[
    DemoRestaurant {
        name: "Rayhon",
        region: "Toshkent",
        tip: 10,
        kind: "RESTAURANT",
        address: "Amir Temur ko'chasi 15",
        phone: "+998712001010",
    },
    DemoRestaurant {
        name: "Registon Choyxona",
        region: "Samarqand",
        tip: 5,
        kind: "CAFE",
        address: "Registon ko'chasi 3",
        phone: "+998662002020",
    },
    DemoRestaurant {
        name: "Buxoro Lavash",
        region: "Buxoro",
        tip: 0,
        kind: "FAST_FOOD",
        address: "Bahouddin Naqshband 7",
        phone: "+998652003030",
    },
];

/// Insert demo regions, restaurants and an admin account. Does nothing when
/// any user already exists.
pub async fn seed_demo_data(db: &PgPool) -> Result<bool> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await
        .context("Failed to count users before seeding")?;
    if users > 0 {
        info!("demo seed skipped: users already present");
        return Ok(false);
    }

    let mut tx = db.begin().await?;

    for name in DEMO_REGIONS {
        sqlx::query("INSERT INTO regions (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(*name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to seed region {name}"))?;
    }

    for restaurant in DEMO_RESTAURANTS {
        sqlx::query(
            "INSERT INTO restaurants (id, name, region_id, tip, kind, address, phone, is_active)
             SELECT $1, $2, r.id, $4, $5, $6, $7, TRUE FROM regions r WHERE r.name = $3",
        )
        .bind(Uuid::new_v4())
        .bind(restaurant.name)
        .bind(restaurant.region)
        .bind(restaurant.tip)
        .bind(restaurant.kind)
        .bind(restaurant.address)
        .bind(restaurant.phone)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to seed restaurant {}", restaurant.name))?;
    }

    let password_hash = hash_password(DEMO_ADMIN_PASSWORD)
        .map_err(|err| anyhow!("Failed to hash demo password: {}", err.code()))?;
    sqlx::query(
        "INSERT INTO users (id, name, phone, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind("Admin")
    .bind(DEMO_ADMIN_PHONE)
    .bind(password_hash)
    .bind(Role::Admin.as_str())
    .execute(&mut *tx)
    .await
    .context("Failed to seed admin user")?;

    tx.commit().await?;
    info!(
        regions = DEMO_REGIONS.len(),
        restaurants = DEMO_RESTAURANTS.len(),
        "demo data seeded"
    );
    Ok(true)
}
