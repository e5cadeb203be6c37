//! SQLite-backed persistence for bookings and fairness weights.
//!
//! Bookings survive restarts in a single table: scalar fields as columns,
//! the buyer/assignment sub-objects and the price recommendation as JSON
//! text. Fairness weights live in a second table keyed by
//! (instance, bracket, user).

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use gateway::{MessageRef, UserId};

use super::{BookingStore, FairnessStore};
use crate::model::{
    Assignment, Booking, BookingStatus, Bracket, Buyer, PostRef, PriceRecommendation,
};

/// Create both tables if they do not exist. Run once at startup (and by
/// tests against their throwaway pools).
pub async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            instance TEXT NOT NULL,
            author INTEGER NOT NULL,
            bracket TEXT NOT NULL,
            status TEXT NOT NULL,
            boost_type TEXT,
            ad_price_estimate INTEGER NOT NULL,
            price INTEGER NOT NULL,
            notes TEXT,
            payment_realms TEXT,
            payment_proof TEXT,
            post_channel INTEGER,
            post_message INTEGER,
            created_at_ms INTEGER NOT NULL,
            buyer_json TEXT NOT NULL,
            assignment_json TEXT NOT NULL,
            price_rec_json TEXT NOT NULL
        );
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fairness_weights (
            instance TEXT NOT NULL,
            bracket TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            weight REAL NOT NULL,
            PRIMARY KEY (instance, bracket, user_id)
        );
    "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite implementation of [`BookingStore`].
///
/// Optionally scoped to one operating instance: several instances share a
/// pool, and a scoped store only loads its own rows back at startup.
pub struct SqliteBookingStore {
    pool: SqlitePool,
    instance: Option<String>,
}

impl SqliteBookingStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            instance: None,
        }
    }

    pub fn scoped_to(pool: SqlitePool, instance: impl Into<String>) -> Self {
        Self {
            pool,
            instance: Some(instance.into()),
        }
    }

    /// Connect and ensure the schema exists.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;
        ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            instance: None,
        })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Booking> {
    let bracket_str: String = row.get("bracket");
    let status_str: String = row.get("status");

    let boost_type = row
        .get::<Option<String>, _>("boost_type")
        .map(|t| t.parse())
        .transpose()?;

    let post_channel = row.get::<Option<i64>, _>("post_channel");
    let post_message = row.get::<Option<i64>, _>("post_message");
    let post_ref = match (post_channel, post_message) {
        (Some(c), Some(m)) => PostRef::Live(MessageRef {
            channel: c as u64,
            message: m as u64,
        }),
        (None, Some(m)) => PostRef::Archived(m as u64),
        _ => PostRef::None,
    };

    let buyer_json: String = row.get("buyer_json");
    let buyer: Buyer = serde_json::from_str(&buyer_json)
        .map_err(|e| anyhow::anyhow!("Invalid buyer JSON '{}': {}", buyer_json, e))?;

    let assignment_json: String = row.get("assignment_json");
    let assignment: Assignment = serde_json::from_str(&assignment_json)
        .map_err(|e| anyhow::anyhow!("Invalid assignment JSON '{}': {}", assignment_json, e))?;

    let price_rec_json: String = row.get("price_rec_json");
    let price_recommendation: Option<PriceRecommendation> = serde_json::from_str(&price_rec_json)
        .map_err(|e| anyhow::anyhow!("Invalid price recommendation JSON '{}': {}", price_rec_json, e))?;

    Ok(Booking {
        id: row.get("id"),
        instance: row.get("instance"),
        author: row.get::<i64, _>("author") as UserId,
        bracket: Bracket::from_str(&bracket_str)?,
        status: BookingStatus::from_str(&status_str)?,
        boost_type,
        buyer,
        price_recommendation,
        ad_price_estimate: row.get("ad_price_estimate"),
        price: row.get("price"),
        assignment,
        notes: row.get("notes"),
        payment_realms: row.get("payment_realms"),
        payment_proof: row.get("payment_proof"),
        post_ref,
        created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
    })
}

#[async_trait]
impl BookingStore for SqliteBookingStore {
    /// Load every persisted booking (of this store's instance, when
    /// scoped). Called once at startup by the registry to reconstruct the
    /// live set.
    async fn load_all(&self) -> anyhow::Result<Vec<Booking>> {
        let rows = match &self.instance {
            Some(instance) => {
                sqlx::query("SELECT * FROM bookings WHERE instance = ?")
                    .bind(instance)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM bookings")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            bookings.push(row_to_booking(&row)?);
        }
        Ok(bookings)
    }

    /// Store or update a booking with upsert semantics.
    async fn save(&self, booking: &Booking) -> anyhow::Result<()> {
        let buyer_json = serde_json::to_string(&booking.buyer)?;
        let assignment_json = serde_json::to_string(&booking.assignment)?;
        let price_rec_json = serde_json::to_string(&booking.price_recommendation)?;

        let (post_channel, post_message) = match booking.post_ref {
            PostRef::None => (None, None),
            PostRef::Live(r) => (Some(r.channel as i64), Some(r.message as i64)),
            PostRef::Archived(m) => (None, Some(m as i64)),
        };

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, instance, author, bracket, status, boost_type,
                ad_price_estimate, price, notes,
                payment_realms, payment_proof,
                post_channel, post_message, created_at_ms,
                buyer_json, assignment_json, price_rec_json
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                instance = excluded.instance,
                author = excluded.author,
                bracket = excluded.bracket,
                status = excluded.status,
                boost_type = excluded.boost_type,
                ad_price_estimate = excluded.ad_price_estimate,
                price = excluded.price,
                notes = excluded.notes,
                payment_realms = excluded.payment_realms,
                payment_proof = excluded.payment_proof,
                post_channel = excluded.post_channel,
                post_message = excluded.post_message,
                created_at_ms = excluded.created_at_ms,
                buyer_json = excluded.buyer_json,
                assignment_json = excluded.assignment_json,
                price_rec_json = excluded.price_rec_json;
        "#,
        )
        .bind(&booking.id)
        .bind(&booking.instance)
        .bind(booking.author as i64)
        .bind(booking.bracket.to_string())
        .bind(booking.status.to_string())
        .bind(booking.boost_type.map(|t| t.to_string()))
        .bind(booking.ad_price_estimate)
        .bind(booking.price)
        .bind(&booking.notes)
        .bind(&booking.payment_realms)
        .bind(&booking.payment_proof)
        .bind(post_channel)
        .bind(post_message)
        .bind(booking.created_at_ms as i64)
        .bind(buyer_json)
        .bind(assignment_json)
        .bind(price_rec_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, booking_id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// SQLite implementation of [`FairnessStore`].
pub struct SqliteFairnessStore {
    pool: SqlitePool,
}

impl SqliteFairnessStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FairnessStore for SqliteFairnessStore {
    async fn load(
        &self,
        instance: &str,
        bracket: Bracket,
    ) -> anyhow::Result<HashMap<UserId, f64>> {
        let rows =
            sqlx::query("SELECT user_id, weight FROM fairness_weights WHERE instance = ? AND bracket = ?")
                .bind(instance)
                .bind(bracket.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut weights = HashMap::with_capacity(rows.len());
        for row in rows {
            weights.insert(row.get::<i64, _>("user_id") as UserId, row.get("weight"));
        }
        Ok(weights)
    }

    /// Replace the whole table for (instance, bracket) in one transaction.
    async fn save(
        &self,
        instance: &str,
        bracket: Bracket,
        weights: &HashMap<UserId, f64>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM fairness_weights WHERE instance = ? AND bracket = ?")
            .bind(instance)
            .bind(bracket.to_string())
            .execute(&mut *tx)
            .await?;

        for (user, weight) in weights {
            sqlx::query(
                "INSERT INTO fairness_weights (instance, bracket, user_id, weight) VALUES (?, ?, ?, ?)",
            )
            .bind(instance)
            .bind(bracket.to_string())
            .bind(*user as i64)
            .bind(*weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
