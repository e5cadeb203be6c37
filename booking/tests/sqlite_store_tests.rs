use sqlx::SqlitePool;

use booking::model::{
    Assignment, Booking, BookingStatus, Bracket, Buyer, Faction, PostRef, PriceRecommendation,
};
use booking::store::sqlite_store::{
    SqliteBookingStore, SqliteFairnessStore, ensure_schema,
};
use booking::store::{BookingStore, FairnessStore};
use gateway::MessageRef;

fn sample_booking() -> Booking {
    let mut b = Booking::new("eu", Bracket::ThreeVsThree, 42, 1_000);
    b.status = BookingStatus::Pending;
    b.boost_type = Some(booking::model::BoostType::SetRating);
    b.buyer = Buyer {
        name: Some("Mystikdruldk".into()),
        realm: Some("Ravencrest".into()),
        faction: Some(Faction::Horde),
        class_name: Some("Druid".into()),
        spec: Some("Restoration".into()),
        rating: Some("1049-1800".into()),
    };
    b.price_recommendation = Some(PriceRecommendation::Gold(1_234_567));
    b.ad_price_estimate = 1_500_000;
    b.price = 1_400_000;
    b.assignment = Assignment {
        primary: Some(7),
        secondary: Some(8),
        primary_cut: 490_000,
        secondary_cut: 490_000,
        advertiser_cut: 280_000,
        management_cut: 140_000,
    };
    b.notes = Some("evening games only".into());
    b.payment_realms = Some("Draenor, Kazzak".into());
    b.post_ref = PostRef::Archived(555);
    b
}

#[sqlx::test]
async fn insert_and_load_round_trips_every_field(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteBookingStore::from_pool(pool);

    let b = sample_booking();
    store.save(&b).await?;

    let loaded = store.load_all().await?;
    assert_eq!(loaded.len(), 1);

    let l = &loaded[0];
    assert_eq!(l.id, b.id);
    assert_eq!(l.instance, "eu");
    assert_eq!(l.author, 42);
    assert_eq!(l.bracket, Bracket::ThreeVsThree);
    assert_eq!(l.status, BookingStatus::Pending);
    assert_eq!(l.boost_type, b.boost_type);
    assert_eq!(l.buyer, b.buyer);
    assert_eq!(l.price_recommendation, b.price_recommendation);
    assert_eq!(l.ad_price_estimate, b.ad_price_estimate);
    assert_eq!(l.price, b.price);
    assert_eq!(l.assignment, b.assignment);
    assert_eq!(l.notes, b.notes);
    assert_eq!(l.payment_realms, b.payment_realms);
    assert_eq!(l.post_ref, PostRef::Archived(555));
    assert_eq!(l.created_at_ms, 1_000);

    Ok(())
}

#[sqlx::test]
async fn round_trip_for_every_non_terminal_status(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteBookingStore::from_pool(pool);

    use BookingStatus::*;
    for (i, status) in [Compiling, Posted, PendingNotUploaded, Pending, PartialRefund, Untaken]
        .into_iter()
        .enumerate()
    {
        let mut b = Booking::new("eu", Bracket::TwoVsTwo, i as u64, 0);
        b.status = status;
        store.save(&b).await?;

        let loaded = store.load_all().await?;
        let l = loaded.iter().find(|x| x.id == b.id).unwrap();
        assert_eq!(l.status, status);
        assert_eq!(l.author, i as u64);
    }

    Ok(())
}

#[sqlx::test]
async fn save_is_an_upsert(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteBookingStore::from_pool(pool);

    let mut b = sample_booking();
    store.save(&b).await?;

    b.status = BookingStatus::PartialRefund;
    b.price = 700_000;
    store.save(&b).await?;

    let loaded = store.load_all().await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].status, BookingStatus::PartialRefund);
    assert_eq!(loaded[0].price, 700_000);

    Ok(())
}

#[sqlx::test]
async fn live_post_ref_round_trips(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteBookingStore::from_pool(pool);

    let mut b = sample_booking();
    b.post_ref = PostRef::Live(MessageRef {
        channel: 10,
        message: 20,
    });
    store.save(&b).await?;

    let loaded = store.load_all().await?;
    assert_eq!(
        loaded[0].post_ref,
        PostRef::Live(MessageRef {
            channel: 10,
            message: 20
        })
    );

    Ok(())
}

#[sqlx::test]
async fn delete_removes_row(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteBookingStore::from_pool(pool);

    let b = sample_booking();
    store.save(&b).await?;
    assert_eq!(store.load_all().await?.len(), 1);

    store.delete(&b.id).await?;
    assert!(store.load_all().await?.is_empty());

    Ok(())
}

#[sqlx::test]
async fn fairness_tables_are_scoped_and_replaced_whole(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;
    let store = SqliteFairnessStore::from_pool(pool);

    let mut twos = std::collections::HashMap::new();
    twos.insert(1u64, 1.0);
    twos.insert(2u64, -0.5);
    store.save("eu", Bracket::TwoVsTwo, &twos).await?;

    let mut threes = std::collections::HashMap::new();
    threes.insert(3u64, 2.5);
    store.save("eu", Bracket::ThreeVsThree, &threes).await?;

    let loaded = store.load("eu", Bracket::TwoVsTwo).await?;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[&2], -0.5);

    // A save replaces the whole (instance, bracket) table.
    twos.remove(&2);
    twos.insert(1u64, 0.75);
    store.save("eu", Bracket::TwoVsTwo, &twos).await?;

    let loaded = store.load("eu", Bracket::TwoVsTwo).await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[&1], 0.75);

    // Other bracket untouched; unknown instance empty.
    assert_eq!(store.load("eu", Bracket::ThreeVsThree).await?.len(), 1);
    assert!(store.load("us", Bracket::TwoVsTwo).await?.is_empty());

    Ok(())
}

#[sqlx::test]
async fn scoped_stores_only_load_their_own_instance(pool: SqlitePool) -> anyhow::Result<()> {
    ensure_schema(&pool).await?;

    let eu = SqliteBookingStore::scoped_to(pool.clone(), "eu");
    let us = SqliteBookingStore::scoped_to(pool.clone(), "us");

    let b_eu = Booking::new("eu", Bracket::TwoVsTwo, 1, 0);
    let b_us = Booking::new("us", Bracket::TwoVsTwo, 2, 0);

    eu.save(&b_eu).await?;
    us.save(&b_us).await?;

    let loaded = eu.load_all().await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].instance, "eu");

    // The unscoped view still sees everything.
    let all = SqliteBookingStore::from_pool(pool).load_all().await?;
    assert_eq!(all.len(), 2);

    Ok(())
}
