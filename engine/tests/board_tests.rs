//! Untaken board reconciler tests, including the rate-limit-friendly
//! idempotency guarantee.

use booking::model::{Booking, BookingStatus, BoostType, Bracket, Faction};

mod mock_gateway;
use mock_gateway::{CH_UNTAKEN_2V2, CH_UNTAKEN_3V3, Harness};

fn untaken_booking(class_name: &str, spec: &str, author: u64) -> Booking {
    let mut b = Booking::new("eu", Bracket::TwoVsTwo, author, 1_000);
    b.status = BookingStatus::Untaken;
    b.boost_type = Some(BoostType::OneWin);
    b.buyer.name = Some("Buyer".into());
    b.buyer.realm = Some("Ravencrest".into());
    b.buyer.faction = Some(Faction::Horde);
    b.buyer.class_name = Some(class_name.into());
    b.buyer.spec = Some(spec.into());
    b.buyer.rating = Some("1900".into());
    b.ad_price_estimate = 80_000;
    b
}

#[tokio::test(start_paused = true)]
async fn first_render_creates_one_page_per_bracket() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.registry
        .create(untaken_booking("Druid", "Restoration", 1))
        .await?;

    h.board.render().await?;

    // One page in the 2v2 channel listing the booking, one empty-board
    // page in the 3v3 channel.
    let twos = h.chat.channel_sends(CH_UNTAKEN_2V2).await;
    assert_eq!(twos.len(), 1);
    assert!(twos[0].contains("Restoration Druid"));

    let threes = h.chat.channel_sends(CH_UNTAKEN_3V3).await;
    assert_eq!(threes.len(), 1);
    assert!(threes[0].contains("no untaken boosts"));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rerender_without_changes_issues_zero_calls() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.registry
        .create(untaken_booking("Druid", "Restoration", 1))
        .await?;
    h.registry
        .create(untaken_booking("Mage", "Frost", 2))
        .await?;

    h.board.render().await?;
    let calls_after_first = h.chat.call_count().await;

    h.board.render().await?;
    assert_eq!(
        h.chat.call_count().await,
        calls_after_first,
        "an unchanged board must not touch the publishing surface"
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn data_changes_edit_rather_than_recreate() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let keep = h
        .registry
        .create(untaken_booking("Druid", "Restoration", 1))
        .await?;
    let claimed = h
        .registry
        .create(untaken_booking("Mage", "Frost", 2))
        .await?;

    h.board.render().await?;
    let sends_before = h.chat.channel_messages.lock().await.len();

    // One booking leaves the board.
    h.registry
        .update(&claimed, |b| {
            b.advance(BookingStatus::Pending)?;
            Ok(())
        })
        .await?;
    h.board.render().await?;

    // The existing page was edited in place; nothing new was created.
    assert_eq!(h.chat.channel_messages.lock().await.len(), sends_before);
    let edits = h.chat.edits.lock().await;
    assert_eq!(edits.len(), 1);
    assert!(edits[0].1.contains(&keep));
    assert!(!edits[0].1.contains(&claimed));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn extra_pages_are_deleted_when_the_list_shrinks() -> anyhow::Result<()> {
    let h = Harness::new().await;

    // Twelve untaken bookings: two pages at a page size of ten.
    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(
            h.registry
                .create(untaken_booking("Druid", "Restoration", i))
                .await?,
        );
    }

    h.board.render().await?;
    assert_eq!(h.chat.channel_sends(CH_UNTAKEN_2V2).await.len(), 2);

    // Shrink below one page: the second page must be deleted.
    for id in &ids[2..] {
        h.registry.remove(id).await?;
    }
    h.board.render().await?;

    assert_eq!(h.chat.deletes.lock().await.len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn entries_group_by_class_and_spec() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.registry
        .create(untaken_booking("Druid", "Restoration", 1))
        .await?;
    h.registry
        .create(untaken_booking("Druid", "Restoration", 2))
        .await?;
    h.registry
        .create(untaken_booking("Mage", "Frost", 3))
        .await?;

    h.board.render().await?;

    let page = &h.chat.channel_sends(CH_UNTAKEN_2V2).await[0];
    // One heading per distinct (spec, class) group.
    assert_eq!(page.matches("Restoration Druid bookings").count(), 1);
    assert_eq!(page.matches("Frost Mage bookings").count(), 1);

    Ok(())
}
