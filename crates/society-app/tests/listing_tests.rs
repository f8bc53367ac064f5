// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use society_app::{
    ActorAttribute, ActorId, Flat, FlatId, Gateway, Listing, ListingCommand, ListingEvent, Loaded,
    MeterReading, Pagination, endpoints,
};
use society_testkit::{ManualClock, Operation, seeded_gateway};
use std::cell::RefCell;
use std::rc::Rc;

fn flat_listing(
    clock: &Rc<ManualClock>,
    pagination: Option<Pagination>,
) -> Listing<Flat, Rc<ManualClock>> {
    Listing::with_clock(endpoints::FLATS, pagination, Rc::clone(clock))
}

#[test]
fn overlay_stays_up_for_the_minimum_duration() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None);

    listing.reload(&gateway)?;
    assert!(!listing.is_loading());
    assert!(listing.overlay_visible(), "fast fetch still shows overlay");
    assert!(!listing.sort("flatNo"), "sorting is blocked under the overlay");
    assert_eq!(
        listing.dispatch(ListingCommand::Expand(FlatId::new(1000))),
        vec![ListingEvent::Blocked]
    );

    clock.advance_ms(299);
    assert!(listing.overlay_visible());

    clock.advance_ms(1);
    assert!(!listing.overlay_visible());
    assert!(listing.sort("flatNo"));
    Ok(())
}

#[test]
fn paged_listing_tracks_server_totals() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, Some(Pagination::new(3)));

    listing.reload(&gateway)?;
    let pagination = listing.pagination().copied().unwrap_or(Pagination::new(1));
    assert_eq!(listing.rows().len(), 3);
    assert_eq!(pagination.total_count, 8);
    assert_eq!(pagination.total_pages, 3);

    clock.advance_ms(300);
    assert_eq!(
        listing.dispatch(ListingCommand::ChangePage(3)),
        vec![ListingEvent::PageChanged(3), ListingEvent::ReloadRequested]
    );
    listing.reload(&gateway)?;
    assert_eq!(listing.rows().len(), 2);

    let requested: Vec<u32> = gateway
        .calls_of(Operation::FetchPaged)
        .iter()
        .filter_map(|call| call.page.map(|page| page.number))
        .collect();
    assert_eq!(requested, vec![1, 3]);
    Ok(())
}

#[test]
fn page_past_the_end_reloads_the_last_page_with_its_rows() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, Some(Pagination::new(3)));
    listing.reload(&gateway)?;
    clock.advance_ms(300);

    assert!(listing.change_page(9));
    assert_eq!(listing.page_past_end(), Some(3));
    listing.reload(&gateway)?;

    let pagination = listing.pagination().copied().unwrap_or(Pagination::new(1));
    assert_eq!((pagination.page_number, pagination.total_pages), (3, 3));
    assert_eq!(listing.rows().len(), 2);
    assert_eq!(listing.page_past_end(), None);

    let requested: Vec<u32> = gateway
        .calls_of(Operation::FetchPaged)
        .iter()
        .filter_map(|call| call.page.map(|page| page.number))
        .collect();
    assert_eq!(requested, vec![1, 9, 3]);
    Ok(())
}

#[test]
fn page_size_change_returns_to_the_first_page() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, Some(Pagination::new(2)));
    listing.reload(&gateway)?;
    clock.advance_ms(300);

    assert!(listing.change_page(4));
    assert_eq!(
        listing.dispatch(ListingCommand::ChangePageSize(5)),
        vec![
            ListingEvent::PageSizeChanged(5),
            ListingEvent::PageChanged(1),
            ListingEvent::ReloadRequested,
        ]
    );
    listing.reload(&gateway)?;
    assert_eq!(listing.rows().len(), 5);
    assert_eq!(listing.pagination().map(|p| p.total_pages), Some(2));
    Ok(())
}

#[test]
fn delete_removes_the_row_even_when_the_reload_fails() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None);
    listing.reload(&gateway)?;
    clock.advance_ms(300);
    assert_eq!(listing.expand(FlatId::new(1000)), Some(true));

    gateway.fail_next(Operation::FetchAll, "connection reset");
    assert!(listing.delete(&gateway, FlatId::new(1000), &ActorId::new("42"))?);

    assert_eq!(listing.rows().len(), 7);
    assert!(listing.rows().iter().all(|flat| flat.id != FlatId::new(1000)));
    assert_eq!(listing.expanded_row_id(), None);
    assert!(!listing.is_loading());

    let removes = gateway.calls_of(Operation::Remove);
    assert_eq!(removes.len(), 1);
    assert_eq!(removes[0].id.as_deref(), Some("1000"));
    assert_eq!(
        removes[0].actor,
        Some((ActorAttribute::DeletedBy, "42".to_owned()))
    );
    assert_eq!(gateway.rows(endpoints::FLATS).len(), 7);
    Ok(())
}

#[test]
fn failed_delete_keeps_every_row() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, Some(Pagination::new(25)));
    listing.reload(&gateway)?;
    clock.advance_ms(300);

    gateway.fail_next(Operation::Remove, "server error (409): flat has readings");
    let error = listing
        .delete(&gateway, FlatId::new(1001), &ActorId::anonymous())
        .err()
        .map(|error| error.to_string());
    assert_eq!(
        error.as_deref(),
        Some("server error (409): flat has readings")
    );
    assert_eq!(listing.rows().len(), 8);
    assert_eq!(listing.pagination().map(|p| p.total_count), Some(8));
    Ok(())
}

#[test]
fn superseded_fetch_results_are_dropped() -> Result<()> {
    let (gateway, fixture) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None);

    let first = listing.begin_fetch();
    let second = listing.begin_fetch();

    let stale = vec![fixture.flats[0].clone()];
    assert!(!listing.complete_fetch(first, Ok(Loaded::All(stale)))?);
    assert!(listing.is_loading(), "newer fetch is still pending");

    let fresh = gateway.fetch_all_json(endpoints::FLATS)?;
    let rows: Vec<Flat> = fresh
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()?;
    assert!(listing.complete_fetch(second, Ok(Loaded::All(rows)))?);
    assert_eq!(listing.rows().len(), 8);
    Ok(())
}

#[test]
fn expansion_clears_when_the_row_disappears() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None);
    listing.reload(&gateway)?;
    clock.advance_ms(300);

    assert_eq!(
        listing.dispatch(ListingCommand::Expand(FlatId::new(1102))),
        vec![ListingEvent::RowExpanded(FlatId::new(1102))]
    );
    assert_eq!(listing.expanded_row().map(|f| f.id), Some(FlatId::new(1102)));

    gateway.remove(endpoints::FLATS, "1102", &ActorId::new("7"))?;
    listing.reload(&gateway)?;
    assert_eq!(listing.expanded_row_id(), None);

    clock.advance_ms(300);
    assert_eq!(
        listing.dispatch(ListingCommand::Expand(FlatId::new(1000))),
        vec![ListingEvent::RowExpanded(FlatId::new(1000))]
    );
    assert_eq!(
        listing.dispatch(ListingCommand::Expand(FlatId::new(1000))),
        vec![ListingEvent::RowCollapsed(FlatId::new(1000))]
    );
    Ok(())
}

#[test]
fn sort_toggles_direction_and_survives_reload() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing: Listing<MeterReading, _> =
        Listing::with_clock(endpoints::METER_READINGS, None, Rc::clone(&clock))
            .with_initial_sort("currentReading", false);
    listing.reload(&gateway)?;

    let readings: Vec<f64> = listing
        .rows()
        .iter()
        .filter_map(|r| r.current_reading)
        .collect();
    assert!(readings.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(listing.sort_indicator("currentReading"), "▼");
    assert_eq!(listing.sort_indicator("flatId"), "");

    clock.advance_ms(300);
    assert!(listing.sort("currentReading"));
    assert_eq!(listing.sort_indicator("currentReading"), "▲");
    listing.reload(&gateway)?;
    let readings: Vec<f64> = listing
        .rows()
        .iter()
        .filter_map(|r| r.current_reading)
        .collect();
    assert!(readings.windows(2).all(|pair| pair[0] <= pair[1]));
    Ok(())
}

#[test]
fn text_filter_needs_three_characters() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None).with_filter_fields(["flatNo"]);
    listing.reload(&gateway)?;

    listing.set_filter("A-");
    assert_eq!(listing.visible_rows().len(), 8);

    listing.set_filter("a-1");
    assert_eq!(listing.visible_rows().len(), 4);
    Ok(())
}

#[test]
fn external_invalidation_marks_stale_until_reloaded() -> Result<()> {
    let (gateway, _) = seeded_gateway()?;
    let clock = Rc::new(ManualClock::new());
    let mut listing = flat_listing(&clock, None);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    listing.on_external_invalidate(move |endpoint| sink.borrow_mut().push(endpoint.to_owned()));

    listing.invalidate_externally();
    assert!(listing.is_stale());
    assert_eq!(seen.borrow().as_slice(), ["Flat".to_owned()]);

    listing.reload(&gateway)?;
    assert!(!listing.is_stale());

    listing.teardown();
    listing.invalidate_externally();
    assert_eq!(seen.borrow().len(), 1, "teardown drops handlers");
    assert!(!listing.overlay_visible());
    Ok(())
}
