// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! View model behind every list screen: sorting, paging, row expansion,
//! text filtering and the debounced loading overlay.

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::field::{Record, compare_for_sort};
use crate::gateway::{Gateway, GatewayExt, Page, PageRequest};
use crate::ids::ActorId;

pub const DEFAULT_OVERLAY_MIN: Duration = Duration::from_millis(300);
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MIN_FILTER_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            total_count: 0,
            total_pages: 0,
        }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest {
            number: self.page_number,
            size: self.page_size,
        }
    }

    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }
}

/// Identifies one fetch. Only the most recently issued ticket may apply
/// its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    All(Vec<T>),
    Page(Page<T>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingCommand<Id> {
    Sort(String),
    Expand(Id),
    ChangePage(i64),
    ChangePageSize(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent<Id> {
    SortChanged { field: String, ascending: bool },
    RowExpanded(Id),
    RowCollapsed(Id),
    PageChanged(u32),
    PageSizeChanged(u32),
    ReloadRequested,
    Blocked,
}

type InvalidateHandler = Box<dyn FnMut(&str)>;

pub struct Listing<T: Record, C: Clock = SystemClock> {
    endpoint: String,
    rows: Vec<T>,
    sort_field: Option<String>,
    sort_ascending: bool,
    expanded: Option<T::Id>,
    pagination: Option<Pagination>,
    filter: String,
    filter_fields: Vec<String>,
    is_loading: bool,
    fetch_started: Option<Instant>,
    overlay_min: Duration,
    generation: u64,
    stale: bool,
    invalidate_handlers: Vec<InvalidateHandler>,
    clock: C,
}

impl<T: Record> Listing<T, SystemClock> {
    pub fn unpaged(endpoint: &str) -> Self {
        Self::with_clock(endpoint, None, SystemClock)
    }

    pub fn paged(endpoint: &str, page_size: u32) -> Self {
        Self::with_clock(endpoint, Some(Pagination::new(page_size)), SystemClock)
    }
}

impl<T: Record, C: Clock> Listing<T, C> {
    pub fn with_clock(endpoint: &str, pagination: Option<Pagination>, clock: C) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            rows: Vec::new(),
            sort_field: None,
            sort_ascending: true,
            expanded: None,
            pagination,
            filter: String::new(),
            filter_fields: Vec::new(),
            is_loading: false,
            fetch_started: None,
            overlay_min: DEFAULT_OVERLAY_MIN,
            generation: 0,
            stale: false,
            invalidate_handlers: Vec::new(),
            clock,
        }
    }

    pub fn with_overlay_min(mut self, overlay_min: Duration) -> Self {
        self.overlay_min = overlay_min;
        self
    }

    pub fn with_initial_sort(mut self, field: &str, ascending: bool) -> Self {
        self.sort_field = Some(field.to_owned());
        self.sort_ascending = ascending;
        self
    }

    pub fn with_filter_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn sort_field(&self) -> Option<&str> {
        self.sort_field.as_deref()
    }

    pub fn sort_ascending(&self) -> bool {
        self.sort_ascending
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Visible while a fetch runs and until `overlay_min` has passed since it
    /// started.
    pub fn overlay_visible(&self) -> bool {
        if self.is_loading {
            return true;
        }
        self.overlay_deadline()
            .is_some_and(|deadline| self.clock.now() < deadline)
    }

    /// When the overlay may hide, for hosts that schedule a redraw.
    pub fn overlay_deadline(&self) -> Option<Instant> {
        self.fetch_started.map(|started| started + self.overlay_min)
    }

    pub fn actions_enabled(&self) -> bool {
        !self.overlay_visible()
    }

    /// The expanded row id, or `None` when that row is no longer loaded.
    pub fn expanded_row_id(&self) -> Option<T::Id> {
        self.expanded_row().map(Record::record_id)
    }

    pub fn expanded_row(&self) -> Option<&T> {
        let expanded = self.expanded?;
        self.rows.iter().find(|row| row.record_id() == expanded)
    }

    pub fn sort_indicator(&self, field: &str) -> &'static str {
        match self.sort_field.as_deref() {
            Some(current) if current == field && self.sort_ascending => "▲",
            Some(current) if current == field => "▼",
            _ => "",
        }
    }

    pub fn sort(&mut self, field: &str) -> bool {
        if !self.actions_enabled() {
            return false;
        }

        if self.sort_field.as_deref() == Some(field) {
            self.sort_ascending = !self.sort_ascending;
        } else {
            self.sort_field = Some(field.to_owned());
            self.sort_ascending = true;
        }
        self.apply_sort();
        true
    }

    /// Expands `id`, or collapses it when it is already expanded. Returns the
    /// new expansion state, `None` when the action is blocked.
    pub fn expand(&mut self, id: T::Id) -> Option<bool> {
        if !self.actions_enabled() {
            return None;
        }

        if self.expanded_row_id() == Some(id) {
            self.expanded = None;
            Some(false)
        } else {
            self.expanded = Some(id);
            Some(true)
        }
    }

    /// Moves to page `number`. Numbers below 1 and unpaged listings are
    /// ignored; upper bounds are the caller's concern.
    pub fn change_page(&mut self, number: i64) -> bool {
        if number < 1 || !self.actions_enabled() {
            return false;
        }
        let Some(pagination) = self.pagination.as_mut() else {
            return false;
        };
        pagination.page_number = u32::try_from(number).unwrap_or(u32::MAX);
        true
    }

    pub fn change_page_size(&mut self, size: u32) -> bool {
        if size == 0 || !self.actions_enabled() {
            return false;
        }
        let Some(pagination) = self.pagination.as_mut() else {
            return false;
        };
        pagination.page_size = size;
        pagination.page_number = 1;
        true
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.to_owned();
    }

    /// Rows passing the text filter. Queries shorter than
    /// [`MIN_FILTER_CHARS`] show everything.
    pub fn visible_rows(&self) -> Vec<&T> {
        let query = self.filter.trim().to_lowercase();
        if query.chars().count() < MIN_FILTER_CHARS || self.filter_fields.is_empty() {
            return self.rows.iter().collect();
        }

        self.rows
            .iter()
            .filter(|row| {
                self.filter_fields.iter().any(|field| {
                    row.field(field)
                        .display_text()
                        .to_lowercase()
                        .contains(&query)
                })
            })
            .collect()
    }

    pub fn dispatch(&mut self, command: ListingCommand<T::Id>) -> Vec<ListingEvent<T::Id>> {
        if !self.actions_enabled() {
            return vec![ListingEvent::Blocked];
        }

        match command {
            ListingCommand::Sort(field) => {
                self.sort(&field);
                vec![ListingEvent::SortChanged {
                    field,
                    ascending: self.sort_ascending,
                }]
            }
            ListingCommand::Expand(id) => match self.expand(id) {
                Some(true) => vec![ListingEvent::RowExpanded(id)],
                Some(false) => vec![ListingEvent::RowCollapsed(id)],
                None => vec![ListingEvent::Blocked],
            },
            ListingCommand::ChangePage(number) => {
                if !self.change_page(number) {
                    return Vec::new();
                }
                let page = self.pagination.map_or(1, |p| p.page_number);
                vec![ListingEvent::PageChanged(page), ListingEvent::ReloadRequested]
            }
            ListingCommand::ChangePageSize(size) => {
                if !self.change_page_size(size) {
                    return Vec::new();
                }
                vec![
                    ListingEvent::PageSizeChanged(size),
                    ListingEvent::PageChanged(1),
                    ListingEvent::ReloadRequested,
                ]
            }
        }
    }

    /// Starts a fetch: shows the overlay and supersedes every earlier ticket.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.is_loading = true;
        self.fetch_started = Some(self.clock.now());
        tracing::debug!(
            endpoint = %self.endpoint,
            generation = self.generation,
            "listing fetch started"
        );
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Applies a fetch result. Results of superseded tickets are dropped and
    /// reported as `Ok(false)`. A failed fetch leaves the rows untouched.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<Loaded<T>>) -> Result<bool> {
        if ticket.generation != self.generation {
            tracing::warn!(
                endpoint = %self.endpoint,
                stale = ticket.generation,
                latest = self.generation,
                "discarding superseded listing response"
            );
            return Ok(false);
        }

        self.is_loading = false;
        match result? {
            Loaded::All(rows) => self.rows = rows,
            Loaded::Page(page) => {
                if let Some(pagination) = self.pagination.as_mut() {
                    pagination.total_count = page.total_count;
                    pagination.total_pages = page.total_pages;
                }
                self.rows = page.items;
            }
        }
        self.apply_sort();
        if self.expanded_row().is_none() {
            self.expanded = None;
        }
        self.stale = false;
        tracing::debug!(endpoint = %self.endpoint, rows = self.rows.len(), "listing fetch applied");
        Ok(true)
    }

    /// Fetches the current page (or everything for unpaged listings). A page
    /// requested past the end is replaced by the last page.
    pub fn reload<G>(&mut self, gateway: &G) -> Result<()>
    where
        G: Gateway + ?Sized,
        T: DeserializeOwned,
    {
        self.fetch_current(gateway)?;
        if let Some(last) = self.page_past_end() {
            tracing::debug!(
                endpoint = %self.endpoint,
                last,
                "requested page is past the end, fetching the last page"
            );
            if let Some(pagination) = self.pagination.as_mut() {
                pagination.page_number = last;
            }
            self.fetch_current(gateway)?;
        }
        Ok(())
    }

    /// The last page number when the current page lies beyond the totals of
    /// the latest fetch. The rows held then belong to that empty page.
    pub fn page_past_end(&self) -> Option<u32> {
        self.pagination
            .filter(|pagination| pagination.page_number > pagination.last_page())
            .map(|pagination| pagination.last_page())
    }

    fn fetch_current<G>(&mut self, gateway: &G) -> Result<()>
    where
        G: Gateway + ?Sized,
        T: DeserializeOwned,
    {
        let ticket = self.begin_fetch();
        let result = match self.pagination {
            Some(pagination) => gateway
                .fetch_paged::<T>(&self.endpoint, pagination.request())
                .map(Loaded::Page),
            None => gateway.fetch_all::<T>(&self.endpoint).map(Loaded::All),
        };
        self.complete_fetch(ticket, result).map(|_| ())
    }

    /// Deletes a row through the gateway, drops it locally, then tries to
    /// reload. A failed reload is logged and the local result stands.
    pub fn delete<G>(&mut self, gateway: &G, id: T::Id, actor: &ActorId) -> Result<bool>
    where
        G: Gateway + ?Sized,
        T: DeserializeOwned,
    {
        if !self.actions_enabled() {
            return Ok(false);
        }

        gateway.remove(&self.endpoint, &id.to_string(), actor)?;

        let before = self.rows.len();
        self.rows.retain(|row| row.record_id() != id);
        if self.expanded == Some(id) {
            self.expanded = None;
        }
        if let Some(pagination) = self.pagination.as_mut()
            && self.rows.len() < before
        {
            pagination.total_count = pagination.total_count.saturating_sub(1);
        }

        if let Err(error) = self.reload(gateway) {
            tracing::warn!(
                endpoint = %self.endpoint,
                %id,
                "reload after delete failed, keeping local rows: {error:#}"
            );
        }
        Ok(true)
    }

    /// Registers a callback fired when another screen reports that this
    /// listing's data changed.
    pub fn on_external_invalidate(&mut self, handler: impl FnMut(&str) + 'static) {
        self.invalidate_handlers.push(Box::new(handler));
    }

    pub fn invalidate_externally(&mut self) {
        self.stale = true;
        for handler in &mut self.invalidate_handlers {
            handler(&self.endpoint);
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Drops pending overlay timing and handlers when the screen goes away.
    pub fn teardown(&mut self) {
        self.fetch_started = None;
        self.is_loading = false;
        self.generation += 1;
        self.invalidate_handlers.clear();
    }

    fn apply_sort(&mut self) {
        let Some(field) = self.sort_field.as_deref() else {
            return;
        };
        let ascending = self.sort_ascending;
        self.rows.sort_by(|left, right| {
            compare_for_sort(field, &left.field(field), &right.field(field), ascending)
        });
    }
}
