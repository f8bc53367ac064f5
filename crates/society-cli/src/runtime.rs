// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use society_app::{
    ActorProvider, BillingPeriod, FieldValue, Gateway, GatewayExt, Listing, SystemClock,
    billing_period_for, format_iso_date,
};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

type JsonListing = Listing<serde_json::Value, SystemClock>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    pub endpoint: String,
    pub page: Option<i64>,
    pub page_size: Option<u32>,
    pub sort: Option<String>,
    pub descending: bool,
    pub all: bool,
    pub filter: Option<String>,
}

/// Runs one command against a gateway and renders its output as text.
pub struct Runtime<'a, G: Gateway + ?Sized> {
    gateway: &'a G,
    actor: &'a dyn ActorProvider,
    page_size: u32,
    overlay_min: Duration,
}

impl<'a, G: Gateway + ?Sized> Runtime<'a, G> {
    pub fn new(
        gateway: &'a G,
        actor: &'a dyn ActorProvider,
        page_size: u32,
        overlay_min: Duration,
    ) -> Self {
        Self {
            gateway,
            actor,
            page_size,
            overlay_min,
        }
    }

    pub fn billing_period(&self, raw: &str) -> String {
        render_period(&billing_period_for(raw))
    }

    pub fn list(&self, args: &ListArgs) -> Result<String> {
        let mut listing = self.open_listing(&args.endpoint, !args.all);
        if let Some(field) = &args.sort {
            listing = listing.with_initial_sort(field, !args.descending);
        }
        if let Some(size) = args.page_size
            && !listing.change_page_size(size)
        {
            bail!("--page-size must be positive");
        }
        if let Some(page) = args.page
            && !listing.change_page(page)
        {
            bail!("--page must be 1 or greater, got {page}");
        }

        listing
            .reload(self.gateway)
            .with_context(|| format!("list {}", args.endpoint))?;

        let columns = columns_of(listing.rows());
        if let Some(filter) = &args.filter {
            listing = listing.with_filter_fields(columns.clone());
            listing.set_filter(filter);
        }
        Ok(render_table(&listing, &columns))
    }

    pub fn show(&self, endpoint: &str, id: &str) -> Result<String> {
        let row: serde_json::Value = self
            .gateway
            .fetch_by_id(endpoint, id)
            .with_context(|| format!("show {endpoint} {id}"))?;
        let mut out = serde_json::to_string_pretty(&row).context("format entity")?;
        out.push('\n');
        Ok(out)
    }

    /// Loads the listing, waits out the loading overlay, then deletes
    /// through it so the local rows and the server stay in step.
    pub fn delete(&self, endpoint: &str, id: &str) -> Result<String> {
        let id: i64 = id
            .trim()
            .parse()
            .with_context(|| format!("id {id:?} must be a number"))?;

        let mut listing = self.open_listing(endpoint, false);
        listing
            .reload(self.gateway)
            .with_context(|| format!("load {endpoint} before delete"))?;
        wait_for_overlay(&listing);

        let before = listing.rows().len();
        let actor = self.actor.actor_or_anonymous();
        if !listing.delete(self.gateway, id, &actor)? {
            bail!("{endpoint} is still loading -- retry the delete");
        }
        tracing::debug!(%endpoint, id, actor = %actor, "entity deleted");
        Ok(format!(
            "deleted {endpoint} {id} as actor {actor}; {} of {before} rows remain\n",
            listing.rows().len()
        ))
    }

    fn open_listing(&self, endpoint: &str, paged: bool) -> JsonListing {
        let listing = if paged {
            Listing::paged(endpoint, self.page_size)
        } else {
            Listing::unpaged(endpoint)
        };
        listing.with_overlay_min(self.overlay_min)
    }
}

fn wait_for_overlay(listing: &JsonListing) {
    if let Some(deadline) = listing.overlay_deadline() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

pub fn render_period(period: &BillingPeriod) -> String {
    let date = |value: Option<time::Date>| value.map_or_else(|| "-".to_owned(), format_iso_date);
    format!(
        "billing month: {}\nfrom: {}\nto: {}\n",
        period.label,
        date(period.from_date),
        date(period.to_date)
    )
}

/// Keys of the first row, `id` leading.
fn columns_of(rows: &[serde_json::Value]) -> Vec<String> {
    let Some(first) = rows.first().and_then(serde_json::Value::as_object) else {
        return Vec::new();
    };
    let mut columns: Vec<String> = first.keys().cloned().collect();
    if let Some(index) = columns.iter().position(|key| key == "id") {
        let id = columns.remove(index);
        columns.insert(0, id);
    }
    columns
}

fn render_table(listing: &JsonListing, columns: &[String]) -> String {
    let visible = listing.visible_rows();
    let mut out = String::new();

    if columns.is_empty() {
        out.push_str("no rows\n");
    } else {
        let header: Vec<String> = columns
            .iter()
            .map(|column| match listing.sort_indicator(column) {
                "" => column.clone(),
                indicator => format!("{column} {indicator}"),
            })
            .collect();
        let body: Vec<Vec<String>> = visible
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| cell_text(row.get(column)))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = header
            .iter()
            .enumerate()
            .map(|(index, title)| {
                body.iter()
                    .map(|cells| cells[index].chars().count())
                    .chain([title.chars().count()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        push_line(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        push_line(&mut out, &rule, &widths);
        for cells in &body {
            push_line(&mut out, cells, &widths);
        }
    }

    let _ = match listing.pagination() {
        Some(pagination) => writeln!(
            out,
            "page {} of {} ({} rows)",
            pagination.page_number,
            pagination.last_page(),
            pagination.total_count
        ),
        None => writeln!(out, "{} rows", listing.rows().len()),
    };
    if visible.len() != listing.rows().len() {
        let _ = writeln!(
            out,
            "filter {:?} matched {} of {} rows",
            listing.filter(),
            visible.len(),
            listing.rows().len()
        );
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None => String::new(),
        Some(value) => FieldValue::from_json(value).display_text(),
    }
}
