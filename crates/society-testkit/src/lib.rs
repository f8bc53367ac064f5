// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use society_app::{
    ActorAttribute, ActorId, ActorProvider, Apartment, ApartmentId, BodyEncoding, Clock, Flat,
    FlatId, Gateway, GatewayResponse, LookupHierarchy, MeterReading, MeterReadingId, Page,
    PageRequest, Society, SocietyId, endpoints,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use time::{Date, Month};

const SOCIETY_NAMES: [&str; 8] = [
    "Green Meadows",
    "Lake View",
    "Palm Grove",
    "Silver Oaks",
    "Sunrise Heights",
    "Riverbend",
    "Cedar Court",
    "Orchid Enclave",
];

const TOWER_NAMES: [&str; 6] = ["Tower A", "Tower B", "Tower C", "Block 1", "Block 2", "Wing East"];

const STREET_NAMES: [&str; 6] = [
    "MG Road",
    "Ring Road",
    "Station Road",
    "Lake Road",
    "Temple Street",
    "Hill View Road",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    FetchAll,
    FetchById,
    FetchPaged,
    Update,
    Remove,
}

/// One recorded gateway round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCall {
    pub operation: Operation,
    pub endpoint: String,
    pub id: Option<String>,
    pub actor: Option<(ActorAttribute, String)>,
    pub encoding: Option<BodyEncoding>,
    pub payload: Option<serde_json::Value>,
    pub page: Option<PageRequest>,
}

impl GatewayCall {
    fn new(operation: Operation, endpoint: &str) -> Self {
        Self {
            operation,
            endpoint: endpoint.to_owned(),
            id: None,
            actor: None,
            encoding: None,
            payload: None,
            page: None,
        }
    }
}

/// In-memory gateway keyed by endpoint. Rows are JSON objects with an
/// integer `id`.
#[derive(Debug, Default)]
pub struct FakeGateway {
    tables: RefCell<BTreeMap<String, Vec<serde_json::Value>>>,
    calls: RefCell<Vec<GatewayCall>>,
    failures: RefCell<VecDeque<(Operation, String)>>,
    next_id: Cell<i64>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(10_000),
            ..Self::default()
        }
    }

    pub fn seed<T: Serialize>(&self, endpoint: &str, rows: &[T]) -> Result<()> {
        let encoded = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("encode {endpoint} seed rows"))?;
        self.tables
            .borrow_mut()
            .insert(endpoint.to_owned(), encoded);
        Ok(())
    }

    pub fn rows(&self, endpoint: &str) -> Vec<serde_json::Value> {
        self.tables
            .borrow()
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.borrow().clone()
    }

    pub fn calls_of(&self, operation: Operation) -> Vec<GatewayCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    /// Makes the next call of `operation` fail with `message`.
    pub fn fail_next(&self, operation: Operation, message: &str) {
        self.failures
            .borrow_mut()
            .push_back((operation, message.to_owned()));
    }

    fn record(&self, call: GatewayCall) -> Result<()> {
        let operation = call.operation;
        self.calls.borrow_mut().push(call);

        let mut failures = self.failures.borrow_mut();
        if let Some(index) = failures.iter().position(|(op, _)| *op == operation) {
            let (_, message) = failures.remove(index).unwrap_or((operation, String::new()));
            return Err(anyhow!(message));
        }
        Ok(())
    }

    fn allocate_id(&self) -> i64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

fn row_matches(row: &serde_json::Value, id: &str) -> bool {
    row.get("id")
        .and_then(serde_json::Value::as_i64)
        .is_some_and(|row_id| row_id.to_string() == id)
}

impl Gateway for FakeGateway {
    fn create(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse> {
        self.record(GatewayCall {
            actor: Some((ActorAttribute::CreatedBy, actor.to_string())),
            encoding: Some(encoding),
            payload: Some(payload.clone()),
            ..GatewayCall::new(Operation::Create, endpoint)
        })?;

        let id = self.allocate_id();
        let mut row = payload.clone();
        let Some(object) = row.as_object_mut() else {
            bail!("server error (400): {endpoint} payload must be an object");
        };
        object.insert("id".to_owned(), serde_json::json!(id));
        self.tables
            .borrow_mut()
            .entry(endpoint.to_owned())
            .or_default()
            .push(row);
        Ok(GatewayResponse {
            status: 201,
            body: serde_json::json!({ "id": id }),
        })
    }

    fn fetch_all_json(&self, endpoint: &str) -> Result<Vec<serde_json::Value>> {
        self.record(GatewayCall::new(Operation::FetchAll, endpoint))?;
        Ok(self.rows(endpoint))
    }

    fn fetch_by_id_json(&self, endpoint: &str, id: &str) -> Result<serde_json::Value> {
        self.record(GatewayCall {
            id: Some(id.to_owned()),
            ..GatewayCall::new(Operation::FetchById, endpoint)
        })?;
        self.rows(endpoint)
            .into_iter()
            .find(|row| row_matches(row, id))
            .ok_or_else(|| anyhow!("server error (404): {endpoint} {id} not found"))
    }

    fn fetch_paged_json(
        &self,
        endpoint: &str,
        page: PageRequest,
    ) -> Result<Page<serde_json::Value>> {
        self.record(GatewayCall {
            page: Some(page),
            ..GatewayCall::new(Operation::FetchPaged, endpoint)
        })?;

        let rows = self.rows(endpoint);
        let size = page.size.max(1) as usize;
        let total_count = rows.len() as u64;
        let total_pages = rows.len().div_ceil(size) as u32;
        let skip = (page.number.max(1) as usize - 1) * size;
        Ok(Page {
            items: rows.into_iter().skip(skip).take(size).collect(),
            total_count,
            total_pages,
        })
    }

    fn update(
        &self,
        endpoint: &str,
        id: &str,
        payload: &serde_json::Value,
        actor: &ActorId,
        encoding: BodyEncoding,
    ) -> Result<GatewayResponse> {
        self.record(GatewayCall {
            id: Some(id.to_owned()),
            actor: Some((ActorAttribute::ModifiedBy, actor.to_string())),
            encoding: Some(encoding),
            payload: Some(payload.clone()),
            ..GatewayCall::new(Operation::Update, endpoint)
        })?;

        let mut tables = self.tables.borrow_mut();
        let Some(row) = tables
            .get_mut(endpoint)
            .and_then(|rows| rows.iter_mut().find(|row| row_matches(row, id)))
        else {
            bail!("server error (404): {endpoint} {id} not found");
        };
        *row = payload.clone();
        Ok(GatewayResponse::ok(serde_json::Value::Null))
    }

    fn remove(&self, endpoint: &str, id: &str, actor: &ActorId) -> Result<GatewayResponse> {
        self.record(GatewayCall {
            id: Some(id.to_owned()),
            actor: Some((ActorAttribute::DeletedBy, actor.to_string())),
            ..GatewayCall::new(Operation::Remove, endpoint)
        })?;

        let mut tables = self.tables.borrow_mut();
        let rows = tables.entry(endpoint.to_owned()).or_default();
        let before = rows.len();
        rows.retain(|row| !row_matches(row, id));
        if rows.len() == before {
            bail!("server error (404): {endpoint} {id} not found");
        }
        Ok(GatewayResponse::ok(serde_json::Value::Null))
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn advance_ms(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedActor(pub Option<ActorId>);

impl FixedActor {
    pub fn signed_in(id: &str) -> Self {
        Self(Some(ActorId::new(id)))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl ActorProvider for FixedActor {
    fn current_actor(&self) -> Option<ActorId> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// A seeded society with its towers, flats and a month of meter readings.
#[derive(Debug, Clone)]
pub struct SocietyFixture {
    pub societies: Vec<Society>,
    pub apartments: Vec<Apartment>,
    pub flats: Vec<Flat>,
    pub readings: Vec<MeterReading>,
}

impl SocietyFixture {
    pub fn hierarchy(&self) -> Result<LookupHierarchy> {
        let mut hierarchy = LookupHierarchy::new(["society", "apartment", "flat"]);
        hierarchy.load_level(0, self.societies.iter().map(Society::lookup_node).collect())?;
        hierarchy.load_level(1, self.apartments.iter().map(Apartment::lookup_node).collect())?;
        hierarchy.load_level(2, self.flats.iter().map(Flat::lookup_node).collect())?;
        Ok(hierarchy)
    }

    pub fn seed(&self, gateway: &FakeGateway) -> Result<()> {
        gateway.seed(endpoints::SOCIETIES, &self.societies)?;
        gateway.seed(endpoints::APARTMENTS, &self.apartments)?;
        gateway.seed(endpoints::FLATS, &self.flats)?;
        gateway.seed(endpoints::METER_READINGS, &self.readings)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SocietyFaker {
    rng: DeterministicRng,
}

impl SocietyFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    fn pick<'a>(&mut self, values: &[&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }

    /// `societies` societies, two towers each, `flats_per_tower` flats per
    /// tower and one reading per flat dated `reading_date`.
    pub fn fixture(
        &mut self,
        societies: usize,
        flats_per_tower: usize,
        reading_date: Date,
    ) -> SocietyFixture {
        let mut fixture = SocietyFixture {
            societies: Vec::new(),
            apartments: Vec::new(),
            flats: Vec::new(),
            readings: Vec::new(),
        };

        for society_index in 0..societies {
            let society_id = SocietyId::new(society_index as i64 + 1);
            fixture.societies.push(Society {
                id: society_id,
                name: SOCIETY_NAMES[society_index % SOCIETY_NAMES.len()].to_owned(),
                address: format!(
                    "{} {}",
                    self.rng.int_n(400) + 1,
                    self.pick(&STREET_NAMES)
                ),
                is_active: true,
            });

            for tower_index in 0..2 {
                let apartment_id = ApartmentId::new(society_id.get() * 10 + tower_index);
                let tower = TOWER_NAMES[(society_index * 2 + tower_index as usize) % TOWER_NAMES.len()];
                fixture.apartments.push(Apartment {
                    id: apartment_id,
                    society_id,
                    name: tower.to_owned(),
                    is_active: true,
                });

                for flat_index in 0..flats_per_tower {
                    let flat_id = FlatId::new(apartment_id.get() * 100 + flat_index as i64);
                    let floor = flat_index / 4 + 1;
                    fixture.flats.push(Flat {
                        id: flat_id,
                        society_id,
                        apartment_id,
                        flat_no: format!(
                            "{}-{}{:02}",
                            tower.chars().last().unwrap_or('X'),
                            floor,
                            flat_index % 4 + 1
                        ),
                        area_sq_ft: Some(650.0 + (self.rng.int_n(12) as f64) * 50.0),
                        owner: None,
                        is_active: true,
                    });

                    let previous = (self.rng.int_n(5_000) as f64) + 100.0;
                    let mut reading = MeterReading {
                        id: MeterReadingId::new(flat_id.get()),
                        society_id,
                        apartment_id,
                        flat_id,
                        reading_date: Some(reading_date),
                        previous_reading: Some(previous),
                        current_reading: Some(previous + (self.rng.int_n(300) as f64)),
                        ..MeterReading::default()
                    };
                    let period = reading.billing_period();
                    reading.billing_month = period.label;
                    reading.bill_from_date = period.from_date;
                    reading.bill_to_date = period.to_date;
                    fixture.readings.push(reading);
                }
            }
        }

        fixture
    }
}

/// Gateway seeded with one society, two towers and four flats per tower,
/// read on 2024-06-05.
pub fn seeded_gateway() -> Result<(FakeGateway, SocietyFixture)> {
    let date = fixture_reading_date()?;
    let fixture = SocietyFaker::new(7).fixture(1, 4, date);
    let gateway = FakeGateway::new();
    fixture.seed(&gateway)?;
    Ok((gateway, fixture))
}

pub fn fixture_reading_date() -> Result<Date> {
    Date::from_calendar_date(2024, Month::June, 5).context("build fixture reading date")
}

#[cfg(test)]
mod tests {
    use super::{FakeGateway, ManualClock, Operation, SocietyFaker, fixture_reading_date};
    use anyhow::Result;
    use society_app::{ActorId, BodyEncoding, Clock, Gateway, PageRequest};

    #[test]
    fn fixture_is_deterministic_and_consistent() -> Result<()> {
        let date = fixture_reading_date()?;
        let first = SocietyFaker::new(3).fixture(2, 3, date);
        let second = SocietyFaker::new(3).fixture(2, 3, date);
        assert_eq!(first.flats, second.flats);
        assert_eq!(first.apartments.len(), 4);
        assert_eq!(first.flats.len(), 12);
        assert!(first.readings.iter().all(|r| r.billing_month == "May-2024"));

        let hierarchy = first.hierarchy()?;
        assert_eq!(hierarchy.options_for(1, Some(1)).len(), 2);
        Ok(())
    }

    #[test]
    fn paging_slices_rows() -> Result<()> {
        let gateway = FakeGateway::new();
        let rows: Vec<serde_json::Value> =
            (1..=5).map(|id| serde_json::json!({ "id": id })).collect();
        gateway.seed("Flat", &rows)?;

        let page = gateway.fetch_paged_json("Flat", PageRequest { number: 3, size: 2 })?;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_count, 5);
        Ok(())
    }

    #[test]
    fn injected_failures_fire_once() -> Result<()> {
        let gateway = FakeGateway::new();
        gateway.fail_next(Operation::FetchAll, "boom");
        assert!(gateway.fetch_all_json("Flat").is_err());
        assert!(gateway.fetch_all_json("Flat")?.is_empty());
        assert_eq!(gateway.calls_of(Operation::FetchAll).len(), 2);
        Ok(())
    }

    #[test]
    fn create_assigns_ids() -> Result<()> {
        let gateway = FakeGateway::new();
        let response = gateway.create(
            "Flat",
            &serde_json::json!({ "flatNo": "A-1" }),
            &ActorId::new("9"),
            BodyEncoding::Json,
        )?;
        assert_eq!(response.created_id(), Some(10_000));
        assert_eq!(gateway.rows("Flat")[0]["id"], 10_000);
        Ok(())
    }

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);
        clock.advance_ms(250);
        assert_eq!(clock.now() - start, std::time::Duration::from_millis(250));
    }
}
