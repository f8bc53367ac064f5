// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use time::Date;

use crate::billing::{BillingPeriod, billing_period};
use crate::field::{Entity, FieldValue, Record};
use crate::ids::*;
use crate::lookup::LookupNode;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Wire endpoints, relative to the configured API base.
pub mod endpoints {
    pub const SOCIETIES: &str = "Society";
    pub const APARTMENTS: &str = "Apartment";
    pub const FLATS: &str = "Flat";
    pub const APARTMENT_GROUPS: &str = "ApartmentGroup";
    pub const COMPONENTS: &str = "Component";
    pub const GROUP_COMPONENTS: &str = "GroupComponent";
    pub const METER_READINGS: &str = "MeterReading";
    pub const UNIT_CHARGES: &str = "UnitCharge";
}

fn id_value(id: i64) -> FieldValue {
    if id <= 0 {
        FieldValue::Null
    } else {
        FieldValue::Int(id)
    }
}

fn unknown_field(entity: &str, name: &str) -> anyhow::Error {
    anyhow::anyhow!("{entity} has no field `{name}`")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Society {
    pub id: SocietyId,
    pub name: String,
    pub address: String,
    pub is_active: bool,
}

impl Default for Society {
    fn default() -> Self {
        Self {
            id: SocietyId::default(),
            name: String::new(),
            address: String::new(),
            is_active: true,
        }
    }
}

impl Society {
    pub fn lookup_node(&self) -> LookupNode {
        LookupNode {
            id: self.id.get(),
            parent_id: None,
            label: self.name.clone(),
            is_active: self.is_active,
        }
    }
}

impl Record for Society {
    type Id = SocietyId;

    fn record_id(&self) -> SocietyId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "name" => FieldValue::text(&self.name),
            "address" => FieldValue::text(&self.address),
            "isActive" => FieldValue::Bool(self.is_active),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Apartment {
    pub id: ApartmentId,
    pub society_id: SocietyId,
    pub name: String,
    pub is_active: bool,
}

impl Default for Apartment {
    fn default() -> Self {
        Self {
            id: ApartmentId::default(),
            society_id: SocietyId::default(),
            name: String::new(),
            is_active: true,
        }
    }
}

impl Apartment {
    pub fn lookup_node(&self) -> LookupNode {
        LookupNode {
            id: self.id.get(),
            parent_id: Some(self.society_id.get()),
            label: self.name.clone(),
            is_active: self.is_active,
        }
    }
}

impl Record for Apartment {
    type Id = ApartmentId;

    fn record_id(&self) -> ApartmentId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "societyId" => id_value(self.society_id.get()),
            "name" => FieldValue::text(&self.name),
            "isActive" => FieldValue::Bool(self.is_active),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flat {
    pub id: FlatId,
    pub society_id: SocietyId,
    pub apartment_id: ApartmentId,
    pub flat_no: String,
    pub area_sq_ft: Option<f64>,
    /// Owner contact as delivered by the backend; replaced wholesale, never
    /// patched in place.
    pub owner: Option<Rc<serde_json::Value>>,
    pub is_active: bool,
}

impl Default for Flat {
    fn default() -> Self {
        Self {
            id: FlatId::default(),
            society_id: SocietyId::default(),
            apartment_id: ApartmentId::default(),
            flat_no: String::new(),
            area_sq_ft: None,
            owner: None,
            is_active: true,
        }
    }
}

impl Flat {
    pub fn lookup_node(&self) -> LookupNode {
        LookupNode {
            id: self.id.get(),
            parent_id: Some(self.apartment_id.get()),
            label: self.flat_no.clone(),
            is_active: self.is_active,
        }
    }
}

impl Record for Flat {
    type Id = FlatId;

    fn record_id(&self) -> FlatId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "societyId" => id_value(self.society_id.get()),
            "apartmentId" => id_value(self.apartment_id.get()),
            "flatNo" => FieldValue::text(&self.flat_no),
            "areaSqFt" => self.area_sq_ft.into(),
            "owner" => self
                .owner
                .clone()
                .map_or(FieldValue::Null, FieldValue::Nested),
            "isActive" => FieldValue::Bool(self.is_active),
            _ => FieldValue::Null,
        }
    }
}

impl Entity for Flat {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "societyId",
        "apartmentId",
        "flatNo",
        "areaSqFt",
        "owner",
        "isActive",
    ];

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match name {
            "societyId" => self.society_id = value.into_id(name)?,
            "apartmentId" => self.apartment_id = value.into_id(name)?,
            "flatNo" => self.flat_no = value.into_text(name)?,
            "areaSqFt" => self.area_sq_ft = value.into_number(name)?,
            "owner" => self.owner = value.into_nested(name)?,
            "isActive" => self.is_active = value.into_bool(name)?,
            "id" => bail!("flat id is assigned by the server"),
            _ => return Err(unknown_field("flat", name)),
        }
        Ok(())
    }

    fn is_new(&self) -> bool {
        self.id.is_unsaved()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApartmentGroup {
    pub id: ApartmentGroupId,
    pub society_id: SocietyId,
    pub name: String,
    /// Sum of active component amounts, maintained by the backend.
    pub total_amount: f64,
}

impl Record for ApartmentGroup {
    type Id = ApartmentGroupId;

    fn record_id(&self) -> ApartmentGroupId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "societyId" => id_value(self.society_id.get()),
            "name" => FieldValue::text(&self.name),
            "totalAmount" => FieldValue::Number(self.total_amount),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub is_active: bool,
}

impl Default for Component {
    fn default() -> Self {
        Self {
            id: ComponentId::default(),
            name: String::new(),
            is_active: true,
        }
    }
}

impl Component {
    pub fn lookup_node(&self) -> LookupNode {
        LookupNode {
            id: self.id.get(),
            parent_id: None,
            label: self.name.clone(),
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupComponent {
    pub id: GroupComponentId,
    pub apartment_group_id: ApartmentGroupId,
    pub component_id: ComponentId,
    pub amount: f64,
    pub is_active: bool,
}

impl Default for GroupComponent {
    fn default() -> Self {
        Self {
            id: GroupComponentId::default(),
            apartment_group_id: ApartmentGroupId::default(),
            component_id: ComponentId::default(),
            amount: 0.0,
            is_active: true,
        }
    }
}

impl Record for GroupComponent {
    type Id = GroupComponentId;

    fn record_id(&self) -> GroupComponentId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "apartmentGroupId" => id_value(self.apartment_group_id.get()),
            "componentId" => id_value(self.component_id.get()),
            "amount" => FieldValue::Number(self.amount),
            "isActive" => FieldValue::Bool(self.is_active),
            _ => FieldValue::Null,
        }
    }
}

impl Entity for GroupComponent {
    const FIELDS: &'static [&'static str] =
        &["id", "apartmentGroupId", "componentId", "amount", "isActive"];

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match name {
            "apartmentGroupId" => self.apartment_group_id = value.into_id(name)?,
            "componentId" => self.component_id = value.into_id(name)?,
            "amount" => self.amount = value.into_number(name)?.unwrap_or_default(),
            "isActive" => self.is_active = value.into_bool(name)?,
            "id" => bail!("group component id is assigned by the server"),
            _ => return Err(unknown_field("group component", name)),
        }
        Ok(())
    }

    fn is_new(&self) -> bool {
        self.id.is_unsaved()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterReading {
    pub id: MeterReadingId,
    pub society_id: SocietyId,
    pub apartment_id: ApartmentId,
    pub flat_id: FlatId,
    #[serde(with = "iso_date::option")]
    pub reading_date: Option<Date>,
    pub previous_reading: Option<f64>,
    pub current_reading: Option<f64>,
    pub billing_month: String,
    #[serde(with = "iso_date::option")]
    pub bill_from_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub bill_to_date: Option<Date>,
}

impl Default for MeterReading {
    fn default() -> Self {
        Self {
            id: MeterReadingId::default(),
            society_id: SocietyId::default(),
            apartment_id: ApartmentId::default(),
            flat_id: FlatId::default(),
            reading_date: None,
            previous_reading: None,
            current_reading: None,
            billing_month: BillingPeriod::empty().label,
            bill_from_date: None,
            bill_to_date: None,
        }
    }
}

impl MeterReading {
    pub fn consumed_units(&self) -> Option<f64> {
        match (self.previous_reading, self.current_reading) {
            (Some(previous), Some(current)) => Some(current - previous),
            _ => None,
        }
    }

    pub fn billing_period(&self) -> BillingPeriod {
        self.reading_date
            .map_or_else(BillingPeriod::empty, billing_period)
    }

    fn apply_billing_period(&mut self) {
        let period = self.billing_period();
        self.bill_from_date = period.from_date;
        self.bill_to_date = period.to_date;
        self.billing_month = period.label;
    }
}

impl Record for MeterReading {
    type Id = MeterReadingId;

    fn record_id(&self) -> MeterReadingId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "societyId" => id_value(self.society_id.get()),
            "apartmentId" => id_value(self.apartment_id.get()),
            "flatId" => id_value(self.flat_id.get()),
            "readingDate" => self.reading_date.into(),
            "previousReading" => self.previous_reading.into(),
            "currentReading" => self.current_reading.into(),
            "consumedUnits" => self.consumed_units().into(),
            "billingMonth" => FieldValue::text(&self.billing_month),
            "billFromDate" => self.bill_from_date.into(),
            "billToDate" => self.bill_to_date.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Entity for MeterReading {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "societyId",
        "apartmentId",
        "flatId",
        "readingDate",
        "previousReading",
        "currentReading",
        "billingMonth",
        "billFromDate",
        "billToDate",
    ];

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match name {
            "societyId" => self.society_id = value.into_id(name)?,
            "apartmentId" => self.apartment_id = value.into_id(name)?,
            "flatId" => self.flat_id = value.into_id(name)?,
            "readingDate" => self.reading_date = value.into_billing_date(name)?,
            "previousReading" => self.previous_reading = value.into_number(name)?,
            "currentReading" => self.current_reading = value.into_number(name)?,
            "billingMonth" | "billFromDate" | "billToDate" => {
                bail!("`{name}` is derived from readingDate and cannot be set directly")
            }
            "id" => bail!("meter reading id is assigned by the server"),
            _ => return Err(unknown_field("meter reading", name)),
        }
        Ok(())
    }

    fn field_changed(&mut self, name: &str) {
        if name == "readingDate" {
            self.apply_billing_period();
        }
    }

    fn is_new(&self) -> bool {
        self.id.is_unsaved()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitCharge {
    pub id: UnitChargeId,
    pub society_id: SocietyId,
    pub component_id: ComponentId,
    pub rate_per_unit: Option<f64>,
    #[serde(with = "iso_date::option")]
    pub effective_date: Option<Date>,
    pub billing_month: String,
    #[serde(with = "iso_date::option")]
    pub applicable_from_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub applicable_to_date: Option<Date>,
    pub is_active: bool,
}

impl Default for UnitCharge {
    fn default() -> Self {
        Self {
            id: UnitChargeId::default(),
            society_id: SocietyId::default(),
            component_id: ComponentId::default(),
            rate_per_unit: None,
            effective_date: None,
            billing_month: BillingPeriod::empty().label,
            applicable_from_date: None,
            applicable_to_date: None,
            is_active: true,
        }
    }
}

impl UnitCharge {
    pub fn applicability(&self) -> BillingPeriod {
        self.effective_date
            .map_or_else(BillingPeriod::empty, billing_period)
    }
}

impl Record for UnitCharge {
    type Id = UnitChargeId;

    fn record_id(&self) -> UnitChargeId {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => id_value(self.id.get()),
            "societyId" => id_value(self.society_id.get()),
            "componentId" => id_value(self.component_id.get()),
            "ratePerUnit" => self.rate_per_unit.into(),
            "effectiveDate" => self.effective_date.into(),
            "billingMonth" => FieldValue::text(&self.billing_month),
            "applicableFromDate" => self.applicable_from_date.into(),
            "applicableToDate" => self.applicable_to_date.into(),
            "isActive" => FieldValue::Bool(self.is_active),
            _ => FieldValue::Null,
        }
    }
}

impl Entity for UnitCharge {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "societyId",
        "componentId",
        "ratePerUnit",
        "effectiveDate",
        "billingMonth",
        "applicableFromDate",
        "applicableToDate",
        "isActive",
    ];

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        match name {
            "societyId" => self.society_id = value.into_id(name)?,
            "componentId" => self.component_id = value.into_id(name)?,
            "ratePerUnit" => self.rate_per_unit = value.into_number(name)?,
            "effectiveDate" => self.effective_date = value.into_billing_date(name)?,
            "isActive" => self.is_active = value.into_bool(name)?,
            "billingMonth" | "applicableFromDate" | "applicableToDate" => {
                bail!("`{name}` is derived from effectiveDate and cannot be set directly")
            }
            "id" => bail!("unit charge id is assigned by the server"),
            _ => return Err(unknown_field("unit charge", name)),
        }
        Ok(())
    }

    fn field_changed(&mut self, name: &str) {
        if name == "effectiveDate" {
            let period = self.applicability();
            self.applicable_from_date = period.from_date;
            self.applicable_to_date = period.to_date;
            self.billing_month = period.label;
        }
    }

    fn is_new(&self) -> bool {
        self.id.is_unsaved()
    }
}

#[cfg(test)]
mod tests {
    use super::{Flat, MeterReading, UnitCharge};
    use crate::field::{Entity, FieldValue, Record};
    use anyhow::Result;
    use time::{Date, Month};

    #[test]
    fn meter_reading_round_trips_camel_case_wire_shape() -> Result<()> {
        let raw = r#"{
            "id": 4,
            "societyId": 1,
            "apartmentId": 10,
            "flatId": 100,
            "readingDate": "2024-06-05",
            "previousReading": 120.5,
            "currentReading": 180.0,
            "billingMonth": "May-2024",
            "billFromDate": "2024-05-01",
            "billToDate": null
        }"#;
        let reading: MeterReading = serde_json::from_str(raw)?;
        assert_eq!(
            reading.reading_date,
            Some(Date::from_calendar_date(2024, Month::June, 5)?)
        );
        assert_eq!(reading.bill_to_date, None);
        assert_eq!(reading.consumed_units(), Some(59.5));

        let encoded = serde_json::to_value(&reading)?;
        assert_eq!(encoded["readingDate"], "2024-06-05");
        assert_eq!(encoded["flatId"], 100);
        Ok(())
    }

    #[test]
    fn missing_wire_fields_take_defaults() -> Result<()> {
        let flat: Flat = serde_json::from_str(r#"{"id": 3, "flatNo": "B-204"}"#)?;
        assert!(flat.is_active);
        assert!(flat.owner.is_none());
        assert!(flat.field("apartmentId").is_null());
        Ok(())
    }

    #[test]
    fn setting_reading_date_derives_billing_fields() -> Result<()> {
        let mut reading = MeterReading::default();
        reading.set_field("readingDate", FieldValue::text("2024-01-03"))?;
        reading.field_changed("readingDate");
        assert_eq!(reading.billing_month, "December-2023");
        assert_eq!(
            reading.bill_to_date,
            Some(Date::from_calendar_date(2023, Month::December, 31)?)
        );

        reading.set_field("readingDate", FieldValue::Null)?;
        reading.field_changed("readingDate");
        assert_eq!(reading.billing_month, "-");
        assert_eq!(reading.bill_from_date, None);
        Ok(())
    }

    #[test]
    fn derived_and_unknown_fields_reject_writes() {
        let mut charge = UnitCharge::default();
        assert!(charge.set_field("billingMonth", FieldValue::text("x")).is_err());
        assert!(charge.set_field("colour", FieldValue::text("x")).is_err());
        assert!(charge.set_field("id", FieldValue::Int(3)).is_err());
    }

    #[test]
    fn unit_charge_applicability_follows_effective_date() -> Result<()> {
        let mut charge = UnitCharge::default();
        charge.set_field("effectiveDate", FieldValue::text("2024-06-08"))?;
        charge.field_changed("effectiveDate");
        assert_eq!(charge.billing_month, "June-2024");
        assert_eq!(
            charge.applicable_from_date,
            Some(Date::from_calendar_date(2024, Month::June, 1)?)
        );
        Ok(())
    }
}
