// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Save-time rules per entity, passed to `EditSession::submit` as the
//! validator.

use anyhow::{Result, bail};

use crate::{Flat, GroupComponent, MeterReading, UnitCharge};

impl Flat {
    pub fn validate(&self) -> Result<()> {
        if self.society_id.is_unsaved() {
            bail!("society is required -- choose a society and retry");
        }
        if self.apartment_id.is_unsaved() {
            bail!("apartment is required -- choose an apartment and retry");
        }
        if self.flat_no.trim().is_empty() {
            bail!("flat number is required -- enter a flat number and retry");
        }
        if let Some(area) = self.area_sq_ft
            && area < 0.0
        {
            bail!("flat area cannot be negative");
        }
        Ok(())
    }
}

impl MeterReading {
    pub fn validate(&self) -> Result<()> {
        if self.society_id.is_unsaved() {
            bail!("society is required -- choose a society and retry");
        }
        if self.apartment_id.is_unsaved() {
            bail!("apartment is required -- choose an apartment and retry");
        }
        if self.flat_id.is_unsaved() {
            bail!("flat is required -- choose a flat and retry");
        }
        if self.reading_date.is_none() {
            bail!("reading date is required -- enter a YYYY-MM-DD date and retry");
        }
        let Some(current) = self.current_reading else {
            bail!("current reading is required -- enter the meter value and retry");
        };
        if current < 0.0 {
            bail!("current reading cannot be negative");
        }
        if let Some(previous) = self.previous_reading {
            if previous < 0.0 {
                bail!("previous reading cannot be negative");
            }
            if current < previous {
                bail!("current reading {current} is lower than previous reading {previous}");
            }
        }
        Ok(())
    }
}

impl UnitCharge {
    pub fn validate(&self) -> Result<()> {
        if self.society_id.is_unsaved() {
            bail!("society is required -- choose a society and retry");
        }
        if self.component_id.is_unsaved() {
            bail!("component is required -- choose a component and retry");
        }
        match self.rate_per_unit {
            None => bail!("rate per unit is required -- enter a rate and retry"),
            Some(rate) if rate <= 0.0 => bail!("rate per unit must be positive, got {rate}"),
            Some(_) => {}
        }
        if self.effective_date.is_none() {
            bail!("effective date is required -- enter a YYYY-MM-DD date and retry");
        }
        Ok(())
    }
}

impl GroupComponent {
    pub fn validate(&self) -> Result<()> {
        if self.apartment_group_id.is_unsaved() {
            bail!("apartment group is required -- choose a group and retry");
        }
        if self.component_id.is_unsaved() {
            bail!("component is required -- choose a component and retry");
        }
        if self.amount < 0.0 {
            bail!("component amount cannot be negative");
        }
        Ok(())
    }
}
