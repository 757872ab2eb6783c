//! Availability engine
//!
//! Pure query over the occupied-slot set: a resource is occupied for a
//! proposed range as soon as any hour of the range is taken.

use chrono::NaiveDate;
use serde::Serialize;
use slotbook_api::{HourLabel, Resource, Shift, SlotKey};
use slotbook_config::Catalog;
use slotbook_util::Result;
use std::collections::HashSet;

/// Occupancy of one resource over the proposed range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAvailability {
    pub resource: Resource,
    pub occupied: bool,
}

/// Result of an availability query, resources in catalog order
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityReport {
    pub date: NaiveDate,
    pub shift: Shift,
    pub hours: Vec<HourLabel>,
    pub resources: Vec<ResourceAvailability>,
}

impl AvailabilityReport {
    /// `None` if the resource is not in this shift's catalog
    pub fn is_occupied(&self, resource: &Resource) -> Option<bool> {
        self.resources
            .iter()
            .find(|r| &r.resource == resource)
            .map(|r| r.occupied)
    }

    pub fn available(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(|r| !r.occupied)
            .map(|r| &r.resource)
    }
}

/// Whether any hour of the range is held on `resource`
pub fn range_occupied(
    occupied: &HashSet<SlotKey>,
    date: NaiveDate,
    shift: Shift,
    hours: &[HourLabel],
    resource: &Resource,
) -> bool {
    hours.iter().any(|hour| {
        occupied.contains(&SlotKey::new(date, shift, hour.clone(), resource.clone()))
    })
}

/// Occupancy of every resource of `shift` for `duration` hours from `start`
pub fn check_availability(
    catalog: &Catalog,
    occupied: &HashSet<SlotKey>,
    date: NaiveDate,
    shift: Shift,
    start: &HourLabel,
    duration: usize,
) -> Result<AvailabilityReport> {
    let hours = catalog.expand_range(shift, start, duration)?;

    let resources = catalog
        .resource_catalog(shift)
        .iter()
        .map(|resource| ResourceAvailability {
            resource: resource.clone(),
            occupied: range_occupied(occupied, date, shift, &hours, resource),
        })
        .collect();

    Ok(AvailabilityReport {
        date,
        shift,
        hours,
        resources,
    })
}
