//! Usage report over active reservations

use chrono::NaiveDate;
use serde::Serialize;
use slotbook_api::{Reservation, Resource, Shift};
use slotbook_config::Catalog;

/// Counts shown on the client's statistics view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub total_active: usize,
    /// Active reservations dated today
    pub today: usize,
    /// Daily capacity of both shifts minus active reservations
    pub free_slots: usize,
    /// Every catalog resource, including those with no reservations
    pub per_resource: Vec<(Resource, usize)>,
    pub per_shift: Vec<(Shift, usize)>,
}

pub fn build_report(catalog: &Catalog, active: &[Reservation], today: NaiveDate) -> UsageReport {
    let per_resource = catalog
        .all_resources()
        .into_iter()
        .map(|resource| {
            let count = active.iter().filter(|r| r.resource == resource).count();
            (resource, count)
        })
        .collect();

    let per_shift = Shift::ALL
        .iter()
        .map(|&shift| (shift, active.iter().filter(|r| r.shift == shift).count()))
        .collect();

    UsageReport {
        total_active: active.len(),
        today: active.iter().filter(|r| r.date == today).count(),
        free_slots: catalog.daily_capacity().saturating_sub(active.len()),
        per_resource,
        per_shift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{day, reservation, shift_reservation};

    #[test]
    fn counts_over_the_unified_catalog() {
        let catalog = Catalog::builtin();
        let today = day(0);
        let active = vec![
            reservation(today, "1era", "Cañón"),
            reservation(today, "2da", "Cañón"),
            shift_reservation(day(1), Shift::Evening, "0", "Salón 10"),
        ];

        let report = build_report(&catalog, &active, today);
        assert_eq!(report.total_active, 3);
        assert_eq!(report.today, 2);
        assert_eq!(report.free_slots, 8 * 6 + 8 * 8 - 3);

        assert_eq!(report.per_resource.len(), 8);
        assert_eq!(report.per_resource[0], (Resource::from("Cañón"), 2));
        assert!(report.per_resource.contains(&(Resource::from("Salón 10"), 1)));
        assert!(report.per_resource.contains(&(Resource::from("TV Planta Baja"), 0)));

        assert_eq!(report.per_shift, vec![(Shift::Morning, 2), (Shift::Evening, 1)]);
    }

    #[test]
    fn empty_cache_is_all_free() {
        let catalog = Catalog::builtin();
        let report = build_report(&catalog, &[], day(0));
        assert_eq!(report.total_active, 0);
        assert_eq!(report.free_slots, catalog.daily_capacity());
        assert!(report.per_resource.iter().all(|(_, n)| *n == 0));
    }
}
