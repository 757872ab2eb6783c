//! Static slot catalog
//!
//! Resources and hour sequences are configuration, not runtime data. Slots
//! are never enumerated upfront; they are derived from catalog x hours x date.

use slotbook_api::{HourLabel, Resource, Shift};
use slotbook_util::SlotbookError;

/// Hour sequence and resources of one shift
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftCatalog {
    pub hours: Vec<HourLabel>,
    pub resources: Vec<Resource>,
}

impl ShiftCatalog {
    pub fn new<H, R>(hours: impl IntoIterator<Item = H>, resources: impl IntoIterator<Item = R>) -> Self
    where
        H: Into<HourLabel>,
        R: Into<Resource>,
    {
        Self {
            hours: hours.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }
}

/// Catalog for both shifts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    morning: ShiftCatalog,
    evening: ShiftCatalog,
}

const BUILTIN_RESOURCES: [&str; 6] = [
    "Cañón",
    "TV Planta Baja",
    "TV Planta Alta",
    "TV 43\"",
    "Caja TV 50\"",
    "Caja TV 43",
];

const BUILTIN_EVENING_EXTRAS: [&str; 2] = ["Sala de Informática", "Salón 10"];

const BUILTIN_MORNING_HOURS: [&str; 8] =
    ["1era", "2da", "3era", "4ta", "5ta", "6ta", "7ma", "8va"];

const BUILTIN_EVENING_HOURS: [&str; 8] =
    ["0", "1era", "2da", "3era", "4ta", "5ta", "6ta", "7ma"];

impl Catalog {
    pub fn new(morning: ShiftCatalog, evening: ShiftCatalog) -> Self {
        Self { morning, evening }
    }

    /// The catalog the school runs with: the evening shift adds two rooms
    pub fn builtin() -> Self {
        let evening_resources = BUILTIN_RESOURCES
            .iter()
            .chain(BUILTIN_EVENING_EXTRAS.iter())
            .copied();

        Self {
            morning: ShiftCatalog::new(BUILTIN_MORNING_HOURS, BUILTIN_RESOURCES),
            evening: ShiftCatalog::new(BUILTIN_EVENING_HOURS, evening_resources),
        }
    }

    pub fn shift(&self, shift: Shift) -> &ShiftCatalog {
        match shift {
            Shift::Morning => &self.morning,
            Shift::Evening => &self.evening,
        }
    }

    /// Ordered hour labels of a shift
    pub fn hour_sequence(&self, shift: Shift) -> &[HourLabel] {
        &self.shift(shift).hours
    }

    /// Hour labels for a shift given by name; empty for an unrecognized shift
    pub fn hour_sequence_named(&self, shift: &str) -> &[HourLabel] {
        match shift.parse::<Shift>() {
            Ok(shift) => self.hour_sequence(shift),
            Err(_) => &[],
        }
    }

    pub fn resource_catalog(&self, shift: Shift) -> &[Resource] {
        &self.shift(shift).resources
    }

    /// Resources of both shifts, duplicates collapsed, in first-seen order
    pub fn all_resources(&self) -> Vec<Resource> {
        let mut all: Vec<Resource> = Vec::new();
        for resource in self.morning.resources.iter().chain(&self.evening.resources) {
            if !all.contains(resource) {
                all.push(resource.clone());
            }
        }
        all
    }

    pub fn has_resource(&self, shift: Shift, resource: &Resource) -> bool {
        self.resource_catalog(shift).contains(resource)
    }

    /// Number of bookable (resource, hour) pairs per day over both shifts
    pub fn daily_capacity(&self) -> usize {
        Shift::ALL
            .iter()
            .map(|&s| self.hour_sequence(s).len() * self.resource_catalog(s).len())
            .sum()
    }

    /// The `duration` consecutive hours of `shift` starting at `start`.
    pub fn expand_range(
        &self,
        shift: Shift,
        start: &HourLabel,
        duration: usize,
    ) -> Result<Vec<HourLabel>, SlotbookError> {
        if duration == 0 {
            return Err(SlotbookError::validation("duration must be at least one hour"));
        }

        let hours = self.hour_sequence(shift);
        let index = hours
            .iter()
            .position(|h| h == start)
            .ok_or_else(|| SlotbookError::InvalidHour {
                hour: start.to_string(),
                shift: shift.to_string(),
            })?;

        if index + duration > hours.len() {
            return Err(SlotbookError::InsufficientCapacity {
                hour: start.to_string(),
                shift: shift.to_string(),
                duration,
            });
        }

        Ok(hours[index..index + duration].to_vec())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(hours: &[HourLabel]) -> Vec<&str> {
        hours.iter().map(HourLabel::as_str).collect()
    }

    #[test]
    fn builtin_catalog_shape() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.hour_sequence(Shift::Morning).len(), 8);
        assert_eq!(catalog.hour_sequence(Shift::Evening)[0].as_str(), "0");
        assert_eq!(
            catalog.resource_catalog(Shift::Evening).len(),
            catalog.resource_catalog(Shift::Morning).len() + 2
        );
        assert_eq!(catalog.all_resources().len(), 8);
        assert_eq!(catalog.daily_capacity(), 6 * 8 + 8 * 8);
    }

    #[test]
    fn unknown_shift_name_has_no_hours() {
        let catalog = Catalog::builtin();
        assert!(catalog.hour_sequence_named("nocturno").is_empty());
        assert_eq!(catalog.hour_sequence_named("matutino").len(), 8);
    }

    #[test]
    fn expand_range_every_valid_start() {
        let catalog = Catalog::builtin();
        for shift in Shift::ALL {
            let hours = catalog.hour_sequence(shift).to_vec();
            for (index, start) in hours.iter().enumerate() {
                for duration in 1..=hours.len() {
                    let result = catalog.expand_range(shift, start, duration);
                    if index + duration <= hours.len() {
                        let range = result.unwrap();
                        assert_eq!(range.len(), duration);
                        assert_eq!(range[..], hours[index..index + duration]);
                    } else {
                        assert!(matches!(
                            result,
                            Err(SlotbookError::InsufficientCapacity { .. })
                        ));
                    }
                }
            }
        }
    }

    #[test]
    fn expand_range_is_shift_scoped() {
        let catalog = Catalog::builtin();
        let morning = catalog
            .expand_range(Shift::Morning, &"7ma".into(), 2)
            .unwrap();
        assert_eq!(labels(&morning), ["7ma", "8va"]);

        // The evening shift ends at 7ma
        assert!(matches!(
            catalog.expand_range(Shift::Evening, &"7ma".into(), 2),
            Err(SlotbookError::InsufficientCapacity { .. })
        ));
    }

    #[test]
    fn expand_range_rejects_unknown_hour() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.expand_range(Shift::Morning, &"0".into(), 1),
            Err(SlotbookError::InvalidHour { .. })
        ));
    }

    #[test]
    fn expand_range_rejects_zero_duration() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.expand_range(Shift::Morning, &"1era".into(), 0),
            Err(SlotbookError::Validation(_))
        ));
    }
}
