//! Optional vehicle context for a pending request.

use chrono::Datelike;
use thiserror::Error;

use super::model::{ManualVehicle, SavedVehicle, VehicleAssociation};

/// Rejected vehicle edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VehicleError {
    #[error("vehicle {0} is not in your garage")]
    UnknownVehicle(String),
    #[error("year must be between 1900 and {max}, got {got}")]
    InvalidYear { got: u16, max: u16 },
}

/// Holds the saved-vehicle pick and the manual fields side by side.
/// A saved pick wins over manual fields when both are present.
#[derive(Clone, Debug, Default)]
pub struct VehicleLinker {
    saved: Option<Vec<SavedVehicle>>,
    selected_id: Option<String>,
    manual: ManualVehicle,
}

impl VehicleLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vehicles loaded from the store, if any load has finished.
    pub fn saved(&self) -> Option<&[SavedVehicle]> {
        self.saved.as_deref()
    }

    pub fn set_saved(&mut self, vehicles: Vec<SavedVehicle>) {
        // A pick that vanished from the garage is dropped.
        if let Some(id) = &self.selected_id
            && !vehicles.iter().any(|v| &v.id == id)
        {
            self.selected_id = None;
        }
        self.saved = Some(vehicles);
    }

    pub fn select_saved(&mut self, vehicle_id: &str) -> Result<(), VehicleError> {
        if let Some(list) = &self.saved
            && !list.iter().any(|v| v.id == vehicle_id)
        {
            return Err(VehicleError::UnknownVehicle(vehicle_id.to_string()));
        }
        self.selected_id = Some(vehicle_id.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<&SavedVehicle> {
        let id = self.selected_id.as_ref()?;
        self.saved.as_ref()?.iter().find(|v| &v.id == id)
    }

    /// Merge the given fields; `None` leaves the current value alone.
    pub fn set_manual(&mut self, fields: ManualVehicle) -> Result<(), VehicleError> {
        if let Some(year) = fields.year {
            let max = (chrono::Local::now().year() + 1) as u16;
            if !(1900..=max).contains(&year) {
                return Err(VehicleError::InvalidYear { got: year, max });
            }
            self.manual.year = Some(year);
        }
        if let Some(make) = fields.make {
            self.manual.make = non_blank(make);
        }
        if let Some(model) = fields.model {
            self.manual.model = non_blank(model);
        }
        if let Some(km) = fields.mileage_km {
            self.manual.mileage_km = Some(km);
        }
        Ok(())
    }

    pub fn manual(&self) -> &ManualVehicle {
        &self.manual
    }

    /// The authoritative association, or `None` when skipped.
    pub fn association(&self) -> Option<VehicleAssociation> {
        if let Some(id) = &self.selected_id {
            return Some(VehicleAssociation::Saved {
                vehicle_id: id.clone(),
            });
        }
        (!self.manual.is_empty()).then(|| VehicleAssociation::Manual(self.manual.clone()))
    }

    /// Skip the step: forget the pick and the manual fields, keep the loaded list.
    pub fn clear(&mut self) {
        self.selected_id = None;
        self.manual = ManualVehicle::default();
    }
}

fn non_blank(s: String) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn garage() -> Vec<SavedVehicle> {
        vec![SavedVehicle {
            id: "v-1".into(),
            year: Some(2017),
            make: "Toyota".into(),
            model: "Corolla".into(),
            mileage_km: Some(88_000),
        }]
    }

    #[test]
    fn test_skipped_step_has_no_vehicle() {
        assert_eq!(VehicleLinker::new().association(), None);
    }

    #[test]
    fn test_saved_pick_takes_precedence_over_manual() {
        let mut linker = VehicleLinker::new();
        linker.set_saved(garage());
        linker
            .set_manual(ManualVehicle {
                make: Some("Ford".into()),
                ..Default::default()
            })
            .unwrap();
        linker.select_saved("v-1").unwrap();
        assert_eq!(
            linker.association(),
            Some(VehicleAssociation::Saved {
                vehicle_id: "v-1".into()
            })
        );
        assert_eq!(linker.selected().map(|v| v.label()), Some("2017 Toyota Corolla".into()));
    }

    #[test]
    fn test_manual_fields_merge_independently() {
        let mut linker = VehicleLinker::new();
        linker
            .set_manual(ManualVehicle {
                year: Some(2012),
                ..Default::default()
            })
            .unwrap();
        linker
            .set_manual(ManualVehicle {
                model: Some(" Civic ".into()),
                mileage_km: Some(150_000),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            linker.association(),
            Some(VehicleAssociation::Manual(ManualVehicle {
                year: Some(2012),
                make: None,
                model: Some("Civic".into()),
                mileage_km: Some(150_000),
            }))
        );
    }

    #[test]
    fn test_unknown_saved_vehicle_rejected() {
        let mut linker = VehicleLinker::new();
        linker.set_saved(garage());
        assert_eq!(
            linker.select_saved("nope"),
            Err(VehicleError::UnknownVehicle("nope".into()))
        );
        assert_eq!(linker.association(), None);
    }

    #[test]
    fn test_out_of_range_year_rejected() {
        let mut linker = VehicleLinker::new();
        let err = linker
            .set_manual(ManualVehicle {
                year: Some(1850),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, VehicleError::InvalidYear { got: 1850, .. }));
        assert!(linker.manual().is_empty());
    }

    #[test]
    fn test_clear_keeps_loaded_garage() {
        let mut linker = VehicleLinker::new();
        linker.set_saved(garage());
        linker.select_saved("v-1").unwrap();
        linker.clear();
        assert_eq!(linker.association(), None);
        assert_eq!(linker.saved().map(|s| s.len()), Some(1));
    }
}
