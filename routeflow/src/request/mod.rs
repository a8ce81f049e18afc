//! Delivery request model.
//!
//! A [`DeliveryRequest`] is what intake hands to the orchestrator. It is
//! immutable once submitted; the orchestrator only reads it to produce the
//! pipeline input files.

mod csv;

pub use csv::{
    load_request, read_input_csv, read_vehicle_count, render_input_csv, render_vehicle_count,
    write_input_csv, write_vehicle_count, InputSummary, DEPOT_ROW_TYPE, INPUT_HEADER,
    STOP_ROW_TYPE, VEHICLE_COUNT_KEY,
};

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street name.
    #[serde(default)]
    pub street: String,
    /// Building number.
    #[serde(default)]
    pub number: String,
    /// City.
    #[serde(default)]
    pub city: String,
    /// Postal code.
    #[serde(default)]
    pub postal_code: String,
}

impl Address {
    /// Creates an address.
    #[must_use]
    pub fn new(
        street: impl Into<String>,
        number: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            number: number.into(),
            city: city.into(),
            postal_code: postal_code.into(),
        }
    }

    fn has_city(&self) -> bool {
        !self.city.trim().is_empty()
    }

    fn has_postal_code(&self) -> bool {
        !self.postal_code.trim().is_empty()
    }
}

/// A single delivery stop with an optional time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStop {
    /// Stop address.
    #[serde(flatten)]
    pub address: Address,
    /// Start of the delivery window, free text, may be empty.
    #[serde(default)]
    pub window_start: String,
    /// End of the delivery window, free text, may be empty.
    #[serde(default)]
    pub window_end: String,
}

impl DeliveryStop {
    /// Creates a stop without a time window.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            window_start: String::new(),
            window_end: String::new(),
        }
    }

    /// Sets the time window.
    #[must_use]
    pub fn with_window(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.window_start = start.into();
        self.window_end = end.into();
        self
    }
}

/// A delivery-route planning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Depot address.
    pub depot: Address,
    /// Number of vehicles available.
    pub vehicle_count: u32,
    /// Stops, in submission order.
    #[serde(default)]
    pub stops: Vec<DeliveryStop>,
}

impl DeliveryRequest {
    /// Creates a request with no stops.
    #[must_use]
    pub fn new(depot: Address, vehicle_count: u32) -> Self {
        Self {
            depot,
            vehicle_count,
            stops: Vec::new(),
        }
    }

    /// Appends a stop.
    #[must_use]
    pub fn with_stop(mut self, stop: DeliveryStop) -> Self {
        self.stops.push(stop);
        self
    }

    /// Checks the invariants required before a workflow run starts.
    ///
    /// Every violation is reported, not only the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if !self.depot.has_city() {
            errors.push("Podaj miasto magazynu.".to_string());
        }
        if !self.depot.has_postal_code() {
            errors.push("Podaj kod pocztowy magazynu.".to_string());
        }
        if self.vehicle_count == 0 {
            errors.push("Liczba pojazdów musi być większa od zera.".to_string());
        }

        for (index, stop) in self.stops.iter().enumerate() {
            let n = index + 1;
            if !stop.address.has_city() {
                errors.push(format!("Podaj miasto punktu dostawy nr {n}."));
            }
            if !stop.address.has_postal_code() {
                errors.push(format!("Podaj kod pocztowy punktu dostawy nr {n}."));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(errors))
        }
    }
}
