//! Days-left refill staging.
//!
//! A medication with `days_left` supply falls into the first stage whose
//! upper bound it does not exceed: d1, then d3, then d7. Anything above the
//! d7 bound needs no prompt yet.

use serde::{Deserialize, Serialize};

use crate::error::CareError;
use crate::models::enums::RefillStage;
use crate::models::RefillForecast;

/// Inclusive upper bounds (in days) for each refill stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillBounds {
    pub d1_max: i64,
    pub d3_max: i64,
    pub d7_max: i64,
}

impl Default for RefillBounds {
    fn default() -> Self {
        Self {
            d1_max: 1,
            d3_max: 3,
            d7_max: 7,
        }
    }
}

impl RefillBounds {
    /// Bounds must start at zero or above and be strictly ascending.
    pub fn validate(&self) -> Result<(), CareError> {
        if self.d1_max < 0 {
            return Err(CareError::invalid("refill_bounds.d1_max", self.d1_max));
        }
        if self.d3_max <= self.d1_max {
            return Err(CareError::invalid("refill_bounds.d3_max", self.d3_max));
        }
        if self.d7_max <= self.d3_max {
            return Err(CareError::invalid("refill_bounds.d7_max", self.d7_max));
        }
        Ok(())
    }
}

pub struct RefillForecaster {
    bounds: RefillBounds,
}

impl Default for RefillForecaster {
    fn default() -> Self {
        Self {
            bounds: RefillBounds::default(),
        }
    }
}

impl RefillForecaster {
    pub fn new(bounds: RefillBounds) -> Result<Self, CareError> {
        bounds.validate()?;
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &RefillBounds {
        &self.bounds
    }

    /// Negative supply is treated as none left.
    pub fn stage_for_days_left(&self, days_left: i64) -> Option<RefillStage> {
        let days_left = days_left.max(0);
        if days_left <= self.bounds.d1_max {
            Some(RefillStage::D1)
        } else if days_left <= self.bounds.d3_max {
            Some(RefillStage::D3)
        } else if days_left <= self.bounds.d7_max {
            Some(RefillStage::D7)
        } else {
            None
        }
    }

    pub fn forecast(
        &self,
        patient_id: &str,
        medication: &str,
        days_left: i64,
    ) -> Option<RefillForecast> {
        let stage = self.stage_for_days_left(days_left)?;
        Some(RefillForecast {
            patient_id: patient_id.to_string(),
            medication: medication.to_string(),
            days_left: days_left.max(0),
            stage,
        })
    }
}
