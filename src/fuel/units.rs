use serde::{Deserialize, Serialize};
use uom::si::{
    f64::Volume,
    volume::{gallon, liter},
};

/// Unit fuel quantities are displayed and configured in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelUnits {
    #[default]
    Liters,
    Gallons,
}

pub fn liters_to_gallons(liters: f32) -> f32 {
    Volume::new::<liter>(liters as f64).get::<gallon>() as f32
}

pub fn gallons_to_liters(gallons: f32) -> f32 {
    Volume::new::<gallon>(gallons as f64).get::<liter>() as f32
}

impl FuelUnits {
    /// Convert an amount expressed in these units into liters.
    pub fn to_liters(&self, amount: f32) -> f32 {
        match self {
            Self::Liters => amount,
            Self::Gallons => gallons_to_liters(amount),
        }
    }

    /// Convert liters into these units.
    pub fn from_liters(&self, liters: f32) -> f32 {
        match self {
            Self::Liters => liters,
            Self::Gallons => liters_to_gallons(liters),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Liters => "L",
            Self::Gallons => "gal",
        }
    }
}

/// Format a liter amount for display, `--` when it is not a usable number.
pub fn format_fuel(liters: Option<f32>, units: FuelUnits, decimals: usize) -> String {
    match liters {
        Some(value) if value.is_finite() => {
            format!("{:.*} {}", decimals, units.from_liters(value), units.suffix())
        }
        _ => "--".to_string(),
    }
}
