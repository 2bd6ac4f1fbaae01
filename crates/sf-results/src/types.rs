//! Result data types and the output field catalog.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sf_engine::PixelSnapshot;

pub type RunId = String;

/// Metadata written once per grid run. Carries the catalog of published
/// output variables so a consumer can read `manifest.json` alone and know
/// what the timeseries columns mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub created: DateTime<Utc>,
    /// Data timestep in minutes.
    pub data_tstep_min: u32,
    pub output_mode: String,
    /// Emissions per `output_frequency` data steps.
    pub output_frequency: usize,
    /// Number of simulation units (1 for a point run).
    pub units: usize,
    pub temps_in_c: bool,
    /// Energy-balance variables in each snapshot's `em` group.
    #[serde(default = "em_field_table")]
    pub em_fields: Vec<FieldDef>,
    /// Snow-property variables in each snapshot's `snow` group.
    #[serde(default = "snow_field_table")]
    pub snow_fields: Vec<FieldDef>,
}

impl RunManifest {
    /// The standard field tables for the current output schema.
    pub fn standard_fields() -> (Vec<FieldDef>, Vec<FieldDef>) {
        (em_field_table(), snow_field_table())
    }
}

fn em_field_table() -> Vec<FieldDef> {
    EM_FIELDS.to_vec()
}

fn snow_field_table() -> Vec<FieldDef> {
    SNOW_FIELDS.to_vec()
}

/// One emission: a timestamp and the snapshot of every unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesRecord {
    pub timestamp: DateTime<Utc>,
    pub snapshots: Vec<PixelSnapshot>,
}

/// A published output variable: stable name, units, and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: Cow<'static, str>,
    pub units: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

const fn field(
    name: &'static str,
    units: &'static str,
    description: &'static str,
) -> FieldDef {
    FieldDef {
        name: Cow::Borrowed(name),
        units: Cow::Borrowed(units),
        description: Cow::Borrowed(description),
    }
}

/// Energy-balance output variables.
pub const EM_FIELDS: &[FieldDef] = &[
    field("net_rad", "W m-2", "average net all-wave radiation"),
    field("sensible_heat", "W m-2", "average sensible heat transfer"),
    field("latent_heat", "W m-2", "average latent heat exchange"),
    field("snow_soil", "W m-2", "average snow/soil heat exchange"),
    field(
        "precip_advected",
        "W m-2",
        "average advected heat from precipitation",
    ),
    field("sum_EB", "W m-2", "average sum of energy balance terms"),
    field("evaporation", "kg m-2", "total evaporation"),
    field("snowmelt", "kg m-2", "total snowmelt"),
    field(
        "SWI",
        "kg m-2",
        "predicted snow-water input, melt plus rain-through",
    ),
    field("cold_content", "J m-2", "snowcover cold content"),
];

/// Snow-property output variables.
pub const SNOW_FIELDS: &[FieldDef] = &[
    field("thickness", "m", "snowcover thickness"),
    field("snow_density", "kg m-3", "average snowcover density"),
    field("specific_mass", "kg m-2", "specific mass of the snowcover"),
    field("liquid_water", "kg m-2", "liquid water held in the snowcover"),
    field("temp_surf", "C", "surface layer temperature"),
    field("temp_lower", "C", "lower layer temperature"),
    field("temp_snowcover", "C", "average snowcover temperature"),
    field("thickness_lower", "m", "lower layer thickness"),
    field("water_saturation", "percent", "percent of liquid water saturation"),
];
