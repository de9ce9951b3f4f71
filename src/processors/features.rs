//! Per-cycle feature aggregation.
//!
//! Reduces a renumbered cycler log to one summary row per cycle: capacity,
//! energy, voltage, current and temperature extremes plus charge/discharge
//! timing. Cycles with too few samples are treated as incomplete and
//! skipped.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::FeatureConfig;
use crate::core::loaders::{CycleTable, LoaderError};

pub const VOLTAGE_COLUMN: &str = "Ecell_V";
pub const CURRENT_COLUMN: &str = "I_mA";
pub const CHARGE_COLUMN: &str = "QCharge_mA_h";
pub const TEMPERATURE_COLUMN: &str = "Temperature__C";
pub const CHARGE_ENERGY_COLUMN: &str = "EnergyCharge_W_h";
pub const DISCHARGE_ENERGY_COLUMN: &str = "EnergyDischarge_W_h";

/// Discharge rows needed before a voltage drop rate is computed.
const MIN_DISCHARGE_ROWS_FOR_DROP_RATE: usize = 10;

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleFeatures {
    pub battery_id: String,
    pub cycle_number: i64,
    pub charge_capacity: f64,
    pub discharge_capacity: f64,
    pub charge_time: f64,
    pub discharge_time: f64,
    pub energy_efficiency: f64,
    pub max_voltage: f64,
    pub min_voltage: f64,
    pub avg_temperature: f64,
    pub max_temperature: f64,
    pub voltage_drop_rate: f64,
    pub charge_energy: f64,
    pub discharge_energy: f64,
    pub mean_voltage: f64,
    pub max_current: f64,
    pub min_current: f64,
    pub mean_current: f64,
}

/// The channels feature aggregation reads, parsed once per table.
struct Channels {
    voltage: Vec<f64>,
    current: Vec<f64>,
    charge: Vec<f64>,
    temperature: Vec<f64>,
    charge_energy: Vec<f64>,
    discharge_energy: Vec<f64>,
}

impl Channels {
    fn load(table: &CycleTable) -> Result<Self, LoaderError> {
        Ok(Self {
            voltage: table.channel(VOLTAGE_COLUMN)?,
            current: table.channel(CURRENT_COLUMN)?,
            charge: table.channel(CHARGE_COLUMN)?,
            temperature: table.channel(TEMPERATURE_COLUMN)?,
            charge_energy: table.channel(CHARGE_ENERGY_COLUMN)?,
            discharge_energy: table.channel(DISCHARGE_ENERGY_COLUMN)?,
        })
    }
}

// NaN-skipping reductions; NaN when nothing is left.

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| !v.is_nan()).fold(f64::NAN, f64::max)
}

fn min_of(values: impl Iterator<Item = f64>) -> f64 {
    values.filter(|v| !v.is_nan()).fold(f64::NAN, f64::min)
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn span_of(values: &[f64]) -> f64 {
    max_of(values.iter().copied()) - min_of(values.iter().copied())
}

/// Group row positions by cycle number, in order of first appearance.
fn group_rows(cycles: &[i64]) -> Vec<(i64, Vec<usize>)> {
    let mut slots: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<(i64, Vec<usize>)> = Vec::new();

    for (row, &cycle) in cycles.iter().enumerate() {
        let slot = *slots.entry(cycle).or_insert_with(|| {
            groups.push((cycle, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }

    groups
}

fn summarise(
    battery_id: &str,
    cycle: i64,
    rows: &[usize],
    table: &CycleTable,
    ch: &Channels,
) -> CycleFeatures {
    let pick = |column: &[f64]| rows.iter().map(|&r| column[r]).collect::<Vec<f64>>();

    let voltage = pick(&ch.voltage);
    let current = pick(&ch.current);
    let time = pick(&table.time_s);
    let temperature = pick(&ch.temperature);

    let charge_energy = max_of(pick(&ch.charge_energy).into_iter());
    let discharge_energy = max_of(pick(&ch.discharge_energy).into_iter());

    let charging: Vec<usize> = (0..rows.len()).filter(|&i| current[i] > 0.0).collect();
    let discharging: Vec<usize> = (0..rows.len()).filter(|&i| current[i] < 0.0).collect();

    let charge_time = if charging.is_empty() {
        0.0
    } else {
        span_of(&charging.iter().map(|&i| time[i]).collect::<Vec<_>>())
    };

    let discharge_times: Vec<f64> = discharging.iter().map(|&i| time[i]).collect();
    let discharge_time = if discharging.is_empty() {
        0.0
    } else {
        span_of(&discharge_times)
    };

    let energy_efficiency = if charge_energy > 0.0 {
        discharge_energy / charge_energy
    } else {
        0.0
    };

    let voltage_drop_rate = if discharging.len() > MIN_DISCHARGE_ROWS_FOR_DROP_RATE {
        let drop = span_of(&discharging.iter().map(|&i| voltage[i]).collect::<Vec<_>>());
        let duration = span_of(&discharge_times);
        if duration > 0.0 {
            drop / duration
        } else {
            0.0
        }
    } else {
        0.0
    };

    CycleFeatures {
        battery_id: battery_id.to_string(),
        cycle_number: cycle,
        charge_capacity: max_of(pick(&ch.charge).into_iter()),
        discharge_capacity: max_of(pick(&table.q_discharge).into_iter()),
        charge_time,
        discharge_time,
        energy_efficiency,
        max_voltage: max_of(voltage.iter().copied()),
        min_voltage: min_of(voltage.iter().copied()),
        avg_temperature: mean_of(temperature.iter().copied()),
        max_temperature: max_of(temperature.iter().copied()),
        voltage_drop_rate,
        charge_energy,
        discharge_energy,
        mean_voltage: mean_of(voltage.iter().copied()),
        max_current: max_of(current.iter().copied()),
        min_current: min_of(current.iter().copied()),
        mean_current: mean_of(current.iter().copied()),
    }
}

/// Aggregate a cycler log into one feature row per cycle.
///
/// # Arguments
///
/// * `table` - Cycler log, normally after cycle renumbering
/// * `battery_id` - Identifier copied into every row
/// * `config` - Minimum rows per cycle
///
/// # Errors
///
/// Returns `MissingColumns` if any of the voltage, current, charge,
/// temperature or energy channels is absent.
pub fn aggregate_cycles(
    table: &CycleTable,
    battery_id: &str,
    config: &FeatureConfig,
) -> Result<Vec<CycleFeatures>, LoaderError> {
    let channels = Channels::load(table)?;

    let groups = group_rows(&table.cycle_number);
    let total = groups.len();
    let features: Vec<CycleFeatures> = groups
        .into_iter()
        .filter(|(_, rows)| rows.len() >= config.min_rows_per_cycle)
        .map(|(cycle, rows)| summarise(battery_id, cycle, &rows, table, &channels))
        .collect();

    log::info!(
        "{}: {} of {} cycles aggregated",
        battery_id,
        features.len(),
        total
    );

    Ok(features)
}
