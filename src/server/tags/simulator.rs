// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Random but plausible values for factory tags, picked by the name of the tag.

use std::time::Duration;

use rand::{seq::SliceRandom, Rng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::Variant;

use super::{
    feed::TagUpdate,
    manifest::{TagDataType, TagVariable},
};

/// A simulated reading before it is converted to the type of the tag
#[derive(Debug, Clone, PartialEq)]
enum Reading {
    Number(f64),
    Integer(i64),
    Text(String),
    Flag(bool),
}

impl Reading {
    fn into_variant(self, data_type: TagDataType) -> Option<Variant> {
        let variant = match self {
            Reading::Number(v) => Variant::Double(v),
            Reading::Integer(v) => Variant::Double(v as f64),
            Reading::Text(v) => Variant::from(v),
            Reading::Flag(v) => Variant::Boolean(v),
        };
        data_type.coerce(variant)
    }
}

fn uniform<R: Rng>(rng: &mut R, low: f64, high: f64, decimals: i32) -> Reading {
    let scale = 10f64.powi(decimals);
    Reading::Number((rng.gen_range(low..=high) * scale).round() / scale)
}

fn choice<R: Rng>(rng: &mut R, values: &[&str]) -> Reading {
    Reading::Text(values.choose(rng).copied().unwrap_or_default().to_string())
}

/// Picks a reading for the tag from its name, falling back to its data type.
fn reading_for<R: Rng>(rng: &mut R, name: &str, data_type: TagDataType) -> Reading {
    let has = |s: &str| name.contains(s);
    if has("Temperature") {
        if has("Preform") {
            uniform(rng, 80.0, 120.0, 2)
        } else if has("Mold") {
            uniform(rng, 15.0, 22.0, 2)
        } else if has("Tunnel") {
            uniform(rng, 40.0, 60.0, 2)
        } else if has("Glue") {
            uniform(rng, 30.0, 40.0, 2)
        } else if has("Product") {
            uniform(rng, 4.0, 12.0, 2)
        } else if has("Cooling_Water") {
            uniform(rng, 10.0, 20.0, 2)
        } else {
            uniform(rng, 10.0, 100.0, 2)
        }
    } else if has("Pressure") {
        if has("Blow") {
            uniform(rng, 25.0, 40.0, 2)
        } else if has("Fill") {
            uniform(rng, 2.0, 6.0, 2)
        } else {
            uniform(rng, 1.0, 10.0, 2)
        }
    } else if has("Speed") {
        if has("Filling") || has("Target") {
            uniform(rng, 700.0, 1000.0, 2)
        } else {
            uniform(rng, 500.0, 1200.0, 2)
        }
    } else if has("Stretch_Rod_Position") {
        uniform(rng, 120.0, 180.0, 2)
    } else if has("Cycle_Time") {
        uniform(rng, 3.5, 5.0, 2)
    } else if has("Energy") {
        if has("Per_Bottle") {
            uniform(rng, 0.01, 0.05, 4)
        } else if has("Total") {
            uniform(rng, 1000.0, 10000.0, 2)
        } else {
            uniform(rng, 100.0, 500.0, 2)
        }
    } else if has("Power_Consumption") {
        uniform(rng, 10.0, 50.0, 2)
    } else if has("Level") {
        uniform(rng, 500.0, 10000.0, 2)
    } else if has("Label_Tension") {
        uniform(rng, 1.0, 5.0, 2)
    } else if has("Cooling_Water_Flow") {
        uniform(rng, 10.0, 100.0, 2)
    } else if has("Defect") || has("Count") || has("Rejected") {
        Reading::Integer(rng.gen_range(0..=10))
    } else if has("Status") {
        if has("Filler") || has("Capper") || has("Cooling") || has("Labeling") {
            choice(rng, &["Running", "Idle", "Stopped"])
        } else {
            choice(rng, &["Running", "Idle", "Changeover", "Stopped"])
        }
    } else if has("Runtime_Minutes") || has("Downtime_Minutes") {
        uniform(rng, 0.0, 480.0, 2)
    } else if has("Accuracy") || has("Quality") {
        uniform(rng, 98.0, 100.0, 2)
    } else if has("Bottles_Filled") || has("Bottles_Produced") {
        Reading::Integer(rng.gen_range(1000..=50000))
    } else if has("Label_Roll_Length_Remaining") {
        uniform(rng, 0.0, 10000.0, 2)
    } else if has("Torque") {
        uniform(rng, 0.5, 2.5, 2)
    } else if has("CO2") {
        uniform(rng, 0.1, 2.0, 2)
    } else {
        match data_type {
            TagDataType::Int32 => Reading::Integer(rng.gen_range(0..=1000)),
            TagDataType::Double | TagDataType::Float => uniform(rng, 0.0, 100.0, 2),
            TagDataType::String => Reading::Text(format!("{}_{}", name, rng.gen_range(1..=100))),
            TagDataType::Boolean => Reading::Flag(rng.gen()),
        }
    }
}

/// Produces a simulated value of the right type for the variable. `None` when the reading
/// cannot be expressed in the tag's type, e.g. a status text for a numeric tag.
pub fn simulated_value<R: Rng>(rng: &mut R, variable: &TagVariable) -> Option<Variant> {
    reading_for(rng, &variable.name, variable.data_type).into_variant(variable.data_type)
}

/// Sends a random value for every tag through the feed on each interval.
pub struct TagSimulator {
    variables: Vec<TagVariable>,
    interval: Duration,
    sender: mpsc::Sender<TagUpdate>,
}

impl TagSimulator {
    pub fn new(variables: Vec<TagVariable>, interval: Duration, sender: mpsc::Sender<TagUpdate>) -> Self {
        Self {
            variables,
            interval,
            sender,
        }
    }

    /// One round of updates
    pub fn updates(&self) -> Vec<TagUpdate> {
        let mut rng = rand::thread_rng();
        self.variables
            .iter()
            .filter_map(|variable| {
                let value = simulated_value(&mut rng, variable);
                if value.is_none() {
                    trace!("No simulated value for tag {}", variable.node_id);
                }
                value.map(|value| TagUpdate::new(variable.node_id.clone(), value))
            })
            .collect()
    }

    pub async fn run(self, token: CancellationToken) {
        info!(
            "Simulating {} tags every {} ms",
            self.variables.len(),
            self.interval.as_millis()
        );
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    for update in self.updates() {
                        if self.sender.send(update).await.is_err() {
                            debug!("Tag feed has stopped, simulator stops");
                            return;
                        }
                    }
                }
            }
        }
    }
}
