//! Traffic and command-stack collaborator seams.
//!
//! The reconciler never mutates traffic directly: it asks `Traffic`
//! whether an aircraft exists and expresses every mutation as a textual
//! command issued to a `CommandSink`, preserving the command grammar of
//! the surrounding scenario tooling (`CRE`/`MOVE`/`HDG`/`SPD`/`DEL`).

use std::collections::HashMap;

use tracing::warn;

/// Read-only view of the traffic collaborator.
pub trait Traffic {
    fn exists(&self, icao: &str) -> bool;
}

/// Textual command ingestion interface.
pub trait CommandSink {
    fn issue(&mut self, command: &str);
}

/// FIFO of issued commands, drained by the tick loop after each
/// reconciliation pass.
#[derive(Debug, Default)]
pub struct CommandStack {
    queue: Vec<String>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.queue)
    }
}

impl CommandSink for CommandStack {
    fn issue(&mut self, command: &str) {
        self.queue.push(command.to_string());
    }
}

/// Kinematic state of one tracked aircraft.
#[derive(Clone, Debug, PartialEq)]
pub struct AircraftState {
    pub model: String,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub altitude: f64,
    pub speed: f64,
}

/// Minimal in-memory traffic table understanding the five feed command
/// forms. The real kinematic model is an external collaborator; this
/// table backs the demo binary and the test suites.
#[derive(Debug, Default)]
pub struct TrafficTable {
    aircraft: HashMap<String, AircraftState>,
}

impl TrafficTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    pub fn get(&self, icao: &str) -> Option<&AircraftState> {
        self.aircraft.get(icao)
    }

    /// Per-tick update hook. The kinematic model is out of scope; the
    /// table only stores the last commanded state.
    pub fn update(&mut self, _sim_time: f64, _dt: f64) {}

    /// Apply one textual command. Malformed commands are logged and
    /// ignored; operator-facing controls are tolerant, not strict.
    pub fn apply(&mut self, command: &str) {
        let Some((verb, args)) = command.split_once(' ') else {
            warn!(command, "ignoring command without arguments");
            return;
        };
        let fields: Vec<&str> = args.split(',').map(str::trim).collect();
        match verb {
            "CRE" => {
                if let [icao, model, lat, lon, hdg, alt, spd] = fields[..] {
                    let parsed = (
                        lat.parse::<f64>(),
                        lon.parse::<f64>(),
                        hdg.parse::<f64>(),
                        alt.parse::<f64>(),
                        spd.parse::<f64>(),
                    );
                    if let (Ok(lat), Ok(lon), Ok(heading), Ok(altitude), Ok(speed)) = parsed {
                        self.aircraft.insert(
                            icao.to_string(),
                            AircraftState {
                                model: model.to_string(),
                                lat,
                                lon,
                                heading,
                                altitude,
                                speed,
                            },
                        );
                        return;
                    }
                }
                warn!(command, "malformed CRE command");
            }
            "MOVE" => {
                if let [icao, lat, lon, alt] = fields[..] {
                    if let (Some(state), Ok(lat), Ok(lon), Ok(alt)) = (
                        self.aircraft.get_mut(icao),
                        lat.parse::<f64>(),
                        lon.parse::<f64>(),
                        alt.parse::<f64>(),
                    ) {
                        state.lat = lat;
                        state.lon = lon;
                        state.altitude = alt;
                        return;
                    }
                }
                warn!(command, "malformed or unmatched MOVE command");
            }
            "HDG" => {
                if let [icao, hdg] = fields[..] {
                    if let (Some(state), Ok(hdg)) =
                        (self.aircraft.get_mut(icao), hdg.parse::<f64>())
                    {
                        state.heading = hdg;
                        return;
                    }
                }
                warn!(command, "malformed or unmatched HDG command");
            }
            "SPD" => {
                if let [icao, spd] = fields[..] {
                    if let (Some(state), Ok(spd)) =
                        (self.aircraft.get_mut(icao), spd.parse::<f64>())
                    {
                        state.speed = spd;
                        return;
                    }
                }
                warn!(command, "malformed or unmatched SPD command");
            }
            "DEL" => {
                if let [icao] = fields[..] {
                    if self.aircraft.remove(icao).is_none() {
                        warn!(icao, "DEL for unknown aircraft");
                    }
                    return;
                }
                warn!(command, "malformed DEL command");
            }
            _ => warn!(command, "unknown command verb"),
        }
    }
}

impl Traffic for TrafficTable {
    fn exists(&self, icao: &str) -> bool {
        self.aircraft.contains_key(icao)
    }
}
