//! Profile interface consumed by the extractor (spec §6). Mirrors the
//! teacher's ABI module (`profile_abi.rs`) in spirit — a typed, `Send +
//! Sync` trait every worker thread can share — but the hook names and
//! mutable carrier structs follow the source spec literally rather than the
//! teacher's interned-tag-id ABI, since this profile surface reads raw
//! `(key, value)` tag pairs instead of a pre-interned dictionary.

use crate::primitive::Tags;

/// Mutable per-node state the profile may fill in. `barrier` makes the node
/// U-turn-only during edge-expansion (§4.4.3); `traffic_light` adds the
/// traffic-light turn penalty (§4.4.4).
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeOutput {
    pub barrier: bool,
    pub traffic_light: bool,
}

/// Mutable per-way state the profile fills in (spec §4.2 "Way" behavior).
#[derive(Debug, Clone, Default)]
pub struct WayOutput {
    pub forward_speed_kmh: f64,
    pub backward_speed_kmh: f64,
    pub duration_s: Option<f64>,
    pub name: Option<String>,
    pub travel_mode: u8,
    pub is_roundabout: bool,
    pub is_access_restricted: bool,
    pub ignore_in_grid: bool,
}

impl WayOutput {
    /// A way the profile left with no speed and no duration is not
    /// traversable and must be dropped (spec §4.2).
    pub fn is_traversable(&self) -> bool {
        self.forward_speed_kmh > 0.0 || self.backward_speed_kmh > 0.0 || self.duration_s.is_some()
    }
}

/// A routing profile: the policy layer between raw OSM tags and the
/// extractor's classified records. Each worker thread gets its own
/// `Profile` instance (created via `Profiles::new_instance`), mirroring the
/// source's "thread-local interpreter instance initialized from the same
/// script source" — ours are plain Rust values instead of a scripted
/// interpreter, but the per-worker ownership model is the same.
pub trait Profile: Send {
    /// Modes that void a turn restriction when listed in its `except` tag.
    fn exceptions(&self) -> &[&str];

    fn node_function(&self, tags: &Tags) -> NodeOutput;
    fn way_function(&self, tags: &Tags) -> WayOutput;

    /// Additional penalty (deciseconds) for a turn of the given angle.
    /// Absence (the default) means zero penalty for every turn.
    fn turn_function(&self, _angle_degrees: f64) -> i32 {
        0
    }

    fn has_turn_penalty_function(&self) -> bool {
        false
    }

    fn use_turn_restrictions(&self) -> bool {
        true
    }

    fn traffic_signal_penalty_ds(&self) -> i32;
    fn u_turn_penalty_ds(&self) -> i32;
}

/// A minimal reference profile for a motor vehicle: reads `highway`,
/// `maxspeed`, `oneway`, `junction=roundabout`, `name`, `barrier`, and
/// `highway=traffic_signals`. Exists so the extractor pipeline and its
/// tests have a concrete, always-available `Profile` without depending on
/// an external script.
pub struct CarProfile {
    pub default_speeds_kmh: Vec<(&'static str, f64)>,
}

impl Default for CarProfile {
    fn default() -> Self {
        Self {
            default_speeds_kmh: vec![
                ("motorway", 110.0),
                ("trunk", 90.0),
                ("primary", 70.0),
                ("secondary", 60.0),
                ("tertiary", 50.0),
                ("residential", 30.0),
                ("living_street", 10.0),
                ("service", 15.0),
                ("unclassified", 40.0),
            ],
        }
    }
}

impl CarProfile {
    fn speed_for_class(&self, class: &str) -> Option<f64> {
        self.default_speeds_kmh
            .iter()
            .find(|(k, _)| *k == class)
            .map(|(_, v)| *v)
    }
}

fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

impl Profile for CarProfile {
    fn exceptions(&self) -> &[&str] {
        &["bicycle", "foot"]
    }

    fn node_function(&self, tags: &Tags) -> NodeOutput {
        NodeOutput {
            barrier: tag(tags, "barrier").is_some(),
            traffic_light: tag(tags, "highway") == Some("traffic_signals"),
        }
    }

    fn way_function(&self, tags: &Tags) -> WayOutput {
        let Some(highway) = tag(tags, "highway") else {
            return WayOutput::default();
        };

        let Some(base_speed) = self.speed_for_class(highway) else {
            return WayOutput::default();
        };

        let speed = tag(tags, "maxspeed")
            .and_then(|v| v.trim_end_matches(" km/h").parse::<f64>().ok())
            .unwrap_or(base_speed);

        let oneway = tag(tags, "oneway");
        let (forward, backward) = match oneway {
            Some("yes") | Some("true") | Some("1") => (speed, 0.0),
            Some("-1") | Some("reverse") => (0.0, speed),
            _ => (speed, speed),
        };

        WayOutput {
            forward_speed_kmh: forward,
            backward_speed_kmh: backward,
            duration_s: None,
            name: tag(tags, "name").map(String::from),
            travel_mode: 0,
            is_roundabout: tag(tags, "junction") == Some("roundabout"),
            is_access_restricted: matches!(tag(tags, "access"), Some("private") | Some("no")),
            ignore_in_grid: false,
        }
    }

    fn traffic_signal_penalty_ds(&self) -> i32 {
        80
    }

    fn u_turn_penalty_ds(&self) -> i32 {
        200
    }

    /// Sigmoid turn-angle cost, same shape as OSRM's car profile: ~0 for a
    /// straight continuation, ~turn_penalty_ds for a full reversal, biased
    /// toward cheaper right turns under right-hand traffic. U-turn and
    /// traffic-light penalties are added separately by the caller.
    fn turn_function(&self, angle_degrees: f64) -> i32 {
        const TURN_PENALTY_DS: f64 = 75.0;
        const TURN_BIAS: f64 = 1.075;

        let exponent = -((13.0 / TURN_BIAS) * (-angle_degrees / 180.0) - 6.5 * TURN_BIAS);
        let sigmoid = 1.0 / (1.0 + exponent.exp());
        (TURN_PENALTY_DS * sigmoid).round() as i32
    }

    fn has_turn_penalty_function(&self) -> bool {
        true
    }
}
