//! Fixed-point coordinates and geodesic helpers (spec §3 "Coordinates",
//! §4.4.4 "turn weight").
//!
//! Coordinates are stored as `lat_e5`/`lon_e5`: signed 32-bit integers equal
//! to `round(degrees * 10^5)`. Distance and bearing are computed in floating
//! point from the fixed-point representation and then thrown away — nothing
//! downstream of assembly stores floats.

/// Fixed-point scale: `lat_e5 = round(lat_deg * SCALE)`.
pub const SCALE: f64 = 100_000.0;

pub const MAX_LAT_E5: i32 = 90 * 100_000;
pub const MAX_LON_E5: i32 = 180 * 100_000;

/// The Mercator-safe latitude band the extractor keeps nodes within
/// (spec §4.2: "always recorded in `all_nodes` if its latitude is in
/// [-85°, +85°]").
pub const MERCATOR_SAFE_LAT_E5: i32 = 85 * 100_000;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[inline]
pub fn to_fixed(degrees: f64) -> i32 {
    (degrees * SCALE).round() as i32
}

#[inline]
pub fn to_degrees(fixed: i32) -> f64 {
    fixed as f64 / SCALE
}

#[inline]
pub fn is_valid_lat_e5(lat_e5: i32) -> bool {
    lat_e5.abs() <= MAX_LAT_E5
}

#[inline]
pub fn is_valid_lon_e5(lon_e5: i32) -> bool {
    lon_e5.abs() <= MAX_LON_E5
}

#[inline]
pub fn is_mercator_safe(lat_e5: i32) -> bool {
    lat_e5.abs() <= MERCATOR_SAFE_LAT_E5
}

/// Great-circle distance between two fixed-point coordinates, in meters.
pub fn haversine_distance_m(lat1_e5: i32, lon1_e5: i32, lat2_e5: i32, lon2_e5: i32) -> f64 {
    let lat1 = to_degrees(lat1_e5).to_radians();
    let lat2 = to_degrees(lat2_e5).to_radians();
    let dlat = (to_degrees(lat2_e5) - to_degrees(lat1_e5)).to_radians();
    let dlon = (to_degrees(lon2_e5) - to_degrees(lon1_e5)).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from point 1 to point 2, in deci-degrees `[0, 3599]`
/// (0 = due north), matching the fixed-point angle representation used by
/// the turn-penalty model (spec §4.4.4).
pub fn bearing_deci_degrees(lat1_e5: i32, lon1_e5: i32, lat2_e5: i32, lon2_e5: i32) -> u16 {
    let lat1 = to_degrees(lat1_e5).to_radians();
    let lat2 = to_degrees(lat2_e5).to_radians();
    let dlon = (to_degrees(lon2_e5) - to_degrees(lon1_e5)).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing_deg = y.atan2(x).to_degrees();
    let normalized = (bearing_deg + 360.0) % 360.0;
    ((normalized * 10.0).round() as u16).min(3599)
}

/// Signed turn angle in `[-180, 180]` degrees between an incoming bearing
/// and an outgoing bearing, both in deci-degrees.
pub fn turn_angle_degrees(from_bearing_deci: u16, to_bearing_deci: u16) -> i16 {
    let from_deg = from_bearing_deci as f64 / 10.0;
    let to_deg = to_bearing_deci as f64 / 10.0;
    let mut delta = to_deg - from_deg;
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta < -180.0 {
        delta += 360.0;
    }
    delta.round() as i16
}

/// Round-half-up weight conversion from a raw floating weight to the
/// deci-second integer unit used everywhere downstream (spec §4.3 step 8,
/// resolved open question in SPEC_FULL.md §11: `floor(x + 0.5)`, never
/// below 1).
pub fn round_weight(raw: f64) -> i32 {
    std::cmp::max(1, (raw + 0.5).floor() as i32)
}

/// `distance_m * 10 / (speed_kmh / 3.6)`, i.e. travel time in deci-seconds
/// for a segment of the given length at the given speed.
pub fn weight_from_speed(distance_m: f64, speed_kmh: f64) -> i32 {
    let raw = (distance_m * 10.0) / (speed_kmh / 3.6);
    round_weight(raw)
}
