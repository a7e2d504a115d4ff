//! Trip reconstruction from a raw position series.

use chrono::TimeDelta;

use crate::models::{Position, Trip, TripPoint};

/// Silence longer than this between two fixes ends the current trip.
const TRIP_GAP_MINUTES: i64 = 30;
const KNOTS_TO_KMH: f64 = 1.852;
const EARTH_RADIUS_KM: f64 = 6371.0;

struct Accumulator<'a> {
    first: &'a Position,
    last: &'a Position,
    distance_km: f64,
    speed_sum: f64,
    max_speed: f64,
    count: usize,
}

impl<'a> Accumulator<'a> {
    fn start(position: &'a Position) -> Self {
        Self {
            first: position,
            last: position,
            distance_km: 0.0,
            speed_sum: position.speed,
            max_speed: position.speed,
            count: 1,
        }
    }

    fn push(&mut self, position: &'a Position) {
        self.distance_km += segment_km(self.last, position);
        self.speed_sum += position.speed;
        self.max_speed = self.max_speed.max(position.speed);
        self.count += 1;
        self.last = position;
    }

    fn finish(self, device_id: i64) -> Trip {
        let elapsed = self.last.fix_time - self.first.fix_time;
        // Mean of per-sample speeds, not distance over time.
        let average_knots = self.speed_sum / self.count as f64;

        Trip {
            device_id,
            start: TripPoint::from(self.first),
            end: TripPoint::from(self.last),
            distance_km: round_to(self.distance_km, 3),
            duration_minutes: round_to(elapsed.num_milliseconds() as f64 / 60_000.0, 2),
            average_speed_kmh: round_to(average_knots * KNOTS_TO_KMH, 2),
            max_speed_kmh: round_to(self.max_speed * KNOTS_TO_KMH, 2),
            position_count: self.count,
        }
    }
}

/// Split a time-ascending position series into trips.
pub fn reconstruct_trips(device_id: i64, positions: &[Position]) -> Vec<Trip> {
    let Some((first, rest)) = positions.split_first() else {
        return Vec::new();
    };

    let gap = TimeDelta::minutes(TRIP_GAP_MINUTES);
    let mut trips = Vec::new();
    let mut current = Accumulator::start(first);

    for position in rest {
        if position.fix_time - current.last.fix_time > gap {
            let closed = std::mem::replace(&mut current, Accumulator::start(position));
            trips.push(closed.finish(device_id));
        } else {
            current.push(position);
        }
    }
    trips.push(current.finish(device_id));

    trips
}

/// Odometer delta when both readings exist and did not go backwards, else great-circle distance.
fn segment_km(from: &Position, to: &Position) -> f64 {
    match (from.attributes.odometer(), to.attributes.odometer()) {
        (Some(start), Some(end)) if end >= start => (end - start) / 1000.0,
        _ => haversine_km(from.latitude, from.longitude, to.latitude, to.longitude),
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
