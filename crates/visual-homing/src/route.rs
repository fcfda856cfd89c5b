//! Learned routes: a dense recorded path reduced to sparse waypoints, with geometric queries.

use crate::types::{HomingError, HomingResult, Waypoint};

/// Ordered waypoints of a learned route; the last one is the destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    /// A route with no waypoints.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reduce a dense path to waypoints at least `waypoint_spacing` apart along the path.
    ///
    /// The first point is always kept. Path length is accumulated from the
    /// last kept point and a point is kept once the total exceeds the spacing.
    pub fn from_points(points: &[[f32; 2]], waypoint_spacing: f32) -> HomingResult<Self> {
        if !(waypoint_spacing > 0.0) {
            return Err(HomingError::InvalidConfig(format!(
                "waypoint spacing must be positive, got {waypoint_spacing}"
            )));
        }

        let kept = decimate(points, waypoint_spacing);
        let waypoints = kept
            .iter()
            .enumerate()
            .map(|(i, &[x, y])| Waypoint {
                x,
                y,
                heading: kept.get(i + 1).map_or(0.0, |&next| heading_between([x, y], next)),
                familiarity: 0.0,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            "Route has {} points, reduced to {} waypoints",
            points.len(),
            waypoints.len()
        );
        Ok(Self { waypoints })
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// The final waypoint.
    pub fn destination(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    /// `(x, y, heading_degrees)` of waypoint `index`.
    pub fn waypoint(&self, index: usize) -> HomingResult<(f32, f32, f32)> {
        let wp = self.get(index)?;
        Ok((wp.x, wp.y, wp.heading))
    }

    /// Distance from `(x, y)` to the nearest route segment, and that segment's index.
    pub fn distance_to_route(&self, x: f32, y: f32) -> HomingResult<(f32, usize)> {
        let (distance, _, segment) = self.nearest_point_on_route(x, y)?;
        Ok((distance, segment))
    }

    /// Like [`Route::distance_to_route`] but also returns the nearest point itself.
    ///
    /// Each segment projects the query onto its line with the parameter
    /// clamped to the segment; zero-length segments use their endpoint.
    /// Ties keep the lowest segment index.
    pub fn nearest_point_on_route(&self, x: f32, y: f32) -> HomingResult<(f32, [f32; 2], usize)> {
        if self.waypoints.len() < 2 {
            return Err(HomingError::InsufficientWaypoints(self.waypoints.len()));
        }

        let mut nearest: Option<(f32, [f32; 2], usize)> = None;
        for (segment, pair) in self.waypoints.windows(2).enumerate() {
            let start = [pair[0].x, pair[0].y];
            let end = [pair[1].x, pair[1].y];
            let closest = closest_point_on_segment([x, y], start, end);
            let dist_sq = distance_squared([x, y], closest);

            if nearest.map_or(true, |(best, _, _)| dist_sq < best) {
                nearest = Some((dist_sq, closest, segment));
            }
        }

        let (dist_sq, point, segment) =
            nearest.ok_or(HomingError::InsufficientWaypoints(self.waypoints.len()))?;
        Ok((dist_sq.sqrt(), point, segment))
    }

    /// Whether `(x, y)` lies strictly within `threshold` of the destination.
    pub fn at_destination(&self, x: f32, y: f32, threshold: f32) -> bool {
        match self.destination() {
            Some(dest) => (x - dest.x).hypot(y - dest.y) < threshold,
            None => false,
        }
    }

    /// Record the familiarity of waypoint `index`, clamped to `[0, 1]`.
    pub fn set_familiarity(&mut self, index: usize, value: f64) -> HomingResult<()> {
        let len = self.waypoints.len();
        let wp = self
            .waypoints
            .get_mut(index)
            .ok_or(HomingError::WaypointOutOfRange { index, len })?;
        wp.familiarity = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0) as f32
        };
        Ok(())
    }

    pub fn familiarity(&self, index: usize) -> HomingResult<f32> {
        Ok(self.get(index)?.familiarity)
    }

    /// Grey RGB colour per waypoint, brightness proportional to familiarity.
    pub fn familiarity_colours(&self) -> Vec<[u8; 3]> {
        self.waypoints
            .iter()
            .map(|wp| {
                let intensity = (255.0 * wp.familiarity).round().clamp(0.0, 255.0) as u8;
                [intensity; 3]
            })
            .collect()
    }

    fn get(&self, index: usize) -> HomingResult<&Waypoint> {
        self.waypoints.get(index).ok_or(HomingError::WaypointOutOfRange {
            index,
            len: self.waypoints.len(),
        })
    }
}

/// Keep the first point, then every point reached after more than `spacing` of path.
fn decimate(points: &[[f32; 2]], spacing: f32) -> Vec<[f32; 2]> {
    let mut kept = Vec::with_capacity(points.len() / 10 + 1);
    let mut travelled = 0.0f32;
    let mut last: Option<[f32; 2]> = None;

    for &p in points {
        match last {
            None => kept.push(p),
            Some(prev) => {
                travelled += distance_squared(prev, p).sqrt();
                if travelled > spacing {
                    kept.push(p);
                    travelled = 0.0;
                }
            }
        }
        last = Some(p);
    }
    kept
}

/// Heading in degrees from `from` towards `to`: 0 along +y, increasing clockwise, in `[0, 360)`.
fn heading_between(from: [f32; 2], to: [f32; 2]) -> f32 {
    let dx = f64::from(to[0] - from[0]);
    let dy = f64::from(to[1] - from[1]);
    (90.0 + (-dy).atan2(dx).to_degrees()).rem_euclid(360.0) as f32
}

fn closest_point_on_segment(p: [f32; 2], start: [f32; 2], end: [f32; 2]) -> [f32; 2] {
    let len_sq = distance_squared(start, end);
    if len_sq == 0.0 {
        return start;
    }

    let t = ((p[0] - start[0]) * (end[0] - start[0]) + (p[1] - start[1]) * (end[1] - start[1]))
        / len_sq;
    let t = t.clamp(0.0, 1.0);
    [
        start[0] + t * (end[0] - start[0]),
        start[1] + t * (end[1] - start[1]),
    ]
}

fn distance_squared(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(route: &Route) -> Vec<[f32; 2]> {
        route.waypoints().iter().map(|w| [w.x, w.y]).collect()
    }

    fn square() -> Route {
        Route::from_points(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]], 1.0).unwrap()
    }

    #[test]
    fn test_decimation_literal_input() {
        let route = Route::from_points(&[[0.0, 0.0], [0.0, 5.0], [0.0, 10.0]], 4.0).unwrap();
        assert_eq!(positions(&route), vec![[0.0, 0.0], [0.0, 5.0], [0.0, 10.0]]);
    }

    #[test]
    fn test_decimation_accumulates_path_length() {
        let dense: Vec<[f32; 2]> = (0..=10).map(|i| [i as f32 * 0.5, 0.0]).collect();
        let route = Route::from_points(&dense, 1.2).unwrap();
        // Kept once more than 1.2 has been travelled: every third step.
        assert_eq!(positions(&route), vec![[0.0, 0.0], [1.5, 0.0], [3.0, 0.0], [4.5, 0.0]]);
    }

    #[test]
    fn test_decimation_is_idempotent() {
        let dense: Vec<[f32; 2]> = (0..50).map(|i| [i as f32 * 0.1, i as f32 * 0.05]).collect();
        let once = Route::from_points(&dense, 0.7).unwrap();
        let twice = Route::from_points(&positions(&once), 0.7).unwrap();
        assert_eq!(positions(&once), positions(&twice));
    }

    #[test]
    fn test_non_positive_spacing_rejected() {
        for spacing in [0.0, -1.0] {
            assert!(matches!(
                Route::from_points(&[[0.0, 0.0]], spacing),
                Err(HomingError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_headings() {
        let route = square();
        // +x is 90 degrees clockwise from +y.
        assert!((route.waypoint(0).unwrap().2 - 90.0).abs() < 1e-4);
        // +y is 0 degrees.
        assert!(route.waypoint(1).unwrap().2.abs() < 1e-4);
        // -x is 270 degrees.
        assert!((route.waypoint(2).unwrap().2 - 270.0).abs() < 1e-4);
        // The destination has no successor.
        assert_eq!(route.waypoint(3).unwrap(), (0.0, 4.0, 0.0));
    }

    #[test]
    fn test_heading_south_is_180() {
        assert!((heading_between([0.0, 0.0], [0.0, -1.0]) - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_waypoint_out_of_range() {
        assert!(matches!(
            square().waypoint(4),
            Err(HomingError::WaypointOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_distance_clamps_inside_segment() {
        let route = Route::from_points(&[[0.0, 0.0], [4.0, 0.0]], 1.0).unwrap();
        let (distance, segment) = route.distance_to_route(2.0, 1.0).unwrap();
        assert!((distance - 1.0).abs() < 1e-6);
        assert_eq!(segment, 0);
    }

    #[test]
    fn test_distance_clamps_past_segment_end() {
        let route = Route::from_points(&[[0.0, 0.0], [4.0, 0.0]], 1.0).unwrap();
        let (distance, _) = route.distance_to_route(7.0, 4.0).unwrap();
        assert!((distance - 5.0).abs() < 1e-6);
        let (distance, _) = route.distance_to_route(-3.0, 0.0).unwrap();
        assert!((distance - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_zero_on_segment() {
        let route = square();
        for (x, y) in [(1.0, 0.0), (4.0, 2.5), (0.5, 4.0), (4.0, 4.0)] {
            let (distance, _) = route.distance_to_route(x, y).unwrap();
            assert!(distance.abs() < 1e-6, "({x}, {y}) -> {distance}");
        }
    }

    #[test]
    fn test_distance_independent_of_segment_direction() {
        let forward = Route::from_points(&[[1.0, 1.0], [5.0, 3.0]], 0.5).unwrap();
        let backward = Route::from_points(&[[5.0, 3.0], [1.0, 1.0]], 0.5).unwrap();
        for (x, y) in [(0.0, 0.0), (3.0, 5.0), (6.0, 2.0), (2.0, 2.0)] {
            let (a, _) = forward.distance_to_route(x, y).unwrap();
            let (b, _) = backward.distance_to_route(x, y).unwrap();
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_nearest_segment_ties_keep_first() {
        // (4, 0) is the shared corner of segments 0 and 1.
        let (distance, segment) = square().distance_to_route(5.0, -1.0).unwrap();
        assert!((distance - 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(segment, 0);

        let (_, segment) = square().distance_to_route(3.0, 3.5).unwrap();
        assert_eq!(segment, 2);
    }

    #[test]
    fn test_zero_length_segment_uses_endpoint() {
        assert_eq!(closest_point_on_segment([3.0, 4.0], [0.0, 0.0], [0.0, 0.0]), [0.0, 0.0]);
        let p = closest_point_on_segment([2.0, 1.0], [0.0, 0.0], [4.0, 0.0]);
        assert_eq!(p, [2.0, 0.0]);
    }

    #[test]
    fn test_nearest_point_on_route() {
        let (_, point, segment) = square().nearest_point_on_route(5.0, 2.0).unwrap();
        assert_eq!(point, [4.0, 2.0]);
        assert_eq!(segment, 1);
    }

    #[test]
    fn test_distance_needs_two_waypoints() {
        assert!(matches!(
            Route::empty().distance_to_route(0.0, 0.0),
            Err(HomingError::InsufficientWaypoints(0))
        ));
        let single = Route::from_points(&[[1.0, 1.0]], 1.0).unwrap();
        assert!(matches!(
            single.distance_to_route(0.0, 0.0),
            Err(HomingError::InsufficientWaypoints(1))
        ));
    }

    #[test]
    fn test_at_destination() {
        let route = square();
        assert!(route.at_destination(0.0, 4.1, 0.2));
        assert!(!route.at_destination(0.0, 4.3, 0.2));
        assert!(!route.at_destination(0.0, 4.0, 0.0));
        assert!(!Route::empty().at_destination(0.0, 0.0, 100.0));
    }

    #[test]
    fn test_at_destination_monotonic_in_threshold() {
        let route = square();
        let mut seen_true = false;
        for step in 0..60 {
            let threshold = step as f32 * 0.1;
            let arrived = route.at_destination(2.0, 1.0, threshold);
            assert!(arrived || !seen_true);
            seen_true |= arrived;
        }
        assert!(seen_true);
    }

    #[test]
    fn test_familiarity_clamped() {
        let mut route = square();
        route.set_familiarity(1, 0.25).unwrap();
        route.set_familiarity(2, 3.0).unwrap();
        route.set_familiarity(3, -1.0).unwrap();
        assert_eq!(route.familiarity(0).unwrap(), 0.0);
        assert_eq!(route.familiarity(1).unwrap(), 0.25);
        assert_eq!(route.familiarity(2).unwrap(), 1.0);
        assert_eq!(route.familiarity(3).unwrap(), 0.0);
        assert_eq!(
            route.familiarity_colours(),
            vec![[0; 3], [64; 3], [255; 3], [0; 3]]
        );
        assert!(route.set_familiarity(9, 0.5).is_err());
        // Position and heading are untouched.
        assert_eq!(route.waypoint(1).unwrap().0, 4.0);
    }
}
