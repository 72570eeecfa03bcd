//! Spawn point selection
//!
//! Pure helpers used by the spawner; kept free of any client so they can be
//! tested on synthetic maps.

use contracts::{Location, Transform};
use nalgebra::Point3;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

fn to_point(location: &Location) -> Point3<f64> {
    Point3::new(location.x, location.y, location.z)
}

/// Euclidean distance between two locations (meters)
pub fn distance(a: &Location, b: &Location) -> f64 {
    nalgebra::distance(&to_point(a), &to_point(b))
}

/// Pick the ego spawn point
///
/// Uses `points[preferred]` when the map has that many points, otherwise a
/// random point. Returns `None` only for an empty map.
pub fn select_ego_spawn<R: Rng + ?Sized>(
    points: &[Transform],
    preferred: usize,
    rng: &mut R,
) -> Option<Transform> {
    points
        .get(preferred)
        .or_else(|| points.choose(rng))
        .copied()
}

/// Spawn points strictly closer than `radius` to `center`, excluding `center` itself
pub fn nearby_spawn_points(points: &[Transform], center: &Transform, radius: f64) -> Vec<Transform> {
    points
        .iter()
        .filter(|point| *point != center)
        .filter(|point| distance(&point.location, &center.location) < radius)
        .copied()
        .collect()
}

/// Nearby points in random order, at most `max_count` of them
pub fn plan_traffic_points<R: Rng + ?Sized>(
    points: &[Transform],
    center: &Transform,
    radius: f64,
    max_count: usize,
    rng: &mut R,
) -> Vec<Transform> {
    let mut nearby = nearby_spawn_points(points, center, radius);
    nearby.shuffle(rng);
    nearby.truncate(max_count);
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn point(x: f64, y: f64) -> Transform {
        Transform::from_location(x, y, 0.5)
    }

    fn line_map(count: usize, spacing: f64) -> Vec<Transform> {
        (0..count).map(|i| point(i as f64 * spacing, 0.0)).collect()
    }

    #[test]
    fn test_distance() {
        let a = Location { x: 0.0, y: 0.0, z: 0.0 };
        let b = Location { x: 3.0, y: 4.0, z: 0.0 };
        assert!((distance(&a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_select_preferred_index() {
        let points = line_map(12, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        let chosen = select_ego_spawn(&points, 10, &mut rng).unwrap();
        assert_eq!(chosen, points[10]);
    }

    #[test]
    fn test_select_falls_back_to_random_point() {
        let points = line_map(5, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        let chosen = select_ego_spawn(&points, 10, &mut rng).unwrap();
        assert!(points.contains(&chosen));
    }

    #[test]
    fn test_select_empty_map() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_ego_spawn(&[], 10, &mut rng).is_none());
    }

    #[test]
    fn test_nearby_filter_excludes_center_and_far_points() {
        let center = point(0.0, 0.0);
        let points = vec![
            center,
            point(10.0, 0.0),
            point(0.0, -59.9),
            point(60.0, 0.0),
            point(100.0, 100.0),
            point(30.0, 30.0),
        ];

        let nearby = nearby_spawn_points(&points, &center, 60.0);

        assert_eq!(
            nearby,
            vec![point(10.0, 0.0), point(0.0, -59.9), point(30.0, 30.0)]
        );
    }

    #[test]
    fn test_plan_is_bounded_permutation_of_nearby() {
        let points = line_map(40, 2.0);
        let center = points[0];
        let mut rng = StdRng::seed_from_u64(42);

        let planned = plan_traffic_points(&points, &center, 60.0, 25, &mut rng);
        let nearby = nearby_spawn_points(&points, &center, 60.0);

        assert_eq!(nearby.len(), 29);
        assert_eq!(planned.len(), 25);
        assert!(planned.iter().all(|p| nearby.contains(p)));
        assert!(!planned.contains(&center));
    }

    #[test]
    fn test_plan_same_seed_same_order() {
        let points = line_map(40, 2.0);
        let center = points[5];
        let a = plan_traffic_points(&points, &center, 60.0, 25, &mut StdRng::seed_from_u64(9));
        let b = plan_traffic_points(&points, &center, 60.0, 25, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
