pub mod model;
pub mod traj;
pub use traj::*;
pub mod fmatch;
pub use fmatch::*;

// test
#[cfg(test)]
mod test {
    use super::fmatch::{extract_formation, pair_metrics, FMatch};
    use super::model::{Config, FormationSegment, GeoPos, MatchedPair};
    use super::traj::Trajectory;
    use crate::algorithm::Point;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const HOUR_MS: i64 = 3_600_000;
    const MIN_MS: i64 = 60_000;

    fn traj(id: &str, pts: &[(f64, f64, i64)]) -> Trajectory {
        Trajectory::from_points(
            id.to_string(),
            pts.iter().map(|&(lon, lat, t)| (Point(lon, lat), t)).collect(),
        )
        .unwrap()
    }

    fn matched(f1: &str, f2: &str) -> MatchedPair {
        MatchedPair {
            flight1_id: f1.to_string(),
            flight2_id: f2.to_string(),
            angle_diff: 0.0,
            time_gap_minutes: 0.0,
            intersection_point: GeoPos { lat: 0.0, lon: 0.0 },
            intersect_time_1: 0,
            intersect_time_2: 0,
            created_at: 0,
        }
    }

    // 两条近似同向且相交的轨迹应配对 第三条正交的不配对
    #[test]
    fn test_match_crossing_flights() {
        let cfg = Config {
            angle_tolerance: 45.0,
            ..Config::default()
        };
        let mut engine = FMatch::new(&cfg);
        let loaded = engine.load(vec![
            traj(
                "AF100",
                &[
                    (0.0, 0.0, 0),
                    (0.5, 0.5, HOUR_MS / 2),
                    (1.0, 1.0, HOUR_MS),
                    (1.5, 1.5, 3 * HOUR_MS / 2),
                    (2.0, 2.0, 2 * HOUR_MS),
                ],
            ),
            traj(
                "BA200",
                &[
                    (0.0, 0.2, HOUR_MS),
                    (0.5, 0.6, 3 * HOUR_MS / 2),
                    (1.0, 1.0, 2 * HOUR_MS),
                    (1.5, 1.4, 5 * HOUR_MS / 2),
                    (2.0, 1.8, 3 * HOUR_MS),
                ],
            ),
            traj(
                "CX300",
                &[(0.0, 2.0, 0), (1.0, 1.0, HOUR_MS), (2.0, 0.0, 2 * HOUR_MS)],
            ),
        ]);
        assert_eq!(loaded, 3);
        let report = engine.match_all(&cfg);
        assert_eq!(report.candidates_seen, 3);
        assert!(!report.truncated);
        assert_eq!(report.pairs.len(), 1);
        let pair = &report.pairs[0];
        assert_eq!(pair.flight1_id, "AF100");
        assert_eq!(pair.flight2_id, "BA200");
        assert!((pair.intersection_point.lat - 1.0).abs() < 1e-9);
        assert!((pair.intersection_point.lon - 1.0).abs() < 1e-9);
        assert!((pair.time_gap_minutes - 60.0).abs() < 1e-6);
        // 插值时间落在各自轨迹的时间范围内
        assert!(pair.intersect_time_1 >= 0 && pair.intersect_time_1 <= 2 * HOUR_MS);
        assert!(pair.intersect_time_2 >= HOUR_MS && pair.intersect_time_2 <= 3 * HOUR_MS);
    }

    // 在编游程在A的[3..8] 另有一个更短的[10..11] 应返回前者
    #[test]
    fn test_extract_longest_run() {
        let pts_a: Vec<(f64, f64, i64)> =
            (0..12).map(|i| (0.1 * i as f64, 0.0, i as i64 * MIN_MS)).collect();
        let pts_b: Vec<(f64, f64, i64)> = (0..12)
            .map(|i| {
                let near = (3..=8).contains(&i) || (10..=11).contains(&i);
                let lat = if near { 0.001 } else { 1.0 };
                (0.1 * i as f64, lat, i as i64 * MIN_MS)
            })
            .collect();
        let t1 = traj("AF100", &pts_a);
        let t2 = traj("BA200", &pts_b);
        let seg = extract_formation(&t1, &t2, 10.0).unwrap();
        assert_eq!(
            seg,
            FormationSegment {
                start1: 3,
                end1: 8,
                start2: 3,
                end2: 8
            }
        );
    }

    #[test]
    fn test_extract_no_formation() {
        let t1 = traj("AF100", &[(0.0, 0.0, 0), (0.5, 0.0, MIN_MS)]);
        let t2 = traj("BA200", &[(0.0, 5.0, 0), (0.5, 5.0, MIN_MS)]);
        assert!(extract_formation(&t1, &t2, 10.0).is_none());
    }

    // 完全重合的直线轨迹 绕行为0
    #[test]
    fn test_metrics_straight_overlap() {
        let pts: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 0.0, i as i64 * MIN_MS)).collect();
        let t1 = traj("AF100", &pts);
        let t2 = traj("BA200", &pts);
        let seg = extract_formation(&t1, &t2, 10.0).unwrap();
        assert_eq!(seg.start1, 0);
        assert_eq!(seg.end1, 5);
        let metrics = pair_metrics(&t1, &t2, &seg);
        assert!(metrics.detour_km.abs() < 1e-6, "detour {}", metrics.detour_km);
        assert!(metrics.detour_percent.abs() < 1e-6);
        assert!((metrics.duration_min - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_enrich_parallel_flights() {
        let cfg = Config {
            max_detour_km: 10.0,
            ..Config::default()
        };
        let mut engine = FMatch::new(&cfg);
        let pts_a: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 0.0, i as i64 * MIN_MS)).collect();
        let pts_b: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 0.001, i as i64 * MIN_MS)).collect();
        engine.load(vec![traj("AF100", &pts_a), traj("BA200", &pts_b)]);
        let pairs = vec![matched("AF100", "BA200")];

        let mut rng = StdRng::seed_from_u64(42);
        let enriched = engine.enrich(&pairs, &cfg, &mut rng);
        assert_eq!(enriched.len(), 1);
        let e = &enriched[0];
        assert!(e.detour_km.abs() < 0.05, "detour {}", e.detour_km);
        assert!((e.overlap_duration_min - 5.0).abs() < 1e-9);
        assert!(e.formation_distance_km > 50.0);
        assert!(e.leader_id == "AF100" || e.leader_id == "BA200");
        assert_ne!(e.leader_id, e.follower_id);

        // 相同种子下leader指派可复现
        let mut rng2 = StdRng::seed_from_u64(42);
        let enriched2 = engine.enrich(&pairs, &cfg, &mut rng2);
        assert_eq!(enriched[0].leader_id, enriched2[0].leader_id);
    }

    // 最短时长阈值把短游程过滤掉 找不到编队段是合法的空结果
    #[test]
    fn test_enrich_filters() {
        let cfg = Config {
            max_detour_km: 10.0,
            min_duration_min: 10.0,
            ..Config::default()
        };
        let mut engine = FMatch::new(&cfg);
        let pts_a: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 0.0, i as i64 * MIN_MS)).collect();
        let pts_b: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 0.001, i as i64 * MIN_MS)).collect();
        let pts_far: Vec<(f64, f64, i64)> =
            (0..6).map(|i| (0.1 * i as f64, 5.0, i as i64 * MIN_MS)).collect();
        engine.load(vec![
            traj("AF100", &pts_a),
            traj("BA200", &pts_b),
            traj("CX300", &pts_far),
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        // 时长5分钟 低于阈值10分钟
        let enriched = engine.enrich(&[matched("AF100", "BA200")], &cfg, &mut rng);
        assert!(enriched.is_empty());
        // 距离太远 提取不出编队段 不报错
        let cfg = Config {
            max_detour_km: 10.0,
            ..Config::default()
        };
        let enriched = engine.enrich(&[matched("AF100", "CX300")], &cfg, &mut rng);
        assert!(enriched.is_empty());
    }
}
