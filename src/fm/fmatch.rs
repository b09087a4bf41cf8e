use super::model::{
    Config, EnrichedPair, FormationSegment, IntersectionInfo, MatchReport, MatchedPair, PairMetrics,
};
use super::traj::Trajectory;
use crate::algorithm;
use crate::index::{generate_candidates, CandidatePair, TrajIndex};
use log::{debug, info, warn};
use rand::Rng;
use rayon::prelude::*;
use rtree_rs::{RTree, Rect};

pub struct FMatch {
    index: TrajIndex,
}

impl FMatch {
    pub fn new(cfg: &Config) -> Self {
        FMatch {
            index: TrajIndex::new(cfg.grid_deg, cfg.time_bin_ms()),
        }
    }

    /// 逐条加载轨迹 重复的flight_id跳过不中断
    pub fn load<I>(&mut self, trajs: I) -> usize
    where
        I: IntoIterator<Item = Trajectory>,
    {
        let mut count = 0;
        for traj in trajs {
            match self.index.add_traj(traj) {
                Ok(_) => count += 1,
                Err(err) => warn!("skip trajectory: {}", err),
            }
        }
        info!("loaded {} trajectories", count);
        count
    }

    pub fn traj_count(&self) -> usize {
        self.index.traj_count()
    }

    /// 一次完整的匹配运行 候选生成后按对并行过滤
    pub fn match_all(&self, cfg: &Config) -> MatchReport {
        let candidates = generate_candidates(&self.index, cfg.max_pairs);
        let pairs: Vec<MatchedPair> = candidates
            .pairs
            .par_iter()
            .filter_map(|cand| self.filter_pair(cand, cfg))
            .collect();
        info!(
            "{} of {} candidate pairs passed all filters",
            pairs.len(),
            candidates.pairs.len()
        );
        MatchReport {
            pairs,
            candidates_seen: candidates.pairs.len(),
            truncated: candidates.truncated,
        }
    }

    // 三级过滤 便宜的在前
    fn filter_pair(&self, cand: &CandidatePair, cfg: &Config) -> Option<MatchedPair> {
        let t1 = &self.index.trajs[cand.index1];
        let t2 = &self.index.trajs[cand.index2];
        // 1. 航向过滤 用首末点的整体航向而不是瞬时航向
        let angle_diff = algorithm::angle_diff(t1.overall_bearing(), t2.overall_bearing());
        if angle_diff > cfg.angle_tolerance {
            return None;
        }
        // 2. 相交过滤
        let cross = find_intersection(t1, t2)?;
        // 3. 时间过滤 交点处两机到达时间差
        let time_gap_minutes = (cross.time1_ms - cross.time2_ms).abs() as f64 / 60_000.0;
        if time_gap_minutes > cfg.max_time_gap_min {
            return None;
        }
        debug!(
            "pair {} / {} angle {:.2} gap {:.1}min",
            t1.flight_id, t2.flight_id, angle_diff, time_gap_minutes
        );
        Some(MatchedPair {
            flight1_id: t1.flight_id.clone(),
            flight2_id: t2.flight_id.clone(),
            angle_diff,
            time_gap_minutes,
            intersection_point: cross.point.into(),
            intersect_time_1: cross.time1_ms,
            intersect_time_2: cross.time2_ms,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// 对已通过过滤的航班对提取编队段并计算指标
    /// 角度和时间阈值重新应用 leader指派用注入的rng掷硬币
    pub fn enrich<R: Rng>(&self, pairs: &[MatchedPair], cfg: &Config, rng: &mut R) -> Vec<EnrichedPair> {
        let prefiltered: Vec<(&MatchedPair, usize, usize)> = pairs
            .iter()
            .filter(|pair| {
                pair.angle_diff <= cfg.angle_tolerance && pair.time_gap_minutes <= cfg.max_time_gap_min
            })
            .filter_map(|pair| {
                let i1 = self.index.find_traj_by_id(&pair.flight1_id);
                let i2 = self.index.find_traj_by_id(&pair.flight2_id);
                match (i1, i2) {
                    (Some(i1), Some(i2)) => Some((pair, i1, i2)),
                    _ => {
                        warn!(
                            "skip pair {} / {}, trajectory not loaded",
                            pair.flight1_id, pair.flight2_id
                        );
                        None
                    }
                }
            })
            .collect();
        // 每对的提取相互独立 并行执行
        let extracted: Vec<(&MatchedPair, usize, usize, FormationSegment, PairMetrics)> = prefiltered
            .into_par_iter()
            .filter_map(|(pair, i1, i2)| {
                let t1 = &self.index.trajs[i1];
                let t2 = &self.index.trajs[i2];
                let seg = extract_formation(t1, t2, cfg.max_detour_km)?;
                let metrics = pair_metrics(t1, t2, &seg);
                if metrics.duration_min < cfg.min_duration_min {
                    return None;
                }
                Some((pair, i1, i2, seg, metrics))
            })
            .collect();
        let mut out = Vec::new();
        for (pair, i1, i2, seg, metrics) in extracted {
            if out.len() >= cfg.limit {
                break;
            }
            let t1 = &self.index.trajs[i1];
            let t2 = &self.index.trajs[i2];
            let joining = algorithm::midpoint(&t1.coords[seg.start1], &t2.coords[seg.start2]);
            let splitting = algorithm::midpoint(&t1.coords[seg.end1], &t2.coords[seg.end2]);
            // 掷硬币 leader/follower不携带任何物理含义
            let (leader_id, follower_id) = if rng.gen_bool(0.5) {
                (pair.flight1_id.clone(), pair.flight2_id.clone())
            } else {
                (pair.flight2_id.clone(), pair.flight1_id.clone())
            };
            out.push(EnrichedPair {
                pair: pair.clone(),
                detour_km: metrics.detour_km,
                detour_percent: metrics.detour_percent,
                overlap_duration_min: metrics.duration_min,
                formation_distance_km: metrics.formation_distance_km,
                joining_point: joining.into(),
                splitting_point: splitting.into(),
                leader_id,
                follower_id,
            });
        }
        info!("{} pairs enriched with formation metrics", out.len());
        out
    }
}

fn lerp_ms(a: i64, b: i64, frac: f64) -> i64 {
    a + ((b - a) as f64 * frac).round() as i64
}

fn seg_rect(a: &algorithm::Point, b: &algorithm::Point) -> Rect<2, f64> {
    Rect::new([a.0.min(b.0), a.1.min(b.1)], [a.0.max(b.0), a.1.max(b.1)])
}

/// 段扫描找两条折线的第一个交点
/// 用rtree对path2的段包围盒做预筛 再做真正的参数求交
/// 交点处各机的到达时间按参数在段端点时间之间线性插值
pub fn find_intersection(t1: &Trajectory, t2: &Trajectory) -> Option<IntersectionInfo> {
    let mut seg_tree = RTree::new();
    for j in 0..t2.len() - 1 {
        seg_tree.insert(seg_rect(&t2.coords[j], &t2.coords[j + 1]), j);
    }
    for i in 0..t1.len() - 1 {
        let p0 = t1.coords[i];
        let p1 = t1.coords[i + 1];
        for item in seg_tree.search(seg_rect(&p0, &p1)) {
            let j = *item.data;
            let q0 = t2.coords[j];
            let q1 = t2.coords[j + 1];
            if let Some(cross) = algorithm::segment_intersection(&p0, &p1, &q0, &q1) {
                return Some(IntersectionInfo {
                    point: cross.point,
                    s: cross.s,
                    t: cross.t,
                    time1_ms: lerp_ms(t1.times[i], t1.times[i + 1], cross.s),
                    time2_ms: lerp_ms(t2.times[j], t2.times[j + 1], cross.t),
                });
            }
        }
    }
    None
}

// 在path上找距p最近的点 只探测每段的两个端点和中点
// 不做垂足投影 这是沿用旧结果的已知近似 升级会改变在编判定
fn closest_point_on_path(p: &algorithm::Point, path: &[algorithm::Point]) -> (f64, algorithm::Point, usize) {
    let mut best = (f64::MAX, path[0], 0usize);
    for j in 0..path.len() - 1 {
        let mid = algorithm::midpoint(&path[j], &path[j + 1]);
        for (q, idx) in [(path[j], j), (path[j + 1], j + 1), (mid, j)] {
            let d = algorithm::haversine_km(p, &q);
            if d < best.0 {
                best = (d, q, idx);
            }
        }
    }
    best
}

fn keep_longest(best: &mut Option<(FormationSegment, i64)>, run: FormationSegment, t1: &Trajectory) {
    let duration = t1.times[run.end1] - t1.times[run.start1];
    match best {
        Some((_, best_duration)) if *best_duration >= duration => {}
        _ => *best = Some((run, duration)),
    }
}

/// 提取编队段
/// 对path1的每个点找path2上的最近点 两点到其中点的距离都不超过
/// max_detour_km/2 记为在编 连续在编的游程里取path1侧时长最大的
/// 找不到任何游程返回None 调用方按未匹配处理而不是错误
pub fn extract_formation(t1: &Trajectory, t2: &Trajectory, max_detour_km: f64) -> Option<FormationSegment> {
    let half = max_detour_km / 2.0;
    let mut best: Option<(FormationSegment, i64)> = None;
    let mut run: Option<FormationSegment> = None;
    for (i, p) in t1.coords.iter().enumerate() {
        let (_, q, j) = closest_point_on_path(p, &t2.coords);
        let mid = algorithm::midpoint(p, &q);
        let in_formation =
            algorithm::haversine_km(p, &mid) <= half && algorithm::haversine_km(&q, &mid) <= half;
        if in_formation {
            run = Some(match run {
                None => FormationSegment {
                    start1: i,
                    end1: i,
                    start2: j,
                    end2: j,
                },
                Some(r) => FormationSegment {
                    start1: r.start1,
                    end1: i,
                    start2: r.start2.min(j),
                    end2: r.end2.max(j),
                },
            });
        } else if let Some(r) = run.take() {
            keep_longest(&mut best, r, t1);
        }
    }
    if let Some(r) = run.take() {
        keep_longest(&mut best, r, t1);
    }
    best.map(|(seg, _)| seg)
}

/// 由编队段推导指标
/// 编队距离取两条切片路径长的平均 直线距离取两端中点间的大圆距离
pub fn pair_metrics(t1: &Trajectory, t2: &Trajectory, seg: &FormationSegment) -> PairMetrics {
    let len1 = t1.cum_dist[seg.end1] - t1.cum_dist[seg.start1];
    let len2 = t2.cum_dist[seg.end2] - t2.cum_dist[seg.start2];
    let formation_distance_km = (len1 + len2) / 2.0;
    let joining = algorithm::midpoint(&t1.coords[seg.start1], &t2.coords[seg.start2]);
    let splitting = algorithm::midpoint(&t1.coords[seg.end1], &t2.coords[seg.end2]);
    let direct_distance_km = algorithm::haversine_km(&joining, &splitting);
    let detour_km = formation_distance_km - direct_distance_km;
    let detour_percent = if direct_distance_km == 0.0 {
        0.0
    } else {
        100.0 * detour_km / direct_distance_km
    };
    let duration_min = (t1.times[seg.end1] - t1.times[seg.start1]) as f64 / 60_000.0;
    PairMetrics {
        formation_distance_km,
        direct_distance_km,
        detour_km,
        detour_percent,
        duration_min,
    }
}