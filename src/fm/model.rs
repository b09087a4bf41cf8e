use crate::algorithm;
use serde::{Deserialize, Serialize};

/**
 * 定义编队匹配需要的一些结构体
 * */

/// 一次匹配运行的全部阈值
#[derive(Clone, Debug)]
pub struct Config {
    pub grid_deg: f64,         // 空间网格边长 度
    pub time_bin_hrs: f64,     // 时间网格 小时
    pub angle_tolerance: f64,  // 航向差上限 度
    pub max_time_gap_min: f64, // 交点处到达时间差上限 分钟
    pub max_detour_km: f64,    // 编队绕行上限 km
    pub min_duration_min: f64, // 编队段最短时长 分钟
    pub limit: usize,          // 输出的编队对上限
    pub max_pairs: usize,      // 候选对全局上限
}

impl Default for Config {
    fn default() -> Self {
        Config {
            grid_deg: 4.5,
            time_bin_hrs: 6.0,
            angle_tolerance: 15.0,
            max_time_gap_min: 360.0,
            max_detour_km: 100.0,
            min_duration_min: 0.0,
            limit: 1000,
            max_pairs: 50000,
        }
    }
}

impl Config {
    pub fn time_bin_ms(&self) -> i64 {
        (self.time_bin_hrs * 3600.0 * 1000.0) as i64
    }
}

/// 两条折线的首个交点及两机各自的插值到达时间
#[derive(Clone, Copy, Debug)]
pub struct IntersectionInfo {
    pub point: algorithm::Point,
    pub s: f64,
    pub t: f64,
    pub time1_ms: i64,
    pub time2_ms: i64,
}

/// 编队段在两条轨迹上的索引范围
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormationSegment {
    pub start1: usize,
    pub end1: usize,
    pub start2: usize,
    pub end2: usize,
}

/// 由编队段推导出的指标
#[derive(Clone, Copy, Debug)]
pub struct PairMetrics {
    pub formation_distance_km: f64,
    pub direct_distance_km: f64,
    pub detour_km: f64,
    pub detour_percent: f64,
    pub duration_min: f64,
}

/// 序列化边界使用的坐标形式
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl From<algorithm::Point> for GeoPos {
    fn from(p: algorithm::Point) -> Self {
        GeoPos { lat: p.1, lon: p.0 }
    }
}

/// 通过三级过滤的航班对 落盘记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchedPair {
    pub flight1_id: String,
    pub flight2_id: String,
    pub angle_diff: f64,
    pub time_gap_minutes: f64,
    pub intersection_point: GeoPos,
    pub intersect_time_1: i64,
    pub intersect_time_2: i64,
    pub created_at: i64,
}

/// 附加了编队段指标的航班对 落盘记录
/// leader/follower 只是随机指派 没有物理含义
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnrichedPair {
    #[serde(flatten)]
    pub pair: MatchedPair,
    pub detour_km: f64,
    pub detour_percent: f64,
    pub overlap_duration_min: f64,
    pub formation_distance_km: f64,
    pub joining_point: GeoPos,
    pub splitting_point: GeoPos,
    pub leader_id: String,
    pub follower_id: String,
}

/// 一次匹配运行的结果
pub struct MatchReport {
    pub pairs: Vec<MatchedPair>,
    pub candidates_seen: usize,
    pub truncated: bool, // 候选生成是否因全局上限被截断
}
