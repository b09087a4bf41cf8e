use crate::algorithm;
use crate::fm::traj::Trajectory;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/**
 * @file bucket.rs
 * 轨迹仓库和时空网格桶索引
 * 一次匹配运行期间持有全部轨迹, 运行结束即丢弃。
 */

/// (lat, lon, time) 三维网格的桶键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub lat_idx: i32,
    pub lon_idx: i32,
    pub time_idx: i64,
}

pub struct TrajIndex {
    trajs_index: HashMap<String, usize>, // flight_id对应的索引
    pub trajs: Vec<Trajectory>,          // 所有的轨迹
    buckets: HashMap<BucketKey, HashSet<usize>>,
    grid_deg: f64,
    time_bin_ms: i64,
}

impl TrajIndex {
    pub fn new(grid_deg: f64, time_bin_ms: i64) -> Self {
        TrajIndex {
            trajs_index: HashMap::new(),
            trajs: Vec::new(),
            buckets: HashMap::new(),
            grid_deg,
            time_bin_ms,
        }
    }

    pub fn bucket_key(&self, p: &algorithm::Point, time_ms: i64) -> BucketKey {
        BucketKey {
            lat_idx: (p.1 / self.grid_deg).floor() as i32,
            lon_idx: (p.0 / self.grid_deg).floor() as i32,
            time_idx: time_ms.div_euclid(self.time_bin_ms),
        }
    }

    /// 添加一条轨迹并按下采样写桶
    /// 步长 max(1, n/50) 限制稠密折线的插入成本 首末点强制入桶
    pub fn add_traj(&mut self, traj: Trajectory) -> Result<usize> {
        if self.trajs_index.contains_key(&traj.flight_id) {
            return Err(anyhow::anyhow!("flight {} already indexed", traj.flight_id));
        }
        let index = self.trajs.len();
        let n = traj.len();
        let stride = std::cmp::max(1, n / 50);
        let mut i = 0;
        while i < n {
            self.insert_bucket(&traj, i, index);
            i += stride;
        }
        self.insert_bucket(&traj, 0, index);
        self.insert_bucket(&traj, n - 1, index);
        self.trajs_index.insert(traj.flight_id.clone(), index);
        self.trajs.push(traj);
        Ok(index)
    }

    // 桶内是集合 同一航班重复命中同一个桶只记一次
    fn insert_bucket(&mut self, traj: &Trajectory, i: usize, index: usize) {
        let key = self.bucket_key(&traj.coords[i], traj.times[i]);
        self.buckets.entry(key).or_default().insert(index);
    }

    pub fn find_traj_by_id(&self, id: &str) -> Option<usize> {
        self.trajs_index.get(id).copied()
    }

    pub fn find_traj_by_index(&self, index: usize) -> Option<&Trajectory> {
        self.trajs.get(index)
    }

    pub fn traj_count(&self) -> usize {
        self.trajs.len()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &HashSet<usize>> {
        self.buckets.values()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
