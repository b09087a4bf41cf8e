use crate::algorithm;
use anyhow::Result;
use log::warn;
use serde::Deserialize;

/// 轨迹源的一行记录 按 (flight_id, timestamp) 排序输入
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    pub flight_id: String,
    pub timestamp: i64, // epoch ms
    pub lat: f64,
    pub lon: f64,
}

/// 单个航班的轨迹
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub flight_id: String,
    pub coords: Vec<algorithm::Point>, // (lon, lat)
    pub times: Vec<i64>,               // epoch ms
    pub cum_dist: Vec<f64>,            // 累积距离 km
}

impl Trajectory {
    /// 校验并构建轨迹 坐标越界和时间倒退的点丢弃 点数不足2返回None
    pub fn from_points(flight_id: String, points: Vec<(algorithm::Point, i64)>) -> Option<Trajectory> {
        let mut coords: Vec<algorithm::Point> = Vec::with_capacity(points.len());
        let mut times: Vec<i64> = Vec::with_capacity(points.len());
        for (p, t) in points {
            if p.1 < -90.0 || p.1 > 90.0 || p.0 < -180.0 || p.0 > 180.0 {
                warn!("skip out of range point ({}, {}) flight {}", p.0, p.1, flight_id);
                continue;
            }
            if let Some(&last) = times.last() {
                if t < last {
                    warn!("skip out of order point at {} flight {}", t, flight_id);
                    continue;
                }
            }
            coords.push(p);
            times.push(t);
        }
        if coords.len() < 2 {
            warn!("skip flight {} with {} usable points", flight_id, coords.len());
            return None;
        }
        let cum_dist = algorithm::cumulative_distance(&coords);
        Some(Trajectory {
            flight_id,
            coords,
            times,
            cum_dist,
        })
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// 首末点连线的整体航向
    pub fn overall_bearing(&self) -> f64 {
        algorithm::bearing_deg(&self.coords[0], &self.coords[self.coords.len() - 1])
    }
}

pub struct MultiTrajectory {
    pub trajs: Vec<Trajectory>,
}

/// 把按 (flight_id, timestamp) 排序的记录流按航班切分成轨迹
/// 任意时刻只保留当前航班的缓冲 坏记录跳过不中断
pub struct TrajStream<I>
where
    I: Iterator<Item = Result<TrackRecord>>,
{
    records: I,
    cur_id: Option<String>,
    buf: Vec<(algorithm::Point, i64)>,
}

impl<I> TrajStream<I>
where
    I: Iterator<Item = Result<TrackRecord>>,
{
    pub fn new(records: I) -> Self {
        TrajStream {
            records,
            cur_id: None,
            buf: Vec::new(),
        }
    }
}

impl<I> Iterator for TrajStream<I>
where
    I: Iterator<Item = Result<TrackRecord>>,
{
    type Item = Trajectory;

    fn next(&mut self) -> Option<Trajectory> {
        loop {
            let rec = match self.records.next() {
                Some(Ok(rec)) => rec,
                Some(Err(err)) => {
                    warn!("skip unreadable record: {}", err);
                    continue;
                }
                None => {
                    // 输入结束 冲刷最后一个航班
                    let id = self.cur_id.take()?;
                    let buf = std::mem::take(&mut self.buf);
                    match Trajectory::from_points(id, buf) {
                        Some(traj) => return Some(traj),
                        None => return None,
                    }
                }
            };
            if self.cur_id.as_deref() == Some(rec.flight_id.as_str()) {
                self.buf.push((algorithm::Point(rec.lon, rec.lat), rec.timestamp));
                continue;
            }
            // 航班切换 结算上一个缓冲
            let prev_id = self.cur_id.replace(rec.flight_id.clone());
            let prev_buf = std::mem::take(&mut self.buf);
            self.buf.push((algorithm::Point(rec.lon, rec.lat), rec.timestamp));
            if let Some(id) = prev_id {
                if let Some(traj) = Trajectory::from_points(id, prev_buf) {
                    return Some(traj);
                }
            }
        }
    }
}

fn feature_trajectory(
    seq: usize,
    geometry: Option<geojson::Geometry>,
    properties: Option<geojson::JsonObject>,
) -> Option<Trajectory> {
    let geometry = match geometry {
        Some(g) => g,
        None => {
            warn!("skip feature without geometry");
            return None;
        }
    };
    let positions = match geometry.value {
        geojson::Value::LineString(line) => line,
        geojson::Value::MultiPoint(multi_points) => multi_points,
        _ => {
            warn!("skip feature, geometry only support LineString, MultiPoint");
            return None;
        }
    };
    let flight_id = properties
        .as_ref()
        .and_then(|props| props.get("flight_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("traj-{}", seq));
    // timestamps 属性缺失时退化成下标时间
    let stamps: Option<Vec<i64>> = properties
        .as_ref()
        .and_then(|props| props.get("timestamps"))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_i64()).collect());
    let points = positions
        .into_iter()
        .enumerate()
        .filter_map(|(i, pos)| {
            if pos.len() < 2 {
                warn!("skip malformed position in feature {}", seq);
                return None;
            }
            let time_stamp = stamps
                .as_ref()
                .and_then(|s| s.get(i).copied())
                .unwrap_or(i as i64);
            Some((algorithm::Point(pos[0], pos[1]), time_stamp))
        })
        .collect();
    Trajectory::from_points(flight_id, points)
}

// 实现轨迹转换trait
impl TryFrom<geojson::GeoJson> for MultiTrajectory {
    type Error = anyhow::Error;
    fn try_from(value: geojson::GeoJson) -> Result<Self, Self::Error> {
        let mut trajs = MultiTrajectory { trajs: Vec::new() };
        match value {
            geojson::GeoJson::FeatureCollection(fc) => {
                for (i, feature) in fc.features.into_iter().enumerate() {
                    if let Some(traj) = feature_trajectory(i, feature.geometry, feature.properties) {
                        trajs.trajs.push(traj);
                    }
                }
            }
            geojson::GeoJson::Feature(feature) => {
                if let Some(traj) = feature_trajectory(0, feature.geometry, feature.properties) {
                    trajs.trajs.push(traj);
                }
            }
            geojson::GeoJson::Geometry(geom) => {
                if let Some(traj) = feature_trajectory(0, Some(geom), None) {
                    trajs.trajs.push(traj);
                }
            }
        }
        Ok(trajs)
    }
}

fn wkt_line_trajectory(seq: usize, line: wkt::types::LineString<f64>) -> Option<Trajectory> {
    let points = line
        .0
        .into_iter()
        .enumerate()
        .map(|(i, coord)| (algorithm::Point(coord.x, coord.y), i as i64))
        .collect();
    Trajectory::from_points(format!("traj-{}", seq), points)
}

impl TryFrom<wkt::Wkt<f64>> for MultiTrajectory {
    type Error = anyhow::Error;
    fn try_from(value: wkt::Wkt<f64>) -> Result<Self, Self::Error> {
        let mut trajs = MultiTrajectory { trajs: Vec::new() };
        match value.item {
            wkt::Geometry::LineString(line) => {
                if let Some(traj) = wkt_line_trajectory(0, line) {
                    trajs.trajs.push(traj);
                }
            }
            wkt::Geometry::MultiLineString(lines) => {
                for (i, line) in lines.0.into_iter().enumerate() {
                    if let Some(traj) = wkt_line_trajectory(i, line) {
                        trajs.trajs.push(traj);
                    }
                }
            }
            _ => {
                return Err(anyhow::anyhow!("wkt only support LineString, MultiLineString"));
            }
        }
        Ok(trajs)
    }
}
