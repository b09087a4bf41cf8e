use geo::algorithm::bearing::Bearing;
use geo::algorithm::haversine_distance::HaversineDistance;

/// 经纬度坐标点 (lon, lat)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point(pub f64, pub f64);

/// 线段求交的结果 s t 是两条线段上的参数
#[derive(Debug, Clone, Copy)]
pub struct SegmentCross {
    pub point: Point,
    pub s: f64,
    pub t: f64,
}

/// 计算两点间的半正弦距离 单位km
pub fn haversine_km(a: &Point, b: &Point) -> f64 {
    use geo::Point;
    Point::new(a.0, a.1).haversine_distance(&Point::new(b.0, b.1)) / 1000.0
}

/// 首点指向末点的初始航向角 正北为0 顺时针 [0, 360)
pub fn bearing_deg(a: &Point, b: &Point) -> f64 {
    use geo::Point;
    let deg = Point::new(a.0, a.1).bearing(Point::new(b.0, b.1));
    (deg + 360.0) % 360.0
}

/// 两个航向角的夹角 处理 0/360 环绕
pub fn angle_diff(b1: f64, b2: f64) -> f64 {
    let d = (b1 - b2).abs();
    d.min(360.0 - d)
}

pub fn angle_close(b1: f64, b2: f64, tolerance: f64) -> bool {
    angle_diff(b1, b2) <= tolerance
}

/// 参数法线段求交 先做包围盒短路 再解2x2线性方程组
/// 行列式接近0视为平行 s t 不在[0,1]内视为不相交
pub fn segment_intersection(p0: &Point, p1: &Point, q0: &Point, q1: &Point) -> Option<SegmentCross> {
    // 包围盒不重叠直接返回 避免无谓的求解
    if p0.0.max(p1.0) < q0.0.min(q1.0)
        || q0.0.max(q1.0) < p0.0.min(p1.0)
        || p0.1.max(p1.1) < q0.1.min(q1.1)
        || q0.1.max(q1.1) < p0.1.min(p1.1)
    {
        return None;
    }
    let dx1 = p1.0 - p0.0;
    let dy1 = p1.1 - p0.1;
    let dx2 = q1.0 - q0.0;
    let dy2 = q1.1 - q0.1;
    let det = dx1 * dy2 - dy1 * dx2;
    if det.abs() < 1e-10 {
        return None;
    }
    let ex = q0.0 - p0.0;
    let ey = q0.1 - p0.1;
    let s = (ex * dy2 - ey * dx2) / det;
    let t = (ex * dy1 - ey * dx1) / det;
    if !(0.0..=1.0).contains(&s) || !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some(SegmentCross {
        point: Point(p0.0 + s * dx1, p0.1 + s * dy1),
        s,
        t,
    })
}

/// 两点的算术中点 与编队判定使用同一种平面近似
pub fn midpoint(a: &Point, b: &Point) -> Point {
    Point((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// 折线的累积半正弦距离 cum[0]=0 单位km
pub fn cumulative_distance(coords: &[Point]) -> Vec<f64> {
    if coords.is_empty() {
        return Vec::new();
    }
    let mut cum = Vec::with_capacity(coords.len());
    let mut total = 0.0;
    cum.push(0.0);
    let line1 = &coords[0..coords.len() - 1];
    let line2 = &coords[1..coords.len()];
    for (p1, p2) in line1.iter().zip(line2.iter()) {
        total += haversine_km(p1, p2);
        cum.push(total);
    }
    cum
}
