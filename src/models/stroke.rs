//! 笔画数据模型
//!
//! 坐标统一使用画布本地坐标系，持久化格式为 `[x, y]`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 画布上的一个点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// 返回 `self - origin`
    pub fn relative_to(self, origin: Point) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// 输入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Mouse,
    Touch,
}

/// 一次完成的笔画路径
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Point>);

impl Path {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.0.iter()
    }

    /// 按比例缩放所有点
    pub fn scaled(&self, factor: f64) -> Self {
        self.0.iter().map(|p| p.scaled(factor)).collect()
    }
}

impl From<Vec<Point>> for Path {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Path {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 正在绘制的笔画
///
/// 从按下到抬起之间按时间顺序收集的点
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    modality: Modality,
    started_at: DateTime<Utc>,
    points: Vec<Point>,
}

impl Stroke {
    pub fn begin(modality: Modality, first: Point) -> Self {
        Self {
            modality,
            started_at: Utc::now(),
            points: vec![first],
        }
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 结束笔画。少于两个点的笔画不构成路径
    pub fn finalize(self) -> Option<Path> {
        if self.points.len() > 1 {
            Some(Path(self.points))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");

        let back: Point = serde_json::from_str("[3,4]").unwrap();
        assert_eq!(back, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_single_point_stroke_has_no_path() {
        let stroke = Stroke::begin(Modality::Mouse, Point::new(1.0, 1.0));
        assert_eq!(stroke.finalize(), None);
    }

    #[test]
    fn test_finalize_keeps_order() {
        let mut stroke = Stroke::begin(Modality::Touch, Point::new(0.0, 0.0));
        stroke.push(Point::new(1.0, 2.0));
        stroke.push(Point::new(3.0, 4.0));

        let path = stroke.finalize().unwrap();
        assert_eq!(
            path.points(),
            &[Point::new(0.0, 0.0), Point::new(1.0, 2.0), Point::new(3.0, 4.0)]
        );
    }
}
