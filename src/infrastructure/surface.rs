//! 绘图表面 - 基础设施层
//!
//! 只描述"可以在上面画线、清除、截图"的二维区域，以及它在页面中的位置

use crate::models::Point;

/// 仿射变换（只含缩放与平移）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// 在当前变换之后追加缩放（先缩放点，再应用当前变换）
    pub fn scale(self, sx: f64, sy: f64) -> Self {
        Self {
            scale_x: self.scale_x * sx,
            scale_y: self.scale_y * sy,
            ..self
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale_x + self.translate_x,
            point.y * self.scale_y + self.translate_y,
        )
    }

    /// 线宽等长度量的平均缩放系数
    pub fn mean_scale(&self) -> f64 {
        (self.scale_x.abs() + self.scale_y.abs()) / 2.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
}

/// 线条样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    /// 灰度值，0 为黑
    pub ink: u8,
}

impl LineStyle {
    pub fn pen(width: f64) -> Self {
        Self {
            width,
            cap: LineCap::Round,
            join: LineJoin::Round,
            ink: 0,
        }
    }
}

impl Default for LineStyle {
    fn default() -> Self {
        Self::pen(2.0)
    }
}

/// 表面截图：8 位灰度，按行存储，255 为白
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SurfaceImage {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![u8::MAX; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// 深色像素数量
    pub fn ink_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p < 128).count()
    }
}

/// 可绘制的二维表面
///
/// 坐标经当前变换后以像素为单位；`pixel_ratio` 对应设备像素比
pub trait Surface: Send {
    fn pixel_size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f64;

    fn transform(&self) -> Transform;

    fn set_transform(&mut self, transform: Transform);

    fn stroke_polyline(&mut self, points: &[Point], style: &LineStyle);

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    fn snapshot(&self) -> SurfaceImage;
}

/// 表面在页面中的布局信息
pub trait SurfaceLayout: Send + Sync {
    /// 从表面自身开始，沿定位祖先链向上的偏移量
    fn ancestor_offsets(&self) -> Vec<Point>;

    /// 页面当前滚动偏移
    fn scroll_offset(&self) -> Point;
}

/// 表面左上角相对于视口的位置：祖先偏移之和减去滚动偏移
pub fn page_offset(layout: &dyn SurfaceLayout) -> Point {
    let (x, y) = layout
        .ancestor_offsets()
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point::new(x, y).relative_to(layout.scroll_offset())
}

/// 固定位置、不滚动的布局
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLayout {
    pub offset: Point,
}

impl FixedLayout {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
        }
    }
}

impl SurfaceLayout for FixedLayout {
    fn ancestor_offsets(&self) -> Vec<Point> {
        vec![self.offset]
    }

    fn scroll_offset(&self) -> Point {
        Point::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nested;

    impl SurfaceLayout for Nested {
        fn ancestor_offsets(&self) -> Vec<Point> {
            vec![Point::new(10.0, 5.0), Point::new(100.0, 200.0)]
        }

        fn scroll_offset(&self) -> Point {
            Point::new(0.0, 50.0)
        }
    }

    #[test]
    fn test_page_offset_walks_chain_and_subtracts_scroll() {
        assert_eq!(page_offset(&Nested), Point::new(110.0, 155.0));
        assert_eq!(page_offset(&FixedLayout::new(3.0, 4.0)), Point::new(3.0, 4.0));
    }

    #[test]
    fn test_scale_composes() {
        let t = Transform::IDENTITY.scale(2.0, 2.0).scale(1.5, 1.5);
        assert_eq!(t.apply(Point::new(1.0, 2.0)), Point::new(3.0, 6.0));
    }
}
