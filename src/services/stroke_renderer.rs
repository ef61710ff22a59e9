//! 笔画渲染 - 业务能力层
//!
//! 持有主表面和临时叠加层两块表面：
//! - 绘制过程中的线段画在叠加层，笔画结束时整体清除
//! - 完成的路径画在主表面，多笔之间不清除
//!
//! 两种绘制都先乘以设备像素比，保证实时反馈和最终结果重合。

use crate::infrastructure::{LineStyle, Surface, SurfaceImage, Transform};
use crate::models::{Path, Point};

pub struct StrokeRenderer<S: Surface> {
    surface: S,
    overlay: S,
    style: LineStyle,
}

impl<S: Surface> StrokeRenderer<S> {
    pub fn new(surface: S, overlay: S, line_width: f64) -> Self {
        Self {
            surface,
            overlay,
            style: LineStyle::pen(line_width),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn overlay(&self) -> &S {
        &self.overlay
    }

    pub fn style(&self) -> &LineStyle {
        &self.style
    }

    /// 主表面的逻辑宽度（像素宽度 / 设备像素比）
    pub fn logical_size(&self) -> f64 {
        let (width, _) = self.surface.pixel_size();
        width as f64 / self.surface.pixel_ratio()
    }

    /// 回放时的缩放系数：`当前尺寸 / 记录时尺寸`
    pub fn scale_for(&self, original_size: Option<f64>) -> f64 {
        match original_size {
            Some(size) if size > 0.0 => self.logical_size() / size,
            _ => 1.0,
        }
    }

    /// 在叠加层上画一段实时线段
    pub fn link_temp_path(&mut self, from: Point, to: Point) {
        let style = self.style;
        with_device_scale(&mut self.overlay, |overlay| {
            overlay.stroke_polyline(&[from, to], &style);
        });
    }

    pub fn clear_overlay(&mut self) {
        clear_surface(&mut self.overlay);
    }

    /// 清空主表面
    pub fn clear(&mut self) {
        clear_surface(&mut self.surface);
    }

    /// 在主表面上画完整路径
    ///
    /// # 参数
    /// - `path`: 路径
    /// - `original_size`: 路径记录时的画布尺寸，`None` 表示不缩放
    pub fn draw_path(&mut self, path: &Path, original_size: Option<f64>) {
        if path.is_empty() {
            return;
        }
        let scale = self.scale_for(original_size);
        let points = if scale == 1.0 {
            path.points().to_vec()
        } else {
            path.scaled(scale).points().to_vec()
        };
        let style = self.style;
        with_device_scale(&mut self.surface, |surface| {
            surface.stroke_polyline(&points, &style);
        });
    }

    pub fn snapshot(&self) -> SurfaceImage {
        self.surface.snapshot()
    }
}

fn with_device_scale<S: Surface>(surface: &mut S, draw: impl FnOnce(&mut S)) {
    let saved = surface.transform();
    let ratio = surface.pixel_ratio();
    surface.set_transform(saved.scale(ratio, ratio));
    draw(surface);
    surface.set_transform(saved);
}

/// 先重置变换再清除整块表面，避免残留变换导致只清掉一部分
fn clear_surface<S: Surface>(surface: &mut S) {
    let saved = surface.transform();
    surface.set_transform(Transform::IDENTITY);
    let (width, height) = surface.pixel_size();
    surface.clear_rect(0.0, 0.0, width as f64, height as f64);
    surface.set_transform(saved);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 记录所有绘制调用的表面
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        Stroke { points: Vec<Point>, transform: Transform },
        Clear { rect: [f64; 4], transform: Transform },
    }

    pub(crate) struct RecordingSurface {
        pub size: (u32, u32),
        pub ratio: f64,
        pub transform: Transform,
        pub ops: Vec<Op>,
    }

    impl RecordingSurface {
        pub fn new(width: u32, height: u32, ratio: f64) -> Self {
            Self {
                size: (width, height),
                ratio,
                transform: Transform::IDENTITY,
                ops: Vec::new(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn pixel_size(&self) -> (u32, u32) {
            self.size
        }

        fn pixel_ratio(&self) -> f64 {
            self.ratio
        }

        fn transform(&self) -> Transform {
            self.transform
        }

        fn set_transform(&mut self, transform: Transform) {
            self.transform = transform;
        }

        fn stroke_polyline(&mut self, points: &[Point], _style: &LineStyle) {
            self.ops.push(Op::Stroke {
                points: points.to_vec(),
                transform: self.transform,
            });
        }

        fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
            self.ops.push(Op::Clear {
                rect: [x, y, width, height],
                transform: self.transform,
            });
        }

        fn snapshot(&self) -> SurfaceImage {
            SurfaceImage::blank(self.size.0, self.size.1)
        }
    }

    fn renderer(ratio: f64) -> StrokeRenderer<RecordingSurface> {
        StrokeRenderer::new(
            RecordingSurface::new(400, 400, ratio),
            RecordingSurface::new(400, 400, ratio),
            2.0,
        )
    }

    #[test]
    fn test_draw_path_rescales_to_current_size() {
        let mut r = renderer(2.0);
        assert_eq!(r.logical_size(), 200.0);

        let path = Path::new(vec![Point::new(10.0, 20.0), Point::new(50.0, 50.0)]);
        r.draw_path(&path, Some(100.0));

        assert_eq!(
            r.surface().ops,
            vec![Op::Stroke {
                points: vec![Point::new(20.0, 40.0), Point::new(100.0, 100.0)],
                transform: Transform::IDENTITY.scale(2.0, 2.0),
            }]
        );
        // 绘制后恢复原变换
        assert_eq!(r.surface().transform, Transform::IDENTITY);
    }

    #[test]
    fn test_no_scaling_without_or_with_equal_original_size() {
        let mut r = renderer(1.0);
        let path = Path::new(vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
        r.draw_path(&path, None);
        r.draw_path(&path, Some(400.0));

        for op in &r.surface().ops {
            let Op::Stroke { points, .. } = op else { panic!("unexpected {:?}", op) };
            assert_eq!(points, path.points());
        }
        assert_eq!(r.surface().ops.len(), 2);
    }

    #[test]
    fn test_clear_resets_transform_first() {
        let mut r = renderer(2.0);
        let leftover = Transform::IDENTITY.scale(3.0, 3.0);
        r.surface.set_transform(leftover);

        r.clear();

        assert_eq!(
            r.surface().ops,
            vec![Op::Clear {
                rect: [0.0, 0.0, 400.0, 400.0],
                transform: Transform::IDENTITY,
            }]
        );
        assert_eq!(r.surface().transform, leftover);
    }

    #[test]
    fn test_live_segments_use_same_device_scale() {
        let mut r = renderer(1.5);
        r.link_temp_path(Point::new(0.0, 0.0), Point::new(4.0, 4.0));
        r.clear_overlay();

        assert_eq!(r.overlay().ops.len(), 2);
        assert_eq!(
            r.overlay().ops[0],
            Op::Stroke {
                points: vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)],
                transform: Transform::IDENTITY.scale(1.5, 1.5),
            }
        );
        assert!(r.surface().ops.is_empty());
    }
}
