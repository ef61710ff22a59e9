//! 内存灰度位图表面
//!
//! 用圆形笔刷沿线段盖章的方式画线，天然得到圆角的端点和拐角

use crate::infrastructure::surface::{LineCap, LineStyle, Surface, SurfaceImage, Transform};
use crate::models::Point;

pub struct RasterSurface {
    image: SurfaceImage,
    pixel_ratio: f64,
    transform: Transform,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32, pixel_ratio: f64) -> Self {
        Self {
            image: SurfaceImage::blank(width, height),
            pixel_ratio,
            transform: Transform::IDENTITY,
        }
    }

    /// 按逻辑尺寸创建正方形表面
    pub fn square(logical_size: f64, pixel_ratio: f64) -> Self {
        let side = (logical_size * pixel_ratio).round().max(1.0) as u32;
        Self::new(side, side, pixel_ratio)
    }

    fn stamp(&mut self, center: Point, radius: f64, ink: u8) {
        let r = radius.max(0.5);
        let min_x = (center.x - r).floor().max(0.0) as i64;
        let max_x = (center.x + r).ceil().min(self.image.width as f64 - 1.0) as i64;
        let min_y = (center.y - r).floor().max(0.0) as i64;
        let max_y = (center.y + r).ceil().min(self.image.height as f64 - 1.0) as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f64 + 0.5 - center.x;
                let dy = y as f64 + 0.5 - center.y;
                if dx * dx + dy * dy <= r * r {
                    let idx = y as usize * self.image.width as usize + x as usize;
                    self.image.pixels[idx] = self.image.pixels[idx].min(ink);
                }
            }
        }
    }

    fn stamp_segment(&mut self, from: Point, to: Point, radius: f64, ink: u8) {
        let length = ((to.x - from.x).powi(2) + (to.y - from.y).powi(2)).sqrt();
        let steps = (length / 0.5).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let p = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
            self.stamp(p, radius, ink);
        }
    }
}

impl Surface for RasterSurface {
    fn pixel_size(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn transform(&self) -> Transform {
        self.transform
    }

    fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn stroke_polyline(&mut self, points: &[Point], style: &LineStyle) {
        let radius = style.width * self.transform.mean_scale() / 2.0;
        let mapped: Vec<Point> = points.iter().map(|p| self.transform.apply(*p)).collect();

        match mapped.as_slice() {
            [] => {}
            [only] => {
                if style.cap == LineCap::Round {
                    self.stamp(*only, radius, style.ink);
                }
            }
            _ => {
                for pair in mapped.windows(2) {
                    self.stamp_segment(pair[0], pair[1], radius, style.ink);
                }
            }
        }
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let a = self.transform.apply(Point::new(x, y));
        let b = self.transform.apply(Point::new(x + width, y + height));
        let x0 = a.x.min(b.x).floor().max(0.0) as u32;
        let y0 = a.y.min(b.y).floor().max(0.0) as u32;
        let x1 = (a.x.max(b.x).ceil().max(0.0) as u32).min(self.image.width);
        let y1 = (a.y.max(b.y).ceil().max(0.0) as u32).min(self.image.height);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for row in y0..y1 {
            let start = (row * self.image.width + x0) as usize;
            let end = (row * self.image.width + x1) as usize;
            self.image.pixels[start..end].fill(u8::MAX);
        }
    }

    fn snapshot(&self) -> SurfaceImage {
        self.image.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_leaves_ink() {
        let mut surface = RasterSurface::new(20, 20, 1.0);
        surface.stroke_polyline(&[Point::new(2.0, 10.0), Point::new(18.0, 10.0)], &LineStyle::pen(2.0));

        let image = surface.snapshot();
        assert_eq!(image.get(10, 10), Some(0));
        assert_eq!(image.get(10, 2), Some(255));
    }

    #[test]
    fn test_clear_rect_respects_transform() {
        let mut surface = RasterSurface::new(20, 20, 1.0);
        surface.stroke_polyline(&[Point::new(0.0, 15.0), Point::new(20.0, 15.0)], &LineStyle::pen(2.0));

        // 缩放 0.5 时清除 (0,0,20,20) 只覆盖左上四分之一
        surface.set_transform(Transform::IDENTITY.scale(0.5, 0.5));
        surface.clear_rect(0.0, 0.0, 20.0, 20.0);
        assert!(surface.snapshot().ink_pixel_count() > 0);

        surface.set_transform(Transform::IDENTITY);
        surface.clear_rect(0.0, 0.0, 20.0, 20.0);
        assert_eq!(surface.snapshot().ink_pixel_count(), 0);
    }
}
