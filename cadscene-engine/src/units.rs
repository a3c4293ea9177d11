//! CAD 坐标到渲染坐标的换算：轴交换 (x, y, z) → (x, z, y)，再乘以单位比例。

use cadscene_core::document::Units;
use cadscene_core::geometry::{Point2, Point3};
use glam::DVec3;
use tracing::warn;

/// 图纸单位到渲染单位（米）的比例；未支持的单位返回 0。
pub fn unit_scale(units: Units) -> f64 {
    match units {
        Units::Millimeters => 0.001,
        Units::Centimeters => 0.01,
        Units::Meters => 1.0,
        Units::Kilometers => 1000.0,
        _ => 0.0,
    }
}

/// 绘制时实际使用的比例：0 会让所有几何退化到原点，因此回退为 1。
pub fn effective_unit_scale(units: Units) -> f64 {
    let scale = unit_scale(units);
    if scale == 0.0 {
        warn!(units = ?units, code = units.code(), "图纸单位不受支持，按 1:1 绘制");
        1.0
    } else {
        scale
    }
}

#[inline]
pub fn to_render_point(point: Point3) -> DVec3 {
    DVec3::new(point.x(), point.z(), point.y())
}

/// 二维点位于渲染平面上，高度为 0。
#[inline]
pub fn to_render_point2(point: Point2) -> DVec3 {
    DVec3::new(point.x(), 0.0, point.y())
}

#[inline]
pub fn transform_point(point: Point3, unit_scale: f64) -> DVec3 {
    to_render_point(point) * unit_scale
}

#[inline]
pub fn transform_point2(point: Point2, unit_scale: f64) -> DVec3 {
    to_render_point2(point) * unit_scale
}
