use std::f64::consts::TAU;

use cadscene_config::settings::DEFAULT_CURVE_SEGMENT;
use cadscene_core::document::{Entity, EntityKind};
use glam::DVec3;

use super::{GenerateParams, expect_kind, spawn_polyline};
use crate::errors::DrawError;
use crate::scene::{NodeId, SceneGraph};
use crate::units::transform_point;

#[inline]
fn curve_point(center: DVec3, radius: f64, angle: f64) -> DVec3 {
    center + DVec3::new(angle.cos(), 0.0, angle.sin()) * radius
}

fn segment_count(params: &GenerateParams<'_>) -> u32 {
    params
        .setting
        .segment()
        .unwrap_or(DEFAULT_CURVE_SEGMENT)
        .max(1)
}

/// 圆弧：`segment + 1` 个采样点。终止角小于起始角时加一整圈，保证逆时针扫掠。
pub fn generate_arc(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::Arc(arc) = entity else {
        return Err(expect_kind(entity, EntityKind::Arc));
    };
    let center = transform_point(arc.center, params.unit_scale);
    let radius = arc.radius * params.unit_scale;
    let start = arc.start_angle;
    let end = if arc.end_angle < arc.start_angle {
        arc.end_angle + TAU
    } else {
        arc.end_angle
    };

    let segment = segment_count(params);
    let points = (0..=segment)
        .map(|j| {
            let t = f64::from(j) / f64::from(segment);
            curve_point(center, radius, start + (end - start) * t)
        })
        .collect();

    spawn_polyline(scene, parent, EntityKind::Arc, points, center, false, params)
}

/// 圆：整圈 `segment` 个等距采样点，不重复首点，以闭合标记连接首尾。
pub fn generate_circle(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::Circle(circle) = entity else {
        return Err(expect_kind(entity, EntityKind::Circle));
    };
    let center = transform_point(circle.center, params.unit_scale);
    let radius = circle.radius * params.unit_scale;

    let segment = segment_count(params);
    let points = (0..segment)
        .map(|j| curve_point(center, radius, TAU * f64::from(j) / f64::from(segment)))
        .collect();

    spawn_polyline(scene, parent, EntityKind::Circle, points, center, true, params)
}
