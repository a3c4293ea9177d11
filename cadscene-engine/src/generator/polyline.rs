use cadscene_core::document::{Entity, EntityKind};
use glam::DVec3;

use super::{GenerateParams, expect_kind, spawn_polyline};
use crate::errors::DrawError;
use crate::scene::{NodeId, SceneGraph};
use crate::units::transform_point2;

/// 轻量多段线。闭合时重复首点并标记为闭合；锚点为顶点均值。凸度不参与细分。
pub fn generate_polyline(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::Polyline(polyline) = entity else {
        return Err(expect_kind(entity, EntityKind::Polyline));
    };
    if polyline.vertices.is_empty() {
        return Err(DrawError::EmptyGeometry(EntityKind::Polyline));
    }

    let mut points: Vec<DVec3> = polyline
        .vertices
        .iter()
        .map(|vertex| transform_point2(vertex.position, params.unit_scale))
        .collect();
    let anchor = points.iter().copied().sum::<DVec3>() / points.len() as f64;
    if polyline.is_closed {
        points.push(points[0]);
    }

    spawn_polyline(
        scene,
        parent,
        EntityKind::Polyline,
        points,
        anchor,
        polyline.is_closed,
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{polyline_of, setting};
    use cadscene_core::document::{Polyline, PolylineVertex};
    use cadscene_core::geometry::Point2;

    fn polyline(points: &[(f64, f64)], is_closed: bool) -> Entity {
        Entity::Polyline(Polyline {
            vertices: points
                .iter()
                .map(|(x, y)| PolylineVertex::new(Point2::new(*x, *y)))
                .collect(),
            is_closed,
        })
    }

    #[test]
    fn open_and_closed_point_counts() {
        let setting = setting(EntityKind::Polyline);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 1.0,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let square = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];

        let open = generate_polyline(&mut scene, &polyline(&square, false), root, &params)
            .expect("open polyline");
        let open = polyline_of(&scene, open);
        assert_eq!(open.points.len(), 4);
        assert!(!open.closed);

        let closed = generate_polyline(&mut scene, &polyline(&square, true), root, &params)
            .expect("closed polyline");
        let closed = polyline_of(&scene, closed);
        assert_eq!(closed.points.len(), 5);
        assert!(closed.closed);
        assert_eq!(closed.points[0], closed.points[4]);
        assert!((closed.anchor - DVec3::new(1.0, 0.0, 1.0)).length() < 1e-12);
        assert!((closed.points[2] - DVec3::new(2.0, 0.0, 2.0)).length() < 1e-12);
    }

    #[test]
    fn empty_polyline_is_rejected() {
        let setting = setting(EntityKind::Polyline);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 1.0,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let result = generate_polyline(&mut scene, &polyline(&[], true), root, &params);
        assert_eq!(result, Err(DrawError::EmptyGeometry(EntityKind::Polyline)));
        assert_eq!(scene.len(), 1);
    }
}
