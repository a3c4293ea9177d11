use cadscene_core::document::{Entity, EntityKind};

use super::{GenerateParams, expect_kind, spawn_polyline};
use crate::errors::DrawError;
use crate::scene::{NodeId, SceneGraph};
use crate::units::transform_point;

/// 直线：两个点，锚点取中点。
pub fn generate_line(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::Line(line) = entity else {
        return Err(expect_kind(entity, EntityKind::Line));
    };
    let start = transform_point(line.start, params.unit_scale);
    let end = transform_point(line.end, params.unit_scale);
    spawn_polyline(
        scene,
        parent,
        EntityKind::Line,
        vec![start, end],
        (start + end) * 0.5,
        false,
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{polyline_of, setting};
    use cadscene_core::document::{Circle, Line};
    use cadscene_core::geometry::Point3;
    use glam::DVec3;

    #[test]
    fn millimeter_line_is_scaled_and_swapped() {
        let setting = setting(EntityKind::Line);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 0.001,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let entity = Entity::Line(Line {
            start: Point3::new(0.0, 0.0, 0.0),
            end: Point3::new(10.0, 0.0, 0.0),
        });

        let node = generate_line(&mut scene, &entity, root, &params).expect("line");
        let polyline = polyline_of(&scene, node);
        assert_eq!(polyline.points.len(), 2);
        assert!(polyline.points[0].length() < 1e-12);
        assert!((polyline.points[1] - DVec3::new(0.01, 0.0, 0.0)).length() < 1e-12);
        assert!((polyline.width - 0.1).abs() < 1e-12);
        assert!(!polyline.closed);
        assert_eq!(polyline.material, "Default-Line");
        assert!((polyline.anchor - DVec3::new(0.005, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn points_follow_parent_position() {
        let setting = setting(EntityKind::Line);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 1.0,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        scene
            .set_translation(root, DVec3::new(5.0, 0.0, 5.0))
            .expect("translate");
        let entity = Entity::Line(Line {
            start: Point3::new(1.0, 2.0, 3.0),
            end: Point3::new(1.0, 4.0, 3.0),
        });

        let node = generate_line(&mut scene, &entity, root, &params).expect("line");
        let polyline = polyline_of(&scene, node);
        assert!((polyline.points[0] - DVec3::new(6.0, 3.0, 7.0)).length() < 1e-12);
        assert!((polyline.points[1] - DVec3::new(6.0, 3.0, 9.0)).length() < 1e-12);
        let world = scene.world_transform(node).expect("world");
        assert!(world.translation.length() < 1e-12);
    }

    #[test]
    fn wrong_kind_fails_fast() {
        let setting = setting(EntityKind::Line);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 1.0,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let circle = Entity::Circle(Circle {
            center: Point3::planar(0.0, 0.0),
            radius: 1.0,
        });
        let result = generate_line(&mut scene, &circle, root, &params);
        assert_eq!(
            result,
            Err(DrawError::KindMismatch {
                expected: EntityKind::Line,
                actual: EntityKind::Circle,
            })
        );
        assert_eq!(scene.len(), 1);
    }
}
