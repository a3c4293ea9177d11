//! 把折线图元烘焙为一张合并网格。每段折线展开为平铺在渲染平面上的带状四边形。

use glam::{DAffine3, DVec3};
use tracing::{debug, info};

pub use cadscene_config::AfterBake;

use crate::drawer::Drawing;
use crate::errors::DrawError;
use crate::scene::{NodeId, PolylinePrimitive, Primitive, SceneGraph};

/// 合并后的三角网格，法线统一朝上 (+Y)。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<DVec3>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    /// 参与烘焙的折线图元数量。
    pub primitive_count: usize,
}

impl Mesh {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 以 `f32` 形式导出顶点位置，便于交给渲染后端。
    pub fn positions_f32(&self) -> Vec<[f32; 3]> {
        self.positions
            .iter()
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect()
    }

    pub fn normals_f32(&self) -> Vec<[f32; 3]> {
        vec![[0.0, 1.0, 0.0]; self.positions.len()]
    }

    fn push_ribbon(&mut self, polyline: &PolylinePrimitive, to_world: &DAffine3) {
        let half_width = polyline.width * 0.5;
        let color = polyline.color.to_array();
        let mut segments: Vec<(DVec3, DVec3)> = polyline
            .points
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        if polyline.closed {
            if let (Some(first), Some(last)) = (polyline.points.first(), polyline.points.last()) {
                segments.push((*last, *first));
            }
        }

        for (start, end) in segments {
            // 带状面平铺在渲染平面上，只沿高度方向 (CAD z) 变化的线段投影为零长度，无法展开
            let direction = DVec3::new(end.x - start.x, 0.0, end.z - start.z);
            if direction.length_squared() <= f64::EPSILON {
                debug!(?start, ?end, "线段在渲染平面上的投影长度为零，跳过");
                continue;
            }
            let side = DVec3::new(-direction.z, 0.0, direction.x).normalize() * half_width;
            let base = self.positions.len() as u32;
            for corner in [start + side, start - side, end + side, end - side] {
                self.positions.push(to_world.transform_point3(corner));
                self.colors.push(color);
            }
            self.indices
                .extend_from_slice(&[base, base + 2, base + 1, base + 1, base + 2, base + 3]);
        }
    }
}

/// 烘焙给定根节点下所有处于激活状态的折线图元；少于两个点的图元被跳过，文字从不参与。
pub fn bake(scene: &SceneGraph, roots: &[NodeId]) -> Result<Mesh, DrawError> {
    let mut mesh = Mesh::default();
    for root in roots {
        for (node, primitive) in scene.primitives_under(*root)? {
            let Primitive::Polyline(polyline) = primitive else {
                continue;
            };
            if polyline.points.len() < 2 || !scene.is_active_in_hierarchy(node)? {
                continue;
            }
            let to_world = scene.world_transform(node)?;
            mesh.push_ribbon(polyline, &to_world);
            mesh.primitive_count += 1;
        }
    }
    debug!(
        primitives = mesh.primitive_count,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "折线图元烘焙完成"
    );
    Ok(mesh)
}

/// 烘焙一次绘制的全部折线图元，并按 `after` 处理原始图元节点。文字标签始终保留。
pub fn bake_drawing(
    scene: &mut SceneGraph,
    drawing: &Drawing,
    after: AfterBake,
) -> Result<Mesh, DrawError> {
    let roots: Vec<NodeId> = drawing.kind_roots().map(|(_, node)| node).collect();
    let mesh = bake(scene, &roots)?;

    if after != AfterBake::Keep {
        let mut polyline_nodes = Vec::new();
        for root in &roots {
            for (node, primitive) in scene.primitives_under(*root)? {
                if matches!(primitive, Primitive::Polyline(_)) {
                    polyline_nodes.push(node);
                }
            }
        }
        for node in &polyline_nodes {
            match after {
                AfterBake::Deactivate => scene.set_active(*node, false)?,
                AfterBake::Destroy => {
                    scene.remove_subtree(*node)?;
                }
                AfterBake::Keep => {}
            }
        }
        info!(after = ?after, count = polyline_nodes.len(), "已处理烘焙后的折线图元");
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadscene_core::color::Color;

    fn polyline(points: Vec<DVec3>, closed: bool, width: f64) -> Primitive {
        Primitive::Polyline(PolylinePrimitive {
            anchor: points.first().copied().unwrap_or_default(),
            points,
            closed,
            width,
            color: Color::rgb(1.0, 0.0, 0.0),
            material: "Default-Line".to_string(),
        })
    }

    fn scene_with(primitives: Vec<Primitive>) -> (SceneGraph, NodeId) {
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        for primitive in primitives {
            let node = scene.create_node("p", Some(root)).expect("node");
            scene.set_primitive(node, primitive).expect("primitive");
        }
        (scene, root)
    }

    #[test]
    fn ribbon_is_flat_with_requested_width() {
        let (scene, root) = scene_with(vec![polyline(
            vec![DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)],
            false,
            0.5,
        )]);
        let mesh = bake(&scene, &[root]).expect("bake");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.primitive_count, 1);
        for position in &mesh.positions {
            assert!(position.y.abs() < 1e-12);
            assert!((position.z.abs() - 0.25).abs() < 1e-12);
        }
        assert!(mesh.colors.iter().all(|c| *c == [1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn degenerate_and_text_primitives_are_skipped() {
        let label = Primitive::Text(crate::scene::TextLabel {
            content: "T".to_string(),
            position: DVec3::ZERO,
            rotation_euler_deg: DVec3::new(90.0, 0.0, 0.0),
            pivot: glam::DVec2::ZERO,
            horizontal: crate::scene::HorizontalAlignment::Left,
            vertical: crate::scene::VerticalAlignment::Baseline,
            font_style: cadscene_core::document::FontStyle::Regular,
            color: Color::WHITE,
            size: 2.0,
        });
        let (scene, root) = scene_with(vec![
            polyline(vec![DVec3::ZERO], false, 0.1),
            label,
            polyline(vec![DVec3::ZERO, DVec3::ZERO, DVec3::X], false, 0.1),
        ]);
        let mesh = bake(&scene, &[root]).expect("bake");
        assert_eq!(mesh.primitive_count, 1);
        // 零长度的第一段被跳过
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn vertical_only_segment_is_skipped() {
        let (scene, root) = scene_with(vec![polyline(
            vec![DVec3::ZERO, DVec3::new(0.0, 3.0, 0.0), DVec3::new(1.0, 3.0, 0.0)],
            false,
            0.2,
        )]);
        let mesh = bake(&scene, &[root]).expect("bake");
        assert_eq!(mesh.primitive_count, 1);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.positions.iter().all(|p| (p.y - 3.0).abs() < 1e-12));
    }

    #[test]
    fn looped_primitive_gets_closing_segment() {
        let square = vec![
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let (scene, root) = scene_with(vec![polyline(square, true, 0.1)]);
        let mesh = bake(&scene, &[root]).expect("bake");
        assert_eq!(mesh.triangle_count(), 8);
        let max_index = mesh.indices.iter().copied().max().unwrap_or_default();
        assert_eq!(max_index as usize, mesh.vertex_count() - 1);
    }
}
