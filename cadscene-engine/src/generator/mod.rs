//! 逐类型的几何生成器。每个生成器都是无状态函数，为一个实体在父节点下创建一个图元。

mod curve;
mod line;
mod polyline;
mod text;

use cadscene_config::EntitySetting;
use cadscene_core::document::{Entity, EntityKind};
use glam::DVec3;

use crate::errors::DrawError;
use crate::scene::{NodeId, PolylinePrimitive, Primitive, SceneGraph};
use crate::schedule::{CancelToken, Progress};

pub use curve::{generate_arc, generate_circle};
pub use line::generate_line;
pub use polyline::generate_polyline;
pub use text::{attachment_pivot, generate_mtext, generate_text, strip_color_codes};

/// 各类型批次的固定生成顺序。
pub const GENERATION_ORDER: [EntityKind; 6] = [
    EntityKind::Line,
    EntityKind::Polyline,
    EntityKind::Arc,
    EntityKind::Circle,
    EntityKind::Text,
    EntityKind::MText,
];

/// 单个实体生成所需的参数。
#[derive(Debug, Clone, Copy)]
pub struct GenerateParams<'a> {
    pub setting: &'a EntitySetting,
    pub default_material: &'a str,
    pub unit_scale: f64,
}

impl GenerateParams<'_> {
    fn material(&self) -> String {
        self.setting
            .material()
            .unwrap_or(self.default_material)
            .to_string()
    }
}

pub type GeneratorFn =
    fn(&mut SceneGraph, &Entity, NodeId, &GenerateParams<'_>) -> Result<NodeId, DrawError>;

pub fn generator_for(kind: EntityKind) -> Option<GeneratorFn> {
    match kind {
        EntityKind::Line => Some(generate_line),
        EntityKind::Polyline => Some(generate_polyline),
        EntityKind::Arc => Some(generate_arc),
        EntityKind::Circle => Some(generate_circle),
        EntityKind::Text => Some(generate_text),
        EntityKind::MText => Some(generate_mtext),
        EntityKind::BlockReference | EntityKind::None => None,
    }
}

/// 按实体自身的类型分派到对应生成器。
pub fn generate_entity(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let kind = entity.kind();
    let generator = generator_for(kind).ok_or(DrawError::KindMismatch {
        expected: params.setting.kind,
        actual: kind,
    })?;
    generator(scene, entity, parent, params)
}

/// 阻塞模式：按输入顺序一次性生成整批实体。
pub fn generate_batch(
    scene: &mut SceneGraph,
    entities: &[&Entity],
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<Vec<NodeId>, DrawError> {
    let mut generation = BatchGeneration::new(entities.to_vec(), parent, *params);
    let cancel = CancelToken::new();
    while !generation.step(scene, &cancel)?.is_done() {}
    Ok(generation.into_nodes())
}

/// 协作模式：每次 `step` 只生成一个实体，调用方可在两次推进之间让出控制权。
#[derive(Debug)]
pub struct BatchGeneration<'a> {
    entities: Vec<&'a Entity>,
    next: usize,
    parent: NodeId,
    params: GenerateParams<'a>,
    nodes: Vec<NodeId>,
}

impl<'a> BatchGeneration<'a> {
    pub fn new(entities: Vec<&'a Entity>, parent: NodeId, params: GenerateParams<'a>) -> Self {
        Self {
            nodes: Vec::with_capacity(entities.len()),
            entities,
            next: 0,
            parent,
            params,
        }
    }

    /// 取消信号在处理下一个实体之前检查。
    pub fn step(
        &mut self,
        scene: &mut SceneGraph,
        cancel: &CancelToken,
    ) -> Result<Progress, DrawError> {
        let Some(entity) = self.entities.get(self.next).copied() else {
            return Ok(Progress::Done);
        };
        if cancel.is_cancelled() {
            return Err(DrawError::Cancelled);
        }
        let node = generate_entity(scene, entity, self.parent, &self.params)?;
        self.nodes.push(node);
        self.next += 1;
        if self.next == self.entities.len() {
            Ok(Progress::Done)
        } else {
            Ok(Progress::Pending)
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.entities.len() - self.next
    }

    pub fn into_nodes(self) -> Vec<NodeId> {
        self.nodes
    }
}

pub(crate) fn expect_kind(entity: &Entity, expected: EntityKind) -> DrawError {
    DrawError::KindMismatch {
        expected,
        actual: entity.kind(),
    }
}

/// 在父节点下创建折线图元节点。`local_points` 与 `local_anchor` 位于父节点空间，
/// 写入图元时转换为世界坐标，节点本身钉在世界原点。
pub(crate) fn spawn_polyline(
    scene: &mut SceneGraph,
    parent: NodeId,
    kind: EntityKind,
    local_points: Vec<DVec3>,
    local_anchor: DVec3,
    closed: bool,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let parent_world = scene.world_transform(parent)?;
    let points = local_points
        .into_iter()
        .map(|point| parent_world.transform_point3(point))
        .collect();
    let primitive = PolylinePrimitive {
        points,
        closed,
        width: params.setting.line_width().unwrap_or_default(),
        color: params.setting.effective_color(),
        material: params.material(),
        anchor: parent_world.transform_point3(local_anchor),
    };

    let node = scene.create_node(kind.name(), Some(parent))?;
    scene.pin_to_world_origin(node)?;
    scene.set_primitive(node, Primitive::Polyline(primitive))?;
    Ok(node)
}
