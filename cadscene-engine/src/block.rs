//! 块参照的实例缓存。同一块定义在一次绘制中只生成一次，之后的参照克隆首个实例。

use std::collections::{HashMap, HashSet};

use cadscene_core::document::{BlockHandle, BlockReference, Document, Entity};
use glam::{DAffine3, DQuat};
use tracing::{debug, warn};

use crate::errors::DrawError;
use crate::scene::{NodeId, Primitive, SceneGraph};
use crate::units::transform_point;

/// 缓存查询结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit(NodeId),
    Miss,
    /// 块正在生成中，再次引用说明块定义存在循环。
    InProgress,
}

/// 块实例的旋转：绕渲染空间的竖直轴。轴交换会翻转手性，因此取反以保持 CAD 的逆时针方向。
#[inline]
pub fn reference_rotation(rotation: f64) -> DQuat {
    DQuat::from_rotation_y(-rotation)
}

#[derive(Debug, Default)]
pub struct BlockCache {
    entries: HashMap<BlockHandle, NodeId>,
    generating: HashSet<BlockHandle>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, handle: BlockHandle) -> Option<NodeId> {
        self.entries.get(&handle).copied()
    }

    pub fn lookup(&self, handle: BlockHandle) -> Lookup {
        if let Some(node) = self.entries.get(&handle) {
            Lookup::Hit(*node)
        } else if self.generating.contains(&handle) {
            Lookup::InProgress
        } else {
            Lookup::Miss
        }
    }

    /// 缓存未命中：在插入点创建块节点并标记为生成中，调用方随后在其下生成块内实体。
    pub fn begin_template(
        &mut self,
        scene: &mut SceneGraph,
        reference: &BlockReference,
        name: &str,
        parent: NodeId,
        unit_scale: f64,
    ) -> Result<NodeId, DrawError> {
        let node = scene.create_node(name, Some(parent))?;
        scene.set_translation(node, transform_point(reference.insert, unit_scale))?;
        self.generating.insert(reference.block);
        Ok(node)
    }

    /// 块内实体生成完毕：应用参照旋转，修正折线坐标，并登记为该句柄的模板。
    pub fn seal(
        &mut self,
        scene: &mut SceneGraph,
        reference: &BlockReference,
        node: NodeId,
    ) -> Result<(), DrawError> {
        scene.set_rotation(node, reference_rotation(reference.rotation))?;
        reanchor_instance(scene, node)?;
        self.generating.remove(&reference.block);
        self.entries.insert(reference.block, node);
        debug!(block = %reference.block, node = %node, "块模板已缓存");
        Ok(())
    }

    /// 放弃生成中的模板并移除其半成品子树。
    pub fn abandon(
        &mut self,
        scene: &mut SceneGraph,
        handle: BlockHandle,
        node: NodeId,
    ) -> Result<(), DrawError> {
        self.generating.remove(&handle);
        if scene.contains(node) {
            scene.remove_subtree(node)?;
        }
        Ok(())
    }

    /// 缓存命中：克隆模板，放到新的插入点与旋转角，再修正折线坐标。
    pub fn instantiate(
        &self,
        scene: &mut SceneGraph,
        template: NodeId,
        reference: &BlockReference,
        parent: NodeId,
        unit_scale: f64,
    ) -> Result<NodeId, DrawError> {
        let node = scene.clone_subtree(template, Some(parent))?;
        scene.set_translation(node, transform_point(reference.insert, unit_scale))?;
        scene.set_rotation(node, reference_rotation(reference.rotation))?;
        reanchor_instance(scene, node)?;
        Ok(node)
    }
}

/// 本地变换链：从 `ancestor`（不含）到 `node`（含）。
fn relative_transform(
    scene: &SceneGraph,
    ancestor: NodeId,
    node: NodeId,
) -> Result<DAffine3, DrawError> {
    let mut transform = DAffine3::IDENTITY;
    let mut current = node;
    while current != ancestor {
        let entry = scene.node(current)?;
        transform = entry.local_transform() * transform;
        current = entry.parent().ok_or(DrawError::NodeNotFound(ancestor.index()))?;
    }
    Ok(transform)
}

/// 将实例内折线图元的绝对坐标改写到实例当前所在位置。
///
/// 折线节点被钉在世界原点，所以它相对实例根的本地变换链恰好是生成时实例根世界变换的逆；
/// 先用它把旧坐标还原到块空间，再乘以实例根当前的世界变换。无旋转时即
/// `旧坐标 + 相对实例根的本地位置 + 实例根世界位置`。
pub fn reanchor_instance(scene: &mut SceneGraph, root: NodeId) -> Result<(), DrawError> {
    let root_world = scene.world_transform(root)?;
    let mut updates = Vec::new();
    for id in scene.descendants(root)? {
        if matches!(scene.node(id)?.primitive, Some(Primitive::Polyline(_))) {
            let relative = relative_transform(scene, root, id)?;
            updates.push((id, root_world * relative));
        }
    }

    for (id, transform) in updates {
        if let Some(Primitive::Polyline(polyline)) = scene.node_mut(id)?.primitive.as_mut() {
            for point in &mut polyline.points {
                *point = transform.transform_point3(*point);
            }
            polyline.anchor = transform.transform_point3(polyline.anchor);
        }
        scene.pin_to_world_origin(id)?;
    }
    Ok(())
}

/// 块内实体的生成回调，负责把实体列表生成到给定父节点下。
pub trait EntitySink {
    fn generate_entities(
        &mut self,
        scene: &mut SceneGraph,
        cache: &mut BlockCache,
        entities: &[Entity],
        parent: NodeId,
    ) -> Result<(), DrawError>;
}

/// 阻塞模式下逐个解析块参照，返回每个成功解析参照的实例节点。
pub fn draw_block_references(
    scene: &mut SceneGraph,
    cache: &mut BlockCache,
    document: &Document,
    references: &[&BlockReference],
    unit_scale: f64,
    sink: &mut dyn EntitySink,
    parent: NodeId,
) -> Result<Vec<NodeId>, DrawError> {
    let mut instances = Vec::with_capacity(references.len());
    for reference in references {
        let Some(block) = document.block(reference.block) else {
            warn!(block = %reference.block, "块定义缺失，跳过该块参照");
            continue;
        };

        match cache.lookup(reference.block) {
            Lookup::Hit(template) => {
                instances.push(cache.instantiate(scene, template, reference, parent, unit_scale)?);
            }
            Lookup::InProgress => {
                warn!(block = %reference.block, name = %block.name, "块定义存在循环引用，跳过");
            }
            Lookup::Miss => {
                let node = cache.begin_template(scene, reference, &block.name, parent, unit_scale)?;
                if let Err(err) = sink.generate_entities(scene, cache, &block.entities, node) {
                    cache.abandon(scene, reference.block, node)?;
                    return Err(err);
                }
                cache.seal(scene, reference, node)?;
                instances.push(node);
            }
        }
    }
    Ok(instances)
}
