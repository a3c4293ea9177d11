//! 绘制流程编排：按固定类型顺序生成各批实体，再解析块参照。
//!
//! 阻塞模式 [`draw`] 一次完成整个绘制；协作模式 [`DrawTask`] 每次 `step` 只推进一个实体，
//! 两者共用 [`generate_entity`] 作为单实体生成步骤。

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use cadscene_config::DrawSettings;
use cadscene_core::document::{BlockHandle, BlockReference, Document, Entity, EntityKind};
use tracing::{debug, info, warn};

use crate::block::{BlockCache, EntitySink, Lookup, draw_block_references};
use crate::errors::DrawError;
use crate::generator::{GENERATION_ORDER, GenerateParams, generate_batch, generate_entity};
use crate::scene::{NodeId, SceneGraph};
use crate::schedule::{CancelToken, Progress};
use crate::units::effective_unit_scale;

pub const DRAWING_ROOT_NAME: &str = "CadDrawing";

#[derive(Debug, Clone, Copy)]
pub struct DrawOptions {
    /// 关闭时不创建块根节点，块参照全部忽略。
    pub draw_blocks: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self { draw_blocks: true }
    }
}

/// 一次绘制的结果：文档根节点与每种类型的根节点。
#[derive(Debug, Clone)]
pub struct Drawing {
    pub root: NodeId,
    pub unit_scale: f64,
    kind_roots: BTreeMap<EntityKind, NodeId>,
    block_templates: usize,
}

impl Drawing {
    fn create(
        scene: &mut SceneGraph,
        unit_scale: f64,
        options: DrawOptions,
    ) -> Result<Self, DrawError> {
        let root = scene.create_node(DRAWING_ROOT_NAME, None)?;
        let mut kind_roots = BTreeMap::new();
        for kind in GENERATION_ORDER {
            kind_roots.insert(kind, scene.create_node(kind.name(), Some(root))?);
        }
        if options.draw_blocks {
            let block_root = scene.create_node(EntityKind::BlockReference.name(), Some(root))?;
            kind_roots.insert(EntityKind::BlockReference, block_root);
        }
        Ok(Self {
            root,
            unit_scale,
            kind_roots,
            block_templates: 0,
        })
    }

    #[inline]
    pub fn root_for(&self, kind: EntityKind) -> Option<NodeId> {
        self.kind_roots.get(&kind).copied()
    }

    pub fn kind_roots(&self) -> impl Iterator<Item = (EntityKind, NodeId)> + '_ {
        self.kind_roots.iter().map(|(kind, node)| (*kind, *node))
    }

    /// 本次绘制中生成过的块模板数量。
    #[inline]
    pub fn block_templates(&self) -> usize {
        self.block_templates
    }
}

fn params_for<'a>(
    settings: &'a DrawSettings,
    kind: EntityKind,
    unit_scale: f64,
) -> Option<GenerateParams<'a>> {
    settings.get(kind).map(|setting| GenerateParams {
        setting,
        default_material: settings.default_material(),
        unit_scale,
    })
}

/// 块内实体的生成回调：与顶层相同，先按类型分批，再解析嵌套块参照。
struct PassSink<'a> {
    document: &'a Document,
    settings: &'a DrawSettings,
    unit_scale: f64,
}

impl EntitySink for PassSink<'_> {
    fn generate_entities(
        &mut self,
        scene: &mut SceneGraph,
        cache: &mut BlockCache,
        entities: &[Entity],
        parent: NodeId,
    ) -> Result<(), DrawError> {
        for kind in GENERATION_ORDER {
            let Some(params) = params_for(self.settings, kind, self.unit_scale) else {
                continue;
            };
            let batch: Vec<&Entity> = entities.iter().filter(|e| e.kind() == kind).collect();
            if !batch.is_empty() {
                generate_batch(scene, &batch, parent, &params)?;
            }
        }

        let nested: Vec<&BlockReference> = entities
            .iter()
            .filter_map(|entity| match entity {
                Entity::BlockReference(reference) => Some(reference),
                _ => None,
            })
            .collect();
        if !nested.is_empty() {
            let document = self.document;
            let unit_scale = self.unit_scale;
            draw_block_references(scene, cache, document, &nested, unit_scale, self, parent)?;
        }
        Ok(())
    }
}

/// 阻塞模式：一次完成整个文档的绘制。
pub fn draw(
    scene: &mut SceneGraph,
    document: &Document,
    settings: &DrawSettings,
    options: DrawOptions,
) -> Result<Drawing, DrawError> {
    let unit_scale = effective_unit_scale(document.units());
    let mut drawing = Drawing::create(scene, unit_scale, options)?;

    for kind in GENERATION_ORDER {
        let Some(params) = params_for(settings, kind, unit_scale) else {
            debug!(kind = %kind, "未配置绘制设置，跳过该类型");
            continue;
        };
        let Some(parent) = drawing.root_for(kind) else {
            continue;
        };
        let batch: Vec<&Entity> = document
            .entities()
            .map(|(_, entity)| entity)
            .filter(|entity| entity.kind() == kind)
            .collect();
        let nodes = generate_batch(scene, &batch, parent, &params)?;
        debug!(kind = %kind, count = nodes.len(), "实体批次生成完成");
    }

    if let Some(block_root) = drawing.root_for(EntityKind::BlockReference) {
        let references: Vec<&BlockReference> = document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::BlockReference(reference) => Some(reference),
                _ => None,
            })
            .collect();
        let mut cache = BlockCache::new();
        let mut sink = PassSink {
            document,
            settings,
            unit_scale,
        };
        let instances = draw_block_references(
            scene,
            &mut cache,
            document,
            &references,
            unit_scale,
            &mut sink,
            block_root,
        )?;
        drawing.block_templates = cache.len();
        debug!(
            instances = instances.len(),
            templates = cache.len(),
            "块参照解析完成"
        );
    }

    info!(
        entities = document.entity_count(),
        nodes = scene.len(),
        unit_scale,
        "文档绘制完成"
    );
    Ok(drawing)
}

/// 在共享文档中定位一个实体：顶层实体或某个块定义内的实体。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntitySlot {
    TopLevel(usize),
    Block(BlockHandle, usize),
}

impl EntitySlot {
    fn resolve(self, document: &Document) -> Option<&Entity> {
        match self {
            EntitySlot::TopLevel(index) => document.entity_at(index),
            EntitySlot::Block(handle, index) => document
                .block(handle)
                .and_then(|block| block.entities.get(index)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WorkItem {
    Entity { slot: EntitySlot, parent: NodeId },
    Reference { slot: EntitySlot, parent: NodeId },
    Seal { slot: EntitySlot, node: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TaskState {
    Running,
    Finished,
    Cancelled,
    /// 生成失败后终止，之后每次推进都返回同一个错误。
    Failed(DrawError),
}

/// 协作模式的绘制任务。持有共享文档与设置，可跨帧保存。
#[derive(Debug)]
pub struct DrawTask {
    document: Arc<Document>,
    settings: Arc<DrawSettings>,
    drawing: Drawing,
    cache: BlockCache,
    queue: VecDeque<WorkItem>,
    processed: usize,
    scheduled: usize,
    state: TaskState,
}

impl DrawTask {
    /// 创建根节点并排好顶层工作队列，不生成任何图元。
    pub fn new(
        scene: &mut SceneGraph,
        document: Arc<Document>,
        settings: Arc<DrawSettings>,
        options: DrawOptions,
    ) -> Result<Self, DrawError> {
        let unit_scale = effective_unit_scale(document.units());
        let drawing = Drawing::create(scene, unit_scale, options)?;

        let mut queue = VecDeque::new();
        for kind in GENERATION_ORDER {
            let Some(parent) = drawing.root_for(kind) else {
                continue;
            };
            if settings.get(kind).is_none() {
                debug!(kind = %kind, "未配置绘制设置，跳过该类型");
                continue;
            }
            for (index, (_, entity)) in document.entities().enumerate() {
                if entity.kind() == kind {
                    queue.push_back(WorkItem::Entity {
                        slot: EntitySlot::TopLevel(index),
                        parent,
                    });
                }
            }
        }
        if let Some(parent) = drawing.root_for(EntityKind::BlockReference) {
            for (index, (_, entity)) in document.entities().enumerate() {
                if entity.kind() == EntityKind::BlockReference {
                    queue.push_back(WorkItem::Reference {
                        slot: EntitySlot::TopLevel(index),
                        parent,
                    });
                }
            }
        }

        let scheduled = queue.len();
        Ok(Self {
            document,
            settings,
            drawing,
            cache: BlockCache::new(),
            queue,
            processed: 0,
            scheduled,
            state: TaskState::Running,
        })
    }

    #[inline]
    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == TaskState::Finished
    }

    /// 已处理与已排队（含块展开）的工作项数量。
    #[inline]
    pub fn progress(&self) -> (usize, usize) {
        (self.processed, self.scheduled)
    }

    /// 推进一个实体。取消信号在处理下一个实体之前检查；取消或生成失败时移除未完成的块模板，
    /// 任务随即终止。
    pub fn step(
        &mut self,
        scene: &mut SceneGraph,
        cancel: &CancelToken,
    ) -> Result<Progress, DrawError> {
        match &self.state {
            TaskState::Finished => return Ok(Progress::Done),
            TaskState::Cancelled => return Err(DrawError::Cancelled),
            TaskState::Failed(err) => return Err(err.clone()),
            TaskState::Running => {}
        }
        if cancel.is_cancelled() {
            self.abort(scene, TaskState::Cancelled)?;
            warn!(processed = self.processed, "协作绘制已取消");
            return Err(DrawError::Cancelled);
        }

        while let Some(item) = self.queue.pop_front() {
            self.processed += 1;
            match self.process(scene, item) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => {
                    self.abort(scene, TaskState::Failed(err.clone()))?;
                    warn!(error = %err, processed = self.processed, "协作绘制失败，已终止");
                    return Err(err);
                }
            }
        }

        if self.queue.is_empty() {
            self.finish();
            Ok(Progress::Done)
        } else {
            Ok(Progress::Pending)
        }
    }

    /// 连续推进直到完成，供阻塞场景复用同一任务。
    pub fn run_to_end(
        &mut self,
        scene: &mut SceneGraph,
        cancel: &CancelToken,
    ) -> Result<(), DrawError> {
        while !self.step(scene, cancel)?.is_done() {}
        Ok(())
    }

    pub fn into_drawing(self) -> Drawing {
        self.drawing
    }

    fn finish(&mut self) {
        self.state = TaskState::Finished;
        self.drawing.block_templates = self.cache.len();
        info!(
            entities = self.document.entity_count(),
            processed = self.processed,
            "协作绘制完成"
        );
    }

    /// 放弃所有尚未封存的块模板并清空队列，进入终止状态。
    fn abort(&mut self, scene: &mut SceneGraph, state: TaskState) -> Result<(), DrawError> {
        let pending: Vec<(EntitySlot, NodeId)> = self
            .queue
            .iter()
            .filter_map(|item| match item {
                WorkItem::Seal { slot, node } => Some((*slot, *node)),
                _ => None,
            })
            .collect();
        for (slot, node) in pending {
            if let Some(Entity::BlockReference(reference)) = slot.resolve(&self.document) {
                self.cache.abandon(scene, reference.block, node)?;
            }
        }
        self.queue.clear();
        self.state = state;
        Ok(())
    }

    /// 处理一个工作项，返回是否产生了图元或块实例。
    fn process(&mut self, scene: &mut SceneGraph, item: WorkItem) -> Result<bool, DrawError> {
        let document = Arc::clone(&self.document);
        match item {
            WorkItem::Entity { slot, parent } => {
                let Some(entity) = slot.resolve(&document) else {
                    return Ok(false);
                };
                let Some(params) =
                    params_for(&self.settings, entity.kind(), self.drawing.unit_scale)
                else {
                    return Ok(false);
                };
                generate_entity(scene, entity, parent, &params)?;
                Ok(true)
            }
            WorkItem::Reference { slot, parent } => {
                let Some(Entity::BlockReference(reference)) = slot.resolve(&document) else {
                    return Ok(false);
                };
                self.resolve_reference(scene, &document, slot, reference, parent)
            }
            WorkItem::Seal { slot, node } => {
                if let Some(Entity::BlockReference(reference)) = slot.resolve(&document) {
                    self.cache.seal(scene, reference, node)?;
                }
                Ok(false)
            }
        }
    }

    fn resolve_reference(
        &mut self,
        scene: &mut SceneGraph,
        document: &Document,
        slot: EntitySlot,
        reference: &BlockReference,
        parent: NodeId,
    ) -> Result<bool, DrawError> {
        let Some(block) = document.block(reference.block) else {
            warn!(block = %reference.block, "块定义缺失，跳过该块参照");
            return Ok(false);
        };

        match self.cache.lookup(reference.block) {
            Lookup::Hit(template) => {
                self.cache.instantiate(
                    scene,
                    template,
                    reference,
                    parent,
                    self.drawing.unit_scale,
                )?;
                Ok(true)
            }
            Lookup::InProgress => {
                warn!(block = %reference.block, name = %block.name, "块定义存在循环引用，跳过");
                Ok(false)
            }
            Lookup::Miss => {
                let node = self.cache.begin_template(
                    scene,
                    reference,
                    &block.name,
                    parent,
                    self.drawing.unit_scale,
                )?;

                // 展开顺序与阻塞模式一致：块内实体按类型分批，其后是嵌套参照，最后封存模板
                let mut expansion = Vec::new();
                for kind in GENERATION_ORDER {
                    if self.settings.get(kind).is_none() {
                        continue;
                    }
                    for (index, entity) in block.entities.iter().enumerate() {
                        if entity.kind() == kind {
                            expansion.push(WorkItem::Entity {
                                slot: EntitySlot::Block(block.handle, index),
                                parent: node,
                            });
                        }
                    }
                }
                for (index, entity) in block.entities.iter().enumerate() {
                    if entity.kind() == EntityKind::BlockReference {
                        expansion.push(WorkItem::Reference {
                            slot: EntitySlot::Block(block.handle, index),
                            parent: node,
                        });
                    }
                }
                expansion.push(WorkItem::Seal { slot, node });

                self.scheduled += expansion.len();
                for item in expansion.into_iter().rev() {
                    self.queue.push_front(item);
                }
                Ok(false)
            }
        }
    }
}
