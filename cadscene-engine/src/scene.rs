//! 渲染场景的节点树。以 arena 方式储存节点，`NodeId` 只在所属 `SceneGraph` 内有效。

use std::fmt;

use cadscene_core::color::Color;
use cadscene_core::document::FontStyle;
use glam::{DAffine3, DQuat, DVec2, DVec3};

use crate::errors::DrawError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 折线图元。`points` 为渲染空间中的绝对坐标，所在节点被钉在世界原点。
#[derive(Debug, Clone, PartialEq)]
pub struct PolylinePrimitive {
    pub points: Vec<DVec3>,
    pub closed: bool,
    pub width: f64,
    pub color: Color,
    pub material: String,
    /// 图元的代表位置：直线取中点，多段线取顶点均值，圆与圆弧取圆心。
    pub anchor: DVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlignment {
    Baseline,
    Bottom,
    Middle,
    Top,
}

/// 文字标签。位置与旋转随所在节点变换，无需单独修正。
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub content: String,
    pub position: DVec3,
    /// 欧拉角（度），依次为 x、y、z。
    pub rotation_euler_deg: DVec3,
    pub pivot: DVec2,
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub font_style: FontStyle,
    pub color: Color,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Polyline(PolylinePrimitive),
    Text(TextLabel),
}

impl Primitive {
    #[inline]
    pub fn as_polyline(&self) -> Option<&PolylinePrimitive> {
        match self {
            Primitive::Polyline(polyline) => Some(polyline),
            Primitive::Text(_) => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&TextLabel> {
        match self {
            Primitive::Text(label) => Some(label),
            Primitive::Polyline(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pub translation: DVec3,
    pub rotation: DQuat,
    pub active: bool,
    pub primitive: Option<Primitive>,
}

impl Node {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            active: true,
            primitive: None,
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn local_transform(&self) -> DAffine3 {
        DAffine3::from_rotation_translation(self.rotation, self.translation)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    live: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存活的节点数量。
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DrawError> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new(name, parent)));
        self.live += 1;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, DrawError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DrawError::NodeNotFound(id.0))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DrawError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DrawError::NodeNotFound(id.0))
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], DrawError> {
        Ok(self.node(id)?.children())
    }

    pub fn set_translation(&mut self, id: NodeId, translation: DVec3) -> Result<(), DrawError> {
        self.node_mut(id)?.translation = translation;
        Ok(())
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: DQuat) -> Result<(), DrawError> {
        self.node_mut(id)?.rotation = rotation;
        Ok(())
    }

    pub fn set_primitive(&mut self, id: NodeId, primitive: Primitive) -> Result<(), DrawError> {
        self.node_mut(id)?.primitive = Some(primitive);
        Ok(())
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), DrawError> {
        self.node_mut(id)?.active = active;
        Ok(())
    }

    /// 节点及其所有祖先都处于激活状态时才视为可见。
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> Result<bool, DrawError> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            if !node.active {
                return Ok(false);
            }
            current = node.parent;
        }
        Ok(true)
    }

    /// 节点到世界空间的变换。
    pub fn world_transform(&self, id: NodeId) -> Result<DAffine3, DrawError> {
        let mut transform = DAffine3::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            transform = node.local_transform() * transform;
            current = node.parent;
        }
        Ok(transform)
    }

    #[inline]
    pub fn world_position(&self, id: NodeId) -> Result<DVec3, DrawError> {
        Ok(self.world_transform(id)?.translation)
    }

    /// 设置本地变换，使节点到世界的变换恰为单位变换。
    pub fn pin_to_world_origin(&mut self, id: NodeId) -> Result<(), DrawError> {
        let parent_world = match self.node(id)?.parent {
            Some(parent) => self.world_transform(parent)?,
            None => DAffine3::IDENTITY,
        };
        let (_, rotation, translation) = parent_world.inverse().to_scale_rotation_translation();
        let node = self.node_mut(id)?;
        node.rotation = rotation;
        node.translation = translation;
        Ok(())
    }

    /// 深拷贝 `source` 子树并挂到 `parent` 下，返回新子树的根。
    pub fn clone_subtree(
        &mut self,
        source: NodeId,
        parent: Option<NodeId>,
    ) -> Result<NodeId, DrawError> {
        let template = self.node(source)?.clone();
        let copy = self.create_node(template.name.clone(), parent)?;
        {
            let node = self.node_mut(copy)?;
            node.translation = template.translation;
            node.rotation = template.rotation;
            node.active = template.active;
            node.primitive = template.primitive;
        }
        for child in template.children {
            self.clone_subtree(child, Some(copy))?;
        }
        Ok(copy)
    }

    /// 删除节点及其全部后代，返回删除的节点数。
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<usize, DrawError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Ok(node) = self.node_mut(parent) {
                node.children.retain(|child| *child != id);
            }
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        self.live -= removed;
        Ok(removed)
    }

    /// 先序遍历 `root` 的全部后代，不含 `root` 本身。
    pub fn descendants(&self, root: NodeId) -> Result<Vec<NodeId>, DrawError> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.node(root)?.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            result.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(result)
    }

    /// `root` 子树中（含自身）所有带图元的节点，按先序排列。
    pub fn primitives_under(&self, root: NodeId) -> Result<Vec<(NodeId, &Primitive)>, DrawError> {
        let mut ids = vec![root];
        ids.extend(self.descendants(root)?);
        let mut result = Vec::new();
        for id in ids {
            if let Some(primitive) = self.node(id)?.primitive.as_ref() {
                result.push((id, primitive));
            }
        }
        Ok(result)
    }

    /// 在 `parent` 的直接子节点中按名称查找。
    pub fn find_child(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, DrawError> {
        for child in self.children(parent)? {
            if self.node(*child)?.name == name {
                return Ok(Some(*child));
            }
        }
        Ok(None)
    }
}
