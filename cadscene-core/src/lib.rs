pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，对应 CAD 轻量多段线的 XY 顶点。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 三维点，CAD 原生坐标（Z 为"上"方向）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        /// 平面点，Z 取 0。
        #[inline]
        pub fn planar(x: f64, y: f64) -> Self {
            Self(DVec3::new(x, y, 0.0))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档范围或渲染平面上的投影范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        #[inline]
        pub fn size(&self) -> DVec2 {
            if self.is_empty() {
                DVec2::ZERO
            } else {
                self.max.as_vec2() - self.min.as_vec2()
            }
        }
    }
}

pub mod color {
    use serde::{Deserialize, Serialize};

    /// 线性 RGBA 颜色，分量范围 [0, 1]。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Color {
        pub r: f32,
        pub g: f32,
        pub b: f32,
        #[serde(default = "Color::opaque")]
        pub a: f32,
    }

    impl Color {
        pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
        pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

        #[inline]
        pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
            Self { r, g, b, a: 1.0 }
        }

        #[inline]
        pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
            Self { r, g, b, a }
        }

        #[inline]
        pub fn to_array(self) -> [f32; 4] {
            [self.r, self.g, self.b, self.a]
        }

        fn opaque() -> f32 {
            1.0
        }
    }

    impl Default for Color {
        fn default() -> Self {
            Self::WHITE
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Point3};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 块定义句柄，仅在单个文档内唯一。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct BlockHandle(u64);

    impl BlockHandle {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for BlockHandle {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:X}", self.0)
        }
    }

    /// 图纸单位，对应头部变量 `$INSUNITS` 的取值。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum Units {
        #[default]
        Unitless,
        Inches,
        Feet,
        Miles,
        Millimeters,
        Centimeters,
        Meters,
        Kilometers,
        Other(i16),
    }

    impl Units {
        pub fn from_code(code: i16) -> Self {
            match code {
                0 => Units::Unitless,
                1 => Units::Inches,
                2 => Units::Feet,
                3 => Units::Miles,
                4 => Units::Millimeters,
                5 => Units::Centimeters,
                6 => Units::Meters,
                7 => Units::Kilometers,
                other => Units::Other(other),
            }
        }

        pub fn code(self) -> i16 {
            match self {
                Units::Unitless => 0,
                Units::Inches => 1,
                Units::Feet => 2,
                Units::Miles => 3,
                Units::Millimeters => 4,
                Units::Centimeters => 5,
                Units::Meters => 6,
                Units::Kilometers => 7,
                Units::Other(code) => code,
            }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Header {
        pub units: Units,
    }

    /// 实体的运行时类型。`None` 表示不受支持的类型，不参与生成。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntityKind {
        Line,
        Polyline,
        Arc,
        Circle,
        Text,
        #[serde(rename = "mtext")]
        MText,
        BlockReference,
        None,
    }

    impl EntityKind {
        pub const ALL: [EntityKind; 8] = [
            EntityKind::Line,
            EntityKind::Polyline,
            EntityKind::Arc,
            EntityKind::Circle,
            EntityKind::Text,
            EntityKind::MText,
            EntityKind::BlockReference,
            EntityKind::None,
        ];

        pub fn name(self) -> &'static str {
            match self {
                EntityKind::Line => "Line",
                EntityKind::Polyline => "Polyline",
                EntityKind::Arc => "Arc",
                EntityKind::Circle => "Circle",
                EntityKind::Text => "Text",
                EntityKind::MText => "MText",
                EntityKind::BlockReference => "BlockReference",
                EntityKind::None => "None",
            }
        }

        /// 以折线图元呈现的类型，网格烘焙只处理这些类型。
        #[inline]
        pub fn is_linear(self) -> bool {
            matches!(
                self,
                EntityKind::Line | EntityKind::Polyline | EntityKind::Arc | EntityKind::Circle
            )
        }

        #[inline]
        pub fn is_text(self) -> bool {
            matches!(self, EntityKind::Text | EntityKind::MText)
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Polyline(Polyline),
        Arc(Arc),
        Circle(Circle),
        Text(Text),
        MText(MText),
        BlockReference(BlockReference),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Line(_) => EntityKind::Line,
                Entity::Polyline(_) => EntityKind::Polyline,
                Entity::Arc(_) => EntityKind::Arc,
                Entity::Circle(_) => EntityKind::Circle,
                Entity::Text(_) => EntityKind::Text,
                Entity::MText(_) => EntityKind::MText,
                Entity::BlockReference(_) => EntityKind::BlockReference,
            }
        }

        /// 计算实体在 CAD XY 平面上的范围，文本与块参照退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start.xy());
                    bounds.include_point(line.end.xy());
                }
                Entity::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                Entity::Arc(arc) => arc_bounds(arc, &mut bounds),
                Entity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Text(text) => bounds.include_point(text.insert.xy()),
                Entity::MText(mtext) => bounds.include_point(mtext.insert.xy()),
                Entity::BlockReference(reference) => bounds.include_point(reference.insert.xy()),
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point3,
        pub end: Point3,
    }

    /// 轻量多段线，顶点只有 XY。凸度值保留但不参与细分。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        #[serde(default)]
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point3,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point3,
        pub radius: f64,
    }

    /// 单行文字。对齐方式保留 DXF 原始码值（组码 72 / 73），由生成器解释。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point3,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        #[serde(default)]
        pub horizontal_alignment: i16,
        #[serde(default)]
        pub vertical_alignment: i16,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum FontStyle {
        #[default]
        Regular,
        Italic,
        Bold,
        BoldItalic,
    }

    /// 多行文字。`attachment_point` 为组码 71 原始值（1..=9）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point3,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub attachment_point: i16,
        #[serde(default)]
        pub font_style: FontStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub block: BlockHandle,
        pub insert: Point3,
        #[serde(default)]
        pub rotation: f64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub handle: BlockHandle,
        pub name: String,
        pub base_point: Point3,
        pub entities: Vec<Entity>,
    }

    impl BlockDefinition {
        pub fn new(handle: BlockHandle, name: impl Into<String>) -> Self {
            Self {
                handle,
                name: name.into(),
                base_point: Point3::planar(0.0, 0.0),
                entities: Vec::new(),
            }
        }

        pub fn with_entity(mut self, entity: Entity) -> Self {
            self.entities.push(entity);
            self
        }
    }

    /// 已解析的 CAD 文档：保持原始顺序的实体列表、头部信息与块表。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        #[serde(default)]
        header: Header,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        blocks: HashMap<BlockHandle, BlockDefinition>,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_units(units: Units) -> Self {
            let mut doc = Self::default();
            doc.header.units = units;
            doc
        }

        #[inline]
        pub fn header(&self) -> &Header {
            &self.header
        }

        #[inline]
        pub fn units(&self) -> Units {
            self.header.units
        }

        #[inline]
        pub fn set_units(&mut self, units: Units) {
            self.header.units = units;
        }

        pub fn add_line(&mut self, start: Point3, end: Point3) -> EntityId {
            self.add_entity(Entity::Line(Line { start, end }))
        }

        pub fn add_polyline<I>(&mut self, points: I, is_closed: bool) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let vertices = points.into_iter().map(PolylineVertex::new).collect();
            self.add_entity(Entity::Polyline(Polyline {
                vertices,
                is_closed,
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point3,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
            }))
        }

        pub fn add_circle(&mut self, center: Point3, radius: f64) -> EntityId {
            self.add_entity(Entity::Circle(Circle { center, radius }))
        }

        pub fn add_text(
            &mut self,
            insert: Point3,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
        ) -> EntityId {
            self.add_entity(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                horizontal_alignment: 0,
                vertical_alignment: 0,
            }))
        }

        pub fn add_mtext(
            &mut self,
            insert: Point3,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            attachment_point: i16,
        ) -> EntityId {
            self.add_entity(Entity::MText(MText {
                insert,
                content: content.into(),
                height,
                rotation,
                attachment_point,
                font_style: FontStyle::Regular,
            }))
        }

        pub fn add_block_reference(
            &mut self,
            block: BlockHandle,
            insert: Point3,
            rotation: f64,
        ) -> EntityId {
            self.add_entity(Entity::BlockReference(BlockReference {
                block,
                insert,
                rotation,
            }))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_block(&mut self, definition: BlockDefinition) {
            self.blocks.insert(definition.handle, definition);
        }

        #[inline]
        pub fn block(&self, handle: BlockHandle) -> Option<&BlockDefinition> {
            self.blocks.get(&handle)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        /// 按插入顺序的下标访问实体。
        #[inline]
        pub fn entity_at(&self, index: usize) -> Option<&Entity> {
            self.entities.get(index).map(|(_, entity)| entity)
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn arc_point(center: Point3, radius: f64, angle: f64) -> Point2 {
        Point2::new(
            center.x() + radius * angle.cos(),
            center.y() + radius * angle.sin(),
        )
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center.xy());
            return;
        }

        let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
        bounds.include_point(arc_point(arc.center, radius, start));
        bounds.include_point(arc_point(arc.center, radius, end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(arc_point(arc.center, radius, candidate));
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn document_stores_entities_in_order() {
            let mut doc = Document::with_units(Units::Millimeters);
            let line = doc.add_line(Point3::planar(0.0, 0.0), Point3::planar(10.0, 0.0));
            let circle = doc.add_circle(Point3::planar(5.0, 5.0), 2.0);
            let arc = doc.add_arc(Point3::planar(5.0, 0.0), 3.5, 0.0, FRAC_PI_2);
            let polyline = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(2.0, 2.0),
                    Point2::new(4.0, 0.0),
                ],
                true,
            );
            let text = doc.add_text(Point3::planar(1.0, 1.0), "Hello", 2.5, PI);

            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(arc.get(), 2);
            assert_eq!(polyline.get(), 3);
            assert_eq!(text.get(), 4);
            assert_eq!(doc.entity_count(), 5);
            assert_eq!(doc.units(), Units::Millimeters);

            let kinds: Vec<EntityKind> = doc.entities().map(|(_, e)| e.kind()).collect();
            assert_eq!(
                kinds,
                vec![
                    EntityKind::Line,
                    EntityKind::Circle,
                    EntityKind::Arc,
                    EntityKind::Polyline,
                    EntityKind::Text,
                ]
            );

            match doc.entity(arc) {
                Some(Entity::Arc(arc)) => assert!((arc.radius - 3.5).abs() < f64::EPSILON),
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
        }

        #[test]
        fn blocks_are_looked_up_by_handle() {
            let mut doc = Document::new();
            let handle = BlockHandle::new(0x2A);
            doc.add_block(BlockDefinition::new(handle, "DOOR").with_entity(Entity::Line(
                Line {
                    start: Point3::planar(0.0, 0.0),
                    end: Point3::planar(1.0, 0.0),
                },
            )));
            doc.add_block_reference(handle, Point3::planar(10.0, 0.0), 0.0);

            let block = doc.block(handle).expect("块定义应存在");
            assert_eq!(block.name, "DOOR");
            assert_eq!(block.entities.len(), 1);
            assert!(doc.block(BlockHandle::new(7)).is_none());
            assert_eq!(handle.to_string(), "2A");
        }

        #[test]
        fn units_roundtrip_through_codes() {
            for code in 0..=7 {
                assert_eq!(Units::from_code(code).code(), code);
            }
            assert_eq!(Units::from_code(4), Units::Millimeters);
            assert_eq!(Units::from_code(21), Units::Other(21));
        }

        #[test]
        fn arc_bounds_follow_counter_clockwise_sweep() {
            let mut doc = Document::new();
            // 从 270° 逆时针扫到 90°，应经过 0° 而不是 180°
            doc.add_arc(Point3::planar(0.0, 0.0), 5.0, 1.5 * PI, FRAC_PI_2);
            let bounds = doc.bounds().expect("bounds");
            assert!((bounds.max().x() - 5.0).abs() < 1e-9);
            assert!(bounds.min().x().abs() < 1e-9);
            assert!((bounds.min().y() + 5.0).abs() < 1e-9);
            assert!((bounds.max().y() - 5.0).abs() < 1e-9);
        }

        #[test]
        fn entity_kind_classification() {
            assert!(EntityKind::Circle.is_linear());
            assert!(!EntityKind::Text.is_linear());
            assert!(EntityKind::MText.is_text());
            assert!(!EntityKind::BlockReference.is_text());
            assert_eq!(EntityKind::MText.to_string(), "MText");
        }
    }
}
