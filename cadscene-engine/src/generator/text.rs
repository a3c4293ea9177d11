use cadscene_config::settings::DEFAULT_FONT_SIZE;
use cadscene_core::document::{Entity, EntityKind, FontStyle};
use glam::{DQuat, DVec2, DVec3, EulerRot};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{GenerateParams, expect_kind};
use crate::errors::DrawError;
use crate::scene::{HorizontalAlignment, NodeId, Primitive, SceneGraph, TextLabel, VerticalAlignment};
use crate::units::transform_point;

static COLOR_CODE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"\\[Cc]\d+;"));

/// 去掉多行文字中的 `\C<n>;` 颜色码以及首尾花括号。
pub fn strip_color_codes(content: &str) -> String {
    let stripped = match COLOR_CODE.as_ref() {
        Ok(pattern) => pattern.replace_all(content, ""),
        Err(_) => content.into(),
    };
    stripped.trim_matches(|c| c == '{' || c == '}').to_string()
}

/// 单行文字水平对齐（组码 72）。3/4/5 为 Aligned/Middle/Fit，标签无法表达，退化为居中。
fn horizontal_alignment(code: i16) -> HorizontalAlignment {
    match code {
        0 => HorizontalAlignment::Left,
        1 => HorizontalAlignment::Center,
        2 => HorizontalAlignment::Right,
        3..=5 => {
            warn!(code, "文字对齐方式无直接对应，按居中处理");
            HorizontalAlignment::Center
        }
        _ => {
            warn!(code, "未知的文字水平对齐方式，按居中处理");
            HorizontalAlignment::Center
        }
    }
}

/// 单行文字垂直对齐（组码 73）。
fn vertical_alignment(code: i16) -> VerticalAlignment {
    match code {
        0 => VerticalAlignment::Baseline,
        1 => VerticalAlignment::Bottom,
        2 => VerticalAlignment::Middle,
        3 => VerticalAlignment::Top,
        _ => {
            warn!(code, "未知的文字垂直对齐方式，按基线处理");
            VerticalAlignment::Baseline
        }
    }
}

fn alignment_pivot(horizontal: HorizontalAlignment, vertical: VerticalAlignment) -> DVec2 {
    let x = match horizontal {
        HorizontalAlignment::Left => 0.0,
        HorizontalAlignment::Center => 0.5,
        HorizontalAlignment::Right => 1.0,
    };
    let y = match vertical {
        VerticalAlignment::Baseline | VerticalAlignment::Bottom => 0.0,
        VerticalAlignment::Middle => 0.5,
        VerticalAlignment::Top => 1.0,
    };
    DVec2::new(x, y)
}

/// 多行文字附着点（组码 71，1..=9）到轴心与对齐方式的 3×3 映射。
pub fn attachment_pivot(code: i16) -> (DVec2, HorizontalAlignment, VerticalAlignment) {
    let (row, column) = match code {
        1..=9 => ((code - 1) / 3, (code - 1) % 3),
        _ => {
            warn!(code, "未知的多行文字附着点，按左上角处理");
            (0, 0)
        }
    };
    let vertical = match row {
        0 => VerticalAlignment::Top,
        1 => VerticalAlignment::Middle,
        _ => VerticalAlignment::Bottom,
    };
    let horizontal = match column {
        0 => HorizontalAlignment::Left,
        1 => HorizontalAlignment::Center,
        _ => HorizontalAlignment::Right,
    };
    (alignment_pivot(horizontal, vertical), horizontal, vertical)
}

/// 文字平铺在渲染平面上：x 轴固定 90°，z 轴取 CAD 旋转角。
fn label_rotation(rotation: f64) -> (DVec3, DQuat) {
    let euler = DVec3::new(90.0, 0.0, rotation.to_degrees());
    let quat = DQuat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    );
    (euler, quat)
}

struct LabelSpec {
    kind: EntityKind,
    content: String,
    local_position: DVec3,
    rotation: f64,
    pivot: DVec2,
    horizontal: HorizontalAlignment,
    vertical: VerticalAlignment,
    font_style: FontStyle,
}

fn spawn_label(
    scene: &mut SceneGraph,
    parent: NodeId,
    spec: LabelSpec,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let (euler, quat) = label_rotation(spec.rotation);
    let label = TextLabel {
        content: spec.content,
        position: spec.local_position,
        rotation_euler_deg: euler,
        pivot: spec.pivot,
        horizontal: spec.horizontal,
        vertical: spec.vertical,
        font_style: spec.font_style,
        color: params.setting.effective_color(),
        size: params.setting.font_size().unwrap_or(DEFAULT_FONT_SIZE),
    };

    let node = scene.create_node(spec.kind.name(), Some(parent))?;
    scene.set_translation(node, spec.local_position)?;
    scene.set_rotation(node, quat)?;
    scene.set_primitive(node, Primitive::Text(label))?;
    Ok(node)
}

pub fn generate_text(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::Text(text) = entity else {
        return Err(expect_kind(entity, EntityKind::Text));
    };
    let horizontal = horizontal_alignment(text.horizontal_alignment);
    let vertical = vertical_alignment(text.vertical_alignment);
    let spec = LabelSpec {
        kind: EntityKind::Text,
        content: text.content.clone(),
        local_position: transform_point(text.insert, params.unit_scale),
        rotation: text.rotation,
        pivot: alignment_pivot(horizontal, vertical),
        horizontal,
        vertical,
        font_style: FontStyle::Regular,
    };
    spawn_label(scene, parent, spec, params)
}

pub fn generate_mtext(
    scene: &mut SceneGraph,
    entity: &Entity,
    parent: NodeId,
    params: &GenerateParams<'_>,
) -> Result<NodeId, DrawError> {
    let Entity::MText(mtext) = entity else {
        return Err(expect_kind(entity, EntityKind::MText));
    };
    let (pivot, horizontal, vertical) = attachment_pivot(mtext.attachment_point);
    let spec = LabelSpec {
        kind: EntityKind::MText,
        content: strip_color_codes(&mtext.content),
        local_position: transform_point(mtext.insert, params.unit_scale),
        rotation: mtext.rotation,
        pivot,
        horizontal,
        vertical,
        font_style: mtext.font_style,
    };
    spawn_label(scene, parent, spec, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{label_of, setting};
    use cadscene_core::document::{MText, Text};
    use cadscene_core::geometry::Point3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn color_codes_and_braces_are_removed() {
        assert_eq!(strip_color_codes(r"{\C1;Red \c256;text}"), "Red text");
        assert_eq!(strip_color_codes("plain"), "plain");
        assert_eq!(strip_color_codes(r"{{\C12;nested}}"), "nested");
    }

    #[test]
    fn attachment_grid_maps_to_pivots() {
        let expected = [
            (1, DVec2::new(0.0, 1.0)),
            (2, DVec2::new(0.5, 1.0)),
            (3, DVec2::new(1.0, 1.0)),
            (4, DVec2::new(0.0, 0.5)),
            (5, DVec2::new(0.5, 0.5)),
            (6, DVec2::new(1.0, 0.5)),
            (7, DVec2::new(0.0, 0.0)),
            (8, DVec2::new(0.5, 0.0)),
            (9, DVec2::new(1.0, 0.0)),
        ];
        for (code, pivot) in expected {
            assert_eq!(attachment_pivot(code).0, pivot, "attachment {code}");
        }
        assert_eq!(attachment_pivot(42).0, DVec2::new(0.0, 1.0));
    }

    #[test]
    fn alignment_fallbacks() {
        assert_eq!(horizontal_alignment(2), HorizontalAlignment::Right);
        assert_eq!(horizontal_alignment(5), HorizontalAlignment::Center);
        assert_eq!(horizontal_alignment(17), HorizontalAlignment::Center);
        assert_eq!(vertical_alignment(3), VerticalAlignment::Top);
        assert_eq!(vertical_alignment(-1), VerticalAlignment::Baseline);
    }

    #[test]
    fn text_label_lies_flat_at_insertion_point() {
        let setting = setting(EntityKind::Text);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 0.01,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let entity = Entity::Text(Text {
            insert: Point3::new(100.0, 300.0, 0.0),
            content: "ROOM".to_string(),
            height: 2.5,
            rotation: FRAC_PI_2,
            horizontal_alignment: 1,
            vertical_alignment: 2,
        });

        let node = generate_text(&mut scene, &entity, root, &params).expect("text");
        let label = label_of(&scene, node);
        assert_eq!(label.content, "ROOM");
        assert!((label.position - DVec3::new(1.0, 0.0, 3.0)).length() < 1e-12);
        assert!((label.rotation_euler_deg - DVec3::new(90.0, 0.0, 90.0)).length() < 1e-9);
        assert_eq!(label.pivot, DVec2::new(0.5, 0.5));
        assert!((label.size - 2.0).abs() < 1e-12);

        let world = scene.world_position(node).expect("world");
        assert!((world - DVec3::new(1.0, 0.0, 3.0)).length() < 1e-12);
        // 文字法线（本地 z）绕 x 轴旋转 90° 后指向 -y
        let normal = scene.node(node).expect("node").rotation * DVec3::Z;
        assert!((normal - DVec3::NEG_Y).length() < 1e-9);
    }

    #[test]
    fn mtext_keeps_font_style_and_clean_content() {
        let setting = setting(EntityKind::MText);
        let params = GenerateParams {
            setting: &setting,
            default_material: "Default-Line",
            unit_scale: 1.0,
        };
        let mut scene = SceneGraph::new();
        let root = scene.create_node("root", None).expect("root");
        let entity = Entity::MText(MText {
            insert: Point3::planar(1.0, 2.0),
            content: r"{\C3;Note}".to_string(),
            height: 1.0,
            rotation: 0.0,
            attachment_point: 9,
            font_style: FontStyle::Bold,
        });

        let node = generate_mtext(&mut scene, &entity, root, &params).expect("mtext");
        let label = label_of(&scene, node);
        assert_eq!(label.content, "Note");
        assert_eq!(label.font_style, FontStyle::Bold);
        assert_eq!(label.horizontal, HorizontalAlignment::Right);
        assert_eq!(label.vertical, VerticalAlignment::Bottom);
        assert_eq!(label.pivot, DVec2::new(1.0, 0.0));
    }
}
