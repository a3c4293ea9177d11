use std::collections::BTreeMap;

use cadscene_core::color::Color;
use cadscene_core::document::EntityKind;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const DEFAULT_LINE_WIDTH: f64 = 0.1;
pub const DEFAULT_CURVE_SEGMENT: u32 = 20;
pub const DEFAULT_FONT_SIZE: f64 = 2.0;
pub const DEFAULT_MATERIAL: &str = "Default-Line";

/// 直线与多段线使用的线型样式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    #[serde(default)]
    pub material: Option<String>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            material: None,
        }
    }
}

/// 圆弧与圆使用的曲线样式，`segment` 为细分段数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveStyle {
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default = "default_segment")]
    pub segment: u32,
}

impl Default for CurveStyle {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            material: None,
            segment: DEFAULT_CURVE_SEGMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default = "default_font_size")]
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityStyle {
    Line(LineStyle),
    Curve(CurveStyle),
    Text(TextStyle),
}

impl EntityStyle {
    /// 返回某类实体的内置默认样式；块参照与未支持类型没有样式。
    pub fn default_for(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Line | EntityKind::Polyline => Some(EntityStyle::Line(LineStyle::default())),
            EntityKind::Arc | EntityKind::Circle => Some(EntityStyle::Curve(CurveStyle::default())),
            EntityKind::Text | EntityKind::MText => Some(EntityStyle::Text(TextStyle::default())),
            EntityKind::BlockReference | EntityKind::None => None,
        }
    }

    fn accepts(&self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (EntityStyle::Line(_), EntityKind::Line | EntityKind::Polyline)
                | (EntityStyle::Curve(_), EntityKind::Arc | EntityKind::Circle)
                | (EntityStyle::Text(_), EntityKind::Text | EntityKind::MText)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            EntityStyle::Line(_) => "line",
            EntityStyle::Curve(_) => "curve",
            EntityStyle::Text(_) => "text",
        }
    }
}

/// 单个实体类型的绘制设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySetting {
    pub kind: EntityKind,
    #[serde(default)]
    pub use_custom_color: bool,
    #[serde(default)]
    pub color: Color,
    /// 未启用自定义颜色时使用，由 [`DrawSettings`] 从全局默认色填充。
    #[serde(skip, default)]
    pub default_color: Color,
    pub style: EntityStyle,
}

impl EntitySetting {
    pub fn new(kind: EntityKind, style: EntityStyle) -> Self {
        Self {
            kind,
            use_custom_color: false,
            color: Color::WHITE,
            default_color: Color::WHITE,
            style,
        }
    }

    pub fn with_custom_color(mut self, color: Color) -> Self {
        self.use_custom_color = true;
        self.color = color;
        self
    }

    #[inline]
    pub fn effective_color(&self) -> Color {
        if self.use_custom_color {
            self.color
        } else {
            self.default_color
        }
    }

    pub fn line_width(&self) -> Option<f64> {
        match &self.style {
            EntityStyle::Line(style) => Some(style.line_width),
            EntityStyle::Curve(style) => Some(style.line_width),
            EntityStyle::Text(_) => None,
        }
    }

    pub fn material(&self) -> Option<&str> {
        match &self.style {
            EntityStyle::Line(style) => style.material.as_deref(),
            EntityStyle::Curve(style) => style.material.as_deref(),
            EntityStyle::Text(_) => None,
        }
    }

    pub fn segment(&self) -> Option<u32> {
        match &self.style {
            EntityStyle::Curve(style) => Some(style.segment),
            _ => None,
        }
    }

    pub fn font_size(&self) -> Option<f64> {
        match &self.style {
            EntityStyle::Text(style) => Some(style.font_size),
            _ => None,
        }
    }
}

/// `[settings]` 配置段的原始形态，未经校验。
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub default_color: Color,
    #[serde(default = "default_material")]
    pub default_material: String,
    #[serde(default = "SettingsConfig::default_entities")]
    pub entities: Vec<EntitySetting>,
}

impl SettingsConfig {
    fn default_entities() -> Vec<EntitySetting> {
        EntityKind::ALL
            .into_iter()
            .filter_map(|kind| EntityStyle::default_for(kind).map(|style| EntitySetting::new(kind, style)))
            .collect()
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            default_color: Color::WHITE,
            default_material: default_material(),
            entities: Self::default_entities(),
        }
    }
}

/// 校验后的绘制设置：每种实体类型最多一条设置。
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSettings {
    default_color: Color,
    default_material: String,
    entries: BTreeMap<EntityKind, EntitySetting>,
}

impl DrawSettings {
    /// 没有任何实体设置，所有类型都会被跳过。
    pub fn empty() -> Self {
        Self {
            default_color: Color::WHITE,
            default_material: default_material(),
            entries: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &SettingsConfig) -> Result<Self, ConfigError> {
        let mut settings = Self {
            default_color: config.default_color,
            default_material: config.default_material.clone(),
            entries: BTreeMap::new(),
        };
        for entry in &config.entities {
            settings.insert(entry.clone())?;
        }
        Ok(settings)
    }

    pub fn insert(&mut self, mut setting: EntitySetting) -> Result<(), ConfigError> {
        if matches!(setting.kind, EntityKind::BlockReference | EntityKind::None) {
            return Err(ConfigError::InvalidSettings {
                message: format!("实体类型 {} 不支持绘制设置", setting.kind),
            });
        }
        if !setting.style.accepts(setting.kind) {
            return Err(ConfigError::InvalidSettings {
                message: format!(
                    "实体类型 {} 不能使用 {} 样式",
                    setting.kind,
                    setting.style.name()
                ),
            });
        }
        if setting.segment() == Some(0) {
            return Err(ConfigError::InvalidSettings {
                message: format!("实体类型 {} 的细分段数必须大于 0", setting.kind),
            });
        }
        if self.entries.contains_key(&setting.kind) {
            return Err(ConfigError::InvalidSettings {
                message: format!("实体类型 {} 的设置重复", setting.kind),
            });
        }
        setting.default_color = self.default_color;
        self.entries.insert(setting.kind, setting);
        Ok(())
    }

    /// 删除某个类型的设置，之后该类型的实体不再生成。
    pub fn remove(&mut self, kind: EntityKind) -> Option<EntitySetting> {
        self.entries.remove(&kind)
    }

    #[inline]
    pub fn get(&self, kind: EntityKind) -> Option<&EntitySetting> {
        self.entries.get(&kind)
    }

    #[inline]
    pub fn default_color(&self) -> Color {
        self.default_color
    }

    pub fn set_default_color(&mut self, color: Color) {
        self.default_color = color;
        for setting in self.entries.values_mut() {
            setting.default_color = color;
        }
    }

    #[inline]
    pub fn default_material(&self) -> &str {
        &self.default_material
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DrawSettings {
    fn default() -> Self {
        let config = SettingsConfig::default();
        let mut settings = Self {
            default_color: config.default_color,
            default_material: config.default_material,
            entries: BTreeMap::new(),
        };
        for mut entry in config.entities {
            entry.default_color = settings.default_color;
            settings.entries.insert(entry.kind, entry);
        }
        settings
    }
}

fn default_line_width() -> f64 {
    DEFAULT_LINE_WIDTH
}

fn default_segment() -> u32 {
    DEFAULT_CURVE_SEGMENT
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_material() -> String {
    DEFAULT_MATERIAL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_defaults_cover_drawable_kinds() {
        let settings = DrawSettings::default();
        assert_eq!(settings.len(), 6);
        assert!(settings.get(EntityKind::BlockReference).is_none());

        let line = settings.get(EntityKind::Line).expect("line setting");
        assert!((line.line_width().unwrap_or_default() - 0.1).abs() < 1e-12);
        let arc = settings.get(EntityKind::Arc).expect("arc setting");
        assert_eq!(arc.segment(), Some(20));
        let text = settings.get(EntityKind::MText).expect("mtext setting");
        assert_eq!(text.font_size(), Some(2.0));
        assert_eq!(text.effective_color(), Color::WHITE);
    }

    #[test]
    fn effective_color_prefers_custom_color() {
        let mut settings = DrawSettings::empty();
        settings
            .insert(
                EntitySetting::new(EntityKind::Line, EntityStyle::Line(LineStyle::default()))
                    .with_custom_color(Color::rgb(1.0, 0.0, 0.0)),
            )
            .expect("insert line");
        settings
            .insert(EntitySetting::new(
                EntityKind::Circle,
                EntityStyle::Curve(CurveStyle::default()),
            ))
            .expect("insert circle");
        settings.set_default_color(Color::rgb(0.0, 1.0, 0.0));

        let line = settings.get(EntityKind::Line).expect("line");
        assert_eq!(line.effective_color(), Color::rgb(1.0, 0.0, 0.0));
        let circle = settings.get(EntityKind::Circle).expect("circle");
        assert_eq!(circle.effective_color(), Color::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = DrawSettings::empty();
        let mismatch = settings.insert(EntitySetting::new(
            EntityKind::Arc,
            EntityStyle::Text(TextStyle::default()),
        ));
        assert!(matches!(mismatch, Err(ConfigError::InvalidSettings { .. })));

        let zero_segment = settings.insert(EntitySetting::new(
            EntityKind::Circle,
            EntityStyle::Curve(CurveStyle {
                segment: 0,
                ..CurveStyle::default()
            }),
        ));
        assert!(matches!(zero_segment, Err(ConfigError::InvalidSettings { .. })));

        settings
            .insert(EntitySetting::new(
                EntityKind::Text,
                EntityStyle::Text(TextStyle::default()),
            ))
            .expect("first text setting");
        let duplicate = settings.insert(EntitySetting::new(
            EntityKind::Text,
            EntityStyle::Text(TextStyle { font_size: 5.0 }),
        ));
        assert!(matches!(duplicate, Err(ConfigError::InvalidSettings { .. })));
        assert_eq!(settings.len(), 1);
    }
}
