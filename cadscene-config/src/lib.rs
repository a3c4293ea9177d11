use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub mod settings;

pub use settings::{
    CurveStyle, DrawSettings, EntitySetting, EntityStyle, LineStyle, SettingsConfig, TextStyle,
};

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并校验实体绘制设置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "配置文件已加载");
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `CADSCENE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("CADSCENE_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend.entities_per_frame == 0 {
            return Err(ConfigError::InvalidSettings {
                message: "frontend.entities_per_frame 必须大于 0".to_string(),
            });
        }
        DrawSettings::from_config(&self.settings).map(|_| ())
    }

    /// 构建校验后的绘制设置。
    pub fn draw_settings(&self) -> Result<DrawSettings, ConfigError> {
        DrawSettings::from_config(&self.settings)
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    #[default]
    Cli,
    Bevy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
    #[serde(default = "FrontendConfig::default_window_title")]
    pub bevy_window_title: String,
    /// 协作模式下每帧推进的实体数量。
    #[serde(default = "FrontendConfig::default_entities_per_frame")]
    pub entities_per_frame: usize,
}

impl FrontendConfig {
    fn default_window_title() -> String {
        "CAD Scene Preview".to_string()
    }

    fn default_entities_per_frame() -> usize {
        1
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_mode: FrontendMode::default(),
            bevy_window_title: Self::default_window_title(),
            entities_per_frame: Self::default_entities_per_frame(),
        }
    }
}

/// 烘焙完成后如何处理逐实体的折线图元。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfterBake {
    Keep,
    #[default]
    Deactivate,
    Destroy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrawingConfig {
    #[serde(default = "DrawingConfig::default_true")]
    pub draw_blocks: bool,
    #[serde(default = "DrawingConfig::default_true")]
    pub bake: bool,
    #[serde(default)]
    pub after_bake: AfterBake,
}

impl DrawingConfig {
    fn default_true() -> bool {
        true
    }
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            draw_blocks: true,
            bake: true,
            after_bake: AfterBake::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("绘制设置无效: {message}")]
    InvalidSettings { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadscene_core::color::Color;
    use cadscene_core::document::EntityKind;
    use std::io::Write;

    #[test]
    fn bundled_default_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/default.toml");
        let cfg = AppConfig::from_file(&path).expect("加载仓库自带配置失败");
        assert_eq!(cfg.frontend.entities_per_frame, 4);
        assert_eq!(cfg.drawing.after_bake, AfterBake::Deactivate);
        let settings = cfg.draw_settings().expect("settings");
        assert_eq!(settings.len(), 6);
        let mtext = settings.get(EntityKind::MText).expect("mtext");
        assert_eq!(mtext.effective_color(), Color::rgb(0.9, 0.8, 0.3));
    }

    #[test]
    fn defaults_are_used_without_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Cli);
        assert_eq!(cfg.frontend.entities_per_frame, 1);
        assert!(cfg.drawing.draw_blocks);
        assert!(cfg.drawing.bake);
        assert_eq!(cfg.drawing.after_bake, AfterBake::Deactivate);
        let settings = cfg.draw_settings().expect("default settings");
        assert_eq!(settings.len(), 6);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [frontend]
            default_mode = "bevy"
            bevy_window_title = "Custom"
            entities_per_frame = 16

            [drawing]
            draw_blocks = false
            after_bake = "destroy"

            [settings]
            default_color = {{ r = 0.5, g = 0.5, b = 0.5 }}
            default_material = "Unlit"

            [[settings.entities]]
            kind = "line"
            use_custom_color = true
            color = {{ r = 1.0, g = 0.0, b = 0.0 }}
            style = {{ type = "line", line_width = 0.25 }}

            [[settings.entities]]
            kind = "arc"
            style = {{ type = "curve", segment = 8 }}

            [[settings.entities]]
            kind = "mtext"
            style = {{ type = "text", font_size = 3.5 }}
            "#
        )
        .expect("write config");

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Bevy);
        assert_eq!(cfg.frontend.bevy_window_title, "Custom");
        assert_eq!(cfg.frontend.entities_per_frame, 16);
        assert!(!cfg.drawing.draw_blocks);
        assert!(cfg.drawing.bake);
        assert_eq!(cfg.drawing.after_bake, AfterBake::Destroy);

        let settings = cfg.draw_settings().expect("settings");
        assert_eq!(settings.len(), 3);
        assert_eq!(settings.default_material(), "Unlit");
        let line = settings.get(EntityKind::Line).expect("line");
        assert_eq!(line.effective_color(), Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(line.line_width(), Some(0.25));
        let arc = settings.get(EntityKind::Arc).expect("arc");
        assert_eq!(arc.segment(), Some(8));
        assert_eq!(arc.line_width(), Some(0.1));
        assert_eq!(arc.effective_color(), Color::rgb(0.5, 0.5, 0.5));
        assert!(settings.get(EntityKind::Circle).is_none());
        assert_eq!(
            settings.get(EntityKind::MText).and_then(|s| s.font_size()),
            Some(3.5)
        );
    }

    #[test]
    fn duplicate_kind_in_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [[settings.entities]]
            kind = "circle"
            style = {{ type = "curve" }}

            [[settings.entities]]
            kind = "circle"
            style = {{ type = "curve", segment = 12 }}
            "#
        )
        .expect("write config");

        match AppConfig::from_file(file.path()) {
            Err(ConfigError::InvalidSettings { message }) => assert!(message.contains("Circle")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parse_errors_carry_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[frontend\nbroken").expect("write config");
        match AppConfig::from_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
