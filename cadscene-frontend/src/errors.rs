use cadscene_config::ConfigError;
use cadscene_engine::errors::DrawError;
use cadscene_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("Bevy 前端未启用，请使用 `--features bevy_app` 编译")]
    BevyFeatureDisabled,
    #[error("加载文档失败: {0}")]
    Io(#[from] IoError),
    #[error("绘制失败: {0}")]
    Draw(#[from] DrawError),
    #[error("配置无效: {0}")]
    Config(#[from] ConfigError),
}
