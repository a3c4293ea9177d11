pub mod cli;
pub mod errors;
pub mod loader;

#[cfg(feature = "bevy_app")]
pub mod bevy_app;

use cadscene_config::AppConfig;
use errors::FrontendError;
use tracing::info;

pub use cli::{CliOptions, CliReport};

/// 运行 CLI 演示并返回统计结果。
pub fn run_cli_demo(config: &AppConfig, options: &CliOptions) -> Result<CliReport, FrontendError> {
    info!("启动 CLI 演示前端");
    cli::run(config, options)
}

/// 启动 Bevy + egui 桌面前端，若未启用 `bevy_app` 特性则返回错误。
pub fn launch_bevy_desktop(config: &AppConfig, options: &CliOptions) -> Result<(), FrontendError> {
    let title = config.frontend.bevy_window_title.clone();
    launch_bevy_desktop_with_title(config, options, &title)
}

/// 允许自定义窗口标题的 Bevy 前端启动。
pub fn launch_bevy_desktop_with_title(
    config: &AppConfig,
    options: &CliOptions,
    title: &str,
) -> Result<(), FrontendError> {
    #[cfg(feature = "bevy_app")]
    {
        info!(title, "启动 Bevy 桌面前端");
        bevy_app::launch(config, options.document.as_deref(), title)
    }
    #[cfg(not(feature = "bevy_app"))]
    {
        let _ = (config, options, title);
        Err(FrontendError::BevyFeatureDisabled)
    }
}
