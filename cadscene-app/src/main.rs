use std::path::PathBuf;
use std::process::ExitCode;

use cadscene_config::{AppConfig, ConfigError, FrontendMode};
use cadscene_frontend::CliOptions;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// CAD 图纸到可渲染场景的预览工具。
#[derive(Debug, Parser)]
#[command(name = "cadscene", version)]
struct Args {
    /// 以 CLI 模式运行
    #[arg(long, conflicts_with = "bevy")]
    cli: bool,
    /// 以 Bevy 桌面模式运行（需要 `bevy_app` 特性）
    #[arg(long)]
    bevy: bool,
    /// 配置文件路径
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 文档快照（JSON）路径
    #[arg(long, value_name = "PATH")]
    document: Option<PathBuf>,
    /// CLI 模式下逐实体协作绘制
    #[arg(long)]
    cooperative: bool,
    /// 绘制完成后执行的命令，可重复，例如 `--command "set_color 1 0 0"`
    #[arg(long = "command", value_name = "COMMAND")]
    commands: Vec<String>,
}

impl Args {
    fn mode_override(&self) -> Option<FrontendMode> {
        if self.bevy {
            Some(FrontendMode::Bevy)
        } else if self.cli {
            Some(FrontendMode::Cli)
        } else {
            None
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动 CAD 场景应用");

    let options = CliOptions {
        document: args.document.clone(),
        cooperative: args.cooperative,
        commands: args.commands.clone(),
    };
    let mode = args.mode_override().unwrap_or(config.frontend.default_mode);
    match mode {
        FrontendMode::Bevy => {
            info!("以 Bevy 模式启动");
            if let Err(err) = cadscene_frontend::launch_bevy_desktop(&config, &options) {
                error!(error = %err, "无法启动 Bevy 前端");
                return ExitCode::FAILURE;
            }
        }
        FrontendMode::Cli => {
            info!("以 CLI 模式启动");
            if let Err(err) = cadscene_frontend::run_cli_demo(&config, &options) {
                error!(error = %err, "执行 CLI 演示失败");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::InvalidSettings { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
