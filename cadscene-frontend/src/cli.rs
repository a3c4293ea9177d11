use std::path::PathBuf;
use std::sync::Arc;

use cadscene_config::AppConfig;
use cadscene_core::document::EntityKind;
use cadscene_engine::command::{CommandBus, CommandContext, CommandRequest};
use cadscene_engine::schedule::CancelToken;
use cadscene_engine::session::DrawingSession;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, load_document};

/// CLI 前端的运行选项。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub document: Option<PathBuf>,
    /// 以协作任务逐实体推进，而不是一次阻塞绘制。
    pub cooperative: bool,
    /// 绘制完成后依次执行的命令，例如 `set_color 1 0 0`。
    pub commands: Vec<String>,
}

/// 一次 CLI 运行的统计结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliReport {
    pub source: Option<DocumentSource>,
    pub unit_scale: f64,
    /// 每种类型根节点下的图元数量，顺序与绘制顺序一致。
    pub primitives: Vec<(EntityKind, usize)>,
    pub block_templates: usize,
    pub ticks: usize,
    pub triangles: usize,
    pub command_feedback: Vec<(String, bool)>,
}

/// 加载文档、绘制、烘焙并执行命令，最后打印概览。
pub fn run(config: &AppConfig, options: &CliOptions) -> Result<CliReport, FrontendError> {
    let loaded = load_document(options.document.as_deref())?;
    let mut session = DrawingSession::from_config(config)?;
    let document = Arc::new(loaded.document);
    info!(
        entities = document.entity_count(),
        blocks = document.blocks().count(),
        cooperative = options.cooperative,
        "CLI 开始绘制"
    );

    let mut report = CliReport {
        source: Some(loaded.source),
        ..CliReport::default()
    };
    if options.cooperative {
        session.begin(Arc::clone(&document))?;
        let cancel = CancelToken::new();
        loop {
            let progress = session.step(&cancel)?;
            if progress.is_done() {
                break;
            }
            report.ticks += 1;
        }
    } else {
        session.draw(&document)?;
    }

    let command_bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };
    let commands = if options.commands.is_empty() {
        vec!["show_drawing".to_string()]
    } else {
        options.commands.clone()
    };
    for line in &commands {
        let Some(request) = parse_command(line) else {
            continue;
        };
        let response = command_bus.dispatch(&request, &mut context);
        if !response.success {
            warn!(command = %line, "CLI 命令执行失败");
        }
        let message = response.message.unwrap_or_default();
        report.command_feedback.push((message, response.success));
    }

    if let Some(drawing) = session.drawing() {
        report.unit_scale = drawing.unit_scale;
        report.block_templates = drawing.block_templates();
        for (kind, root) in drawing.kind_roots() {
            let count = session
                .scene()
                .primitives_under(root)
                .map(|primitives| primitives.len())?;
            report.primitives.push((kind, count));
        }
    }
    report.triangles = session.mesh().map_or(0, |mesh| mesh.triangle_count());

    let mut available: Vec<&str> = command_bus.available_commands().copied().collect();
    available.sort_unstable();
    println!("支持的命令: {}", available.join(", "));
    print_report(&report);
    Ok(report)
}

/// 按空白切分命令行，空行返回 `None`。
pub fn parse_command(line: &str) -> Option<CommandRequest> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    Some(CommandRequest::with_args(name, parts))
}

fn print_report(report: &CliReport) {
    println!("CAD 场景 CLI 演示");
    if let Some(source) = &report.source {
        println!("文档来源：{}", source.label());
    }
    println!("单位比例：{}", report.unit_scale);
    if report.ticks > 0 {
        println!("协作绘制步数：{}", report.ticks);
    }
    println!("各类型图元：");
    for (kind, count) in &report.primitives {
        println!("  - {kind}: {count}");
    }
    println!("块模板：{}", report.block_templates);
    println!("烘焙三角形：{}", report.triangles);
    for (message, success) in &report.command_feedback {
        let mark = if *success { "成功" } else { "失败" };
        println!("命令[{mark}]：{message}");
    }
}
