use std::sync::Arc;

use cadscene_config::{AfterBake, AppConfig, ConfigError, DrawSettings};
use cadscene_core::color::Color;
use cadscene_core::document::Document;
use tracing::{debug, info};

use crate::bake::{Mesh, bake_drawing};
use crate::drawer::{DrawOptions, DrawTask, Drawing, draw};
use crate::errors::DrawError;
use crate::scene::SceneGraph;
use crate::schedule::{CancelToken, Progress};

/// 持有场景与最近一次绘制的会话，对外提供绘制、烘焙、显隐、着色与清理。
#[derive(Debug)]
pub struct DrawingSession {
    settings: Arc<DrawSettings>,
    options: DrawOptions,
    bake_enabled: bool,
    after_bake: AfterBake,
    scene: SceneGraph,
    drawing: Option<Drawing>,
    task: Option<DrawTask>,
    mesh: Option<Mesh>,
    tint: Color,
    visible: bool,
}

impl DrawingSession {
    pub fn new(settings: DrawSettings, options: DrawOptions, after_bake: AfterBake) -> Self {
        Self {
            settings: Arc::new(settings),
            options,
            bake_enabled: true,
            after_bake,
            scene: SceneGraph::new(),
            drawing: None,
            task: None,
            mesh: None,
            tint: Color::WHITE,
            visible: true,
        }
    }

    /// 根据应用配置创建会话。
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let settings = config.draw_settings()?;
        let options = DrawOptions {
            draw_blocks: config.drawing.draw_blocks,
        };
        let mut session = Self::new(settings, options, config.drawing.after_bake);
        session.bake_enabled = config.drawing.bake;
        Ok(session)
    }

    #[inline]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    #[inline]
    pub fn settings(&self) -> &DrawSettings {
        &self.settings
    }

    #[inline]
    pub fn drawing(&self) -> Option<&Drawing> {
        self.drawing.as_ref()
    }

    #[inline]
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    #[inline]
    pub fn tint(&self) -> Color {
        self.tint
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// 已完成的绘制，或协作任务中正在构建的绘制。
    pub fn current_drawing(&self) -> Option<&Drawing> {
        self.drawing
            .as_ref()
            .or_else(|| self.task.as_ref().map(DrawTask::drawing))
    }

    /// 当前绘制使用的单位比例；没有绘制时为 `None`。
    pub fn unit_scale(&self) -> Option<f64> {
        self.current_drawing().map(|drawing| drawing.unit_scale)
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.task.is_some()
    }

    /// 协作任务的进度（已处理、已排队）。
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.task.as_ref().map(DrawTask::progress)
    }

    /// 阻塞绘制整个文档，替换之前的绘制；配置启用时随后烘焙。
    pub fn draw(&mut self, document: &Document) -> Result<&Drawing, DrawError> {
        self.clear()?;
        let drawing = draw(&mut self.scene, document, &self.settings, self.options)?;
        let drawing = self.complete(drawing)?;
        Ok(drawing)
    }

    /// 开始协作绘制，之后由宿主按帧调用 [`DrawingSession::step`]。
    pub fn begin(&mut self, document: Arc<Document>) -> Result<(), DrawError> {
        self.clear()?;
        let task = DrawTask::new(
            &mut self.scene,
            document,
            Arc::clone(&self.settings),
            self.options,
        )?;
        self.task = Some(task);
        Ok(())
    }

    /// 推进协作绘制一个实体。任务完成时自动烘焙；取消时任务被丢弃，已生成的图元保留。
    pub fn step(&mut self, cancel: &CancelToken) -> Result<Progress, DrawError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(Progress::Done);
        };
        match task.step(&mut self.scene, cancel) {
            Ok(Progress::Pending) => Ok(Progress::Pending),
            Ok(Progress::Done) => {
                if let Some(task) = self.task.take() {
                    self.complete(task.into_drawing())?;
                }
                Ok(Progress::Done)
            }
            Err(err) => {
                if let Some(task) = self.task.take() {
                    self.drawing = Some(task.into_drawing());
                }
                Err(err)
            }
        }
    }

    fn complete(&mut self, drawing: Drawing) -> Result<&Drawing, DrawError> {
        if self.bake_enabled {
            let mesh = bake_drawing(&mut self.scene, &drawing, self.after_bake)?;
            self.mesh = Some(mesh);
        }
        self.scene.set_active(drawing.root, self.visible)?;
        Ok(&*self.drawing.insert(drawing))
    }

    /// 对当前绘制重新烘焙。烘焙后的折线已被停用或移除时沿用已有网格。
    pub fn bake(&mut self) -> Result<Option<&Mesh>, DrawError> {
        let Some(drawing) = self.drawing.as_ref() else {
            return Ok(None);
        };
        if self.after_bake != AfterBake::Keep && self.mesh.is_some() {
            debug!(after = ?self.after_bake, "折线图元已在烘焙后处理，沿用已有网格");
            return Ok(self.mesh.as_ref());
        }
        let mesh = bake_drawing(&mut self.scene, drawing, self.after_bake)?;
        Ok(Some(&*self.mesh.insert(mesh)))
    }

    pub fn show(&mut self, visible: bool) -> Result<(), DrawError> {
        self.visible = visible;
        let root = self.current_drawing().map(|drawing| drawing.root);
        if let Some(root) = root {
            self.scene.set_active(root, visible)?;
        }
        debug!(visible, "切换绘制显示状态");
        Ok(())
    }

    /// 设置烘焙网格的材质颜色。
    pub fn change_color(&mut self, color: Color) {
        self.tint = color;
        debug!(r = color.r, g = color.g, b = color.b, a = color.a, "烘焙网格颜色已更新");
    }

    /// 移除当前绘制、未完成的任务与烘焙网格，颜色恢复为白色。
    pub fn clear(&mut self) -> Result<(), DrawError> {
        let root = self
            .drawing
            .take()
            .or_else(|| self.task.take().map(DrawTask::into_drawing))
            .map(|drawing| drawing.root);
        self.task = None;
        if let Some(root) = root {
            if self.scene.contains(root) {
                let removed = self.scene.remove_subtree(root)?;
                info!(removed, "已清除当前绘制");
            }
        }
        self.mesh = None;
        self.tint = Color::WHITE;
        Ok(())
    }
}
