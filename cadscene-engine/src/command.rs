use std::collections::HashMap;

use cadscene_core::color::Color;

use crate::session::DrawingSession;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut DrawingSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(ShowDrawingCommand { visible: true });
        bus.register(ShowDrawingCommand { visible: false });
        bus.register(ClearDrawingCommand);
        bus.register(SetColorCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

struct ShowDrawingCommand {
    visible: bool,
}

impl CommandHandler for ShowDrawingCommand {
    fn name(&self) -> &'static str {
        if self.visible {
            "show_drawing"
        } else {
            "hide_drawing"
        }
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.show(self.visible) {
            Ok(()) if self.visible => CommandResponse::ok("图纸已显示"),
            Ok(()) => CommandResponse::ok("图纸已隐藏"),
            Err(err) => CommandResponse::err(format!("切换显示失败: {err}")),
        }
    }
}

struct ClearDrawingCommand;

impl CommandHandler for ClearDrawingCommand {
    fn name(&self) -> &'static str {
        "clear_drawing"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.clear() {
            Ok(()) => CommandResponse::ok("图纸已清除"),
            Err(err) => CommandResponse::err(format!("清除图纸失败: {err}")),
        }
    }
}

/// `set_color r g b [a]`，分量取值 [0, 1]。
struct SetColorCommand;

impl SetColorCommand {
    fn parse(args: &[String]) -> Result<Color, String> {
        if !(3..=4).contains(&args.len()) {
            return Err("用法: set_color r g b [a]".to_string());
        }
        let mut components = [1.0f32; 4];
        for (slot, raw) in components.iter_mut().zip(args) {
            let value: f32 = raw
                .parse()
                .map_err(|_| format!("颜色分量无效: {raw}"))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("颜色分量超出范围 [0, 1]: {raw}"));
            }
            *slot = value;
        }
        let [r, g, b, a] = components;
        Ok(Color::rgba(r, g, b, a))
    }
}

impl CommandHandler for SetColorCommand {
    fn name(&self) -> &'static str {
        "set_color"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match Self::parse(&request.args) {
            Ok(color) => {
                context.session.change_color(color);
                CommandResponse::ok("图纸颜色已更新")
            }
            Err(message) => CommandResponse::err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawer::DrawOptions;
    use cadscene_config::{AfterBake, DrawSettings};
    use cadscene_core::document::Document;
    use cadscene_core::geometry::Point3;

    fn session_with_drawing() -> DrawingSession {
        let mut doc = Document::new();
        doc.add_line(Point3::planar(0.0, 0.0), Point3::planar(1.0, 0.0));
        let mut session =
            DrawingSession::new(DrawSettings::default(), DrawOptions::default(), AfterBake::Keep);
        session.draw(&doc).expect("draw");
        session
    }

    #[test]
    fn show_hide_and_clear_commands_work() {
        let mut session = session_with_drawing();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let response = bus.dispatch(&CommandRequest::new("hide_drawing"), &mut context);
        assert!(response.success);
        assert!(!context.session.is_visible());

        let response = bus.dispatch(&CommandRequest::new("show_drawing"), &mut context);
        assert!(response.success);
        assert!(context.session.is_visible());

        let response = bus.dispatch(&CommandRequest::new("clear_drawing"), &mut context);
        assert!(response.success);
        assert!(context.session.drawing().is_none());
    }

    #[test]
    fn set_color_validates_arguments() {
        let mut session = session_with_drawing();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let ok = bus.dispatch(
            &CommandRequest::with_args("set_color", ["1", "0.5", "0"]),
            &mut context,
        );
        assert!(ok.success);
        assert_eq!(context.session.tint(), Color::rgb(1.0, 0.5, 0.0));

        let bad = bus.dispatch(
            &CommandRequest::with_args("set_color", ["1", "red", "0"]),
            &mut context,
        );
        assert!(!bad.success);
        let out_of_range = bus.dispatch(
            &CommandRequest::with_args("set_color", ["2", "0", "0"]),
            &mut context,
        );
        assert!(!out_of_range.success);
        let unknown = bus.dispatch(&CommandRequest::new("explode"), &mut context);
        assert!(!unknown.success);
        assert_eq!(bus.available_commands().count(), 4);
    }
}
