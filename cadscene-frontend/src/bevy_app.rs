use std::path::Path;
use std::sync::Arc;

use bevy::asset::RenderAssetUsages;
use bevy::input::ButtonInput;
use bevy::mesh::Indices;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use bevy::sprite::Anchor;
use bevy::window::PresentMode;
use bevy_egui::{EguiContexts, EguiPlugin, egui};
use cadscene_config::AppConfig;
use cadscene_core::document::Document;
use cadscene_engine::bake::Mesh as BakedMesh;
use cadscene_engine::command::{CommandBus, CommandContext, CommandRequest};
use cadscene_engine::errors::DrawError;
use cadscene_engine::scene::{PolylinePrimitive, Primitive, TextLabel};
use cadscene_engine::schedule::{CancelToken, Progress};
use cadscene_engine::session::DrawingSession;
use glam::{DAffine3, DVec3};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DocumentSource, load_document};

/// 文字以固定字号排版，再按标签尺寸缩放到世界单位。
const LABEL_FONT_SIZE: f32 = 64.0;
const LINE_DEPTH: f32 = 0.0;
const MESH_DEPTH: f32 = 0.5;
const LABEL_DEPTH: f32 = 1.0;

#[derive(Resource)]
struct SessionResource {
    session: DrawingSession,
    document: Arc<Document>,
    source: DocumentSource,
    cancel: CancelToken,
    entities_per_frame: usize,
    last_command_feedback: Option<String>,
}

#[derive(Resource)]
struct CommandBusResource(CommandBus);

#[derive(Resource, Clone)]
struct RenderAssets {
    line_material: Handle<ColorMaterial>,
    mesh_material: Handle<ColorMaterial>,
}

#[derive(Component)]
struct MainCamera;

/// 由会话状态生成的显示实体，每次状态变化时整体重建。
#[derive(Component)]
struct DrawingVisual;

pub fn launch(config: &AppConfig, document: Option<&Path>, title: &str) -> Result<(), FrontendError> {
    let loaded = load_document(document)?;
    let document = Arc::new(loaded.document);
    let mut session = DrawingSession::from_config(config)?;
    session.begin(Arc::clone(&document))?;

    let exit = App::new()
        .insert_resource(SessionResource {
            session,
            document,
            source: loaded.source,
            cancel: CancelToken::new(),
            entities_per_frame: config.frontend.entities_per_frame.max(1),
            last_command_feedback: None,
        })
        .insert_resource(CommandBusResource(CommandBus::new()))
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: title.into(),
                present_mode: PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_systems(Startup, setup_camera)
        .add_systems(Startup, setup_render_assets)
        .add_systems(Update, handle_keyboard_commands)
        .add_systems(Update, advance_drawing.after(handle_keyboard_commands))
        .add_systems(Update, sync_visuals.after(advance_drawing))
        .add_systems(Update, egui_overlay)
        .run();
    if exit.is_error() {
        warn!(?exit, "Bevy 前端异常退出");
    }
    Ok(())
}

/// 俯视图：渲染空间的 (x, z) 映射为屏幕平面的 (x, y)。
fn plan_point(point: DVec3) -> Vec3 {
    Vec3::new(point.x as f32, point.z as f32, 0.0)
}

fn setup_camera(mut commands: Commands, state: Res<SessionResource>) {
    let mut transform = Transform::from_xyz(0.0, 0.0, 999.9);
    let mut projection = OrthographicProjection::default_2d();
    let scale = state.session.unit_scale().unwrap_or(1.0);
    if let Some(bounds) = state.document.bounds() {
        let min = bounds.min();
        let max = bounds.max();
        let width = ((max.x() - min.x()) * scale) as f32;
        let height = ((max.y() - min.y()) * scale) as f32;
        let viewport_height = height.max(width).max(1.0) * 1.2;
        transform.translation.x = (bounds.center().x() * scale) as f32;
        transform.translation.y = (bounds.center().y() * scale) as f32;
        projection.scaling_mode = bevy::camera::ScalingMode::FixedVertical { viewport_height };
    }
    commands.spawn((
        Camera2d,
        MainCamera,
        Projection::Orthographic(projection),
        transform,
        GlobalTransform::default(),
    ));
}

fn setup_render_assets(mut commands: Commands, mut materials: ResMut<Assets<ColorMaterial>>) {
    let line_material = materials.add(ColorMaterial::from(Color::WHITE));
    let mesh_material = materials.add(ColorMaterial::from(Color::WHITE));
    commands.insert_resource(RenderAssets {
        line_material,
        mesh_material,
    });
}

fn advance_drawing(mut state: ResMut<SessionResource>) {
    if !state.session.is_drawing() {
        return;
    }
    let state = &mut *state;
    for _ in 0..state.entities_per_frame {
        match state.session.step(&state.cancel) {
            Ok(Progress::Pending) => {}
            Ok(Progress::Done) => {
                info!("协作绘制完成");
                state.last_command_feedback = Some("绘制完成".to_string());
                break;
            }
            Err(DrawError::Cancelled) => {
                info!("协作绘制已取消");
                state.last_command_feedback = Some("绘制已取消".to_string());
                break;
            }
            Err(err) => {
                warn!(error = %err, "协作绘制失败");
                state.last_command_feedback = Some(format!("绘制失败: {err}"));
                break;
            }
        }
    }
}

fn handle_keyboard_commands(
    keys: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<SessionResource>,
    command_bus: Res<CommandBusResource>,
) {
    if keys.just_pressed(KeyCode::Escape) {
        state.cancel.cancel();
    }
    if keys.just_pressed(KeyCode::KeyH) {
        let name = if state.session.is_visible() {
            "hide_drawing"
        } else {
            "show_drawing"
        };
        dispatch_command(&command_bus.0, &mut state, name);
    }
    if keys.just_pressed(KeyCode::KeyC) {
        dispatch_command(&command_bus.0, &mut state, "clear_drawing");
    }
    if keys.just_pressed(KeyCode::KeyR) {
        restart_drawing(&mut state);
    }
}

fn restart_drawing(state: &mut SessionResource) {
    state.cancel = CancelToken::new();
    match state.session.begin(Arc::clone(&state.document)) {
        Ok(()) => {
            info!("重新开始绘制");
            state.last_command_feedback = Some("重新绘制".to_string());
        }
        Err(err) => {
            warn!(error = %err, "无法重新开始绘制");
            state.last_command_feedback = Some(format!("重新绘制失败: {err}"));
        }
    }
}

fn dispatch_command(command_bus: &CommandBus, state: &mut SessionResource, name: &str) {
    let request = CommandRequest::new(name);
    let mut context = CommandContext {
        session: &mut state.session,
    };
    let response = command_bus.dispatch(&request, &mut context);
    let message = response
        .message
        .unwrap_or_else(|| "命令未返回消息".to_string());
    if response.success {
        info!(command = name, message = %message, "命令执行成功");
        state.last_command_feedback = Some(format!("Ok({name}): {message}"));
    } else {
        warn!(command = name, message = %message, "命令执行失败");
        state.last_command_feedback = Some(format!("Err({name}): {message}"));
    }
}

fn sync_visuals(
    mut commands: Commands,
    state: Res<SessionResource>,
    visuals: Query<Entity, With<DrawingVisual>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    render_assets: Res<RenderAssets>,
) {
    if !state.is_changed() {
        return;
    }
    for entity in visuals.iter() {
        commands.entity(entity).despawn();
    }

    let session = &state.session;
    let tint = session.tint();
    if let Some(material) = materials.get_mut(&render_assets.mesh_material) {
        material.color = Color::srgba(tint.r, tint.g, tint.b, tint.a);
    }

    let Some(drawing) = session.current_drawing() else {
        return;
    };
    let scene = session.scene();
    let baked = session.mesh().filter(|mesh| !mesh.is_empty());
    if let Some(mesh) = baked {
        if session.is_visible() {
            commands.spawn((
                Mesh2d(meshes.add(baked_mesh_to_bevy(mesh))),
                MeshMaterial2d(render_assets.mesh_material.clone()),
                Transform::from_xyz(0.0, 0.0, MESH_DEPTH),
                DrawingVisual,
            ));
        }
    }

    let Ok(primitives) = scene.primitives_under(drawing.root) else {
        return;
    };
    for (node, primitive) in primitives {
        if !matches!(scene.is_active_in_hierarchy(node), Ok(true)) {
            continue;
        }
        let Ok(to_world) = scene.world_transform(node) else {
            continue;
        };
        match primitive {
            // 烘焙后折线已并入网格
            Primitive::Polyline(_) if baked.is_some() => {}
            Primitive::Polyline(polyline) => {
                if polyline.points.len() < 2 {
                    continue;
                }
                commands.spawn((
                    Mesh2d(meshes.add(polyline_to_line_strip(polyline, &to_world))),
                    MeshMaterial2d(render_assets.line_material.clone()),
                    Transform::from_xyz(0.0, 0.0, LINE_DEPTH),
                    DrawingVisual,
                ));
            }
            Primitive::Text(label) => spawn_label(&mut commands, label, &to_world),
        }
    }
}

fn baked_mesh_to_bevy(baked: &BakedMesh) -> Mesh {
    let positions: Vec<[f32; 3]> = baked
        .positions
        .iter()
        .map(|p| plan_point(*p).to_array())
        .collect();
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, baked.colors.clone());
    mesh.insert_indices(Indices::U32(baked.indices.clone()));
    mesh
}

fn polyline_to_line_strip(polyline: &PolylinePrimitive, to_world: &DAffine3) -> Mesh {
    let positions: Vec<[f32; 3]> = polyline
        .points
        .iter()
        .map(|p| plan_point(to_world.transform_point3(*p)).to_array())
        .collect();
    let colors = vec![polyline.color.to_array(); positions.len()];
    let mut mesh = Mesh::new(PrimitiveTopology::LineStrip, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh
}

fn spawn_label(commands: &mut Commands, label: &TextLabel, to_world: &DAffine3) {
    let origin = plan_point(to_world.translation);
    // 标签节点的局部 x 轴即文字书写方向
    let direction = to_world.transform_vector3(DVec3::X);
    let angle = direction.z.atan2(direction.x) as f32;
    let scale = (label.size as f32 / LABEL_FONT_SIZE).max(f32::EPSILON);

    let mut transform = Transform::from_xyz(origin.x, origin.y, LABEL_DEPTH);
    transform.rotation = Quat::from_rotation_z(angle);
    transform.scale = Vec3::splat(scale);
    let color = label.color;
    commands.spawn((
        Text2d::new(label.content.clone()),
        TextFont {
            font_size: LABEL_FONT_SIZE,
            ..default()
        },
        TextColor(Color::srgba(color.r, color.g, color.b, color.a)),
        Anchor(Vec2::new(
            label.pivot.x as f32 - 0.5,
            label.pivot.y as f32 - 0.5,
        )),
        transform,
        DrawingVisual,
    ));
}

fn egui_overlay(
    mut contexts: EguiContexts,
    mut state: ResMut<SessionResource>,
    command_bus: Res<CommandBusResource>,
) {
    let source_label = state.source.label();
    let entity_count = state.document.entity_count();
    let block_count = state.document.blocks().count();
    let progress = state.session.progress();
    let unit_scale = state.session.unit_scale();
    let triangles = state.session.mesh().map(BakedMesh::triangle_count);
    let templates = state
        .session
        .current_drawing()
        .map(|drawing| drawing.block_templates());
    let visible = state.session.is_visible();
    let mut commands: Vec<&str> = command_bus.0.available_commands().copied().collect();
    commands.sort_unstable();

    let mut cancel_clicked = false;
    let mut redraw_clicked = false;
    if let Ok(ctx) = contexts.ctx_mut() {
        egui::Window::new("CAD 场景预览").show(ctx, |ui| {
            ui.label(format!("文档来源：{source_label}"));
            ui.label(format!("实体数：{entity_count}"));
            ui.label(format!("块定义：{block_count}"));
            if let Some(scale) = unit_scale {
                ui.label(format!("单位比例：{scale}"));
            }
            match progress {
                Some((processed, scheduled)) => {
                    let fraction = if scheduled == 0 {
                        0.0
                    } else {
                        processed as f32 / scheduled as f32
                    };
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .text(format!("绘制中 {processed}/{scheduled}")),
                    );
                    cancel_clicked = ui.button("取消 (Esc)").clicked();
                }
                None => {
                    if let Some(count) = triangles {
                        ui.label(format!("烘焙三角形：{count}"));
                    }
                    if let Some(count) = templates {
                        ui.label(format!("块模板：{count}"));
                    }
                    redraw_clicked = ui.button("重新绘制 (R)").clicked();
                }
            }
            ui.label(format!("显示：{}", if visible { "是" } else { "否" }));
            ui.separator();
            ui.label(format!("可用命令：{}", commands.join(", ")));
            ui.label("快捷键：Esc 取消，H 显隐，C 清除，R 重绘");
            if let Some(feedback) = &state.last_command_feedback {
                ui.label(format!("最近命令：{feedback}"));
            }
        });
    }

    if cancel_clicked {
        state.cancel.cancel();
    }
    if redraw_clicked {
        restart_drawing(&mut state);
    }
}
