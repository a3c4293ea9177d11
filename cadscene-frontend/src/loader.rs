use std::env;
use std::f64::consts::{FRAC_PI_2, PI};
use std::path::{Path, PathBuf};

use cadscene_core::document::{BlockDefinition, BlockHandle, Document, Entity, Line, Units};
use cadscene_core::geometry::{Point2, Point3};
use cadscene_io::{DocumentLoader, JsonFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 未显式指定文档时读取的环境变量。
pub const DOCUMENT_ENV: &str = "CADSCENE_DOCUMENT";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Json(PathBuf),
    Demo,
}

impl DocumentSource {
    pub fn label(&self) -> String {
        match self {
            DocumentSource::Json(path) => format!("JSON: {}", path.display()),
            DocumentSource::Demo => "内置示例".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub source: DocumentSource,
}

/// 加载文档：显式路径失败时返回错误；否则尝试环境变量 `CADSCENE_DOCUMENT`，
/// 失败则回退到内置示例。
pub fn load_document(explicit: Option<&Path>) -> Result<LoadedDocument, FrontendError> {
    let loader = JsonFacade::new();
    if let Some(path) = explicit {
        let document = loader.load(path)?;
        info!(path = %path.display(), "从快照加载文档成功");
        return Ok(LoadedDocument {
            document,
            source: DocumentSource::Json(path.to_path_buf()),
        });
    }

    if let Some(path) = env::var_os(DOCUMENT_ENV) {
        let path = PathBuf::from(path);
        match loader.load(&path) {
            Ok(document) => {
                info!(path = %path.display(), "从快照加载文档成功");
                return Ok(LoadedDocument {
                    document,
                    source: DocumentSource::Json(path),
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载快照失败，回退到内置示例");
            }
        }
    }

    Ok(LoadedDocument {
        document: demo_document(),
        source: DocumentSource::Demo,
    })
}

/// 内置示例：毫米单位的小户型平面，包含全部受支持的实体类型与两处门块参照。
pub fn demo_document() -> Document {
    let mut doc = Document::with_units(Units::Millimeters);

    let door = BlockHandle::new(0x2A);
    let mut door_block = BlockDefinition::new(door, "DOOR-900").with_entity(Entity::Line(Line {
        start: Point3::planar(0.0, 0.0),
        end: Point3::planar(0.0, 900.0),
    }));
    door_block
        .entities
        .push(Entity::Arc(cadscene_core::document::Arc {
            center: Point3::planar(0.0, 0.0),
            radius: 900.0,
            start_angle: 0.0,
            end_angle: FRAC_PI_2,
        }));
    doc.add_block(door_block);

    doc.add_polyline(
        [
            Point2::new(0.0, 0.0),
            Point2::new(6000.0, 0.0),
            Point2::new(6000.0, 4000.0),
            Point2::new(0.0, 4000.0),
        ],
        true,
    );
    doc.add_line(Point3::planar(3600.0, 0.0), Point3::planar(3600.0, 4000.0));
    doc.add_circle(Point3::planar(1800.0, 2000.0), 450.0);
    doc.add_arc(Point3::planar(4800.0, 2000.0), 600.0, 1.5 * PI, FRAC_PI_2);
    doc.add_text(Point3::planar(300.0, 300.0), "A-101", 200.0, 0.0);
    doc.add_mtext(
        Point3::planar(1800.0, 3200.0),
        r"{\C1;客厅}",
        250.0,
        0.0,
        5,
    );
    doc.add_block_reference(door, Point3::planar(1000.0, 0.0), 0.0);
    doc.add_block_reference(door, Point3::planar(3600.0, 2500.0), FRAC_PI_2);
    doc
}
