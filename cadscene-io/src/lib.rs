//! 读写已解析文档的 JSON 快照。CAD 二进制格式的解析由外部解析器完成。

use std::fs;
use std::path::{Path, PathBuf};

use cadscene_core::document::{Document, Entity};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode document {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// JSON 快照格式，`pretty` 控制写出时是否缩进。
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFacade {
    pretty: bool,
}

impl JsonFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn decode(&self, content: &str, path: &Path) -> Result<Document, IoError> {
        let document: Document =
            serde_json::from_str(content).map_err(|source| IoError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        report_dangling_references(&document);
        Ok(document)
    }

    pub fn encode(&self, document: &Document) -> Result<String, IoError> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        };
        encoded.map_err(IoError::Encode)
    }
}

impl DocumentLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let document = self.decode(&data, path)?;
        debug!(
            path = %path.display(),
            entities = document.entity_count(),
            units = ?document.units(),
            "文档快照已加载"
        );
        Ok(document)
    }
}

impl DocumentSaver for JsonFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let encoded = self.encode(document)?;
        fs::write(path, encoded).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 快照允许引用缺失的块，绘制时会跳过；这里只提前记录日志。
fn report_dangling_references(document: &Document) {
    let top_level = document.entities().map(|(_, entity)| entity);
    let nested = document.blocks().flat_map(|block| block.entities.iter());
    for entity in top_level.chain(nested) {
        if let Entity::BlockReference(reference) = entity {
            if document.block(reference.block).is_none() {
                warn!(block = %reference.block, "快照中的块参照指向不存在的块定义");
            }
        }
    }
}
