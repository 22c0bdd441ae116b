//! 模型资产：模型字节与输入输出名

use std::fs;
use std::path::Path;

use super::{InferenceBackend, ModelSignature, SessionOptions};
use crate::{ClothError, Result};

/// 形变模型资产
#[derive(Clone, Debug, Default)]
pub struct ModelAsset {
    pub bytes: Vec<u8>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
}

impl ModelAsset {
    /// 从文件读取模型字节
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Err(ClothError::InvalidModel(format!("model file {} is empty", path.display())));
        }
        log::info!("已读取模型文件 {} ({} 字节)", path.display(), bytes.len());
        Ok(Self::with_bytes(bytes))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ClothError::InvalidModel("model bytes are empty".to_string()));
        }
        Ok(Self::with_bytes(bytes))
    }

    fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            input_names: Vec::new(),
            output_names: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 打开一次临时会话，读取输入输出名
    pub fn parse_metadata<B: InferenceBackend>(&mut self) -> Result<ModelSignature> {
        if self.bytes.is_empty() {
            return Err(ClothError::InvalidModel("model bytes are empty".to_string()));
        }
        let (_session, signature) = B::load(&self.bytes, &SessionOptions::from_config())?;

        self.input_names = signature.input_names.clone();
        self.output_names = signature.output_names.clone();
        log::info!(
            "模型元数据: 输入 {:?}, 输出 {:?}",
            self.input_names,
            self.output_names
        );
        Ok(signature)
    }
}
