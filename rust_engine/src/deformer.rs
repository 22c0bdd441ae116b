//! 布料形变器
//!
//! 每帧：姿态/体型输入 → 模型推理得到高模顶点偏移 → 映射矩阵 → 低模顶点偏移。

use std::collections::HashMap;
use std::path::Path;

use glam::Vec3;

use crate::inference::{InferenceBackend, InputLayout, ModelAsset, ModelInstance, OrtSession, SessionOptions};
use crate::mapping::{MeshMappingAsset, SparseMappingMatrix};
use crate::mesh::MeshData;
use crate::strategy::{MappingStrategy, StrategyKind};
use crate::{ClothError, Result};

/// 布料形变器
pub struct ClothDeformer<B: InferenceBackend = OrtSession> {
    model: Option<ModelInstance<B>>,
    mapping: Option<SparseMappingMatrix>,
    layout: InputLayout,
    /// 最近一次成功推理的输出（高模 xyz 平铺）
    high_res_output: Vec<f32>,
    high_res_offsets: Vec<Vec3>,
    /// 最近一次成功的低模偏移
    low_res_offsets: Vec<Vec3>,
}

impl<B: InferenceBackend> ClothDeformer<B> {
    pub fn new() -> Self {
        Self::with_layout(InputLayout::snug())
    }

    pub fn with_layout(layout: InputLayout) -> Self {
        Self {
            model: None,
            mapping: None,
            layout,
            high_res_output: Vec::new(),
            high_res_offsets: Vec::new(),
            low_res_offsets: Vec::new(),
        }
    }

    /// 从模型字节创建推理会话
    pub fn initialize(&mut self, model_bytes: &[u8]) -> Result<()> {
        self.model = None;
        match ModelInstance::<B>::load(model_bytes, &SessionOptions::from_config()) {
            Ok(instance) => {
                self.model = Some(instance);
                log::info!("布料形变器初始化完成");
                Ok(())
            }
            Err(e) => {
                log::error!("布料形变器初始化失败: {}", e);
                Err(e)
            }
        }
    }

    pub fn initialize_from_asset(&mut self, asset: &ModelAsset) -> Result<()> {
        self.initialize(&asset.bytes)
    }

    pub fn is_initialized(&self) -> bool {
        self.model.as_ref().is_some_and(|m| m.is_initialized())
    }

    pub fn model(&self) -> Option<&ModelInstance<B>> {
        self.model.as_ref()
    }

    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    /// 释放会话与缓存的输出，映射矩阵保留
    pub fn reset(&mut self) {
        self.model = None;
        self.high_res_output.clear();
        self.high_res_offsets.clear();
        self.low_res_offsets.clear();
        log::info!("布料形变器已重置");
    }

    /// 推理，失败时保留上一次的输出
    pub fn run_inference(&mut self, input: &[f32]) -> Result<&[f32]> {
        let Some(model) = self.model.as_mut().filter(|m| m.is_initialized()) else {
            log::warn!("形变器未初始化，跳过推理");
            return Err(ClothError::NotInitialized);
        };
        model.run(input, &mut self.high_res_output)?;
        Ok(&self.high_res_output)
    }

    /// 最近一次成功推理的输出
    pub fn last_output(&self) -> &[f32] {
        &self.high_res_output
    }

    /// 用指定策略烘焙映射矩阵；空矩阵不会替换已有的映射
    pub fn bake_with(
        &mut self,
        strategy: &dyn MappingStrategy,
        high_res: &MeshData,
        low_res: &MeshData,
    ) -> Result<&SparseMappingMatrix> {
        log::info!(
            "[烘焙] '{}' -> '{}'，策略: {}",
            low_res.name,
            high_res.name,
            strategy.name()
        );
        if high_res.is_empty() || low_res.is_empty() {
            log::error!("[烘焙] 失败: 高模或低模没有顶点");
            return Err(ClothError::Mesh("high-res or low-res mesh has no vertices".to_string()));
        }

        let matrix = strategy.build_mapping_matrix(high_res, low_res);
        if matrix.nnz() == 0 {
            log::error!(
                "[烘焙] 结果为空矩阵 ({} x {})，保留之前的映射",
                matrix.num_rows(),
                matrix.num_cols()
            );
            return Err(ClothError::EmptyMapping {
                rows: matrix.num_rows(),
                cols: matrix.num_cols(),
            });
        }

        log::info!(
            "[烘焙] 完成: 行={}, 列={}, 非零项={}",
            matrix.num_rows(),
            matrix.num_cols(),
            matrix.nnz()
        );
        Ok(self.mapping.insert(matrix))
    }

    pub fn bake(&mut self, high_res: &MeshData, low_res: &MeshData, kind: StrategyKind) -> Result<&SparseMappingMatrix> {
        let strategy = kind.create();
        self.bake_with(strategy.as_ref(), high_res, low_res)
    }

    pub fn set_mapping(&mut self, mapping: SparseMappingMatrix) {
        self.mapping = Some(mapping);
    }

    pub fn mapping(&self) -> Option<&SparseMappingMatrix> {
        self.mapping.as_ref()
    }

    /// 当前映射打包成资产，默认名 MM_<低模>_to_<高模>
    pub fn mapping_asset(&self, low_name: &str, high_name: &str) -> Result<MeshMappingAsset> {
        let mapping = self.mapping.as_ref().ok_or_else(|| {
            log::warn!("还没有烘焙映射矩阵");
            ClothError::EmptyMapping { rows: 0, cols: 0 }
        })?;
        Ok(MeshMappingAsset::new(
            MeshMappingAsset::default_name(low_name, high_name),
            mapping.clone(),
        ))
    }

    pub fn save_mapping<P: AsRef<Path>>(&self, path: P, low_name: &str, high_name: &str) -> Result<()> {
        self.mapping_asset(low_name, high_name)?.save(path)
    }

    /// 从资产文件加载映射，失败时保留已有映射
    pub fn load_mapping<P: AsRef<Path>>(&mut self, path: P) -> Result<&SparseMappingMatrix> {
        let asset = MeshMappingAsset::load(path)?;
        Ok(self.mapping.insert(asset.mapping))
    }

    /// 一帧：推理 + 映射，失败时保留上一次的低模偏移
    pub fn step(&mut self, input: &[f32]) -> Result<&[Vec3]> {
        if self.mapping.is_none() {
            log::warn!("没有映射矩阵，跳过本帧");
            return Err(ClothError::EmptyMapping { rows: 0, cols: 0 });
        }

        self.run_inference(input)?;

        if self.high_res_output.len() % 3 != 0 {
            return Err(ClothError::ShapeMismatch(format!(
                "model output length {} is not a multiple of 3",
                self.high_res_output.len()
            )));
        }
        self.high_res_offsets.clear();
        self.high_res_offsets.extend(
            self.high_res_output
                .chunks_exact(3)
                .map(|v| Vec3::new(v[0], v[1], v[2])),
        );

        let mapping = self.mapping.as_ref().ok_or(ClothError::EmptyMapping { rows: 0, cols: 0 })?;
        if mapping.num_cols() != self.high_res_offsets.len() {
            log::warn!(
                "模型输出 {} 个高模顶点，映射矩阵需要 {} 个",
                self.high_res_offsets.len(),
                mapping.num_cols()
            );
        }
        mapping.apply_into(&self.high_res_offsets, &mut self.low_res_offsets);
        Ok(&self.low_res_offsets)
    }

    /// 按输入布局拼装命名输入后执行一帧
    pub fn step_with_inputs(&mut self, inputs: &HashMap<String, Vec<f32>>) -> Result<&[Vec3]> {
        let flat = self.layout.assemble(inputs)?;
        self.step(&flat)
    }

    /// 最近一次成功的低模偏移
    pub fn low_res_offsets(&self) -> &[Vec3] {
        &self.low_res_offsets
    }
}

impl<B: InferenceBackend> Default for ClothDeformer<B> {
    fn default() -> Self {
        Self::new()
    }
}
