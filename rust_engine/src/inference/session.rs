//! 模型实例：后端会话 + 状态机

use super::ort_backend::OrtSession;
use super::shape::{resolve_input_dims, validate_concrete_shape};
use super::{InferenceBackend, ModelSignature, SessionOptions};
use crate::{ClothError, Result};

/// 模型实例状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Uninitialized,
    Ready,
    /// 终态，不会自动重试；需要丢弃实例重新创建
    Failed,
}

/// 模型实例
///
/// 创建后不可变，只有 Ready 状态可以推理。失败的创建不保留任何后端句柄。
pub struct ModelInstance<B: InferenceBackend = OrtSession> {
    backend: Option<B>,
    signature: Option<ModelSignature>,
    state: ModelState,
}

impl<B: InferenceBackend> ModelInstance<B> {
    /// 未初始化的空实例
    pub fn new() -> Self {
        Self {
            backend: None,
            signature: None,
            state: ModelState::Uninitialized,
        }
    }

    /// 从模型字节加载，失败时返回错误
    pub fn load(bytes: &[u8], options: &SessionOptions) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ClothError::InvalidModel("model bytes are empty".to_string()));
        }

        let (backend, signature) = B::load(bytes, options)?;
        log::info!(
            "模型加载完成: {} 个输入, {} 个输出, 输入 '{}' {:?} -> 输出 '{}'",
            signature.input_count(),
            signature.output_count(),
            signature.input_name,
            signature.input_shape,
            signature.output_name
        );
        Ok(Self::with_backend(backend, signature))
    }

    /// 从模型字节创建，使用全局配置；失败时得到 Failed 状态的实例
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match Self::load(bytes, &SessionOptions::from_config()) {
            Ok(instance) => instance,
            Err(e) => {
                log::error!("模型实例创建失败: {}", e);
                Self {
                    backend: None,
                    signature: None,
                    state: ModelState::Failed,
                }
            }
        }
    }

    /// 直接包装已创建的后端
    pub fn with_backend(backend: B, signature: ModelSignature) -> Self {
        Self {
            backend: Some(backend),
            signature: Some(signature),
            state: ModelState::Ready,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ModelState::Ready
    }

    pub fn signature(&self) -> Option<&ModelSignature> {
        self.signature.as_ref()
    }

    /// 推理：动态维度按输入长度解析
    ///
    /// 失败时 `output` 保持原样。
    pub fn run(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let declared = self.ready_signature()?.input_shape.clone();
        let dims = resolve_input_dims(&declared, input.len())?;
        self.run_resolved(&dims, input, output)
    }

    /// 以调用方给出的具体形状推理（多个动态维度的模型）
    pub fn run_with_shape(&mut self, input: &[f32], dims: &[i64], output: &mut Vec<f32>) -> Result<()> {
        validate_concrete_shape(&self.ready_signature()?.input_shape, dims, input.len())?;
        self.run_resolved(dims, input, output)
    }

    fn ready_signature(&self) -> Result<&ModelSignature> {
        if self.state != ModelState::Ready {
            return Err(ClothError::NotInitialized);
        }
        self.signature.as_ref().ok_or(ClothError::NotInitialized)
    }

    fn run_resolved(&mut self, dims: &[i64], input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let (Some(backend), Some(signature)) = (self.backend.as_mut(), self.signature.as_ref()) else {
            return Err(ClothError::NotInitialized);
        };

        match backend.run(&signature.input_name, dims, input, &signature.output_name) {
            Ok(values) => {
                *output = values;
                Ok(())
            }
            Err(e) => {
                log::error!("推理失败 (输入形状 {:?}): {}", dims, e);
                Err(e)
            }
        }
    }
}

impl<B: InferenceBackend> Default for ModelInstance<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 测试用后端：输出 = 输入 * scale，记录最后一次的形状
    pub(crate) struct FakeBackend {
        pub scale: f32,
        pub last_dims: Vec<i64>,
        pub fail_run: bool,
    }

    pub(crate) fn fake_signature(shape: Vec<i64>) -> ModelSignature {
        ModelSignature {
            input_name: "input".to_string(),
            output_name: "offsets".to_string(),
            input_shape: shape,
            input_names: vec!["input".to_string()],
            output_names: vec!["offsets".to_string()],
        }
    }

    impl InferenceBackend for FakeBackend {
        fn load(bytes: &[u8], _options: &SessionOptions) -> Result<(Self, ModelSignature)> {
            // 第一个字节为 0 视为损坏的模型
            if bytes[0] == 0 {
                return Err(ClothError::InvalidModel("corrupt model".to_string()));
            }
            let backend = FakeBackend {
                scale: bytes[0] as f32,
                last_dims: Vec::new(),
                fail_run: false,
            };
            Ok((backend, fake_signature(vec![-1, 3])))
        }

        fn run(&mut self, input_name: &str, dims: &[i64], input: &[f32], output_name: &str) -> Result<Vec<f32>> {
            assert_eq!(input_name, "input");
            assert_eq!(output_name, "offsets");
            if self.fail_run {
                return Err(ClothError::Backend("fake failure".to_string()));
            }
            self.last_dims = dims.to_vec();
            Ok(input.iter().map(|v| v * self.scale).collect())
        }
    }

    fn fake_instance(shape: Vec<i64>) -> ModelInstance<FakeBackend> {
        let backend = FakeBackend {
            scale: 2.0,
            last_dims: Vec::new(),
            fail_run: false,
        };
        ModelInstance::with_backend(backend, fake_signature(shape))
    }

    #[test]
    fn test_state_transitions() {
        let instance = ModelInstance::<FakeBackend>::new();
        assert_eq!(instance.state(), ModelState::Uninitialized);
        assert!(!instance.is_initialized());

        let failed = ModelInstance::<FakeBackend>::from_bytes(&[]);
        assert_eq!(failed.state(), ModelState::Failed);
        assert!(failed.signature().is_none());

        let corrupt = ModelInstance::<FakeBackend>::from_bytes(&[0, 1, 2]);
        assert_eq!(corrupt.state(), ModelState::Failed);

        let ready = ModelInstance::<FakeBackend>::from_bytes(&[3]);
        assert_eq!(ready.state(), ModelState::Ready);
        assert_eq!(ready.signature().unwrap().input_shape, vec![-1, 3]);
    }

    #[test]
    fn test_run_resolves_dynamic_batch() {
        let mut instance = fake_instance(vec![-1, 72]);
        let input = vec![1.0f32; 144];
        let mut output = Vec::new();

        instance.run(&input, &mut output).unwrap();
        assert_eq!(output.len(), 144);
        assert!((output[0] - 2.0).abs() < 1e-6);
        assert_eq!(instance.backend.as_ref().unwrap().last_dims, vec![2, 72]);
    }

    #[test]
    fn test_shape_mismatch_keeps_output() {
        let mut instance = fake_instance(vec![-1, 72]);
        let mut output = vec![7.0f32; 4];

        let result = instance.run(&vec![1.0f32; 145], &mut output);
        assert!(matches!(result, Err(ClothError::ShapeMismatch(_))));
        assert_eq!(output, vec![7.0f32; 4]);

        // 会话仍然可用
        assert!(instance.is_initialized());
        instance.run(&vec![1.0f32; 72], &mut output).unwrap();
        assert_eq!(output.len(), 72);
    }

    #[test]
    fn test_backend_failure_keeps_output() {
        let mut instance = fake_instance(vec![-1, 3]);
        instance.backend.as_mut().unwrap().fail_run = true;
        let mut output = vec![1.0, 2.0, 3.0];

        assert!(matches!(
            instance.run(&[0.5; 6], &mut output),
            Err(ClothError::Backend(_))
        ));
        assert_eq!(output, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_not_initialized() {
        let mut instance = ModelInstance::<FakeBackend>::from_bytes(&[]);
        let mut output = Vec::new();
        assert!(matches!(
            instance.run(&[1.0; 3], &mut output),
            Err(ClothError::NotInitialized)
        ));
    }

    #[test]
    fn test_run_with_shape() {
        let mut instance = fake_instance(vec![-1, -1, 3]);
        let mut output = Vec::new();

        // 两个动态维度无法按长度推断
        assert!(instance.run(&[1.0; 12], &mut output).is_err());

        instance.run_with_shape(&[1.0; 12], &[2, 2, 3], &mut output).unwrap();
        assert_eq!(output.len(), 12);
        assert_eq!(instance.backend.as_ref().unwrap().last_dims, vec![2, 2, 3]);

        assert!(instance.run_with_shape(&[1.0; 12], &[4, 1, 4], &mut output).is_err());
    }
}
