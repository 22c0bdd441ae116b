//! 形变器配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::strategy::StrategyKind;

/// 形变器配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct DeformerConfig {
    // ========== KNN 映射 ==========
    /// 每个低模顶点取的近邻数，默认 3
    pub knn_neighbors: usize,
    /// 反距离平方权重的防除零项，默认 1e-8
    pub knn_epsilon: f64,

    // ========== 烘焙 ==========
    /// 未指定时使用的映射策略，默认 KNN
    pub default_strategy: StrategyKind,

    // ========== 推理 ==========
    /// 推理会话的算子内线程数，默认 1
    pub intra_op_threads: usize,
    /// 图优化级别：0 = 关闭，1 = 基础，2 = 扩展，3 = 全部。默认 1
    pub optimization_level: u8,

    // ========== 调试 ==========
    /// 是否输出烘焙统计等调试日志，默认 false
    pub debug_log: bool,
}

impl Default for DeformerConfig {
    fn default() -> Self {
        Self {
            // ====== KNN 映射 ======
            // 近邻越多 → 映射越平滑，但细节越糊
            // 近邻越少 → 更贴合最近的高模顶点，容易出现接缝
            knn_neighbors: 3,
            knn_epsilon: 1e-8,

            // ====== 烘焙 ======
            default_strategy: StrategyKind::Knn,

            // ====== 推理 ======
            // 每帧只推理一次且张量很小，多线程反而增加调度开销
            intra_op_threads: 1,
            optimization_level: 1,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static DEFORMER_CONFIG: Lazy<RwLock<DeformerConfig>> = Lazy::new(|| {
    RwLock::new(DeformerConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> DeformerConfig {
    match DEFORMER_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: DeformerConfig) {
    match DEFORMER_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(DeformerConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = DeformerConfig::default();
        assert_eq!(config.knn_neighbors, 3);
        assert_eq!(config.intra_op_threads, 1);
        assert_eq!(config.default_strategy, StrategyKind::Knn);
        assert!(config.knn_epsilon > 0.0);
    }
}
