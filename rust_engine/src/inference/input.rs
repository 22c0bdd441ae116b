//! 模型输入拼装：命名通道 → 平铺缓冲区

use std::collections::HashMap;

use crate::{ClothError, Result};

/// 一个输入通道
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputChannel {
    pub name: String,
    pub len: usize,
}

impl InputChannel {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// 有序的输入通道列表
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLayout {
    channels: Vec<InputChannel>,
}

impl InputLayout {
    pub fn new(channels: Vec<InputChannel>) -> Self {
        Self { channels }
    }

    /// SNUG 布局：pose（24 关节 × 轴角 3）、betas（体型 10）、trans（根位移 3）
    pub fn snug() -> Self {
        Self::new(vec![
            InputChannel::new("pose", 72),
            InputChannel::new("betas", 10),
            InputChannel::new("trans", 3),
        ])
    }

    pub fn channels(&self) -> &[InputChannel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&InputChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// 所有通道长度之和
    pub fn total_len(&self) -> usize {
        self.channels.iter().map(|c| c.len).sum()
    }

    /// 按通道顺序拼成一个平铺缓冲区，多余的键忽略
    pub fn assemble(&self, inputs: &HashMap<String, Vec<f32>>) -> Result<Vec<f32>> {
        let mut flat = Vec::with_capacity(self.total_len());
        for channel in &self.channels {
            let values = inputs
                .get(&channel.name)
                .ok_or_else(|| ClothError::MissingInput(channel.name.clone()))?;
            if values.len() != channel.len {
                return Err(ClothError::ShapeMismatch(format!(
                    "channel '{}' has {} values, expected {}",
                    channel.name,
                    values.len(),
                    channel.len
                )));
            }
            flat.extend_from_slice(values);
        }
        Ok(flat)
    }
}

impl Default for InputLayout {
    fn default() -> Self {
        Self::snug()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snug_inputs() -> HashMap<String, Vec<f32>> {
        let mut inputs = HashMap::new();
        inputs.insert("trans".to_string(), vec![3.0; 3]);
        inputs.insert("pose".to_string(), vec![1.0; 72]);
        inputs.insert("betas".to_string(), vec![2.0; 10]);
        inputs
    }

    #[test]
    fn test_snug_assemble_order() {
        let layout = InputLayout::snug();
        assert_eq!(layout.total_len(), 85);
        assert_eq!(layout.channel("betas").unwrap().len, 10);
        assert!(layout.channel("gender").is_none());

        let flat = layout.assemble(&snug_inputs()).unwrap();
        assert_eq!(flat.len(), 85);
        assert_eq!(flat[0], 1.0);
        assert_eq!(flat[72], 2.0);
        assert_eq!(flat[84], 3.0);
    }

    #[test]
    fn test_missing_and_wrong_size() {
        let layout = InputLayout::snug();

        let mut inputs = snug_inputs();
        inputs.remove("betas");
        assert!(matches!(
            layout.assemble(&inputs),
            Err(ClothError::MissingInput(name)) if name == "betas"
        ));

        let mut inputs = snug_inputs();
        inputs.insert("pose".to_string(), vec![0.0; 69]);
        assert!(matches!(layout.assemble(&inputs), Err(ClothError::ShapeMismatch(_))));
    }
}
