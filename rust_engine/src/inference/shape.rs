//! 输入张量维度解析

use crate::{ClothError, Result};

/// 按输入长度解析声明形状中的动态维度（负数）
///
/// 最多允许一个动态维度；没有动态维度时输入长度必须等于静态维度之积。
pub fn resolve_input_dims(declared: &[i64], input_len: usize) -> Result<Vec<i64>> {
    if input_len == 0 {
        return Err(ClothError::ShapeMismatch("input buffer is empty".to_string()));
    }

    let dynamic_axes = declared.iter().filter(|&&d| d < 0).count();
    if dynamic_axes > 1 {
        return Err(ClothError::ShapeMismatch(format!(
            "declared shape {:?} has {} dynamic dimensions, only one can be inferred",
            declared, dynamic_axes
        )));
    }

    let static_product = declared
        .iter()
        .filter(|&&d| d >= 0)
        .try_fold(1i64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ClothError::ShapeMismatch(format!("declared shape {:?} overflows", declared)))?;
    if static_product <= 0 {
        return Err(ClothError::ShapeMismatch(format!(
            "declared shape {:?} has no elements",
            declared
        )));
    }

    let len = i64::try_from(input_len)
        .map_err(|_| ClothError::ShapeMismatch(format!("input length {} is too large", input_len)))?;

    if dynamic_axes == 0 {
        if len != static_product {
            return Err(ClothError::ShapeMismatch(format!(
                "input length {} does not match declared shape {:?} ({} elements)",
                input_len, declared, static_product
            )));
        }
        return Ok(declared.to_vec());
    }

    if len % static_product != 0 {
        return Err(ClothError::ShapeMismatch(format!(
            "input length {} is not divisible by static size {} of shape {:?}",
            input_len, static_product, declared
        )));
    }
    let dynamic_size = len / static_product;

    Ok(declared
        .iter()
        .map(|&d| if d < 0 { dynamic_size } else { d })
        .collect())
}

/// 校验调用方给出的具体形状：静态维度与声明一致、全部为正、元素数等于输入长度
pub fn validate_concrete_shape(declared: &[i64], dims: &[i64], input_len: usize) -> Result<()> {
    if declared.len() != dims.len() {
        return Err(ClothError::ShapeMismatch(format!(
            "shape {:?} has rank {}, model expects rank {} ({:?})",
            dims,
            dims.len(),
            declared.len(),
            declared
        )));
    }

    for (axis, (&want, &got)) in declared.iter().zip(dims).enumerate() {
        if got <= 0 {
            return Err(ClothError::ShapeMismatch(format!(
                "dimension {} of {:?} must be positive",
                axis, dims
            )));
        }
        if want >= 0 && want != got {
            return Err(ClothError::ShapeMismatch(format!(
                "dimension {} is {}, model declares {}",
                axis, got, want
            )));
        }
    }

    let product = dims
        .iter()
        .try_fold(1i64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ClothError::ShapeMismatch(format!("shape {:?} overflows", dims)))?;
    if usize::try_from(product).ok() != Some(input_len) {
        return Err(ClothError::ShapeMismatch(format!(
            "shape {:?} holds {} elements, input has {}",
            dims, product, input_len
        )));
    }
    Ok(())
}
