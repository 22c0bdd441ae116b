//! CSR 稀疏映射矩阵
//!
//! 行 = 低模顶点，列 = 高模顶点。运行时用 `apply` 把高模偏移映射到低模：
//! `low[i] = Σ weight[k] * high[col_index[k]]`，k ∈ [row_ptr[i], row_ptr[i+1])。

use glam::Vec3;

use super::Triplet;
use crate::{ClothError, Result};

/// CSR 稀疏映射矩阵
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMappingMatrix {
    num_rows: usize,
    num_cols: usize,
    /// 行指针（长度 num_rows + 1）
    row_ptr: Vec<u32>,
    /// 列索引（长度 nnz）
    col_index: Vec<u32>,
    /// 权重（长度 nnz，与 col_index 一一对应）
    weight: Vec<f32>,
}

impl SparseMappingMatrix {
    /// 创建指定尺寸的空矩阵（所有行都没有条目）
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            row_ptr: vec![0; num_rows + 1],
            col_index: Vec::new(),
            weight: Vec::new(),
        }
    }

    /// 由三元组直接构建
    pub fn from_triplets(triplets: &[Triplet], num_rows: usize, num_cols: usize) -> Self {
        let mut matrix = Self::new(num_rows, num_cols);
        matrix.set_from_triplets(triplets);
        matrix
    }

    /// 从原始数组重建（用于反序列化），会校验全部不变量
    pub fn from_raw_parts(
        num_rows: usize,
        num_cols: usize,
        row_ptr: Vec<u32>,
        col_index: Vec<u32>,
        weight: Vec<f32>,
    ) -> Result<Self> {
        let matrix = Self {
            num_rows,
            num_cols,
            row_ptr,
            col_index,
            weight,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// COO → CSR，O(num_rows + nnz)
    ///
    /// 三个数组整体替换。行或列越界的三元组会被跳过；
    /// 同一 (row, col) 重复出现时后写覆盖，条目保留首次出现的位置。
    pub fn set_from_triplets(&mut self, triplets: &[Triplet]) {
        let num_rows = self.num_rows;
        let num_cols = self.num_cols;

        if num_rows == 0 {
            self.row_ptr = vec![0];
            self.col_index = Vec::new();
            self.weight = Vec::new();
            return;
        }

        let is_valid = |t: &Triplet| (t.row as usize) < num_rows && (t.col as usize) < num_cols;

        // 计数
        let mut row_count = vec![0u32; num_rows];
        let mut skipped = 0usize;
        for triplet in triplets {
            if is_valid(triplet) {
                row_count[triplet.row as usize] += 1;
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::warn!(
                "set_from_triplets: 跳过 {} 个越界三元组（矩阵 {} x {}）",
                skipped,
                num_rows,
                num_cols
            );
        }

        // 前缀和
        let mut row_ptr = Vec::with_capacity(num_rows + 1);
        row_ptr.push(0u32);
        let mut cumulative = 0u32;
        for count in &row_count {
            cumulative += count;
            row_ptr.push(cumulative);
        }

        let nnz = cumulative as usize;
        let mut col_index = vec![0u32; nnz];
        let mut weight = vec![0.0f32; nnz];

        // 散射：每行一个写游标，行内保持插入顺序
        let mut write_pos: Vec<u32> = row_ptr[..num_rows].to_vec();
        for triplet in triplets.iter().filter(|t| is_valid(t)) {
            let pos = &mut write_pos[triplet.row as usize];
            col_index[*pos as usize] = triplet.col;
            weight[*pos as usize] = triplet.weight;
            *pos += 1;
        }

        // 逐行合并重复列并压实：col_row[col] 记录该列最近出现的行（行号 + 1），
        // col_slot[col] 是它在本行的首个位置；后写的权重覆盖到该位置
        let mut col_row = vec![0u32; num_cols];
        let mut col_slot = vec![0u32; num_cols];
        let mut duplicates = 0usize;
        let mut dst = 0usize;
        for row in 0..num_rows {
            let stamp = row as u32 + 1;
            let start = row_ptr[row] as usize;
            let end = row_ptr[row + 1] as usize;
            row_ptr[row] = dst as u32;

            for k in start..end {
                let col = col_index[k] as usize;
                if col_row[col] == stamp {
                    weight[col_slot[col] as usize] = weight[k];
                    duplicates += 1;
                    continue;
                }
                col_row[col] = stamp;
                col_slot[col] = dst as u32;
                col_index[dst] = col_index[k];
                weight[dst] = weight[k];
                dst += 1;
            }
        }
        row_ptr[num_rows] = dst as u32;
        col_index.truncate(dst);
        weight.truncate(dst);

        if duplicates > 0 {
            log::debug!("set_from_triplets: 合并了 {} 个重复条目（后写覆盖）", duplicates);
        }

        self.row_ptr = row_ptr;
        self.col_index = col_index;
        self.weight = weight;
    }

    /// 应用映射，返回低模结果（长度 num_rows）
    pub fn apply(&self, high_res: &[Vec3]) -> Vec<Vec3> {
        let mut output = Vec::with_capacity(self.num_rows);
        self.apply_into(high_res, &mut output);
        output
    }

    /// 应用映射到已有缓冲区，返回因越界被跳过的条目数
    ///
    /// 容量足够时不会重新分配，可每帧调用。
    pub fn apply_into(&self, high_res: &[Vec3], output: &mut Vec<Vec3>) -> usize {
        output.clear();
        output.resize(self.num_rows, Vec3::ZERO);

        let mut skipped = 0usize;
        for (row, out) in output.iter_mut().enumerate() {
            let start = self.row_ptr[row] as usize;
            let end = self.row_ptr[row + 1] as usize;

            let mut acc = Vec3::ZERO;
            for k in start..end {
                match high_res.get(self.col_index[k] as usize) {
                    Some(value) => acc += *value * self.weight[k],
                    None => skipped += 1,
                }
            }
            *out = acc;
        }

        if skipped > 0 {
            log::warn!(
                "apply: {} 个条目的高模索引超出输入长度 {}（矩阵列数 {}）",
                skipped,
                high_res.len(),
                self.num_cols
            );
        }
        skipped
    }

    /// 平铺 xyz 缓冲区版本（推理输出直接是 [x0, y0, z0, x1, ...]）
    pub fn apply_flat(&self, high_res: &[f32]) -> Result<Vec<f32>> {
        let mut output = Vec::with_capacity(self.num_rows * 3);
        self.apply_flat_into(high_res, &mut output)?;
        Ok(output)
    }

    /// 平铺版本，写入已有缓冲区，返回被跳过的条目数
    pub fn apply_flat_into(&self, high_res: &[f32], output: &mut Vec<f32>) -> Result<usize> {
        if high_res.len() % 3 != 0 {
            return Err(ClothError::ShapeMismatch(format!(
                "flat vertex buffer length {} is not a multiple of 3",
                high_res.len()
            )));
        }
        let high_count = high_res.len() / 3;

        output.clear();
        output.resize(self.num_rows * 3, 0.0);

        let mut skipped = 0usize;
        for (row, out) in output.chunks_exact_mut(3).enumerate() {
            let start = self.row_ptr[row] as usize;
            let end = self.row_ptr[row + 1] as usize;

            let mut acc = Vec3::ZERO;
            for k in start..end {
                let col = self.col_index[k] as usize;
                if col >= high_count {
                    skipped += 1;
                    continue;
                }
                let base = col * 3;
                acc += Vec3::new(high_res[base], high_res[base + 1], high_res[base + 2]) * self.weight[k];
            }
            out[0] = acc.x;
            out[1] = acc.y;
            out[2] = acc.z;
        }

        if skipped > 0 {
            log::warn!(
                "apply_flat: {} 个条目的高模索引超出输入顶点数 {}",
                skipped,
                high_count
            );
        }
        Ok(skipped)
    }

    /// 获取第 i 行的 (列索引, 权重) 切片
    pub fn row(&self, index: usize) -> Option<(&[u32], &[f32])> {
        if index >= self.num_rows {
            return None;
        }
        let start = self.row_ptr[index] as usize;
        let end = self.row_ptr[index + 1] as usize;
        Some((&self.col_index[start..end], &self.weight[start..end]))
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// 非零条目数
    pub fn nnz(&self) -> usize {
        self.weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    pub fn row_ptr(&self) -> &[u32] {
        &self.row_ptr
    }

    pub fn col_index(&self) -> &[u32] {
        &self.col_index
    }

    pub fn weights(&self) -> &[f32] {
        &self.weight
    }

    /// 校验 CSR 不变量
    pub fn validate(&self) -> Result<()> {
        if self.row_ptr.len() != self.num_rows + 1 {
            return Err(ClothError::MappingFormat(format!(
                "row_ptr length {} != num_rows + 1 ({})",
                self.row_ptr.len(),
                self.num_rows + 1
            )));
        }
        if self.row_ptr[0] != 0 {
            return Err(ClothError::MappingFormat("row_ptr[0] must be 0".to_string()));
        }
        if self.row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(ClothError::MappingFormat("row_ptr is not non-decreasing".to_string()));
        }
        if self.col_index.len() != self.weight.len() {
            return Err(ClothError::MappingFormat(format!(
                "col_index length {} != weight length {}",
                self.col_index.len(),
                self.weight.len()
            )));
        }
        let nnz = self.row_ptr[self.num_rows] as usize;
        if nnz != self.col_index.len() {
            return Err(ClothError::MappingFormat(format!(
                "row_ptr[num_rows] = {} but {} entries stored",
                nnz,
                self.col_index.len()
            )));
        }
        if let Some(col) = self.col_index.iter().find(|&&c| c as usize >= self.num_cols) {
            return Err(ClothError::MappingFormat(format!(
                "column index {} out of range (num_cols {})",
                col, self.num_cols
            )));
        }
        Ok(())
    }
}

impl Default for SparseMappingMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_triplets() -> Vec<Triplet> {
        vec![
            Triplet::new(2, 4, 0.25),
            Triplet::new(0, 1, 0.5),
            Triplet::new(2, 0, 0.75),
            Triplet::new(0, 3, 0.5),
        ]
    }

    #[test]
    fn test_build_invariants() {
        let matrix = SparseMappingMatrix::from_triplets(&sample_triplets(), 4, 5);

        assert_eq!(matrix.row_ptr().len(), 5);
        assert_eq!(matrix.row_ptr()[0], 0);
        assert!(matrix.row_ptr().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(matrix.row_ptr()[4] as usize, 4);
        assert_eq!(matrix.nnz(), 4);
        assert!(matrix.col_index().iter().all(|&c| (c as usize) < 5));
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn test_rows_keep_insertion_order() {
        let matrix = SparseMappingMatrix::from_triplets(&sample_triplets(), 4, 5);

        let (cols, weights) = matrix.row(0).unwrap();
        assert_eq!(cols, &[1, 3]);
        assert_eq!(weights, &[0.5, 0.5]);

        let (cols, weights) = matrix.row(2).unwrap();
        assert_eq!(cols, &[4, 0]);
        assert_eq!(weights, &[0.25, 0.75]);

        // 没有条目的行是合法的空切片
        let (cols, _) = matrix.row(1).unwrap();
        assert!(cols.is_empty());
        let (cols, _) = matrix.row(3).unwrap();
        assert!(cols.is_empty());
        assert!(matrix.row(4).is_none());
    }

    #[test]
    fn test_duplicate_last_write_wins() {
        let triplets = vec![
            Triplet::new(0, 2, 0.1),
            Triplet::new(0, 5, 0.3),
            Triplet::new(1, 0, 1.0),
            Triplet::new(0, 2, 0.7),
        ];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, 6);

        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.row_ptr(), &[0, 2, 3]);
        let (cols, weights) = matrix.row(0).unwrap();
        assert_eq!(cols, &[2, 5]);
        assert_eq!(weights, &[0.7, 0.3]);
        let (cols, weights) = matrix.row(1).unwrap();
        assert_eq!(cols, &[0]);
        assert_eq!(weights, &[1.0]);
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn test_duplicates_interleaved_across_rows() {
        // 同一列在不同行交替出现，只有同一行内的重复才合并
        let triplets = vec![
            Triplet::new(1, 3, 0.2),
            Triplet::new(0, 3, 0.4),
            Triplet::new(1, 1, 0.5),
            Triplet::new(1, 3, 0.9),
            Triplet::new(0, 3, 0.6),
            Triplet::new(0, 1, 0.3),
        ];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, 4);

        assert_eq!(matrix.row_ptr(), &[0, 2, 4]);
        let (cols, weights) = matrix.row(0).unwrap();
        assert_eq!(cols, &[3, 1]);
        assert_eq!(weights, &[0.6, 0.3]);
        let (cols, weights) = matrix.row(1).unwrap();
        assert_eq!(cols, &[3, 1]);
        assert_eq!(weights, &[0.9, 0.5]);
    }

    #[test]
    fn test_wide_row_build() {
        // 一行 80000 个不同的列，再对其中一半重写权重
        let width = 80_000u32;
        let mut triplets: Vec<Triplet> = (0..width).map(|c| Triplet::new(0, c, 1.0)).collect();
        triplets.extend((0..width).step_by(2).map(|c| Triplet::new(0, c, 2.0)));
        triplets.push(Triplet::new(1, 7, 3.0));

        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, width as usize);
        assert_eq!(matrix.nnz(), width as usize + 1);
        assert!(matrix.validate().is_ok());

        let (cols, weights) = matrix.row(0).unwrap();
        assert_eq!(cols.len(), width as usize);
        assert!(cols.iter().enumerate().all(|(i, &c)| c == i as u32));
        assert_eq!(weights[0], 2.0);
        assert_eq!(weights[1], 1.0);
        assert_eq!(weights[79_998], 2.0);
        assert_eq!(matrix.row(1).unwrap().0, &[7]);
    }

    #[test]
    fn test_out_of_range_triplets_skipped() {
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(7, 0, 1.0),
            Triplet::new(1, 9, 1.0),
        ];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, 3);
        assert_eq!(matrix.nnz(), 1);
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn test_zero_rows_is_noop() {
        let matrix = SparseMappingMatrix::from_triplets(&sample_triplets(), 0, 5);
        assert_eq!(matrix.num_rows(), 0);
        assert_eq!(matrix.nnz(), 0);
        assert_eq!(matrix.row_ptr(), &[0]);
        assert!(matrix.apply(&[Vec3::ONE]).is_empty());
    }

    #[test]
    fn test_apply_all_zero_rows() {
        let matrix = SparseMappingMatrix::new(3, 10);
        let input = vec![Vec3::new(1.0, 2.0, 3.0); 10];
        let output = matrix.apply(&input);
        assert_eq!(output, vec![Vec3::ZERO; 3]);

        // 输入为空也一样
        assert_eq!(matrix.apply(&[]), vec![Vec3::ZERO; 3]);
    }

    #[test]
    fn test_apply_weighted_sum() {
        let triplets = vec![
            Triplet::new(0, 0, 0.5),
            Triplet::new(0, 1, 0.5),
            Triplet::new(1, 2, 1.0),
        ];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, 3);
        let input = [
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
        ];
        let output = matrix.apply(&input);
        assert!((output[0] - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        assert!((output[1] - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-6);
    }

    #[test]
    fn test_apply_skips_short_input() {
        let triplets = vec![Triplet::new(0, 0, 1.0), Triplet::new(0, 4, 1.0)];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 1, 5);

        let mut output = Vec::new();
        let skipped = matrix.apply_into(&[Vec3::X, Vec3::Y], &mut output);
        assert_eq!(skipped, 1);
        assert_eq!(output, vec![Vec3::X]);
    }

    #[test]
    fn test_apply_into_reuses_buffer() {
        let matrix = SparseMappingMatrix::from_triplets(&[Triplet::new(1, 0, 2.0)], 2, 1);
        let mut output = Vec::with_capacity(8);
        let ptr = output.as_ptr();
        matrix.apply_into(&[Vec3::ONE], &mut output);
        matrix.apply_into(&[Vec3::ONE], &mut output);
        assert_eq!(output.as_ptr(), ptr);
        assert_eq!(output, vec![Vec3::ZERO, Vec3::splat(2.0)]);
    }

    #[test]
    fn test_apply_flat() {
        let triplets = vec![Triplet::new(0, 1, 1.0), Triplet::new(1, 0, 0.5), Triplet::new(1, 1, 0.5)];
        let matrix = SparseMappingMatrix::from_triplets(&triplets, 2, 2);
        let output = matrix.apply_flat(&[1.0, 2.0, 3.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(output.len(), 6);
        let expected = [3.0, 4.0, 5.0, 2.0, 3.0, 4.0];
        for (a, b) in output.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        let err = matrix.apply_flat(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ClothError::ShapeMismatch(_)));
    }

    #[test]
    fn test_from_raw_parts_validation() {
        assert!(SparseMappingMatrix::from_raw_parts(2, 3, vec![0, 1, 2], vec![0, 2], vec![1.0, 1.0]).is_ok());
        // row_ptr 长度不对
        assert!(SparseMappingMatrix::from_raw_parts(2, 3, vec![0, 2], vec![0, 2], vec![1.0, 1.0]).is_err());
        // 递减
        assert!(SparseMappingMatrix::from_raw_parts(2, 3, vec![0, 2, 1], vec![0], vec![1.0]).is_err());
        // 列越界
        assert!(SparseMappingMatrix::from_raw_parts(1, 3, vec![0, 1], vec![3], vec![1.0]).is_err());
        // 数组长度不一致
        assert!(SparseMappingMatrix::from_raw_parts(1, 3, vec![0, 1], vec![0], vec![]).is_err());
    }
}
