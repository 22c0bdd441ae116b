//! 映射资产：烘焙结果的持久化
//!
//! 二进制布局（小端）：
//! `"CSRM"` | version: u32 | name_len: u32 | name: utf8 |
//! num_rows: u32 | num_cols: u32 | nnz: u32 |
//! row_ptr: [u32; num_rows + 1] | col_index: [u32; nnz] | weight: [f32; nnz]

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::SparseMappingMatrix;
use crate::{ClothError, Result};

const MAPPING_MAGIC: &[u8; 4] = b"CSRM";
const MAPPING_VERSION: u32 = 1;
/// 资产名长度上限
const MAX_NAME_LEN: usize = 4096;

/// 预计算的映射资产
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshMappingAsset {
    pub name: String,
    pub mapping: SparseMappingMatrix,
}

impl MeshMappingAsset {
    pub fn new(name: impl Into<String>, mapping: SparseMappingMatrix) -> Self {
        Self {
            name: name.into(),
            mapping,
        }
    }

    /// 默认资产名：MM_<低模>_to_<高模>
    pub fn default_name(low_name: &str, high_name: &str) -> String {
        format!("MM_{}_to_{}", low_name, high_name)
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(ClothError::Io)?;
        let mut reader = BufReader::new(file);
        let asset = Self::read_from(&mut reader)?;
        log::info!(
            "已加载映射资产 '{}' ({}): {} x {}, {} 个非零项",
            asset.name,
            path.as_ref().display(),
            asset.mapping.num_rows(),
            asset.mapping.num_cols(),
            asset.mapping.nnz()
        );
        Ok(asset)
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(ClothError::Io)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(ClothError::Io)?;
        log::info!("映射资产 '{}' 已保存到 {}", self.name, path.as_ref().display());
        Ok(())
    }

    /// 从字节切片加载
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(bytes);
        Self::read_from(&mut reader)
    }

    /// 序列化为字节
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let matrix = &self.mapping;

        writer.write_all(MAPPING_MAGIC)?;
        writer.write_u32::<LittleEndian>(MAPPING_VERSION)?;

        let name = self.name.as_bytes();
        if name.len() > MAX_NAME_LEN {
            return Err(ClothError::MappingFormat(format!(
                "Asset name length {} exceeds {}",
                name.len(),
                MAX_NAME_LEN
            )));
        }
        writer.write_u32::<LittleEndian>(to_u32(name.len(), "name length")?)?;
        writer.write_all(name)?;

        writer.write_u32::<LittleEndian>(to_u32(matrix.num_rows(), "num_rows")?)?;
        writer.write_u32::<LittleEndian>(to_u32(matrix.num_cols(), "num_cols")?)?;
        writer.write_u32::<LittleEndian>(to_u32(matrix.nnz(), "nnz")?)?;

        for &ptr in matrix.row_ptr() {
            writer.write_u32::<LittleEndian>(ptr)?;
        }
        for &col in matrix.col_index() {
            writer.write_u32::<LittleEndian>(col)?;
        }
        for &weight in matrix.weights() {
            writer.write_f32::<LittleEndian>(weight)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| ClothError::MappingFormat(format!("Failed to read magic: {}", e)))?;
        if &magic != MAPPING_MAGIC {
            return Err(ClothError::MappingFormat("Invalid mapping asset magic".to_string()));
        }

        let version = read_u32(reader, "version")?;
        if version != MAPPING_VERSION {
            return Err(ClothError::MappingFormat(format!(
                "Unsupported mapping asset version {}",
                version
            )));
        }

        let name_len = read_u32(reader, "name length")? as usize;
        if name_len > MAX_NAME_LEN {
            return Err(ClothError::MappingFormat(format!(
                "Asset name length {} exceeds {}",
                name_len, MAX_NAME_LEN
            )));
        }
        // 按实际读到的字节增长，不按头部声明的长度预分配
        let mut name_bytes = Vec::new();
        Read::take(&mut *reader, name_len as u64)
            .read_to_end(&mut name_bytes)
            .map_err(|e| ClothError::MappingFormat(format!("Failed to read name: {}", e)))?;
        if name_bytes.len() != name_len {
            return Err(ClothError::MappingFormat(format!(
                "Asset name truncated: expected {} bytes, got {}",
                name_len,
                name_bytes.len()
            )));
        }
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        let num_rows = read_u32(reader, "num_rows")? as usize;
        let num_cols = read_u32(reader, "num_cols")? as usize;
        let nnz = read_u32(reader, "nnz")? as usize;

        let mut row_ptr = Vec::new();
        for _ in 0..=num_rows {
            row_ptr.push(read_u32(reader, "row_ptr")?);
        }

        let mut col_index = Vec::new();
        for _ in 0..nnz {
            col_index.push(read_u32(reader, "col_index")?);
        }

        let mut weight = Vec::new();
        for _ in 0..nnz {
            let value = reader
                .read_f32::<LittleEndian>()
                .map_err(|e| ClothError::MappingFormat(format!("Failed to read weight: {}", e)))?;
            weight.push(value);
        }

        let mapping = SparseMappingMatrix::from_raw_parts(num_rows, num_cols, row_ptr, col_index, weight)?;
        Ok(Self { name, mapping })
    }
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| ClothError::MappingFormat(format!("Failed to read {}: {}", what, e)))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| ClothError::MappingFormat(format!("{} {} exceeds u32", what, value)))
}
