//! VMD 文件加载器
//!
//! 解析 VMD 动画文件的骨骼与 Morph 关键帧并转换为 Motion 数据。
//! 相机、光照、阴影、IK 段不属于角色控制，读取到 Morph 段为止。

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec3};

use crate::{MmdError, Result};

use super::keyframe::{BoneKeyframe, MorphKeyframe};
use super::motion::Motion;

/// VMD 文件头
const VMD_HEADER_V1: &[u8] = b"Vocaloid Motion Data file";
const VMD_HEADER_V2: &[u8] = b"Vocaloid Motion Data 0002";

/// VMD 文件数据
#[derive(Debug, Clone)]
pub struct VmdFile {
    /// 模型名称
    pub model_name: String,
    /// Motion 数据
    pub motion: Motion,
}

impl VmdFile {
    /// 从文件路径加载 VMD
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::load_from_reader(&mut reader)
    }

    /// 从字节切片加载 VMD
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(bytes);
        Self::load_from_reader(&mut reader)
    }

    /// 从 Reader 加载 VMD
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        // 读取头部
        let mut header = [0u8; 30];
        reader.read_exact(&mut header).map_err(vmd_err("header"))?;

        // 验证头部 (两个头部都是 25 字节)
        if header[..25] != VMD_HEADER_V1[..] && header[..25] != VMD_HEADER_V2[..] {
            return Err(MmdError::VmdParse("Invalid VMD header".to_string()));
        }

        // 读取模型名称 (20 字节)
        let mut model_name_bytes = [0u8; 20];
        reader
            .read_exact(&mut model_name_bytes)
            .map_err(vmd_err("model name"))?;
        let model_name = decode_shift_jis(&model_name_bytes);

        let mut motion = Motion::new();

        // 读取骨骼关键帧
        let bone_keyframe_count = reader
            .read_u32::<LittleEndian>()
            .map_err(vmd_err("bone keyframe count"))?;
        for _ in 0..bone_keyframe_count {
            let (name, keyframe) = read_bone_keyframe(reader)?;
            motion.insert_bone_keyframe(&name, keyframe);
        }

        // 读取 Morph 关键帧（非常老的文件可能没有这一段）
        if let Ok(morph_keyframe_count) = reader.read_u32::<LittleEndian>() {
            for _ in 0..morph_keyframe_count {
                let (name, keyframe) = read_morph_keyframe(reader)?;
                motion.insert_morph_keyframe(&name, keyframe);
            }
        }

        Ok(Self { model_name, motion })
    }

    /// 获取最大帧数
    pub fn max_frame(&self) -> u32 {
        self.motion.duration()
    }
}

fn vmd_err(what: &'static str) -> impl Fn(std::io::Error) -> MmdError {
    move |e| MmdError::VmdParse(format!("Failed to read {}: {}", what, e))
}

/// 读取骨骼关键帧
fn read_bone_keyframe<R: Read>(reader: &mut R) -> Result<(String, BoneKeyframe)> {
    // 骨骼名称 (15 字节)
    let mut name_bytes = [0u8; 15];
    reader.read_exact(&mut name_bytes).map_err(vmd_err("bone name"))?;
    let name = decode_shift_jis(&name_bytes);

    let frame_index = reader
        .read_u32::<LittleEndian>()
        .map_err(vmd_err("frame index"))?;

    // 平移 (x, y, z) 与旋转 (四元数 x, y, z, w)
    let mut values = [0f32; 7];
    reader
        .read_f32_into::<LittleEndian>(&mut values)
        .map_err(vmd_err("bone transform"))?;

    // 插值参数 (64 字节)
    let mut interpolation = [0u8; 64];
    reader
        .read_exact(&mut interpolation)
        .map_err(vmd_err("interpolation"))?;

    // VMD 插值数据布局：每行 16 字节，共 4 行
    // 每行格式：X_x1, Y_x1, Z_x1, R_x1, X_y1, Y_y1, Z_y1, R_y1, ...
    let column = |c: usize| [interpolation[c], interpolation[c + 4], interpolation[c + 8], interpolation[c + 12]];

    // 坐标系转换：Z 轴和 W 分量反转
    let [tx, ty, tz, rx, ry, rz, rw] = values;
    let keyframe = BoneKeyframe {
        frame_index,
        translation: Vec3::new(tx, ty, -tz),
        orientation: Quat::from_xyzw(rx, ry, -rz, -rw).normalize(),
        interpolation_x: column(0),
        interpolation_y: column(1),
        interpolation_z: column(2),
        interpolation_r: column(3),
    };

    Ok((name, keyframe))
}

/// 读取 Morph 关键帧
fn read_morph_keyframe<R: Read>(reader: &mut R) -> Result<(String, MorphKeyframe)> {
    // Morph 名称 (15 字节)
    let mut name_bytes = [0u8; 15];
    reader.read_exact(&mut name_bytes).map_err(vmd_err("morph name"))?;
    let name = decode_shift_jis(&name_bytes);

    let frame_index = reader
        .read_u32::<LittleEndian>()
        .map_err(vmd_err("frame index"))?;
    let weight = reader
        .read_f32::<LittleEndian>()
        .map_err(vmd_err("weight"))?;

    Ok((name, MorphKeyframe::new(frame_index, weight)))
}

/// 解码 Shift-JIS 字符串（截断到第一个 null 字节）
fn decode_shift_jis(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (decoded, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes[..end]);
    decoded.into_owned()
}
