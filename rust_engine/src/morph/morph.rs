//! Morph 定义

use glam::{Quat, Vec3};

use super::{BoneMorphOffset, MorphType};

/// Morph 变形
#[derive(Clone, Debug)]
pub struct Morph {
    pub name: String,
    pub morph_type: MorphType,
    pub weight: f32,

    // 骨骼 Morph
    pub bone_offsets: Vec<BoneMorphOffset>,

    // 组 Morph（引用其他 Morph 及其比率）
    pub group_indices: Vec<(u32, f32)>,
}

impl Morph {
    pub fn new(name: String, morph_type: MorphType) -> Self {
        Self {
            name,
            morph_type,
            weight: 0.0,
            bone_offsets: Vec::new(),
            group_indices: Vec::new(),
        }
    }

    /// 添加骨骼偏移
    pub fn with_bone_offset(mut self, bone_index: u32, translation: Vec3, rotation: Quat) -> Self {
        self.bone_offsets.push(BoneMorphOffset {
            bone_index,
            translation,
            rotation,
        });
        self
    }

    /// 添加组成员
    pub fn with_group_element(mut self, morph_index: u32, rate: f32) -> Self {
        self.group_indices.push((morph_index, rate));
        self
    }

    /// 设置权重
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// 重置权重
    pub fn reset(&mut self) {
        self.weight = 0.0;
    }
}

impl Default for Morph {
    fn default() -> Self {
        Self::new(String::new(), MorphType::Vertex)
    }
}
