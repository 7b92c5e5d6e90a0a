//! Morph 变形系统

mod morph;
mod manager;

pub use morph::Morph;
pub use manager::MorphManager;

use glam::{Quat, Vec3};

/// Morph 类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MorphType {
    Group,
    Vertex,
    Bone,
    Uv,
    Material,
    /// PMD 旧式表情
    Face,
}

impl MorphType {
    /// 按名称解析 Morph 时的查找顺序
    pub const SEARCH_ORDER: [MorphType; 6] = [
        MorphType::Bone,
        MorphType::Vertex,
        MorphType::Uv,
        MorphType::Material,
        MorphType::Group,
        MorphType::Face,
    ];
}

/// 骨骼 Morph 偏移
#[derive(Clone, Debug)]
pub struct BoneMorphOffset {
    pub bone_index: u32,
    pub translation: Vec3,
    pub rotation: Quat,
}
