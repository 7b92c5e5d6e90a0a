//! MMD 运行时模型

use crate::morph::{MorphManager, MorphType};
use crate::skeleton::BoneManager;

/// MMD 运行时模型
///
/// 控制器通过骨骼/Morph 索引读写这里的状态，渲染端随后读取。
pub struct MmdModel {
    pub name: String,

    // 子系统
    pub bone_manager: BoneManager,
    pub morph_manager: MorphManager,
}

impl MmdModel {
    /// 创建空模型
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bone_manager: BoneManager::new(),
            morph_manager: MorphManager::new(),
        }
    }

    /// 通过名称查找骨骼
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_manager.find_bone_by_name(name)
    }

    /// 通过名称和类型查找 Morph
    pub fn find_morph(&self, name: &str, morph_type: MorphType) -> Option<usize> {
        self.morph_manager.find_morph(name, morph_type)
    }

    /// 按 [`MorphType::SEARCH_ORDER`] 解析 Morph 名称
    pub fn resolve_morph(&self, name: &str) -> Option<(usize, MorphType)> {
        MorphType::SEARCH_ORDER
            .iter()
            .find_map(|&ty| self.find_morph(name, ty).map(|i| (i, ty)))
    }

    /// 获取受指定骨骼影响的子孙骨骼
    pub fn child_bone_list(&self, bone: usize) -> Vec<usize> {
        self.bone_manager.child_bone_list(&[bone])
    }

    /// 帧开始：清除上一帧的动画状态、骨骼 Morph 叠加量与 Morph 权重
    pub fn begin_animation(&mut self) {
        self.bone_manager.reset_all_transforms();
        self.bone_manager.reset_all_morphs();
        self.morph_manager.reset_all_weights();
    }

    /// 帧结束：按层级重新计算全部骨骼变换
    pub fn update(&mut self) {
        self.bone_manager.update_transforms();
    }
}
