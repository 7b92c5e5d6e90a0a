//! Morph 管理器

use std::collections::HashMap;

use glam::Quat;

use super::{Morph, MorphType};
use crate::skeleton::BoneManager;

/// Morph 管理器
pub struct MorphManager {
    morphs: Vec<Morph>,
    /// 不同类型的 Morph 可以同名，按添加顺序保存
    name_to_index: HashMap<String, Vec<usize>>,
}

impl MorphManager {
    pub fn new() -> Self {
        Self {
            morphs: Vec::new(),
            name_to_index: HashMap::new(),
        }
    }

    /// 添加 Morph，返回索引
    pub fn add_morph(&mut self, morph: Morph) -> usize {
        let index = self.morphs.len();
        self.name_to_index
            .entry(morph.name.clone())
            .or_default()
            .push(index);
        self.morphs.push(morph);
        index
    }

    /// 通过名称查找 Morph（任意类型）
    pub fn find_morph_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name)?.first().copied()
    }

    /// 通过名称和类型查找 Morph
    pub fn find_morph(&self, name: &str, morph_type: MorphType) -> Option<usize> {
        self.name_to_index
            .get(name)?
            .iter()
            .copied()
            .find(|&i| self.morphs[i].morph_type == morph_type)
    }

    /// 获取 Morph 数量
    pub fn morph_count(&self) -> usize {
        self.morphs.len()
    }

    /// 获取 Morph
    pub fn get_morph(&self, index: usize) -> Option<&Morph> {
        self.morphs.get(index)
    }

    /// 获取 Morph 权重，不存在时为 0
    pub fn morph_weight(&self, index: usize) -> f32 {
        self.morphs.get(index).map(|m| m.weight).unwrap_or(0.0)
    }

    /// 设置 Morph 权重
    pub fn set_morph_weight(&mut self, index: usize, weight: f32) {
        if let Some(morph) = self.morphs.get_mut(index) {
            morph.set_weight(weight);
        }
    }

    /// 重置所有 Morph 权重
    pub fn reset_all_weights(&mut self) {
        for morph in &mut self.morphs {
            morph.reset();
        }
    }

    /// 组 Morph 是否包含骨骼 Morph 成员
    pub fn group_has_bone_morph(&self, index: usize) -> bool {
        self.morphs.get(index).is_some_and(|m| {
            m.group_indices.iter().any(|&(i, _)| {
                self.morphs
                    .get(i as usize)
                    .is_some_and(|e| e.morph_type == MorphType::Bone)
            })
        })
    }

    /// 以指定权重把骨骼 Morph 叠加到骨骼上
    pub fn apply_bone_morph(&self, index: usize, weight: f32, bone_manager: &mut BoneManager) {
        let Some(morph) = self.morphs.get(index) else {
            return;
        };
        for offset in &morph.bone_offsets {
            let translation = offset.translation * weight;
            let rotation = Quat::IDENTITY.slerp(offset.rotation, weight);
            bone_manager.add_bone_morph(offset.bone_index as usize, translation, rotation);
        }
    }

    /// 清除骨骼 Morph 作用过的骨骼的叠加量
    pub fn reset_bone_morph(&self, index: usize, bone_manager: &mut BoneManager) {
        let Some(morph) = self.morphs.get(index) else {
            return;
        };
        for offset in &morph.bone_offsets {
            if let Some(bone) = bone_manager.get_bone_mut(offset.bone_index as usize) {
                bone.reset_morph();
            }
        }
    }
}

impl Default for MorphManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Bone;
    use glam::Vec3;

    #[test]
    fn test_same_name_different_type() {
        let mut morphs = MorphManager::new();
        let vertex = morphs.add_morph(Morph::new("あ".to_string(), MorphType::Vertex));
        let bone = morphs.add_morph(Morph::new("あ".to_string(), MorphType::Bone));

        assert_eq!(morphs.find_morph_by_name("あ"), Some(vertex));
        assert_eq!(morphs.find_morph("あ", MorphType::Bone), Some(bone));
        assert_eq!(morphs.find_morph("あ", MorphType::Uv), None);
        assert_eq!(morphs.find_morph("い", MorphType::Vertex), None);
    }

    #[test]
    fn test_reset_all_weights() {
        let mut morphs = MorphManager::new();
        let a = morphs.add_morph(Morph::new("あ".to_string(), MorphType::Vertex));
        let blink = morphs.add_morph(Morph::new("まばたき".to_string(), MorphType::Face));
        assert_eq!(morphs.morph_count(), 2);

        morphs.set_morph_weight(a, 0.7);
        morphs.set_morph_weight(blink, 1.0);
        morphs.set_morph_weight(5, 1.0);
        assert!((morphs.morph_weight(a) - 0.7).abs() < 1e-6);
        assert_eq!(morphs.morph_weight(5), 0.0);

        morphs.reset_all_weights();
        assert_eq!(morphs.morph_weight(a), 0.0);
        assert_eq!(morphs.morph_weight(blink), 0.0);
    }

    #[test]
    fn test_apply_and_reset_bone_morph() {
        let mut bones = BoneManager::new();
        bones.add_bone(Bone::with_parent("顎", -1, Vec3::ZERO));
        bones.build_hierarchy();

        let mut morphs = MorphManager::new();
        let jaw = morphs.add_morph(
            Morph::new("口開け".to_string(), MorphType::Bone)
                .with_bone_offset(0, Vec3::new(0.0, -1.0, 0.0), Quat::from_rotation_x(0.4)),
        );

        morphs.apply_bone_morph(jaw, 0.5, &mut bones);
        let bone = bones.get_bone(0).unwrap();
        assert!((bone.morph_translate - Vec3::new(0.0, -0.5, 0.0)).length() < 1e-5);
        assert!(bone.morph_rotate.abs_diff_eq(Quat::from_rotation_x(0.2), 1e-5));

        morphs.reset_bone_morph(jaw, &mut bones);
        assert_eq!(bones.get_bone(0).unwrap().morph_translate, Vec3::ZERO);
    }

    #[test]
    fn test_group_has_bone_morph() {
        let mut morphs = MorphManager::new();
        let bone = morphs.add_morph(Morph::new("b".to_string(), MorphType::Bone));
        let vertex = morphs.add_morph(Morph::new("v".to_string(), MorphType::Vertex));
        let g1 = morphs.add_morph(
            Morph::new("g1".to_string(), MorphType::Group).with_group_element(bone as u32, 0.5),
        );
        let g2 = morphs.add_morph(
            Morph::new("g2".to_string(), MorphType::Group).with_group_element(vertex as u32, 1.0),
        );
        assert!(morphs.group_has_bone_morph(g1));
        assert!(!morphs.group_has_bone_morph(g2));
    }
}
