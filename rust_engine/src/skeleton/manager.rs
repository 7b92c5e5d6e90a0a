//! 骨骼管理器

use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

use super::Bone;

/// 骨骼管理器
pub struct BoneManager {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    /// 父骨骼在前的更新顺序
    sorted_indices: Vec<usize>,
}

impl BoneManager {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            name_to_index: HashMap::new(),
            sorted_indices: Vec::new(),
        }
    }

    /// 添加骨骼，返回索引
    pub fn add_bone(&mut self, bone: Bone) -> usize {
        let index = self.bones.len();
        self.name_to_index.insert(bone.name.clone(), index);
        self.bones.push(bone);
        index
    }

    /// 构建骨骼层级：计算父骨骼偏移与更新顺序，并求出初始全局变换
    pub fn build_hierarchy(&mut self) {
        let bone_count = self.bones.len();
        if bone_count == 0 {
            return;
        }

        for i in 0..bone_count {
            let pos = self.bones[i].initial_position;
            let offset = match self.parent_of(i) {
                Some(parent) => pos - self.bones[parent].initial_position,
                None => pos,
            };
            self.bones[i].bone_offset = offset;
        }

        // 按层级深度排序，保证父骨骼先于子骨骼更新
        let depths: Vec<usize> = (0..bone_count).map(|i| self.depth_of(i)).collect();
        self.sorted_indices = (0..bone_count).collect();
        self.sorted_indices.sort_by_key(|&i| depths[i]);

        self.update_transforms();
    }

    fn parent_of(&self, index: usize) -> Option<usize> {
        let parent = self.bones.get(index)?.parent_index;
        if parent >= 0 && (parent as usize) < self.bones.len() && parent as usize != index {
            Some(parent as usize)
        } else {
            None
        }
    }

    fn append_parent_of(&self, index: usize) -> Option<usize> {
        let bone = self.bones.get(index)?;
        if !(bone.is_append_rotate || bone.is_append_translate) {
            return None;
        }
        let parent = bone.append_parent;
        if parent >= 0 && (parent as usize) < self.bones.len() && parent as usize != index {
            Some(parent as usize)
        } else {
            None
        }
    }

    fn depth_of(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = index;
        // 环状数据时以骨骼数为上限
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            if depth > self.bones.len() {
                break;
            }
            current = parent;
        }
        depth
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// 获取骨骼
    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// 获取可变骨骼引用
    pub fn get_bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    /// 重置所有骨骼的动画状态
    pub fn reset_all_transforms(&mut self) {
        for bone in &mut self.bones {
            bone.reset_animation();
        }
    }

    /// 重置所有骨骼的 Morph 叠加量
    pub fn reset_all_morphs(&mut self) {
        for bone in &mut self.bones {
            bone.reset_morph();
        }
    }

    /// 更新单根骨骼：先本地变换，再由父骨骼的全局变换求全局变换
    pub fn update_bone(&mut self, index: usize) {
        if index >= self.bones.len() {
            return;
        }

        let append = self.append_parent_of(index).map(|p| {
            let source = &self.bones[p];
            (
                source.animation_translate + source.morph_translate,
                source.animation_rotate,
            )
        });
        let parent_global = self
            .parent_of(index)
            .map(|p| self.bones[p].global_transform);

        let bone = &mut self.bones[index];
        bone.update_local_transform(append);
        bone.global_transform = match parent_global {
            Some(parent) => parent * bone.local_transform,
            None => bone.local_transform,
        };
    }

    /// 按层级顺序更新所有骨骼
    pub fn update_transforms(&mut self) {
        let sorted_indices = self.sorted_indices.clone();
        for idx in sorted_indices {
            self.update_bone(idx);
        }
    }

    /// 获取受指定骨骼影响的全部子孙骨骼
    ///
    /// 父骨骼或附加父骨骼在集合中的骨骼都会被收集，结果按发现顺序排列
    /// （父在前），不含重复，也不含 `roots` 本身。
    pub fn child_bone_list(&self, roots: &[usize]) -> Vec<usize> {
        let mut list: Vec<usize> = Vec::new();
        let mut cursor = 0;
        let mut frontier: Vec<usize> = roots.to_vec();

        loop {
            for &source in &frontier {
                for i in 0..self.bones.len() {
                    if roots.contains(&i) || list.contains(&i) {
                        continue;
                    }
                    if self.parent_of(i) == Some(source) || self.append_parent_of(i) == Some(source) {
                        list.push(i);
                    }
                }
            }
            if cursor >= list.len() {
                break;
            }
            frontier = list[cursor..].to_vec();
            cursor = list.len();
        }

        list
    }

    /// 获取骨骼当前的全局变换
    pub fn global_transform(&self, index: usize) -> Option<Mat4> {
        self.bones.get(index).map(|b| b.global_transform)
    }

    /// 应用骨骼 Morph 偏移
    pub fn add_bone_morph(&mut self, index: usize, translate: Vec3, rotate: Quat) {
        if let Some(bone) = self.bones.get_mut(index) {
            bone.add_morph(translate, rotate);
        }
    }
}

impl Default for BoneManager {
    fn default() -> Self {
        Self::new()
    }
}
