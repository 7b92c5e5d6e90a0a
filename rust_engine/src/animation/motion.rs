//! Motion 核心数据结构
//!
//! 存储按名称分组的骨骼轨道和 Morph 轨道

use std::collections::HashMap;

use super::keyframe::{BoneKeyframe, MorphKeyframe};

/// 动画数据
#[derive(Debug, Clone, Default)]
pub struct Motion {
    /// 骨骼动画轨道（骨骼名称 -> 按帧排序的关键帧）
    pub bone_tracks: HashMap<String, Vec<BoneKeyframe>>,
    /// Morph 动画轨道（Morph 名称 -> 按帧排序的关键帧）
    pub morph_tracks: HashMap<String, Vec<MorphKeyframe>>,
}

impl Motion {
    /// 创建空的 Motion
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取动画持续时间（最大帧索引）
    pub fn duration(&self) -> u32 {
        let bone_max = self
            .bone_tracks
            .values()
            .filter_map(|t| t.last().map(|k| k.frame_index))
            .max()
            .unwrap_or(0);

        let morph_max = self
            .morph_tracks
            .values()
            .filter_map(|t| t.last().map(|k| k.frame_index))
            .max()
            .unwrap_or(0);

        bone_max.max(morph_max)
    }

    /// 插入骨骼关键帧（同一帧重复时覆盖）
    pub fn insert_bone_keyframe(&mut self, name: &str, keyframe: BoneKeyframe) {
        let track = self.bone_tracks.entry(name.to_string()).or_default();
        match track.binary_search_by_key(&keyframe.frame_index, |k| k.frame_index) {
            Ok(pos) => track[pos] = keyframe,
            Err(pos) => track.insert(pos, keyframe),
        }
    }

    /// 插入 Morph 关键帧（同一帧重复时覆盖）
    pub fn insert_morph_keyframe(&mut self, name: &str, keyframe: MorphKeyframe) {
        let track = self.morph_tracks.entry(name.to_string()).or_default();
        match track.binary_search_by_key(&keyframe.frame_index, |k| k.frame_index) {
            Ok(pos) => track[pos] = keyframe,
            Err(pos) => track.insert(pos, keyframe),
        }
    }

    /// 骨骼关键帧总数
    pub fn bone_keyframe_count(&self) -> usize {
        self.bone_tracks.values().map(Vec::len).sum()
    }

    /// Morph 关键帧总数
    pub fn morph_keyframe_count(&self) -> usize {
        self.morph_tracks.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyframes_sorted_and_deduplicated() {
        let mut motion = Motion::new();
        motion.insert_morph_keyframe("あ", MorphKeyframe::new(10, 1.0));
        motion.insert_morph_keyframe("あ", MorphKeyframe::new(0, 0.0));
        motion.insert_morph_keyframe("あ", MorphKeyframe::new(10, 0.5));
        motion.insert_bone_keyframe("頭", BoneKeyframe::new(42));

        let track = &motion.morph_tracks["あ"];
        assert_eq!(track.len(), 2);
        assert_eq!(track[0].frame_index, 0);
        assert_eq!(track[1].weight, 0.5);
        assert_eq!(motion.duration(), 42);
        assert_eq!(motion.morph_keyframe_count(), 2);
        assert_eq!(motion.bone_keyframe_count(), 1);
    }
}
