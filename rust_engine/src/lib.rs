//! MMDAgent Engine - MMDAgent 角色控制核心的 Rust 实现
//!
//! 提供 MMDAgent 中驱动角色骨骼与表情的运行时部件：
//! - KeyValue 信号存储
//! - MotionStocker 动作缓存（引用计数 + LRU）
//! - FaceInterface 表情 Morph 聚合
//! - ShapeMap 形状映射表
//! - BoneFaceControl 骨骼/表情插值控制

pub mod animation;
pub mod config;
pub mod content;
pub mod control;
pub mod model;
pub mod morph;
pub mod shape;
pub mod skeleton;

pub use animation::{MotionHandle, MotionSource, MotionStocker, SharedMotionStocker, VmdFile};
pub use config::AgentConfig;
pub use content::ContentKey;
pub use control::{BoneFaceControl, BoneFaceControlSet, KeyValue};
pub use model::MmdModel;
pub use morph::{Morph, MorphManager, MorphType};
pub use shape::{FaceInterface, ShapeMap, WeightCurve};
pub use skeleton::{Bone, BoneManager};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("VMD parse error: {0}")]
    VmdParse(String),

    #[error("Decrypt error: {0}")]
    Decrypt(String),

    #[error("Invalid content key: {0}")]
    InvalidKey(String),

    #[error("Bone not found: {0}")]
    BoneNotFound(String),

    #[error("Morph not found: {0}")]
    MorphNotFound(String),

    #[error("Morph {name} exceeds {max} assignments per kind")]
    MorphCapacity { name: String, max: usize },

    #[error("Invalid morph rate: {0}")]
    InvalidRate(f32),

    #[error("Bone/face binding table is full ({0})")]
    BindingFull(usize),

    #[error("KeyValue store is full ({0})")]
    KeyValueFull(usize),
}

pub type Result<T> = std::result::Result<T, MmdError>;
