//! MMD 模型运行时管理

mod runtime;

pub use runtime::MmdModel;
