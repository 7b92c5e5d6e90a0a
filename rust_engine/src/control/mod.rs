//! 角色控制：KeyValue 信号与骨骼/表情控制

mod binding;
mod bone_face;
mod key_value;

pub use binding::{BoneFaceControlSet, MAX_BIND};
pub use bone_face::{BoneFaceControl, ControlTarget};
pub use key_value::KeyValue;

pub(crate) use key_value::parse_leading_f32;
