//! Identity provider clients and the drivers built on them.

pub mod wechat_work;
pub mod windows_live;
