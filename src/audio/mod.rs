pub mod analysis;
pub mod color;
pub mod decode;
pub mod features;
pub mod frame;
pub mod histogram;
pub mod key;
pub mod pitch;
pub mod session;
pub mod spectrum;
