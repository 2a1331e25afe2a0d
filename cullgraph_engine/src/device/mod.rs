/// Device module - backend boundary traits and the types crossing it

pub mod types;
pub mod pipeline_desc;
pub mod graphics_device;
pub mod command_list;
pub mod mock_device;

pub use types::*;
pub use pipeline_desc::*;
pub use graphics_device::*;
pub use command_list::*;
