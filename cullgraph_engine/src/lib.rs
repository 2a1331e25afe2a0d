/*!
# Cullgraph Engine

Validation core and GPU-culling draw protocol, independent of any graphics API.

Scene objects describe GPU state (descriptor sets, pipelines, buffers) once;
every native object is built lazily the first time it is needed by a device
or by a frame of a surface, and rebuilt only after something it depends on
changes. Backends (Vulkan today) implement the `GraphicsDevice` and
`CommandList` traits.

## Architecture

- **RenderContext**: the device, and optionally the surface frame, being validated for
- **PerDeviceCache / PerSurfaceCache**: native handles keyed by device or by surface frame slot
- **DescriptorSet**: resources and bindings, rebuilt per frame slot when a resource changes
- **GraphicsPipeline / ComputePipeline**: pipeline objects built per device
- **SurfaceFrames / StageRing**: frames in flight and the update/render hand-off
- **CullCategory / CullFrameRecorder**: filter shader, A→B copy and indirect draws
*/

// Internal modules
mod error;
mod engine;
mod config;
mod context;
mod node;
pub mod log;
pub mod device;
pub mod validation;
pub mod descriptor;
pub mod pipeline;
pub mod frame;
pub mod cull;

// Main cullgraph namespace module
pub mod cullgraph {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton and its configuration
    pub use crate::engine::Engine;
    pub use crate::config::EngineConfig;

    // Validation keys
    pub use crate::context::{ContextKey, DeviceId, RenderContext, SurfaceFrame, SurfaceId};

    // Scene graph hooks
    pub use crate::node::{Node, NodeList, NodeVisitor};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Backend boundary
    pub mod device {
        pub use crate::device::*;
    }

    pub mod validation {
        pub use crate::validation::*;
    }

    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod cull {
        pub use crate::cull::*;
    }
}

// Re-export math library at crate root
pub use glam;
