/// Engine-wide configuration

use crate::log::LogSeverity;

/// Tunables shared by every device and surface
///
/// Per-object shape (pool capacity, binding lists, frame count of a surface)
/// is still passed to constructors; this only holds the defaults and
/// process-wide switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Entries below this severity are dropped before reaching the logger
    pub min_log_severity: LogSeverity,

    /// Frame count used by `SurfaceFrames::with_default_frame_count`
    pub frames_in_flight: u32,

    /// Local workgroup size of the culling filter shader
    pub dispatch_group_size: u32,

    /// Force multi-draw-indirect on or off regardless of device support
    pub multi_draw_indirect_override: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_log_severity: LogSeverity::Info,
            frames_in_flight: 3,
            dispatch_group_size: 16,
            multi_draw_indirect_override: None,
        }
    }
}

impl EngineConfig {
    /// Number of workgroups needed to cover `instance_count` instances
    pub fn dispatch_groups(&self, instance_count: u32) -> u32 {
        let group = self.dispatch_group_size.max(1);
        instance_count / group + u32::from(instance_count % group > 0)
    }
}
