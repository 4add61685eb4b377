/// Auxiliary per-pixel channels, shared by every class and instance of a render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModalityFlags {
    /// Produce the `depth` channel.
    pub depth: bool,
    /// Produce the `normal` channel.
    pub normal: bool,
    /// Produce the `optical_flow` channel.
    pub optical_flow: bool,
}

impl ModalityFlags {
    /// No auxiliary channels.
    pub const NONE: Self = Self {
        depth: false,
        normal: false,
        optical_flow: false,
    };

    /// Every auxiliary channel.
    pub const ALL: Self = Self {
        depth: true,
        normal: true,
        optical_flow: true,
    };

    /// Whether any auxiliary channel is requested.
    pub fn any(self) -> bool {
        self.depth || self.normal || self.optical_flow
    }
}
