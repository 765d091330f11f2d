// THEORY:
// The host graph discovers what it can run through node descriptors. Two node
// kinds are offered: the automatic compositor and the interactive handoff.
// The float input table doubles as the source of truth for parameter ranges,
// so `RelightParams::default()` and the table must agree.

use serde::Serialize;

use crate::compositor::RelightParams;

pub const NODE_CATEGORY: &str = "relight";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    RelightBasic,
    Relight,
}

/// A numeric slider input as presented by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloatInput {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// A free-text input as presented by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StringInput {
    pub name: &'static str,
    pub default: &'static str,
}

const fn slider(name: &'static str, default: f32, min: f32, max: f32) -> FloatInput {
    FloatInput {
        name,
        default,
        min,
        max,
        step: 0.001,
    }
}

pub const BASIC_FLOAT_INPUTS: [FloatInput; 8] = [
    slider("x", 0.5, 0.0, 1.0),
    slider("y", 0.5, 0.0, 1.0),
    slider("z", 1.0, -1.0, 1.0),
    slider("brightness", 1.0, 0.0, 3.0),
    slider("shadow_range", 1.0, 0.0, 2.0),
    slider("shadow_strength", 1.0, 0.0, 2.0),
    slider("highlight_range", 1.0, 0.0, 2.0),
    slider("highlight_strength", 1.0, 0.0, 2.0),
];

pub const BASIC_STRING_INPUTS: [StringInput; 2] = [
    StringInput {
        name: "highlight_color",
        default: "#FFFFFF",
    },
    StringInput {
        name: "shadow_color",
        default: "#000000",
    },
];

/// Serializable summary of a node kind.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    pub type_name: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
    pub output_node: bool,
    pub image_inputs: &'static [&'static str],
    pub float_inputs: &'static [FloatInput],
    pub string_inputs: &'static [StringInput],
    /// Hidden, host-supplied inputs.
    pub hidden_inputs: &'static [&'static str],
}

impl NodeKind {
    pub const ALL: [Self; 2] = [Self::RelightBasic, Self::Relight];

    pub const fn type_name(self) -> &'static str {
        match self {
            Self::RelightBasic => "RelightBasic",
            Self::Relight => "Relight",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::RelightBasic => "Relight Basic",
            Self::Relight => "Relight",
        }
    }

    /// Interactive relights emit a notice to the editor, which counts as an
    /// observable side effect for the host's scheduling.
    pub const fn is_output_node(self) -> bool {
        matches!(self, Self::Relight)
    }

    pub fn descriptor(self) -> NodeDescriptor {
        let base = NodeDescriptor {
            type_name: self.type_name(),
            display_name: self.display_name(),
            category: NODE_CATEGORY,
            output_node: self.is_output_node(),
            image_inputs: &["image", "normals"],
            float_inputs: &[],
            string_inputs: &[],
            hidden_inputs: &[],
        };

        match self {
            Self::RelightBasic => NodeDescriptor {
                float_inputs: &BASIC_FLOAT_INPUTS,
                string_inputs: &BASIC_STRING_INPUTS,
                ..base
            },
            Self::Relight => NodeDescriptor {
                hidden_inputs: &["unique_id"],
                ..base
            },
        }
    }
}

impl RelightParams {
    /// Clamps every numeric input into its slider range.
    pub fn clamped(self) -> Self {
        let [x, y, z, brightness, shadow_range, shadow_strength, highlight_range, highlight_strength] =
            BASIC_FLOAT_INPUTS;
        Self {
            x: self.x.clamp(x.min, x.max),
            y: self.y.clamp(y.min, y.max),
            z: self.z.clamp(z.min, z.max),
            brightness: self.brightness.clamp(brightness.min, brightness.max),
            shadow_range: self.shadow_range.clamp(shadow_range.min, shadow_range.max),
            shadow_strength: self.shadow_strength.clamp(shadow_strength.min, shadow_strength.max),
            highlight_range: self.highlight_range.clamp(highlight_range.min, highlight_range.max),
            highlight_strength: self
                .highlight_strength
                .clamp(highlight_strength.min, highlight_strength.max),
            ..self
        }
    }
}
