//! Per-frame draw planning.
//!
//! # Overview
//!
//! Before any commands are recorded, the frame's object lists are flattened
//! into a [`FramePlan`]: an ordered list of draw calls for the shadow pass
//! and the geometry pass, with the indirect-draw capability fork already
//! resolved. Planning is pure CPU work over plain data, which keeps the
//! aggregation and fork logic testable without a device.
//!
//! The plan is rebuilt from scratch every frame (no caching) because the
//! object lists can change between frames in principle.
//!
//! # Example
//!
//! ```
//! use deferred_renderer::plan::{DrawCaps, DrawKind, DrawRef, FramePlan, PassLists};
//!
//! let mut lists = PassLists::default();
//! lists.plain.push(DrawRef::new(0, DrawKind::Plain));
//! lists.indirect_instanced.push(DrawRef::new(1, DrawKind::IndirectInstanced { commands: 8192 }));
//!
//! let plan = FramePlan::build(&lists, DrawCaps { multi_draw_indirect: true }, 0);
//! // One plain draw plus a single multi-draw covering all 8192 commands.
//! assert_eq!(plan.geometry.len(), 2);
//! ```

use tracing::warn;

/// Number of compiled shader variants (specialization constant values 0..=9).
pub const VARIANT_COUNT: u32 = 10;

/// Byte stride between consecutive indexed-indirect commands.
pub const INDIRECT_COMMAND_STRIDE: u32 =
    std::mem::size_of::<ash::vk::DrawIndexedIndirectCommand>() as u32;

/// Vertex count of the full-screen composition draw (two triangles, no
/// vertex buffer; positions are derived from `gl_VertexIndex`).
pub const COMPOSITION_VERTEX_COUNT: u32 = 6;

/// How an object is drawn, independent of its GPU resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawKind {
    /// One indexed draw with a single instance.
    Plain,
    /// One indexed draw covering `instances` instances from an instance
    /// attribute buffer.
    Instanced {
        /// Number of instances in the object's instance buffer.
        instances: u32,
    },
    /// Draw parameters read from an indirect command buffer.
    Indirect {
        /// Number of commands in the object's indirect buffer.
        commands: u32,
    },
    /// Indirect draw that also consumes an instance attribute buffer.
    IndirectInstanced {
        /// Number of commands in the object's indirect buffer.
        commands: u32,
    },
}

/// Reference to one object inside a pass's object list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRef {
    /// Index into the renderer's object array.
    pub object: usize,
    /// How the object is drawn.
    pub kind: DrawKind,
}

impl DrawRef {
    /// Creates a new draw reference.
    pub fn new(object: usize, kind: DrawKind) -> Self {
        Self { object, kind }
    }
}

/// The four opaque object groups, in shadow-pass recording order.
///
/// Every object listed in any group is drawn by both the shadow pass and
/// the geometry pass; an object missing from the aggregation would simply
/// not cast a shadow.
#[derive(Clone, Debug, Default)]
pub struct PassLists {
    /// Plain indexed objects.
    pub plain: Vec<DrawRef>,
    /// Instanced objects.
    pub instanced: Vec<DrawRef>,
    /// Indirect-draw objects.
    pub indirect: Vec<DrawRef>,
    /// Indirect-draw objects with instance attributes.
    pub indirect_instanced: Vec<DrawRef>,
}

impl PassLists {
    /// Total number of objects across all four groups.
    pub fn object_count(&self) -> usize {
        self.plain.len() + self.instanced.len() + self.indirect.len()
            + self.indirect_instanced.len()
    }

    fn iter_all(&self) -> impl Iterator<Item = &DrawRef> {
        self.plain
            .iter()
            .chain(self.instanced.iter())
            .chain(self.indirect.iter())
            .chain(self.indirect_instanced.iter())
    }
}

/// Device capabilities that affect planning.
#[derive(Clone, Copy, Debug)]
pub struct DrawCaps {
    /// Whether one indirect call may consume several commands.
    pub multi_draw_indirect: bool,
}

/// A single planned draw call, ready to record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannedDraw {
    /// `draw_indexed` over the object's full index range.
    Indexed {
        /// Index into the renderer's object array.
        object: usize,
        /// Number of instances (1 for plain objects).
        instance_count: u32,
    },
    /// `draw_indexed_indirect` reading from the object's indirect buffer.
    IndexedIndirect {
        /// Index into the renderer's object array.
        object: usize,
        /// Byte offset of the first command.
        offset: u64,
        /// Number of commands consumed by this call.
        draw_count: u32,
    },
}

impl PlannedDraw {
    /// The object this draw belongs to.
    pub fn object(&self) -> usize {
        match *self {
            PlannedDraw::Indexed { object, .. } => object,
            PlannedDraw::IndexedIndirect { object, .. } => object,
        }
    }
}

/// The flattened draw sequence for one frame.
#[derive(Clone, Debug, Default)]
pub struct FramePlan {
    /// Depth-only draws, aggregated over all four opaque groups.
    pub shadow: Vec<PlannedDraw>,
    /// Geometry pass draws.
    pub geometry: Vec<PlannedDraw>,
    /// Shader variant bound by the geometry and composition pipelines.
    pub variant: u32,
}

impl FramePlan {
    /// Builds the frame's draw sequence from the opaque object groups.
    ///
    /// Both passes draw the exact same set of objects; the shadow list is
    /// aggregated group by group so that every opaque object also casts a
    /// shadow. When multi-draw-indirect is unsupported, each indirect
    /// object expands into one call per command instead of a single call
    /// consuming all of them; both paths draw identical geometry and
    /// differ only in CPU-side submission count.
    ///
    /// An out-of-range variant selector falls back to variant 0.
    pub fn build(lists: &PassLists, caps: DrawCaps, variant: u32) -> Self {
        let variant = if variant < VARIANT_COUNT {
            variant
        } else {
            warn!(variant, "Variant selector out of range, using 0");
            0
        };

        let mut draws = Vec::with_capacity(lists.object_count());
        for draw_ref in lists.iter_all() {
            Self::expand(&mut draws, draw_ref, caps);
        }

        Self {
            shadow: draws.clone(),
            geometry: draws,
            variant,
        }
    }

    /// Whether the main pass ends with the sky dome draw.
    ///
    /// Only the lit variant gets a sky; the debug visualization variants
    /// show the raw G-buffer contents without one.
    pub fn draws_sky(&self) -> bool {
        self.variant == 0
    }

    fn expand(out: &mut Vec<PlannedDraw>, draw_ref: &DrawRef, caps: DrawCaps) {
        match draw_ref.kind {
            DrawKind::Plain => out.push(PlannedDraw::Indexed {
                object: draw_ref.object,
                instance_count: 1,
            }),
            DrawKind::Instanced { instances } => out.push(PlannedDraw::Indexed {
                object: draw_ref.object,
                instance_count: instances,
            }),
            DrawKind::Indirect { commands } | DrawKind::IndirectInstanced { commands } => {
                if caps.multi_draw_indirect {
                    out.push(PlannedDraw::IndexedIndirect {
                        object: draw_ref.object,
                        offset: 0,
                        draw_count: commands,
                    });
                } else {
                    for i in 0..commands {
                        out.push(PlannedDraw::IndexedIndirect {
                            object: draw_ref.object,
                            offset: u64::from(i) * u64::from(INDIRECT_COMMAND_STRIDE),
                            draw_count: 1,
                        });
                    }
                }
            }
        }
    }

    /// Number of draw calls the geometry pass will record for one object.
    pub fn draw_calls_for(&self, object: usize) -> usize {
        self.geometry.iter().filter(|d| d.object() == object).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample_lists() -> PassLists {
        PassLists {
            plain: vec![
                DrawRef::new(0, DrawKind::Plain),
                DrawRef::new(1, DrawKind::Plain),
            ],
            instanced: vec![DrawRef::new(2, DrawKind::Instanced { instances: 64 })],
            indirect: vec![DrawRef::new(3, DrawKind::Indirect { commands: 4 })],
            indirect_instanced: vec![DrawRef::new(
                4,
                DrawKind::IndirectInstanced { commands: 3 },
            )],
        }
    }

    #[test]
    fn test_shadow_list_covers_every_opaque_object() {
        let lists = sample_lists();
        let plan = FramePlan::build(&lists, DrawCaps { multi_draw_indirect: true }, 0);

        let opaque: BTreeSet<usize> = lists.iter_all().map(|d| d.object).collect();
        let shadowed: BTreeSet<usize> = plan.shadow.iter().map(|d| d.object()).collect();
        assert_eq!(opaque, shadowed);
    }

    #[test]
    fn test_shadow_aggregation_order_is_group_order() {
        let plan = FramePlan::build(
            &sample_lists(),
            DrawCaps { multi_draw_indirect: true },
            0,
        );
        let order: Vec<usize> = plan.shadow.iter().map(|d| d.object()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_multi_draw_collapses_to_single_call() {
        let plan = FramePlan::build(
            &sample_lists(),
            DrawCaps { multi_draw_indirect: true },
            0,
        );

        assert_eq!(plan.draw_calls_for(3), 1);
        assert_eq!(
            plan.geometry.iter().find(|d| d.object() == 3),
            Some(&PlannedDraw::IndexedIndirect {
                object: 3,
                offset: 0,
                draw_count: 4,
            })
        );
    }

    #[test]
    fn test_no_multi_draw_expands_per_command() {
        let plan = FramePlan::build(
            &sample_lists(),
            DrawCaps { multi_draw_indirect: false },
            0,
        );

        assert_eq!(plan.draw_calls_for(3), 4);
        let offsets: Vec<u64> = plan
            .geometry
            .iter()
            .filter_map(|d| match d {
                PlannedDraw::IndexedIndirect { object: 3, offset, draw_count } => {
                    assert_eq!(*draw_count, 1);
                    Some(*offset)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            offsets,
            vec![
                0,
                u64::from(INDIRECT_COMMAND_STRIDE),
                2 * u64::from(INDIRECT_COMMAND_STRIDE),
                3 * u64::from(INDIRECT_COMMAND_STRIDE),
            ]
        );
    }

    #[test]
    fn test_instanced_keeps_instance_count() {
        let plan = FramePlan::build(
            &sample_lists(),
            DrawCaps { multi_draw_indirect: false },
            0,
        );
        assert_eq!(
            plan.geometry.iter().find(|d| d.object() == 2),
            Some(&PlannedDraw::Indexed {
                object: 2,
                instance_count: 64,
            })
        );
    }

    #[test]
    fn test_out_of_range_variant_falls_back_to_zero() {
        let plan = FramePlan::build(
            &PassLists::default(),
            DrawCaps { multi_draw_indirect: true },
            42,
        );
        assert_eq!(plan.variant, 0);

        let plan = FramePlan::build(
            &PassLists::default(),
            DrawCaps { multi_draw_indirect: true },
            9,
        );
        assert_eq!(plan.variant, 9);
    }

    #[test]
    fn test_only_lit_variant_draws_sky() {
        let caps = DrawCaps { multi_draw_indirect: true };
        assert!(FramePlan::build(&PassLists::default(), caps, 0).draws_sky());
        for variant in 1..VARIANT_COUNT {
            assert!(!FramePlan::build(&PassLists::default(), caps, variant).draws_sky());
        }
    }

    #[test]
    fn test_empty_lists_produce_empty_plan() {
        let plan = FramePlan::build(
            &PassLists::default(),
            DrawCaps { multi_draw_indirect: true },
            0,
        );
        assert!(plan.shadow.is_empty());
        assert!(plan.geometry.is_empty());
    }
}
