//! Deferred-shading frame graph and synchronization engine.
//!
//! # Overview
//!
//! This crate ties the passes of the deferred pipeline together:
//!
//! - [`plan`] flattens the frame's object lists into an ordered draw
//!   sequence, resolving the indirect-draw capability fork on the CPU.
//! - [`shadow`], [`geometry`], [`lighting`] and [`sky`] own the per-pass
//!   GPU resources and record their command sequences.
//! - [`frame_manager`] enforces the frame-in-flight fence/semaphore
//!   discipline.
//! - [`renderer`] orchestrates a full frame: wait, acquire, update
//!   uniforms, record, submit, present, and swap-resource recreation on
//!   resize.

pub mod error;
pub mod frame;
pub mod frame_manager;
pub mod gbuffer;
pub mod geometry;
pub mod lighting;
pub mod object;
pub mod plan;
pub mod renderer;
pub mod shadow;
pub mod sky;
pub mod ubo;

pub use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;

pub use error::{RenderError, RenderResult};
pub use frame::FrameRing;
pub use frame_manager::{AcquireResult, FrameManager};
pub use object::{ObjectSharedBindings, RenderObject};
pub use plan::{DrawCaps, DrawKind, DrawRef, FramePlan, PassLists, PlannedDraw, VARIANT_COUNT};
pub use renderer::{ObjectId, Renderer};
pub use shadow::{SHADOWMAP_DIM, ShadowPass};
pub use ubo::{BaseUniform, GlobalConstants, ViewUniform};
