//! Broad-phase abstraction.
//!
//! Tree construction, refit, and proxy management live outside this crate;
//! CCD and the sensor engine only need to *query* the three per-body-type
//! trees and to request fat-AABB enlargement/move buffering.

use parry2d::bounding_volume::Aabb;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeIndex {
    Static = 0,
    Kinematic = 1,
    Dynamic = 2,
}

pub const TREE_COUNT: usize = 3;
pub const ALL_TREES: [TreeIndex; TREE_COUNT] = [TreeIndex::Static, TreeIndex::Kinematic, TreeIndex::Dynamic];

/// Opaque key identifying a shape's slot in a broad-phase tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyKey(pub u32);

/// The three dynamic trees and the operations CCD/sensors need from them.
/// Implemented by the host's broad-phase; this crate never builds or
/// refits a tree itself.
pub trait BroadPhase {
    /// Invokes `callback(proxy_id, user_data)` for every proxy in `tree`
    /// whose fat AABB overlaps `aabb` and whose category bits intersect
    /// `mask_bits`. Continues while `callback` returns `true`.
    fn query(
        &self,
        tree: TreeIndex,
        aabb: &Aabb,
        mask_bits: u64,
        callback: &mut dyn FnMut(u32, u64) -> bool,
    );

    /// Grows the stored fat AABB for `proxy` to at least contain `fat_aabb`.
    fn enlarge_proxy(&self, proxy: ProxyKey, fat_aabb: Aabb);

    /// Defers a proxy for move-buffer processing (broad-phase pair
    /// generation happens outside this crate; this just flags "looked at
    /// me this step").
    fn buffer_move(&self, proxy: ProxyKey);
}
