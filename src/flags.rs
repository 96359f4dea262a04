//! Mutable per-body bitmask state.
//!
//! Flags like `is_fast`/`is_bullet` are modeled as an explicit bitset-like
//! typed value rather than separate `bool` fields, so that clearing/copying
//! a subset of flags across solver/finalizer phases is an explicit,
//! auditable bitwise operation instead of N field assignments.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BodyFlags: u32 {
        const IS_FAST             = 1 << 0;
        const IS_BULLET           = 1 << 1;
        const IS_SPEED_CAPPED     = 1 << 2;
        const HAD_TIME_OF_IMPACT  = 1 << 3;
        const ENLARGE_BOUNDS      = 1 << 4;
        const ALLOW_FAST_ROTATION = 1 << 5;
        const LOCK_LINEAR_X       = 1 << 6;
        const LOCK_LINEAR_Y       = 1 << 7;
        const LOCK_ANGULAR_Z      = 1 << 8;
    }
}

impl BodyFlags {
    /// Flags cleared by the finalizer at the start of every step and
    /// re-derived from that step's solve/CCD outcome.
    pub const TRANSIENT: BodyFlags = BodyFlags::from_bits_truncate(
        Self::IS_FAST.bits() | Self::IS_SPEED_CAPPED.bits() | Self::HAD_TIME_OF_IMPACT.bits(),
    );

    /// Subset of `TRANSIENT` copied onto the durable body record so a host
    /// can query "did this body cap its speed or take a TOI hit last step"
    /// without needing the (awake-set-only) sim record.
    pub const DURABLE_COPY: BodyFlags = BodyFlags::from_bits_truncate(
        Self::IS_SPEED_CAPPED.bits() | Self::HAD_TIME_OF_IMPACT.bits(),
    );
}
