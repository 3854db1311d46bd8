// ============ GC Header ============

// Color bit positions in marked field
pub const WHITE0BIT: u8 = 0; // Object is white (type 0)
pub const WHITE1BIT: u8 = 1; // Object is white (type 1)
pub const BLACKBIT: u8 = 2; // Object is black
pub const FINALIZEDBIT: u8 = 3; // Finalizer already ran (never cleared)
pub const FIXEDBIT: u8 = 5; // Object is never collected

// Bit masks
pub const WHITEBITS: u8 = (1 << WHITE0BIT) | (1 << WHITE1BIT);
pub const MASKCOLORS: u8 = (1 << BLACKBIT) | WHITEBITS;

/// Logical tri-color state of an object, relative to the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcColor {
    White,
    Gray,
    Black,
}

/// GC object header - stored next to every object in its arena slot
///
/// Bit layout of `marked` field:
/// - Bit 0: WHITE0 (white type 0)
/// - Bit 1: WHITE1 (white type 1)
/// - Bit 2: BLACK (fully marked)
/// - Bit 3: FINALIZED (finalizer has been invoked)
/// - Bit 5: FIXED (never collected)
///
/// Gray is implicit: an object is gray iff it has no white bits AND no black bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcHeader {
    pub marked: u8,
    /// Bytes charged to the byte counter for this object
    pub size: u32,
}

impl GcHeader {
    /// Create a new header colored with the given white (0 or 1)
    #[inline(always)]
    pub fn with_white(current_white: u8, size: u32) -> Self {
        debug_assert!(
            current_white == 0 || current_white == 1,
            "current_white must be 0 or 1"
        );
        GcHeader {
            marked: 1 << (WHITE0BIT + current_white),
            size,
        }
    }

    // ============ Color Operations (tri-color marking) ============

    #[inline(always)]
    pub fn is_white(&self) -> bool {
        (self.marked & WHITEBITS) != 0
    }

    #[inline(always)]
    pub fn is_black(&self) -> bool {
        (self.marked & (1 << BLACKBIT)) != 0
    }

    #[inline(always)]
    pub fn is_gray(&self) -> bool {
        (self.marked & MASKCOLORS) == 0
    }

    pub fn color(&self) -> GcColor {
        if self.is_white() {
            GcColor::White
        } else if self.is_black() {
            GcColor::Black
        } else {
            GcColor::Gray
        }
    }

    // ============ Special Flags ============

    #[inline(always)]
    pub fn is_finalized(&self) -> bool {
        (self.marked & (1 << FINALIZEDBIT)) != 0
    }

    #[inline(always)]
    pub fn set_finalized(&mut self) {
        self.marked |= 1 << FINALIZEDBIT;
    }

    #[inline(always)]
    pub fn is_fixed(&self) -> bool {
        (self.marked & (1 << FIXEDBIT)) != 0
    }

    #[inline(always)]
    pub fn set_fixed(&mut self) {
        self.marked |= 1 << FIXEDBIT;
    }

    // ============ Color Transitions ============

    /// Clear all color bits, then set the given white
    #[inline(always)]
    pub fn make_white(&mut self, current_white: u8) {
        self.marked = (self.marked & !MASKCOLORS) | (1 << (WHITE0BIT + current_white));
    }

    #[inline(always)]
    pub fn make_gray(&mut self) {
        self.marked &= !MASKCOLORS;
    }

    #[inline(always)]
    pub fn make_black(&mut self) {
        self.marked = (self.marked & !WHITEBITS) | (1 << BLACKBIT);
    }

    /// Swap white type; used to revive a dead-but-unswept interned string
    #[inline(always)]
    pub fn change_white(&mut self) {
        self.marked ^= WHITEBITS;
    }

    // ============ Death Detection ============

    /// An object is dead when it still carries the white of the previous
    /// cycle. Fixed objects are never dead.
    #[inline(always)]
    pub fn is_dead(&self, other_white: u8) -> bool {
        !self.is_fixed() && (self.marked & (1 << (WHITE0BIT + other_white))) != 0
    }

    #[inline(always)]
    pub fn otherwhite(current_white: u8) -> u8 {
        current_white ^ 1
    }
}
