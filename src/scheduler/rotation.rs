//! Round-robin source rotation
//!
//! Every emitted lead is stamped with the next channel in a fixed cycle,
//! regardless of which lead was picked or what source it was stored with.

use crate::models::LeadSource;

/// Fixed rotation order
pub const ROTATION_ORDER: [LeadSource; 5] = [
    LeadSource::Facebook,
    LeadSource::Instagram,
    LeadSource::LinkedIn,
    LeadSource::Website,
    LeadSource::Google,
];

/// Deterministic cursor over [`ROTATION_ORDER`]
#[derive(Debug, Clone, Default)]
pub struct SourceRotation {
    cursor: usize,
}

impl SourceRotation {
    /// Rotation starting at the first source
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Return the current source and advance the cursor
    pub fn next_source(&mut self) -> LeadSource {
        let source = ROTATION_ORDER[self.cursor];
        self.cursor = (self.cursor + 1) % ROTATION_ORDER.len();
        source
    }

    /// Source the next call will return, without advancing
    pub fn peek(&self) -> LeadSource {
        ROTATION_ORDER[self.cursor]
    }

    /// Current cursor index in `[0, 5)`
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Position of a source in the rotation
    pub fn position_of(source: LeadSource) -> usize {
        ROTATION_ORDER
            .iter()
            .position(|s| *s == source)
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
