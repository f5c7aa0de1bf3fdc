use thiserror::Error;

/// Handle of a jump target owned by a [`Code`](super::code::Code) buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) usize);

impl Label {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Forward jumps are emitted against unresolved labels and patched once the
/// label is defined; backward jumps see a resolved label and are complete
/// when emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelState {
    /// Positions of 2-byte placeholders waiting for the address.
    Unresolved(Vec<usize>),
    Resolved(usize),
}

impl Default for LabelState {
    fn default() -> Self {
        LabelState::Unresolved(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label L{0} has been defined twice")]
    DefinedTwice(usize),
    #[error("label L{0} does not belong to this code buffer")]
    Unknown(usize),
}

/// Width of a jump or call offset field.
pub const OFFSET_WIDTH: usize = 2;

/// Encodes the jump from the offset field at `field_pos` to `target`.
///
/// Offsets are relative to the position immediately after the field.
pub fn relative_offset(target: usize, field_pos: usize) -> i16 {
    (target as i64 - (field_pos + OFFSET_WIDTH) as i64) as i16
}

/// Inverse of [`relative_offset`].
pub fn absolute_target(offset: i16, field_pos: usize) -> i64 {
    (field_pos + OFFSET_WIDTH) as i64 + i64::from(offset)
}
