use crate::runtime::{call_stack::Thread, path::Path};

/// Packed flags of a choice point (`flg` in JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChoiceFlags(u8);

impl ChoiceFlags {
    pub const HAS_CONDITION: u8 = 1;
    pub const HAS_START_CONTENT: u8 = 2;
    pub const HAS_CHOICE_ONLY_CONTENT: u8 = 4;
    pub const IS_INVISIBLE_DEFAULT: u8 = 8;
    pub const ONCE_ONLY: u8 = 16;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x1f)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn with(self, flag: u8) -> Self {
        Self(self.0 | flag)
    }

    fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn has_condition(self) -> bool {
        self.has(Self::HAS_CONDITION)
    }

    pub fn has_start_content(self) -> bool {
        self.has(Self::HAS_START_CONTENT)
    }

    pub fn has_choice_only_content(self) -> bool {
        self.has(Self::HAS_CHOICE_ONLY_CONTENT)
    }

    pub fn is_invisible_default(self) -> bool {
        self.has(Self::IS_INVISIBLE_DEFAULT)
    }

    pub fn once_only(self) -> bool {
        self.has(Self::ONCE_ONLY)
    }
}

/// Authored choice: where it leads and how to evaluate it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoicePoint {
    pub path_on_choice: Path,
    pub flags: ChoiceFlags,
}

impl ChoicePoint {
    pub fn new(path_on_choice: Path, flags: ChoiceFlags) -> Self {
        Self {
            path_on_choice,
            flags,
        }
    }
}

/// A choice offered to the player during the current turn.
#[derive(Debug, Clone)]
pub struct Choice {
    pub text: String,
    /// Position among the visible choices.
    pub index: usize,
    pub target_path: Path,
    /// Path of the choice point that produced this choice.
    pub source_path: String,
    pub original_thread_index: usize,
    pub is_invisible_default: bool,
    pub tags: Vec<String>,
    /// The thread as it was when the choice was generated; made current
    /// again when the choice is taken.
    pub(crate) thread_at_generation: Thread,
}

impl Choice {
    pub fn thread_at_generation(&self) -> &Thread {
        &self.thread_at_generation
    }
}
