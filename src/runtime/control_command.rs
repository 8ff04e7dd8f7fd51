use std::fmt;

/// Opcodes of the story bytecode. Each one is written in the JSON as a
/// short string token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    EvalStart,
    EvalOutput,
    EvalEnd,
    Duplicate,
    PopEvaluatedValue,
    PopFunction,
    PopTunnel,
    BeginString,
    EndString,
    NoOp,
    ChoiceCount,
    Turns,
    TurnsSince,
    ReadCount,
    Random,
    SeedRandom,
    VisitIndex,
    SequenceShuffleIndex,
    StartThread,
    Done,
    End,
    ListFromInt,
    ListRange,
    ListRandom,
    BeginTag,
    EndTag,
}

pub const ALL_COMMANDS: [ControlCommand; 26] = [
    ControlCommand::EvalStart,
    ControlCommand::EvalOutput,
    ControlCommand::EvalEnd,
    ControlCommand::Duplicate,
    ControlCommand::PopEvaluatedValue,
    ControlCommand::PopFunction,
    ControlCommand::PopTunnel,
    ControlCommand::BeginString,
    ControlCommand::EndString,
    ControlCommand::NoOp,
    ControlCommand::ChoiceCount,
    ControlCommand::Turns,
    ControlCommand::TurnsSince,
    ControlCommand::ReadCount,
    ControlCommand::Random,
    ControlCommand::SeedRandom,
    ControlCommand::VisitIndex,
    ControlCommand::SequenceShuffleIndex,
    ControlCommand::StartThread,
    ControlCommand::Done,
    ControlCommand::End,
    ControlCommand::ListFromInt,
    ControlCommand::ListRange,
    ControlCommand::ListRandom,
    ControlCommand::BeginTag,
    ControlCommand::EndTag,
];

impl ControlCommand {
    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::EvalStart => "ev",
            ControlCommand::EvalOutput => "out",
            ControlCommand::EvalEnd => "/ev",
            ControlCommand::Duplicate => "du",
            ControlCommand::PopEvaluatedValue => "pop",
            ControlCommand::PopFunction => "~ret",
            ControlCommand::PopTunnel => "->->",
            ControlCommand::BeginString => "str",
            ControlCommand::EndString => "/str",
            ControlCommand::NoOp => "nop",
            ControlCommand::ChoiceCount => "choiceCnt",
            ControlCommand::Turns => "turn",
            ControlCommand::TurnsSince => "turns",
            ControlCommand::ReadCount => "readc",
            ControlCommand::Random => "rnd",
            ControlCommand::SeedRandom => "srnd",
            ControlCommand::VisitIndex => "visit",
            ControlCommand::SequenceShuffleIndex => "seq",
            ControlCommand::StartThread => "thread",
            ControlCommand::Done => "done",
            ControlCommand::End => "end",
            ControlCommand::ListFromInt => "listInt",
            ControlCommand::ListRange => "range",
            ControlCommand::ListRandom => "lrnd",
            ControlCommand::BeginTag => "#",
            ControlCommand::EndTag => "/#",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_COMMANDS.iter().copied().find(|cmd| cmd.name() == name)
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
