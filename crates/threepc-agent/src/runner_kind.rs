/// Which execution engine a ticket's function call should run under. Only
/// EVM is implemented; the enum exists so adding a second interpreter is a
/// new match arm rather than an untyped string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Evm,
}
