use std::error::Error;
use std::fmt;

/// The source machine has no call stack: a shared routine invoked from N
/// call sites returns by jumping through a small token the caller stored
/// just before entry. `Slot` is that token's memory cell, one per shared
/// routine.
///
/// Discipline (the callers' side of the contract):
///
/// * a call site arms the slot with its continuation immediately before
///   invoking the routine;
/// * the routine resumes exactly once on exit, handing the token back to be
///   matched exhaustively (the enum + `match` replaces the original's
///   equality chain, so an out-of-range token can't exist);
/// * if the routine itself re-invokes a routine sharing this slot, the outer
///   token must be saved and restored around the nested call -- forgetting
///   this clobbers the outer return and is the bug class `DispatchFault`
///   makes visible.
pub struct Slot<K: Copy> {
    token: Option<K>,
}

impl<K: Copy> Slot<K> {
    pub fn new() -> Self {
        Slot { token: None }
    }

    /// store the call site's continuation; any previous token is clobbered,
    /// which is exactly the hazard save/restore exists to avoid
    pub fn arm(&mut self, k: K) {
        self.token = Some(k);
    }

    /// exit dispatch: consume the token exactly once. An empty slot means a
    /// call site forgot to arm, or a nested call clobbered the outer token
    /// without save/restore.
    pub fn resume(&mut self) -> Result<K, DispatchFault> {
        self.token.take().ok_or(DispatchFault)
    }

    /// take the current token out so a nested invocation can't clobber it
    pub fn save(&mut self) -> Option<K> {
        self.token.take()
    }

    /// put a saved token back after the nested invocation returns
    pub fn restore(&mut self, saved: Option<K>) {
        self.token = saved;
    }
}

impl<K: Copy> Default for Slot<K> {
    fn default() -> Self {
        Slot::new()
    }
}

/// A resume with no armed token. On the source machine this was an unmatched
/// return token: the program fell off the dispatch chain into a self-loop and
/// the device went dead with no diagnostics. Here it is a value the firmware
/// maps to its permanent halt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchFault;

impl fmt::Display for DispatchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "continuation dispatch fell through with no matching token")
    }
}

impl Error for DispatchFault {}
