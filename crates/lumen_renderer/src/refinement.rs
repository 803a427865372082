//! Progressive level-of-detail policy.
//!
//! A pure state machine: the orchestrator feeds it the passes it issues and
//! a progress report on every tick, and gets back the next pass to issue,
//! if any. Timing is entirely up to the caller.

/// Where the orchestrator is in its refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    /// No pass issued yet
    #[default]
    Idle,
    /// A pass is in flight
    Rendering { generation: u64, lod: u32 },
    /// Every tile of the pass has been merged
    Converged { generation: u64, lod: u32 },
}

impl RenderState {
    pub fn lod(&self) -> Option<u32> {
        match *self {
            RenderState::Idle => None,
            RenderState::Rendering { lod, .. } | RenderState::Converged { lod, .. } => Some(lod),
        }
    }
}

/// Replies of the current pass, as seen at a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassProgress {
    /// Tiles posted for the pass
    pub expected: usize,
    /// Tiles merged so far
    pub merged: usize,
    /// Tiles merged since the previous tick
    pub received_since_last_tick: usize,
}

impl PassProgress {
    pub fn is_complete(&self) -> bool {
        self.merged >= self.expected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A pass was issued, by the caller or in answer to a `Command`
    RenderIssued { generation: u64, lod: u32 },
    Tick(PassProgress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    /// Issue a new pass at this LOD
    Render { lod: u32 },
}

/// Next finer LOD, floored at one pixel.
pub fn finer_lod(lod: u32) -> u32 {
    (lod / 2).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementPolicy {
    /// Halve the LOD of a pass that received nothing since the last tick
    pub restart_stalled_passes: bool,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            restart_stalled_passes: true,
        }
    }
}

impl RefinementPolicy {
    /// Apply `event` to `state`.
    ///
    /// * A completed pass becomes `Converged` at its LOD.
    /// * The tick after convergence issues the next finer pass, until a
    ///   pass at LOD 1 has converged.
    /// * A pass still missing tiles that received nothing since the last
    ///   tick is replaced by a finer one when `restart_stalled_passes` is
    ///   set.
    pub fn transition(&self, state: RenderState, event: Event) -> (RenderState, Command) {
        match (state, event) {
            (_, Event::RenderIssued { generation, lod }) => {
                (RenderState::Rendering { generation, lod }, Command::None)
            }

            (RenderState::Idle, Event::Tick(_)) => (state, Command::None),

            (RenderState::Rendering { generation, lod }, Event::Tick(progress)) => {
                if progress.is_complete() {
                    (RenderState::Converged { generation, lod }, Command::None)
                } else if self.restart_stalled_passes
                    && progress.received_since_last_tick == 0
                    && lod > 1
                {
                    (state, Command::Render { lod: finer_lod(lod) })
                } else {
                    (state, Command::None)
                }
            }

            (RenderState::Converged { lod, .. }, Event::Tick(_)) => {
                if lod > 1 {
                    (state, Command::Render { lod: finer_lod(lod) })
                } else {
                    (state, Command::None)
                }
            }
        }
    }
}
