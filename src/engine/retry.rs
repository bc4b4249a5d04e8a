// src/engine/retry.rs

//! Pure retry state machine.
//!
//! [`RetryMachine`] decides which invocation variant runs next and when the
//! job is finished. It has no Tokio types, does no IO and never touches a
//! process, so every transition is unit tested directly. The async shell that
//! actually runs attempts lives in [`runner`](super::runner).

/// Where the machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    /// Variant `i` (zero-based) is being attempted.
    Attempting(usize),
    Succeeded,
    Exhausted,
}

/// What the shell observed for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptReport {
    /// An output was resolved and read.
    Resolved,
    Failed { error: String, timed_out: bool },
}

/// Final verdict, handed back once the machine is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryVerdict {
    Succeeded {
        attempts: usize,
    },
    Exhausted {
        /// Last non-empty error reported by any attempt.
        last_error: Option<String>,
        /// Whether the last failing attempt ran out of time (or the job
        /// deadline ran out before the next one could start).
        timed_out: bool,
        attempts: usize,
    },
}

/// What the shell should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryCommand {
    /// Run variant `i`.
    Run(usize),
    Finish(RetryVerdict),
}

#[derive(Debug, Clone)]
pub struct RetryMachine {
    variants: usize,
    state: RetryState,
    attempts: usize,
    last_error: Option<String>,
    last_timed_out: bool,
}

impl RetryMachine {
    pub fn new(variants: usize) -> Self {
        Self {
            variants,
            state: RetryState::Pending,
            attempts: 0,
            last_error: None,
            last_timed_out: false,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Number of attempts reported so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// `Pending -> Attempting(0)`, or straight to `Exhausted` with no variants.
    ///
    /// Calling `start` in any other state just repeats the current command.
    pub fn start(&mut self) -> RetryCommand {
        if self.state == RetryState::Pending {
            self.state = if self.variants == 0 {
                RetryState::Exhausted
            } else {
                RetryState::Attempting(0)
            };
        }
        self.current_command()
    }

    /// Feed the result of the running attempt.
    ///
    /// Reports arriving outside `Attempting` are ignored.
    pub fn on_attempt(&mut self, report: AttemptReport) -> RetryCommand {
        let RetryState::Attempting(i) = self.state else {
            return self.current_command();
        };
        self.attempts += 1;

        match report {
            AttemptReport::Resolved => {
                self.state = RetryState::Succeeded;
            }
            AttemptReport::Failed { error, timed_out } => {
                if !error.trim().is_empty() {
                    self.last_error = Some(error);
                }
                self.last_timed_out = timed_out;
                self.state = if i + 1 < self.variants {
                    RetryState::Attempting(i + 1)
                } else {
                    RetryState::Exhausted
                };
            }
        }
        self.current_command()
    }

    /// The job's own deadline ran out before the next attempt could start.
    pub fn on_deadline(&mut self) -> RetryCommand {
        if matches!(self.state, RetryState::Pending | RetryState::Attempting(_)) {
            self.last_timed_out = true;
            self.state = RetryState::Exhausted;
        }
        self.current_command()
    }

    fn current_command(&self) -> RetryCommand {
        match self.state {
            RetryState::Pending => RetryCommand::Run(0),
            RetryState::Attempting(i) => RetryCommand::Run(i),
            RetryState::Succeeded => RetryCommand::Finish(RetryVerdict::Succeeded {
                attempts: self.attempts,
            }),
            RetryState::Exhausted => RetryCommand::Finish(RetryVerdict::Exhausted {
                last_error: self.last_error.clone(),
                timed_out: self.last_timed_out,
                attempts: self.attempts,
            }),
        }
    }
}
