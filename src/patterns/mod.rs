//! Signal-coordination patterns.
//!
//! Each constructor captures an activity and/or signal identities and returns
//! a small struct whose `call`/`run` method performs one invocation of the
//! pattern. Invocation state lives only for the duration of that call.
//!
//! | Pattern | Waits for | Returns |
//! |---------|-----------|---------|
//! | [`SyncCall`] | the activity | the activity result |
//! | [`AwaitCompletion`] | the activity, then one completion signal | the activity result |
//! | [`SubmissionLoop`] | submissions until a finish signal | submissions consumed |
//! | [`ProgressAndFinal`] | the activity, progress, then one completion signal | the completion payload |

pub mod await_completion;
pub mod progress;
pub mod submission_loop;
pub mod sync_call;

pub use await_completion::{await_completion, AwaitCompletion};
pub use progress::{progress_and_final, ProgressAndFinal};
pub use submission_loop::{submission_loop, SubmissionLoop};
pub use sync_call::{sync_call, SyncCall};
