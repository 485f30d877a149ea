// Task lifecycle state machine
//
// Waiting -> Processing -> {Completed, Failed}; Waiting -> Cancelled;
// Failed -> Processing only through an explicit retry.

pub mod events;
pub mod states;
pub mod task_state_machine;

pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::{TaskStateMachine, CANCELLED_DETAIL};
