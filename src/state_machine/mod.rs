// Task state machine for provisioning tasks.
//
// Pure transition rules: the task tracker loads a task, consults these rules,
// and persists the outcome through the task store.

pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::TaskEvent;
pub use states::TaskStatus;
pub use task_state_machine::TaskStateMachine;
