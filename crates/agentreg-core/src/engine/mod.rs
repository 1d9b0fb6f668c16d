pub mod invoker;
pub mod runner;

pub use invoker::{AgentInvoker, InvokerResponse, MockInvoker};
pub use runner::{RunOptions, RunOutcome, Runner};
