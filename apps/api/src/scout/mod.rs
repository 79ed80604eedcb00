// Scout message generation: collaborator calls, opening reflow, and
// assembly of the final message from fixed boilerplate.

pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod reflow;
pub mod templates;
