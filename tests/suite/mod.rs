mod collaborators;
mod session_flow;
mod shell;
