// Session-backed conversation pipeline:
// - conversation records and the stores that hold them
// - prompt assembly for the initial comparison and follow-up turns
// - the lifecycle manager that ties stores, prompts and the completion gateway together
// - the HTTP router and its wire types

pub mod catalog;
pub mod conversation;
pub mod http_server;
pub mod prompt;
pub mod session;
