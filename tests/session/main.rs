mod common;

mod breakpoints;
mod cascade;
mod execution;
mod memory;
mod roster;
mod variables;
