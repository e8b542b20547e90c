//! Agent Relay - a supervisor agent that plans, routes and relays conversation
//! across a team of sub-agents.

pub mod agents;
pub mod ai;
pub mod config;
pub mod display;
