//! Bridge daemon connecting a local OpenClaw agent to the cloud

pub mod config;
pub mod launcher;
pub mod openclaw;
pub mod relay;
pub mod wizard;
