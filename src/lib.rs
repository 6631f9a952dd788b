//! # Forum Telegram Bot
//!
//! A Telegram bot for forum participants: FAQ, territory map, daily menu
//! and program, the directorate and its sections, and household appeals
//! relayed to the organizers. Admins replace content through a step by step
//! upload wizard.

pub mod admin;
pub mod appeal;
pub mod bot;
pub mod commands;
pub mod config;
pub mod content;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod legacy;
pub mod localization;
pub mod presentation;
pub mod router;
pub mod sections;
pub mod store;
