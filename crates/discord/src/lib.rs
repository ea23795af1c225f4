//! Discord integration - chat command interface for note-it
//!
//! This crate turns chat messages into note operations:
//! - **Commands** (`commands`) - `!ni:add`, `!ni:patch`, `!ni:delete`, `!ni:help`
//! - **Replies** (`replies`) - structured JSON payloads sent back to the author
//! - **Events** (`events`) - gateway events routed to handlers
//! - **Gateway** (`gateway`) - event loop with reconnection logic
//! - **REST** (`rest`) - direct message delivery
//! - **Websocket** (`websocket`) - live gateway transport
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → MessageCreateHandler → CommandRouter → NoteRepository
//!                                     ↓
//!                 DirectMessenger ← Reply (private to the author)
//! ```

pub mod commands;
pub mod events;
pub mod gateway;
pub mod replies;
pub mod rest;
pub mod websocket;
