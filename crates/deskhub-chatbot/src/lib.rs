//! # deskhub-chatbot
//!
//! Thin HTTP wrapper around the external chatbot/LLM runtime. The relay
//! only needs one call shape: forward a customer question to a bot
//! profile's runtime. The runtime answers asynchronously by publishing a
//! `bot-response` event on its chatbot channel; nothing here waits for
//! an answer.

pub mod client;
pub mod gateway;

pub use client::HttpChatbotClient;
pub use gateway::{ChatbotGateway, SendQuestion};
