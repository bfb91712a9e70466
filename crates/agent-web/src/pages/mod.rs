//! Page Components

mod chat;

pub use chat::ChatPage;
