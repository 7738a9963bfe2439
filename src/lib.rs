pub mod backend;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod platform;

use std::sync::Arc;

/// Custom data passed to the framework's event handler
pub struct Data {
    pub dispatcher: Arc<dispatch::MessageDispatcher<backend::ReplyProxyClient>>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
