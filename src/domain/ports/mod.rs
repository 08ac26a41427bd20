mod agent_provider;
mod message_sender;

pub use agent_provider::AgentProvider;
pub use message_sender::MessageSender;
