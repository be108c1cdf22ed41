pub mod dispatcher;
pub mod telegram;
pub mod template;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use telegram::{MessageChannel, TelegramChannel};
pub use template::MessageTemplate;
