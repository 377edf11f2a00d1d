// ============================================================================
// Notification Dispatcher
// ============================================================================
//
// Subscribes to `order.paid` and `ship.assembled`, renders a fixed HTML
// template per event and sends it to one configured Telegram chat.
//
// ============================================================================

pub mod dispatcher;
pub mod telegram;
pub mod templates;

pub use dispatcher::{NotificationDispatcher, OrderPaidNotifier, ShipAssembledNotifier};
pub use telegram::{NotificationError, NotificationSink, TelegramClient, TelegramConfig};
