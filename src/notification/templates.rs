use crate::domain::order::{OrderPaidEvent, ShipAssembledEvent};

// Telegram HTML parse mode: only <b>/<code> are used and every interpolated
// value is a UUID, an enum name or an integer, so nothing needs escaping.

pub fn render_order_paid(event: &OrderPaidEvent) -> String {
    format!(
        "<b>Order paid!</b>\n\
         \n\
         Order: <code>{order}</code>\n\
         User: <code>{user}</code>\n\
         Payment method: <b>{method}</b>\n\
         Transaction: <code>{transaction}</code>\n\
         \n\
         Wait for the assembly notification.",
        order = event.order_id,
        user = event.user_id,
        method = event.payment_method,
        transaction = event.transaction_id,
    )
}

pub fn render_ship_assembled(event: &ShipAssembledEvent) -> String {
    format!(
        "<b>Order assembled!</b>\n\
         \n\
         Order: <code>{order}</code>\n\
         User: <code>{user}</code>\n\
         Build time: <b>{secs} sec</b>\n\
         \n\
         Your order is ready for shipping!",
        order = event.order_id,
        user = event.user_id,
        secs = event.build_time_secs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use uuid::Uuid;

    #[test]
    fn test_order_paid_template() {
        let event = OrderPaidEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PaymentMethod::CreditCard,
            Uuid::new_v4(),
        );

        let text = render_order_paid(&event);

        assert!(text.starts_with("<b>Order paid!</b>\n\n"));
        assert!(text.contains(&format!("Order: <code>{}</code>", event.order_id)));
        assert!(text.contains(&format!("User: <code>{}</code>", event.user_id)));
        assert!(text.contains("Payment method: <b>CREDIT_CARD</b>"));
        assert!(text.contains(&format!("Transaction: <code>{}</code>", event.transaction_id)));
        assert!(text.ends_with("Wait for the assembly notification."));
    }

    #[test]
    fn test_ship_assembled_template() {
        let event = ShipAssembledEvent {
            event_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            build_time_secs: 4,
        };

        let text = render_ship_assembled(&event);

        assert!(text.starts_with("<b>Order assembled!</b>"));
        assert!(text.contains(&format!("Order: <code>{}</code>", event.order_id)));
        assert!(text.contains("Build time: <b>4 sec</b>"));
        assert!(text.ends_with("Your order is ready for shipping!"));
    }
}
