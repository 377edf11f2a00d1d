// ============================================================================
// Wire messages for the inventory.v1 and payment.v1 gRPC services
// ============================================================================

pub mod inventory {
    pub const GET_PART_PATH: &str = "/inventory.v1.InventoryService/GetPart";

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetPartRequest {
        #[prost(string, tag = "1")]
        pub uuid: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetPartResponse {
        #[prost(message, optional, tag = "1")]
        pub part: Option<Part>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Part {
        #[prost(string, tag = "1")]
        pub uuid: String,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub description: String,
        #[prost(double, tag = "4")]
        pub price: f64,
        #[prost(int64, tag = "5")]
        pub stock_quantity: i64,
    }
}

pub mod payment {
    pub const PAY_ORDER_PATH: &str = "/payment.v1.PaymentService/PayOrder";

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum PaymentMethod {
        Unknown = 0,
        Card = 1,
        Sbp = 2,
        CreditCard = 3,
        InvestorMoney = 4,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PayOrderRequest {
        #[prost(string, tag = "1")]
        pub order_uuid: String,
        #[prost(string, tag = "2")]
        pub user_uuid: String,
        #[prost(enumeration = "PaymentMethod", tag = "3")]
        pub payment_method: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PayOrderResponse {
        #[prost(string, tag = "1")]
        pub transaction_uuid: String,
    }
}
